//! Currency-tagged amounts.
//!
//! `Money<C>` pairs a decimal amount with a zero-sized currency marker. The
//! arithmetic and comparison impls only exist between identical markers, so
//! adding a `Money<Usd>` to a `Money<Ngn>` is rejected by the compiler rather
//! than producing a meaningless number at runtime.

use crate::errors::ServiceError;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::marker::PhantomData;
use std::ops::{Add, AddAssign, Sub};

pub trait Currency:
    Copy + Clone + Default + fmt::Debug + PartialEq + Eq + PartialOrd + Ord + std::hash::Hash + Send + Sync + 'static
{
    /// ISO 4217 code stored next to every amount column.
    const CODE: &'static str;
    /// Number of minor units per major unit, as a power of ten.
    const MINOR_UNIT_DIGITS: u32;
}

/// Nigerian naira, the store currency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ngn;

impl Currency for Ngn {
    const CODE: &'static str = "NGN";
    const MINOR_UNIT_DIGITS: u32 = 2;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Usd;

impl Currency for Usd {
    const CODE: &'static str = "USD";
    const MINOR_UNIT_DIGITS: u32 = 2;
}

pub type StoreCurrency = Ngn;
pub type StoreMoney = Money<StoreCurrency>;

#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money<C: Currency> {
    amount: Decimal,
    currency: PhantomData<C>,
}

impl<C: Currency> Money<C> {
    pub fn new(amount: Decimal) -> Self {
        Self {
            amount,
            currency: PhantomData,
        }
    }

    pub fn zero() -> Self {
        Self::new(Decimal::ZERO)
    }

    /// Rebuild an amount from its stored (amount, currency code) columns.
    pub fn from_stored(amount: Decimal, code: &str) -> Result<Self, ServiceError> {
        if !code.eq_ignore_ascii_case(C::CODE) {
            return Err(ServiceError::CurrencyMismatch {
                expected: C::CODE.to_string(),
                found: code.to_string(),
            });
        }
        Ok(Self::new(amount))
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency_code(&self) -> &'static str {
        C::CODE
    }

    pub fn is_negative(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }

    /// Line total for `quantity` units at this unit price.
    pub fn times(&self, quantity: i32) -> Self {
        Self::new(self.amount * Decimal::from(quantity))
    }

    /// Integer amount in minor units (kobo for NGN), truncating any
    /// fraction below the smallest unit.
    pub fn to_minor_units(&self) -> Result<i64, ServiceError> {
        let scale = Decimal::from(10u64.pow(C::MINOR_UNIT_DIGITS));
        (self.amount * scale).trunc().to_i64().ok_or_else(|| {
            ServiceError::InternalError(format!("amount {} out of range", self.amount))
        })
    }

    fn display_amount(&self) -> Decimal {
        let mut amount = self.amount.round_dp(C::MINOR_UNIT_DIGITS);
        amount.rescale(C::MINOR_UNIT_DIGITS);
        amount
    }
}

impl<C: Currency> Add for Money<C> {
    type Output = Money<C>;

    fn add(self, rhs: Self) -> Self::Output {
        Money::new(self.amount + rhs.amount)
    }
}

impl<C: Currency> AddAssign for Money<C> {
    fn add_assign(&mut self, rhs: Self) {
        self.amount += rhs.amount;
    }
}

impl<C: Currency> Sub for Money<C> {
    type Output = Money<C>;

    fn sub(self, rhs: Self) -> Self::Output {
        Money::new(self.amount - rhs.amount)
    }
}

impl<C: Currency> Sum for Money<C> {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

impl<C: Currency> fmt::Debug for Money<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Money({} {})", self.amount, C::CODE)
    }
}

impl<C: Currency> fmt::Display for Money<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", C::CODE, self.display_amount())
    }
}

#[derive(Serialize, Deserialize)]
struct MoneyRepr {
    amount: Decimal,
    currency: String,
}

impl<C: Currency> Serialize for Money<C> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        MoneyRepr {
            amount: self.display_amount(),
            currency: C::CODE.to_string(),
        }
        .serialize(serializer)
    }
}

impl<'de, C: Currency> Deserialize<'de> for Money<C> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = MoneyRepr::deserialize(deserializer)?;
        Money::from_stored(repr.amount, &repr.currency).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn line_totals_and_sums_stay_in_currency() {
        let unit = StoreMoney::new(dec!(1000));
        let lines = vec![unit.times(2), StoreMoney::new(dec!(500))];
        let subtotal: StoreMoney = lines.into_iter().sum();
        assert_eq!(subtotal.amount(), dec!(2500));
        assert_eq!((subtotal + StoreMoney::new(dec!(2000))).amount(), dec!(4500));
    }

    #[test]
    fn minor_units_truncate() {
        assert_eq!(StoreMoney::new(dec!(4500)).to_minor_units().unwrap(), 450_000);
        assert_eq!(StoreMoney::new(dec!(10.999)).to_minor_units().unwrap(), 1099);
    }

    #[test]
    fn loading_a_foreign_currency_is_rejected() {
        let err = StoreMoney::from_stored(dec!(10), "USD").unwrap_err();
        assert!(matches!(err, ServiceError::CurrencyMismatch { .. }));
        assert!(Money::<Usd>::from_stored(dec!(10), "usd").is_ok());
    }

    #[test]
    fn serializes_with_two_decimals_and_code() {
        let json = serde_json::to_value(StoreMoney::new(dec!(1000))).unwrap();
        assert_eq!(json, serde_json::json!({"amount": "1000.00", "currency": "NGN"}));

        let back: StoreMoney = serde_json::from_value(json).unwrap();
        assert_eq!(back.amount(), dec!(1000));
    }

    #[test]
    fn comparisons_work_within_a_currency() {
        assert!(StoreMoney::new(dec!(1)) < StoreMoney::new(dec!(2)));
        assert!(StoreMoney::new(dec!(-1)).is_negative());
        assert!(!StoreMoney::zero().is_negative());
    }
}
