use crate::{
    auth::CallerIdentity,
    entities::commerce::{cart, cart_item, part, Cart, CartItem, Part},
    errors::ServiceError,
    events::{Event, EventSender},
    money::StoreMoney,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// Shopping cart service.
///
/// Every operation is keyed on an explicit [`CallerIdentity`]: a signed-in
/// user owns at most one cart, and so does each anonymous session key.
/// Carts are created lazily the first time an owner needs one.
///
/// Stock is checked whenever a line's quantity grows, but nothing is
/// reserved; checkout re-validates and decrements stock atomically.
///
/// # Examples
///
/// ```ignore
/// use partstore_api::services::commerce::{AddToCartInput, CartService};
///
/// let cart_service = CartService::new(db, event_sender);
/// let caller = CallerIdentity::session("3f9a0c");
///
/// let mutation = cart_service
///     .add_item(&caller, AddToCartInput { part_id, quantity: 2 })
///     .await?;
/// assert_eq!(mutation.cart_count, 2);
/// ```
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl CartService {
    /// Creates a new `CartService` instance.
    ///
    /// # Arguments
    ///
    /// * `db` - Database connection pool
    /// * `event_sender` - Event sender for publishing cart events
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Returns the caller's cart, creating an empty one if needed.
    ///
    /// Two concurrent first requests from the same owner race on the unique
    /// owner index; the loser re-reads the winner's row.
    #[instrument(skip(self))]
    pub async fn get_or_create_cart(
        &self,
        caller: &CallerIdentity,
    ) -> Result<cart::Model, ServiceError> {
        if let Some(cart) = find_cart(&*self.db, caller).await? {
            return Ok(cart);
        }

        let now = Utc::now();
        let model = cart::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(caller.user_id()),
            session_key: Set(caller.session_key().map(str::to_string)),
            created_at: Set(now),
            updated_at: Set(now),
        };

        match model.insert(&*self.db).await {
            Ok(cart) => {
                info!(cart_id = %cart.id, owner = %caller, "created cart");
                Ok(cart)
            }
            Err(e) => {
                warn!(owner = %caller, error = %e, "cart insert lost a race, re-reading");
                find_cart(&*self.db, caller)
                    .await?
                    .ok_or(ServiceError::DatabaseError(e))
            }
        }
    }

    /// Full cart contents with totals.
    #[instrument(skip(self))]
    pub async fn view(&self, caller: &CallerIdentity) -> Result<CartView, ServiceError> {
        let cart = self.get_or_create_cart(caller).await?;
        let lines = load_cart_lines(&*self.db, cart.id).await?;
        Ok(CartView::from_lines(cart.id, lines))
    }

    /// Total number of units in the caller's cart. Never creates a cart.
    #[instrument(skip(self))]
    pub async fn cart_count(&self, caller: &CallerIdentity) -> Result<i64, ServiceError> {
        let Some(cart) = find_cart(&*self.db, caller).await? else {
            return Ok(0);
        };
        let items = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .all(&*self.db)
            .await?;
        Ok(items.iter().map(|item| i64::from(item.quantity)).sum())
    }

    /// Adds a part to the cart, merging into an existing line for the same
    /// part.
    ///
    /// # Arguments
    ///
    /// * `caller` - Cart owner
    /// * `input` - Part and number of units to add
    ///
    /// # Returns
    ///
    /// * `Ok(CartMutation)` - The affected line plus refreshed cart totals
    /// * `Err(ServiceError::ValidationError)` - Quantity is zero or negative
    /// * `Err(ServiceError::NotFound)` - Part is unknown or no longer sold
    /// * `Err(ServiceError::InsufficientStock)` - The resulting line quantity
    ///   would exceed stock; the cart is left untouched
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        caller: &CallerIdentity,
        input: AddToCartInput,
    ) -> Result<CartMutation, ServiceError> {
        if input.quantity <= 0 {
            return Err(ServiceError::ValidationError("Invalid quantity".to_string()));
        }

        let cart = self.get_or_create_cart(caller).await?;
        let txn = self.db.begin().await?;

        let part = Part::find_by_id(input.part_id)
            .one(&txn)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| ServiceError::NotFound(format!("Part {} not found", input.part_id)))?;

        let existing = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::PartId.eq(part.id))
            .one(&txn)
            .await?;

        let now = Utc::now();
        let item = match existing {
            Some(item) => {
                let quantity = item.quantity.saturating_add(input.quantity);
                ensure_stock(&part, quantity)?;
                let mut active: cart_item::ActiveModel = item.into();
                active.quantity = Set(quantity);
                active.updated_at = Set(now);
                active.update(&txn).await?
            }
            None => {
                ensure_stock(&part, input.quantity)?;
                cart_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    cart_id: Set(cart.id),
                    part_id: Set(part.id),
                    quantity: Set(input.quantity),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(&txn)
                .await?
            }
        };

        let mutation = mutation_for(&txn, cart.id, Some(&item), &part).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemAdded {
                cart_id: cart.id,
                part_id: part.id,
                quantity: input.quantity,
            })
            .await;

        info!(cart_id = %cart.id, part_id = %part.id, quantity = item.quantity, "added to cart");
        Ok(mutation)
    }

    /// Sets a line's quantity. Zero or less removes the line.
    #[instrument(skip(self))]
    pub async fn update_item(
        &self,
        caller: &CallerIdentity,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<CartMutation, ServiceError> {
        let txn = self.db.begin().await?;
        let (cart, item) = owned_item(&txn, caller, item_id).await?;

        let part = Part::find_by_id(item.part_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Part {} not found", item.part_id)))?;

        let mutation = if quantity <= 0 {
            item.delete(&txn).await?;
            mutation_for(&txn, cart.id, None, &part).await?
        } else {
            ensure_stock(&part, quantity)?;
            let mut active: cart_item::ActiveModel = item.into();
            active.quantity = Set(quantity);
            active.updated_at = Set(Utc::now());
            let item = active.update(&txn).await?;
            mutation_for(&txn, cart.id, Some(&item), &part).await?
        };
        txn.commit().await?;

        let event = if quantity <= 0 {
            Event::CartItemRemoved {
                cart_id: cart.id,
                item_id,
            }
        } else {
            Event::CartItemUpdated {
                cart_id: cart.id,
                item_id,
                quantity,
            }
        };
        self.event_sender.send_or_log(event).await;

        Ok(mutation)
    }

    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        caller: &CallerIdentity,
        item_id: Uuid,
    ) -> Result<CartMutation, ServiceError> {
        let txn = self.db.begin().await?;
        let (cart, item) = owned_item(&txn, caller, item_id).await?;

        let part = Part::find_by_id(item.part_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Part {} not found", item.part_id)))?;

        item.delete(&txn).await?;
        let mutation = mutation_for(&txn, cart.id, None, &part).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemRemoved {
                cart_id: cart.id,
                item_id,
            })
            .await;

        info!(cart_id = %cart.id, %item_id, "removed cart line");
        Ok(mutation)
    }

    /// Empties the caller's cart. A caller without a cart is a no-op.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self, caller: &CallerIdentity) -> Result<(), ServiceError> {
        let Some(cart) = find_cart(&*self.db, caller).await? else {
            return Ok(());
        };

        CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(&*self.db)
            .await?;

        self.event_sender.send_or_log(Event::CartCleared(cart.id)).await;
        Ok(())
    }
}

/// The caller's cart, if one exists.
pub(crate) async fn find_cart<C>(
    conn: &C,
    caller: &CallerIdentity,
) -> Result<Option<cart::Model>, ServiceError>
where
    C: ConnectionTrait,
{
    let select = match caller {
        CallerIdentity::User { user_id } => Cart::find().filter(cart::Column::UserId.eq(*user_id)),
        CallerIdentity::Session { session_key } => {
            Cart::find().filter(cart::Column::SessionKey.eq(session_key.as_str()))
        }
    };
    Ok(select.one(conn).await?)
}

/// Cart lines joined with their parts, oldest line first.
pub(crate) async fn load_cart_lines<C>(conn: &C, cart_id: Uuid) -> Result<Vec<CartLine>, ServiceError>
where
    C: ConnectionTrait,
{
    let rows = CartItem::find()
        .filter(cart_item::Column::CartId.eq(cart_id))
        .find_also_related(Part)
        .order_by_asc(cart_item::Column::CreatedAt)
        .all(conn)
        .await?;

    rows.into_iter()
        .map(|(item, part)| {
            let part = part.ok_or_else(|| {
                ServiceError::NotFound(format!("Part {} not found", item.part_id))
            })?;
            CartLine::new(&item, &part)
        })
        .collect()
}

/// A line may only be touched through its owner's cart.
async fn owned_item<C>(
    conn: &C,
    caller: &CallerIdentity,
    item_id: Uuid,
) -> Result<(cart::Model, cart_item::Model), ServiceError>
where
    C: ConnectionTrait,
{
    let item = CartItem::find_by_id(item_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Cart item {} not found", item_id)))?;

    match find_cart(conn, caller).await? {
        Some(cart) if cart.id == item.cart_id => Ok((cart, item)),
        _ => Err(ServiceError::InvalidOperation(
            "Cart item does not belong to your cart".to_string(),
        )),
    }
}

async fn mutation_for<C>(
    conn: &C,
    cart_id: Uuid,
    item: Option<&cart_item::Model>,
    part: &part::Model,
) -> Result<CartMutation, ServiceError>
where
    C: ConnectionTrait,
{
    let view = CartView::from_lines(cart_id, load_cart_lines(conn, cart_id).await?);
    let (item_id, quantity, line_total) = match item {
        Some(item) => (
            Some(item.id),
            item.quantity,
            part.unit_price()?.times(item.quantity),
        ),
        None => (None, 0, StoreMoney::zero()),
    };

    Ok(CartMutation {
        item_id,
        quantity,
        line_total,
        cart_count: view.total_items,
        cart_total: view.total_price,
    })
}

fn ensure_stock(part: &part::Model, quantity: i32) -> Result<(), ServiceError> {
    if part.is_available(quantity) {
        Ok(())
    } else {
        Err(ServiceError::InsufficientStock(format!(
            "Only {} units of {} available",
            part.stock_quantity, part.name
        )))
    }
}

/// Input for adding a part to the cart
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct AddToCartInput {
    pub part_id: Uuid,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

/// One cart line priced at the part's current price
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CartLine {
    pub item_id: Uuid,
    pub part_id: Uuid,
    pub part_name: String,
    pub part_slug: String,
    #[schema(value_type = Object)]
    pub unit_price: StoreMoney,
    pub quantity: i32,
    #[schema(value_type = Object)]
    pub line_total: StoreMoney,
    pub stock_available: i32,
}

impl CartLine {
    pub fn new(item: &cart_item::Model, part: &part::Model) -> Result<Self, ServiceError> {
        let unit_price = part.unit_price()?;
        Ok(Self {
            item_id: item.id,
            part_id: part.id,
            part_name: part.name.clone(),
            part_slug: part.slug.clone(),
            unit_price,
            quantity: item.quantity,
            line_total: unit_price.times(item.quantity),
            stock_available: part.stock_quantity,
        })
    }

    /// Checkout only proceeds when every line still fits in stock.
    pub fn exceeds_stock(&self) -> bool {
        self.quantity > self.stock_available
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CartView {
    pub cart_id: Uuid,
    pub items: Vec<CartLine>,
    pub total_items: i64,
    #[schema(value_type = Object)]
    pub total_price: StoreMoney,
}

impl CartView {
    pub fn from_lines(cart_id: Uuid, items: Vec<CartLine>) -> Self {
        let total_items = items.iter().map(|line| i64::from(line.quantity)).sum();
        let total_price = items.iter().map(|line| line.line_total).sum();
        Self {
            cart_id,
            items,
            total_items,
            total_price,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Result of an add/update/remove: the touched line and the refreshed cart
/// totals.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CartMutation {
    /// `None` once the line has been removed
    pub item_id: Option<Uuid>,
    pub quantity: i32,
    #[schema(value_type = Object)]
    pub line_total: StoreMoney,
    pub cart_count: i64,
    #[schema(value_type = Object)]
    pub cart_total: StoreMoney,
}
