pub mod carts;
pub mod catalog;
pub mod checkout;

pub use carts::carts_routes;
pub use catalog::catalog_routes;
pub use checkout::checkout_routes;
