/// Commerce services module - catalog browsing, carts and checkout
pub mod cart_service;
pub mod catalog_service;
pub mod checkout_service;

// Re-export services for convenience
pub use cart_service::{AddToCartInput, CartLine, CartMutation, CartService, CartView};
pub use catalog_service::{CatalogService, PartListQuery, PartView};
pub use checkout_service::{CheckoutService, NextStep, PlaceOrderRequest, PlacedOrder};
