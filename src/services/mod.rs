// Storefront: catalog, cart, checkout
pub mod commerce;

// Post-checkout lifecycle
pub mod orders;
pub mod payments;
pub mod shipments;

// External Services
pub mod payment_gateway;
