pub mod bank_account;
pub mod commerce;
pub mod order;
pub mod order_item;
pub mod payment;
pub mod shipment;
pub mod shipment_tracking;
pub mod shipping_method;

pub use bank_account::Entity as BankAccount;
pub use order::Entity as Order;
pub use order_item::Entity as OrderItem;
pub use payment::Entity as Payment;
pub use shipment::Entity as Shipment;
pub use shipment_tracking::Entity as ShipmentTracking;
pub use shipping_method::Entity as ShippingMethod;
