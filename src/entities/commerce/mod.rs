pub mod cart;
pub mod cart_item;
pub mod category;
pub mod customer_profile;
pub mod manufacturer;
pub mod part;

pub use cart::Entity as Cart;
pub use cart_item::Entity as CartItem;
pub use category::Entity as Category;
pub use customer_profile::Entity as CustomerProfile;
pub use manufacturer::Entity as Manufacturer;
pub use part::Entity as Part;
