pub mod cart_items;
pub mod carts;
pub mod order_items;
pub mod orders;

pub use cart_items::Entity as CartItems;
pub use carts::Entity as Carts;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
