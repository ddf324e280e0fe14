pub mod addresses;
pub mod audit_logs;
pub mod order_items;
pub mod orders;
pub mod product_variants;
pub mod products;
pub mod shipping_methods;
pub mod users;
pub mod wishlist_items;

pub use addresses::Entity as Addresses;
pub use audit_logs::Entity as AuditLogs;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use product_variants::Entity as ProductVariants;
pub use products::Entity as Products;
pub use shipping_methods::Entity as ShippingMethods;
pub use users::Entity as Users;
pub use wishlist_items::Entity as WishlistItems;
