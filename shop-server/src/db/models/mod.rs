//! Database Models

// Serde helpers
pub mod serde_helpers;

// Auth
pub mod user;

// Catalog
pub mod product;

// Cart
pub mod cart;

// Orders
pub mod order;

// Re-exports
pub use cart::{Cart, CartItem, CartItemView, CartView};
pub use order::{Order, OrderId, OrderItem, OrderItemView, OrderView};
pub use product::{Product, ProductId};
pub use user::{User, UserId};
