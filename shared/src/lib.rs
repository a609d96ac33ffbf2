//! Shared types for the storefront backend
//!
//! Request/response DTOs used in API communication between the server
//! and its clients (web storefront, admin panel).

pub mod client;

// Re-exports
pub use serde::{Deserialize, Serialize};

pub use client::{
    AddCartItemRequest, CheckoutItem, CheckoutRequest, CheckoutResponse, ConfirmPaymentRequest,
    ConfirmPaymentResponse, CreateOrderRequest, LoginRequest, LoginResponse, OrderItemInput,
    OrderStatus, ProductCreate, ProductUpdate, RegisterRequest, RegisterResponse,
    UpdateOrderStatusRequest, UserInfo,
};
