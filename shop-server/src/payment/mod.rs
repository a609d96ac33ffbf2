//! Payment Processor Bridge
//!
//! The hosted-payment flow is behind [`PaymentProvider`] so handlers and
//! tests never talk to the processor directly. The production
//! implementation is [`StripeClient`].

pub mod stripe;

pub use stripe::StripeClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One line of a hosted payment session, prices in minor units (cents)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentLineItem {
    pub name: String,
    pub image: String,
    pub unit_amount: i64,
    pub quantity: u32,
}

/// A created hosted-payment session
#[derive(Debug, Clone)]
pub struct PaymentSession {
    /// Opaque session reference, later used for confirmation lookup
    pub id: String,
    /// Where to redirect the shopper
    pub url: String,
}

/// Payment state of a session as reported by the processor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Unpaid,
    NoPaymentRequired,
    #[serde(other)]
    Unknown,
}

impl PaymentStatus {
    pub fn is_paid(self) -> bool {
        matches!(self, PaymentStatus::Paid)
    }
}

/// Payment processor errors
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Payment request failed: {0}")]
    Http(String),

    #[error("Payment API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected payment API response: {0}")]
    Decode(String),
}

/// Hosted payment processor seam
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a hosted checkout session for the given line items
    async fn create_session(&self, items: &[PaymentLineItem])
    -> Result<PaymentSession, PaymentError>;

    /// Current payment status of an existing session
    async fn session_status(&self, session_id: &str) -> Result<PaymentStatus, PaymentError>;
}
