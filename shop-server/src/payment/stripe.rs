//! Stripe Checkout Sessions client
//!
//! Thin form-encoded client for the hosted checkout-sessions API. Only the
//! two calls the backend needs: create a session, retrieve its status.

use async_trait::async_trait;
use serde::Deserialize;

use super::{PaymentError, PaymentLineItem, PaymentProvider, PaymentSession, PaymentStatus};

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    base_url: String,
    success_url: String,
    cancel_url: String,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    #[serde(default)]
    url: Option<String>,
    payment_status: PaymentStatus,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
}

impl StripeClient {
    /// `client_url` is the storefront origin the shopper returns to
    pub fn new(secret_key: String, client_url: &str) -> Self {
        Self::with_base_url(secret_key, client_url, STRIPE_API_BASE)
    }

    pub fn with_base_url(secret_key: String, client_url: &str, base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            success_url: format!("{client_url}/success?session_id={{CHECKOUT_SESSION_ID}}"),
            cancel_url: format!("{client_url}/cancel"),
        }
    }

    /// Stripe's form encoding for nested checkout-session fields
    fn session_params(&self, items: &[PaymentLineItem]) -> Vec<(String, String)> {
        let mut params = vec![
            ("mode".to_string(), "payment".to_string()),
            ("payment_method_types[0]".to_string(), "card".to_string()),
            ("success_url".to_string(), self.success_url.clone()),
            ("cancel_url".to_string(), self.cancel_url.clone()),
        ];

        for (i, item) in items.iter().enumerate() {
            params.push((
                format!("line_items[{i}][price_data][currency]"),
                "usd".to_string(),
            ));
            params.push((
                format!("line_items[{i}][price_data][product_data][name]"),
                item.name.clone(),
            ));
            if !item.image.is_empty() {
                params.push((
                    format!("line_items[{i}][price_data][product_data][images][0]"),
                    item.image.clone(),
                ));
            }
            params.push((
                format!("line_items[{i}][price_data][unit_amount]"),
                item.unit_amount.to_string(),
            ));
            params.push((format!("line_items[{i}][quantity]"), item.quantity.to_string()));
        }

        params
    }

    async fn decode_session(response: reqwest::Response) -> Result<SessionResponse, PaymentError> {
        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ApiErrorBody>()
                .await
                .map(|b| b.error.message)
                .unwrap_or_else(|_| "unreadable error body".to_string());
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<SessionResponse>()
            .await
            .map_err(|e| PaymentError::Decode(e.to_string()))
    }
}

#[async_trait]
impl PaymentProvider for StripeClient {
    async fn create_session(
        &self,
        items: &[PaymentLineItem],
    ) -> Result<PaymentSession, PaymentError> {
        let response = self
            .http
            .post(format!("{}/checkout/sessions", self.base_url))
            .bearer_auth(&self.secret_key)
            .form(&self.session_params(items))
            .send()
            .await
            .map_err(|e| PaymentError::Http(e.to_string()))?;

        let session = Self::decode_session(response).await?;
        let url = session
            .url
            .ok_or_else(|| PaymentError::Decode("session has no redirect url".to_string()))?;

        Ok(PaymentSession {
            id: session.id,
            url,
        })
    }

    async fn session_status(&self, session_id: &str) -> Result<PaymentStatus, PaymentError> {
        let response = self
            .http
            .get(format!("{}/checkout/sessions/{session_id}", self.base_url))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| PaymentError::Http(e.to_string()))?;

        let session = Self::decode_session(response).await?;
        Ok(session.payment_status)
    }
}
