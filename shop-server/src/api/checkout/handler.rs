//! Checkout API Handlers
//!
//! Bridges carts to the hosted payment processor and reconciles the
//! outcome asynchronously. Prices are read at checkout time; confirmation
//! never re-reads them.

use axum::{Json, extract::State, http::StatusCode};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use validator::Validate;

use crate::api::convert::{repo_err, stock_err};
use crate::core::ServerState;
use crate::db::models::OrderItem;
use crate::db::repository::{CartRepository, OrderRepository, ProductRepository, record_id};
use crate::payment::PaymentLineItem;
use crate::stock::StockLine;
use crate::utils::{AppError, AppResult};

use shared::{CheckoutRequest, CheckoutResponse, ConfirmPaymentRequest, ConfirmPaymentResponse};

/// POST /api/checkout - 创建托管支付会话并记录 Pending 订单
///
/// 成功后清空该用户的购物车，返回跳转地址。
pub async fn create_session(
    State(state): State<ServerState>,
    Json(req): Json<CheckoutRequest>,
) -> AppResult<Json<CheckoutResponse>> {
    let Some(user_id) = req.user_id.clone() else {
        return Err(AppError::validation(
            "User ID is required to place an order",
        ));
    };
    if req.items.is_empty() {
        return Err(AppError::validation("Checkout must contain items"));
    }
    req.validate()
        .map_err(|e| AppError::validation(e.to_string()))?;

    let product_repo = ProductRepository::new(state.get_db());

    // Resolve each product at checkout time: the session line items and the
    // stored total must be built from the same price snapshot
    let mut total = Decimal::ZERO;
    let mut line_items = Vec::with_capacity(req.items.len());
    let mut order_items = Vec::with_capacity(req.items.len());
    for input in &req.items {
        let product = product_repo
            .find_by_id(&input.product_id)
            .await
            .map_err(repo_err)?
            .ok_or_else(|| {
                tracing::error!(product = %input.product_id, "Checkout references missing product");
                AppError::invalid(format!("Product not found: {}", input.product_id))
            })?;

        total += product.price * Decimal::from(input.quantity);

        let unit_amount = (product.price * Decimal::from(100))
            .round()
            .to_i64()
            .ok_or_else(|| AppError::internal("price out of range for minor units"))?;

        line_items.push(PaymentLineItem {
            name: product.name.clone(),
            image: product.image.clone(),
            unit_amount,
            quantity: input.quantity,
        });
        order_items.push(OrderItem {
            product: record_id("product", &input.product_id),
            quantity: input.quantity,
        });
    }

    let session = state
        .payment
        .create_session(&line_items)
        .await
        .map_err(|e| AppError::upstream(e.to_string()))?;

    // Record the Pending order carrying the session reference; stock is
    // not touched until the payment is confirmed
    let user = record_id("user", &user_id);
    let order_repo = OrderRepository::new(state.get_db());
    let order = order_repo
        .create(
            user.clone(),
            order_items,
            total,
            Some(session.id.clone()),
            false,
        )
        .await
        .map_err(repo_err)?;

    // Successful checkout consumes the cart
    CartRepository::new(state.get_db())
        .delete_for_user(&user)
        .await
        .map_err(repo_err)?;

    tracing::info!(
        order = %order.id.as_ref().map(|t| t.to_string()).unwrap_or_default(),
        session = %session.id,
        "Checkout session created"
    );

    Ok(Json(CheckoutResponse {
        redirect_url: session.url,
    }))
}

/// POST /api/checkout/confirm-payment - 确认支付结果
///
/// 幂等：重复确认同一会话不会重复扣减库存。
pub async fn confirm_payment(
    State(state): State<ServerState>,
    Json(req): Json<ConfirmPaymentRequest>,
) -> AppResult<(StatusCode, Json<ConfirmPaymentResponse>)> {
    let Some(session_id) = req.session_id else {
        return Err(AppError::validation("Session ID required"));
    };

    let status = state
        .payment
        .session_status(&session_id)
        .await
        .map_err(|e| AppError::upstream(e.to_string()))?;

    if !status.is_paid() {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(ConfirmPaymentResponse {
                success: false,
                message: "Payment failed".to_string(),
            }),
        ));
    }

    let order_repo = OrderRepository::new(state.get_db());
    let order = order_repo
        .find_by_session(&session_id)
        .await
        .map_err(repo_err)?
        .ok_or_else(|| AppError::not_found("Order not found"))?;

    let order_id = order
        .id
        .clone()
        .ok_or_else(|| AppError::internal("stored order has no id"))?;

    // CAS on the status gates the stock settlement: only the caller that
    // flips Pending -> Paid applies the decrement
    let won = order_repo
        .transition_to_paid(&order_id)
        .await
        .map_err(repo_err)?;

    if !won {
        let current = order_repo
            .find_by_session(&session_id)
            .await
            .map_err(repo_err)?
            .ok_or_else(|| AppError::not_found("Order not found"))?;

        return if current.status == shared::OrderStatus::Paid {
            // Duplicate confirmation: Paid -> Paid is a no-op success
            Ok((
                StatusCode::OK,
                Json(ConfirmPaymentResponse {
                    success: true,
                    message: "Payment already confirmed".to_string(),
                }),
            ))
        } else {
            Err(AppError::conflict("Order was cancelled"))
        };
    }

    let lines: Vec<StockLine> = order
        .items
        .iter()
        .map(|item| StockLine {
            product: item.product.clone(),
            quantity: item.quantity,
        })
        .collect();

    let applied = state.stock.settle(&lines).await.map_err(stock_err)?;

    tracing::info!(
        order = %order_id,
        session = %session_id,
        applied_lines = applied,
        total_lines = lines.len(),
        "Payment confirmed, stock settled"
    );

    Ok((
        StatusCode::OK,
        Json(ConfirmPaymentResponse {
            success: true,
            message: "Payment successful, stock updated".to_string(),
        }),
    ))
}
