//! Order API Handlers

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use validator::Validate;

use crate::api::convert::{repo_err, stock_err};
use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::db::models::{Order, OrderItem, OrderItemView, OrderView};
use crate::db::repository::{OrderRepository, ProductRepository, record_id};
use crate::stock::StockLine;
use crate::utils::{AppError, AppResult};

use shared::{CreateOrderRequest, OrderStatus, UpdateOrderStatusRequest};

/// GET /api/orders - 当前用户订单，最新在前
pub async fn list(
    State(state): State<ServerState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<OrderView>>> {
    let repo = OrderRepository::new(state.get_db());
    let orders = repo
        .find_by_user(&record_id("user", &user.id))
        .await
        .map_err(repo_err)?;

    let views = materialize(&state, orders).await?;
    Ok(Json(views))
}

/// GET /api/orders/all - 全部订单 (管理员)
pub async fn list_all(
    State(state): State<ServerState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<OrderView>>> {
    user.require_admin()?;

    let repo = OrderRepository::new(state.get_db());
    let orders = repo.find_all().await.map_err(repo_err)?;

    let views = materialize(&state, orders).await?;
    Ok(Json(views))
}

/// POST /api/orders - 直接下单
///
/// 库存在创建时保留 (全有或全无)；总价始终由服务端按当前价格计算。
pub async fn create(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(req): Json<CreateOrderRequest>,
) -> AppResult<(StatusCode, Json<Order>)> {
    if req.items.is_empty() {
        return Err(AppError::validation("Order must contain items"));
    }
    req.validate()
        .map_err(|e| AppError::validation(e.to_string()))?;

    let product_repo = ProductRepository::new(state.get_db());

    // Resolve every product up front: price snapshot for the total
    let mut total = Decimal::ZERO;
    let mut items = Vec::with_capacity(req.items.len());
    let mut lines = Vec::with_capacity(req.items.len());
    for input in &req.items {
        let product = product_repo
            .find_by_id(&input.product_id)
            .await
            .map_err(repo_err)?
            .ok_or_else(|| {
                AppError::not_found(format!("Product not found: {}", input.product_id))
            })?;

        total += product.price * Decimal::from(input.quantity);

        let product_id = record_id("product", &input.product_id);
        items.push(OrderItem {
            product: product_id.clone(),
            quantity: input.quantity,
        });
        lines.push(StockLine {
            product: product_id,
            quantity: input.quantity,
        });
    }

    // All-or-nothing stock reservation; on failure nothing was decremented
    state.stock.reserve(&lines).await.map_err(stock_err)?;

    let order_repo = OrderRepository::new(state.get_db());
    let order = order_repo
        .create(record_id("user", &user.id), items, total, None, true)
        .await
        .map_err(repo_err)?;

    tracing::info!(
        order = %order.id.as_ref().map(|t| t.to_string()).unwrap_or_default(),
        user = %user.id,
        "Order created"
    );

    Ok((StatusCode::CREATED, Json(order)))
}

/// PUT /api/orders/:id - 更新订单状态 (管理员)
///
/// 状态机只允许 `Pending -> Cancelled`；`Paid` 只能通过支付确认到达。
pub async fn update_status(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(order_id): Path<String>,
    Json(req): Json<UpdateOrderStatusRequest>,
) -> AppResult<Json<Order>> {
    user.require_admin()?;

    let Some(requested) = req.status else {
        return Err(AppError::validation("Order status is required."));
    };

    let repo = OrderRepository::new(state.get_db());
    let order = repo
        .find_by_id(&order_id)
        .await
        .map_err(repo_err)?
        .ok_or_else(|| AppError::not_found("Order not found."))?;

    if order.status == requested {
        // No-change update is a no-op
        return Ok(Json(order));
    }

    if order.status.is_terminal() {
        return Err(AppError::conflict(format!(
            "Order is already {} and cannot change status",
            order.status
        )));
    }

    match requested {
        OrderStatus::Cancelled => {
            let id = order
                .id
                .clone()
                .ok_or_else(|| AppError::internal("stored order has no id"))?;
            if !repo
                .transition_to_cancelled(&id)
                .await
                .map_err(repo_err)?
            {
                return Err(AppError::conflict("Order status already changed"));
            }
        }
        OrderStatus::Paid => {
            return Err(AppError::conflict(
                "Orders become Paid through payment confirmation only",
            ));
        }
        OrderStatus::Pending => {
            return Err(AppError::conflict("Order cannot return to Pending"));
        }
    }

    let updated = repo
        .find_by_id(&order_id)
        .await
        .map_err(repo_err)?
        .ok_or_else(|| AppError::not_found("Order not found."))?;

    tracing::info!(order = %order_id, status = %updated.status, "Order status updated");

    Ok(Json(updated))
}

/// Fetch referenced products explicitly and build materialized views
async fn materialize(state: &ServerState, orders: Vec<Order>) -> AppResult<Vec<OrderView>> {
    let product_repo = ProductRepository::new(state.get_db());

    let mut views = Vec::with_capacity(orders.len());
    for order in orders {
        let mut items = Vec::with_capacity(order.items.len());
        for line in &order.items {
            let product = product_repo
                .find_by_id(&line.product.to_string())
                .await
                .map_err(repo_err)?;
            items.push(OrderItemView {
                product_id: line.product.clone(),
                product,
                quantity: line.quantity,
            });
        }
        views.push(OrderView {
            id: order.id,
            user: order.user,
            items,
            total_amount: order.total_amount,
            status: order.status,
            session_id: order.session_id,
            created_at: order.created_at,
        });
    }
    Ok(views)
}
