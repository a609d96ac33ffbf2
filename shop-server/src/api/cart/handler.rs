//! Cart API Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use validator::Validate;

use crate::api::convert::repo_err;
use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::db::models::{Cart, CartItemView, CartView};
use crate::db::repository::{CartRepository, ProductRepository, record_id};
use crate::utils::{AppError, AppResult};

use shared::AddCartItemRequest;

/// GET /api/cart - 获取购物车 (商品信息物化)
///
/// 首次访问会持久化一个空购物车
pub async fn get(State(state): State<ServerState>, user: CurrentUser) -> AppResult<Json<CartView>> {
    let user_id = record_id("user", &user.id);
    let cart_repo = CartRepository::new(state.get_db());
    let product_repo = ProductRepository::new(state.get_db());

    let cart = cart_repo.get_or_create(&user_id).await.map_err(repo_err)?;

    // Explicit per-line fetches instead of storage-layer population
    let mut items = Vec::with_capacity(cart.items.len());
    for line in &cart.items {
        let product = product_repo
            .find_by_id(&line.product.to_string())
            .await
            .map_err(repo_err)?;
        items.push(CartItemView {
            product_id: line.product.clone(),
            product,
            quantity: line.quantity,
        });
    }

    Ok(Json(CartView {
        id: cart.id,
        user: cart.user,
        items,
    }))
}

/// POST /api/cart - 添加商品到购物车 (数量累加)
pub async fn add_item(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(req): Json<AddCartItemRequest>,
) -> AppResult<Json<Cart>> {
    req.validate()
        .map_err(|e| AppError::validation(e.to_string()))?;

    let product_id = record_id("product", &req.product_id);

    // Reject lines for products that do not exist
    let product_repo = ProductRepository::new(state.get_db());
    if product_repo
        .find_by_id(&req.product_id)
        .await
        .map_err(repo_err)?
        .is_none()
    {
        return Err(AppError::not_found("Product not found"));
    }

    let user_id = record_id("user", &user.id);
    let cart_repo = CartRepository::new(state.get_db());
    let cart = cart_repo
        .add_item(&user_id, product_id, req.quantity)
        .await
        .map_err(repo_err)?;

    Ok(Json(cart))
}

/// DELETE /api/cart/:productId - 从购物车移除商品 (幂等)
pub async fn remove_item(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(product_id): Path<String>,
) -> AppResult<Json<Cart>> {
    let user_id = record_id("user", &user.id);
    let cart_repo = CartRepository::new(state.get_db());
    let cart = cart_repo
        .remove_item(&user_id, &record_id("product", &product_id))
        .await
        .map_err(repo_err)?;

    Ok(Json(cart))
}
