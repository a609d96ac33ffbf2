//! Product API Handlers

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Serialize;
use validator::Validate;

use crate::api::convert::repo_err;
use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::db::models::Product;
use crate::db::repository::ProductRepository;
use crate::utils::validation::{
    MAX_DESCRIPTION_LEN, MAX_NAME_LEN, MAX_URL_LEN, validate_optional_text, validate_required_text,
};
use crate::utils::{AppError, AppResult};

use shared::{ProductCreate, ProductUpdate};

/// Response for product deletion
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub message: String,
}

/// GET /api/products - 获取所有商品 (公开)
pub async fn list(State(state): State<ServerState>) -> AppResult<Json<Vec<Product>>> {
    let repo = ProductRepository::new(state.get_db());
    let products = repo.find_all().await.map_err(repo_err)?;
    Ok(Json(products))
}

/// GET /api/products/:id - 获取单个商品 (公开)
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<Product>> {
    let repo = ProductRepository::new(state.get_db());
    let product = repo
        .find_by_id(&id)
        .await
        .map_err(repo_err)?
        .ok_or_else(|| AppError::not_found("Product not found"))?;
    Ok(Json(product))
}

/// POST /api/products - 创建商品 (管理员)
pub async fn create(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(payload): Json<ProductCreate>,
) -> AppResult<(StatusCode, Json<Product>)> {
    user.require_admin()?;
    validate_create(&payload)?;

    let repo = ProductRepository::new(state.get_db());
    let product = repo.create(payload).await.map_err(repo_err)?;

    tracing::info!(
        product = %product.id.as_ref().map(|t| t.to_string()).unwrap_or_default(),
        "Product created"
    );

    Ok((StatusCode::CREATED, Json(product)))
}

/// PUT /api/products/:id - 更新商品 (管理员)
pub async fn update(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(payload): Json<ProductUpdate>,
) -> AppResult<Json<Product>> {
    user.require_admin()?;
    validate_update(&payload)?;

    let repo = ProductRepository::new(state.get_db());
    let product = repo.update(&id, payload).await.map_err(repo_err)?;
    Ok(Json(product))
}

/// DELETE /api/products/:id - 删除商品 (管理员)
pub async fn delete(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<DeleteResponse>> {
    user.require_admin()?;

    let repo = ProductRepository::new(state.get_db());
    repo.delete(&id).await.map_err(repo_err)?;

    tracing::info!(product = %id, "Product deleted");

    Ok(Json(DeleteResponse {
        message: "Product deleted successfully".to_string(),
    }))
}

fn validate_create(payload: &ProductCreate) -> AppResult<()> {
    payload
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;
    validate_required_text(&payload.name, "name", MAX_NAME_LEN)?;
    validate_required_text(&payload.category, "category", MAX_NAME_LEN)?;
    validate_required_text(&payload.description, "description", MAX_DESCRIPTION_LEN)?;
    validate_required_text(&payload.image, "image", MAX_URL_LEN)?;
    if payload.price.is_sign_negative() {
        return Err(AppError::validation("price must not be negative"));
    }
    Ok(())
}

fn validate_update(payload: &ProductUpdate) -> AppResult<()> {
    validate_optional_text(&payload.name, "name", MAX_NAME_LEN)?;
    validate_optional_text(&payload.category, "category", MAX_NAME_LEN)?;
    validate_optional_text(&payload.description, "description", MAX_DESCRIPTION_LEN)?;
    validate_optional_text(&payload.image, "image", MAX_URL_LEN)?;
    if let Some(name) = &payload.name
        && name.trim().is_empty()
    {
        return Err(AppError::validation("name must not be empty"));
    }
    if let Some(price) = payload.price
        && price.is_sign_negative()
    {
        return Err(AppError::validation("price must not be negative"));
    }
    Ok(())
}
