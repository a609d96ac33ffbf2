//! API 路由模块
//!
//! # 结构
//!
//! - [`health`] - 健康检查
//! - [`auth`] - 注册/登录
//! - [`users`] - 用户资料
//! - [`products`] - 商品目录 (读公开，写管理员)
//! - [`cart`] - 购物车
//! - [`orders`] - 订单
//! - [`checkout`] - 托管支付结账

pub mod convert;

pub mod auth;
pub mod cart;
pub mod checkout;
pub mod health;
pub mod orders;
pub mod products;
pub mod users;

// Re-export common types for handlers
pub use crate::utils::{AppResponse, AppResult};

use axum::Router;
use axum::http::{HeaderValue, Method, header};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::core::{Config, ServerState};

/// 组装完整路由：业务路由 + 认证中间件 + CORS + 访问日志
pub fn build_router(state: ServerState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        .merge(health::router())
        .merge(auth::router())
        .merge(users::router())
        .merge(products::router())
        .merge(cart::router())
        .merge(orders::router())
        .merge(checkout::router())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::auth::require_auth,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 浏览器前端的 CORS 白名单 (来自配置)
fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}
