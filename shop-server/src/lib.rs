//! Shop Server - 电商后端服务
//!
//! # 架构概述
//!
//! - **HTTP API** (`api`): RESTful API 接口 (认证、商品、购物车、订单、结账)
//! - **数据库** (`db`): 嵌入式 SurrealDB 存储，模型 + 仓储
//! - **认证** (`auth`): JWT + Argon2 认证体系
//! - **库存对账** (`stock`): 订单/库存一致性核心
//! - **支付桥接** (`payment`): 托管支付会话的创建与确认
//!
//! # 模块结构
//!
//! ```text
//! shop-server/src/
//! ├── core/          # 配置、状态、服务器
//! ├── auth/          # JWT 认证
//! ├── api/           # HTTP 路由和处理器
//! ├── db/            # 数据库层 (模型 + 仓储)
//! ├── stock/         # 库存对账核心
//! ├── payment/       # 支付网关桥接
//! └── utils/         # 错误、日志、校验
//! ```

pub mod api;
pub mod auth;
pub mod core;
pub mod db;
pub mod payment;
pub mod stock;
pub mod utils;

// Re-export 公共类型
pub use auth::{CurrentUser, JwtService};
pub use core::{Config, Server, ServerState};
pub use stock::{StockLedger, StockLine};
pub use utils::{AppError, AppResult};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};
