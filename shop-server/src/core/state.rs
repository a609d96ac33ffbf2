use std::sync::Arc;

use surrealdb::Surreal;
use surrealdb::engine::local::Db;

use crate::auth::JwtService;
use crate::core::Config;
use crate::db::DbService;
use crate::payment::{PaymentProvider, StripeClient};
use crate::stock::StockLedger;

/// 服务器状态 - 持有所有服务的共享引用
///
/// ServerState 是后端的核心数据结构，持有所有服务的共享引用。
/// 使用 Arc 实现浅拷贝，所有权成本极低。没有全局单例：
/// 每个组件都通过注入的 state 拿到自己的依赖。
///
/// # 服务组件
///
/// | 字段 | 类型 | 说明 |
/// |------|------|------|
/// | config | Config | 配置项 (不可变) |
/// | db | Surreal<Db> | 嵌入式数据库 |
/// | jwt_service | Arc<JwtService> | JWT 认证服务 |
/// | payment | Arc<dyn PaymentProvider> | 托管支付网关 |
/// | stock | StockLedger | 库存对账 (每商品串行化) |
#[derive(Clone)]
pub struct ServerState {
    /// 服务器配置
    pub config: Config,
    /// 嵌入式数据库 (SurrealDB)
    pub db: Surreal<Db>,
    /// JWT 认证服务 (Arc 共享所有权)
    pub jwt_service: Arc<JwtService>,
    /// 托管支付网关
    pub payment: Arc<dyn PaymentProvider>,
    /// 库存对账组件
    pub stock: StockLedger,
}

impl ServerState {
    /// 创建服务器状态 (手动构造，测试时注入内存数据库和脚本化支付网关)
    pub fn with_parts(
        config: Config,
        db: Surreal<Db>,
        jwt_service: Arc<JwtService>,
        payment: Arc<dyn PaymentProvider>,
    ) -> Self {
        let stock = StockLedger::new(db.clone());
        Self {
            config,
            db,
            jwt_service,
            payment,
            stock,
        }
    }

    /// 初始化服务器状态
    ///
    /// 按顺序初始化：
    /// 1. 工作目录结构
    /// 2. 数据库 (work_dir/database/shop.db)
    /// 3. JWT 服务、支付网关
    ///
    /// # Panics
    ///
    /// 数据库初始化失败时 panic
    pub async fn initialize(config: &Config) -> Self {
        config
            .ensure_work_dir_structure()
            .expect("Failed to create work directory structure");

        let db_path = config.database_dir().join("shop.db");
        let db_service = DbService::new(&db_path.to_string_lossy())
            .await
            .expect("Failed to initialize database");

        let jwt_service = Arc::new(JwtService::with_config(config.jwt.clone()));
        let payment: Arc<dyn PaymentProvider> = Arc::new(StripeClient::new(
            config.stripe_secret_key.clone(),
            &config.client_url,
        ));

        Self::with_parts(config.clone(), db_service.db, jwt_service, payment)
    }

    /// 获取数据库实例
    pub fn get_db(&self) -> Surreal<Db> {
        self.db.clone()
    }

    /// 获取 JWT 服务
    pub fn get_jwt_service(&self) -> Arc<JwtService> {
        self.jwt_service.clone()
    }
}
