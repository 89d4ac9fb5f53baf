//! 应用状态定义
//!
//! 包含 Axum 路由共享的应用状态

use std::sync::Arc;

use credit_shared::cache::Cache;
use credit_shared::config::InitialGrantConfig;
use sqlx::PgPool;

use crate::service::{AppReportService, CodeService, LedgerService, RedemptionService};

/// Axum 应用共享状态
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub cache: Arc<Cache>,
    pub ledger_service: Arc<LedgerService>,
    pub code_service: Arc<CodeService>,
    pub redemption_service: Arc<RedemptionService>,
    pub report_service: Arc<AppReportService>,
    /// 注册赠送配置，显式注入到注册流程
    pub initial_grant: InitialGrantConfig,
}
