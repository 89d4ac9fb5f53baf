//! 积分账本与兑换服务入口

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::signal;
use tracing::info;

use credit_ledger::repository::{
    AccountRepository, LedgerRepository, RedemptionCodeRepository, RedemptionRecordRepository,
};
use credit_ledger::routes::build_router;
use credit_ledger::service::{CodeService, LedgerService, RedemptionService, ReportService};
use credit_ledger::state::AppState;
use credit_shared::{cache::Cache, config::AppConfig, database::Database, observability};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. 加载配置
    let config = AppConfig::load("credit-ledger-service").unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {}", e);
        AppConfig::default()
    });

    // 2. 初始化日志
    observability::init(&config.observability)?;

    info!("Starting credit-ledger-service...");
    info!(environment = %config.environment, "Configuration loaded");

    // 3. 初始化数据库连接并运行迁移
    let db = Database::connect(&config.database).await?;
    let pool = db.pool().clone();
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database connection established, migrations applied");

    // 4. 初始化 Redis 缓存
    let cache = Arc::new(Cache::new(&config.redis)?);
    cache.health_check().await?;
    info!("Redis connection established");

    // 5. 创建仓储
    let account_repo = Arc::new(AccountRepository::new(pool.clone()));
    let ledger_repo = Arc::new(LedgerRepository::new(pool.clone()));
    let code_repo = Arc::new(RedemptionCodeRepository::new(pool.clone()));
    let record_repo = Arc::new(RedemptionRecordRepository::new(pool.clone()));
    info!("Repositories initialized");

    // 6. 创建服务
    let balance_ttl = Duration::from_secs(config.redis.balance_ttl_seconds);
    let ledger_service = Arc::new(LedgerService::new(
        account_repo.clone(),
        cache.clone(),
        pool.clone(),
        balance_ttl,
    ));
    let code_service = Arc::new(CodeService::new(code_repo.clone(), pool.clone()));
    let redemption_service = Arc::new(RedemptionService::new(
        code_repo.clone(),
        record_repo.clone(),
        ledger_service.clone(),
        pool.clone(),
    ));
    let report_service = Arc::new(ReportService::new(
        account_repo,
        ledger_repo,
        code_repo,
        record_repo,
        pool.clone(),
    ));
    info!("Services initialized");

    // 7. 组装路由并启动
    let state = AppState {
        pool,
        cache,
        ledger_service,
        code_service,
        redemption_service,
        report_service,
        initial_grant: config.initial_grant.clone(),
    };
    let router = build_router(state);

    let addr = config.server_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "credit-ledger-service listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("credit-ledger-service stopped");

    Ok(())
}

/// 等待终止信号（Ctrl+C 或 SIGTERM）
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to listen for ctrl_c");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
