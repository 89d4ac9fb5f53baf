//! 健康检查处理器

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use crate::state::AppState;

/// 健康检查
///
/// 数据库或 Redis 不可用时返回 503
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let db_ok = sqlx::query("SELECT 1").execute(&state.pool).await.is_ok();
    let redis_ok = state.cache.health_check().await.is_ok();

    let status = if db_ok && redis_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = json!({
        "status": if db_ok && redis_ok { "ok" } else { "degraded" },
        "database": db_ok,
        "redis": redis_ok,
    });

    (status, Json(body))
}
