//! 统计报表 API 处理器
//!
//! 只读仪表盘查询，允许读到略微过期的数据

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::dto::ApiResponse;
use crate::error::Result;
use crate::service::dto::{StatsOverview, WindowTotals};
use crate::state::AppState;

/// 时间窗口查询参数
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeWindowParams {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// 系统概览
pub async fn overview(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<StatsOverview>>> {
    let overview = state.report_service.overview().await?;
    Ok(Json(ApiResponse::success(overview)))
}

/// 时间窗口内的充值/消费总量
pub async fn window_totals(
    State(state): State<AppState>,
    Query(params): Query<TimeWindowParams>,
) -> Result<Json<ApiResponse<WindowTotals>>> {
    let totals = state
        .report_service
        .totals_between(params.start, params.end)
        .await?;
    Ok(Json(ApiResponse::success(totals)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_window_params_deserialization() {
        let json = r#"{"start":"2025-01-01T00:00:00Z","end":"2025-02-01T00:00:00Z"}"#;
        let params: TimeWindowParams = serde_json::from_str(json).unwrap();
        assert!(params.start < params.end);
    }
}
