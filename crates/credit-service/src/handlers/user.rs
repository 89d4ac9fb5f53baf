//! 用户账户 API 处理器
//!
//! 注册（含赠送积分）、余额查询、流水查询、对账

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use crate::dto::{ApiResponse, PageResponse, PaginationParams};
use crate::error::Result;
use crate::models::LedgerEntry;
use crate::service::dto::ReconciliationReport;
use crate::state::AppState;

/// 注册请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[validate(length(min = 1, max = 64, message = "用户 ID 长度必须在 1-64 之间"))]
    pub user_id: String,
}

/// 注册响应
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupResponse {
    pub user_id: String,
    pub balance: i64,
    /// 注册赠送的积分数量（未开启赠送时为 0）
    pub granted: i64,
}

/// 余额响应
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub user_id: String,
    pub balance: i64,
}

/// 注册新账户
///
/// 创建账户后按注入的配置执行注册赠送（如开启）
pub async fn signup(
    State(state): State<AppState>,
    Json(request): Json<SignupRequest>,
) -> Result<Json<ApiResponse<SignupResponse>>> {
    request.validate()?;

    let account = state
        .ledger_service
        .register_account(&request.user_id)
        .await?;

    let granted_balance = state
        .ledger_service
        .grant_initial_credit(&request.user_id, &state.initial_grant)
        .await?;

    info!(user_id = %request.user_id, granted = granted_balance.is_some(), "新账户注册完成");

    let response = SignupResponse {
        user_id: account.user_id,
        balance: granted_balance.unwrap_or(account.credit_balance),
        granted: if granted_balance.is_some() {
            state.initial_grant.amount
        } else {
            0
        },
    };

    Ok(Json(ApiResponse::success(response)))
}

/// 查询余额
pub async fn get_balance(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<BalanceResponse>>> {
    let balance = state.ledger_service.get_balance(&user_id).await?;

    Ok(Json(ApiResponse::success(BalanceResponse {
        user_id,
        balance,
    })))
}

/// 分页查询用户流水
pub async fn list_transactions(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(pagination): Query<PaginationParams>,
) -> Result<Json<ApiResponse<PageResponse<LedgerEntry>>>> {
    let (entries, total) = state
        .report_service
        .user_transactions(&user_id, pagination.limit(), pagination.offset())
        .await?;

    Ok(Json(ApiResponse::success(PageResponse::new(
        entries,
        total,
        pagination.page,
        pagination.limit(),
    ))))
}

/// 单用户对账
pub async fn reconcile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<ReconciliationReport>>> {
    let report = state.report_service.reconcile_user(&user_id).await?;
    Ok(Json(ApiResponse::success(report)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signup_request_validation() {
        let request = SignupRequest {
            user_id: "user-123".to_string(),
        };
        assert!(request.validate().is_ok());

        let request = SignupRequest {
            user_id: String::new(),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_signup_response_serialization() {
        let response = SignupResponse {
            user_id: "user-123".to_string(),
            balance: 50,
            granted: 50,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["userId"], "user-123");
        assert_eq!(json["granted"], 50);
    }
}
