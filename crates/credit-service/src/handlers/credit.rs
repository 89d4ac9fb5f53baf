//! 积分变更 API 处理器
//!
//! 充值（支付回调契约）、消费、退款、管理员调整

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::dto::ApiResponse;
use crate::error::Result;
use crate::models::LedgerMetadata;
use crate::state::AppState;

/// 充值请求
///
/// 支付层确认支付后调用；order_id 是幂等键，重复投递将返回 DUPLICATE_ORDER
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RechargeRequest {
    #[validate(length(min = 1, max = 64))]
    pub user_id: String,
    #[validate(range(min = 1, message = "充值数量必须大于0"))]
    pub amount: i64,
    pub order_id: Option<String>,
    #[serde(default)]
    pub description: String,
    /// 本次支付的货币金额（分），仅累计到报表字段
    pub paid_cents: Option<i64>,
}

/// 消费请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ConsumeRequest {
    #[validate(length(min = 1, max = 64))]
    pub user_id: String,
    #[validate(range(min = 1, message = "消费数量必须大于0"))]
    pub amount: i64,
    #[serde(default)]
    pub description: String,
    /// 触发消费的功能标识
    pub feature: Option<String>,
}

/// 退款请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RefundRequest {
    #[validate(length(min = 1, max = 64))]
    pub user_id: String,
    #[validate(range(min = 1, message = "退款数量必须大于0"))]
    pub amount: i64,
    #[validate(length(min = 1, max = 128))]
    pub order_id: String,
    #[serde(default)]
    pub description: String,
}

/// 管理员调整请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AdminAdjustRequest {
    #[validate(length(min = 1, max = 64))]
    pub user_id: String,
    /// 带符号的调整量，不能为 0
    pub delta: i64,
    #[validate(length(min = 1, max = 64))]
    pub admin_id: String,
    #[validate(length(min = 1, message = "调整理由不能为空"))]
    pub reason: String,
}

/// 余额变更响应
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceChangeResponse {
    pub user_id: String,
    pub new_balance: i64,
}

/// 充值入账
pub async fn recharge(
    State(state): State<AppState>,
    Json(request): Json<RechargeRequest>,
) -> Result<Json<ApiResponse<BalanceChangeResponse>>> {
    request.validate()?;

    let new_balance = state
        .ledger_service
        .recharge(
            &request.user_id,
            request.amount,
            request.order_id.as_deref(),
            &request.description,
            None,
            request.paid_cents,
        )
        .await?;

    Ok(Json(ApiResponse::success(BalanceChangeResponse {
        user_id: request.user_id,
        new_balance,
    })))
}

/// 消费扣减
///
/// 余额不足返回 INSUFFICIENT_BALANCE，调用方应拒绝对应功能而非重试
pub async fn consume(
    State(state): State<AppState>,
    Json(request): Json<ConsumeRequest>,
) -> Result<Json<ApiResponse<BalanceChangeResponse>>> {
    request.validate()?;

    let metadata = request
        .feature
        .map(|feature| LedgerMetadata::Usage { feature });

    let new_balance = state
        .ledger_service
        .consume(
            &request.user_id,
            request.amount,
            &request.description,
            metadata,
        )
        .await?;

    Ok(Json(ApiResponse::success(BalanceChangeResponse {
        user_id: request.user_id,
        new_balance,
    })))
}

/// 退款冲销
pub async fn refund(
    State(state): State<AppState>,
    Json(request): Json<RefundRequest>,
) -> Result<Json<ApiResponse<BalanceChangeResponse>>> {
    request.validate()?;

    let new_balance = state
        .ledger_service
        .refund(
            &request.user_id,
            request.amount,
            &request.order_id,
            &request.description,
        )
        .await?;

    Ok(Json(ApiResponse::success(BalanceChangeResponse {
        user_id: request.user_id,
        new_balance,
    })))
}

/// 管理员调整余额
pub async fn admin_adjust(
    State(state): State<AppState>,
    Json(request): Json<AdminAdjustRequest>,
) -> Result<Json<ApiResponse<BalanceChangeResponse>>> {
    request.validate()?;

    let new_balance = state
        .ledger_service
        .admin_adjust(
            &request.user_id,
            request.delta,
            &request.admin_id,
            &request.reason,
        )
        .await?;

    Ok(Json(ApiResponse::success(BalanceChangeResponse {
        user_id: request.user_id,
        new_balance,
    })))
}
