//! 兑换 API 处理器

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use validator::Validate;

use crate::dto::ApiResponse;
use crate::error::Result;
use crate::service::dto::RedeemOutcome;
use crate::state::AppState;

/// 兑换请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RedeemRequest {
    #[validate(length(min = 1, max = 64, message = "兑换码不能为空"))]
    pub code: String,
    #[validate(length(min = 1, max = 64))]
    pub user_id: String,
    /// 展示用的用户标识（昵称/邮箱等）
    #[validate(length(min = 1, max = 128))]
    pub user_identifier: String,
}

/// 兑换一个码
///
/// 成功返回面值与入账后余额；错误码（已兑换/已过期/已领完等）
/// 直接透传给用户界面
pub async fn redeem(
    State(state): State<AppState>,
    Json(request): Json<RedeemRequest>,
) -> Result<Json<ApiResponse<RedeemOutcome>>> {
    request.validate()?;

    let outcome = state
        .redemption_service
        .redeem_code(&request.code, &request.user_id, &request.user_identifier)
        .await?;

    Ok(Json(ApiResponse::success_with_message(
        outcome,
        "兑换成功",
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redeem_request_validation() {
        let request = RedeemRequest {
            code: "WELCOME100".to_string(),
            user_id: "user-123".to_string(),
            user_identifier: "Alice".to_string(),
        };
        assert!(request.validate().is_ok());

        let request = RedeemRequest {
            code: String::new(),
            ..request
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_redeem_request_deserialization() {
        let json = r#"{"code":"WELCOME100","userId":"u1","userIdentifier":"Alice"}"#;
        let request: RedeemRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.code, "WELCOME100");
        assert_eq!(request.user_identifier, "Alice");
    }
}
