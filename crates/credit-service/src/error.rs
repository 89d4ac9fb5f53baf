//! 积分服务错误类型
//!
//! 定义服务层的业务错误和系统错误，并提供 HTTP 响应转换

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// 积分服务错误类型
#[derive(Debug, Error)]
pub enum CreditError {
    // === 账户相关错误 ===
    #[error("用户不存在: {0}")]
    UserNotFound(String),

    #[error("用户已存在: {0}")]
    UserAlreadyExists(String),

    #[error("积分余额不足: 需要 {required}, 可用 {available}")]
    InsufficientBalance { required: i64, available: i64 },

    #[error("重复的充值订单: order_id={0}")]
    DuplicateOrder(String),

    // === 兑换码相关错误 ===
    #[error("兑换码不存在: {0}")]
    CodeNotFound(String),

    #[error("兑换码已停用: {0}")]
    CodeInactive(String),

    #[error("兑换码已过期: {0}")]
    CodeExpired(String),

    #[error("兑换码已被领完: {0}")]
    CodeExhausted(String),

    #[error("该兑换码已被此用户使用: code={code}, user_id={user_id}")]
    AlreadyRedeemed { code: String, user_id: String },

    #[error("兑换码已存在: {0}")]
    CodeAlreadyExists(String),

    #[error("兑换码生成失败：重试次数耗尽")]
    CodeGenerationExhausted,

    // === 系统错误 ===
    #[error("数据库错误: {0}")]
    Database(sqlx::Error),

    #[error("JSON 序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Redis 错误: {0}")]
    Redis(String),

    #[error("内部错误: {0}")]
    Internal(String),

    #[error("参数校验失败: {0}")]
    Validation(String),

    #[error("并发冲突，请重试")]
    ConcurrencyConflict,
}

/// 积分服务 Result 类型别名
pub type Result<T> = std::result::Result<T, CreditError>;

impl CreditError {
    /// 检查是否为可重试的错误
    ///
    /// 只有天然幂等的操作（如兑换）才允许调用方盲目重试；
    /// 充值/消费重试前必须先按幂等键查重。
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::Redis(_) | Self::ConcurrencyConflict
        )
    }

    /// 检查是否为业务错误（非系统错误）
    pub fn is_business_error(&self) -> bool {
        !matches!(
            self,
            Self::Database(_)
                | Self::Serialization(_)
                | Self::Redis(_)
                | Self::Internal(_)
                | Self::ConcurrencyConflict
        )
    }

    /// 获取错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UserNotFound(_) => "USER_NOT_FOUND",
            Self::UserAlreadyExists(_) => "USER_ALREADY_EXISTS",
            Self::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            Self::DuplicateOrder(_) => "DUPLICATE_ORDER",
            Self::CodeNotFound(_) => "CODE_NOT_FOUND",
            Self::CodeInactive(_) => "CODE_INACTIVE",
            Self::CodeExpired(_) => "CODE_EXPIRED",
            Self::CodeExhausted(_) => "CODE_EXHAUSTED",
            Self::AlreadyRedeemed { .. } => "ALREADY_REDEEMED",
            Self::CodeAlreadyExists(_) => "CODE_ALREADY_EXISTS",
            Self::CodeGenerationExhausted => "CODE_GENERATION_EXHAUSTED",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Redis(_) => "REDIS_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::ConcurrencyConflict => "CONCURRENCY_CONFLICT",
        }
    }

    /// 返回对应的 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::UserNotFound(_) | Self::CodeNotFound(_) => StatusCode::NOT_FOUND,

            Self::Validation(_) => StatusCode::BAD_REQUEST,

            Self::UserAlreadyExists(_)
            | Self::InsufficientBalance { .. }
            | Self::DuplicateOrder(_)
            | Self::CodeInactive(_)
            | Self::CodeExpired(_)
            | Self::CodeExhausted(_)
            | Self::AlreadyRedeemed { .. }
            | Self::CodeAlreadyExists(_)
            | Self::ConcurrencyConflict => StatusCode::CONFLICT,

            Self::CodeGenerationExhausted
            | Self::Database(_)
            | Self::Serialization(_)
            | Self::Redis(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for CreditError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 系统级错误只返回通用提示，详细信息仅记录日志，防止信息泄露
        let message = match &self {
            Self::Database(e) => {
                tracing::error!(error = %e, "数据库操作失败");
                "服务内部错误，请稍后重试".to_string()
            }
            Self::Redis(e) => {
                tracing::error!(error = %e, "Redis 操作失败");
                "服务内部错误，请稍后重试".to_string()
            }
            Self::Internal(e) => {
                tracing::error!(error = %e, "内部错误");
                "服务内部错误，请稍后重试".to_string()
            }
            other => other.to_string(),
        };

        let body = json!({
            "success": false,
            "code": self.error_code(),
            "message": message,
            "data": serde_json::Value::Null
        });

        (status, axum::Json(body)).into_response()
    }
}

/// 从 sqlx 错误转换
///
/// Postgres 的序列化失败（40001）和死锁（40P01）对调用方而言是
/// 可重试的并发冲突，统一映射为 [`CreditError::ConcurrencyConflict`]。
impl From<sqlx::Error> for CreditError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if let Some(code) = db_err.code() {
                if code == "40001" || code == "40P01" {
                    return Self::ConcurrencyConflict;
                }
            }
        }
        Self::Database(err)
    }
}

/// 从 validator 错误转换
impl From<validator::ValidationErrors> for CreditError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

/// 从共享库错误转换
impl From<credit_shared::error::SharedError> for CreditError {
    fn from(err: credit_shared::error::SharedError) -> Self {
        use credit_shared::error::SharedError;
        match err {
            SharedError::Database(e) => Self::from(e),
            SharedError::Redis(e) => Self::Redis(e.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}
