//! 兑换码管理 API 处理器
//!
//! 面向管理后台：创建、批量生成、查询、更新、删除，以及兑换记录查询

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::dto::{ApiResponse, PageResponse, PaginationParams};
use crate::error::Result;
use crate::models::{RedemptionCode, RedemptionRecord};
use crate::service::dto::{
    BatchCreateOutcome, BatchCreateParams, CreateCodeParams, UpdateCodeParams,
};
use crate::state::AppState;

/// 创建兑换码请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCodeRequest {
    #[validate(range(min = 1, message = "积分面值必须大于0"))]
    pub credit_amount: i64,
    #[validate(range(min = 1, message = "可用次数必须大于0"))]
    pub max_uses: i32,
    pub expires_at: Option<DateTime<Utc>>,
    pub description: Option<String>,
    /// 指定码值；为空时随机生成
    pub custom_code: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub created_by: String,
}

/// 批量生成请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BatchCreateRequest {
    #[validate(range(min = 1, max = 1000, message = "批量生成数量必须在1-1000之间"))]
    pub count: i64,
    #[validate(range(min = 1, message = "积分面值必须大于0"))]
    pub credit_amount: i64,
    #[validate(range(min = 1, message = "可用次数必须大于0"))]
    pub max_uses: i32,
    pub expires_at: Option<DateTime<Utc>>,
    pub description: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub created_by: String,
}

/// 更新兑换码请求
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCodeRequest {
    pub is_active: Option<bool>,
    pub description: Option<String>,
    pub max_uses: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// 兑换码列表过滤参数
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeListFilter {
    pub batch_id: Option<Uuid>,
}

/// 创建兑换码
pub async fn create_code(
    State(state): State<AppState>,
    Json(request): Json<CreateCodeRequest>,
) -> Result<Json<ApiResponse<RedemptionCode>>> {
    request.validate()?;

    let code = state
        .code_service
        .create_code(CreateCodeParams {
            credit_amount: request.credit_amount,
            max_uses: request.max_uses,
            expires_at: request.expires_at,
            description: request.description,
            custom_code: request.custom_code,
            created_by: request.created_by,
        })
        .await?;

    Ok(Json(ApiResponse::success(code)))
}

/// 批量生成兑换码
pub async fn batch_create(
    State(state): State<AppState>,
    Json(request): Json<BatchCreateRequest>,
) -> Result<Json<ApiResponse<BatchCreateOutcome>>> {
    request.validate()?;

    let outcome = state
        .code_service
        .batch_create(BatchCreateParams {
            count: request.count,
            credit_amount: request.credit_amount,
            max_uses: request.max_uses,
            expires_at: request.expires_at,
            description: request.description,
            created_by: request.created_by,
        })
        .await?;

    Ok(Json(ApiResponse::success(outcome)))
}

/// 分页列出兑换码
pub async fn list_codes(
    State(state): State<AppState>,
    Query(filter): Query<CodeListFilter>,
    Query(pagination): Query<PaginationParams>,
) -> Result<Json<ApiResponse<PageResponse<RedemptionCode>>>> {
    let (codes, total) = state
        .code_service
        .list_codes(filter.batch_id, pagination.limit(), pagination.offset())
        .await?;

    Ok(Json(ApiResponse::success(PageResponse::new(
        codes,
        total,
        pagination.page,
        pagination.limit(),
    ))))
}

/// 获取兑换码详情
pub async fn get_code(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<RedemptionCode>>> {
    let code = state.code_service.get_code(id).await?;
    Ok(Json(ApiResponse::success(code)))
}

/// 更新兑换码
pub async fn update_code(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateCodeRequest>,
) -> Result<Json<ApiResponse<RedemptionCode>>> {
    let code = state
        .code_service
        .update_code(
            id,
            UpdateCodeParams {
                is_active: request.is_active,
                description: request.description,
                max_uses: request.max_uses,
                expires_at: request.expires_at,
            },
        )
        .await?;

    Ok(Json(ApiResponse::success(code)))
}

/// 删除兑换码（级联删除关联兑换记录）
pub async fn delete_code(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<()>>> {
    state.code_service.delete_code(id).await?;
    Ok(Json(ApiResponse::success_empty()))
}

/// 分页列出某个码的兑换记录
pub async fn list_code_records(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(pagination): Query<PaginationParams>,
) -> Result<Json<ApiResponse<PageResponse<RedemptionRecord>>>> {
    let (records, total) = state
        .report_service
        .code_records(id, pagination.limit(), pagination.offset())
        .await?;

    Ok(Json(ApiResponse::success(PageResponse::new(
        records,
        total,
        pagination.page,
        pagination.limit(),
    ))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_create_request_count_range() {
        let request = BatchCreateRequest {
            count: 10,
            credit_amount: 100,
            max_uses: 1,
            expires_at: None,
            description: None,
            created_by: "admin-1".to_string(),
        };
        assert!(request.validate().is_ok());

        let request = BatchCreateRequest {
            count: 1001,
            ..request
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_create_code_request_deserialization() {
        let json = r#"{"creditAmount":100,"maxUses":1,"customCode":"WELCOME100","createdBy":"admin-1"}"#;
        let request: CreateCodeRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.credit_amount, 100);
        assert_eq!(request.custom_code.as_deref(), Some("WELCOME100"));
        assert!(request.expires_at.is_none());
    }
}
