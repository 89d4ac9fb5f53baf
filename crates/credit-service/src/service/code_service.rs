//! 兑换码登记簿服务
//!
//! 负责码的生命周期管理：创建、批量生成、更新、删除。
//! 码值使用剔除易混淆字符的字母表随机生成，碰撞时有界重试。

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use sqlx::PgPool;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::{CreditError, Result};
use crate::models::RedemptionCode;
use crate::repository::{RedemptionCodeRepository, RedemptionRecordRepository};
use crate::service::dto::{
    BatchCreateOutcome, BatchCreateParams, CreateCodeParams, UpdateCodeParams,
};

/// 码值字母表：大写字母 + 数字，剔除易混淆的 0/O、1/I/L
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// 生成码长度
const CODE_LENGTH: usize = 12;

/// 单个码值的碰撞重试上限
const MAX_GENERATION_ATTEMPTS: usize = 10;

/// 单批次生成数量上限
const MAX_BATCH_COUNT: i64 = 1000;

/// 兑换码服务
pub struct CodeService {
    code_repo: Arc<RedemptionCodeRepository>,
    pool: PgPool,
}

impl CodeService {
    pub fn new(code_repo: Arc<RedemptionCodeRepository>, pool: PgPool) -> Self {
        Self { code_repo, pool }
    }

    /// 创建兑换码
    ///
    /// 指定 custom_code 时码值已被占用返回 CodeAlreadyExists；
    /// 随机生成时碰撞重试至多 MAX_GENERATION_ATTEMPTS 次。
    #[instrument(skip(self, params), fields(created_by = %params.created_by))]
    pub async fn create_code(&self, params: CreateCodeParams) -> Result<RedemptionCode> {
        Self::validate_code_params(params.credit_amount, params.max_uses)?;

        if let Some(custom) = &params.custom_code {
            let code = custom.trim().to_uppercase();
            if code.is_empty() {
                return Err(CreditError::Validation("自定义码值不能为空".to_string()));
            }
            let created = self.code_repo.insert(&self.build_code(code, &params)).await?;
            info!(code = %created.code, "兑换码创建成功");
            return Ok(created);
        }

        // 随机生成：依赖码值唯一约束探测碰撞，逐次重试
        for _ in 0..MAX_GENERATION_ATTEMPTS {
            let candidate = generate_code(CODE_LENGTH);
            match self
                .code_repo
                .insert(&self.build_code(candidate, &params))
                .await
            {
                Ok(created) => {
                    info!(code = %created.code, "兑换码创建成功");
                    return Ok(created);
                }
                Err(CreditError::CodeAlreadyExists(_)) => continue,
                Err(e) => return Err(e),
            }
        }

        Err(CreditError::CodeGenerationExhausted)
    }

    /// 批量生成兑换码
    ///
    /// 先一次性加载已存在码值快照，候选码只在内存中对照
    /// 快照与本批已生成集合查重，最后单条语句批量落库，
    /// 避免每个候选一次数据库往返。
    #[instrument(skip(self, params), fields(count = %params.count, created_by = %params.created_by))]
    pub async fn batch_create(&self, params: BatchCreateParams) -> Result<BatchCreateOutcome> {
        if params.count < 1 || params.count > MAX_BATCH_COUNT {
            return Err(CreditError::Validation(format!(
                "批量生成数量必须在 1..={} 之间: {}",
                MAX_BATCH_COUNT, params.count
            )));
        }
        Self::validate_code_params(params.credit_amount, params.max_uses)?;

        let existing: HashSet<String> = self.code_repo.all_codes().await?.into_iter().collect();
        let batch_id = Uuid::new_v4();

        let mut generated: HashSet<String> = HashSet::with_capacity(params.count as usize);
        let mut rows = Vec::with_capacity(params.count as usize);

        for _ in 0..params.count {
            let mut candidate = None;
            for _ in 0..MAX_GENERATION_ATTEMPTS {
                let code = generate_code(CODE_LENGTH);
                if !existing.contains(&code) && !generated.contains(&code) {
                    candidate = Some(code);
                    break;
                }
            }
            let code = candidate.ok_or(CreditError::CodeGenerationExhausted)?;
            generated.insert(code.clone());

            rows.push(RedemptionCode {
                id: 0,
                code,
                credit_amount: params.credit_amount,
                max_uses: params.max_uses,
                used_count: 0,
                expires_at: params.expires_at,
                is_active: true,
                description: params.description.clone().unwrap_or_default(),
                batch_id: Some(batch_id),
                created_by: params.created_by.clone(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            });
        }

        let mut tx = self.pool.begin().await?;
        let codes = RedemptionCodeRepository::insert_batch(&mut tx, &rows).await?;
        tx.commit().await?;

        info!(batch_id = %batch_id, count = codes.len(), "批量生成兑换码完成");

        Ok(BatchCreateOutcome { batch_id, codes })
    }

    /// 更新兑换码
    ///
    /// max_uses 不允许调到已使用次数以下。校验与更新在同一事务内
    /// 基于 FOR UPDATE 锁定的行执行，并发兑换推高 used_count 不会
    /// 绕过校验去触发表上的 CHECK 约束。
    #[instrument(skip(self, params), fields(id = %id))]
    pub async fn update_code(&self, id: i64, params: UpdateCodeParams) -> Result<RedemptionCode> {
        let mut tx = self.pool.begin().await?;

        let existing = RedemptionCodeRepository::get_by_id_for_update_in_tx(&mut tx, id)
            .await?
            .ok_or_else(|| CreditError::CodeNotFound(id.to_string()))?;

        if let Some(max_uses) = params.max_uses {
            Self::validate_max_uses_update(max_uses, existing.used_count)?;
        }

        let updated = RedemptionCodeRepository::update_in_tx(
            &mut tx,
            id,
            params.is_active,
            params.description,
            params.max_uses,
            params.expires_at,
        )
        .await?
        .ok_or_else(|| CreditError::CodeNotFound(id.to_string()))?;

        tx.commit().await?;

        info!(code = %updated.code, "兑换码更新成功");

        Ok(updated)
    }

    /// 删除兑换码
    ///
    /// 关联兑换记录在同一事务内显式级联删除（硬删除，非软删除）
    #[instrument(skip(self), fields(id = %id))]
    pub async fn delete_code(&self, id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let removed_records =
            RedemptionRecordRepository::delete_by_code_in_tx(&mut tx, id).await?;
        let deleted = RedemptionCodeRepository::delete_in_tx(&mut tx, id).await?;

        if !deleted {
            return Err(CreditError::CodeNotFound(id.to_string()));
        }

        tx.commit().await?;

        info!(id = id, removed_records = removed_records, "兑换码及关联记录已删除");

        Ok(())
    }

    /// 按 ID 获取兑换码
    pub async fn get_code(&self, id: i64) -> Result<RedemptionCode> {
        self.code_repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| CreditError::CodeNotFound(id.to_string()))
    }

    /// 分页列出兑换码
    pub async fn list_codes(
        &self,
        batch_id: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<RedemptionCode>, i64)> {
        let codes = self.code_repo.list(batch_id, limit, offset).await?;
        let total = self.code_repo.count(batch_id).await?;
        Ok((codes, total))
    }

    /// max_uses 调整的下界校验：不低于 1，且不低于已使用次数
    fn validate_max_uses_update(max_uses: i32, used_count: i32) -> Result<()> {
        if max_uses < 1 {
            return Err(CreditError::Validation(format!(
                "可用次数必须 >= 1: {}",
                max_uses
            )));
        }
        if max_uses < used_count {
            return Err(CreditError::Validation(format!(
                "可用次数不能低于已使用次数: max_uses={}, used_count={}",
                max_uses, used_count
            )));
        }
        Ok(())
    }

    fn validate_code_params(credit_amount: i64, max_uses: i32) -> Result<()> {
        if credit_amount <= 0 {
            return Err(CreditError::Validation(format!(
                "积分面值必须为正数: {}",
                credit_amount
            )));
        }
        if max_uses < 1 {
            return Err(CreditError::Validation(format!(
                "可用次数必须 >= 1: {}",
                max_uses
            )));
        }
        Ok(())
    }

    fn build_code(&self, code: String, params: &CreateCodeParams) -> RedemptionCode {
        RedemptionCode {
            id: 0,
            code,
            credit_amount: params.credit_amount,
            max_uses: params.max_uses,
            used_count: 0,
            expires_at: params.expires_at,
            is_active: true,
            description: params.description.clone().unwrap_or_default(),
            batch_id: None,
            created_by: params.created_by.clone(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}

/// 生成随机码值
fn generate_code(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| {
            let idx = rng.random_range(0..CODE_ALPHABET.len());
            CODE_ALPHABET[idx] as char
        })
        .collect()
}
