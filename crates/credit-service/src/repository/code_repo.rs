//! 兑换码仓储

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, QueryBuilder, Row};
use uuid::Uuid;

use crate::error::{CreditError, Result};
use crate::models::RedemptionCode;

/// 兑换码仓储
pub struct RedemptionCodeRepository {
    pool: PgPool,
}

impl RedemptionCodeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 插入兑换码
    ///
    /// 码值唯一冲突转换为 CodeAlreadyExists
    pub async fn insert(&self, code: &RedemptionCode) -> Result<RedemptionCode> {
        let created = sqlx::query_as::<_, RedemptionCode>(
            r#"
            INSERT INTO redemption_codes
                (code, credit_amount, max_uses, expires_at, is_active, description, batch_id, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, code, credit_amount, max_uses, used_count, expires_at,
                      is_active, description, batch_id, created_by, created_at, updated_at
            "#,
        )
        .bind(&code.code)
        .bind(code.credit_amount)
        .bind(code.max_uses)
        .bind(code.expires_at)
        .bind(code.is_active)
        .bind(&code.description)
        .bind(code.batch_id)
        .bind(&code.created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                CreditError::CodeAlreadyExists(code.code.clone())
            }
            _ => CreditError::from(e),
        })?;

        Ok(created)
    }

    /// 批量插入兑换码（单条语句）
    ///
    /// 候选码已在内存中查重，这里一次性写入并返回完整行。
    pub async fn insert_batch(
        tx: &mut PgConnection,
        codes: &[RedemptionCode],
    ) -> Result<Vec<RedemptionCode>> {
        if codes.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            "INSERT INTO redemption_codes \
             (code, credit_amount, max_uses, expires_at, is_active, description, batch_id, created_by) ",
        );

        builder.push_values(codes, |mut b, code| {
            b.push_bind(&code.code)
                .push_bind(code.credit_amount)
                .push_bind(code.max_uses)
                .push_bind(code.expires_at)
                .push_bind(code.is_active)
                .push_bind(&code.description)
                .push_bind(code.batch_id)
                .push_bind(&code.created_by);
        });

        builder.push(
            " RETURNING id, code, credit_amount, max_uses, used_count, expires_at, \
             is_active, description, batch_id, created_by, created_at, updated_at",
        );

        let inserted = builder
            .build_query_as::<RedemptionCode>()
            .fetch_all(tx)
            .await?;

        Ok(inserted)
    }

    /// 按码值获取兑换码
    pub async fn get_by_code(&self, code: &str) -> Result<Option<RedemptionCode>> {
        let found = sqlx::query_as::<_, RedemptionCode>(
            r#"
            SELECT id, code, credit_amount, max_uses, used_count, expires_at,
                   is_active, description, batch_id, created_by, created_at, updated_at
            FROM redemption_codes
            WHERE code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(found)
    }

    /// 按 ID 获取兑换码
    pub async fn get_by_id(&self, id: i64) -> Result<Option<RedemptionCode>> {
        let found = sqlx::query_as::<_, RedemptionCode>(
            r#"
            SELECT id, code, credit_amount, max_uses, used_count, expires_at,
                   is_active, description, batch_id, created_by, created_at, updated_at
            FROM redemption_codes
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(found)
    }

    /// 在事务中锁定并获取兑换码（FOR UPDATE）
    ///
    /// used_count 是热点字段，兑换时先锁行再校验再自增。
    pub async fn get_by_code_for_update_in_tx(
        tx: &mut PgConnection,
        code: &str,
    ) -> Result<Option<RedemptionCode>> {
        let found = sqlx::query_as::<_, RedemptionCode>(
            r#"
            SELECT id, code, credit_amount, max_uses, used_count, expires_at,
                   is_active, description, batch_id, created_by, created_at, updated_at
            FROM redemption_codes
            WHERE code = $1
            FOR UPDATE
            "#,
        )
        .bind(code)
        .fetch_optional(tx)
        .await?;

        Ok(found)
    }

    /// 在事务中使用一次兑换码
    ///
    /// WHERE used_count < max_uses 守卫保证已领完的码不会被再次自增；
    /// 返回 false 表示次数已耗尽。
    pub async fn consume_use_in_tx(tx: &mut PgConnection, id: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE redemption_codes
            SET used_count = used_count + 1,
                updated_at = NOW()
            WHERE id = $1 AND used_count < max_uses
            "#,
        )
        .bind(id)
        .execute(tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// 在事务中锁定并按 ID 获取兑换码（FOR UPDATE）
    ///
    /// 更新前锁行，避免校验所依据的 used_count 在提交前被并发兑换推高
    pub async fn get_by_id_for_update_in_tx(
        tx: &mut PgConnection,
        id: i64,
    ) -> Result<Option<RedemptionCode>> {
        let found = sqlx::query_as::<_, RedemptionCode>(
            r#"
            SELECT id, code, credit_amount, max_uses, used_count, expires_at,
                   is_active, description, batch_id, created_by, created_at, updated_at
            FROM redemption_codes
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(tx)
        .await?;

        Ok(found)
    }

    /// 在事务中更新兑换码可选字段
    ///
    /// 只更新传入的字段，返回更新后的行
    pub async fn update_in_tx(
        tx: &mut PgConnection,
        id: i64,
        is_active: Option<bool>,
        description: Option<String>,
        max_uses: Option<i32>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Option<RedemptionCode>> {
        let updated = sqlx::query_as::<_, RedemptionCode>(
            r#"
            UPDATE redemption_codes
            SET is_active = COALESCE($2, is_active),
                description = COALESCE($3, description),
                max_uses = COALESCE($4, max_uses),
                expires_at = COALESCE($5, expires_at),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, code, credit_amount, max_uses, used_count, expires_at,
                      is_active, description, batch_id, created_by, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(is_active)
        .bind(description)
        .bind(max_uses)
        .bind(expires_at)
        .fetch_optional(tx)
        .await?;

        Ok(updated)
    }

    /// 在事务中删除兑换码
    ///
    /// 关联兑换记录由服务层在同一事务内先行清理
    pub async fn delete_in_tx(tx: &mut PgConnection, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM redemption_codes WHERE id = $1")
            .bind(id)
            .execute(tx)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// 分页列出兑换码，可按批次过滤
    pub async fn list(
        &self,
        batch_id: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<RedemptionCode>> {
        let codes = sqlx::query_as::<_, RedemptionCode>(
            r#"
            SELECT id, code, credit_amount, max_uses, used_count, expires_at,
                   is_active, description, batch_id, created_by, created_at, updated_at
            FROM redemption_codes
            WHERE ($1::UUID IS NULL OR batch_id = $1)
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(batch_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(codes)
    }

    /// 统计兑换码总数，可按批次过滤
    pub async fn count(&self, batch_id: Option<Uuid>) -> Result<i64> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS total
            FROM redemption_codes
            WHERE ($1::UUID IS NULL OR batch_id = $1)
            "#,
        )
        .bind(batch_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("total"))
    }

    /// 加载所有已存在的码值
    ///
    /// 批量生成前加载一次快照，候选码在内存中查重，
    /// 避免每个候选一次数据库往返。
    pub async fn all_codes(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT code FROM redemption_codes")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(|row| row.get("code")).collect())
    }
}
