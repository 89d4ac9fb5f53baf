//! 兑换记录仓储

use sqlx::{PgConnection, PgPool, Row};

use crate::error::{CreditError, Result};
use crate::models::RedemptionRecord;

/// 兑换记录仓储
pub struct RedemptionRecordRepository {
    pool: PgPool,
}

impl RedemptionRecordRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 在事务中插入兑换记录
    ///
    /// (code_id, user_id) 唯一约束是"同一用户同一码至多一次"的真正保障：
    /// 并发兑换双双通过应用层检查时，后提交的插入在这里失败，
    /// 转换为 AlreadyRedeemed 而不是裸数据库错误。
    pub async fn create_in_tx(
        tx: &mut PgConnection,
        record: &RedemptionRecord,
    ) -> Result<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO redemption_records
                (code_id, code, user_id, user_identifier, credit_amount, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(record.code_id)
        .bind(&record.code)
        .bind(&record.user_id)
        .bind(&record.user_identifier)
        .bind(record.credit_amount)
        .bind(record.created_at)
        .fetch_one(tx)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                CreditError::AlreadyRedeemed {
                    code: record.code.clone(),
                    user_id: record.user_id.clone(),
                }
            }
            _ => CreditError::from(e),
        })?;

        Ok(row.get("id"))
    }

    /// 检查用户是否已兑换过指定码
    ///
    /// 快速失败的优化，正确性由唯一约束兜底
    pub async fn exists(&self, code_id: i64, user_id: &str) -> Result<bool> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM redemption_records
                WHERE code_id = $1 AND user_id = $2
            ) AS found
            "#,
        )
        .bind(code_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("found"))
    }

    /// 分页列出某个码的兑换记录
    pub async fn list_by_code(
        &self,
        code_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<RedemptionRecord>> {
        let records = sqlx::query_as::<_, RedemptionRecord>(
            r#"
            SELECT id, code_id, code, user_id, user_identifier, credit_amount, created_at
            FROM redemption_records
            WHERE code_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(code_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// 统计某个码的兑换记录数
    pub async fn count_by_code(&self, code_id: i64) -> Result<i64> {
        let row =
            sqlx::query("SELECT COUNT(*) AS total FROM redemption_records WHERE code_id = $1")
                .bind(code_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(row.get("total"))
    }

    /// 在事务中删除某个码的全部兑换记录
    ///
    /// 码被删除后记录不再可寻址，显式级联清理（非软删除）
    pub async fn delete_by_code_in_tx(tx: &mut PgConnection, code_id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM redemption_records WHERE code_id = $1")
            .bind(code_id)
            .execute(tx)
            .await?;

        Ok(result.rows_affected())
    }
}
