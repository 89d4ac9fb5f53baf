//! 积分流水仓储
//!
//! 提供流水记录的追加和查询，支持余额对账

use sqlx::{PgConnection, PgPool, Row};

use crate::error::{CreditError, Result};
use crate::models::LedgerEntry;

/// 充值订单幂等索引名，违反时转换为 DuplicateOrder
const RECHARGE_ORDER_CONSTRAINT: &str = "uq_ledger_recharge_order";

/// 积分流水仓储
///
/// 采用复式记账思想，记录积分的每一次变动，确保数据可追溯
pub struct LedgerRepository {
    pool: PgPool,
}

impl LedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 在事务中追加流水记录
    ///
    /// 返回新记录的 ID。同一支付订单号的重复充值流水会命中
    /// 部分唯一索引，转换为 DuplicateOrder。
    pub async fn create_in_tx(tx: &mut PgConnection, entry: &LedgerEntry) -> Result<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO ledger_entries
                (user_id, category, amount, balance_after, related_order_id, description, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(&entry.user_id)
        .bind(entry.category)
        .bind(entry.amount)
        .bind(entry.balance_after)
        .bind(&entry.related_order_id)
        .bind(&entry.description)
        .bind(entry.metadata.clone())
        .bind(entry.created_at)
        .fetch_one(tx)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db)
                if db.is_unique_violation()
                    && db.constraint() == Some(RECHARGE_ORDER_CONSTRAINT) =>
            {
                CreditError::DuplicateOrder(
                    entry.related_order_id.clone().unwrap_or_default(),
                )
            }
            _ => CreditError::from(e),
        })?;

        Ok(row.get("id"))
    }

    /// 分页列出用户的流水记录
    ///
    /// 按时间倒序排列
    pub async fn list_by_user(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LedgerEntry>> {
        let entries = sqlx::query_as::<_, LedgerEntry>(
            r#"
            SELECT id, user_id, category, amount, balance_after,
                   related_order_id, description, metadata, created_at
            FROM ledger_entries
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// 统计用户的流水条数
    pub async fn count_by_user(&self, user_id: &str) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM ledger_entries WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.get("total"))
    }

    /// 计算用户全部流水的有符号金额之和
    ///
    /// 对账用：任意时刻应等于账户余额
    pub async fn sum_amount_by_user(&self, user_id: &str) -> Result<i64> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(amount), 0)::BIGINT AS total
            FROM ledger_entries
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("total"))
    }

}
