//! 用户账户仓储
//!
//! 余额行是热点资源，事务内一律通过 FOR UPDATE 读取后再写，
//! 不做无前置校验的盲目自增。

use sqlx::{PgConnection, PgPool, Row};

use crate::error::{CreditError, Result};
use crate::models::UserAccount;

/// 用户账户仓储
pub struct AccountRepository {
    pool: PgPool,
}

impl AccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 创建账户
    ///
    /// 主键冲突转换为 UserAlreadyExists
    pub async fn create(&self, user_id: &str) -> Result<UserAccount> {
        let account = sqlx::query_as::<_, UserAccount>(
            r#"
            INSERT INTO users (user_id)
            VALUES ($1)
            RETURNING user_id, credit_balance, total_spent_cents, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                CreditError::UserAlreadyExists(user_id.to_string())
            }
            _ => CreditError::from(e),
        })?;

        Ok(account)
    }

    /// 获取账户
    pub async fn get(&self, user_id: &str) -> Result<Option<UserAccount>> {
        let account = sqlx::query_as::<_, UserAccount>(
            r#"
            SELECT user_id, credit_balance, total_spent_cents, created_at, updated_at
            FROM users
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    /// 在事务中锁定并获取账户（FOR UPDATE）
    ///
    /// 同一用户的并发变更在此串行化，保证读-校验-写基于同一前置状态。
    pub async fn get_for_update_in_tx(
        tx: &mut PgConnection,
        user_id: &str,
    ) -> Result<Option<UserAccount>> {
        let account = sqlx::query_as::<_, UserAccount>(
            r#"
            SELECT user_id, credit_balance, total_spent_cents, created_at, updated_at
            FROM users
            WHERE user_id = $1
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .fetch_optional(tx)
        .await?;

        Ok(account)
    }

    /// 在事务中变更余额
    ///
    /// 调用前必须已在同一事务内 FOR UPDATE 锁定并校验过余额；
    /// 返回变更后的余额。
    pub async fn apply_delta_in_tx(
        tx: &mut PgConnection,
        user_id: &str,
        delta: i64,
        spent_cents_delta: i64,
    ) -> Result<i64> {
        let row = sqlx::query(
            r#"
            UPDATE users
            SET credit_balance = credit_balance + $2,
                total_spent_cents = total_spent_cents + $3,
                updated_at = NOW()
            WHERE user_id = $1
            RETURNING credit_balance
            "#,
        )
        .bind(user_id)
        .bind(delta)
        .bind(spent_cents_delta)
        .fetch_one(tx)
        .await?;

        Ok(row.get("credit_balance"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use credit_shared::config::DatabaseConfig;
    use credit_shared::database::Database;

    #[tokio::test]
    #[ignore] // 需要数据库连接
    async fn test_create_and_get_account() {
        let db = Database::connect(&DatabaseConfig::default()).await.unwrap();
        let repo = AccountRepository::new(db.pool().clone());

        let user_id = format!("test-{}", uuid::Uuid::new_v4());
        let account = repo.create(&user_id).await.unwrap();
        assert_eq!(account.credit_balance, 0);

        let fetched = repo.get(&user_id).await.unwrap().unwrap();
        assert_eq!(fetched.user_id, user_id);

        // 重复创建应报用户已存在
        let err = repo.create(&user_id).await.unwrap_err();
        assert!(matches!(err, CreditError::UserAlreadyExists(_)));
    }
}
