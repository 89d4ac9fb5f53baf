//! 积分账本核心服务
//!
//! 四个变更操作共享同一算法形态：读取-校验-写入-记账，
//! 在单个数据库事务内执行，余额更新与流水追加要么同时提交要么都不提交。
//!
//! 注意重试语义：充值/消费/调整都不是天然幂等的，调用方超时后
//! 必须先按幂等键（充值订单号）查重，不允许盲目重试。

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;
use tracing::{info, instrument, warn};

use credit_shared::cache::Cache;
use credit_shared::config::InitialGrantConfig;

use crate::error::{CreditError, Result};
use crate::models::{LedgerCategory, LedgerEntry, LedgerMetadata, UserAccount};
use crate::repository::{AccountRepository, LedgerRepository};

/// 缓存键生成
pub(crate) mod cache_keys {
    pub fn balance(user_id: &str) -> String {
        format!("credit:balance:{}", user_id)
    }
}

/// 积分账本服务
pub struct LedgerService {
    account_repo: Arc<AccountRepository>,
    cache: Arc<Cache>,
    pool: PgPool,
    balance_ttl: Duration,
}

impl LedgerService {
    pub fn new(
        account_repo: Arc<AccountRepository>,
        cache: Arc<Cache>,
        pool: PgPool,
        balance_ttl: Duration,
    ) -> Self {
        Self {
            account_repo,
            cache,
            pool,
            balance_ttl,
        }
    }

    /// 注册新账户
    pub async fn register_account(&self, user_id: &str) -> Result<UserAccount> {
        if user_id.trim().is_empty() {
            return Err(CreditError::Validation("用户 ID 不能为空".to_string()));
        }
        self.account_repo.create(user_id).await
    }

    /// 充值
    ///
    /// 支付层确认支付后调用，order_id 作为幂等键：同一订单号的
    /// 重复回调会命中流水表的部分唯一索引并返回 DuplicateOrder。
    /// paid_cents 为本次支付的货币金额（分），仅累计到报表字段。
    #[instrument(skip(self, metadata), fields(user_id = %user_id, amount = %amount))]
    pub async fn recharge(
        &self,
        user_id: &str,
        amount: i64,
        order_id: Option<&str>,
        description: &str,
        metadata: Option<LedgerMetadata>,
        paid_cents: Option<i64>,
    ) -> Result<i64> {
        if amount <= 0 {
            return Err(CreditError::Validation(format!(
                "充值数量必须为正数: {}",
                amount
            )));
        }

        let new_balance = self
            .apply(
                user_id,
                amount,
                paid_cents.unwrap_or(0),
                LedgerCategory::Recharge,
                order_id,
                description,
                metadata,
            )
            .await?;

        info!(
            user_id = %user_id,
            amount = amount,
            new_balance = new_balance,
            order_id = order_id.unwrap_or(""),
            "充值入账成功"
        );

        Ok(new_balance)
    }

    /// 消费
    ///
    /// 余额不足返回 InsufficientBalance，调用方应视为"拒绝该操作"
    /// 而非可重试的瞬时错误。
    #[instrument(skip(self, metadata), fields(user_id = %user_id, amount = %amount))]
    pub async fn consume(
        &self,
        user_id: &str,
        amount: i64,
        description: &str,
        metadata: Option<LedgerMetadata>,
    ) -> Result<i64> {
        if amount <= 0 {
            return Err(CreditError::Validation(format!(
                "消费数量必须为正数: {}",
                amount
            )));
        }

        let new_balance = self
            .apply(
                user_id,
                -amount,
                0,
                LedgerCategory::Consume,
                None,
                description,
                metadata,
            )
            .await?;

        info!(user_id = %user_id, amount = amount, new_balance = new_balance, "消费扣减成功");

        Ok(new_balance)
    }

    /// 退款冲销
    ///
    /// 冲销此前的充值；余额已被消费掉的部分无法退，
    /// 余额不足同样返回 InsufficientBalance。
    #[instrument(skip(self), fields(user_id = %user_id, amount = %amount, order_id = %order_id))]
    pub async fn refund(
        &self,
        user_id: &str,
        amount: i64,
        order_id: &str,
        description: &str,
    ) -> Result<i64> {
        if amount <= 0 {
            return Err(CreditError::Validation(format!(
                "退款数量必须为正数: {}",
                amount
            )));
        }

        let new_balance = self
            .apply(
                user_id,
                -amount,
                0,
                LedgerCategory::Refund,
                Some(order_id),
                description,
                None,
            )
            .await?;

        info!(user_id = %user_id, amount = amount, new_balance = new_balance, "退款冲销成功");

        Ok(new_balance)
    }

    /// 管理员手动调整
    ///
    /// delta 带符号；理由必填，连同调整前余额一起写入流水附加数据，
    /// 保证调整可追责。
    #[instrument(skip(self), fields(user_id = %user_id, delta = %delta, admin_id = %admin_id))]
    pub async fn admin_adjust(
        &self,
        user_id: &str,
        delta: i64,
        admin_id: &str,
        reason: &str,
    ) -> Result<i64> {
        if delta == 0 {
            return Err(CreditError::Validation("调整数量不能为 0".to_string()));
        }
        if reason.trim().is_empty() {
            return Err(CreditError::Validation("调整理由不能为空".to_string()));
        }

        let mut tx = self.pool.begin().await?;

        let account = AccountRepository::get_for_update_in_tx(&mut tx, user_id)
            .await?
            .ok_or_else(|| CreditError::UserNotFound(user_id.to_string()))?;

        if delta < 0 && !account.can_afford(-delta) {
            return Err(CreditError::InsufficientBalance {
                required: -delta,
                available: account.credit_balance,
            });
        }

        let category = if delta > 0 {
            LedgerCategory::Recharge
        } else {
            LedgerCategory::Consume
        };

        let new_balance =
            AccountRepository::apply_delta_in_tx(&mut tx, user_id, delta, 0).await?;

        let entry = LedgerEntry {
            id: 0,
            user_id: user_id.to_string(),
            category,
            amount: delta,
            balance_after: new_balance,
            related_order_id: None,
            description: format!("管理员调整: {}", reason),
            metadata: Some(sqlx::types::Json(LedgerMetadata::AdminAdjustment {
                admin_id: admin_id.to_string(),
                reason: reason.to_string(),
                prior_balance: account.credit_balance,
            })),
            created_at: Utc::now(),
        };
        LedgerRepository::create_in_tx(&mut tx, &entry).await?;

        tx.commit().await?;

        self.invalidate_balance_cache(user_id).await;

        info!(
            user_id = %user_id,
            delta = delta,
            admin_id = %admin_id,
            new_balance = new_balance,
            "管理员调整完成"
        );

        Ok(new_balance)
    }

    /// 注册赠送
    ///
    /// 注册流程的协作入口；配置由外部显式注入，未开启时不产生任何写入。
    /// 返回赠送后的余额，未开启返回 None。
    #[instrument(skip(self, config), fields(user_id = %user_id))]
    pub async fn grant_initial_credit(
        &self,
        user_id: &str,
        config: &InitialGrantConfig,
    ) -> Result<Option<i64>> {
        if !config.enabled || config.amount <= 0 {
            return Ok(None);
        }

        let new_balance = self
            .recharge(user_id, config.amount, None, &config.description, None, None)
            .await?;

        Ok(Some(new_balance))
    }

    /// 查询余额（优先走缓存）
    pub async fn get_balance(&self, user_id: &str) -> Result<i64> {
        let key = cache_keys::balance(user_id);

        // 缓存故障降级为直查数据库
        match self.cache.get::<i64>(&key).await {
            Ok(Some(balance)) => return Ok(balance),
            Ok(None) => {}
            Err(e) => warn!(key = %key, error = %e, "读取余额缓存失败"),
        }

        let account = self
            .account_repo
            .get(user_id)
            .await?
            .ok_or_else(|| CreditError::UserNotFound(user_id.to_string()))?;

        if let Err(e) = self
            .cache
            .set(&key, &account.credit_balance, self.balance_ttl)
            .await
        {
            warn!(key = %key, error = %e, "写入余额缓存失败");
        }

        Ok(account.credit_balance)
    }

    /// 读取-校验-写入-记账的公共形态
    ///
    /// 在单个事务内：FOR UPDATE 锁定账户行、校验余额下界、
    /// 变更余额、追加流水。任一步失败整体回滚。
    async fn apply(
        &self,
        user_id: &str,
        delta: i64,
        spent_cents_delta: i64,
        category: LedgerCategory,
        related_order_id: Option<&str>,
        description: &str,
        metadata: Option<LedgerMetadata>,
    ) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        let account = AccountRepository::get_for_update_in_tx(&mut tx, user_id)
            .await?
            .ok_or_else(|| CreditError::UserNotFound(user_id.to_string()))?;

        if delta < 0 && !account.can_afford(-delta) {
            return Err(CreditError::InsufficientBalance {
                required: -delta,
                available: account.credit_balance,
            });
        }

        let new_balance =
            AccountRepository::apply_delta_in_tx(&mut tx, user_id, delta, spent_cents_delta)
                .await?;

        let entry = LedgerEntry {
            id: 0,
            user_id: user_id.to_string(),
            category,
            amount: delta,
            balance_after: new_balance,
            related_order_id: related_order_id.map(String::from),
            description: description.to_string(),
            metadata: metadata.map(sqlx::types::Json),
            created_at: Utc::now(),
        };
        LedgerRepository::create_in_tx(&mut tx, &entry).await?;

        tx.commit().await?;

        self.invalidate_balance_cache(user_id).await;

        Ok(new_balance)
    }

    /// 使余额缓存失效
    pub(crate) async fn invalidate_balance_cache(&self, user_id: &str) {
        let key = cache_keys::balance(user_id);
        if let Err(e) = self.cache.delete(&key).await {
            warn!(key = %key, error = %e, "余额缓存失效失败");
        }
    }
}
