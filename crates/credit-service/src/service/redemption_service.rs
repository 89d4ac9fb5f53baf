//! 兑换引擎
//!
//! 校验并执行用户的兑换请求，把登记簿和账本组合成一次原子操作。
//!
//! ## 兑换流程
//!
//! 1. 码存在 -> 2. 已启用 -> 3. 未过期 -> 4. 该用户未兑换过 -> 5. 次数未耗尽
//!    -> 6. 事务写入 -> 7. 缓存失效
//!
//! "已兑换"必须先于"已领完"判定：超时重试的调用方依赖 AlreadyRedeemed
//! 区分"上次其实已成功"和真正的次数耗尽，一个被自己用掉最后一次的码
//! 不能报成 CodeExhausted。
//!
//! 前五步的事务外预检只是快速失败的优化；并发场景的正确性由
//! (code_id, user_id) 唯一约束和事务内的 FOR UPDATE 复核兜底。

use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;
use tracing::{info, instrument};

use crate::error::{CreditError, Result};
use crate::models::{LedgerCategory, LedgerEntry, LedgerMetadata, RedemptionCode, RedemptionRecord};
use crate::repository::{
    AccountRepository, LedgerRepository, RedemptionCodeRepository, RedemptionRecordRepository,
};
use crate::service::LedgerService;
use crate::service::dto::RedeemOutcome;

/// 兑换引擎服务
pub struct RedemptionService {
    code_repo: Arc<RedemptionCodeRepository>,
    record_repo: Arc<RedemptionRecordRepository>,
    ledger_service: Arc<LedgerService>,
    pool: PgPool,
}

impl RedemptionService {
    pub fn new(
        code_repo: Arc<RedemptionCodeRepository>,
        record_repo: Arc<RedemptionRecordRepository>,
        ledger_service: Arc<LedgerService>,
        pool: PgPool,
    ) -> Self {
        Self {
            code_repo,
            record_repo,
            ledger_service,
            pool,
        }
    }

    /// 兑换一个码
    ///
    /// 成功时在单个事务内完成：插入兑换记录、自增 used_count、
    /// 增加账户余额、追加充值流水。返回面值与入账后余额。
    ///
    /// 兑换对调用方是可安全重试的：若上次请求实际已提交，
    /// 重试会收到 AlreadyRedeemed，调用方视为"已经成功"。
    #[instrument(skip(self), fields(code = %code, user_id = %user_id))]
    pub async fn redeem_code(
        &self,
        code: &str,
        user_id: &str,
        user_identifier: &str,
    ) -> Result<RedeemOutcome> {
        let code = code.trim().to_uppercase();
        if code.is_empty() {
            return Err(CreditError::Validation("兑换码不能为空".to_string()));
        }

        // 1-5. 事务外预检，按顺序快速失败
        let snapshot = self.precheck(&code, user_id).await?;

        // 6. 事务内执行兑换
        let outcome = self
            .execute_redemption(&snapshot, user_id, user_identifier)
            .await?;

        // 7. 清除余额缓存
        self.ledger_service.invalidate_balance_cache(user_id).await;

        info!(
            code = %snapshot.code,
            user_id = %user_id,
            credit_amount = outcome.credit_amount,
            new_balance = outcome.new_balance,
            "兑换成功"
        );

        Ok(outcome)
    }

    /// 事务外预检
    ///
    /// 按固定顺序校验，第一个不满足的条件即返回对应错误
    async fn precheck(&self, code: &str, user_id: &str) -> Result<RedemptionCode> {
        let found = self
            .code_repo
            .get_by_code(code)
            .await?
            .ok_or_else(|| CreditError::CodeNotFound(code.to_string()))?;

        let already_redeemed = self.record_repo.exists(found.id, user_id).await?;
        Self::check_redeemable(&found, user_id, already_redeemed)?;

        Ok(found)
    }

    /// 校验码对指定用户可兑换
    ///
    /// 顺序：停用 -> 过期 -> 已兑换 -> 次数耗尽。
    /// "已兑换"先于"次数耗尽"：用户自己用掉最后一次后重试，
    /// 必须收到 AlreadyRedeemed 而不是 CodeExhausted。
    fn check_redeemable(
        code: &RedemptionCode,
        user_id: &str,
        already_redeemed: bool,
    ) -> Result<()> {
        Self::validate_code(code)?;
        if already_redeemed {
            return Err(CreditError::AlreadyRedeemed {
                code: code.code.clone(),
                user_id: user_id.to_string(),
            });
        }
        if code.is_exhausted() {
            return Err(CreditError::CodeExhausted(code.code.clone()));
        }
        Ok(())
    }

    /// 校验码本身的可用性（启用、未过期）
    ///
    /// 次数耗尽不在这里判定：事务内由守卫式 UPDATE 裁决，
    /// 事务外由 check_redeemable 在"已兑换"之后判定。
    fn validate_code(code: &RedemptionCode) -> Result<()> {
        if !code.is_active {
            return Err(CreditError::CodeInactive(code.code.clone()));
        }
        if code.is_expired(Utc::now()) {
            return Err(CreditError::CodeExpired(code.code.clone()));
        }
        Ok(())
    }

    /// 执行兑换事务
    ///
    /// 在单个事务内完成：
    /// - FOR UPDATE 锁定码行并复核可用性（预检到这里之间状态可能已变）
    /// - 插入兑换记录（唯一约束冲突转换为 AlreadyRedeemed）
    /// - 守卫式自增 used_count（WHERE used_count < max_uses）
    /// - FOR UPDATE 锁定账户行、增加余额
    /// - 追加充值流水（带兑换来源附加数据）
    async fn execute_redemption(
        &self,
        snapshot: &RedemptionCode,
        user_id: &str,
        user_identifier: &str,
    ) -> Result<RedeemOutcome> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let code = RedemptionCodeRepository::get_by_code_for_update_in_tx(&mut tx, &snapshot.code)
            .await?
            .ok_or_else(|| CreditError::CodeNotFound(snapshot.code.clone()))?;

        Self::validate_code(&code)?;

        // 记录先于计数：并发的同用户请求在这里拿到 AlreadyRedeemed，
        // 不会白白消耗一次使用次数
        let record = RedemptionRecord {
            id: 0,
            code_id: code.id,
            code: code.code.clone(),
            user_id: user_id.to_string(),
            user_identifier: user_identifier.to_string(),
            credit_amount: code.credit_amount,
            created_at: now,
        };
        RedemptionRecordRepository::create_in_tx(&mut tx, &record).await?;

        if !RedemptionCodeRepository::consume_use_in_tx(&mut tx, code.id).await? {
            return Err(CreditError::CodeExhausted(code.code.clone()));
        }

        let account = AccountRepository::get_for_update_in_tx(&mut tx, user_id)
            .await?
            .ok_or_else(|| CreditError::UserNotFound(user_id.to_string()))?;

        let new_balance =
            AccountRepository::apply_delta_in_tx(&mut tx, &account.user_id, code.credit_amount, 0)
                .await?;

        let entry = LedgerEntry {
            id: 0,
            user_id: user_id.to_string(),
            category: LedgerCategory::Recharge,
            amount: code.credit_amount,
            balance_after: new_balance,
            related_order_id: None,
            description: format!("兑换码入账: {}", code.code),
            metadata: Some(sqlx::types::Json(LedgerMetadata::Redemption {
                code_id: code.id,
                code: code.code.clone(),
            })),
            created_at: now,
        };
        LedgerRepository::create_in_tx(&mut tx, &entry).await?;

        tx.commit().await?;

        Ok(RedeemOutcome {
            credit_amount: code.credit_amount,
            new_balance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn create_test_code(max_uses: i32, used_count: i32) -> RedemptionCode {
        RedemptionCode {
            id: 1,
            code: "WELCOME100".to_string(),
            credit_amount: 100,
            max_uses,
            used_count,
            expires_at: None,
            is_active: true,
            description: String::new(),
            batch_id: None,
            created_by: "admin-1".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_check_redeemable_ok() {
        let code = create_test_code(1, 0);
        assert!(RedemptionService::check_redeemable(&code, "user-1", false).is_ok());
    }

    #[test]
    fn test_check_redeemable_inactive() {
        let mut code = create_test_code(1, 0);
        code.is_active = false;
        assert!(matches!(
            RedemptionService::check_redeemable(&code, "user-1", false),
            Err(CreditError::CodeInactive(_))
        ));
    }

    #[test]
    fn test_check_redeemable_expired() {
        let mut code = create_test_code(1, 0);
        code.expires_at = Some(Utc::now() - Duration::hours(1));
        assert!(matches!(
            RedemptionService::check_redeemable(&code, "user-1", false),
            Err(CreditError::CodeExpired(_))
        ));
    }

    #[test]
    fn test_check_redeemable_exhausted() {
        let code = create_test_code(1, 1);
        assert!(matches!(
            RedemptionService::check_redeemable(&code, "user-1", false),
            Err(CreditError::CodeExhausted(_))
        ));
    }

    #[test]
    fn test_already_redeemed_takes_priority_over_exhausted() {
        // 用户自己用掉最后一次后重试：码处于 used_count == max_uses，
        // 但该用户已有兑换记录，必须报 AlreadyRedeemed 供调用方安全重试
        let code = create_test_code(1, 1);
        assert!(matches!(
            RedemptionService::check_redeemable(&code, "user-1", true),
            Err(CreditError::AlreadyRedeemed { .. })
        ));
    }

    #[test]
    fn test_inactive_takes_priority_over_expiry() {
        // 停用且过期的码先报停用，与预检顺序一致
        let mut code = create_test_code(1, 0);
        code.is_active = false;
        code.expires_at = Some(Utc::now() - Duration::hours(1));
        assert!(matches!(
            RedemptionService::check_redeemable(&code, "user-1", false),
            Err(CreditError::CodeInactive(_))
        ));
    }
}
