//! 只读统计报表服务
//!
//! 面向仪表盘的聚合查询，不开事务，允许读到略微过期的数据。
//! 对仓储接口泛型化，单元测试用 mock 仓储覆盖对账与查询路径。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::instrument;

use crate::error::{CreditError, Result};
use crate::models::{LedgerCategory, LedgerEntry, RedemptionRecord};
use crate::repository::traits::{
    AccountRepositoryTrait, LedgerRepositoryTrait, RedemptionCodeRepositoryTrait,
    RedemptionRecordRepositoryTrait,
};
use crate::repository::{
    AccountRepository, LedgerRepository, RedemptionCodeRepository, RedemptionRecordRepository,
};
use crate::service::dto::{ReconciliationReport, StatsOverview, WindowTotals};

/// 生产环境使用的具体仓储组合
pub type AppReportService =
    ReportService<AccountRepository, LedgerRepository, RedemptionCodeRepository, RedemptionRecordRepository>;

/// 报表服务
pub struct ReportService<AR, LR, CR, RR>
where
    AR: AccountRepositoryTrait,
    LR: LedgerRepositoryTrait,
    CR: RedemptionCodeRepositoryTrait,
    RR: RedemptionRecordRepositoryTrait,
{
    account_repo: Arc<AR>,
    ledger_repo: Arc<LR>,
    code_repo: Arc<CR>,
    record_repo: Arc<RR>,
    pool: PgPool,
}

impl<AR, LR, CR, RR> ReportService<AR, LR, CR, RR>
where
    AR: AccountRepositoryTrait,
    LR: LedgerRepositoryTrait,
    CR: RedemptionCodeRepositoryTrait,
    RR: RedemptionRecordRepositoryTrait,
{
    pub fn new(
        account_repo: Arc<AR>,
        ledger_repo: Arc<LR>,
        code_repo: Arc<CR>,
        record_repo: Arc<RR>,
        pool: PgPool,
    ) -> Self {
        Self {
            account_repo,
            ledger_repo,
            code_repo,
            record_repo,
            pool,
        }
    }

    /// 系统概览
    #[instrument(skip(self))]
    pub async fn overview(&self) -> Result<StatsOverview> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users) AS total_users,
                (SELECT COUNT(*) FROM users WHERE credit_balance > 0) AS users_with_balance,
                (SELECT COALESCE(SUM(credit_balance), 0)::BIGINT FROM users) AS total_balance,
                (SELECT COALESCE(SUM(amount), 0)::BIGINT FROM ledger_entries
                 WHERE category = 'recharge') AS total_recharged,
                (SELECT COALESCE(SUM(-amount), 0)::BIGINT FROM ledger_entries
                 WHERE category = 'consume') AS total_consumed
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(StatsOverview {
            total_users: row.get("total_users"),
            users_with_balance: row.get("users_with_balance"),
            total_balance: row.get("total_balance"),
            total_recharged: row.get("total_recharged"),
            total_consumed: row.get("total_consumed"),
        })
    }

    /// 时间窗口内的充值/消费总量
    #[instrument(skip(self))]
    pub async fn totals_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<WindowTotals> {
        if end <= start {
            return Err(CreditError::Validation(
                "时间窗口结束必须晚于开始".to_string(),
            ));
        }

        let row = sqlx::query(
            r#"
            SELECT
                COALESCE(SUM(amount) FILTER (WHERE category = $1), 0)::BIGINT AS recharged,
                COALESCE(SUM(-amount) FILTER (WHERE category = $2), 0)::BIGINT AS consumed
            FROM ledger_entries
            WHERE created_at >= $3 AND created_at < $4
            "#,
        )
        .bind(LedgerCategory::Recharge)
        .bind(LedgerCategory::Consume)
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        Ok(WindowTotals {
            start,
            end,
            recharged: row.get("recharged"),
            consumed: row.get("consumed"),
        })
    }

    /// 分页列出用户流水
    pub async fn user_transactions(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<LedgerEntry>, i64)> {
        // 目标账户必须存在，否则返回 UserNotFound 而非空列表
        self.account_repo
            .get(user_id)
            .await?
            .ok_or_else(|| CreditError::UserNotFound(user_id.to_string()))?;

        let entries = self.ledger_repo.list_by_user(user_id, limit, offset).await?;
        let total = self.ledger_repo.count_by_user(user_id).await?;

        Ok((entries, total))
    }

    /// 分页列出某个码的兑换记录
    pub async fn code_records(
        &self,
        code_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<RedemptionRecord>, i64)> {
        self.code_repo
            .get_by_id(code_id)
            .await?
            .ok_or_else(|| CreditError::CodeNotFound(code_id.to_string()))?;

        let records = self.record_repo.list_by_code(code_id, limit, offset).await?;
        let total = self.record_repo.count_by_code(code_id).await?;

        Ok((records, total))
    }

    /// 单用户对账
    ///
    /// 全局不变量：余额 == 该用户全部流水的有符号金额之和
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn reconcile_user(&self, user_id: &str) -> Result<ReconciliationReport> {
        let account = self
            .account_repo
            .get(user_id)
            .await?
            .ok_or_else(|| CreditError::UserNotFound(user_id.to_string()))?;

        let ledger_sum = self.ledger_repo.sum_amount_by_user(user_id).await?;

        Ok(ReconciliationReport {
            user_id: user_id.to_string(),
            balance: account.credit_balance,
            ledger_sum,
            consistent: account.credit_balance == ledger_sum,
        })
    }
}
