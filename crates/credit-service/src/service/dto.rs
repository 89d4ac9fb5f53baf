//! 服务层数据传输对象

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 兑换成功结果
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemOutcome {
    /// 入账积分
    pub credit_amount: i64,
    /// 入账后余额
    pub new_balance: i64,
}

/// 创建兑换码参数
#[derive(Debug, Clone)]
pub struct CreateCodeParams {
    pub credit_amount: i64,
    pub max_uses: i32,
    pub expires_at: Option<DateTime<Utc>>,
    pub description: Option<String>,
    /// 指定码值；为空时随机生成
    pub custom_code: Option<String>,
    pub created_by: String,
}

/// 批量生成兑换码参数
#[derive(Debug, Clone)]
pub struct BatchCreateParams {
    pub count: i64,
    pub credit_amount: i64,
    pub max_uses: i32,
    pub expires_at: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub created_by: String,
}

/// 更新兑换码参数
#[derive(Debug, Clone, Default)]
pub struct UpdateCodeParams {
    pub is_active: Option<bool>,
    pub description: Option<String>,
    pub max_uses: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// 批量生成结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchCreateOutcome {
    pub batch_id: Uuid,
    pub codes: Vec<crate::models::RedemptionCode>,
}

/// 系统概览统计
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsOverview {
    pub total_users: i64,
    pub users_with_balance: i64,
    /// 全系统余额之和
    pub total_balance: i64,
    /// 历史充值总量（含兑换码入账）
    pub total_recharged: i64,
    /// 历史消费总量（取正数口径）
    pub total_consumed: i64,
}

/// 时间窗口内的充值/消费总量
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowTotals {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub recharged: i64,
    pub consumed: i64,
}

/// 单用户对账结果
///
/// balance 与流水求和不一致说明出现了跨事务的半应用写入，需要人工介入
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationReport {
    pub user_id: String,
    pub balance: i64,
    pub ledger_sum: i64,
    pub consistent: bool,
}
