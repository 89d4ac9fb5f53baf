//! 兑换码与兑换记录实体定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 兑换码
///
/// used_count 只由兑换引擎单调递增，永不超过 max_uses。
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionCode {
    pub id: i64,
    /// 码值（唯一，人工可录入）
    pub code: String,
    /// 单次兑换入账的积分面值
    pub credit_amount: i64,
    /// 总可用次数
    pub max_uses: i32,
    /// 已使用次数
    pub used_count: i32,
    /// 过期时间（空表示长期有效）
    #[sqlx(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// 是否启用
    pub is_active: bool,
    pub description: String,
    /// 批量生成时的分组键
    #[sqlx(default)]
    pub batch_id: Option<Uuid>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RedemptionCode {
    /// 检查是否已过期
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|t| t <= now)
    }

    /// 检查使用次数是否已耗尽
    pub fn is_exhausted(&self) -> bool {
        self.used_count >= self.max_uses
    }

    /// 剩余可用次数
    pub fn remaining_uses(&self) -> i32 {
        (self.max_uses - self.used_count).max(0)
    }
}

/// 兑换记录
///
/// (code_id, user_id) 的存储层唯一约束保证同一用户对同一码至多兑换一次。
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionRecord {
    pub id: i64,
    pub code_id: i64,
    /// 码值冗余存储，审计用
    pub code: String,
    pub user_id: String,
    /// 展示用的用户标识（昵称/邮箱等）
    pub user_identifier: String,
    /// 兑换时刻的面值快照
    pub credit_amount: i64,
    pub created_at: DateTime<Utc>,
}
