//! 积分流水实体定义
//!
//! 流水仅追加，不更新不删除，构成账户余额的审计轨迹

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

/// 流水类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
pub enum LedgerCategory {
    /// 充值（含兑换码入账、管理员上调）
    Recharge,
    /// 消费（含管理员下调）
    Consume,
    /// 退款（冲销充值）
    Refund,
}

/// 流水附加数据
///
/// 按流水来源区分的带标签变体，避免无类型的自由 JSON：
/// 每种来源能携带什么字段在编译期即可确定。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum LedgerMetadata {
    /// 兑换码入账
    #[serde(rename_all = "camelCase")]
    Redemption { code_id: i64, code: String },
    /// 管理员手动调整
    #[serde(rename_all = "camelCase")]
    AdminAdjustment {
        admin_id: String,
        reason: String,
        /// 调整前余额
        prior_balance: i64,
    },
    /// 功能消费
    #[serde(rename_all = "camelCase")]
    Usage { feature: String },
}

/// 积分流水
///
/// 每次余额变动在同一事务内恰好生成一条流水，
/// balance_after 记录提交后的余额快照，便于逐条对账。
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: i64,
    pub user_id: String,
    pub category: LedgerCategory,
    /// 有符号变动量：充值为正，消费/退款为负
    pub amount: i64,
    /// 本条流水提交后的余额快照
    pub balance_after: i64,
    /// 外部引用（如支付订单号），调用方的幂等键
    #[sqlx(default)]
    pub related_order_id: Option<String>,
    pub description: String,
    #[sqlx(default)]
    pub metadata: Option<Json<LedgerMetadata>>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_serialization() {
        assert_eq!(
            serde_json::to_value(LedgerCategory::Recharge).unwrap(),
            "recharge"
        );
        assert_eq!(
            serde_json::to_value(LedgerCategory::Consume).unwrap(),
            "consume"
        );
        assert_eq!(
            serde_json::to_value(LedgerCategory::Refund).unwrap(),
            "refund"
        );
    }

    #[test]
    fn test_metadata_redemption_shape() {
        let meta = LedgerMetadata::Redemption {
            code_id: 7,
            code: "WELCOME100".to_string(),
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["kind"], "redemption");
        assert_eq!(json["codeId"], 7);
        assert_eq!(json["code"], "WELCOME100");
    }

    #[test]
    fn test_metadata_admin_adjustment_shape() {
        let meta = LedgerMetadata::AdminAdjustment {
            admin_id: "admin-1".to_string(),
            reason: "活动补偿".to_string(),
            prior_balance: 50,
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["kind"], "adminAdjustment");
        assert_eq!(json["adminId"], "admin-1");
        assert_eq!(json["priorBalance"], 50);
    }

    #[test]
    fn test_metadata_roundtrip() {
        let meta = LedgerMetadata::Usage {
            feature: "export".to_string(),
        };
        let json = serde_json::to_string(&meta).unwrap();
        let parsed: LedgerMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, meta);
    }

    #[test]
    fn test_ledger_entry_serialization() {
        let entry = LedgerEntry {
            id: 1,
            user_id: "user-123".to_string(),
            category: LedgerCategory::Recharge,
            amount: 100,
            balance_after: 100,
            related_order_id: Some("ord1".to_string()),
            description: "充值".to_string(),
            metadata: None,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["category"], "recharge");
        assert_eq!(json["balanceAfter"], 100);
        assert_eq!(json["relatedOrderId"], "ord1");
    }
}
