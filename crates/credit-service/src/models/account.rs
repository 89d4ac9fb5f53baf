//! 用户账户实体定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 用户账户
///
/// 积分余额内嵌在用户记录上，只能通过积分核心的操作变动，
/// 任何调用方都不允许直接写余额字段。
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    pub user_id: String,
    /// 当前积分余额（不变量：>= 0）
    pub credit_balance: i64,
    /// 累计消费金额（分），派生的报表口径，非权威数据
    pub total_spent_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserAccount {
    /// 检查余额是否足以支付指定数量
    pub fn can_afford(&self, amount: i64) -> bool {
        self.credit_balance >= amount
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_account(balance: i64) -> UserAccount {
        UserAccount {
            user_id: "user-123".to_string(),
            credit_balance: balance,
            total_spent_cents: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_can_afford() {
        let account = create_test_account(100);
        assert!(account.can_afford(100));
        assert!(account.can_afford(50));
        assert!(!account.can_afford(101));
    }

    #[test]
    fn test_account_serialization() {
        let account = create_test_account(100);
        let json = serde_json::to_value(&account).unwrap();
        assert_eq!(json["userId"], "user-123");
        assert_eq!(json["creditBalance"], 100);
    }
}
