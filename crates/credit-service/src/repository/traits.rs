//! 仓储 Trait 定义
//!
//! 定义仓储接口，便于服务层依赖抽象而非具体实现，支持 mock 测试

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{LedgerEntry, RedemptionCode, RedemptionRecord, UserAccount};

/// 账户仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountRepositoryTrait: Send + Sync {
    async fn create(&self, user_id: &str) -> Result<UserAccount>;
    async fn get(&self, user_id: &str) -> Result<Option<UserAccount>>;
}

/// 流水仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerRepositoryTrait: Send + Sync {
    async fn list_by_user(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LedgerEntry>>;
    async fn count_by_user(&self, user_id: &str) -> Result<i64>;
    async fn sum_amount_by_user(&self, user_id: &str) -> Result<i64>;
}

/// 兑换码仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RedemptionCodeRepositoryTrait: Send + Sync {
    async fn get_by_code(&self, code: &str) -> Result<Option<RedemptionCode>>;
    async fn get_by_id(&self, id: i64) -> Result<Option<RedemptionCode>>;
    async fn list(
        &self,
        batch_id: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<RedemptionCode>>;
}

/// 兑换记录仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RedemptionRecordRepositoryTrait: Send + Sync {
    async fn exists(&self, code_id: i64, user_id: &str) -> Result<bool>;
    async fn list_by_code(
        &self,
        code_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<RedemptionRecord>>;
    async fn count_by_code(&self, code_id: i64) -> Result<i64>;
}

#[async_trait]
impl AccountRepositoryTrait for super::AccountRepository {
    async fn create(&self, user_id: &str) -> Result<UserAccount> {
        self.create(user_id).await
    }

    async fn get(&self, user_id: &str) -> Result<Option<UserAccount>> {
        self.get(user_id).await
    }
}

#[async_trait]
impl LedgerRepositoryTrait for super::LedgerRepository {
    async fn list_by_user(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LedgerEntry>> {
        self.list_by_user(user_id, limit, offset).await
    }

    async fn count_by_user(&self, user_id: &str) -> Result<i64> {
        self.count_by_user(user_id).await
    }

    async fn sum_amount_by_user(&self, user_id: &str) -> Result<i64> {
        self.sum_amount_by_user(user_id).await
    }
}

#[async_trait]
impl RedemptionCodeRepositoryTrait for super::RedemptionCodeRepository {
    async fn get_by_code(&self, code: &str) -> Result<Option<RedemptionCode>> {
        self.get_by_code(code).await
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<RedemptionCode>> {
        self.get_by_id(id).await
    }

    async fn list(
        &self,
        batch_id: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<RedemptionCode>> {
        self.list(batch_id, limit, offset).await
    }
}

#[async_trait]
impl RedemptionRecordRepositoryTrait for super::RedemptionRecordRepository {
    async fn exists(&self, code_id: i64, user_id: &str) -> Result<bool> {
        self.exists(code_id, user_id).await
    }

    async fn list_by_code(
        &self,
        code_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<RedemptionRecord>> {
        self.list_by_code(code_id, limit, offset).await
    }

    async fn count_by_code(&self, code_id: i64) -> Result<i64> {
        self.count_by_code(code_id).await
    }
}
