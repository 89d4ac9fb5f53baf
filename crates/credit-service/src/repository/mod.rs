//! 数据库仓储层
//!
//! 每个仓储对应一张表，提供连接池方法和事务内（`*_in_tx`）方法两套入口。
//! 跨表的原子写入由服务层开启事务后调用 `*_in_tx` 方法组合完成。

mod account_repo;
mod code_repo;
mod ledger_repo;
mod record_repo;
pub mod traits;

pub use account_repo::AccountRepository;
pub use code_repo::RedemptionCodeRepository;
pub use ledger_repo::LedgerRepository;
pub use record_repo::RedemptionRecordRepository;
