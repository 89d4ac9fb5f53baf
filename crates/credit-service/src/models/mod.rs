//! 领域模型定义

mod account;
mod ledger;
mod redemption;

pub use account::UserAccount;
pub use ledger::{LedgerCategory, LedgerEntry, LedgerMetadata};
pub use redemption::{RedemptionCode, RedemptionRecord};
