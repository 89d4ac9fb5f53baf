//! 业务服务层
//!
//! - `LedgerService`: 积分账本核心（充值/消费/退款/管理员调整）
//! - `CodeService`: 兑换码登记簿（创建/批量生成/更新/删除）
//! - `RedemptionService`: 兑换引擎（校验 + 原子入账）
//! - `ReportService`: 只读统计报表

pub mod dto;

mod code_service;
mod ledger_service;
mod redemption_service;
mod report_service;

pub use code_service::CodeService;
pub use ledger_service::LedgerService;
pub use redemption_service::RedemptionService;
pub use report_service::{AppReportService, ReportService};
