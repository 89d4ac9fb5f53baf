//! 积分账本与兑换服务
//!
//! 多租户 SaaS 平台的积分核心：维护每个用户的积分余额，
//! 把每一次余额变动记成不可变流水，并签发/核销一次性兑换码。
//!
//! ## 核心功能
//!
//! - **账本核心**：充值、消费、退款、管理员调整，余额更新与流水
//!   追加在同一事务内提交
//! - **兑换码登记簿**：创建、批量生成、启停、删除兑换码
//! - **兑换引擎**：校验并原子执行兑换，(code_id, user_id) 唯一约束
//!   保证同一用户同一码至多兑换一次
//! - **统计报表**：只读聚合查询与余额对账
//!
//! ## 模块结构
//!
//! - `models`: 领域模型定义
//! - `error`: 错误类型定义
//! - `repository`: 数据库仓储层
//! - `service`: 业务服务层
//! - `handlers`: REST API 处理器
//! - `routes`: 路由配置
//! - `dto`: API 通用响应类型

pub mod dto;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod routes;
pub mod service;
pub mod state;

pub use error::{CreditError, Result};
pub use models::*;
pub use repository::{
    AccountRepository, LedgerRepository, RedemptionCodeRepository, RedemptionRecordRepository,
};
pub use service::{
    AppReportService, CodeService, LedgerService, RedemptionService, ReportService,
    dto as service_dto,
};
pub use state::AppState;
