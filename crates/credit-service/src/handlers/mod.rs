//! REST API 处理器

pub mod code;
pub mod credit;
pub mod health;
pub mod redemption;
pub mod stats;
pub mod user;
