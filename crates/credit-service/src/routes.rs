//! 路由配置模块
//!
//! 定义所有 REST API 端点的路由映射

use axum::{
    Router,
    routing::{delete, get, patch, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::{handlers, state::AppState};

/// 构建用户侧路由
fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(handlers::user::signup))
        .route("/users/{user_id}/balance", get(handlers::user::get_balance))
        .route(
            "/users/{user_id}/transactions",
            get(handlers::user::list_transactions),
        )
        .route("/redeem", post(handlers::redemption::redeem))
}

/// 构建积分变更路由
///
/// 由支付确认、功能计费等内部协作方调用
fn credit_routes() -> Router<AppState> {
    Router::new()
        .route("/credits/recharge", post(handlers::credit::recharge))
        .route("/credits/consume", post(handlers::credit::consume))
        .route("/credits/refund", post(handlers::credit::refund))
}

/// 构建管理后台路由
fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/codes", post(handlers::code::create_code))
        .route("/admin/codes", get(handlers::code::list_codes))
        .route("/admin/codes/batch", post(handlers::code::batch_create))
        .route("/admin/codes/{id}", get(handlers::code::get_code))
        .route("/admin/codes/{id}", patch(handlers::code::update_code))
        .route("/admin/codes/{id}", delete(handlers::code::delete_code))
        .route(
            "/admin/codes/{id}/records",
            get(handlers::code::list_code_records),
        )
        .route("/admin/adjust", post(handlers::credit::admin_adjust))
        .route(
            "/admin/users/{user_id}/reconcile",
            get(handlers::user::reconcile),
        )
        .route("/admin/stats", get(handlers::stats::overview))
        .route("/admin/stats/window", get(handlers::stats::window_totals))
}

/// 组装完整路由
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .merge(user_routes())
        .merge(credit_routes())
        .merge(admin_routes());

    Router::new()
        .nest("/api", api)
        .route("/health", get(handlers::health::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
