//! 账本与兑换核心场景集成测试
//!
//! 覆盖关键业务场景：充值入账、余额不足拒绝、一次性兑换码、
//! 并发兑换互斥、批量生成唯一性。
//!
//! 带 #[ignore] 的用例需要本地 PostgreSQL + Redis，
//! 运行前先应用 migrations：`cargo test -- --ignored`

use std::sync::Arc;
use std::time::Duration;

use credit_ledger::error::CreditError;
use credit_ledger::repository::{
    AccountRepository, LedgerRepository, RedemptionCodeRepository, RedemptionRecordRepository,
};
use credit_ledger::service::dto::{BatchCreateParams, CreateCodeParams};
use credit_ledger::service::{
    AppReportService, CodeService, LedgerService, RedemptionService, ReportService,
};
use credit_shared::cache::Cache;
use credit_shared::config::{DatabaseConfig, InitialGrantConfig, RedisConfig};
use credit_shared::database::Database;

struct TestHarness {
    ledger: Arc<LedgerService>,
    codes: Arc<CodeService>,
    redemption: Arc<RedemptionService>,
    reports: Arc<AppReportService>,
}

async fn harness() -> TestHarness {
    let db = Database::connect(&DatabaseConfig::default())
        .await
        .expect("需要本地数据库");
    let pool = db.pool().clone();
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("迁移失败");

    let cache = Arc::new(Cache::new(&RedisConfig::default()).expect("需要本地 Redis"));

    let account_repo = Arc::new(AccountRepository::new(pool.clone()));
    let ledger_repo = Arc::new(LedgerRepository::new(pool.clone()));
    let code_repo = Arc::new(RedemptionCodeRepository::new(pool.clone()));
    let record_repo = Arc::new(RedemptionRecordRepository::new(pool.clone()));

    let ledger = Arc::new(LedgerService::new(
        account_repo.clone(),
        cache,
        pool.clone(),
        Duration::from_secs(60),
    ));

    TestHarness {
        ledger: ledger.clone(),
        codes: Arc::new(CodeService::new(code_repo.clone(), pool.clone())),
        redemption: Arc::new(RedemptionService::new(
            code_repo.clone(),
            record_repo.clone(),
            ledger,
            pool.clone(),
        )),
        reports: Arc::new(ReportService::new(
            account_repo,
            ledger_repo,
            code_repo,
            record_repo,
            pool,
        )),
    }
}

fn unique_user() -> String {
    format!("it-user-{}", uuid::Uuid::new_v4())
}

fn unique_order() -> String {
    format!("it-ord-{}", uuid::Uuid::new_v4())
}

fn create_params(credit_amount: i64, max_uses: i32, custom_code: Option<String>) -> CreateCodeParams {
    CreateCodeParams {
        credit_amount,
        max_uses,
        expires_at: None,
        description: None,
        custom_code,
        created_by: "it-admin".to_string(),
    }
}

/// 场景 A：新账户充值 100，余额 100，流水 balance_after 为 100
#[tokio::test]
#[ignore] // 需要数据库和 Redis 连接
async fn test_recharge_fresh_account() {
    let h = harness().await;
    let user = unique_user();

    h.ledger.register_account(&user).await.unwrap();
    let balance = h
        .ledger
        .recharge(&user, 100, Some(&unique_order()), "top-up", None, None)
        .await
        .unwrap();

    assert_eq!(balance, 100);

    let (entries, total) = h.reports.user_transactions(&user, 10, 0).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(entries[0].amount, 100);
    assert_eq!(entries[0].balance_after, 100);

    // 对账不变量：余额 == 流水求和
    let report = h.reports.reconcile_user(&user).await.unwrap();
    assert!(report.consistent);
}

/// 充值幂等：同一订单号第二次入账返回 DuplicateOrder，余额不变
#[tokio::test]
#[ignore] // 需要数据库和 Redis 连接
async fn test_recharge_duplicate_order_rejected() {
    let h = harness().await;
    let user = unique_user();
    let order = unique_order();

    h.ledger.register_account(&user).await.unwrap();
    h.ledger
        .recharge(&user, 100, Some(&order), "top-up", None, None)
        .await
        .unwrap();

    let err = h
        .ledger
        .recharge(&user, 100, Some(&order), "top-up redelivered", None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, CreditError::DuplicateOrder(_)));

    assert_eq!(h.ledger.get_balance(&user).await.unwrap(), 100);
}

/// 场景 B：余额 100 消费 150 被拒，余额不变且不产生流水
#[tokio::test]
#[ignore] // 需要数据库和 Redis 连接
async fn test_consume_insufficient_balance() {
    let h = harness().await;
    let user = unique_user();

    h.ledger.register_account(&user).await.unwrap();
    h.ledger
        .recharge(&user, 100, Some(&unique_order()), "top-up", None, None)
        .await
        .unwrap();

    let err = h
        .ledger
        .consume(&user, 150, "feature X", None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CreditError::InsufficientBalance {
            required: 150,
            available: 100
        }
    ));

    assert_eq!(h.ledger.get_balance(&user).await.unwrap(), 100);
    let (_, total) = h.reports.user_transactions(&user, 10, 0).await.unwrap();
    assert_eq!(total, 1); // 仅充值那一条
}

/// 场景 C：一次性码兑换成功后立即再兑换返回 AlreadyRedeemed
#[tokio::test]
#[ignore] // 需要数据库和 Redis 连接
async fn test_redeem_once_then_already_redeemed() {
    let h = harness().await;
    let user = unique_user();
    h.ledger.register_account(&user).await.unwrap();

    let code = h
        .codes
        .create_code(create_params(100, 1, None))
        .await
        .unwrap();

    let outcome = h
        .redemption
        .redeem_code(&code.code, &user, "Alice")
        .await
        .unwrap();
    assert_eq!(outcome.credit_amount, 100);
    assert_eq!(outcome.new_balance, 100);

    let err = h
        .redemption
        .redeem_code(&code.code, &user, "Alice")
        .await
        .unwrap_err();
    assert!(matches!(err, CreditError::AlreadyRedeemed { .. }));
}

/// 场景 D：max_uses=1 的码被两个用户并发兑换，恰好一人成功，
/// used_count 最终为 1
#[tokio::test]
#[ignore] // 需要数据库和 Redis 连接
async fn test_concurrent_redeem_last_use() {
    let h = harness().await;
    let u1 = unique_user();
    let u2 = unique_user();
    h.ledger.register_account(&u1).await.unwrap();
    h.ledger.register_account(&u2).await.unwrap();

    let code = h
        .codes
        .create_code(create_params(100, 1, None))
        .await
        .unwrap();

    let (r1, r2) = tokio::join!(
        h.redemption.redeem_code(&code.code, &u1, "u1"),
        h.redemption.redeem_code(&code.code, &u2, "u2"),
    );

    let successes = [&r1, &r2].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "恰好一个并发请求成功");

    for r in [r1, r2] {
        if let Err(e) = r {
            assert!(
                matches!(
                    e,
                    CreditError::CodeExhausted(_) | CreditError::AlreadyRedeemed { .. }
                ),
                "失败方应收到次数耗尽或已兑换: {}",
                e
            );
        }
    }

    let fetched = h.codes.get_code(code.id).await.unwrap();
    assert_eq!(fetched.used_count, 1);
}

/// 场景 E：批量生成 10 个码，互不重复且各自可独立兑换一次
#[tokio::test]
#[ignore] // 需要数据库和 Redis 连接
async fn test_batch_create_distinct_and_redeemable() {
    let h = harness().await;

    let outcome = h
        .codes
        .batch_create(BatchCreateParams {
            count: 10,
            credit_amount: 100,
            max_uses: 1,
            expires_at: None,
            description: Some("batch".to_string()),
            created_by: "it-admin".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(outcome.codes.len(), 10);
    let distinct: std::collections::HashSet<_> =
        outcome.codes.iter().map(|c| c.code.as_str()).collect();
    assert_eq!(distinct.len(), 10);

    for code in &outcome.codes {
        assert_eq!(code.batch_id, Some(outcome.batch_id));

        let user = unique_user();
        h.ledger.register_account(&user).await.unwrap();
        let redeemed = h
            .redemption
            .redeem_code(&code.code, &user, "batch-user")
            .await
            .unwrap();
        assert_eq!(redeemed.credit_amount, 100);
    }
}

/// 管理员调整：负向调整受余额保护，理由写入流水附加数据
#[tokio::test]
#[ignore] // 需要数据库和 Redis 连接
async fn test_admin_adjust_guard_and_audit() {
    let h = harness().await;
    let user = unique_user();
    h.ledger.register_account(&user).await.unwrap();

    h.ledger
        .recharge(&user, 50, Some(&unique_order()), "top-up", None, None)
        .await
        .unwrap();

    let err = h
        .ledger
        .admin_adjust(&user, -100, "admin-1", "误发回收")
        .await
        .unwrap_err();
    assert!(matches!(err, CreditError::InsufficientBalance { .. }));

    let balance = h
        .ledger
        .admin_adjust(&user, -30, "admin-1", "误发回收")
        .await
        .unwrap();
    assert_eq!(balance, 20);

    let report = h.reports.reconcile_user(&user).await.unwrap();
    assert!(report.consistent);
}

/// 注册赠送：开启时新账户获得配置数量的积分
#[tokio::test]
#[ignore] // 需要数据库和 Redis 连接
async fn test_initial_grant_applies_when_enabled() {
    let h = harness().await;
    let user = unique_user();
    h.ledger.register_account(&user).await.unwrap();

    let config = InitialGrantConfig {
        enabled: true,
        amount: 30,
        description: "注册赠送".to_string(),
    };
    let balance = h
        .ledger
        .grant_initial_credit(&user, &config)
        .await
        .unwrap();
    assert_eq!(balance, Some(30));

    let disabled = InitialGrantConfig {
        enabled: false,
        ..config
    };
    let user2 = unique_user();
    h.ledger.register_account(&user2).await.unwrap();
    assert_eq!(
        h.ledger.grant_initial_credit(&user2, &disabled).await.unwrap(),
        None
    );
}

/// 删除码时级联清理兑换记录
#[tokio::test]
#[ignore] // 需要数据库和 Redis 连接
async fn test_delete_code_cascades_records() {
    let h = harness().await;
    let user = unique_user();
    h.ledger.register_account(&user).await.unwrap();

    let code = h
        .codes
        .create_code(create_params(10, 5, None))
        .await
        .unwrap();
    h.redemption
        .redeem_code(&code.code, &user, "Alice")
        .await
        .unwrap();

    h.codes.delete_code(code.id).await.unwrap();

    let err = h.codes.get_code(code.id).await.unwrap_err();
    assert!(matches!(err, CreditError::CodeNotFound(_)));
    let err = h.reports.code_records(code.id, 10, 0).await.unwrap_err();
    assert!(matches!(err, CreditError::CodeNotFound(_)));
}

/// 自定义码值冲突返回 CodeAlreadyExists
#[tokio::test]
#[ignore] // 需要数据库和 Redis 连接
async fn test_custom_code_conflict() {
    let h = harness().await;
    let custom = format!("IT{}", uuid::Uuid::new_v4().simple()).to_uppercase();

    h.codes
        .create_code(create_params(10, 1, Some(custom.clone())))
        .await
        .unwrap();

    let err = h
        .codes
        .create_code(create_params(10, 1, Some(custom)))
        .await
        .unwrap_err();
    assert!(matches!(err, CreditError::CodeAlreadyExists(_)));
}
