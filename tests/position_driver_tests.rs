//! 异步驱动集成测试
//!
//! 测试：
//! - 价格刷新结果以事件形式回到 store
//! - 后发起的刷新覆盖先发起的刷新（按发起顺序，而非完成顺序）
//! - 刷新失败时冻结数量并标记过期
//! - 定时刷新（慢数据源不会被后续定时刷新覆盖）
//!
//! 运行测试:
//!     cargo test --test position_driver_tests -- --nocapture

use clmm_deposit_sdk::common::EngineConfig;
use clmm_deposit_sdk::liquidity::{PositionDriver, PriceFeed, StaticPriceSource};
use clmm_deposit_sdk::{ClmmError, LiquidityClient, Side};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use test_helpers::*;

const WAIT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_superseded_refresh_is_discarded() {
    let source = StaticPriceSource::new(PriceFeed::SqrtX64(sqrt_at("120", 9, 6)));
    let (editor, _task) = PositionDriver::spawn(&EngineConfig::default(), Arc::new(source.clone()));

    editor.pool_loaded(sol_usdc_pool("150")).await.unwrap();
    editor.set_range(r("100"), r("200")).await.unwrap();
    editor.set_amount(Side::A, "1").await.unwrap();

    // 第一个请求慢，第二个请求快
    source.push_delay(Duration::from_millis(300));
    editor.refresh_price().await.unwrap();
    editor.flush().await.unwrap();
    source.set_price(PriceFeed::SqrtX64(sqrt_at("180", 9, 6)));
    editor.refresh_price().await.unwrap();

    let newer = sqrt_at("180", 9, 6);
    let mut updates = editor.subscribe();
    timeout(WAIT, updates.wait_for(|s| s.price.map(|p| p.sqrt_price_x64) == Some(newer)))
        .await
        .unwrap()
        .unwrap();

    // 等慢请求回来，结果应被丢弃
    tokio::time::sleep(Duration::from_millis(500)).await;
    let snap = editor.flush().await.unwrap();
    assert_eq!(snap.price.unwrap().sqrt_price_x64, newer);
    assert!(snap.is_consistent());
    assert_eq!(source.fetch_count(), 2);
}

#[tokio::test]
async fn test_failed_refresh_marks_stale() {
    let source = StaticPriceSource::new(PriceFeed::SqrtX64(sqrt_at("150", 9, 6)));
    let (editor, _task) = PositionDriver::spawn(&EngineConfig::default(), Arc::new(source.clone()));
    editor.pool_loaded(sol_usdc_pool("150")).await.unwrap();
    editor.set_range(r("100"), r("200")).await.unwrap();
    editor.set_amount(Side::B, "200").await.unwrap();
    assert!(editor.flush().await.unwrap().is_consistent());

    source.fail_with("rpc timeout");
    let mut updates = editor.subscribe();
    editor.refresh_price().await.unwrap();
    let snap = timeout(WAIT, updates.wait_for(|s| s.stale.is_some())).await.unwrap().unwrap().clone();
    assert!(snap.stale.as_deref().unwrap().contains("rpc timeout"));
    assert!(matches!(snap.issue, Some(ClmmError::StalePrice(_))));
    assert_eq!(snap.amount_b, Some(r("200")));
    assert_eq!(snap.amount_a, None);

    source.set_price(PriceFeed::SqrtX64(sqrt_at("150", 9, 6)));
    editor.refresh_price().await.unwrap();
    let snap = timeout(WAIT, updates.wait_for(|s| s.stale.is_none())).await.unwrap().unwrap().clone();
    assert!(snap.is_consistent());
}

#[tokio::test]
async fn test_periodic_refresh() {
    let source = StaticPriceSource::new(PriceFeed::SqrtX64(sqrt_at("150", 9, 6)));
    let config = EngineConfig::default().with_price_refresh_interval_ms(20);
    let client = LiquidityClient::new(config, Arc::new(source.clone())).unwrap();
    let (editor, task) = client.open_editor();

    let mut pool = sol_usdc_pool("150");
    pool.sqrt_price_x64 = None;
    editor.pool_loaded(pool).await.unwrap();

    let mut updates = editor.subscribe();
    timeout(WAIT, updates.wait_for(|s| s.price.is_some())).await.unwrap().unwrap();
    timeout(WAIT, async {
        while source.fetch_count() < 3 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    editor.shutdown().await.unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn test_periodic_refresh_with_slow_source() {
    // 每次请求都比刷新间隔慢
    let source = StaticPriceSource::new(PriceFeed::SqrtX64(sqrt_at("150", 9, 6)));
    for _ in 0..100 {
        source.push_delay(Duration::from_millis(60));
    }
    let config = EngineConfig::default().with_price_refresh_interval_ms(20);
    let (editor, _task) = PositionDriver::spawn(&config, Arc::new(source.clone()));

    let mut pool = sol_usdc_pool("150");
    pool.sqrt_price_x64 = None;
    editor.pool_loaded(pool).await.unwrap();

    let mut updates = editor.subscribe();
    timeout(WAIT, updates.wait_for(|s| s.price.is_some())).await.unwrap().unwrap();
    let snap = editor.flush().await.unwrap();
    assert!(snap.stale.is_none());
    // 同一时间只有一个定时请求在途
    assert!(source.fetch_count() < 10, "fetches {}", source.fetch_count());
}

#[tokio::test]
async fn test_user_price_without_pool_price() {
    let source = StaticPriceSource::default();
    let (editor, _task) = PositionDriver::spawn(&EngineConfig::default(), Arc::new(source));
    let mut pool = sol_usdc_pool("150");
    pool.sqrt_price_x64 = None;
    editor.select_token(Side::A, usdc()).await.unwrap();
    editor.select_token(Side::B, sol()).await.unwrap();
    editor.pool_loaded(pool).await.unwrap();
    editor.set_user_price(r("150")).await.unwrap();
    editor.set_range(r("100"), r("200")).await.unwrap();
    editor.set_amount(Side::A, "2").await.unwrap();

    let snap = editor.flush().await.unwrap();
    // pool 顺序为 SOL/USDC，选择顺序被纠正
    assert_eq!(snap.token_a.as_ref(), Some(&sol()));
    assert!(snap.is_consistent());
    assert_eq!(snap.amount_a, Some(r("2")));
}
