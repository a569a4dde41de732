//! 池子价格来源
//!
//! The chain / pool-data collaborator sits behind [`PoolPriceSource`]. The
//! driver calls it from a spawned task and feeds the result back into the
//! store as an event.

use futures::future::BoxFuture;
use parking_lot::Mutex;
use solana_sdk::pubkey::Pubkey;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use super::pool::PriceFeed;
use crate::common::types::AnyResult;

/// 池子价格来源 Trait
///
/// 实现方负责 RPC / HTTP 查询，返回池子当前价格
pub trait PoolPriceSource: Send + Sync {
    /// 查询池子当前价格
    ///
    /// # 返回
    /// * `Ok(feed)` - 原始 sqrt 价格或十进制价格
    /// * `Err(e)` - 查询失败，store 会把价格标记为过期
    fn fetch_price(&self, pool_id: Pubkey) -> BoxFuture<'static, AnyResult<PriceFeed>>;
}

pub type PriceSourceRef = Arc<dyn PoolPriceSource>;

#[derive(Default)]
struct StaticState {
    feed: Option<PriceFeed>,
    failure: Option<String>,
    delays: VecDeque<Duration>,
    fetches: u64,
}

/// In-memory price source: returns whatever price was last set. Per-fetch
/// delays can be queued to reorder completions.
#[derive(Clone, Default)]
pub struct StaticPriceSource {
    state: Arc<Mutex<StaticState>>,
}

impl StaticPriceSource {
    pub fn new(feed: PriceFeed) -> Self {
        let source = Self::default();
        source.set_price(feed);
        source
    }

    pub fn set_price(&self, feed: PriceFeed) {
        let mut state = self.state.lock();
        state.feed = Some(feed);
        state.failure = None;
    }

    /// Makes every following fetch fail with `message`.
    pub fn fail_with(&self, message: impl Into<String>) {
        self.state.lock().failure = Some(message.into());
    }

    /// The next fetch waits `delay` before answering.
    pub fn push_delay(&self, delay: Duration) {
        self.state.lock().delays.push_back(delay);
    }

    pub fn fetch_count(&self) -> u64 {
        self.state.lock().fetches
    }
}

impl PoolPriceSource for StaticPriceSource {
    fn fetch_price(&self, pool_id: Pubkey) -> BoxFuture<'static, AnyResult<PriceFeed>> {
        // 在发起请求时就确定结果，模拟请求发出时的链上状态
        let (result, delay) = {
            let mut state = self.state.lock();
            state.fetches += 1;
            let result = match (&state.failure, &state.feed) {
                (Some(message), _) => Err(anyhow::anyhow!("{message}")),
                (None, Some(feed)) => Ok(feed.clone()),
                (None, None) => Err(anyhow::anyhow!("no price for pool {pool_id}")),
            };
            (result, state.delays.pop_front())
        };
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_source_answers_and_fails() {
        let source = StaticPriceSource::new(PriceFeed::SqrtX64(1u128 << 64));
        let pool = Pubkey::new_unique();
        assert_eq!(source.fetch_price(pool).await.unwrap(), PriceFeed::SqrtX64(1u128 << 64));

        source.fail_with("rpc down");
        let err = source.fetch_price(pool).await.unwrap_err();
        assert!(err.to_string().contains("rpc down"));

        source.set_price(PriceFeed::SqrtX64(2u128 << 64));
        assert_eq!(source.fetch_price(pool).await.unwrap(), PriceFeed::SqrtX64(2u128 << 64));
        assert_eq!(source.fetch_count(), 3);
    }

    #[tokio::test]
    async fn test_empty_source_fails() {
        let source = StaticPriceSource::default();
        assert!(source.fetch_price(Pubkey::new_unique()).await.is_err());
    }
}
