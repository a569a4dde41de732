//! Async boundary around the position store.
//!
//! One task owns the [`PositionStore`] and processes commands in arrival
//! order. Price fetches run in spawned tasks and come back through a result
//! channel as `PriceRefreshed` events, so they never interleave with an edit.

use anyhow::anyhow;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info};

use super::pool::{PoolInfo, PriceFeed};
use super::price_source::PriceSourceRef;
use super::store::{PositionSnapshot, PositionStore, RefreshTicket, StoreEvent};
use crate::common::config::EngineConfig;
use crate::common::types::{AnyResult, Side, TokenDescriptor};
use crate::utils::calc::rational::Rational;

const COMMAND_QUEUE_SIZE: usize = 256;

enum Command {
    Event(StoreEvent),
    RefreshPrice,
    /// Answers once every earlier command has been applied
    Barrier(oneshot::Sender<Arc<PositionSnapshot>>),
    Shutdown,
}

type RefreshResult = (RefreshTicket, Result<PriceFeed, String>);

/// Mutator entry points and snapshot subscription for UI collaborators.
#[derive(Clone)]
pub struct EditorHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<Arc<PositionSnapshot>>,
}

impl EditorHandle {
    async fn send(&self, command: Command) -> AnyResult<()> {
        self.commands.send(command).await.map_err(|_| anyhow!("position driver stopped"))
    }

    pub async fn dispatch(&self, event: StoreEvent) -> AnyResult<()> {
        self.send(Command::Event(event)).await
    }

    pub async fn select_token(&self, side: Side, token: TokenDescriptor) -> AnyResult<()> {
        self.dispatch(StoreEvent::SelectToken { side, token }).await
    }

    pub async fn pool_loaded(&self, pool: PoolInfo) -> AnyResult<()> {
        self.dispatch(StoreEvent::PoolLoaded(pool)).await
    }

    pub async fn set_range(&self, lower: Rational, upper: Rational) -> AnyResult<()> {
        self.dispatch(StoreEvent::SetRange { lower, upper }).await
    }

    pub async fn set_amount(&self, side: Side, text: impl Into<String>) -> AnyResult<()> {
        self.dispatch(StoreEvent::SetAmount { side, text: text.into() }).await
    }

    pub async fn set_focused_side(&self, side: Side) -> AnyResult<()> {
        self.dispatch(StoreEvent::SetFocusedSide(side)).await
    }

    pub async fn set_user_price(&self, price: Rational) -> AnyResult<()> {
        self.dispatch(StoreEvent::SetUserPrice(price)).await
    }

    pub async fn set_slippage(&self, slippage: Rational) -> AnyResult<()> {
        self.dispatch(StoreEvent::SetSlippage(slippage)).await
    }

    pub async fn reset(&self) -> AnyResult<()> {
        self.dispatch(StoreEvent::Reset).await
    }

    /// Starts a price fetch for the loaded pool. Earlier in-flight fetches
    /// are superseded.
    pub async fn refresh_price(&self) -> AnyResult<()> {
        self.send(Command::RefreshPrice).await
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> Arc<PositionSnapshot> {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<PositionSnapshot>> {
        self.snapshots.clone()
    }

    /// Waits until every command sent before this call has been applied.
    pub async fn flush(&self) -> AnyResult<Arc<PositionSnapshot>> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Barrier(tx)).await?;
        rx.await.map_err(|_| anyhow!("position driver stopped"))
    }

    pub async fn shutdown(&self) -> AnyResult<()> {
        self.send(Command::Shutdown).await
    }
}

pub struct PositionDriver {
    store: PositionStore,
    source: PriceSourceRef,
    publish: watch::Sender<Arc<PositionSnapshot>>,
    results_tx: mpsc::UnboundedSender<RefreshResult>,
    refresh_interval: Option<Duration>,
    /// Latest refresh whose result has not come back yet
    in_flight: Option<RefreshTicket>,
}

impl PositionDriver {
    /// Spawns the driver on the current tokio runtime.
    pub fn spawn(config: &EngineConfig, source: PriceSourceRef) -> (EditorHandle, JoinHandle<()>) {
        let store = PositionStore::new(config);
        let (publish, snapshots) = watch::channel(store.snapshot());
        let (commands, commands_rx) = mpsc::channel(COMMAND_QUEUE_SIZE);
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        let driver = Self {
            store,
            source,
            publish,
            results_tx,
            refresh_interval: config.price_refresh_interval_ms.map(Duration::from_millis),
            in_flight: None,
        };
        let task = tokio::spawn(driver.run(commands_rx, results_rx));
        (EditorHandle { commands, snapshots }, task)
    }

    async fn run(mut self, mut commands: mpsc::Receiver<Command>, mut results: mpsc::UnboundedReceiver<RefreshResult>) {
        let mut ticker: Option<Interval> = self.refresh_interval.map(|period| {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker
        });

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Event(event)) => self.apply(event),
                    Some(Command::RefreshPrice) => self.start_refresh(),
                    Some(Command::Barrier(reply)) => {
                        let _ = reply.send(self.store.snapshot());
                    }
                    Some(Command::Shutdown) | None => break,
                },
                Some((ticket, feed)) = results.recv() => {
                    if self.in_flight == Some(ticket) {
                        self.in_flight = None;
                    }
                    self.apply(StoreEvent::PriceRefreshed { ticket, feed });
                }
                _ = next_tick(&mut ticker) => self.periodic_refresh(),
            }
        }
        info!("position driver stopped at version {}", self.store.snapshot().version);
    }

    fn apply(&mut self, event: StoreEvent) {
        let snapshot = self.store.dispatch(event);
        self.publish.send_replace(snapshot);
    }

    /// Skips the tick while the latest refresh is still in flight.
    fn periodic_refresh(&mut self) {
        if let Some(ticket) = self.in_flight {
            if self.store.is_latest_refresh(ticket) {
                debug!("periodic refresh skipped, ticket {} still in flight", ticket.0);
                return;
            }
        }
        self.start_refresh();
    }

    fn start_refresh(&mut self) {
        let Some(pool_id) = self.pool_id() else {
            debug!("price refresh skipped, no pool loaded");
            return;
        };
        let ticket = self.store.issue_refresh();
        self.in_flight = Some(ticket);
        let fetch = self.source.fetch_price(pool_id);
        let results = self.results_tx.clone();
        tokio::spawn(async move {
            let feed = fetch.await.map_err(|e| format!("{e:#}"));
            // 驱动已退出时丢弃结果
            let _ = results.send((ticket, feed));
        });
    }

    fn pool_id(&self) -> Option<Pubkey> {
        self.store.snapshot().pool.as_ref().map(|p| p.id)
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
