//! The task that ties indexer refreshes, RPC polling, reconciliation, and
//! pulse bookkeeping together.
//!
//! One task owns the engine and the pulse table; every producer (slow indexer
//! timer, polling snapshots, pulse expiries) is funneled through one event
//! loop, so merges never interleave and shared state has a single writer.

use crate::{
    lifecycle::{classify_auctions, Classification},
    polling::{PollingConfig, PollingScheduler},
    pulse::PulseTable,
    reconcile::ReconciliationEngine,
    rpc::AuctionStateReading,
    subgraph::AuctionIndexing,
};
use anyhow::Result;
use model::auction::{Auction, AuctionTiming};
use primitive_types::H160;
use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time,
};

/// Invoked once per genuinely detected bid increase.
pub type NewBidCallback = Box<dyn Fn(H160) + Send + Sync>;

#[derive(Clone, Debug)]
pub struct MonitorConfig {
    /// Address whose bid history the indexer scopes `participants` to.
    pub viewer: Option<H160>,
    pub wrapped_native: H160,
    pub timing: AuctionTiming,
    /// Cadence of the slow indexer snapshot refresh.
    pub indexer_refresh: Duration,
    pub polling: PollingConfig,
    /// Lifetime of the new-bid highlight.
    pub pulse_ttl: Duration,
}

/// The merged, bidder-facing state of all ongoing auctions.
#[derive(Clone, Debug, Default)]
pub struct AuctionView {
    /// Merged auctions, ordered by token address. Presentation sorting
    /// (participant-first etc.) happens in the UI layer.
    pub auctions: Vec<Auction>,
    /// Tokens whose new-bid highlight is currently active.
    pub pulsing: Vec<H160>,
    /// Set while a source is failing and the view may be stale. Indexer data
    /// keeps being shown regardless.
    pub degraded: bool,
}

/// Handle to the monitor. Dropping it tears down the event loop and the
/// polling scheduler.
pub struct AuctionMonitor {
    indexer: Arc<dyn AuctionIndexing>,
    scheduler: PollingScheduler,
    views: watch::Receiver<AuctionView>,
    wrapped_native: H160,
    timing: AuctionTiming,
    task: JoinHandle<()>,
}

impl AuctionMonitor {
    pub fn new(
        indexer: Arc<dyn AuctionIndexing>,
        reader: Arc<dyn AuctionStateReading>,
        config: MonitorConfig,
        on_new_bid: Option<NewBidCallback>,
    ) -> Self {
        let scheduler = PollingScheduler::new(reader, config.polling);
        let (views_sender, views_receiver) = watch::channel(AuctionView::default());
        let (pulses, expiries) = PulseTable::new(config.pulse_ttl);
        let task = MonitorTask {
            indexer: Arc::clone(&indexer),
            engine: ReconciliationEngine::new(),
            pulses,
            expiries,
            snapshots: scheduler.snapshots(),
            views: views_sender,
            viewer: config.viewer,
            indexer_refresh: config.indexer_refresh,
            on_new_bid,
            indexer_auctions: None,
            indexer_healthy: false,
            rpc_error: None,
            merged: Vec::new(),
        };
        Self {
            indexer,
            scheduler,
            views: views_receiver,
            wrapped_native: config.wrapped_native,
            timing: config.timing,
            task: tokio::task::spawn(task.run()),
        }
    }

    /// The merged view, updated on every merge and every pulse expiry.
    pub fn views(&self) -> watch::Receiver<AuctionView> {
        self.views.clone()
    }

    /// Tells the poller which tokens are currently on screen.
    pub fn set_watched_tokens(&self, tokens: Vec<H160>) {
        self.scheduler.set_tokens(tokens);
    }

    /// Gates RPC polling while a bid or top-up modal is open.
    pub fn set_modal_open(&self, open: bool) {
        self.scheduler.set_modal_open(open);
    }

    /// Re-arms polling when an auction's closing countdown completes.
    pub fn countdown_completed(&self) {
        self.scheduler.trigger();
    }

    /// Classifies `candidate_tokens` by start eligibility against fresh fee
    /// balances and the current merged view.
    pub async fn classification(&self, candidate_tokens: &[H160]) -> Result<Classification> {
        let fees = self.indexer.fee_balances(candidate_tokens).await?;
        let auctions = self.views.borrow().auctions.clone();
        Ok(classify_auctions(
            &fees,
            &auctions,
            &self.timing,
            self.wrapped_native,
            unix_now(),
        ))
    }
}

impl Drop for AuctionMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

enum Tick {
    Refresh,
    Snapshot,
    Expiry,
    Shutdown,
}

struct MonitorTask {
    indexer: Arc<dyn AuctionIndexing>,
    engine: ReconciliationEngine,
    pulses: PulseTable,
    expiries: mpsc::UnboundedReceiver<H160>,
    snapshots: watch::Receiver<crate::polling::PollSnapshot>,
    views: watch::Sender<AuctionView>,
    viewer: Option<H160>,
    indexer_refresh: Duration,
    on_new_bid: Option<NewBidCallback>,
    /// The last successful indexer snapshot. Kept across indexer outages so
    /// the richer indexer fields never vanish from the view.
    indexer_auctions: Option<Vec<Auction>>,
    indexer_healthy: bool,
    rpc_error: Option<String>,
    merged: Vec<Auction>,
}

impl MonitorTask {
    async fn run(mut self) {
        let mut refresh = time::interval(self.indexer_refresh);
        loop {
            let tick = tokio::select! {
                _ = refresh.tick() => Tick::Refresh,
                changed = self.snapshots.changed() => match changed {
                    Ok(()) => Tick::Snapshot,
                    Err(_) => Tick::Shutdown,
                },
                expired = self.expiries.recv() => match expired {
                    Some(_) => Tick::Expiry,
                    None => Tick::Shutdown,
                },
            };

            let receivers_alive = match tick {
                Tick::Refresh => {
                    match self.indexer.ongoing_auctions(self.viewer).await {
                        Ok(auctions) => {
                            self.indexer_auctions = Some(auctions);
                            self.indexer_healthy = true;
                        }
                        Err(err) => {
                            tracing::warn!(?err, "indexer refresh failed");
                            self.indexer_healthy = false;
                        }
                    }
                    self.merge_and_publish()
                }
                Tick::Snapshot => self.merge_and_publish(),
                Tick::Expiry => self.publish(),
                Tick::Shutdown => return,
            };
            if !receivers_alive {
                return;
            }
        }
    }

    fn merge_and_publish(&mut self) -> bool {
        let snapshot = self.snapshots.borrow_and_update().clone();
        let outcome = self
            .engine
            .merge(self.indexer_auctions.as_deref(), &snapshot.readings);
        self.merged = outcome.merged;
        self.rpc_error = snapshot.last_error;
        for token in outcome.new_bids {
            self.pulses.arm(token);
            if let Some(on_new_bid) = &self.on_new_bid {
                on_new_bid(token);
            }
        }
        self.publish()
    }

    fn publish(&mut self) -> bool {
        self.views
            .send(AuctionView {
                auctions: self.merged.clone(),
                pulsing: self.pulses.active(),
                degraded: !self.indexer_healthy || self.rpc_error.is_some(),
            })
            .is_ok()
    }
}
