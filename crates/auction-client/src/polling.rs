//! Bounded, cancellable polling of on-chain auction state.
//!
//! The chain has to be polled to be fresh, but polling is not free and must
//! never race a transaction the user is in the middle of confirming. The
//! scheduler therefore only runs while there is something to watch and no
//! transaction modal is open, and each activation is a bounded burst rather
//! than an open-ended loop.

use crate::rpc::AuctionStateReading;
use model::auction::RawAuctionState;
use primitive_types::H160;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time,
};

#[derive(Clone, Copy, Debug)]
pub struct PollingConfig {
    /// Delay between consecutive reads within one burst.
    pub poll_interval: Duration,
    /// Number of reads per activation. After the burst the scheduler idles
    /// until a triggering event re-arms it.
    pub max_ticks: usize,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1500),
            max_ticks: 7,
        }
    }
}

/// The latest raw readings, published by value after every tick.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PollSnapshot {
    /// Last-known-good reading per watched token.
    pub readings: HashMap<H160, RawAuctionState>,
    /// The most recent whole-batch failure, if the last tick had one. Stale
    /// readings are still served alongside it.
    pub last_error: Option<String>,
}

enum Command {
    SetTokens(Vec<H160>),
    SetModalOpen(bool),
    Trigger,
}

enum Event {
    Command(Option<Command>),
    Reading(anyhow::Result<HashMap<H160, RawAuctionState>>),
}

/// Handle to the polling task. Dropping it cancels the task immediately.
pub struct PollingScheduler {
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<PollSnapshot>,
    task: JoinHandle<()>,
}

impl PollingScheduler {
    pub fn new(reader: Arc<dyn AuctionStateReading>, config: PollingConfig) -> Self {
        let (command_sender, command_receiver) = mpsc::unbounded_channel();
        let (snapshot_sender, snapshot_receiver) = watch::channel(PollSnapshot::default());
        let poller = Poller {
            reader,
            config,
            commands: command_receiver,
            sender: snapshot_sender,
            tokens: Vec::new(),
            modal_open: false,
            remaining_ticks: 0,
            snapshot: PollSnapshot::default(),
        };
        Self {
            commands: command_sender,
            snapshots: snapshot_receiver,
            task: tokio::task::spawn(poller.run()),
        }
    }

    /// Replaces the watched token set. An actual change re-arms the burst.
    pub fn set_tokens(&self, tokens: Vec<H160>) {
        let _ = self.commands.send(Command::SetTokens(tokens));
    }

    /// Gates polling on the transaction modal. Opening the modal cancels the
    /// current burst synchronously; closing it re-arms.
    pub fn set_modal_open(&self, open: bool) {
        let _ = self.commands.send(Command::SetModalOpen(open));
    }

    /// Explicit re-arm, e.g. when an auction's closing countdown completes.
    pub fn trigger(&self) {
        let _ = self.commands.send(Command::Trigger);
    }

    pub fn snapshots(&self) -> watch::Receiver<PollSnapshot> {
        self.snapshots.clone()
    }
}

impl Drop for PollingScheduler {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct Poller {
    reader: Arc<dyn AuctionStateReading>,
    config: PollingConfig,
    commands: mpsc::UnboundedReceiver<Command>,
    sender: watch::Sender<PollSnapshot>,
    tokens: Vec<H160>,
    modal_open: bool,
    remaining_ticks: usize,
    snapshot: PollSnapshot,
}

impl Poller {
    async fn run(mut self) {
        loop {
            let event = if self.enabled() {
                let reader = self.reader.clone();
                let tokens = self.tokens.clone();
                let interval = self.config.poll_interval;
                // A command always cancels the pending tick, so a tick can
                // never fire after its precondition went away.
                tokio::select! {
                    command = self.commands.recv() => Event::Command(command),
                    result = async move {
                        time::sleep(interval).await;
                        reader.auction_states(&tokens).await
                    } => Event::Reading(result),
                }
            } else {
                Event::Command(self.commands.recv().await)
            };

            match event {
                // All handles dropped, nothing left to poll for.
                Event::Command(None) => return,
                Event::Command(Some(command)) => self.apply(command),
                Event::Reading(result) => {
                    self.remaining_ticks -= 1;
                    if !self.publish(result) {
                        return;
                    }
                }
            }
        }
    }

    fn enabled(&self) -> bool {
        !self.modal_open && !self.tokens.is_empty() && self.remaining_ticks > 0
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::SetTokens(mut tokens) => {
                tokens.sort();
                tokens.dedup();
                if tokens != self.tokens {
                    self.tokens = tokens;
                    self.rearm();
                }
            }
            Command::SetModalOpen(open) => {
                if open != self.modal_open {
                    self.modal_open = open;
                    if !open {
                        self.rearm();
                    }
                }
            }
            Command::Trigger => self.rearm(),
        }
    }

    fn rearm(&mut self) {
        self.remaining_ticks = self.config.max_ticks;
    }

    fn publish(&mut self, result: anyhow::Result<HashMap<H160, RawAuctionState>>) -> bool {
        match result {
            Ok(readings) => {
                let tokens = &self.tokens;
                self.snapshot
                    .readings
                    .retain(|token, _| tokens.contains(token));
                self.snapshot.readings.extend(readings);
                self.snapshot.last_error = None;
            }
            Err(err) => {
                tracing::warn!(?err, "auction state poll failed");
                self.snapshot.last_error = Some(format!("{err:#}"));
            }
        }
        self.sender.send(self.snapshot.clone()).is_ok()
    }
}
