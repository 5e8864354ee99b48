//! Keyed expiry table driving the bounded "new bid" highlight.
//!
//! Every armed entry is cleared by exactly one timer. Re-arming an already
//! pulsing token replaces its expiry instead of stacking a second timer; the
//! replaced timer notices it lost ownership and does nothing.

use primitive_types::H160;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};
use tokio::{
    sync::mpsc,
    time::{self, Instant},
};

pub struct PulseTable {
    entries: Arc<Mutex<HashMap<H160, u64>>>,
    expiries: mpsc::UnboundedSender<H160>,
    generation: AtomicU64,
    ttl: Duration,
}

impl PulseTable {
    /// Creates a table whose entries live for `ttl` after their latest arm.
    /// The receiver yields each token once when its entry expires.
    pub fn new(ttl: Duration) -> (Self, mpsc::UnboundedReceiver<H160>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                entries: Default::default(),
                expiries: sender,
                generation: AtomicU64::new(0),
                ttl,
            },
            receiver,
        )
    }

    /// Starts (or restarts) the pulse for `token`.
    pub fn arm(&self, token: H160) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        // The deadline is fixed here so that it counts from the arm, not
        // from whenever the timer task first gets polled.
        let deadline = Instant::now() + self.ttl;
        self.entries.lock().unwrap().insert(token, generation);

        let entries = Arc::clone(&self.entries);
        let expiries = self.expiries.clone();
        tokio::task::spawn(async move {
            time::sleep_until(deadline).await;
            {
                let mut entries = entries.lock().unwrap();
                // A later arm owns the entry now; this timer is stale.
                if entries.get(&token) != Some(&generation) {
                    return;
                }
                entries.remove(&token);
            }
            let _ = expiries.send(token);
        });
    }

    pub fn is_pulsing(&self, token: &H160) -> bool {
        self.entries.lock().unwrap().contains_key(token)
    }

    /// All currently pulsing tokens, ordered by address.
    pub fn active(&self) -> Vec<H160> {
        let mut tokens = self
            .entries
            .lock()
            .unwrap()
            .keys()
            .copied()
            .collect::<Vec<_>>();
        tokens.sort();
        tokens
    }
}
