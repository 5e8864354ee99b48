//! Merging the indexer's lagged view with direct RPC readings.
//!
//! Neither source agrees with the chain head at any given instant: the
//! indexer is consistent but seconds to tens of seconds behind, RPC readings
//! are fresh but sparse (current leader only, no history, no lot metadata).
//! The engine folds both into one view that never goes backwards and reports
//! which tokens' leading bid genuinely advanced, so the UI can react to real
//! events instead of re-renders of stale data.

use model::auction::{Auction, RawAuctionState};
use primitive_types::H160;
use std::collections::{BTreeSet, HashMap};

/// The result of one merge step.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct MergeOutcome {
    /// One record per known ongoing auction, ordered by token address.
    /// Presentation order (participant-first etc.) is the caller's business.
    pub merged: Vec<Auction>,
    /// Tokens whose `highest_bid` strictly advanced relative to the previous
    /// merge. Compared by value; re-reading identical data never fires.
    pub new_bids: Vec<H160>,
}

/// Stateful merge engine. The previous merged view is kept only to ratchet
/// bids and compute the new-bid delta; it does not outlive the session.
#[derive(Default)]
pub struct ReconciliationEngine {
    previous: HashMap<H160, Auction>,
}

impl ReconciliationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges one indexer snapshot (`None` when the indexer query failed)
    /// with the latest RPC readings.
    ///
    /// Synchronous on purpose: every producer triggers exactly one merge per
    /// scheduling tick, so two merges can never interleave.
    pub fn merge(
        &mut self,
        indexer: Option<&[Auction]>,
        rpc: &HashMap<H160, RawAuctionState>,
    ) -> MergeOutcome {
        let indexed = indexer.map(|auctions| {
            auctions
                .iter()
                .map(|auction| (auction.token, auction))
                .collect::<HashMap<_, _>>()
        });

        // With a live indexer, membership is indexer ∪ rpc (the indexer is
        // authoritative for which auctions exist). During an outage the last
        // merged view stands in for it.
        let mut tokens = BTreeSet::new();
        match &indexed {
            Some(indexed) => tokens.extend(indexed.keys().copied()),
            None => tokens.extend(self.previous.keys().copied()),
        }
        tokens.extend(rpc.keys().copied());

        let mut merged = Vec::with_capacity(tokens.len());
        let mut new_bids = Vec::new();
        for token in tokens {
            let indexer_record = indexed
                .as_ref()
                .and_then(|indexed| indexed.get(&token).copied());
            let reading = rpc.get(&token);
            let previous = self.previous.get(&token);

            let Some(mut candidate) = merge_sources(token, indexer_record, reading, previous)
            else {
                continue;
            };

            // The ratchet: for an unchanged instance the engine never reports
            // less than it already reported, no matter how stale the sources
            // that produced the candidate. A different start_time is a new
            // instance and starts over from zero.
            match previous.filter(|previous| previous.start_time == candidate.start_time) {
                Some(previous) if previous.highest_bid > candidate.highest_bid => {
                    candidate.highest_bid = previous.highest_bid;
                    candidate.highest_bidder = previous.highest_bidder;
                }
                Some(previous) if candidate.highest_bid > previous.highest_bid => {
                    new_bids.push(token);
                }
                Some(_) => (),
                None => {
                    if !candidate.highest_bid.is_zero() {
                        new_bids.push(token);
                    }
                }
            }

            merged.push(candidate);
        }

        self.previous = merged
            .iter()
            .map(|auction| (auction.token, auction.clone()))
            .collect();

        MergeOutcome { merged, new_bids }
    }
}

/// Combines at most one record per source into a candidate, keeping bid and
/// bidder an atomic pair from whichever source wins.
fn merge_sources(
    token: H160,
    indexer_record: Option<&Auction>,
    reading: Option<&RawAuctionState>,
    previous: Option<&Auction>,
) -> Option<Auction> {
    match (indexer_record, reading) {
        (Some(indexer), Some(rpc)) => {
            if rpc.start_time > indexer.start_time {
                // The indexer is a whole instance behind.
                Some(from_reading(token, rpc, previous))
            } else if rpc.start_time < indexer.start_time || rpc.highest_bid <= indexer.highest_bid
            {
                // Stale reading, or a tie: the indexer pair carries the
                // fuller record.
                Some(indexer.clone())
            } else {
                Some(Auction {
                    highest_bid: rpc.highest_bid,
                    highest_bidder: rpc.highest_bidder,
                    ..indexer.clone()
                })
            }
        }
        (Some(indexer), None) => Some(indexer.clone()),
        (None, Some(rpc)) => Some(from_reading(token, rpc, previous)),
        // Indexer outage and no fresh reading: last known good stands.
        (None, None) => previous.cloned(),
    }
}

/// An auction built from an RPC reading alone. Indexer-only fields survive
/// from the previous merge when it described the same instance.
fn from_reading(token: H160, rpc: &RawAuctionState, previous: Option<&Auction>) -> Auction {
    let cached = previous.filter(|previous| previous.start_time == rpc.start_time);
    Auction {
        token,
        lot_amount: cached.map(|cached| cached.lot_amount).unwrap_or_default(),
        start_time: rpc.start_time,
        highest_bid: rpc.highest_bid,
        highest_bidder: rpc.highest_bidder,
        participants: cached
            .map(|cached| cached.participants.clone())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::hashmap;
    use model::auction::Participant;
    use primitive_types::U256;

    const START: u64 = 1_700_000_000;

    fn token() -> H160 {
        H160([1; 20])
    }

    fn indexer_auction(bid: u64, bidder: H160) -> Auction {
        Auction {
            token: token(),
            lot_amount: U256::from(50),
            start_time: START,
            highest_bid: U256::from(bid),
            highest_bidder: bidder,
            participants: vec![Participant {
                bidder,
                bid: U256::from(bid),
            }],
        }
    }

    fn reading(bid: u64, bidder: H160) -> RawAuctionState {
        RawAuctionState {
            highest_bid: U256::from(bid),
            highest_bidder: bidder,
            start_time: START,
        }
    }

    #[test]
    fn fresher_rpc_bid_wins_with_its_bidder() {
        let mut engine = ReconciliationEngine::new();
        let indexer = [indexer_auction(100, H160([2; 20]))];
        let rpc = hashmap! { token() => reading(120, H160([3; 20])) };

        let outcome = engine.merge(Some(&indexer), &rpc);

        assert_eq!(outcome.merged.len(), 1);
        let merged = &outcome.merged[0];
        // Atomic pairing: the RPC bid comes with the RPC bidder.
        assert_eq!(merged.highest_bid, U256::from(120));
        assert_eq!(merged.highest_bidder, H160([3; 20]));
        // Indexer-only fields still come from the indexer record.
        assert_eq!(merged.lot_amount, U256::from(50));
        assert_eq!(merged.participants.len(), 1);
        assert_eq!(outcome.new_bids, vec![token()]);
    }

    #[test]
    fn race_detects_the_new_bid_exactly_once() {
        let mut engine = ReconciliationEngine::new();
        let indexer = [indexer_auction(100, H160([2; 20]))];

        let outcome = engine.merge(Some(&indexer), &HashMap::new());
        assert_eq!(outcome.new_bids, vec![token()]);

        // RPC observes a bid the indexer has not caught up to yet.
        let rpc = hashmap! { token() => reading(120, H160([3; 20])) };
        let outcome = engine.merge(Some(&indexer), &rpc);
        assert_eq!(outcome.new_bids, vec![token()]);

        // The lagging indexer refresh must neither regress the merged value
        // nor re-fire the detection.
        let outcome = engine.merge(Some(&indexer), &rpc);
        assert_eq!(outcome.merged[0].highest_bid, U256::from(120));
        assert_eq!(outcome.merged[0].highest_bidder, H160([3; 20]));
        assert!(outcome.new_bids.is_empty());
    }

    #[test]
    fn ratchet_survives_stale_sources() {
        let mut engine = ReconciliationEngine::new();
        let rpc = hashmap! { token() => reading(120, H160([3; 20])) };
        engine.merge(Some(&[indexer_auction(100, H160([2; 20]))]), &rpc);

        // Both sources report less than what was already merged.
        let outcome = engine.merge(Some(&[indexer_auction(100, H160([2; 20]))]), &HashMap::new());

        let merged = &outcome.merged[0];
        assert_eq!(merged.highest_bid, U256::from(120));
        assert_eq!(merged.highest_bidder, H160([3; 20]));
        assert!(outcome.new_bids.is_empty());
    }

    #[test]
    fn merging_identical_snapshots_is_idempotent() {
        let mut engine = ReconciliationEngine::new();
        let indexer = [indexer_auction(100, H160([2; 20]))];

        let first = engine.merge(Some(&indexer), &HashMap::new());
        assert_eq!(first.new_bids, vec![token()]);

        // A fresh, equal-by-value snapshot (new allocation on purpose).
        let second = engine.merge(Some(&indexer.to_vec()), &HashMap::new());
        assert_eq!(second.merged, first.merged);
        assert!(second.new_bids.is_empty());
    }

    #[test]
    fn tie_prefers_the_indexer_pair() {
        let mut engine = ReconciliationEngine::new();
        let indexer = [indexer_auction(100, H160([2; 20]))];
        let rpc = hashmap! { token() => reading(100, H160([3; 20])) };

        let outcome = engine.merge(Some(&indexer), &rpc);

        assert_eq!(outcome.merged[0].highest_bidder, H160([2; 20]));
    }

    #[test]
    fn indexer_outage_degrades_to_last_known_good_plus_rpc() {
        let mut engine = ReconciliationEngine::new();
        let other = H160([7; 20]);
        engine.merge(Some(&[indexer_auction(100, H160([2; 20]))]), &HashMap::new());

        let rpc = hashmap! {
            token() => reading(120, H160([3; 20])),
            other => RawAuctionState {
                highest_bid: U256::from(5),
                highest_bidder: H160([4; 20]),
                start_time: START,
            },
        };
        let outcome = engine.merge(None, &rpc);

        assert_eq!(outcome.merged.len(), 2);
        let known = outcome
            .merged
            .iter()
            .find(|auction| auction.token == token())
            .unwrap();
        // Cached indexer fields survive the outage.
        assert_eq!(known.lot_amount, U256::from(50));
        assert_eq!(known.highest_bid, U256::from(120));
        let fresh = outcome
            .merged
            .iter()
            .find(|auction| auction.token == other)
            .unwrap();
        // Never seen by the indexer: no lot, no participants.
        assert!(fresh.lot_amount.is_zero());
        assert!(fresh.participants.is_empty());
        assert_eq!(outcome.new_bids, vec![token(), other]);
    }

    #[test]
    fn outage_without_readings_keeps_the_previous_view() {
        let mut engine = ReconciliationEngine::new();
        let first = engine.merge(Some(&[indexer_auction(100, H160([2; 20]))]), &HashMap::new());

        let outcome = engine.merge(None, &HashMap::new());
        assert_eq!(outcome.merged, first.merged);
        assert!(outcome.new_bids.is_empty());
    }

    #[test]
    fn settled_auctions_leave_the_view() {
        let mut engine = ReconciliationEngine::new();
        engine.merge(Some(&[indexer_auction(100, H160([2; 20]))]), &HashMap::new());

        let outcome = engine.merge(Some(&[]), &HashMap::new());
        assert!(outcome.merged.is_empty());
    }

    #[test]
    fn new_instance_resets_the_ratchet() {
        let mut engine = ReconciliationEngine::new();
        engine.merge(Some(&[indexer_auction(500, H160([2; 20]))]), &HashMap::new());

        // The token's next auction opens with a small first bid; the RPC
        // reading carries a newer start_time than the lagging indexer.
        let indexer = [indexer_auction(500, H160([2; 20]))];
        let rpc = hashmap! { token() => RawAuctionState {
            highest_bid: U256::from(10),
            highest_bidder: H160([5; 20]),
            start_time: START + 1000,
        } };
        let outcome = engine.merge(Some(&indexer), &rpc);

        let merged = &outcome.merged[0];
        assert_eq!(merged.start_time, START + 1000);
        assert_eq!(merged.highest_bid, U256::from(10));
        assert_eq!(merged.highest_bidder, H160([5; 20]));
        // A lower bid than the old instance's 500 is still a new bid.
        assert_eq!(outcome.new_bids, vec![token()]);
    }

    #[test]
    fn stale_rpc_instance_is_ignored() {
        let mut engine = ReconciliationEngine::new();
        let mut newer = indexer_auction(10, H160([2; 20]));
        newer.start_time = START + 1000;
        let rpc = hashmap! { token() => reading(500, H160([3; 20])) };

        let outcome = engine.merge(Some(&[newer.clone()]), &rpc);

        assert_eq!(outcome.merged, vec![newer]);
    }

    #[test]
    fn merged_output_is_ordered_by_token() {
        let mut engine = ReconciliationEngine::new();
        let mut a = indexer_auction(1, H160([2; 20]));
        a.token = H160([9; 20]);
        let mut b = indexer_auction(2, H160([2; 20]));
        b.token = H160([3; 20]);

        let outcome = engine.merge(Some(&[a, b]), &HashMap::new());
        let tokens = outcome
            .merged
            .iter()
            .map(|auction| auction.token)
            .collect::<Vec<_>>();
        assert_eq!(tokens, vec![H160([3; 20]), H160([9; 20])]);
    }
}
