//! Module defining a fee auction as seen by the client.

use crate::u256_decimal;
use primitive_types::{H160, U256};
use serde::{Deserialize, Serialize};

/// One auction instance for a token's accrued fee balance.
///
/// An instance is identified by `(token, start_time)`. The `highest_bid` and
/// `highest_bidder` fields form an atomic pair: both always originate from
/// the same data source.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Auction {
    /// The collateral token whose fee balance is being sold.
    pub token: H160,

    /// The fee balance being auctioned, in the token's smallest unit.
    #[serde(with = "u256_decimal")]
    pub lot_amount: U256,

    /// Unix timestamp at which the auction was started on chain. Immutable
    /// for the life of the instance.
    pub start_time: u64,

    /// The currently leading bid in the payment token's smallest unit.
    /// Never decreases for one instance.
    #[serde(with = "u256_decimal")]
    pub highest_bid: U256,

    /// The address holding `highest_bid`.
    pub highest_bidder: H160,

    /// The viewer's own bidding history on this instance. Only the indexer
    /// enumerates bidders; RPC reads know the current leader alone.
    pub participants: Vec<Participant>,
}

/// A single bid of the viewer on an auction.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Participant {
    pub bidder: H160,
    #[serde(with = "u256_decimal")]
    pub bid: U256,
}

/// Raw auction state as read directly from the chain.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RawAuctionState {
    pub highest_bid: U256,
    pub highest_bidder: H160,
    pub start_time: u64,
}

/// The protocol constants governing one auction's timeline.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct AuctionTiming {
    /// How long bids are accepted after the start, in seconds.
    pub duration: u64,
    /// Mandatory wait after the end before the next auction for the same
    /// token may start, in seconds.
    pub cooldown: u64,
}

impl AuctionTiming {
    /// First second at which the auction no longer accepts bids.
    pub fn end_time(&self, start_time: u64) -> u64 {
        start_time.saturating_add(self.duration)
    }

    /// First second at which a new auction for the same token may start.
    pub fn restart_time(&self, start_time: u64) -> u64 {
        self.end_time(start_time).saturating_add(self.cooldown)
    }

    pub fn phase(&self, start_time: u64, now: u64) -> AuctionPhase {
        if now < start_time {
            AuctionPhase::NotStarted
        } else if now < self.end_time(start_time) {
            AuctionPhase::Ongoing
        } else {
            AuctionPhase::Closable
        }
    }
}

/// Where one auction instance is on its timeline.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AuctionPhase {
    /// No auction record exists yet or its start lies in the future.
    NotStarted,
    /// Bids are being accepted.
    Ongoing,
    /// The bidding window has passed and the auction is eligible for
    /// settlement.
    Closable,
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: u64 = 3600;

    #[test]
    fn phase_follows_the_timeline() {
        let timing = AuctionTiming {
            duration: 24 * HOUR,
            cooldown: 6 * HOUR,
        };
        let start = 1_700_000_000;

        assert_eq!(timing.phase(start, start - 1), AuctionPhase::NotStarted);
        assert_eq!(timing.phase(start, start), AuctionPhase::Ongoing);
        assert_eq!(
            timing.phase(start, start + 24 * HOUR - 1),
            AuctionPhase::Ongoing
        );
        assert_eq!(
            timing.phase(start, start + 24 * HOUR),
            AuctionPhase::Closable
        );
        assert_eq!(timing.restart_time(start), start + 30 * HOUR);
    }

    #[test]
    fn roundtrips_auction() {
        let auction = Auction {
            token: H160([1; 20]),
            lot_amount: U256::from(50),
            start_time: 1_700_000_000,
            highest_bid: U256::from_dec_str("1050000000000000000").unwrap(),
            highest_bidder: H160([2; 20]),
            participants: vec![Participant {
                bidder: H160([2; 20]),
                bid: U256::from_dec_str("1050000000000000000").unwrap(),
            }],
        };

        assert_eq!(
            serde_json::to_value(&auction).unwrap(),
            serde_json::json!({
                "token": "0x0101010101010101010101010101010101010101",
                "lot_amount": "50",
                "start_time": 1_700_000_000u64,
                "highest_bid": "1050000000000000000",
                "highest_bidder": "0x0202020202020202020202020202020202020202",
                "participants": [{
                    "bidder": "0x0202020202020202020202020202020202020202",
                    "bid": "1050000000000000000",
                }],
            }),
        );
        assert_eq!(
            serde_json::from_value::<Auction>(serde_json::to_value(&auction).unwrap()).unwrap(),
            auction,
        );
    }
}
