//! Classification of fee-accruing tokens into "ready to start" and "on hold".

use itertools::{Either, Itertools};
use model::auction::{Auction, AuctionTiming};
use primitive_types::{H160, U256};
use std::collections::HashMap;

/// What submitting the "start" action for a token actually does.
///
/// Nobody bids wrapped native against itself, so for that token the action
/// collects the accrued fees directly instead of opening an auction.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StartAction {
    StartAuction,
    CollectFees,
}

/// A token eligible (now or later) for a new auction.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StartableAuction {
    pub token: H160,
    /// The fee balance that would be put up for sale.
    pub lot_amount: U256,
    /// Unix timestamp from which a new auction may start. Zero when it can
    /// start immediately.
    pub time_to_start: u64,
    pub action: StartAction,
}

/// Disjoint partition of the startable tokens.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Classification {
    pub ready_to_start: Vec<StartableAuction>,
    pub on_hold: Vec<StartableAuction>,
}

/// Partitions every token with a known fee balance by start eligibility.
///
/// Tokens without an entry in `fees` are omitted entirely: a startable
/// auction must never be shown with an unknown lot size. `auctions` may
/// contain multiple instances per token; only the most recent one counts.
pub fn classify_auctions(
    fees: &HashMap<H160, U256>,
    auctions: &[Auction],
    timing: &AuctionTiming,
    wrapped_native: H160,
    now: u64,
) -> Classification {
    let mut latest: HashMap<H160, &Auction> = HashMap::new();
    for auction in auctions {
        let entry = latest.entry(auction.token).or_insert(auction);
        if auction.start_time > entry.start_time {
            *entry = auction;
        }
    }

    let action = |token| {
        if token == wrapped_native {
            StartAction::CollectFees
        } else {
            StartAction::StartAuction
        }
    };

    let (mut ready_to_start, mut on_hold): (Vec<_>, Vec<_>) = fees
        .iter()
        .filter_map(|(&token, &lot_amount)| {
            let restart_time = latest
                .get(&token)
                .map(|auction| timing.restart_time(auction.start_time));
            match restart_time {
                Some(restart_time) if restart_time > now => Some(Either::Right(StartableAuction {
                    token,
                    lot_amount,
                    time_to_start: restart_time,
                    action: action(token),
                })),
                _ if lot_amount.is_zero() => None,
                _ => Some(Either::Left(StartableAuction {
                    token,
                    lot_amount,
                    time_to_start: 0,
                    action: action(token),
                })),
            }
        })
        .partition_map(|either| either);

    let order = |auction: &StartableAuction| (std::cmp::Reverse(auction.lot_amount), auction.token);
    ready_to_start.sort_by_key(order);
    on_hold.sort_by_key(order);

    Classification {
        ready_to_start,
        on_hold,
    }
}
