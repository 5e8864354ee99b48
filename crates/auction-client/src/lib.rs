//! Client-side engine for the protocol's fee auctions.
//!
//! Accrued trading fees are liquidated through ascending-bid auctions paid in
//! wrapped native token. This crate keeps a bidder's view of those auctions
//! correct and timely by reconciling two disagreeing read sources (the lagged
//! subgraph and fresh-but-polled RPC reads), classifies which tokens can have
//! an auction started, and validates bids before they ever reach a wallet.

pub mod arguments;
pub mod bids;
pub mod lifecycle;
pub mod monitor;
pub mod polling;
pub mod pulse;
pub mod reconcile;
pub mod rpc;
pub mod subgraph;
pub mod submission;
pub mod tracing;
