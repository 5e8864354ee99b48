//! Contains models that are shared between the auction engine and its
//! indexer and RPC read layers.

pub mod auction;
pub mod u256_decimal;

use anyhow::{anyhow, Result};
use primitive_types::H160;
use std::str::FromStr;

/// Parses a token or bidder address from an external string source.
///
/// Both data sources render addresses with inconsistent casing (the indexer
/// lowercases, wallets checksum). All string-to-address conversions go through
/// here so that identity comparisons further down are plain `H160` equality
/// and never string comparisons.
pub fn parse_address(s: &str) -> Result<H160> {
    let hex = s.trim();
    let hex = hex.strip_prefix("0x").unwrap_or(hex);
    H160::from_str(hex).map_err(|err| anyhow!("invalid address {s:?}: {err}"))
}
