//! Validation of new bids and leader top-ups.
//!
//! All amounts are integers in the payment token's smallest unit. The
//! minimum-bid formula must match the auction contract bit for bit; a bid the
//! client accepts but the contract rejects is a hard failure for the user,
//! not something that can be retried.

use primitive_types::U256;
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq)]
pub enum BidValidationError {
    /// The proposed amount does not exceed the required strict premium over
    /// the standing bid. Carries the threshold that must be exceeded.
    #[error("bid must exceed {minimum}")]
    BelowMinimum { minimum: U256 },
    #[error("amount exceeds the payment token balance")]
    InsufficientBalance,
    #[error("amount must be greater than zero")]
    ZeroAmount,
}

/// The contract's minimum-bid formula: `current * (100 + pct) / 100` with
/// floor division. A valid bid must be strictly greater than this value.
pub fn min_next_bid(current_bid: U256, increment_pct: u32) -> U256 {
    current_bid * U256::from(100 + increment_pct) / U256::from(100)
}

/// Validates a bid from an address that is not the current leader. The
/// proposed amount replaces the standing bid entirely.
pub fn validate_new_bid(
    proposed: U256,
    current_bid: U256,
    increment_pct: u32,
    balance: U256,
) -> Result<(), BidValidationError> {
    if proposed.is_zero() {
        return Err(BidValidationError::ZeroAmount);
    }
    let minimum = min_next_bid(current_bid, increment_pct);
    if proposed <= minimum {
        return Err(BidValidationError::BelowMinimum { minimum });
    }
    if proposed > balance {
        return Err(BidValidationError::InsufficientBalance);
    }
    Ok(())
}

/// Validates a top-up from the current leader. The leader's standing bid
/// already counts toward the new total, so only the delta to the required
/// premium has to be exceeded.
pub fn validate_top_up(
    proposed_top_up: U256,
    current_bid: U256,
    increment_pct: u32,
    balance: U256,
) -> Result<(), BidValidationError> {
    if proposed_top_up.is_zero() {
        return Err(BidValidationError::ZeroAmount);
    }
    let minimum = min_next_bid(current_bid, increment_pct) - current_bid;
    if proposed_top_up <= minimum {
        return Err(BidValidationError::BelowMinimum { minimum });
    }
    if proposed_top_up > balance {
        return Err(BidValidationError::InsufficientBalance);
    }
    Ok(())
}
