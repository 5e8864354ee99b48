//! Interface to the wallet layer that signs and submits transactions.
//!
//! The engine never owns a key. It hands fully-parameterized commands to an
//! implementation of [`TransactionSubmitting`] and treats the externally
//! observed confirmation as the only authority for "my bid was accepted";
//! anything shown before that is display-only.

use anyhow::Result;
use primitive_types::{H160, H256, U256};
use thiserror::Error;

/// The four transactions a bidder can send at the auction house.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AuctionCommand {
    /// Opens an auction for the token's accrued fees.
    StartAuction { token: H160 },
    /// Replaces the standing bid.
    PlaceBid { token: H160, amount: U256 },
    /// Raises the caller's own standing bid by `amount`.
    TopUp { token: H160, amount: U256 },
    /// Claims the wrapped-native fee balance directly.
    CollectFees { token: H160 },
}

#[derive(Debug, Error)]
pub enum TransactionError {
    /// The user dismissed the signing prompt. Not an error state; callers
    /// drop it without surfacing anything.
    #[error("rejected in the wallet")]
    UserRejected,
    /// The node refused the transaction in simulation; the input is likely
    /// still wrong and the message is worth showing.
    #[error("simulation failed: {0}")]
    SimulationFailed(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TransactionError {
    /// Whether the error carries anything the user should see.
    pub fn should_surface(&self) -> bool {
        !matches!(self, Self::UserRejected)
    }
}

/// Externally observed state of a submitted transaction.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TxStatus {
    Pending,
    Confirmed,
    Failed,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait TransactionSubmitting: Send + Sync {
    /// Signs and broadcasts `command`, returning the transaction hash.
    async fn submit(&self, command: AuctionCommand) -> Result<H256, TransactionError>;

    /// Reports the current confirmation state of a submitted transaction.
    async fn status(&self, tx: H256) -> Result<TxStatus>;
}
