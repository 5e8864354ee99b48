//! A client for querying the fee auction subgraph.
//!
//! The subgraph is the consistent-but-lagged view of the auction house: it
//! enumerates ongoing auctions with full participant history and tracks the
//! accrued fee balance per token. Freshness comes from the RPC read layer,
//! never from here.

use anyhow::{bail, Context, Result};
use model::auction::{Auction, Participant};
use model::u256_decimal;
use primitive_types::{H160, U256};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Map, Value};
use serde_with::{serde_as, DisplayFromStr};
use std::collections::HashMap;
use thiserror::Error;
use url::Url;

const ONGOING_AUCTIONS_QUERY: &str = r#"
    query OngoingAuctions($viewer: String) {
        auctions(where: { settled: false }, orderBy: startTime) {
            token
            lotAmount
            highestBid
            highestBidder
            startTime
            participants(where: { bidder: $viewer }) {
                bidder
                bid
            }
        }
    }
"#;

const FEE_BALANCES_QUERY: &str = r#"
    query FeeBalances($tokens: [String!]!) {
        feeBalances(where: { token_in: $tokens }) {
            token
            amount
        }
    }
"#;

/// Trait for abstracting the indexer's read model.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait AuctionIndexing: Send + Sync {
    /// Returns all auctions that have not been settled yet. `participants`
    /// on each auction is scoped to `viewer`; without a viewer the history
    /// is left empty since only the viewer's own bids are ever displayed.
    async fn ongoing_auctions(&self, viewer: Option<H160>) -> Result<Vec<Auction>>;

    /// Returns the accrued fee balance for each of `tokens`. Tokens the
    /// subgraph has no record for are absent from the result.
    async fn fee_balances(&self, tokens: &[H160]) -> Result<HashMap<H160, U256>>;
}

/// A client for the auction house subgraph.
pub struct SubgraphClient {
    client: Client,
    subgraph_url: Url,
}

impl SubgraphClient {
    pub fn new(subgraph_url: Url, client: Client) -> Self {
        Self {
            client,
            subgraph_url,
        }
    }

    /// Performs the specified GraphQL query on the current subgraph.
    async fn query<T>(&self, query: &str, variables: Option<Map<String, Value>>) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.client
            .post(self.subgraph_url.clone())
            .json(&Query { query, variables })
            .send()
            .await
            .context("failed to send subgraph query")?
            .json::<QueryResponse<T>>()
            .await
            .context("failed to decode subgraph response")?
            .into_result()
    }
}

#[async_trait::async_trait]
impl AuctionIndexing for SubgraphClient {
    async fn ongoing_auctions(&self, viewer: Option<H160>) -> Result<Vec<Auction>> {
        let variables = json_object(json!({
            "viewer": viewer.map(|viewer| format!("{viewer:#x}")),
        }));
        let data = self
            .query::<AuctionsData>(ONGOING_AUCTIONS_QUERY, Some(variables))
            .await?;
        Ok(data.auctions.into_iter().map(Into::into).collect())
    }

    async fn fee_balances(&self, tokens: &[H160]) -> Result<HashMap<H160, U256>> {
        let variables = json_object(json!({
            "tokens": tokens
                .iter()
                .map(|token| format!("{token:#x}"))
                .collect::<Vec<_>>(),
        }));
        let data = self
            .query::<FeeBalancesData>(FEE_BALANCES_QUERY, Some(variables))
            .await?;
        Ok(data
            .fee_balances
            .into_iter()
            .map(|balance| (balance.token, balance.amount))
            .collect())
    }
}

fn json_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(object) => object,
        _ => unreachable!("variables are built as objects"),
    }
}

#[derive(Debug, Deserialize)]
struct AuctionsData {
    auctions: Vec<AuctionData>,
}

#[serde_as]
#[derive(Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
struct AuctionData {
    token: H160,
    #[serde(with = "u256_decimal")]
    lot_amount: U256,
    #[serde(with = "u256_decimal")]
    highest_bid: U256,
    highest_bidder: H160,
    #[serde_as(as = "DisplayFromStr")]
    start_time: u64,
    #[serde(default)]
    participants: Vec<ParticipantData>,
}

#[derive(Debug, Deserialize, Eq, PartialEq)]
struct ParticipantData {
    bidder: H160,
    #[serde(with = "u256_decimal")]
    bid: U256,
}

impl From<AuctionData> for Auction {
    fn from(auction: AuctionData) -> Self {
        Self {
            token: auction.token,
            lot_amount: auction.lot_amount,
            start_time: auction.start_time,
            highest_bid: auction.highest_bid,
            highest_bidder: auction.highest_bidder,
            participants: auction
                .participants
                .into_iter()
                .map(|participant| Participant {
                    bidder: participant.bidder,
                    bid: participant.bid,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct FeeBalancesData {
    #[serde(rename = "feeBalances")]
    fee_balances: Vec<FeeBalanceData>,
}

#[derive(Debug, Deserialize)]
struct FeeBalanceData {
    token: H160,
    #[serde(with = "u256_decimal")]
    amount: U256,
}

/// A GraphQL query.
#[derive(Serialize)]
struct Query<'a> {
    query: &'a str,
    variables: Option<Map<String, Value>>,
}

/// A GraphQL query response.
///
/// This type gets converted into a Rust `Result` type, while handling invalid
/// responses (with missing data and errors).
#[derive(Debug, Deserialize)]
struct QueryResponse<T> {
    #[serde(default = "empty_data")]
    data: Option<T>,
    #[serde(default)]
    errors: Option<Vec<QueryError>>,
}

impl<T> QueryResponse<T> {
    fn into_result(self) -> Result<T> {
        match self {
            Self {
                data: Some(data),
                errors: None,
            } => Ok(data),
            Self {
                errors: Some(errors),
                data: None,
            } if !errors.is_empty() => {
                // Make sure to log additional errors if there are more than
                // one, and just bubble up the first error.
                for error in &errors[1..] {
                    tracing::warn!("additional GraphQL error: {}", error.message);
                }
                bail!("{}", errors[0])
            }
            _ => bail!("invalid GraphQL response"),
        }
    }
}

#[derive(Debug, Deserialize, Error)]
#[error("{}", .message)]
struct QueryError {
    message: String,
}

/// Function to work around the fact that `#[serde(default)]` on an `Option<T>`
/// requires `T: Default`.
fn empty_data<T>() -> Option<T> {
    None
}
