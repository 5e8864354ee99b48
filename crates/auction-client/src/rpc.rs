//! Direct RPC reads of auction state from the auction house contract.
//!
//! The chain is the fresh source: it knows the leading bid the instant it
//! lands, but it must be polled explicitly and only ever exposes the current
//! leader, never the bid history.

use anyhow::{anyhow, bail, Context, Result};
use model::auction::RawAuctionState;
use primitive_types::{H160, U256};
use std::collections::HashMap;
use web3::{
    ethabi::{self, ParamType, Token},
    helpers, signing,
    types::{BlockNumber, Bytes, CallRequest},
    BatchTransport, Transport,
};

pub type Web3 = web3::Web3<web3::transports::Http>;

/// Trait for abstracting the retrieval of raw on-chain auction state.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait AuctionStateReading: Send + Sync {
    /// Reads `{highest_bid, highest_bidder, start_time}` for every token in
    /// `tokens`. Tokens whose read or decode fails are absent from the
    /// result; only a whole-batch transport failure is an `Err`.
    async fn auction_states(&self, tokens: &[H160]) -> Result<HashMap<H160, RawAuctionState>>;
}

/// Reads auction state with one `eth_call` per token, sent as a single
/// JSON-RPC batch.
pub struct AuctionHouseReader {
    web3: Web3,
    auction_house: H160,
}

impl AuctionHouseReader {
    pub fn new(web3: Web3, auction_house: H160) -> Self {
        Self {
            web3,
            auction_house,
        }
    }

    fn call_request(&self, token: H160) -> CallRequest {
        CallRequest {
            to: Some(self.auction_house),
            data: Some(Bytes(auctions_calldata(token))),
            ..Default::default()
        }
    }
}

#[async_trait::async_trait]
impl AuctionStateReading for AuctionHouseReader {
    async fn auction_states(&self, tokens: &[H160]) -> Result<HashMap<H160, RawAuctionState>> {
        if tokens.is_empty() {
            return Ok(HashMap::new());
        }

        let block = helpers::serialize(&BlockNumber::Latest);
        let batch_request = tokens
            .iter()
            .map(|&token| {
                let request = helpers::serialize(&self.call_request(token));
                self.web3
                    .transport()
                    .prepare("eth_call", vec![request, block.clone()])
            })
            .collect::<Vec<_>>();

        // send_batch guarantees the size and order of the responses to match
        // the requests.
        let batch_response = self
            .web3
            .transport()
            .send_batch(batch_request.iter().cloned())
            .await
            .context("auction state batch failed")?;

        let mut states = HashMap::with_capacity(tokens.len());
        for (&token, response) in tokens.iter().zip(batch_response) {
            let state = response
                .map_err(|err| anyhow!("eth_call failed: {err}"))
                .and_then(decode_auction_state);
            match state {
                Ok(state) => {
                    states.insert(token, state);
                }
                // One unreadable token must not take down the readings for
                // the others.
                Err(err) => tracing::warn!(?token, ?err, "skipping auction state"),
            }
        }
        Ok(states)
    }
}

/// Calldata for the auction house's
/// `auctions(address) -> (uint256 highestBid, address highestBidder, uint256 startTime)`
/// view.
fn auctions_calldata(token: H160) -> Vec<u8> {
    let selector = &signing::keccak256(b"auctions(address)")[..4];
    let mut data = selector.to_vec();
    data.extend(ethabi::encode(&[Token::Address(token)]));
    data
}

fn decode_auction_state(response: serde_json::Value) -> Result<RawAuctionState> {
    let bytes = serde_json::from_value::<Bytes>(response)
        .context("unexpected eth_call response format")?;
    let mut decoded = ethabi::decode(
        &[
            ParamType::Uint(256),
            ParamType::Address,
            ParamType::Uint(256),
        ],
        &bytes.0,
    )
    .context("failed to decode auction state")?
    .into_iter();

    let highest_bid = match decoded.next() {
        Some(Token::Uint(value)) => value,
        token => bail!("expected uint for highestBid, got {token:?}"),
    };
    let highest_bidder = match decoded.next() {
        Some(Token::Address(address)) => address,
        token => bail!("expected address for highestBidder, got {token:?}"),
    };
    let start_time = match decoded.next() {
        Some(Token::Uint(value)) => value,
        token => bail!("expected uint for startTime, got {token:?}"),
    };
    if start_time > U256::from(u64::MAX) {
        bail!("startTime {start_time} does not fit a unix timestamp");
    }

    Ok(RawAuctionState {
        highest_bid,
        highest_bidder,
        start_time: start_time.as_u64(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn encodes_auctions_calldata() {
        let token = H160(hex!("ba100000625a3754423978a60c9317c58a424e3d"));
        let data = auctions_calldata(token);

        assert_eq!(data.len(), 4 + 32);
        assert_eq!(&data[..4], &signing::keccak256(b"auctions(address)")[..4]);
        // The address argument is left-padded to a full word.
        assert_eq!(&data[4..16], &[0; 12]);
        assert_eq!(&data[16..], token.as_bytes());
    }

    #[test]
    fn decodes_auction_state() {
        let bidder = H160(hex!("0202020202020202020202020202020202020202"));
        let encoded = ethabi::encode(&[
            Token::Uint(U256::from(1_050)),
            Token::Address(bidder),
            Token::Uint(U256::from(1_700_000_000u64)),
        ]);
        let response = serde_json::to_value(Bytes(encoded)).unwrap();

        assert_eq!(
            decode_auction_state(response).unwrap(),
            RawAuctionState {
                highest_bid: U256::from(1_050),
                highest_bidder: bidder,
                start_time: 1_700_000_000,
            },
        );
    }

    #[test]
    fn rejects_short_return_data() {
        let response = serde_json::to_value(Bytes(vec![0; 32])).unwrap();
        assert!(decode_auction_state(response).is_err());
    }

    #[test]
    fn rejects_non_timestamp_start_time() {
        let encoded = ethabi::encode(&[
            Token::Uint(U256::from(1)),
            Token::Address(H160::zero()),
            Token::Uint(U256::MAX),
        ]);
        let response = serde_json::to_value(Bytes(encoded)).unwrap();
        assert!(decode_auction_state(response).is_err());
    }
}
