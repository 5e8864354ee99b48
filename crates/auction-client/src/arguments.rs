//! Command line arguments for binaries embedding the auction client.
//!
//! Every tunable is passed in explicitly at construction time; there is no
//! global configuration store.

use crate::{monitor::MonitorConfig, polling::PollingConfig};
use model::auction::AuctionTiming;
use primitive_types::H160;
use std::{
    fmt::{self, Display, Formatter},
    time::Duration,
};
use url::Url;

#[derive(clap::Parser)]
pub struct Arguments {
    #[clap(long, env, default_value = "warn,auction_client=debug")]
    pub log_filter: String,

    /// URL of the fee auction subgraph.
    #[clap(long, env)]
    pub subgraph_url: Url,

    /// URL of an Ethereum JSON-RPC node.
    #[clap(long, env)]
    pub node_url: Url,

    /// Address of the auction house contract.
    #[clap(long, env, value_parser = model::parse_address)]
    pub auction_house: H160,

    /// Address of the wrapped native token. Its fee balance is collected
    /// directly instead of being auctioned.
    #[clap(long, env, value_parser = model::parse_address)]
    pub wrapped_native: H160,

    /// Address whose bid history the indexer scopes participants to.
    #[clap(long, env, value_parser = model::parse_address)]
    pub viewer: Option<H160>,

    /// Required premium over the standing bid, in percent.
    #[clap(long, env, default_value = "5")]
    pub bid_increment_pct: u32,

    /// How long an auction accepts bids after its start.
    #[clap(long, env, default_value = "24h", value_parser = humantime::parse_duration)]
    pub auction_duration: Duration,

    /// Mandatory wait after an auction ends before the next one for the same
    /// token may start.
    #[clap(long, env, default_value = "6h", value_parser = humantime::parse_duration)]
    pub auction_cooldown: Duration,

    /// Cadence of the slow indexer snapshot refresh.
    #[clap(long, env, default_value = "1m", value_parser = humantime::parse_duration)]
    pub indexer_refresh: Duration,

    /// Delay between consecutive RPC reads within one polling burst.
    #[clap(long, env, default_value = "1500ms", value_parser = humantime::parse_duration)]
    pub poll_interval: Duration,

    /// Number of RPC reads per polling burst.
    #[clap(long, env, default_value = "7")]
    pub poll_burst_ticks: usize,

    /// Lifetime of the new-bid highlight.
    #[clap(long, env, default_value = "12s", value_parser = humantime::parse_duration)]
    pub pulse_ttl: Duration,
}

impl Arguments {
    pub fn timing(&self) -> AuctionTiming {
        AuctionTiming {
            duration: self.auction_duration.as_secs(),
            cooldown: self.auction_cooldown.as_secs(),
        }
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            viewer: self.viewer,
            wrapped_native: self.wrapped_native,
            timing: self.timing(),
            indexer_refresh: self.indexer_refresh,
            polling: PollingConfig {
                poll_interval: self.poll_interval,
                max_ticks: self.poll_burst_ticks,
            },
            pulse_ttl: self.pulse_ttl,
        }
    }
}

impl Display for Arguments {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "log_filter: {}", self.log_filter)?;
        writeln!(f, "subgraph_url: {}", self.subgraph_url)?;
        writeln!(f, "node_url: {}", self.node_url)?;
        writeln!(f, "auction_house: {:?}", self.auction_house)?;
        writeln!(f, "wrapped_native: {:?}", self.wrapped_native)?;
        writeln!(f, "viewer: {:?}", self.viewer)?;
        writeln!(f, "bid_increment_pct: {}", self.bid_increment_pct)?;
        writeln!(f, "auction_duration: {:?}", self.auction_duration)?;
        writeln!(f, "auction_cooldown: {:?}", self.auction_cooldown)?;
        writeln!(f, "indexer_refresh: {:?}", self.indexer_refresh)?;
        writeln!(f, "poll_interval: {:?}", self.poll_interval)?;
        writeln!(f, "poll_burst_ticks: {}", self.poll_burst_ticks)?;
        writeln!(f, "pulse_ttl: {:?}", self.pulse_ttl)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parses_minimal_arguments_with_defaults() {
        let args = Arguments::parse_from([
            "auction-client",
            "--subgraph-url",
            "https://indexer.example/subgraphs/fee-auctions",
            "--node-url",
            "https://rpc.example",
            "--auction-house",
            "0x0101010101010101010101010101010101010101",
            "--wrapped-native",
            "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2",
        ]);

        assert_eq!(args.bid_increment_pct, 5);
        assert_eq!(args.poll_interval, Duration::from_millis(1500));
        assert_eq!(args.poll_burst_ticks, 7);
        assert_eq!(args.pulse_ttl, Duration::from_secs(12));
        assert_eq!(args.indexer_refresh, Duration::from_secs(60));
        assert_eq!(args.timing().duration, 24 * 3600);
        assert_eq!(args.timing().cooldown, 6 * 3600);
        assert_eq!(args.viewer, None);
    }

    #[test]
    fn display_lists_every_value() {
        let args = Arguments::parse_from([
            "auction-client",
            "--subgraph-url",
            "https://indexer.example/subgraphs/fee-auctions",
            "--node-url",
            "https://rpc.example",
            "--auction-house",
            "0x0101010101010101010101010101010101010101",
            "--wrapped-native",
            "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2",
        ]);
        let displayed = args.to_string();
        for field in [
            "log_filter",
            "subgraph_url",
            "node_url",
            "auction_house",
            "wrapped_native",
            "viewer",
            "bid_increment_pct",
            "auction_duration",
            "auction_cooldown",
            "indexer_refresh",
            "poll_interval",
            "poll_burst_ticks",
            "pulse_ttl",
        ] {
            assert!(displayed.contains(field), "missing {field}");
        }
    }
}
