use crate::exchange::{AddressRegistry, Exchange};
use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Fixed satoshi -> BTC conversion ratio (1 BTC = 10^8 minor units).
pub const SATS_PER_BTC: f64 = 100_000_000.0;

/// Sentinel substituted when the feed omits an input or output address.
///
/// A sentinel address never matches the registry, so a degraded record
/// classifies as a neutral transfer by construction.
pub const UNKNOWN_ADDRESS: &str = "Unknown";

/// Raw transaction record from the blockchain.info unconfirmed transactions
/// feed. Loosely typed: the feed regularly omits input and output addresses.
///
/// See docs: <https://www.blockchain.com/explorer/api/blockchain_api>
#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct RawTransaction {
    pub hash: String,
    /// Unix seconds.
    #[serde(default)]
    pub time: i64,
    #[serde(default)]
    pub inputs: Vec<TxInput>,
    #[serde(default)]
    pub out: Vec<TxOutput>,
}

#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct TxInput {
    #[serde(default)]
    pub prev_out: Option<PrevOut>,
}

#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct PrevOut {
    #[serde(default)]
    pub addr: Option<String>,
}

#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct TxOutput {
    #[serde(default)]
    pub addr: Option<String>,
    /// Satoshis.
    #[serde(default)]
    pub value: u64,
}

impl RawTransaction {
    /// Total transferred value: sum of all output values, in satoshis.
    pub fn total_value_sats(&self) -> u64 {
        self.out.iter().map(|output| output.value).sum()
    }

    pub fn total_value_btc(&self) -> f64 {
        self.total_value_sats() as f64 / SATS_PER_BTC
    }

    /// Whale predicate, applied as a pipeline-level filter before
    /// classification.
    pub fn is_whale(&self, threshold_btc: f64) -> bool {
        self.total_value_btc() >= threshold_btc
    }

    /// First input's source address, or the [`UNKNOWN_ADDRESS`] sentinel.
    ///
    /// First-input attribution is a known heuristic limitation for
    /// multi-party transactions (batched exchange sweeps) and is kept as-is.
    pub fn from_address(&self) -> &str {
        self.inputs
            .first()
            .and_then(|input| input.prev_out.as_ref())
            .and_then(|prev_out| prev_out.addr.as_deref())
            .unwrap_or(UNKNOWN_ADDRESS)
    }

    /// First output's destination address, or the [`UNKNOWN_ADDRESS`] sentinel.
    pub fn to_address(&self) -> &str {
        self.out
            .first()
            .and_then(|output| output.addr.as_deref())
            .unwrap_or(UNKNOWN_ADDRESS)
    }
}

/// Directional flow signal of a classified transaction.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Deserialize, Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FlowSignal {
    /// Funds moving into a known exchange from a non-exchange address.
    #[display("deposit")]
    Deposit,
    /// Funds moving out of a known exchange to a non-exchange address.
    #[display("withdrawal")]
    Withdrawal,
    /// Both-exchange and neither-exchange flows.
    #[display("transfer")]
    Transfer,
}

impl FlowSignal {
    /// Derive the signal from registry membership of the two endpoints.
    pub fn from_flow(from_exchange: Option<Exchange>, to_exchange: Option<Exchange>) -> Self {
        match (from_exchange, to_exchange) {
            (None, Some(_)) => FlowSignal::Deposit,
            (Some(_), None) => FlowSignal::Withdrawal,
            _ => FlowSignal::Transfer,
        }
    }
}

/// Market sentiment derived from a flow signal or a net-flow total.
#[derive(
    Copy,
    Clone,
    Default,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Debug,
    Display,
    Deserialize,
    Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    #[display("bearish")]
    Bearish,
    #[display("bullish")]
    Bullish,
    #[default]
    #[display("neutral")]
    Neutral,
}

impl From<FlowSignal> for Sentiment {
    fn from(signal: FlowSignal) -> Self {
        match signal {
            // Deposits are presumed sell-side pressure, withdrawals the
            // opposite.
            FlowSignal::Deposit => Sentiment::Bearish,
            FlowSignal::Withdrawal => Sentiment::Bullish,
            FlowSignal::Transfer => Sentiment::Neutral,
        }
    }
}

/// A raw transaction after exchange attribution, immutable once constructed.
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct ClassifiedTransaction {
    pub hash: String,
    pub time: DateTime<Utc>,
    pub amount_btc: f64,
    pub amount_usd: f64,
    pub from_address: String,
    pub to_address: String,
    pub from_exchange: Option<Exchange>,
    pub to_exchange: Option<Exchange>,
    pub signal: FlowSignal,
    pub sentiment: Sentiment,
}

impl ClassifiedTransaction {
    /// Classify a raw transaction against the address registry.
    ///
    /// Infallible: malformed input degrades to the [`UNKNOWN_ADDRESS`]
    /// sentinel rather than erroring. `price_at_fetch` is the external USD
    /// price captured once per fetch cycle. Whale thresholding happens
    /// upstream in the pipeline, never here.
    pub fn classify(
        raw: &RawTransaction,
        registry: &AddressRegistry,
        price_at_fetch: f64,
    ) -> Self {
        let from_address = raw.from_address().to_string();
        let to_address = raw.to_address().to_string();

        let from_exchange = registry.lookup(&from_address);
        let to_exchange = registry.lookup(&to_address);

        let signal = FlowSignal::from_flow(from_exchange, to_exchange);
        let amount_btc = raw.total_value_btc();

        Self {
            hash: raw.hash.clone(),
            time: DateTime::from_timestamp(raw.time, 0).unwrap_or_else(Utc::now),
            amount_btc,
            amount_usd: amount_btc * price_at_fetch,
            from_address,
            to_address,
            from_exchange,
            to_exchange,
            signal,
            sentiment: Sentiment::from(signal),
        }
    }
}
