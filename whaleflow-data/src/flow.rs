use crate::{
    exchange::Exchange,
    transaction::{ClassifiedTransaction, FlowSignal, Sentiment},
};
use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};

/// Net-flow magnitude (BTC) beyond which batch sentiment stops being
/// neutral. Tunable; the boundary itself is exclusive.
pub const NET_FLOW_SENTIMENT_THRESHOLD_BTC: f64 = 100.0;

impl Sentiment {
    /// Batch sentiment from a net-flow total (withdrawals minus deposits).
    pub fn from_net_flow(net_flow_btc: f64) -> Self {
        if net_flow_btc > NET_FLOW_SENTIMENT_THRESHOLD_BTC {
            Sentiment::Bullish
        } else if net_flow_btc < -NET_FLOW_SENTIMENT_THRESHOLD_BTC {
            Sentiment::Bearish
        } else {
            Sentiment::Neutral
        }
    }
}

/// Exchange-flow statistics over a batch of classified transactions.
///
/// Recomputed fresh from its input on every [`aggregate`] call; never
/// incrementally mutated. Exchanges absent from the source batch are absent
/// from the per-exchange maps.
#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct ExchangeFlowStats {
    pub total_deposits: f64,
    pub total_withdrawals: f64,
    /// `total_withdrawals - total_deposits`, in BTC.
    pub net_flow: f64,
    pub sentiment: Sentiment,
    pub deposits_by_exchange: FnvHashMap<Exchange, f64>,
    pub withdrawals_by_exchange: FnvHashMap<Exchange, f64>,
}

impl ExchangeFlowStats {
    /// Combine two partial aggregations.
    ///
    /// Commutative and associative, so partitioning a batch, aggregating the
    /// parts on parallel workers and merging produces the same result as a
    /// sequential fold over the whole batch.
    pub fn merge(mut self, other: Self) -> Self {
        self.total_deposits += other.total_deposits;
        self.total_withdrawals += other.total_withdrawals;

        for (exchange, amount) in other.deposits_by_exchange {
            *self.deposits_by_exchange.entry(exchange).or_insert(0.0) += amount;
        }
        for (exchange, amount) in other.withdrawals_by_exchange {
            *self.withdrawals_by_exchange.entry(exchange).or_insert(0.0) += amount;
        }

        self.net_flow = self.total_withdrawals - self.total_deposits;
        self.sentiment = Sentiment::from_net_flow(self.net_flow);
        self
    }
}

/// Roll a batch of classified transactions into [`ExchangeFlowStats`].
///
/// Pure single-pass fold, order-independent. Empty input yields all-zero
/// stats with neutral sentiment. Transfers touch neither total: only
/// deposits and withdrawals carry directional information.
pub fn aggregate<'a>(
    transactions: impl IntoIterator<Item = &'a ClassifiedTransaction>,
) -> ExchangeFlowStats {
    let mut stats = ExchangeFlowStats::default();

    for tx in transactions {
        match tx.signal {
            FlowSignal::Deposit => {
                stats.total_deposits += tx.amount_btc;
                if let Some(exchange) = tx.to_exchange {
                    *stats.deposits_by_exchange.entry(exchange).or_insert(0.0) += tx.amount_btc;
                }
            }
            FlowSignal::Withdrawal => {
                stats.total_withdrawals += tx.amount_btc;
                if let Some(exchange) = tx.from_exchange {
                    *stats.withdrawals_by_exchange.entry(exchange).or_insert(0.0) +=
                        tx.amount_btc;
                }
            }
            FlowSignal::Transfer => {}
        }
    }

    stats.net_flow = stats.total_withdrawals - stats.total_deposits;
    stats.sentiment = Sentiment::from_net_flow(stats.net_flow);
    stats
}
