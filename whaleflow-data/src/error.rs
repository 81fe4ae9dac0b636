use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All errors generated in `whaleflow-data`.
///
/// No variant is fatal to the process: feed failures discard a single fetch
/// cycle, socket failures are recovered by the consumer's reconnect loop.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Error)]
pub enum DataError {
    #[error("transaction feed request failed: {0}")]
    FeedRequest(String),

    #[error("transaction feed response invalid: {0}")]
    FeedDecode(String),

    #[error("SocketError: {0}")]
    Socket(String),
}

impl From<reqwest::Error> for DataError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            Self::FeedDecode(value.to_string())
        } else {
            Self::FeedRequest(value.to_string())
        }
    }
}

impl From<serde_json::Error> for DataError {
    fn from(value: serde_json::Error) -> Self {
        Self::FeedDecode(value.to_string())
    }
}
