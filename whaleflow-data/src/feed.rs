use crate::{error::DataError, transaction::RawTransaction};
use serde::Deserialize;

/// Default raw transaction feed endpoint (unconfirmed transactions page).
///
/// See docs: <https://www.blockchain.com/explorer/api/blockchain_api>
pub const DEFAULT_FEED_URL: &str = "https://blockchain.info/unconfirmed-transactions?format=json";

/// Default BTC/USD price ticker endpoint.
///
/// See docs: <https://www.blockchain.com/explorer/api/exchange_rates_api>
pub const DEFAULT_TICKER_URL: &str = "https://blockchain.info/ticker";

/// Raw transaction feed page.
#[derive(Debug, Deserialize)]
struct FeedPage {
    #[serde(default)]
    txs: Vec<RawTransaction>,
}

/// Ticker response, keyed by fiat currency symbol.
#[derive(Debug, Deserialize)]
struct TickerPage {
    #[serde(rename = "USD")]
    usd: TickerEntry,
}

#[derive(Debug, Deserialize)]
struct TickerEntry {
    last: f64,
}

/// Fetch one page of raw transactions from the feed.
///
/// A failure discards this fetch cycle only; the caller logs it and carries
/// on with the next cycle.
pub async fn fetch_transactions(
    client: &reqwest::Client,
    url: &str,
) -> Result<Vec<RawTransaction>, DataError> {
    let response = client.get(url).send().await.map_err(|request_err| {
        DataError::FeedRequest(format!("transaction feed request failed: {request_err}"))
    })?;

    if let Err(status_err) = response.error_for_status_ref() {
        return Err(DataError::FeedRequest(format!(
            "transaction feed returned error status: {status_err}"
        )));
    }

    let page = response.json::<FeedPage>().await.map_err(|parse_err| {
        DataError::FeedDecode(format!("transaction feed parse failed: {parse_err}"))
    })?;

    Ok(page.txs)
}

/// Fetch the current BTC/USD price.
///
/// The returned value is the price-at-fetch-time applied to every
/// transaction classified in the same cycle.
pub async fn fetch_price(client: &reqwest::Client, url: &str) -> Result<f64, DataError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|request_err| {
            DataError::FeedRequest(format!("price ticker request failed: {request_err}"))
        })?;

    if let Err(status_err) = response.error_for_status_ref() {
        return Err(DataError::FeedRequest(format!(
            "price ticker returned error status: {status_err}"
        )));
    }

    let page = response.json::<TickerPage>().await.map_err(|parse_err| {
        DataError::FeedDecode(format!("price ticker parse failed: {parse_err}"))
    })?;

    Ok(page.usd.last)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticker_page_decode() {
        let input = r#"{
            "USD": {"15m": 93120.5, "last": 93000.0, "buy": 93010.0, "sell": 92990.0, "symbol": "$"},
            "EUR": {"15m": 85000.0, "last": 84950.0, "buy": 84960.0, "sell": 84940.0, "symbol": "€"}
        }"#;

        let page = serde_json::from_str::<TickerPage>(input).expect("decode failed");
        assert_eq!(page.usd.last, 93_000.0);
    }

    #[test]
    fn test_feed_page_decode_tolerates_missing_txs() {
        let page = serde_json::from_str::<FeedPage>("{}").expect("decode failed");
        assert!(page.txs.is_empty());
    }
}
