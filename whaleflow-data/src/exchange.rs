use derive_more::Display;
use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Known [`Binance`](Exchange::Binance) wallet addresses.
///
/// See tags: <https://www.blockchain.com/explorer/addresses/btc/34xp4vRoCGJym3xR7yCVPFHoCNxv4Twseo>
pub const ADDRESSES_BINANCE: &[&str] = &[
    "34xp4vRoCGJym3xR7yCVPFHoCNxv4Twseo",
    "3M219KR5vEneNb47ewrPfWyb5jQ2DjxRP6",
    "bc1qm34lsc65zpw79lxes69zkqmk6ee3ewf0j77s3h",
];

/// Known [`Coinbase`](Exchange::Coinbase) wallet addresses.
pub const ADDRESSES_COINBASE: &[&str] = &[
    "36n452uGq1x4mK7bfyZR8wgE47AnBb2pzi",
    "3QcNAuzEVJvqBGtYQfb7rhWnsLtq1R8W5z",
    "bc1qwqdg6squsna38e46795at95yu9atm8azzmyvckulcc7kytlcckxswvvzej",
];

/// Known [`Kraken`](Exchange::Kraken) wallet addresses.
pub const ADDRESSES_KRAKEN: &[&str] = &[
    "3FupZp77ySr7jwoLYEJ9mwzJpvoNBXsBnE",
    "3H5JTt42K7RmZtromfTSefcMEFMMe18pMD",
];

/// Known [`Bitfinex`](Exchange::Bitfinex) wallet addresses.
pub const ADDRESSES_BITFINEX: &[&str] = &[
    "3JZq4atUahhuA9rLhXLMhhTo133J9rF97j",
    "bc1qgdjqv0av3q56jvd82tkdjpy7gdp9ut8tlqmgrpmv24sq90ecnvqqjwvw97",
];

/// Known [`Okx`](Exchange::Okx) wallet addresses.
pub const ADDRESSES_OKX: &[&str] = &[
    "3LQUu4v9z6KNch71j7kbj8GPeAGUo1FW6a",
    "3FHNBLobJnbCTFTVakh5TXmEneyf5PT61B",
];

/// Known [`Huobi`](Exchange::Huobi) wallet addresses.
pub const ADDRESSES_HUOBI: &[&str] = &[
    "35pgGeez3ou6ofrpjt8T7bvC9t6RrUK4p6",
    "1LAnF8h3qMGx3TSwNUHVneBZUEpwE4gu3D",
];

/// Exchange identity a blockchain address can be attributed to.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Deserialize, Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Exchange {
    #[display("binance")]
    Binance,
    #[display("coinbase")]
    Coinbase,
    #[display("kraken")]
    Kraken,
    #[display("bitfinex")]
    Bitfinex,
    #[display("okx")]
    Okx,
    #[display("huobi")]
    Huobi,
}

impl Exchange {
    pub fn as_str(&self) -> &'static str {
        match self {
            Exchange::Binance => "binance",
            Exchange::Coinbase => "coinbase",
            Exchange::Kraken => "kraken",
            Exchange::Bitfinex => "bitfinex",
            Exchange::Okx => "okx",
            Exchange::Huobi => "huobi",
        }
    }
}

/// Reverse index from blockchain address to [`Exchange`] identity.
///
/// Built once from an `(Exchange, addresses)` table and immutable for the
/// process lifetime; share it by reference (or `Arc`) rather than rebuilding.
/// Unknown addresses yield `None` rather than an error.
#[derive(Debug, Clone, Default)]
pub struct AddressRegistry {
    index: FnvHashMap<String, Exchange>,
}

impl AddressRegistry {
    /// Construct a registry from an exchange -> addresses table.
    ///
    /// Each address maps to at most one exchange: a duplicate address keeps
    /// its first attribution and the conflict is logged.
    pub fn new<'a>(table: impl IntoIterator<Item = (Exchange, &'a [&'a str])>) -> Self {
        let mut index = FnvHashMap::default();

        for (exchange, addresses) in table {
            for address in addresses {
                if let Some(existing) = index.get(*address) {
                    warn!(
                        address,
                        ?existing,
                        duplicate = ?exchange,
                        "address attributed to more than one exchange, keeping first"
                    );
                    continue;
                }
                index.insert((*address).to_string(), exchange);
            }
        }

        Self { index }
    }

    /// Construct a registry from the compiled-in exchange wallet tables.
    pub fn with_known_exchanges() -> Self {
        Self::new([
            (Exchange::Binance, ADDRESSES_BINANCE),
            (Exchange::Coinbase, ADDRESSES_COINBASE),
            (Exchange::Kraken, ADDRESSES_KRAKEN),
            (Exchange::Bitfinex, ADDRESSES_BITFINEX),
            (Exchange::Okx, ADDRESSES_OKX),
            (Exchange::Huobi, ADDRESSES_HUOBI),
        ])
    }

    /// O(1) lookup of the exchange a blockchain address belongs to.
    pub fn lookup(&self, address: &str) -> Option<Exchange> {
        self.index.get(address).copied()
    }

    /// Number of indexed addresses.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_and_unknown_addresses() {
        let registry = AddressRegistry::with_known_exchanges();

        assert_eq!(
            registry.lookup("34xp4vRoCGJym3xR7yCVPFHoCNxv4Twseo"),
            Some(Exchange::Binance)
        );
        assert_eq!(
            registry.lookup("3FupZp77ySr7jwoLYEJ9mwzJpvoNBXsBnE"),
            Some(Exchange::Kraken)
        );
        assert_eq!(registry.lookup("1UnknownAddressXXXXXXXXXXXXXXXXXXX"), None);
        assert_eq!(registry.lookup("Unknown"), None);
    }

    #[test]
    fn test_duplicate_address_keeps_first_attribution() {
        let registry = AddressRegistry::new([
            (Exchange::Binance, &["addr-a", "addr-b"] as &[&str]),
            (Exchange::Kraken, &["addr-b", "addr-c"] as &[&str]),
        ]);

        assert_eq!(registry.lookup("addr-a"), Some(Exchange::Binance));
        assert_eq!(registry.lookup("addr-b"), Some(Exchange::Binance));
        assert_eq!(registry.lookup("addr-c"), Some(Exchange::Kraken));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_empty_registry() {
        let registry = AddressRegistry::new([]);
        assert!(registry.is_empty());
        assert_eq!(registry.lookup("anything"), None);
    }
}
