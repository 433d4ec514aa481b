//! Static registry of supported chains.
//!
//! Every chain the backend can return a transaction for must be present here;
//! unknown chain ids fall back to the default explorer when deriving links.

/// Placeholder address the aggregator uses for the native asset.
pub const NATIVE_PLACEHOLDER: &str = "0xEeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE";

/// One supported chain: id, display name, explorer base and wrapped-native token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainEntry {
    pub chain_id: u64,
    pub name: &'static str,
    pub explorer_base: &'static str,
    pub wrapped_native: &'static str,
}

/// Explorer used when a chain id is not in the registry.
const DEFAULT_EXPLORER_BASE: &str = "https://etherscan.io";

const SUPPORTED_CHAINS: &[ChainEntry] = &[
    ChainEntry {
        chain_id: 1,
        name: "Ethereum",
        explorer_base: "https://etherscan.io",
        wrapped_native: "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2",
    },
    ChainEntry {
        chain_id: 10,
        name: "Optimism",
        explorer_base: "https://optimistic.etherscan.io",
        wrapped_native: "0x4200000000000000000000000000000000000006",
    },
    ChainEntry {
        chain_id: 137,
        name: "Polygon",
        explorer_base: "https://polygonscan.com",
        wrapped_native: "0x7ceB23fD6bC0adD59E62ac25578270cFf1b9f619",
    },
    ChainEntry {
        chain_id: 324,
        name: "zkSync Era",
        explorer_base: "https://explorer.zksync.io",
        wrapped_native: "0x5AEa5775959fBC2557Cc8789bC1bf90A239D9a91",
    },
    ChainEntry {
        chain_id: 8453,
        name: "Base",
        explorer_base: "https://basescan.org",
        wrapped_native: "0x4200000000000000000000000000000000000006",
    },
    ChainEntry {
        chain_id: 42161,
        name: "Arbitrum",
        explorer_base: "https://arbiscan.io",
        wrapped_native: "0x82aF49447D8a07e3bd95BD0d56f35241523fBab1",
    },
    ChainEntry {
        chain_id: 43114,
        name: "Avalanche",
        explorer_base: "https://snowtrace.io",
        wrapped_native: "0xB31f66AA3C1e785363F0875A1B74E27b85FD66c7",
    },
    ChainEntry {
        chain_id: 534352,
        name: "Scroll",
        explorer_base: "https://scrollscan.com",
        wrapped_native: "0x5300000000000000000000000000000000000004",
    },
];

/// Default decimals for well-known token symbols, used when formatting quote
/// amounts for display. Unknown symbols default to 18.
const TOKEN_DECIMALS: &[(&str, u32)] = &[
    ("ETH", 18),
    ("WETH", 18),
    ("USDC", 6),
    ("USDT", 6),
    ("DAI", 18),
    ("WBTC", 8),
    ("UNI", 18),
    ("LINK", 18),
    ("ARB", 18),
    ("OP", 18),
    ("MATIC", 18),
    ("SCR", 18),
];

pub fn is_supported(chain_id: u64) -> bool {
    SUPPORTED_CHAINS.iter().any(|c| c.chain_id == chain_id)
}

pub fn entry(chain_id: u64) -> Option<&'static ChainEntry> {
    SUPPORTED_CHAINS.iter().find(|c| c.chain_id == chain_id)
}

/// Human-readable name for a chain id.
pub fn chain_name(chain_id: u64) -> &'static str {
    entry(chain_id).map(|c| c.name).unwrap_or("Unknown")
}

/// Wrapped-native token address for a chain, if the chain is supported.
pub fn wrapped_native(chain_id: u64) -> Option<&'static str> {
    entry(chain_id).map(|c| c.wrapped_native)
}

/// Whether an address stands for the chain's native asset.
pub fn is_native_token(chain_id: u64, address: &str) -> bool {
    address.eq_ignore_ascii_case(NATIVE_PLACEHOLDER)
        || wrapped_native(chain_id)
            .map(|native| native.eq_ignore_ascii_case(address))
            .unwrap_or(false)
}

/// Block-explorer link for a transaction hash. Unknown chains use the
/// default explorer.
pub fn explorer_tx_url(chain_id: u64, tx_hash: &str) -> String {
    let base = entry(chain_id)
        .map(|c| c.explorer_base)
        .unwrap_or(DEFAULT_EXPLORER_BASE);
    format!("{base}/tx/{tx_hash}")
}

/// Decimals for a token symbol (18 when unknown).
pub fn token_decimals(symbol: &str) -> u32 {
    let upper = symbol.trim().trim_start_matches('$').to_ascii_uppercase();
    TOKEN_DECIMALS
        .iter()
        .find(|(sym, _)| *sym == upper)
        .map(|(_, dec)| *dec)
        .unwrap_or(18)
}

/// `"Ethereum (1), Optimism (10), ..."` for chain-switch warnings.
pub fn supported_chains_summary() -> String {
    SUPPORTED_CHAINS
        .iter()
        .map(|c| format!("{} ({})", c.name, c.chain_id))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_chains_resolve() {
        assert!(is_supported(8453));
        assert_eq!(chain_name(8453), "Base");
        assert_eq!(
            explorer_tx_url(8453, "0xabc"),
            "https://basescan.org/tx/0xabc"
        );
    }

    #[test]
    fn unknown_chain_falls_back_to_default_explorer() {
        assert!(!is_supported(999_999));
        assert_eq!(chain_name(999_999), "Unknown");
        assert_eq!(
            explorer_tx_url(999_999, "0xdef"),
            "https://etherscan.io/tx/0xdef"
        );
    }

    #[test]
    fn native_token_detection_covers_placeholder_and_wrapped() {
        assert!(is_native_token(1, NATIVE_PLACEHOLDER));
        assert!(is_native_token(
            10,
            "0x4200000000000000000000000000000000000006"
        ));
        assert!(!is_native_token(
            1,
            "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"
        ));
    }

    #[test]
    fn decimals_default_to_eighteen() {
        assert_eq!(token_decimals("USDC"), 6);
        assert_eq!(token_decimals("$usdc"), 6);
        assert_eq!(token_decimals("SOMETOKEN"), 18);
    }

    #[test]
    fn summary_names_every_supported_chain() {
        let summary = supported_chains_summary();
        for chain in SUPPORTED_CHAINS {
            assert!(summary.contains(chain.name));
        }
    }
}
