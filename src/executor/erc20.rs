//! Minimal ERC-20 calldata construction for the approval leg.

use sha3::{Digest, Keccak256};

/// Unlimited allowance: 2^256 - 1, the conventional "max approve" amount.
const MAX_UINT256_HEX: &str =
    "ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff";

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

fn normalize_address(address: &str) -> Result<String, String> {
    let stripped = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .unwrap_or(address);
    if stripped.len() != 40 {
        return Err(format!("address '{address}' is not 20 bytes"));
    }
    hex::decode(stripped).map_err(|e| format!("address '{address}' is not hex: {e}"))?;
    Ok(stripped.to_ascii_lowercase())
}

/// Calldata for `approve(spender, MAX_UINT256)`.
///
/// The selector is derived from the canonical signature rather than
/// hard-coded, so a typo here fails tests instead of burning gas.
pub fn approve_calldata(spender: &str) -> Result<String, String> {
    let spender = normalize_address(spender)?;
    let selector = &keccak256(b"approve(address,uint256)")[..4];
    Ok(format!(
        "0x{}{:0>64}{}",
        hex::encode(selector),
        spender,
        MAX_UINT256_HEX
    ))
}
