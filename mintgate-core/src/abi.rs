//! Minimal ABI codec for the sale contract's call surface.
//!
//! Every method the client touches is nullary, so calldata is just the
//! 4-byte Keccak-256 selector; return values are single 32-byte words
//! (bool, uint256, or address).

use sha3::{Digest, Keccak256};

use crate::error::{MintError, Result};
use crate::types::Address;

/// Compute the 4-byte call selector for a Solidity function signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let digest = Keccak256::digest(signature.as_bytes());
    let mut sel = [0u8; 4];
    sel.copy_from_slice(&digest[..4]);
    sel
}

/// Build `0x`-prefixed calldata for a nullary call.
pub fn encode_call(signature: &str) -> String {
    format!("0x{}", hex::encode(selector(signature)))
}

/// Decode a `0x`-prefixed 32-byte return word.
fn decode_word(data: &str) -> Result<[u8; 32]> {
    let body = data
        .strip_prefix("0x")
        .ok_or_else(|| MintError::InvalidResponse(format!("missing 0x prefix: {data}")))?;
    let bytes = hex::decode(body)
        .map_err(|e| MintError::InvalidResponse(format!("bad hex in return data: {e}")))?;
    if bytes.len() != 32 {
        return Err(MintError::InvalidResponse(format!(
            "expected 32-byte word, got {} bytes",
            bytes.len()
        )));
    }
    let mut word = [0u8; 32];
    word.copy_from_slice(&bytes);
    Ok(word)
}

/// Decode an ABI-encoded `bool` return value.
pub fn decode_bool(data: &str) -> Result<bool> {
    let word = decode_word(data)?;
    if word[..31].iter().any(|b| *b != 0) || word[31] > 1 {
        return Err(MintError::InvalidResponse("malformed bool word".into()));
    }
    Ok(word[31] == 1)
}

/// Decode an ABI-encoded `uint256` that must fit in a `u64`
/// (timestamps, token counts).
pub fn decode_u64(data: &str) -> Result<u64> {
    let word = decode_word(data)?;
    if word[..24].iter().any(|b| *b != 0) {
        return Err(MintError::InvalidResponse("uint overflows u64".into()));
    }
    let mut tail = [0u8; 8];
    tail.copy_from_slice(&word[24..]);
    Ok(u64::from_be_bytes(tail))
}

/// Decode an ABI-encoded `address` return value.
pub fn decode_address(data: &str) -> Result<Address> {
    let word = decode_word(data)?;
    if word[..12].iter().any(|b| *b != 0) {
        return Err(MintError::InvalidResponse("malformed address word".into()));
    }
    Address::new(format!("0x{}", hex::encode(&word[12..])))
}

/// Decode a `0x`-prefixed hex quantity (e.g. `eth_chainId` results).
pub fn decode_quantity(data: &str) -> Result<u64> {
    let body = data
        .strip_prefix("0x")
        .ok_or_else(|| MintError::InvalidResponse(format!("missing 0x prefix: {data}")))?;
    u64::from_str_radix(body, 16)
        .map_err(|e| MintError::InvalidResponse(format!("bad quantity {data}: {e}")))
}

/// Encode a wei amount as a `0x`-prefixed hex quantity.
pub fn encode_quantity(value: u128) -> String {
    format!("0x{value:x}")
}
