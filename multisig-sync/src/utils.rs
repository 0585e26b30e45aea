// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::models::{AccountId, CallHash};
use hex::FromHexError;
use itertools::Itertools;
use sha2::{Digest, Sha256};

/// Domain separator mixed into every multisig account id.
const MULTISIG_ACCOUNT_PREFIX: &[u8] = b"multisig";

/// Account ids are 32 bytes.
const ACCOUNT_ID_HEX_LENGTH: usize = 64;

/// Lowercases and prefixes with 0x.
pub fn standardize_hex(value: &str) -> String {
    let trimmed = value.trim();
    let body = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    format!("0x{}", body.to_lowercase())
}

/// Standardizes an account id to 0x + 64 lowercase hex characters.
pub fn standardize_account_id(account_id: &str) -> AccountId {
    let standardized = standardize_hex(account_id);
    let body = &standardized[2..];
    if body.len() >= ACCOUNT_ID_HEX_LENGTH {
        return standardized;
    }
    format!("0x{:0>64}", body)
}

pub fn decode_hex(value: &str) -> Result<Vec<u8>, FromHexError> {
    let standardized = standardize_hex(value);
    hex::decode(&standardized[2..])
}

/// Deterministic multisig account id for a signatory set and threshold. Duplicates and
/// ordering of the signatories do not affect the result.
pub fn derive_multisig_account_id(
    signatories: &[AccountId],
    threshold: u16,
) -> Result<AccountId, FromHexError> {
    let mut hasher = Sha256::new();
    hasher.update(MULTISIG_ACCOUNT_PREFIX);
    let sorted = signatories
        .iter()
        .map(|id| standardize_account_id(id))
        .sorted()
        .dedup();
    for signatory in sorted {
        hasher.update(decode_hex(&signatory)?);
    }
    hasher.update(threshold.to_le_bytes());
    Ok(format!("0x{}", hex::encode(hasher.finalize())))
}

/// Hash of hex encoded call data, as it would be recorded on chain.
pub fn call_data_hash(call_data: &str) -> Result<CallHash, FromHexError> {
    let bytes = decode_hex(call_data)?;
    Ok(format!("0x{}", hex::encode(Sha256::digest(bytes))))
}

pub fn is_same_account(a: &str, b: &str) -> bool {
    standardize_account_id(a) == standardize_account_id(b)
}
