//! Commitment hashes shared by claimers, offerers and the escrow program

use bitcoin::hashes::{sha256, sha256d, Hash, HashEngine};

use crate::swap_data::SwapData;

/// Message prefix of a cooperative refund authorization
pub const REFUND_AUTH_PREFIX: &[u8] = b"refund";

/// Payment hash of an HTLC preimage
pub fn htlc_hash(preimage: &[u8; 32]) -> [u8; 32] {
    sha256::Hash::hash(preimage).to_byte_array()
}

/// Commitment to a single Bitcoin output: sha256(nonce || value || script)
pub fn txo_hash(nonce: u64, value: u64, script_pubkey: &[u8]) -> [u8; 32] {
    let mut engine = sha256::Hash::engine();
    engine.input(&nonce.to_le_bytes());
    engine.input(&value.to_le_bytes());
    engine.input(script_pubkey);
    sha256::Hash::from_engine(engine).to_byte_array()
}

/// Digest the claimer signs to let the offerer refund before expiry
pub fn refund_auth_digest(data: &SwapData, auth_expiry: u64) -> [u8; 32] {
    let mut engine = sha256::Hash::engine();
    engine.input(REFUND_AUTH_PREFIX);
    engine.input(&data.amount.to_le_bytes());
    engine.input(&data.expiry.to_le_bytes());
    engine.input(&data.sequence.to_le_bytes());
    engine.input(&data.hash);
    engine.input(&auth_expiry.to_le_bytes());
    sha256::Hash::from_engine(engine).to_byte_array()
}

/// Bitcoin transaction id in internal byte order (double sha256 of the
/// non-witness serialization, not reversed for display).
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    sha256d::Hash::hash(data).to_byte_array()
}
