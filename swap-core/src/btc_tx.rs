//! Bitcoin transaction parsing for chain claims
//!
//! Claimers prove payment by submitting the raw transaction. Only legacy
//! (witness-stripped) serializations are accepted, so that the double-SHA256
//! of the submitted bytes is the transaction id the relay attests to.

use bitcoin::{consensus, Transaction, TxOut};

use crate::commitment::double_sha256;
use crate::error::CoreError;
use crate::swap_data::NONCE_SEQUENCE_TAG;

/// Size of an inner merkle tree node; transactions of this size could be
/// passed off as one.
pub const MERKLE_NODE_LEN: usize = 64;

#[derive(Debug, Clone)]
pub struct ParsedTransaction {
    tx: Transaction,
    txid: [u8; 32],
}

/// Parses a witness-stripped transaction and computes its id.
pub fn parse_transaction(raw: &[u8]) -> Result<ParsedTransaction, CoreError> {
    if raw.len() == MERKLE_NODE_LEN {
        return Err(CoreError::MerkleNodeLength(raw.len()));
    }
    if raw.len() < MERKLE_NODE_LEN {
        return Err(CoreError::MalformedTransaction(format!(
            "{} bytes is below the minimum transaction size",
            raw.len()
        )));
    }
    // Zero input count followed by 0x01 is the segwit marker and flag
    if raw[4] == 0x00 && raw[5] == 0x01 {
        return Err(CoreError::SegwitNotStripped);
    }

    let tx: Transaction = consensus::deserialize(raw)
        .map_err(|e| CoreError::MalformedTransaction(e.to_string()))?;
    if tx.input.iter().any(|input| !input.witness.is_empty()) {
        return Err(CoreError::SegwitNotStripped);
    }

    Ok(ParsedTransaction {
        tx,
        txid: double_sha256(raw),
    })
}

impl ParsedTransaction {
    /// Transaction id in internal byte order, as committed in block merkle trees
    pub fn txid(&self) -> [u8; 32] {
        self.txid
    }

    pub fn output(&self, vout: u32) -> Option<&TxOut> {
        self.tx.output.get(vout as usize)
    }

    pub fn locktime(&self) -> u32 {
        self.tx.lock_time.to_consensus_u32()
    }

    pub fn input_count(&self) -> usize {
        self.tx.input.len()
    }

    /// The nSequence shared by every input, required to have its top nibble
    /// set so it carries no relative-locktime meaning.
    pub fn uniform_sequence(&self) -> Result<u32, CoreError> {
        let mut inputs = self.tx.input.iter().map(|input| input.sequence.0);
        let first = inputs
            .next()
            .ok_or_else(|| CoreError::MalformedTransaction("transaction has no inputs".into()))?;

        if first & NONCE_SEQUENCE_TAG != NONCE_SEQUENCE_TAG {
            return Err(CoreError::SequenceHasConsensusMeaning(first));
        }
        if inputs.any(|sequence| sequence != first) {
            return Err(CoreError::NonUniformSequence);
        }
        Ok(first)
    }
}
