//! Claim Verifier - checks a claim proof against the escrow's commitment
//!
//! One strategy per swap type. On success returns the 32-byte secret the
//! claim event publishes: the preimage for HTLCs, the transaction id for
//! chain swaps.

use swap_core::{commitment, parse_transaction, CoreError, NoncedLock, SwapData, SwapType};
use tracing::debug;

use crate::{
    attestation::{Attestation, Preamble},
    error::SwapError,
    EscrowResult,
};

pub struct ClaimVerifier<'a> {
    relay_program_id: &'a swap_core::Pubkey,
}

impl<'a> ClaimVerifier<'a> {
    pub fn new(relay_program_id: &'a swap_core::Pubkey) -> Self {
        Self { relay_program_id }
    }

    pub fn verify(&self, data: &SwapData, secret: &[u8], preamble: &Preamble) -> EscrowResult<[u8; 32]> {
        match data.kind {
            SwapType::Htlc => verify_htlc(data, secret),
            SwapType::Chain | SwapType::ChainNonced => {
                let txid = verify_chain_output(data, secret)?;
                self.verify_relay_attestation(data, &txid, preamble)?;
                Ok(txid)
            }
            SwapType::ChainTxhash => {
                self.verify_relay_attestation(data, &data.hash, preamble)?;
                Ok(data.hash)
            }
        }
    }

    /// The first preamble instruction must be the relay's SPV attestation of
    /// `txid` at no less than the required depth
    fn verify_relay_attestation(&self, data: &SwapData, txid: &[u8; 32], preamble: &Preamble) -> EscrowResult<()> {
        let ix = preamble.first().ok_or(SwapError::InvalidTxVerifyProgramId)?;
        if ix.program_id != *self.relay_program_id {
            return Err(SwapError::InvalidTxVerifyProgramId);
        }

        let Attestation::TransactionVerified {
            reversed_tx_id,
            confirmations,
        } = &ix.attestation
        else {
            return Err(SwapError::InvalidTxVerifyIx);
        };

        if reversed_tx_id != txid {
            return Err(SwapError::InvalidTxVerifyTxid);
        }
        if *confirmations < data.confirmations {
            return Err(SwapError::InvalidTxVerifyConfirmations);
        }
        Ok(())
    }
}

fn verify_htlc(data: &SwapData, secret: &[u8]) -> EscrowResult<[u8; 32]> {
    let preimage: [u8; 32] = secret
        .get(..32)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| SwapError::fault(format!("secret of {} bytes is shorter than 32", secret.len())))?;

    if commitment::htlc_hash(&preimage) != data.hash {
        return Err(SwapError::InvalidSecret);
    }
    Ok(preimage)
}

/// Checks the `vout || raw tx` payload against the txo commitment and returns
/// the transaction id
fn verify_chain_output(data: &SwapData, secret: &[u8]) -> EscrowResult<[u8; 32]> {
    if secret.len() < 4 {
        return Err(SwapError::fault(format!(
            "chain claim payload of {} bytes has no output index",
            secret.len()
        )));
    }
    let vout = u32::from_le_bytes([secret[0], secret[1], secret[2], secret[3]]);

    let tx = parse_transaction(&secret[4..]).map_err(|e| {
        debug!("Rejected claim transaction: {}", e);
        SwapError::InvalidTx
    })?;

    let nonced = data.kind == SwapType::ChainNonced;
    let n_sequence = if nonced {
        Some(tx.uniform_sequence().map_err(|e: CoreError| {
            debug!("Rejected nonced claim transaction: {}", e);
            SwapError::InvalidTx
        })?)
    } else {
        None
    };

    let output = tx.output(vout).ok_or(SwapError::InvalidVout)?;
    let txo_hash = commitment::txo_hash(data.nonce, output.value.to_sat(), output.script_pubkey.as_bytes());
    if txo_hash != data.hash {
        return Err(SwapError::InvalidSecret);
    }

    if let Some(n_sequence) = n_sequence {
        if NoncedLock::to_nonce(tx.locktime(), n_sequence) != Some(data.nonce) {
            return Err(SwapError::InvalidNonce);
        }
    }

    Ok(tx.txid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attestation::BlockHeightOperator;
    use crate::testing::{chain_payload, claim_tx, htlc_pair, swap_data};
    use swap_core::Pubkey;

    fn relay() -> Pubkey {
        Pubkey::from_label("relay")
    }

    fn attested(txid: [u8; 32], confirmations: u16) -> Preamble {
        Preamble::new().push(
            relay(),
            Attestation::TransactionVerified {
                reversed_tx_id: txid,
                confirmations,
            },
        )
    }

    #[test]
    fn htlc_accepts_padded_preimage_and_rejects_wrong_one() {
        let (preimage, hash) = htlc_pair(1);
        let data = swap_data(SwapType::Htlc, hash, 0);
        let relay = relay();
        let verifier = ClaimVerifier::new(&relay);

        let mut padded = preimage.to_vec();
        padded.extend_from_slice(&[0xEE; 8]);
        assert_eq!(verifier.verify(&data, &padded, &Preamble::new()), Ok(preimage));

        let (other, _) = htlc_pair(2);
        assert_eq!(
            verifier.verify(&data, &other, &Preamble::new()),
            Err(SwapError::InvalidSecret)
        );
    }

    #[test]
    fn short_htlc_secret_is_a_fault() {
        let (preimage, hash) = htlc_pair(1);
        let data = swap_data(SwapType::Htlc, hash, 0);
        let relay = relay();
        let err = ClaimVerifier::new(&relay)
            .verify(&data, &preimage[..24], &Preamble::new())
            .unwrap_err();
        assert!(matches!(err, SwapError::ProgramFault(_)));
    }

    #[test]
    fn chain_claim_checks_output_then_relay() {
        let tx = claim_tx(&[0xFFFF_FFFF], 0, 25_000);
        let (payload, txid) = chain_payload(&tx, 0);
        let output = &tx.output[0];
        let hash = commitment::txo_hash(0, 25_000, output.script_pubkey.as_bytes());
        let mut data = swap_data(SwapType::Chain, hash, 0);
        data.confirmations = 3;
        let relay = relay();
        let verifier = ClaimVerifier::new(&relay);

        assert_eq!(verifier.verify(&data, &payload, &attested(txid, 3)), Ok(txid));
        assert_eq!(verifier.verify(&data, &payload, &attested(txid, 5)), Ok(txid));
        assert_eq!(
            verifier.verify(&data, &payload, &attested(txid, 2)),
            Err(SwapError::InvalidTxVerifyConfirmations)
        );
        assert_eq!(
            verifier.verify(&data, &payload, &attested([0; 32], 3)),
            Err(SwapError::InvalidTxVerifyTxid)
        );
        assert_eq!(
            verifier.verify(&data, &payload, &Preamble::new()),
            Err(SwapError::InvalidTxVerifyProgramId)
        );

        let wrong_program = Preamble::new().push(
            Pubkey::from_label("impostor"),
            Attestation::TransactionVerified {
                reversed_tx_id: txid,
                confirmations: 3,
            },
        );
        assert_eq!(
            verifier.verify(&data, &payload, &wrong_program),
            Err(SwapError::InvalidTxVerifyProgramId)
        );

        let wrong_ix = Preamble::new().push(
            relay,
            Attestation::BlockHeight {
                height: 1,
                operator: BlockHeightOperator::Ge,
            },
        );
        assert_eq!(
            verifier.verify(&data, &payload, &wrong_ix),
            Err(SwapError::InvalidTxVerifyIx)
        );
    }

    #[test]
    fn chain_claim_rejects_bad_payloads() {
        let tx = claim_tx(&[0xFFFF_FFFF], 0, 25_000);
        let hash = commitment::txo_hash(0, 25_000, tx.output[0].script_pubkey.as_bytes());
        let data = swap_data(SwapType::Chain, hash, 0);
        let relay = relay();
        let verifier = ClaimVerifier::new(&relay);

        let (missing_vout, txid) = chain_payload(&tx, 7);
        assert_eq!(
            verifier.verify(&data, &missing_vout, &attested(txid, 0)),
            Err(SwapError::InvalidVout)
        );

        let (other_output, txid) = chain_payload(&tx, 1);
        assert_eq!(
            verifier.verify(&data, &other_output, &attested(txid, 0)),
            Err(SwapError::InvalidSecret)
        );

        let mut merkle_node = vec![0u8; 4];
        merkle_node.extend_from_slice(&[0xAB; 64]);
        assert_eq!(
            verifier.verify(&data, &merkle_node, &attested(txid, 0)),
            Err(SwapError::InvalidTx)
        );
    }

    #[test]
    fn nonced_claim_requires_matching_locktime_and_uniform_sequence() {
        let nonce = (77u64 << 24) | 0x00_12_34;
        let lock = NoncedLock::from_nonce(nonce);
        let seq = lock.n_sequence;
        let locktime = lock.locktime as u32;

        let good = claim_tx(&[seq, seq], locktime, 10_000);
        let hash = commitment::txo_hash(nonce, 10_000, good.output[0].script_pubkey.as_bytes());
        let data = swap_data(SwapType::ChainNonced, hash, nonce);
        let relay = relay();
        let verifier = ClaimVerifier::new(&relay);

        let (payload, txid) = chain_payload(&good, 0);
        assert_eq!(verifier.verify(&data, &payload, &attested(txid, 0)), Ok(txid));

        let mixed = claim_tx(&[seq, seq + 1], locktime, 10_000);
        let (payload, txid) = chain_payload(&mixed, 0);
        assert_eq!(
            verifier.verify(&data, &payload, &attested(txid, 0)),
            Err(SwapError::InvalidTx)
        );

        let consensus_meaning = claim_tx(&[seq & 0x0FFF_FFFF], locktime, 10_000);
        let (payload, txid) = chain_payload(&consensus_meaning, 0);
        assert_eq!(
            verifier.verify(&data, &payload, &attested(txid, 0)),
            Err(SwapError::InvalidTx)
        );

        let wrong_locktime = claim_tx(&[seq], locktime + 1, 10_000);
        let (payload, txid) = chain_payload(&wrong_locktime, 0);
        assert_eq!(
            verifier.verify(&data, &payload, &attested(txid, 0)),
            Err(SwapError::InvalidNonce)
        );
    }

    #[test]
    fn txhash_claim_ignores_payload() {
        let txid = [0x5A; 32];
        let mut data = swap_data(SwapType::ChainTxhash, txid, 0);
        data.confirmations = 6;
        let relay = relay();
        let verifier = ClaimVerifier::new(&relay);

        assert_eq!(verifier.verify(&data, &[], &attested(txid, 6)), Ok(txid));
        assert_eq!(verifier.verify(&data, b"garbage", &attested(txid, 6)), Ok(txid));
        assert_eq!(
            verifier.verify(&data, &[], &attested([0x5B; 32], 6)),
            Err(SwapError::InvalidTxVerifyTxid)
        );
    }
}
