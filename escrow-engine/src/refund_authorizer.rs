//! Refund Authorizer - decides whether an offerer may take funds back
//!
//! Either the claimer signed off on the refund (cooperative), or the escrow
//! has expired. Expiry below the block-height threshold is measured in
//! Bitcoin blocks and has to be proven by the relay.

use swap_core::{commitment, Expiry};

use crate::{
    attestation::{Attestation, BlockHeightOperator, Preamble},
    config::EngineConfig,
    error::SwapError,
    models::{EscrowState, RefundAuth},
    EscrowResult,
};

/// Operator a block-height refund proof must use: tip >= expiry
pub const REFUND_HEIGHT_OPERATOR: BlockHeightOperator = BlockHeightOperator::Ge;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefundKind {
    Cooperative,
    Timeout,
}

pub struct RefundAuthorizer<'a> {
    config: &'a EngineConfig,
    now: u64,
}

impl<'a> RefundAuthorizer<'a> {
    pub fn new(config: &'a EngineConfig, now: u64) -> Self {
        Self { config, now }
    }

    pub fn authorize(&self, escrow: &EscrowState, auth: RefundAuth, preamble: &Preamble) -> EscrowResult<RefundKind> {
        match auth {
            RefundAuth::Cooperative { auth_expiry } => {
                self.verify_signature(escrow, auth_expiry, preamble)?;
                Ok(RefundKind::Cooperative)
            }
            RefundAuth::Timeout => {
                self.verify_timeout(escrow, preamble)?;
                Ok(RefundKind::Timeout)
            }
        }
    }

    fn verify_signature(&self, escrow: &EscrowState, auth_expiry: u64, preamble: &Preamble) -> EscrowResult<()> {
        if auth_expiry <= self.now {
            return Err(SwapError::AuthExpired);
        }

        let ix = preamble
            .first()
            .ok_or(SwapError::SignatureVerificationFailedInvalidProgram)?;
        if ix.program_id != self.config.ed25519_program_id {
            return Err(SwapError::SignatureVerificationFailedInvalidProgram);
        }

        let Attestation::Ed25519 { pubkey, message } = &ix.attestation else {
            return Err(SwapError::SignatureVerificationFailedInvalidData);
        };

        let expected = commitment::refund_auth_digest(&escrow.data, auth_expiry);
        if *pubkey != escrow.claimer || message.as_slice() != expected.as_slice() {
            return Err(SwapError::SignatureVerificationFailedInvalidData);
        }
        Ok(())
    }

    fn verify_timeout(&self, escrow: &EscrowState, preamble: &Preamble) -> EscrowResult<()> {
        match escrow.data.expiry_kind(self.config.blockheight_expiry_threshold) {
            Expiry::BlockHeight(height) => {
                let ix = preamble
                    .first()
                    .ok_or(SwapError::InvalidBlockheightVerifyProgramId)?;
                if ix.program_id != self.config.relay_program_id {
                    return Err(SwapError::InvalidBlockheightVerifyProgramId);
                }

                let Attestation::BlockHeight {
                    height: attested,
                    operator,
                } = &ix.attestation
                else {
                    return Err(SwapError::InvalidBlockheightVerifyIx);
                };

                if *attested != height {
                    return Err(SwapError::InvalidBlockheightVerifyHeight);
                }
                if *operator != REFUND_HEIGHT_OPERATOR {
                    return Err(SwapError::InvalidBlockheightVerifyOperation);
                }
                Ok(())
            }
            Expiry::Timestamp(expiry) => {
                if expiry >= self.now {
                    return Err(SwapError::NotExpiredYet);
                }
                Ok(())
            }
        }
    }
}
