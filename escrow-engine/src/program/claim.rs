use swap_core::ClaimEvent;
use tracing::info;

use super::{check_preamble_source, token_account_for, ProgramContext, ProgramState};
use crate::{
    claim_verifier::ClaimVerifier,
    error::SwapError,
    ledger::{LedgerBatch, TokenLedger},
    models::{BalanceAccount, ClaimRequest, ClaimSecret},
    reputation::{ReputationTracker, Resolution},
    EscrowResult,
};

pub fn process_claim<L: TokenLedger>(
    state: &mut ProgramState<L>,
    ctx: &ProgramContext,
    req: &ClaimRequest,
) -> EscrowResult<ClaimEvent> {
    let escrow = state.store.escrow_at(&req.hash, &req.escrow_address)?.clone();
    let data = &escrow.data;

    if req.initializer != escrow.funder() {
        return Err(SwapError::ConstraintRaw);
    }

    // Claimer's internal balance after the credit, for non pay-out escrows
    let credited = match (data.pay_out, req.claimer_destination) {
        (true, BalanceAccount::Token(address)) => {
            if escrow.claimer_ata != Some(address) {
                return Err(SwapError::ConstraintRaw);
            }
            token_account_for(&state.ledger, &address, &escrow.mint)?;
            None
        }
        (false, BalanceAccount::Internal(address)) => {
            let claimer = state
                .store
                .user_account_at(&address, &escrow.claimer, &escrow.mint)?;
            let balance = claimer
                .amount
                .checked_add(data.amount)
                .ok_or_else(|| SwapError::fault("claimer balance overflow"))?;
            Some(balance)
        }
        _ => return Err(SwapError::ConstraintRaw),
    };

    check_preamble_source(&req.preamble)?;

    let (secret, buffer) = match &req.secret {
        ClaimSecret::Inline(bytes) => (bytes.as_slice(), None),
        ClaimSecret::Buffer(address) => {
            let buffer = state.store.owned_data_buffer(address, &req.signer)?;
            (buffer.data.as_slice(), Some(*address))
        }
    };

    let event_secret = ClaimVerifier::new(&ctx.config.relay_program_id).verify(data, secret, &req.preamble)?;

    let mut batch = LedgerBatch::new();
    if let (true, Some(claimer_ata)) = (data.pay_out, escrow.claimer_ata) {
        batch.token_transfer(state.store.vault_address(&escrow.mint), claimer_ata, escrow.mint, data.amount);
    }
    let pot = escrow.native_pot();
    let bounty = escrow.claimer_bounty.min(pot);
    batch
        .native_transfer(req.escrow_address, req.signer, bounty)
        .native_transfer(req.escrow_address, req.initializer, pot - bounty);

    state.ledger.apply(&batch)?;

    state.store.remove_escrow(&req.hash);
    if let Some(balance) = credited {
        let claimer = state.store.user_account_mut(&escrow.claimer, &escrow.mint, false)?;
        claimer.amount = balance;
        ReputationTracker::record(claimer, data, Resolution::Success);
    }
    if let Some(address) = buffer {
        state.store.remove_data_buffer(&address);
    }

    info!(
        "Claimed {:?} escrow {} ({} to {}, bounty {} to {})",
        data.kind,
        hex::encode(data.hash),
        data.amount,
        escrow.claimer,
        bounty,
        req.signer
    );

    Ok(ClaimEvent {
        hash: data.hash,
        secret: event_secret,
        sequence: data.sequence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        attestation::{Attestation, Preamble},
        program::process_initialize,
        testing::{htlc_pair, Fixture},
    };
    use swap_core::{Pubkey, SwapType};

    fn claim_request(fx: &Fixture, hash: [u8; 32], secret: Vec<u8>) -> ClaimRequest {
        ClaimRequest {
            hash,
            escrow_address: fx.state.store.escrow_address(&hash),
            signer: fx.claimer,
            initializer: fx.claimer,
            claimer_destination: BalanceAccount::Internal(
                fx.state.store.user_account_address(&fx.claimer, &fx.mint),
            ),
            secret: ClaimSecret::Inline(secret),
            preamble: Preamble::new(),
        }
    }

    #[test]
    fn htlc_claim_credits_claimer_and_records_success() {
        let mut fx = Fixture::new();
        let ctx = fx.ctx();
        let (preimage, hash) = htlc_pair(1);
        let init = fx.internal_init(SwapType::Htlc, hash, 100);
        process_initialize(&mut fx.state, &ctx, &init).unwrap();

        let req = claim_request(&fx, hash, preimage.to_vec());
        let event = process_claim(&mut fx.state, &ctx, &req).unwrap();
        assert_eq!(event.secret, preimage);

        let claimer = fx.state.store.user_account(&fx.claimer, &fx.mint).unwrap();
        assert_eq!(claimer.amount, 100);
        assert_eq!(claimer.success_count, [1, 0, 0, 0]);
        assert_eq!(claimer.success_volume, [100, 0, 0, 0]);
        assert!(fx.state.store.escrow(&hash).is_none());

        assert_eq!(
            process_claim(&mut fx.state, &ctx, &req),
            Err(SwapError::AccountNotInitialized)
        );
    }

    #[test]
    fn account_binding_is_checked_before_the_proof() {
        let mut fx = Fixture::new();
        let ctx = fx.ctx();
        let (_, hash) = htlc_pair(1);
        let init = fx.internal_init(SwapType::Htlc, hash, 100);
        process_initialize(&mut fx.state, &ctx, &init).unwrap();
        let garbage = vec![0u8; 32];

        let mut req = claim_request(&fx, hash, garbage.clone());
        req.escrow_address = Pubkey::from_label("elsewhere");
        assert_eq!(process_claim(&mut fx.state, &ctx, &req), Err(SwapError::ConstraintSeeds));

        let mut req = claim_request(&fx, hash, garbage.clone());
        req.initializer = fx.offerer;
        assert_eq!(process_claim(&mut fx.state, &ctx, &req), Err(SwapError::ConstraintRaw));

        let mut req = claim_request(&fx, hash, garbage.clone());
        req.claimer_destination =
            BalanceAccount::Internal(fx.state.store.user_account_address(&fx.offerer, &fx.mint));
        assert_eq!(process_claim(&mut fx.state, &ctx, &req), Err(SwapError::ConstraintSeeds));

        let mut req = claim_request(&fx, hash, garbage.clone());
        req.claimer_destination = BalanceAccount::Token(fx.claimer_ata);
        assert_eq!(process_claim(&mut fx.state, &ctx, &req), Err(SwapError::ConstraintRaw));

        let mut req = claim_request(&fx, hash, garbage.clone());
        req.preamble.source = Pubkey::from_label("fake-sysvar");
        assert_eq!(process_claim(&mut fx.state, &ctx, &req), Err(SwapError::ConstraintAddress));

        let req = claim_request(&fx, hash, garbage);
        assert_eq!(process_claim(&mut fx.state, &ctx, &req), Err(SwapError::InvalidSecret));
        assert!(fx.state.store.escrow(&hash).is_some());
    }

    #[test]
    fn buffered_secret_must_belong_to_signer_and_is_consumed() {
        let mut fx = Fixture::new();
        let ctx = fx.ctx();
        let (preimage, hash) = htlc_pair(3);
        let init = fx.internal_init(SwapType::Htlc, hash, 10);
        process_initialize(&mut fx.state, &ctx, &init).unwrap();

        let buffer = Pubkey::from_label("buffer");
        fx.state.store.insert_data_buffer(
            buffer,
            crate::models::DataBuffer {
                owner: fx.offerer,
                data: preimage.to_vec(),
            },
        );

        let mut req = claim_request(&fx, hash, vec![]);
        req.secret = ClaimSecret::Buffer(buffer);
        assert_eq!(process_claim(&mut fx.state, &ctx, &req), Err(SwapError::InvalidUserData));

        fx.state.store.data_buffer_mut(&buffer).unwrap().owner = fx.claimer;
        process_claim(&mut fx.state, &ctx, &req).unwrap();
        assert!(fx.state.store.data_buffer(&buffer).is_none());
    }

    #[test]
    fn bounty_goes_to_submitter_and_rest_to_funder() {
        let mut fx = Fixture::new();
        let ctx = fx.ctx();
        let txid = [0x44; 32];
        let mut init = fx.internal_init(SwapType::ChainTxhash, txid, 100);
        init.funding = crate::models::FundingSource::Internal {
            offerer_user_account: fx.state.store.user_account_address(&fx.offerer, &fx.mint),
            security_deposit: 80,
            claimer_bounty: 30,
        };
        process_initialize(&mut fx.state, &ctx, &init).unwrap();

        let mut req = claim_request(&fx, txid, vec![]);
        req.signer = fx.watchtower;
        req.preamble = Preamble::new().push(
            ctx.config.relay_program_id,
            Attestation::TransactionVerified {
                reversed_tx_id: txid,
                confirmations: 1,
            },
        );
        process_claim(&mut fx.state, &ctx, &req).unwrap();

        assert_eq!(fx.state.ledger.native_balance(&fx.watchtower), 30);
        assert_eq!(fx.state.ledger.native_balance(&fx.claimer), Fixture::NATIVE_BALANCE - 30);
        assert_eq!(fx.state.ledger.native_balance(&req.escrow_address), 0);
    }

    #[test]
    fn pay_out_claim_moves_tokens_from_vault() {
        let mut fx = Fixture::new();
        let ctx = fx.ctx();
        let (preimage, hash) = htlc_pair(4);
        let mut init = fx.internal_init(SwapType::Htlc, hash, 60);
        init.swap_data.pay_out = true;
        init.claimer_destination = BalanceAccount::Token(fx.claimer_ata);
        process_initialize(&mut fx.state, &ctx, &init).unwrap();

        let mut req = claim_request(&fx, hash, preimage.to_vec());
        req.claimer_destination = BalanceAccount::Token(fx.offerer_ata);
        assert_eq!(process_claim(&mut fx.state, &ctx, &req), Err(SwapError::ConstraintRaw));

        req.claimer_destination = BalanceAccount::Token(fx.claimer_ata);
        process_claim(&mut fx.state, &ctx, &req).unwrap();

        assert_eq!(fx.state.ledger.token_balance(&fx.claimer_ata), 60);
        let claimer = fx.state.store.user_account(&fx.claimer, &fx.mint).unwrap();
        assert_eq!(claimer.amount, 0);
        assert_eq!(claimer.success_count, [0; 4]);
        assert!(fx.custody().is_balanced());
    }
}
