use swap_core::{InitializeEvent, SwapType};
use tracing::info;

use super::{token_account_for, ProgramContext, ProgramState};
use crate::{
    error::SwapError,
    ledger::{LedgerBatch, TokenLedger},
    models::{BalanceAccount, EscrowState, FundingSource, InitializeRequest},
    EscrowResult,
};

pub fn process_initialize<L: TokenLedger>(
    state: &mut ProgramState<L>,
    ctx: &ProgramContext,
    req: &InitializeRequest,
) -> EscrowResult<InitializeEvent> {
    let data = &req.swap_data;

    if req.auth_expiry <= ctx.now {
        return Err(SwapError::AuthExpired);
    }
    if state.store.escrow_address(&data.hash) != req.escrow_address {
        return Err(SwapError::ConstraintSeeds);
    }
    if state.store.contains_escrow(&data.hash) {
        return Err(SwapError::AccountAlreadyInitialized);
    }
    if data.confirmations > ctx.config.max_confirmations() {
        return Err(SwapError::TooManyConfirmations);
    }
    if data.kind != SwapType::ChainNonced && data.nonce != 0 {
        return Err(SwapError::InvalidSwapDataNonce);
    }
    if data.pay_in != req.funding.is_pay_in() {
        return Err(SwapError::InvalidSwapDataPayIn);
    }

    // Recipient has to exist before funds are locked for it
    let claimer_ata = match (data.pay_out, req.claimer_destination) {
        (true, BalanceAccount::Token(address)) => {
            token_account_for(&state.ledger, &address, &req.mint)?;
            Some(address)
        }
        (false, BalanceAccount::Internal(address)) => {
            state.store.user_account_at(&address, &req.claimer, &req.mint)?;
            None
        }
        _ => return Err(SwapError::ConstraintRaw),
    };

    let mut batch = LedgerBatch::new();
    let (offerer_ata, security_deposit, claimer_bounty) = match req.funding {
        FundingSource::PayIn { offerer_token_account } => {
            let source = token_account_for(&state.ledger, &offerer_token_account, &req.mint)?;
            if source.owner != req.offerer || source.amount < data.amount {
                return Err(SwapError::ConstraintRaw);
            }

            let vault = state.store.vault_address(&req.mint);
            batch
                .open_token_account(vault, state.store.vault_authority(), req.mint)
                .token_transfer(offerer_token_account, vault, req.mint, data.amount);
            (Some(offerer_token_account), 0, 0)
        }
        FundingSource::Internal {
            offerer_user_account,
            security_deposit,
            claimer_bounty,
        } => {
            let offerer = state
                .store
                .user_account_at(&offerer_user_account, &req.offerer, &req.mint)?;
            if offerer.amount < data.amount {
                return Err(SwapError::ConstraintRaw);
            }

            let pot = security_deposit.max(claimer_bounty);
            if state.ledger.native_balance(&req.claimer) < pot {
                return Err(SwapError::ConstraintRaw);
            }
            batch.native_transfer(req.claimer, req.escrow_address, pot);
            (None, security_deposit, claimer_bounty)
        }
    };

    state.ledger.apply(&batch)?;

    if !data.pay_in {
        let offerer = state.store.user_account_mut(&req.offerer, &req.mint, false)?;
        offerer.amount -= data.amount;
    }
    state.store.insert_escrow(EscrowState {
        data: data.clone(),
        offerer: req.offerer,
        offerer_ata,
        claimer: req.claimer,
        claimer_ata,
        mint: req.mint,
        claimer_bounty,
        security_deposit,
    });

    info!(
        "Initialized {:?} escrow {} for {} (pay_in: {}, pay_out: {})",
        data.kind,
        hex::encode(data.hash),
        data.amount,
        data.pay_in,
        data.pay_out
    );

    Ok(InitializeEvent {
        hash: data.hash,
        txo_hash: req.txo_hash,
        nonce: data.nonce,
        kind: data.kind,
        sequence: data.sequence,
    })
}
