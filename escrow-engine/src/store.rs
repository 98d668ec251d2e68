//! Escrow State Store - program-owned records and their addresses
//!
//! Escrows are keyed by their commitment hash, user accounts by the address
//! derived from (owner, mint), data buffers by the address the signer chose.
//! Address checks happen here so every operation validates accounts the
//! same way.

use std::collections::HashMap;

use swap_core::Pubkey;

use crate::{
    error::SwapError,
    models::{DataBuffer, EscrowState, UserAccount},
    EscrowResult,
};

pub const ESCROW_STATE_SEED: &[u8] = b"state";
pub const USER_DATA_SEED: &[u8] = b"uservault";
pub const VAULT_SEED: &[u8] = b"vault";
pub const AUTHORITY_SEED: &[u8] = b"authority";

#[derive(Debug, Clone)]
pub struct EscrowStateStore {
    program_id: Pubkey,
    escrows: HashMap<[u8; 32], EscrowState>,
    user_accounts: HashMap<Pubkey, UserAccount>,
    data_buffers: HashMap<Pubkey, DataBuffer>,
}

impl EscrowStateStore {
    pub fn new(program_id: Pubkey) -> Self {
        Self {
            program_id,
            escrows: HashMap::new(),
            user_accounts: HashMap::new(),
            data_buffers: HashMap::new(),
        }
    }

    pub fn program_id(&self) -> Pubkey {
        self.program_id
    }

    pub fn escrow_address(&self, hash: &[u8; 32]) -> Pubkey {
        Pubkey::find_program_address(&[ESCROW_STATE_SEED, hash], &self.program_id)
    }

    pub fn user_account_address(&self, owner: &Pubkey, mint: &Pubkey) -> Pubkey {
        Pubkey::find_program_address(&[USER_DATA_SEED, owner.as_ref(), mint.as_ref()], &self.program_id)
    }

    pub fn vault_address(&self, mint: &Pubkey) -> Pubkey {
        Pubkey::find_program_address(&[VAULT_SEED, mint.as_ref()], &self.program_id)
    }

    /// Owner of every vault
    pub fn vault_authority(&self) -> Pubkey {
        Pubkey::find_program_address(&[AUTHORITY_SEED], &self.program_id)
    }

    // Escrows

    /// Live escrow at `address`, which must be derived from `hash`
    pub fn escrow_at(&self, hash: &[u8; 32], address: &Pubkey) -> EscrowResult<&EscrowState> {
        if self.escrow_address(hash) != *address {
            return Err(SwapError::ConstraintSeeds);
        }
        self.escrows.get(hash).ok_or(SwapError::AccountNotInitialized)
    }

    pub fn escrow(&self, hash: &[u8; 32]) -> Option<&EscrowState> {
        self.escrows.get(hash)
    }

    pub fn contains_escrow(&self, hash: &[u8; 32]) -> bool {
        self.escrows.contains_key(hash)
    }

    pub fn escrows(&self) -> impl Iterator<Item = &EscrowState> {
        self.escrows.values()
    }

    pub(crate) fn insert_escrow(&mut self, escrow: EscrowState) {
        self.escrows.insert(escrow.data.hash, escrow);
    }

    pub(crate) fn remove_escrow(&mut self, hash: &[u8; 32]) -> Option<EscrowState> {
        self.escrows.remove(hash)
    }

    // User accounts

    /// Checks that `address` is the user account of (owner, mint)
    pub fn check_user_account_address(&self, address: &Pubkey, owner: &Pubkey, mint: &Pubkey) -> EscrowResult<()> {
        if self.user_account_address(owner, mint) != *address {
            return Err(SwapError::ConstraintSeeds);
        }
        Ok(())
    }

    /// Existing user account of (owner, mint) at `address`
    pub fn user_account_at(&self, address: &Pubkey, owner: &Pubkey, mint: &Pubkey) -> EscrowResult<&UserAccount> {
        self.check_user_account_address(address, owner, mint)?;
        self.user_accounts.get(address).ok_or(SwapError::AccountNotInitialized)
    }

    pub fn user_account(&self, owner: &Pubkey, mint: &Pubkey) -> Option<&UserAccount> {
        self.user_accounts.get(&self.user_account_address(owner, mint))
    }

    pub fn user_accounts(&self) -> impl Iterator<Item = &UserAccount> {
        self.user_accounts.values()
    }

    /// Mutable user account; creates it when `init_if_needed` is set
    pub(crate) fn user_account_mut(
        &mut self,
        owner: &Pubkey,
        mint: &Pubkey,
        init_if_needed: bool,
    ) -> EscrowResult<&mut UserAccount> {
        let address = self.user_account_address(owner, mint);
        if init_if_needed {
            return Ok(self
                .user_accounts
                .entry(address)
                .or_insert_with(|| UserAccount::new(*owner, *mint)));
        }
        self.user_accounts
            .get_mut(&address)
            .ok_or(SwapError::AccountNotInitialized)
    }

    // Data buffers

    pub fn data_buffer(&self, address: &Pubkey) -> Option<&DataBuffer> {
        self.data_buffers.get(address)
    }

    /// Buffer at `address`, which must have been initialized by `signer`
    pub fn owned_data_buffer(&self, address: &Pubkey, signer: &Pubkey) -> EscrowResult<&DataBuffer> {
        let buffer = self
            .data_buffers
            .get(address)
            .ok_or(SwapError::AccountNotInitialized)?;
        if buffer.owner != *signer {
            return Err(SwapError::InvalidUserData);
        }
        Ok(buffer)
    }

    pub(crate) fn data_buffer_mut(&mut self, address: &Pubkey) -> Option<&mut DataBuffer> {
        self.data_buffers.get_mut(address)
    }

    pub(crate) fn insert_data_buffer(&mut self, address: Pubkey, buffer: DataBuffer) {
        self.data_buffers.insert(address, buffer);
    }

    pub(crate) fn remove_data_buffer(&mut self, address: &Pubkey) -> Option<DataBuffer> {
        self.data_buffers.remove(address)
    }
}
