//! Ledger adapter - token accounts and native balances
//!
//! The escrow program never mutates balances directly. Each operation builds
//! a [`LedgerBatch`] after all of its checks pass and hands it to the ledger,
//! which applies every step or none of them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use swap_core::Pubkey;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Insufficient funds in {account}: needed {needed}, available {available}")]
    InsufficientFunds {
        account: Pubkey,
        needed: u64,
        available: u64,
    },

    #[error("Token account {0} does not exist")]
    AccountNotFound(Pubkey),

    #[error("Token account {account} holds mint {actual}, expected {expected}")]
    MintMismatch {
        account: Pubkey,
        expected: Pubkey,
        actual: Pubkey,
    },

    #[error("Token account {0} already exists")]
    AccountExists(Pubkey),

    #[error("Balance overflow")]
    Overflow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAccount {
    pub address: Pubkey,
    pub owner: Pubkey,
    pub mint: Pubkey,
    pub amount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerOp {
    /// Creates an empty token account, skipped when it already exists with
    /// the same owner and mint
    OpenTokenAccount {
        address: Pubkey,
        owner: Pubkey,
        mint: Pubkey,
    },
    TokenTransfer {
        from: Pubkey,
        to: Pubkey,
        mint: Pubkey,
        amount: u64,
    },
    NativeTransfer {
        from: Pubkey,
        to: Pubkey,
        amount: u64,
    },
}

/// Ordered list of balance changes applied atomically
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerBatch {
    ops: Vec<LedgerOp>,
}

impl LedgerBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_token_account(&mut self, address: Pubkey, owner: Pubkey, mint: Pubkey) -> &mut Self {
        self.ops.push(LedgerOp::OpenTokenAccount { address, owner, mint });
        self
    }

    /// Zero-amount transfers are dropped
    pub fn token_transfer(&mut self, from: Pubkey, to: Pubkey, mint: Pubkey, amount: u64) -> &mut Self {
        if amount > 0 {
            self.ops.push(LedgerOp::TokenTransfer { from, to, mint, amount });
        }
        self
    }

    pub fn native_transfer(&mut self, from: Pubkey, to: Pubkey, amount: u64) -> &mut Self {
        if amount > 0 {
            self.ops.push(LedgerOp::NativeTransfer { from, to, amount });
        }
        self
    }

    pub fn ops(&self) -> &[LedgerOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Token and native-asset custody used by the escrow program
pub trait TokenLedger: Send + Sync {
    fn token_account(&self, address: &Pubkey) -> Option<TokenAccount>;

    fn native_balance(&self, owner: &Pubkey) -> u64;

    /// Applies every op in order, or leaves the ledger untouched on error
    fn apply(&mut self, batch: &LedgerBatch) -> Result<(), LedgerError>;
}

/// In-memory ledger
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    token_accounts: HashMap<Pubkey, TokenAccount>,
    native: HashMap<Pubkey, u64>,
    opened: u64,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a fresh token account for `owner` and returns its address
    pub fn create_token_account(&mut self, owner: Pubkey, mint: Pubkey) -> Pubkey {
        self.opened += 1;
        let address = Pubkey::find_program_address(
            &[b"token", owner.as_ref(), mint.as_ref(), &self.opened.to_le_bytes()],
            &mint,
        );
        self.token_accounts.insert(
            address,
            TokenAccount {
                address,
                owner,
                mint,
                amount: 0,
            },
        );
        address
    }

    pub fn mint_to(&mut self, address: &Pubkey, amount: u64) -> Result<(), LedgerError> {
        let account = self
            .token_accounts
            .get_mut(address)
            .ok_or(LedgerError::AccountNotFound(*address))?;
        account.amount = account.amount.checked_add(amount).ok_or(LedgerError::Overflow)?;
        Ok(())
    }

    pub fn airdrop(&mut self, owner: Pubkey, lamports: u64) -> Result<(), LedgerError> {
        let balance = self.native.entry(owner).or_default();
        *balance = balance.checked_add(lamports).ok_or(LedgerError::Overflow)?;
        Ok(())
    }

    pub fn token_balance(&self, address: &Pubkey) -> u64 {
        self.token_accounts.get(address).map_or(0, |account| account.amount)
    }

    fn apply_op(
        accounts: &mut HashMap<Pubkey, TokenAccount>,
        native: &mut HashMap<Pubkey, u64>,
        op: &LedgerOp,
    ) -> Result<(), LedgerError> {
        match op {
            LedgerOp::OpenTokenAccount { address, owner, mint } => {
                match accounts.get(address) {
                    Some(existing) if existing.owner == *owner && existing.mint == *mint => {}
                    Some(_) => return Err(LedgerError::AccountExists(*address)),
                    None => {
                        accounts.insert(
                            *address,
                            TokenAccount {
                                address: *address,
                                owner: *owner,
                                mint: *mint,
                                amount: 0,
                            },
                        );
                    }
                }
            }
            LedgerOp::TokenTransfer { from, to, mint, amount } => {
                for address in [from, to] {
                    let account = accounts.get(address).ok_or(LedgerError::AccountNotFound(*address))?;
                    if account.mint != *mint {
                        return Err(LedgerError::MintMismatch {
                            account: *address,
                            expected: *mint,
                            actual: account.mint,
                        });
                    }
                }

                let source = accounts.get_mut(from).ok_or(LedgerError::AccountNotFound(*from))?;
                if source.amount < *amount {
                    return Err(LedgerError::InsufficientFunds {
                        account: *from,
                        needed: *amount,
                        available: source.amount,
                    });
                }
                source.amount -= amount;

                let dest = accounts.get_mut(to).ok_or(LedgerError::AccountNotFound(*to))?;
                dest.amount = dest.amount.checked_add(*amount).ok_or(LedgerError::Overflow)?;
            }
            LedgerOp::NativeTransfer { from, to, amount } => {
                let available = native.get(from).copied().unwrap_or(0);
                if available < *amount {
                    return Err(LedgerError::InsufficientFunds {
                        account: *from,
                        needed: *amount,
                        available,
                    });
                }
                native.insert(*from, available - amount);

                let dest = native.entry(*to).or_default();
                *dest = dest.checked_add(*amount).ok_or(LedgerError::Overflow)?;
            }
        }
        Ok(())
    }
}

impl TokenLedger for MemoryLedger {
    fn token_account(&self, address: &Pubkey) -> Option<TokenAccount> {
        self.token_accounts.get(address).cloned()
    }

    fn native_balance(&self, owner: &Pubkey) -> u64 {
        self.native.get(owner).copied().unwrap_or(0)
    }

    fn apply(&mut self, batch: &LedgerBatch) -> Result<(), LedgerError> {
        // Staged on copies so a failing op leaves nothing half-applied
        let mut accounts = self.token_accounts.clone();
        let mut native = self.native.clone();
        for op in batch.ops() {
            Self::apply_op(&mut accounts, &mut native, op)?;
        }
        self.token_accounts = accounts;
        self.native = native;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_batch_leaves_ledger_untouched() {
        let mint = Pubkey::from_label("mint");
        let alice = Pubkey::from_label("alice");
        let bob = Pubkey::from_label("bob");

        let mut ledger = MemoryLedger::new();
        let a = ledger.create_token_account(alice, mint);
        let b = ledger.create_token_account(bob, mint);
        ledger.mint_to(&a, 100).unwrap();

        let mut batch = LedgerBatch::new();
        batch.token_transfer(a, b, mint, 60).token_transfer(a, b, mint, 60);
        let err = ledger.apply(&batch).unwrap_err();

        assert!(matches!(err, LedgerError::InsufficientFunds { needed: 60, available: 40, .. }));
        assert_eq!(ledger.token_balance(&a), 100);
        assert_eq!(ledger.token_balance(&b), 0);
    }

    #[test]
    fn transfers_check_mint_and_existence() {
        let mint = Pubkey::from_label("mint");
        let other_mint = Pubkey::from_label("other-mint");
        let alice = Pubkey::from_label("alice");

        let mut ledger = MemoryLedger::new();
        let a = ledger.create_token_account(alice, mint);
        let c = ledger.create_token_account(alice, other_mint);
        ledger.mint_to(&a, 10).unwrap();

        let mut batch = LedgerBatch::new();
        batch.token_transfer(a, c, mint, 5);
        assert!(matches!(ledger.apply(&batch), Err(LedgerError::MintMismatch { .. })));

        let ghost = Pubkey::from_label("ghost");
        let mut batch = LedgerBatch::new();
        batch.token_transfer(a, ghost, mint, 5);
        assert_eq!(ledger.apply(&batch), Err(LedgerError::AccountNotFound(ghost)));
    }

    #[test]
    fn open_is_idempotent_for_same_owner_and_mint() {
        let mint = Pubkey::from_label("mint");
        let vault = Pubkey::from_label("vault");
        let authority = Pubkey::from_label("authority");

        let mut ledger = MemoryLedger::new();
        let mut batch = LedgerBatch::new();
        batch.open_token_account(vault, authority, mint);
        ledger.apply(&batch).unwrap();
        ledger.apply(&batch).unwrap();
        assert_eq!(ledger.token_account(&vault).unwrap().owner, authority);

        let mut clash = LedgerBatch::new();
        clash.open_token_account(vault, Pubkey::from_label("mallory"), mint);
        assert_eq!(ledger.apply(&clash), Err(LedgerError::AccountExists(vault)));
    }

    #[test]
    fn native_transfers_move_lamports() {
        let alice = Pubkey::from_label("alice");
        let pot = Pubkey::from_label("pot");

        let mut ledger = MemoryLedger::new();
        ledger.airdrop(alice, 1_000).unwrap();

        let mut batch = LedgerBatch::new();
        batch.native_transfer(alice, pot, 400).native_transfer(alice, pot, 0);
        assert_eq!(batch.ops().len(), 1);
        ledger.apply(&batch).unwrap();

        assert_eq!(ledger.native_balance(&alice), 600);
        assert_eq!(ledger.native_balance(&pot), 400);
    }
}
