//! Asset-transfer boundary. The orchestrator never moves value itself; it
//! drives an [`AssetLedger`] implementation supplied by the embedding system.
//! The checkpoint surface is what gives a call its all-or-nothing semantics:
//! the orchestrator opens a checkpoint at entry and either commits it after
//! settlement or rolls every transfer back.

mod memory;

pub use memory::InMemoryLedger;

use async_trait::async_trait;
use thiserror::Error;

use crate::engine::{AccountId, AssetId};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("insufficient balance: {account} holds {held} {asset}, needs {needed}")]
    InsufficientBalance {
        account: AccountId,
        asset: AssetId,
        held: u64,
        needed: u64,
    },
    #[error("transfer rejected by {account}: {reason}")]
    TransferRejected { account: AccountId, reason: String },
    #[error("unknown checkpoint {0}")]
    UnknownCheckpoint(u64),
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Handle for one open unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointId(pub u64);

#[async_trait]
pub trait AssetLedger: Send + Sync {
    async fn balance_of(&self, asset: &AssetId, account: &AccountId) -> LedgerResult<u64>;

    async fn transfer(
        &self,
        asset: &AssetId,
        from: &AccountId,
        to: &AccountId,
        amount: u64,
    ) -> LedgerResult<()>;

    /// Allow `spender` to pull up to `amount` of `owner`'s tokens. Meaningless
    /// for the native asset, which is forwarded as value instead.
    async fn approve(
        &self,
        asset: &AssetId,
        owner: &AccountId,
        spender: &AccountId,
        amount: u64,
    ) -> LedgerResult<()>;

    /// Open a unit of work. Every mutation after this point belongs to the
    /// checkpoint until it is committed or rolled back.
    async fn checkpoint(&self) -> LedgerResult<CheckpointId>;

    async fn commit(&self, checkpoint: CheckpointId) -> LedgerResult<()>;

    /// Restore the state captured at `checkpoint`, discarding it and any
    /// checkpoints opened after it.
    async fn rollback(&self, checkpoint: CheckpointId) -> LedgerResult<()>;
}
