use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::trace;

use super::{AssetLedger, CheckpointId, LedgerError, LedgerResult};
use crate::engine::{AccountId, AssetId};

#[derive(Debug, Clone, Default)]
struct LedgerState {
    balances: HashMap<(AssetId, AccountId), u64>,
    allowances: HashMap<(AssetId, AccountId, AccountId), u64>,
    rejecting: HashSet<AccountId>,
}

impl LedgerState {
    fn balance(&self, asset: &AssetId, account: &AccountId) -> u64 {
        self.balances
            .get(&(asset.clone(), account.clone()))
            .copied()
            .unwrap_or(0)
    }

    fn credit(&mut self, asset: &AssetId, account: &AccountId, amount: u64) {
        *self
            .balances
            .entry((asset.clone(), account.clone()))
            .or_insert(0) += amount;
    }

    fn debit(
        &mut self,
        asset: &AssetId,
        account: &AccountId,
        amount: u64,
    ) -> LedgerResult<()> {
        let held = self.balance(asset, account);
        if held < amount {
            return Err(LedgerError::InsufficientBalance {
                account: account.clone(),
                asset: asset.clone(),
                held,
                needed: amount,
            });
        }
        self.balances
            .insert((asset.clone(), account.clone()), held - amount);
        Ok(())
    }
}

/// In-memory ledger with snapshot-based checkpoints. Backs dry runs and the
/// test harness; real deployments supply their own [`AssetLedger`].
///
/// A checkpoint snapshots the whole ledger, so units of work must not
/// overlap: rolling one back restores the full snapshot and would discard
/// transfers made by any other in-flight call. Checkpoints nest instead, and
/// rolling back or committing a checkpoint drops every later one.
#[derive(Default)]
pub struct InMemoryLedger {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    state: LedgerState,
    snapshots: Vec<(u64, LedgerState)>,
    next_checkpoint: u64,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create units of `asset` out of thin air. Simulation helper.
    pub fn mint(&self, asset: &AssetId, account: &AccountId, amount: u64) {
        self.inner.lock().state.credit(asset, account, amount);
    }

    /// Mark an account as refusing incoming transfers, the way a recipient
    /// contract without a payable fallback would.
    pub fn reject_incoming(&self, account: &AccountId) {
        self.inner.lock().state.rejecting.insert(account.clone());
    }

    /// Synchronous balance read for assertions and mock routers.
    pub fn balance(&self, asset: &AssetId, account: &AccountId) -> u64 {
        self.inner.lock().state.balance(asset, account)
    }

    pub fn allowance(&self, asset: &AssetId, owner: &AccountId, spender: &AccountId) -> u64 {
        self.inner
            .lock()
            .state
            .allowances
            .get(&(asset.clone(), owner.clone(), spender.clone()))
            .copied()
            .unwrap_or(0)
    }

    /// Pull `amount` of `owner`'s tokens as `spender`, consuming allowance.
    /// Mock routers use this to model approve-then-swap.
    pub fn spend_allowance(
        &self,
        asset: &AssetId,
        owner: &AccountId,
        spender: &AccountId,
        to: &AccountId,
        amount: u64,
    ) -> LedgerResult<()> {
        let mut inner = self.inner.lock();
        let key = (asset.clone(), owner.clone(), spender.clone());
        let allowed = inner.state.allowances.get(&key).copied().unwrap_or(0);
        if allowed < amount {
            return Err(LedgerError::TransferRejected {
                account: spender.clone(),
                reason: format!("allowance {allowed} below requested {amount}"),
            });
        }
        inner.state.debit(asset, owner, amount)?;
        inner.state.allowances.insert(key, allowed - amount);
        inner.state.credit(asset, to, amount);
        Ok(())
    }
}

#[async_trait]
impl AssetLedger for InMemoryLedger {
    async fn balance_of(&self, asset: &AssetId, account: &AccountId) -> LedgerResult<u64> {
        Ok(self.inner.lock().state.balance(asset, account))
    }

    async fn transfer(
        &self,
        asset: &AssetId,
        from: &AccountId,
        to: &AccountId,
        amount: u64,
    ) -> LedgerResult<()> {
        let mut inner = self.inner.lock();
        if inner.state.rejecting.contains(to) {
            return Err(LedgerError::TransferRejected {
                account: to.clone(),
                reason: "account refuses incoming transfers".to_string(),
            });
        }
        inner.state.debit(asset, from, amount)?;
        inner.state.credit(asset, to, amount);
        trace!(target: "ledger::memory", %asset, %from, %to, amount, "transfer");
        Ok(())
    }

    async fn approve(
        &self,
        asset: &AssetId,
        owner: &AccountId,
        spender: &AccountId,
        amount: u64,
    ) -> LedgerResult<()> {
        self.inner
            .lock()
            .state
            .allowances
            .insert((asset.clone(), owner.clone(), spender.clone()), amount);
        Ok(())
    }

    async fn checkpoint(&self) -> LedgerResult<CheckpointId> {
        let mut inner = self.inner.lock();
        let id = inner.next_checkpoint;
        inner.next_checkpoint += 1;
        let snapshot = inner.state.clone();
        inner.snapshots.push((id, snapshot));
        Ok(CheckpointId(id))
    }

    async fn commit(&self, checkpoint: CheckpointId) -> LedgerResult<()> {
        let mut inner = self.inner.lock();
        let position = inner
            .snapshots
            .iter()
            .position(|(id, _)| *id == checkpoint.0)
            .ok_or(LedgerError::UnknownCheckpoint(checkpoint.0))?;
        inner.snapshots.truncate(position);
        Ok(())
    }

    async fn rollback(&self, checkpoint: CheckpointId) -> LedgerResult<()> {
        let mut inner = self.inner.lock();
        let position = inner
            .snapshots
            .iter()
            .position(|(id, _)| *id == checkpoint.0)
            .ok_or(LedgerError::UnknownCheckpoint(checkpoint.0))?;
        let (_, snapshot) = inner.snapshots.swap_remove(position);
        inner.snapshots.truncate(position);
        inner.state = snapshot;
        Ok(())
    }
}
