use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::engine::{
    AccountId, ActiveStrategy, EngineError, EngineResult, FEE_DENOMINATOR, StrategyKind,
};

use super::FileConfig;

/// Single owner-role predicate supplied by the surrounding access-control
/// layer.
pub trait OwnerPolicy: Send + Sync {
    fn is_owner(&self, caller: &AccountId) -> bool;
}

/// The common case: exactly one owning account.
pub struct SingleOwner(AccountId);

impl SingleOwner {
    pub fn new(owner: AccountId) -> Self {
        Self(owner)
    }
}

impl OwnerPolicy for SingleOwner {
    fn is_owner(&self, caller: &AccountId) -> bool {
        &self.0 == caller
    }
}

/// Immutable view of the configuration, captured once at the start of a call
/// and held for its whole duration.
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    pub fee_rate: u16,
    pub fee_recipient: AccountId,
    pub strategy: ActiveStrategy,
}

struct ConfigState {
    fee_rate: u16,
    fee_recipient: AccountId,
    strategy: ActiveStrategy,
}

/// Owner-gated mutable configuration: fee rate, fee recipient and the active
/// strategy binding. Every mutation checks the owner policy first; readers
/// take a snapshot so a concurrent mutation never splits one call's view.
pub struct ConfigStore {
    owner: Arc<dyn OwnerPolicy>,
    state: RwLock<ConfigState>,
}

impl ConfigStore {
    /// Build the initial configuration. The strategy state machine starts in
    /// `FixedRouter`; the rate is validated the same way `set_fee` validates
    /// it.
    pub fn new(
        owner: Arc<dyn OwnerPolicy>,
        fee_rate: u16,
        fee_recipient: AccountId,
        strategy: ActiveStrategy,
    ) -> EngineResult<Self> {
        check_rate(fee_rate)?;
        Ok(Self {
            owner,
            state: RwLock::new(ConfigState {
                fee_rate,
                fee_recipient,
                strategy,
            }),
        })
    }

    /// Bootstrap the store from a loaded [`FileConfig`]. The file must name
    /// an owner; the fee recipient falls back to that owner when unset, and
    /// the rate goes through the same range check as `set_fee`.
    pub fn from_file(file: &FileConfig, strategy: ActiveStrategy) -> EngineResult<Self> {
        let owner = file.engine.owner().ok_or_else(|| {
            EngineError::InvalidParameter("config file names no owner account".to_string())
        })?;
        let recipient = file.engine.fee_recipient().unwrap_or_else(|| owner.clone());
        Self::new(
            Arc::new(SingleOwner::new(owner)),
            file.engine.fee_rate,
            recipient,
            strategy,
        )
    }

    pub fn set_fee(&self, caller: &AccountId, rate: u16) -> EngineResult<()> {
        self.authorize(caller)?;
        check_rate(rate)?;
        self.state.write().fee_rate = rate;
        info!(target: "config::store", rate, "fee rate updated");
        Ok(())
    }

    pub fn set_recipient(&self, caller: &AccountId, recipient: AccountId) -> EngineResult<()> {
        self.authorize(caller)?;
        info!(target: "config::store", recipient = %recipient, "fee recipient updated");
        self.state.write().fee_recipient = recipient;
        Ok(())
    }

    /// Rebind the execution strategy. Binding an identical variant/router
    /// pair twice leaves the configuration exactly as one binding would.
    pub fn bind_strategy(&self, caller: &AccountId, strategy: ActiveStrategy) -> EngineResult<()> {
        self.authorize(caller)?;
        let mut state = self.state.write();
        if state.strategy.same_binding(&strategy) {
            return Ok(());
        }
        info!(
            target: "config::store",
            from = %state.strategy.kind(),
            to = %strategy.kind(),
            router = %strategy.router_address(),
            "strategy rebound"
        );
        state.strategy = strategy;
        Ok(())
    }

    pub fn fee_rate(&self) -> u16 {
        self.state.read().fee_rate
    }

    pub fn fee_recipient(&self) -> AccountId {
        self.state.read().fee_recipient.clone()
    }

    pub fn strategy_kind(&self) -> StrategyKind {
        self.state.read().strategy.kind()
    }

    pub fn bound_router(&self) -> AccountId {
        self.state.read().strategy.router_address().clone()
    }

    pub fn snapshot(&self) -> ConfigSnapshot {
        let state = self.state.read();
        ConfigSnapshot {
            fee_rate: state.fee_rate,
            fee_recipient: state.fee_recipient.clone(),
            strategy: state.strategy.clone(),
        }
    }

    fn authorize(&self, caller: &AccountId) -> EngineResult<()> {
        if self.owner.is_owner(caller) {
            Ok(())
        } else {
            Err(EngineError::Authorization)
        }
    }
}

fn check_rate(rate: u16) -> EngineResult<()> {
    if u64::from(rate) > FEE_DENOMINATOR {
        return Err(EngineError::InvalidParameter(format!(
            "fee rate {rate} exceeds denominator {FEE_DENOMINATOR}"
        )));
    }
    Ok(())
}
