use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::engine::allocation::Allocation;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::types::{AccountId, AssetId};
use crate::ledger::AssetLedger;
use crate::router::{AggregatorRouter, AmmRouter};

/// Which execution path the engine is currently bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    FixedRouter,
    InstructionRelay,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::FixedRouter => f.write_str("fixed_router"),
            StrategyKind::InstructionRelay => f.write_str("instruction_relay"),
        }
    }
}

/// The active strategy binding: a variant tag plus the router it dispatches
/// to. Owned by the config store; callers get a clone in their call snapshot,
/// so rebinding never disturbs an in-flight call.
#[derive(Clone)]
pub enum ActiveStrategy {
    FixedRouter(Arc<dyn AmmRouter>),
    InstructionRelay(Arc<dyn AggregatorRouter>),
}

impl ActiveStrategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            ActiveStrategy::FixedRouter(_) => StrategyKind::FixedRouter,
            ActiveStrategy::InstructionRelay(_) => StrategyKind::InstructionRelay,
        }
    }

    pub fn router_address(&self) -> &AccountId {
        match self {
            ActiveStrategy::FixedRouter(router) => router.address(),
            ActiveStrategy::InstructionRelay(aggregator) => aggregator.address(),
        }
    }

    /// Two bindings are the same when they name the same variant and router;
    /// rebinding an identical pair is a no-op.
    pub fn same_binding(&self, other: &ActiveStrategy) -> bool {
        self.kind() == other.kind() && self.router_address() == other.router_address()
    }

    pub fn executor(&self) -> Box<dyn SwapExecutor> {
        match self {
            ActiveStrategy::FixedRouter(router) => {
                Box::new(FixedRouterStrategy::new(Arc::clone(router)))
            }
            ActiveStrategy::InstructionRelay(aggregator) => {
                Box::new(InstructionRelayStrategy::new(Arc::clone(aggregator)))
            }
        }
    }
}

impl fmt::Debug for ActiveStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveStrategy")
            .field("kind", &self.kind())
            .field("router", &self.router_address())
            .finish()
    }
}

/// Everything an executor needs from the surrounding call.
pub struct SwapContext<'a> {
    pub ledger: &'a dyn AssetLedger,
    pub engine: &'a AccountId,
    pub caller: &'a AccountId,
    pub base: &'a AssetId,
}

/// One swap per allocation. Implementations must deliver the output directly
/// to the original caller; the orchestrator's retention backstop catches any
/// that custody value instead.
#[async_trait]
pub trait SwapExecutor: Send + Sync {
    async fn execute(&self, ctx: &SwapContext<'_>, allocation: &Allocation) -> EngineResult<u64>;
}

/// Swaps every target through one configured AMM router.
pub struct FixedRouterStrategy {
    router: Arc<dyn AmmRouter>,
}

impl FixedRouterStrategy {
    pub fn new(router: Arc<dyn AmmRouter>) -> Self {
        Self { router }
    }
}

#[async_trait]
impl SwapExecutor for FixedRouterStrategy {
    async fn execute(&self, ctx: &SwapContext<'_>, allocation: &Allocation) -> EngineResult<u64> {
        // Token inputs are pulled by the router via allowance; the native
        // asset travels as call value and needs no approval.
        if !ctx.base.is_native() {
            ctx.ledger
                .approve(ctx.base, ctx.engine, self.router.address(), allocation.amount_in)
                .await?;
        }

        let amount_out = self
            .router
            .swap_exact_input_for_min_output(
                ctx.base,
                &allocation.target,
                allocation.amount_in,
                allocation.min_out,
                ctx.caller,
            )
            .await
            .map_err(|err| EngineError::SwapExecution {
                target: allocation.target.clone(),
                reason: err.to_string(),
            })?;

        debug!(
            target: "engine::executor",
            strategy = %StrategyKind::FixedRouter,
            target_asset = %allocation.target,
            amount_in = allocation.amount_in,
            amount_out,
            "swap filled"
        );
        Ok(amount_out)
    }
}

/// Relays caller-supplied call data to an aggregator, one instruction per
/// target. The payload is never interpreted here.
pub struct InstructionRelayStrategy {
    aggregator: Arc<dyn AggregatorRouter>,
}

impl InstructionRelayStrategy {
    pub fn new(aggregator: Arc<dyn AggregatorRouter>) -> Self {
        Self { aggregator }
    }
}

#[async_trait]
impl SwapExecutor for InstructionRelayStrategy {
    async fn execute(&self, ctx: &SwapContext<'_>, allocation: &Allocation) -> EngineResult<u64> {
        let payload = allocation
            .payload
            .as_ref()
            .ok_or_else(|| EngineError::SwapExecution {
                target: allocation.target.clone(),
                reason: "missing instruction payload".to_string(),
            })?;

        let amount_out = self
            .aggregator
            .execute(payload, allocation.amount_in)
            .await
            .map_err(|err| EngineError::SwapExecution {
                target: allocation.target.clone(),
                reason: err.to_string(),
            })?;

        debug!(
            target: "engine::executor",
            strategy = %StrategyKind::InstructionRelay,
            target_asset = %allocation.target,
            value = allocation.amount_in,
            amount_out,
            caller = %ctx.caller,
            "instruction relayed"
        );
        Ok(amount_out)
    }
}
