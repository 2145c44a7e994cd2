//! Swap-execution back-ends. Both routers are external collaborators: the
//! engine dispatches to whichever one the active strategy is bound to and
//! treats any failure as grounds to unwind the whole call.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::engine::{AccountId, AssetId};

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("insufficient output: got {got}, required {min_out}")]
    InsufficientOutput { got: u64, min_out: u64 },
    #[error("router call reverted: {0}")]
    Reverted(String),
    #[error("router returned no output")]
    NoOutput,
}

pub type RouterResult<T> = Result<T, RouterError>;

/// AMM-style router with a fixed swap entry point. Must fail, never silently
/// under-deliver, when the output would fall below `min_out`.
#[async_trait]
pub trait AmmRouter: Send + Sync {
    /// Identity the router is bound under; used for binding idempotence and
    /// token approvals.
    fn address(&self) -> &AccountId;

    async fn swap_exact_input_for_min_output(
        &self,
        input: &AssetId,
        output: &AssetId,
        amount_in: u64,
        min_out: u64,
        recipient: &AccountId,
    ) -> RouterResult<u64>;
}

/// Aggregator router that executes pre-built call data. The payload is opaque
/// to the engine; slippage limits are the route solver's responsibility and
/// must be encoded inside the payload.
#[async_trait]
pub trait AggregatorRouter: Send + Sync {
    fn address(&self) -> &AccountId;

    async fn execute(&self, payload: &Bytes, value: u64) -> RouterResult<u64>;
}
