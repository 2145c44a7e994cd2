use thiserror::Error;

use crate::engine::types::AssetId;
use crate::ledger::LedgerError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("argument arrays must have equal size: {argument} has {actual}, expected {expected}")]
    ArityMismatch {
        argument: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("the sum of the percents cannot exceed 100, got {sum}")]
    AllocationOverflow { sum: u32 },
    #[error("fee was not delivered to recipient: {0}")]
    FeeForwarding(String),
    #[error("swap execution failed for {target}: {reason}")]
    SwapExecution { target: AssetId, reason: String },
    #[error("caller is not the owner")]
    Authorization,
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("ledger operation failed: {0}")]
    Ledger(#[from] LedgerError),
    /// Backstop for the zero-retention invariant: a settled call must leave
    /// the engine account holding exactly what it held before.
    #[error("engine retained value after settlement: {asset} delta {delta}")]
    Retention { asset: AssetId, delta: i128 },
}

pub type EngineResult<T> = Result<T, EngineError>;
