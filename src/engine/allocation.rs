use bytes::Bytes;

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::types::AssetId;

/// One planned swap: a concrete slice of the post-fee amount destined for one
/// target asset. Built per call after fee deduction, never persisted.
#[derive(Debug, Clone)]
pub struct Allocation {
    pub target: AssetId,
    pub amount_in: u64,
    pub min_out: u64,
    /// Pre-built aggregator call data; present only for instruction-relay
    /// requests.
    pub payload: Option<Bytes>,
}

/// Arity check for percentage-split requests: targets, percents and minimum
/// outputs must line up one to one.
pub fn validate_split_arity(
    targets: &[AssetId],
    percents: &[u8],
    min_outs: &[u64],
) -> EngineResult<()> {
    if percents.len() != targets.len() {
        return Err(EngineError::ArityMismatch {
            argument: "percents",
            expected: targets.len(),
            actual: percents.len(),
        });
    }
    if min_outs.len() != targets.len() {
        return Err(EngineError::ArityMismatch {
            argument: "min_outs",
            expected: targets.len(),
            actual: min_outs.len(),
        });
    }
    Ok(())
}

/// Percentage sum must stay within 100. Duplicate targets are deliberately
/// not rejected; they just produce independent swaps against the same asset.
pub fn validate_percents(percents: &[u8]) -> EngineResult<()> {
    let sum: u32 = percents.iter().map(|p| u32::from(*p)).sum();
    if sum > 100 {
        return Err(EngineError::AllocationOverflow { sum });
    }
    Ok(())
}

/// Plan a percentage split of `net`. Integer division floors each slice; the
/// remainder is left un-swapped and refunded to the caller at settlement.
pub fn plan_split(
    net: u64,
    targets: &[AssetId],
    percents: &[u8],
    min_outs: &[u64],
) -> EngineResult<Vec<Allocation>> {
    validate_split_arity(targets, percents, min_outs)?;
    validate_percents(percents)?;

    Ok(targets
        .iter()
        .zip(percents)
        .zip(min_outs)
        .map(|((target, percent), min_out)| Allocation {
            target: target.clone(),
            amount_in: percent_of(net, *percent),
            min_out: *min_out,
            payload: None,
        })
        .collect())
}

/// Plan an instruction-relay batch: one payload per target, the net value
/// split evenly across them. The division remainder is refunded like split
/// dust; slippage limits live inside the payloads.
pub fn plan_relay(
    net: u64,
    targets: &[AssetId],
    payloads: &[Bytes],
) -> EngineResult<Vec<Allocation>> {
    if payloads.len() != targets.len() {
        return Err(EngineError::ArityMismatch {
            argument: "payloads",
            expected: targets.len(),
            actual: payloads.len(),
        });
    }

    let slice = if targets.is_empty() {
        0
    } else {
        net / targets.len() as u64
    };

    Ok(targets
        .iter()
        .zip(payloads)
        .map(|(target, payload)| Allocation {
            target: target.clone(),
            amount_in: slice,
            min_out: 0,
            payload: Some(payload.clone()),
        })
        .collect())
}

fn percent_of(net: u64, percent: u8) -> u64 {
    (u128::from(net) * u128::from(percent) / 100) as u64
}
