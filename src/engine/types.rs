use std::fmt;

use serde::{Deserialize, Serialize};

/// Asset identifier. The native currency is distinguished from tokens because
/// the two move differently: tokens need an approval before a router can pull
/// them, the native asset is forwarded as call value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AssetId {
    Native,
    Token(String),
}

impl AssetId {
    pub fn token(symbol: impl Into<String>) -> Self {
        AssetId::Token(symbol.into())
    }

    pub fn is_native(&self) -> bool {
        matches!(self, AssetId::Native)
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetId::Native => write!(f, "native"),
            AssetId::Token(symbol) => write!(f, "{symbol}"),
        }
    }
}

/// Opaque account identifier for callers, routers and fee recipients.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        AccountId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(value: &str) -> Self {
        AccountId(value.to_string())
    }
}

/// Stages of one orchestration call. Purely diagnostic: the orchestrator
/// drives these in order and any failure unwinds the whole call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPhase {
    Idle,
    FeeCharged,
    Validated,
    Swapping,
    Settled,
}

impl CallPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallPhase::Idle => "idle",
            CallPhase::FeeCharged => "fee_charged",
            CallPhase::Validated => "validated",
            CallPhase::Swapping => "swapping",
            CallPhase::Settled => "settled",
        }
    }
}

impl fmt::Display for CallPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-target fill produced while swapping. Lives only for the duration of
/// one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationResult {
    pub target: AssetId,
    pub amount_in: u64,
    pub amount_out: u64,
}

/// Outcome of one settled orchestration call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementReport {
    pub gross: u64,
    pub fee: u64,
    pub net: u64,
    /// Un-allocated remainder plus rounding dust, returned to the caller.
    pub refund: u64,
    pub fills: Vec<AllocationResult>,
}

impl SettlementReport {
    /// Base-asset amount actually routed into swaps. Always equals
    /// `net - refund`.
    pub fn total_swapped(&self) -> u64 {
        self.fills.iter().map(|fill| fill.amount_in).sum()
    }
}
