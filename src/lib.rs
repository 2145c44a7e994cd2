//! prism: a swap-orchestration engine.
//!
//! One inbound payment in a base asset is split across an arbitrary basket of
//! target assets by caller-specified percentages, executed through a pluggable
//! swap strategy (a fixed AMM router, or an aggregator fed pre-built call
//! data), with a per-mille protocol fee forwarded to a configured recipient.
//! Every call is all-or-nothing and the engine never retains value.
//!
//! The swap back-ends, the asset ledger and the owner check are collaborator
//! traits supplied by the embedding system; [`ledger::InMemoryLedger`] backs
//! dry runs and tests.

pub mod config;
pub mod engine;
pub mod ledger;
pub mod router;

pub use config::{
    ConfigError, ConfigSnapshot, ConfigStore, FileConfig, OwnerPolicy, SingleOwner, load_config,
};
pub use engine::{
    AccountId, ActiveStrategy, Allocation, AllocationResult, AssetId, EngineError, EngineResult,
    FEE_DENOMINATOR, FeeLedger, FeeSplit, FixedRouterStrategy, InstructionRelayStrategy,
    SettlementReport, StrategyKind, SwapContext, SwapExecutor, SwapOrchestrator,
};
pub use ledger::{AssetLedger, CheckpointId, LedgerError, LedgerResult};
pub use router::{AggregatorRouter, AmmRouter, RouterError, RouterResult};
