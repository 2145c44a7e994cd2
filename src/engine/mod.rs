//! The swap-splitting engine. One inbound payment in the base asset is split
//! across target assets by percentage, a protocol fee is forwarded, and each
//! slice is executed through the active strategy. A call either settles in
//! full or rolls back in full; the engine itself never retains value.

pub mod allocation;
mod error;
mod executor;
mod fee;
mod types;

pub use allocation::Allocation;
pub use error::{EngineError, EngineResult};
pub use executor::{
    ActiveStrategy, FixedRouterStrategy, InstructionRelayStrategy, StrategyKind, SwapContext,
    SwapExecutor,
};
pub use fee::{FEE_DENOMINATOR, FeeLedger, FeeSplit};
pub use types::{AccountId, AllocationResult, AssetId, CallPhase, SettlementReport};

use std::collections::BTreeSet;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::config::{ConfigSnapshot, ConfigStore};
use crate::ledger::AssetLedger;

/// The shape of one inbound request before planning.
enum SwapCall {
    Split {
        targets: Vec<AssetId>,
        percents: Vec<u8>,
        min_outs: Vec<u64>,
    },
    Relay {
        targets: Vec<AssetId>,
        payloads: Vec<Bytes>,
    },
}

/// Top-level entry point. Holds no per-request state; concurrent calls share
/// only the config store (read once per call) and the ledger.
pub struct SwapOrchestrator {
    engine_account: AccountId,
    base_asset: AssetId,
    config: Arc<ConfigStore>,
    ledger: Arc<dyn AssetLedger>,
}

impl SwapOrchestrator {
    pub fn new(
        engine_account: AccountId,
        base_asset: AssetId,
        config: Arc<ConfigStore>,
        ledger: Arc<dyn AssetLedger>,
    ) -> Self {
        Self {
            engine_account,
            base_asset,
            config,
            ledger,
        }
    }

    pub fn engine_account(&self) -> &AccountId {
        &self.engine_account
    }

    pub fn base_asset(&self) -> &AssetId {
        &self.base_asset
    }

    /// Convert the whole net amount into one target asset.
    pub async fn swap_to_single_target(
        &self,
        caller: &AccountId,
        gross: u64,
        min_out: u64,
        target: AssetId,
    ) -> EngineResult<SettlementReport> {
        self.settle(
            caller,
            gross,
            SwapCall::Split {
                targets: vec![target],
                percents: vec![100],
                min_outs: vec![min_out],
            },
        )
        .await
    }

    /// Split the net amount across `targets` by percentage. Percentages may
    /// sum to less than 100; whatever is not allocated is refunded.
    pub async fn swap_to_multiple_targets(
        &self,
        caller: &AccountId,
        gross: u64,
        targets: Vec<AssetId>,
        percents: Vec<u8>,
        min_outs: Vec<u64>,
    ) -> EngineResult<SettlementReport> {
        self.settle(
            caller,
            gross,
            SwapCall::Split {
                targets,
                percents,
                min_outs,
            },
        )
        .await
    }

    /// Instruction-relay entry point: one pre-built aggregator payload per
    /// target, the net value split evenly between them. Requires the
    /// instruction-relay strategy to be bound.
    pub async fn best_dex_swap(
        &self,
        caller: &AccountId,
        gross: u64,
        payloads: Vec<Bytes>,
        targets: Vec<AssetId>,
    ) -> EngineResult<SettlementReport> {
        self.settle(caller, gross, SwapCall::Relay { targets, payloads })
            .await
    }

    /// Run one call inside a ledger unit of work: commit on success, roll
    /// everything back on any error.
    async fn settle(
        &self,
        caller: &AccountId,
        gross: u64,
        call: SwapCall,
    ) -> EngineResult<SettlementReport> {
        if gross == 0 {
            return Err(EngineError::InvalidParameter(
                "gross amount must be positive".to_string(),
            ));
        }

        // One snapshot per call; rebinding mid-call cannot mix fee, recipient
        // or strategy behavior within this request.
        let config = self.config.snapshot();

        let checkpoint = self.ledger.checkpoint().await?;
        match self.run(caller, gross, &config, call).await {
            Ok(report) => {
                self.ledger.commit(checkpoint).await?;
                info!(
                    target: "engine::orchestrator",
                    caller = %caller,
                    phase = %CallPhase::Settled,
                    gross = report.gross,
                    fee = report.fee,
                    refund = report.refund,
                    fills = report.fills.len(),
                    "settlement committed"
                );
                Ok(report)
            }
            Err(err) => {
                if let Err(rollback_err) = self.ledger.rollback(checkpoint).await {
                    warn!(
                        target: "engine::orchestrator",
                        error = %rollback_err,
                        "rollback failed after aborted settlement"
                    );
                }
                warn!(
                    target: "engine::orchestrator",
                    caller = %caller,
                    gross,
                    error = %err,
                    "settlement aborted"
                );
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        caller: &AccountId,
        gross: u64,
        config: &ConfigSnapshot,
        call: SwapCall,
    ) -> EngineResult<SettlementReport> {
        let ledger = &*self.ledger;
        let engine = &self.engine_account;
        let base = &self.base_asset;

        // Record engine holdings of every asset this call can touch; the
        // retention backstop compares against these after settlement.
        let mut watched: BTreeSet<AssetId> = match &call {
            SwapCall::Split { targets, .. } | SwapCall::Relay { targets, .. } => {
                targets.iter().cloned().collect()
            }
        };
        watched.insert(base.clone());
        let mut held_before = Vec::with_capacity(watched.len());
        for asset in &watched {
            held_before.push((asset.clone(), ledger.balance_of(asset, engine).await?));
        }

        // Idle: pull the payment in.
        ledger.transfer(base, caller, engine, gross).await?;
        debug!(
            target: "engine::orchestrator",
            phase = %CallPhase::Idle,
            caller = %caller,
            gross,
            "payment received"
        );

        // FeeCharged
        let fees = FeeLedger::new(config.fee_rate, config.fee_recipient.clone());
        let split = fees.charge(ledger, base, engine, gross).await?;
        debug!(
            target: "engine::orchestrator",
            phase = %CallPhase::FeeCharged,
            fee = split.fee,
            net = split.net,
            "fee charged"
        );

        // Validated: arity and percentage checks, then the concrete plan.
        let allocations = match &call {
            SwapCall::Split {
                targets,
                percents,
                min_outs,
            } => allocation::plan_split(split.net, targets, percents, min_outs)?,
            SwapCall::Relay { targets, payloads } => {
                if config.strategy.kind() != StrategyKind::InstructionRelay {
                    return Err(EngineError::InvalidParameter(
                        "instruction relay strategy is not active".to_string(),
                    ));
                }
                allocation::plan_relay(split.net, targets, payloads)?
            }
        };
        debug!(
            target: "engine::orchestrator",
            phase = %CallPhase::Validated,
            allocations = allocations.len(),
            strategy = %config.strategy.kind(),
            "request validated"
        );

        // Swapping: strictly sequential, all-or-nothing.
        let executor = config.strategy.executor();
        debug!(
            target: "engine::orchestrator",
            phase = %CallPhase::Swapping,
            allocations = allocations.len(),
            "executing allocations"
        );
        let ctx = SwapContext {
            ledger,
            engine,
            caller,
            base,
        };
        let mut fills = Vec::with_capacity(allocations.len());
        let mut spent = 0u64;
        for alloc in &allocations {
            let amount_out = executor.execute(&ctx, alloc).await?;
            spent += alloc.amount_in;
            fills.push(AllocationResult {
                target: alloc.target.clone(),
                amount_in: alloc.amount_in,
                amount_out,
            });
        }

        // Un-allocated remainder plus rounding dust goes back to the caller.
        let refund = split.net - spent;
        if refund > 0 {
            ledger.transfer(base, engine, caller, refund).await?;
        }

        // Retention backstop: the engine must hold exactly what it held at
        // entry, for the base asset and every target.
        for (asset, before) in &held_before {
            let after = ledger.balance_of(asset, engine).await?;
            if after != *before {
                return Err(EngineError::Retention {
                    asset: asset.clone(),
                    delta: i128::from(after) - i128::from(*before),
                });
            }
        }

        Ok(SettlementReport {
            gross,
            fee: split.fee,
            net: split.net,
            refund,
            fills,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;

    use super::*;
    use crate::config::SingleOwner;
    use crate::ledger::{AssetLedger, InMemoryLedger};
    use crate::router::{AggregatorRouter, AmmRouter, RouterError, RouterResult};

    const ONE_ETH: u64 = 1_000_000_000;

    fn dai() -> AssetId {
        AssetId::token("DAI")
    }

    fn link() -> AssetId {
        AssetId::token("LINK")
    }

    fn uni() -> AssetId {
        AssetId::token("UNI")
    }

    /// AMM mock priced in whole target units per base unit. Pulls the input
    /// from the payer and mints the output straight to the recipient, exactly
    /// the delivery contract the engine relies on.
    struct MockAmm {
        address: AccountId,
        payer: AccountId,
        ledger: Arc<InMemoryLedger>,
        prices: HashMap<AssetId, u64>,
    }

    #[async_trait]
    impl AmmRouter for MockAmm {
        fn address(&self) -> &AccountId {
            &self.address
        }

        async fn swap_exact_input_for_min_output(
            &self,
            input: &AssetId,
            output: &AssetId,
            amount_in: u64,
            min_out: u64,
            recipient: &AccountId,
        ) -> RouterResult<u64> {
            let price = *self
                .prices
                .get(output)
                .ok_or_else(|| RouterError::Reverted(format!("no pool for {output}")))?;
            let amount_out = amount_in
                .checked_mul(price)
                .ok_or_else(|| RouterError::Reverted("amount overflow".to_string()))?;
            if amount_out < min_out {
                return Err(RouterError::InsufficientOutput {
                    got: amount_out,
                    min_out,
                });
            }

            if input.is_native() {
                self.ledger
                    .transfer(input, &self.payer, &self.address, amount_in)
                    .await
                    .map_err(|err| RouterError::Reverted(err.to_string()))?;
            } else {
                self.ledger
                    .spend_allowance(input, &self.payer, &self.address, &self.address, amount_in)
                    .map_err(|err| RouterError::Reverted(err.to_string()))?;
            }
            self.ledger.mint(output, recipient, amount_out);
            Ok(amount_out)
        }
    }

    /// Aggregator mock: the payload names the target symbol; output lands at
    /// a pre-configured recipient, the way real call data encodes one.
    struct MockAggregator {
        address: AccountId,
        payer: AccountId,
        recipient: AccountId,
        ledger: Arc<InMemoryLedger>,
        prices: HashMap<AssetId, u64>,
    }

    #[async_trait]
    impl AggregatorRouter for MockAggregator {
        fn address(&self) -> &AccountId {
            &self.address
        }

        async fn execute(&self, payload: &bytes::Bytes, value: u64) -> RouterResult<u64> {
            if payload.is_empty() {
                return Err(RouterError::NoOutput);
            }
            let symbol = std::str::from_utf8(payload)
                .map_err(|_| RouterError::Reverted("bad payload".to_string()))?;
            let target = AssetId::token(symbol);
            let price = *self
                .prices
                .get(&target)
                .ok_or_else(|| RouterError::Reverted(format!("no route for {target}")))?;

            self.ledger
                .transfer(&AssetId::Native, &self.payer, &self.address, value)
                .await
                .map_err(|err| RouterError::Reverted(err.to_string()))?;
            let amount_out = value * price;
            self.ledger.mint(&target, &self.recipient, amount_out);
            Ok(amount_out)
        }
    }

    /// AMM mock that raises the fee and rebinds the strategy while a call is
    /// in flight. The running call must keep the snapshot it started with.
    struct ReconfiguringAmm {
        inner: MockAmm,
        config: Arc<ConfigStore>,
        owner: AccountId,
        relay: Arc<dyn AggregatorRouter>,
    }

    #[async_trait]
    impl AmmRouter for ReconfiguringAmm {
        fn address(&self) -> &AccountId {
            self.inner.address()
        }

        async fn swap_exact_input_for_min_output(
            &self,
            input: &AssetId,
            output: &AssetId,
            amount_in: u64,
            min_out: u64,
            recipient: &AccountId,
        ) -> RouterResult<u64> {
            self.config
                .set_fee(&self.owner, 500)
                .map_err(|err| RouterError::Reverted(err.to_string()))?;
            self.config
                .bind_strategy(
                    &self.owner,
                    ActiveStrategy::InstructionRelay(Arc::clone(&self.relay)),
                )
                .map_err(|err| RouterError::Reverted(err.to_string()))?;
            self.inner
                .swap_exact_input_for_min_output(input, output, amount_in, min_out, recipient)
                .await
        }
    }

    struct Harness {
        ledger: Arc<InMemoryLedger>,
        config: Arc<ConfigStore>,
        orchestrator: SwapOrchestrator,
        owner: AccountId,
        user: AccountId,
        treasury: AccountId,
        engine: AccountId,
    }

    fn prices() -> HashMap<AssetId, u64> {
        HashMap::from([(dai(), 2400), (link(), 150), (uni(), 200)])
    }

    fn harness(fee_rate: u16) -> Harness {
        harness_with_base(fee_rate, AssetId::Native)
    }

    fn harness_with_base(fee_rate: u16, base: AssetId) -> Harness {
        let ledger = Arc::new(InMemoryLedger::new());
        let owner = AccountId::from("owner");
        let user = AccountId::from("user");
        let treasury = AccountId::from("treasury");
        let engine = AccountId::from("prism");

        let router: Arc<dyn AmmRouter> = Arc::new(MockAmm {
            address: AccountId::from("amm-router"),
            payer: engine.clone(),
            ledger: Arc::clone(&ledger),
            prices: prices(),
        });
        let config = Arc::new(
            ConfigStore::new(
                Arc::new(SingleOwner::new(owner.clone())),
                fee_rate,
                treasury.clone(),
                ActiveStrategy::FixedRouter(router),
            )
            .unwrap(),
        );
        let orchestrator = SwapOrchestrator::new(
            engine.clone(),
            base.clone(),
            Arc::clone(&config),
            Arc::clone(&ledger) as Arc<dyn AssetLedger>,
        );
        ledger.mint(&base, &user, 100 * ONE_ETH);

        Harness {
            ledger,
            config,
            orchestrator,
            owner,
            user,
            treasury,
            engine,
        }
    }

    fn bind_aggregator(h: &Harness) -> AccountId {
        let address = AccountId::from("aggregator");
        let aggregator: Arc<dyn AggregatorRouter> = Arc::new(MockAggregator {
            address: address.clone(),
            payer: h.engine.clone(),
            recipient: h.user.clone(),
            ledger: Arc::clone(&h.ledger),
            prices: prices(),
        });
        h.config
            .bind_strategy(&h.owner, ActiveStrategy::InstructionRelay(aggregator))
            .unwrap();
        address
    }

    fn assert_engine_is_empty(h: &Harness) {
        for asset in [AssetId::Native, dai(), link(), uni()] {
            assert_eq!(
                h.ledger.balance(&asset, &h.engine),
                0,
                "engine retained {asset}"
            );
        }
    }

    #[tokio::test]
    async fn zero_rate_skips_fee_and_swaps_full_amount() {
        let h = harness(0);

        let report = h
            .orchestrator
            .swap_to_single_target(&h.user, ONE_ETH, 2_300 * ONE_ETH, dai())
            .await
            .unwrap();

        assert_eq!(report.fee, 0);
        assert_eq!(report.net, ONE_ETH);
        assert_eq!(report.refund, 0);
        assert_eq!(h.ledger.balance(&AssetId::Native, &h.treasury), 0);
        assert_eq!(h.ledger.balance(&dai(), &h.user), 2400 * ONE_ETH);
        assert_engine_is_empty(&h);
    }

    #[tokio::test]
    async fn recipient_receives_exact_fee() {
        let h = harness(50);

        let report = h
            .orchestrator
            .swap_to_single_target(&h.user, ONE_ETH, 0, dai())
            .await
            .unwrap();

        // 50/1000 of 1 ETH
        assert_eq!(report.fee, 50_000_000);
        assert_eq!(h.ledger.balance(&AssetId::Native, &h.treasury), 50_000_000);
        // remaining 0.95 ETH swapped at 2400
        assert_eq!(report.fills[0].amount_in, 950_000_000);
        assert_eq!(h.ledger.balance(&dai(), &h.user), 950_000_000 * 2400);
        assert_engine_is_empty(&h);
    }

    #[tokio::test]
    async fn splits_across_three_targets_by_percentage() {
        let h = harness(1);
        let gross = 10 * ONE_ETH;

        let report = h
            .orchestrator
            .swap_to_multiple_targets(
                &h.user,
                gross,
                vec![dai(), link(), uni()],
                vec![20, 50, 30],
                vec![0, 0, 0],
            )
            .await
            .unwrap();

        let fee = gross / 1000; // 0.01 ETH
        let net = gross - fee;
        assert_eq!(report.fee, fee);
        assert_eq!(h.ledger.balance(&AssetId::Native, &h.treasury), fee);

        let expected = [net * 20 / 100, net * 50 / 100, net * 30 / 100];
        for (fill, expected_in) in report.fills.iter().zip(expected) {
            assert_eq!(fill.amount_in, expected_in);
        }
        assert_eq!(report.refund, net - expected.iter().sum::<u64>());
        assert_eq!(report.total_swapped(), expected.iter().sum::<u64>());
        assert_eq!(h.ledger.balance(&dai(), &h.user), expected[0] * 2400);
        assert_eq!(h.ledger.balance(&link(), &h.user), expected[1] * 150);
        assert_eq!(h.ledger.balance(&uni(), &h.user), expected[2] * 200);
        assert_engine_is_empty(&h);
    }

    #[tokio::test]
    async fn percent_overflow_rolls_back_everything() {
        let h = harness(1);
        let user_before = h.ledger.balance(&AssetId::Native, &h.user);

        let err = h
            .orchestrator
            .swap_to_multiple_targets(
                &h.user,
                10 * ONE_ETH,
                vec![link(), dai()],
                vec![50, 70],
                vec![0, 0],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::AllocationOverflow { sum: 120 }));
        assert_eq!(h.ledger.balance(&AssetId::Native, &h.user), user_before);
        assert_eq!(h.ledger.balance(&AssetId::Native, &h.treasury), 0);
        assert_engine_is_empty(&h);
    }

    #[tokio::test]
    async fn arity_mismatch_rolls_back_everything() {
        let h = harness(1);
        let user_before = h.ledger.balance(&AssetId::Native, &h.user);

        let err = h
            .orchestrator
            .swap_to_multiple_targets(
                &h.user,
                10 * ONE_ETH,
                vec![link(), dai()],
                vec![20, 40, 40],
                vec![0],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::ArityMismatch { .. }));
        assert_eq!(h.ledger.balance(&AssetId::Native, &h.user), user_before);
        assert_eq!(h.ledger.balance(&AssetId::Native, &h.treasury), 0);
    }

    #[tokio::test]
    async fn one_failing_swap_aborts_the_whole_batch() {
        let h = harness(50);
        let user_before = h.ledger.balance(&AssetId::Native, &h.user);

        // LINK pays 150 per unit; demand more than it can deliver.
        let err = h
            .orchestrator
            .swap_to_multiple_targets(
                &h.user,
                10 * ONE_ETH,
                vec![dai(), link(), uni()],
                vec![20, 50, 30],
                vec![0, u64::MAX, 0],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::SwapExecution { .. }));
        // fee included in the rollback
        assert_eq!(h.ledger.balance(&AssetId::Native, &h.treasury), 0);
        assert_eq!(h.ledger.balance(&AssetId::Native, &h.user), user_before);
        assert_eq!(h.ledger.balance(&dai(), &h.user), 0);
        assert_eq!(h.ledger.balance(&uni(), &h.user), 0);
        assert_engine_is_empty(&h);
    }

    #[tokio::test]
    async fn rejecting_fee_recipient_aborts_the_call() {
        let h = harness(50);
        h.ledger.reject_incoming(&h.treasury);
        let user_before = h.ledger.balance(&AssetId::Native, &h.user);

        let err = h
            .orchestrator
            .swap_to_single_target(&h.user, ONE_ETH, 0, dai())
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::FeeForwarding(_)));
        assert_eq!(h.ledger.balance(&AssetId::Native, &h.user), user_before);
        assert_engine_is_empty(&h);
    }

    #[tokio::test]
    async fn zero_gross_is_rejected_before_any_transfer() {
        let h = harness(1);

        let err = h
            .orchestrator
            .swap_to_single_target(&h.user, 0, 0, dai())
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::InvalidParameter(_)));
    }

    #[tokio::test]
    async fn rounding_dust_is_refunded_to_caller() {
        let h = harness(0);
        let gross = ONE_ETH + 1; // net not divisible by 100
        let user_before = h.ledger.balance(&AssetId::Native, &h.user);

        let report = h
            .orchestrator
            .swap_to_multiple_targets(
                &h.user,
                gross,
                vec![dai(), link(), uni()],
                vec![33, 33, 33],
                vec![0, 0, 0],
            )
            .await
            .unwrap();

        let slice = (u128::from(gross) * 33 / 100) as u64;
        assert_eq!(report.refund, gross - 3 * slice);
        assert!(report.refund > 0);
        assert_eq!(
            h.ledger.balance(&AssetId::Native, &h.user),
            user_before - gross + report.refund
        );
        assert_engine_is_empty(&h);
    }

    #[tokio::test]
    async fn under_allocated_percentages_refund_the_rest() {
        let h = harness(0);

        let report = h
            .orchestrator
            .swap_to_multiple_targets(&h.user, ONE_ETH, vec![dai()], vec![40], vec![0])
            .await
            .unwrap();

        assert_eq!(report.fills[0].amount_in, ONE_ETH * 40 / 100);
        assert_eq!(report.refund, ONE_ETH - ONE_ETH * 40 / 100);
        assert_engine_is_empty(&h);
    }

    #[tokio::test]
    async fn token_base_asset_uses_the_approval_path() {
        let usdc = AssetId::token("USDC");
        let h = harness_with_base(0, usdc.clone());

        let report = h
            .orchestrator
            .swap_to_single_target(&h.user, ONE_ETH, 0, dai())
            .await
            .unwrap();

        assert_eq!(report.fills[0].amount_out, ONE_ETH * 2400);
        assert_eq!(h.ledger.balance(&dai(), &h.user), ONE_ETH * 2400);
        assert_engine_is_empty(&h);
        assert_eq!(h.ledger.balance(&usdc, &h.engine), 0);
    }

    #[tokio::test]
    async fn relay_entry_requires_relay_strategy() {
        let h = harness(1);
        let user_before = h.ledger.balance(&AssetId::Native, &h.user);

        let err = h
            .orchestrator
            .best_dex_swap(
                &h.user,
                ONE_ETH,
                vec![bytes::Bytes::from_static(b"DAI")],
                vec![dai()],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::InvalidParameter(_)));
        assert_eq!(h.ledger.balance(&AssetId::Native, &h.user), user_before);
    }

    #[tokio::test]
    async fn relay_executes_one_payload_per_target() {
        let h = harness(50);
        bind_aggregator(&h);
        let gross = 2 * ONE_ETH;

        let report = h
            .orchestrator
            .best_dex_swap(
                &h.user,
                gross,
                vec![
                    bytes::Bytes::from_static(b"DAI"),
                    bytes::Bytes::from_static(b"LINK"),
                ],
                vec![dai(), link()],
            )
            .await
            .unwrap();

        let net = gross - gross * 50 / 1000;
        let slice = net / 2;
        assert_eq!(report.fills[0].amount_in, slice);
        assert_eq!(report.fills[1].amount_in, slice);
        assert_eq!(report.refund, net - 2 * slice);
        assert_eq!(h.ledger.balance(&dai(), &h.user), slice * 2400);
        assert_eq!(h.ledger.balance(&link(), &h.user), slice * 150);
        assert_engine_is_empty(&h);
    }

    #[tokio::test]
    async fn relay_payload_failure_rolls_back_the_batch() {
        let h = harness(50);
        bind_aggregator(&h);
        let user_before = h.ledger.balance(&AssetId::Native, &h.user);

        // empty payload makes the aggregator revert with no output
        let err = h
            .orchestrator
            .best_dex_swap(
                &h.user,
                2 * ONE_ETH,
                vec![bytes::Bytes::from_static(b"DAI"), bytes::Bytes::new()],
                vec![dai(), link()],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::SwapExecution { .. }));
        assert_eq!(h.ledger.balance(&AssetId::Native, &h.user), user_before);
        assert_eq!(h.ledger.balance(&dai(), &h.user), 0);
        assert_eq!(h.ledger.balance(&AssetId::Native, &h.treasury), 0);
        assert_engine_is_empty(&h);
    }

    #[tokio::test]
    async fn split_entry_under_relay_strategy_fails_for_missing_payloads() {
        let h = harness(1);
        bind_aggregator(&h);
        let user_before = h.ledger.balance(&AssetId::Native, &h.user);

        let err = h
            .orchestrator
            .swap_to_single_target(&h.user, ONE_ETH, 0, dai())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            EngineError::SwapExecution { ref reason, .. } if reason.contains("missing instruction payload")
        ));
        assert_eq!(h.ledger.balance(&AssetId::Native, &h.user), user_before);
    }

    #[tokio::test]
    async fn strategy_downgrade_restores_fixed_router_path() {
        let h = harness(0);
        bind_aggregator(&h);

        // back to the AMM router
        let router: Arc<dyn AmmRouter> = Arc::new(MockAmm {
            address: AccountId::from("amm-router"),
            payer: h.engine.clone(),
            ledger: Arc::clone(&h.ledger),
            prices: prices(),
        });
        h.config
            .bind_strategy(&h.owner, ActiveStrategy::FixedRouter(router))
            .unwrap();

        let report = h
            .orchestrator
            .swap_to_single_target(&h.user, ONE_ETH, 0, dai())
            .await
            .unwrap();
        assert_eq!(report.fills[0].amount_out, ONE_ETH * 2400);
    }

    #[tokio::test]
    async fn mid_call_reconfiguration_does_not_affect_the_running_call() {
        let h = harness(50);

        let relay: Arc<dyn AggregatorRouter> = Arc::new(MockAggregator {
            address: AccountId::from("aggregator"),
            payer: h.engine.clone(),
            recipient: h.user.clone(),
            ledger: Arc::clone(&h.ledger),
            prices: prices(),
        });
        let rebinding: Arc<dyn AmmRouter> = Arc::new(ReconfiguringAmm {
            inner: MockAmm {
                address: AccountId::from("amm-router-v2"),
                payer: h.engine.clone(),
                ledger: Arc::clone(&h.ledger),
                prices: prices(),
            },
            config: Arc::clone(&h.config),
            owner: h.owner.clone(),
            relay,
        });
        h.config
            .bind_strategy(&h.owner, ActiveStrategy::FixedRouter(rebinding))
            .unwrap();

        let gross = 10 * ONE_ETH;
        let report = h
            .orchestrator
            .swap_to_multiple_targets(
                &h.user,
                gross,
                vec![dai(), link()],
                vec![50, 50],
                vec![0, 0],
            )
            .await
            .unwrap();

        // the first fill raised the fee and rebound the strategy; this call
        // still charged its entry rate and routed the second fill through the
        // same AMM
        let net = gross - gross * 50 / 1000;
        assert_eq!(report.fee, gross * 50 / 1000);
        assert_eq!(report.fills.len(), 2);
        assert_eq!(h.ledger.balance(&dai(), &h.user), net / 2 * 2400);
        assert_eq!(h.ledger.balance(&link(), &h.user), net / 2 * 150);
        assert_eq!(h.ledger.balance(&AssetId::Native, &h.treasury), report.fee);
        assert_engine_is_empty(&h);

        // later calls see the new configuration
        assert_eq!(h.config.fee_rate(), 500);
        assert_eq!(h.config.strategy_kind(), StrategyKind::InstructionRelay);
    }

    #[tokio::test]
    async fn empty_allocation_list_refunds_the_full_net() {
        let h = harness(50);

        let report = h
            .orchestrator
            .swap_to_multiple_targets(&h.user, ONE_ETH, vec![], vec![], vec![])
            .await
            .unwrap();

        assert!(report.fills.is_empty());
        assert_eq!(report.refund, report.net);
        assert_eq!(
            h.ledger.balance(&AssetId::Native, &h.treasury),
            ONE_ETH * 50 / 1000
        );
        assert_engine_is_empty(&h);
    }
}
