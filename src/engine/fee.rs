use tracing::debug;

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::types::{AccountId, AssetId};
use crate::ledger::AssetLedger;

/// Fee rates are expressed per mille.
pub const FEE_DENOMINATOR: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeSplit {
    pub fee: u64,
    pub net: u64,
}

/// Computes the protocol fee and forwards it to the recipient. Holds the
/// values captured in the call's config snapshot; a config change mid-call
/// cannot reach it.
#[derive(Debug, Clone)]
pub struct FeeLedger {
    rate: u16,
    recipient: AccountId,
}

impl FeeLedger {
    pub fn new(rate: u16, recipient: AccountId) -> Self {
        Self { rate, recipient }
    }

    /// `fee = floor(gross * rate / 1000)`. The u128 intermediate cannot
    /// overflow for any u64 gross.
    pub fn compute(&self, gross: u64) -> FeeSplit {
        let fee = (u128::from(gross) * u128::from(self.rate) / u128::from(FEE_DENOMINATOR)) as u64;
        FeeSplit {
            fee,
            net: gross - fee,
        }
    }

    /// Compute the split and forward the fee out of the engine account. A
    /// zero rate skips the transfer entirely; a transfer the recipient does
    /// not accept aborts the whole call.
    pub async fn charge(
        &self,
        ledger: &dyn AssetLedger,
        base: &AssetId,
        engine: &AccountId,
        gross: u64,
    ) -> EngineResult<FeeSplit> {
        let split = self.compute(gross);
        if split.fee > 0 {
            ledger
                .transfer(base, engine, &self.recipient, split.fee)
                .await
                .map_err(|err| EngineError::FeeForwarding(err.to_string()))?;
            debug!(
                target: "engine::fee",
                recipient = %self.recipient,
                fee = split.fee,
                net = split.net,
                "fee forwarded"
            );
        }
        Ok(split)
    }
}
