use serde::Deserialize;

use crate::engine::AccountId;

/// Bootstrap configuration loaded from `prism.toml`. Only seeds the initial
/// [`ConfigStore`](crate::config::ConfigStore) values; runtime mutation goes
/// through the owner-gated store.
#[derive(Debug, Clone, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub engine: EngineFileConfig,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            engine: EngineFileConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineFileConfig {
    /// Protocol fee in per mille.
    #[serde(default = "super::default_fee_rate")]
    pub fee_rate: u16,
    #[serde(default)]
    pub fee_recipient: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
}

impl Default for EngineFileConfig {
    fn default() -> Self {
        Self {
            fee_rate: super::default_fee_rate(),
            fee_recipient: None,
            owner: None,
        }
    }
}

impl EngineFileConfig {
    pub fn fee_recipient(&self) -> Option<AccountId> {
        self.fee_recipient.as_deref().map(AccountId::from)
    }

    pub fn owner(&self) -> Option<AccountId> {
        self.owner.as_deref().map(AccountId::from)
    }
}
