pub mod loader;
pub mod store;
pub mod types;

pub use loader::{ConfigError, DEFAULT_CONFIG_PATHS, load_config};
pub use store::{ConfigSnapshot, ConfigStore, OwnerPolicy, SingleOwner};
pub use types::{EngineFileConfig, FileConfig};

pub(crate) fn default_fee_rate() -> u16 {
    1
}
