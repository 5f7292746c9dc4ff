//! Manager settings
//!
//! Settings are resolved once at startup with priority:
//! 1. Environment variables (`CMGR_*`)
//! 2. The TOML config file
//! 3. Defaults

mod load;
mod types;

pub use load::{load_config, ConfigError};
pub use types::{CollectorSettings, Config};
