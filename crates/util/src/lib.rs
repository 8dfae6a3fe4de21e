//! Ambient helpers shared by Tether binaries: file configuration, tracing
//! setup and path handling.

pub mod config;
pub mod logging;
mod path_processing;

pub use config::{CONFIG_FILE_NAME, CONFIG_PATH_ENV, ConfigError, TetherConfig, default_config_path};
pub use logging::{DEFAULT_LOG_FILTER, init_tracing};
pub use path_processing::expand_tilde;
