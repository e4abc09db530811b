//! Structured logging setup

use tracing_subscriber::EnvFilter;

use crate::config::GlobalConfig;

const DEBUG_DIRECTIVES: &str = "droidcap=debug,droidcap_media=debug,droidcap_core=debug";

/// Install a `fmt` subscriber filtered by `RUST_LOG`, defaulting to `info`.
///
/// Returns false when a global subscriber was already installed; calling it
/// again is harmless.
pub fn init_logging() -> bool {
    init_logging_with(&GlobalConfig::default())
}

/// Like [`init_logging`], defaulting to debug output for the droidcap crates
/// when `config.debug_logging` is set
pub fn init_logging_with(config: &GlobalConfig) -> bool {
    let fallback = if config.debug_logging {
        DEBUG_DIRECTIVES
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
