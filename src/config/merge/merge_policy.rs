//! Merge rules: defaults, override order, conflict handling.

use crate::declaration::DEFAULT_SIGIL;
use config::Config;
use config::ConfigBuilder;
use config::ConfigError;
use config::Environment;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("engine.layer_sigil", DEFAULT_SIGIL)?
        .set_default("engine.path_separator", "/")?
        .set_default("logging.level", "info")?
        .set_default("logging.format", "text")?
        .set_default("logging.output", "stderr")
}

/// Environment source, applied last: `EAPPLY__LOGGING__LEVEL=debug` sets `logging.level`.
pub fn environment() -> Environment {
    Environment::with_prefix("EAPPLY")
        .prefix_separator("__")
        .separator("__")
}
