//! Config loader facade: assembles sources in precedence order.

use crate::config::merge::merge_policy;
use crate::config::sources::{global_file, workspace_file};
use crate::config::EngineConfig;
use crate::error::ReconcileError;
use config::File;
use std::path::Path;

/// Loads [`EngineConfig`] from layered sources
pub struct ConfigLoader;

impl ConfigLoader {
    /// Defaults, global file, workspace files, then environment
    pub fn load(workspace_root: &Path) -> Result<EngineConfig, ReconcileError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let settings = builder.add_source(merge_policy::environment()).build()?;
        let config: EngineConfig = settings.try_deserialize()?;
        config.validated()
    }

    /// Defaults plus one explicit file; other sources are skipped
    pub fn load_from_file(path: &Path) -> Result<EngineConfig, ReconcileError> {
        if !path.exists() {
            return Err(ReconcileError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        let settings = merge_policy::builder_with_defaults()?
            .add_source(File::from(path))
            .build()?;
        let config: EngineConfig = settings.try_deserialize()?;
        config.validated()
    }

    /// Built-in defaults only
    pub fn default() -> EngineConfig {
        EngineConfig::default()
    }
}
