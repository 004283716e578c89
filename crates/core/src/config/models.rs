//! Configuration models that aggregate all settings.
//!
//! This module provides the unified `AppConfig` structure that combines the
//! supervisor roles and the build pipeline into a single configuration
//! object.

use lk_protocol::build_models::BuildPipelineConfig;
use lk_protocol::config_models::SupervisorConfig;

/// Unified application configuration loaded from `.lifecycle/` directory.
///
/// This structure aggregates all configuration sources:
/// - `config.toml`: Supervisor settings and role definitions
/// - `build.yaml`: Build pipeline definition
///
/// # Example
///
/// ```rust,no_run
/// use lk_core::config::loader::load_config;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new(".")).await?;
/// println!("Loaded {} roles and {} build steps",
///          config.supervisor.roles.len(),
///          config.build.steps.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppConfig {
    /// Supervisor settings and roles from `config.toml`.
    pub supervisor: SupervisorConfig,

    /// Build pipeline from `build.yaml`.
    pub build: BuildPipelineConfig,
}

impl AppConfig {
    /// Set the preferred port of every role whose `port.env` is `variable`.
    ///
    /// Returns how many roles were updated.
    pub fn override_port(&mut self, variable: &str, preferred: u16) -> usize {
        let mut updated = 0;
        for role in &mut self.supervisor.roles {
            if let Some(port) = role.port.as_mut() {
                if port.env.as_deref() == Some(variable) {
                    port.preferred = preferred;
                    updated += 1;
                }
            }
        }
        updated
    }
}
