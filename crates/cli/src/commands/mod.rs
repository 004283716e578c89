//! Subcommand implementations.

pub mod build;
pub mod check;
pub mod up;

use color_eyre::eyre::{Result, WrapErr};
use lk_core::config::{load_config, AppConfig};
use std::path::Path;

/// Load `.lifecycle/` under `project`, naming the directory on failure.
pub(crate) async fn load(project: &Path) -> Result<AppConfig> {
    load_config(project)
        .await
        .wrap_err_with(|| format!("cannot load configuration from {}", project.display()))
}
