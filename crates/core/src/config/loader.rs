//! Configuration file loader for `.lifecycle/` directory structure.
//!
//! This module provides functionality to load and parse all configuration files
//! from the `.lifecycle/` directory, including:
//! - `config.toml`: Supervisor settings and role definitions
//! - `build.yaml`: Build pipeline definition

use crate::config::error::ConfigError;
use crate::config::error::ConfigResult;
use crate::config::models::AppConfig;
use lk_protocol::build_models::BuildPipelineConfig;
use lk_protocol::config_models::SupervisorConfig;
use std::collections::HashSet;
use std::path::Path;

/// Name of the project configuration directory.
pub const CONFIG_DIR: &str = ".lifecycle";

/// Loads all configuration from the `.lifecycle/` directory.
///
/// # Arguments
///
/// * `root` - Root directory containing the `.lifecycle/` folder
///
/// # Returns
///
/// An `AppConfig` containing all loaded configuration. If the directory or
/// individual files are missing, the corresponding defaults are used rather
/// than returning an error.
///
/// # Errors
///
/// Returns `ConfigError` if:
/// - Files exist but cannot be read
/// - Files have invalid TOML or YAML syntax
/// - Role or step names are duplicated, or a role's health check has no port
///
/// # Example
///
/// ```rust,no_run
/// use lk_core::config::loader::load_config;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new(".")).await?;
/// println!("Loaded {} roles", config.supervisor.roles.len());
/// # Ok(())
/// # }
/// ```
pub async fn load_config(root: &Path) -> ConfigResult<AppConfig> {
    let lk_dir = root.join(CONFIG_DIR);

    // If .lifecycle doesn't exist, return default config
    if !lk_dir.exists() {
        return Ok(AppConfig::default());
    }

    let supervisor = load_supervisor_config(&lk_dir).await?;
    let build = load_build_config(&lk_dir).await?;

    Ok(AppConfig { supervisor, build })
}

/// Loads supervisor settings and roles from `config.toml`.
async fn load_supervisor_config(lk_dir: &Path) -> ConfigResult<SupervisorConfig> {
    let config_path = lk_dir.join("config.toml");

    // If config.toml doesn't exist, return default
    if !config_path.exists() {
        return Ok(SupervisorConfig::default());
    }

    let content = tokio::fs::read_to_string(&config_path)
        .await
        .map_err(|source| ConfigError::FileRead {
            path: config_path.clone(),
            source,
        })?;

    let config: SupervisorConfig =
        toml::from_str(&content).map_err(|source| ConfigError::TomlParse {
            path: config_path.clone(),
            source,
        })?;

    validate_roles(&config, &config_path)?;
    Ok(config)
}

/// Loads the build pipeline from `build.yaml` (or `build.yml`).
async fn load_build_config(lk_dir: &Path) -> ConfigResult<BuildPipelineConfig> {
    let Some(build_path) = ["build.yaml", "build.yml"]
        .iter()
        .map(|name| lk_dir.join(name))
        .find(|path| path.exists())
    else {
        return Ok(BuildPipelineConfig::default());
    };

    let content = tokio::fs::read_to_string(&build_path)
        .await
        .map_err(|source| ConfigError::FileRead {
            path: build_path.clone(),
            source,
        })?;

    // An empty file is an empty pipeline, not a parse error.
    if content.trim().is_empty() {
        return Ok(BuildPipelineConfig::default());
    }

    let build: BuildPipelineConfig =
        serde_yaml::from_str(&content).map_err(|source| ConfigError::YamlParse {
            path: build_path.clone(),
            source,
        })?;

    let mut seen = HashSet::new();
    for step in &build.steps {
        if !seen.insert(step.name.as_str()) {
            return Err(ConfigError::InvalidConfig {
                path: build_path,
                reason: format!("duplicate build step '{}'", step.name),
            });
        }
    }

    Ok(build)
}

fn validate_roles(config: &SupervisorConfig, path: &Path) -> ConfigResult<()> {
    let invalid = |reason: String| ConfigError::InvalidConfig {
        path: path.to_path_buf(),
        reason,
    };

    let mut seen = HashSet::new();
    for role in &config.roles {
        if role.name.is_empty()
            || !role
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(invalid(format!(
                "role name '{}' may only contain letters, digits, '-' and '_'",
                role.name
            )));
        }
        if !seen.insert(role.name.as_str()) {
            return Err(invalid(format!("duplicate role '{}'", role.name)));
        }
        if let Some(health) = &role.health {
            if health.port.is_none() && role.port.is_none() {
                return Err(invalid(format!(
                    "role '{}' has a health check but neither health.port nor a [roles.port] section",
                    role.name
                )));
            }
        }
        if role.is_attach_only() && role.health.is_none() {
            return Err(invalid(format!(
                "role '{}' has no command, so it needs a health check to attach to",
                role.name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lk_protocol::build_models::BuildPhase;
    use lk_protocol::config_models::Mode;
    use std::fs;
    use tempfile::tempdir;

    /// A complete `.lifecycle/` structure loads every file.
    #[tokio::test]
    async fn test_load_config_acceptance() {
        let dir = tempdir().expect("Failed to create temp dir");
        let root = dir.path();
        let lk_dir = root.join(CONFIG_DIR);
        fs::create_dir_all(&lk_dir).expect("Failed to create .lifecycle");

        let config_toml = r#"
[supervisor]
grace-period-ms = 3000

[[roles]]
name = "backend"
command = "python3"
args = ["app.py"]
env = { PYTHONUNBUFFERED = "1" }

[roles.port]
preferred = 5000

[roles.health]
path = "/api/health"

[[roles]]
name = "shell"
command = "electron"
args = ["."]
primary = true
"#;
        fs::write(lk_dir.join("config.toml"), config_toml).expect("Failed to write config.toml");

        let build_yaml = r#"
steps:
  - name: build-frontend
    phase: compile
    group: frontend
    command: npm
    args: ["run", "build"]
    env:
      ELECTRON: "true"
artifacts:
  - dist/index.html
"#;
        fs::write(lk_dir.join("build.yaml"), build_yaml).expect("Failed to write build.yaml");

        let config = load_config(root).await.expect("Failed to load config");

        assert_eq!(config.supervisor.supervisor.grace_period_ms, 3000);
        assert_eq!(config.supervisor.roles.len(), 2);
        let backend = &config.supervisor.roles[0];
        assert_eq!(backend.env.get("PYTHONUNBUFFERED").map(String::as_str), Some("1"));
        assert_eq!(
            backend.health.as_ref().map(|h| h.path.as_str()),
            Some("/api/health")
        );
        assert!(config.supervisor.roles[1].primary);

        assert_eq!(config.build.steps.len(), 1);
        assert_eq!(config.build.steps[0].phase, BuildPhase::Compile);
        assert_eq!(config.build.artifacts.len(), 1);
    }

    /// No `.lifecycle` directory yields defaults, not an error.
    #[tokio::test]
    async fn test_load_config_empty_directory() {
        let dir = tempdir().expect("Failed to create temp dir");

        let config = load_config(dir.path())
            .await
            .expect("Should handle missing .lifecycle");

        assert_eq!(config, AppConfig::default());
        assert!(config.supervisor.roles_for(Mode::Production).is_empty());
    }

    /// Only `build.yaml` exists.
    #[tokio::test]
    async fn test_load_config_partial() {
        let dir = tempdir().expect("Failed to create temp dir");
        let lk_dir = dir.path().join(CONFIG_DIR);
        fs::create_dir_all(&lk_dir).expect("Failed to create .lifecycle");
        fs::write(lk_dir.join("build.yml"), "artifacts: [out.bin]\n").expect("write build.yml");

        let config = load_config(dir.path()).await.expect("Failed to load config");
        assert!(config.supervisor.roles.is_empty());
        assert_eq!(config.build.artifacts.len(), 1);
    }

    #[tokio::test]
    async fn test_load_config_invalid_toml() {
        let dir = tempdir().expect("Failed to create temp dir");
        let lk_dir = dir.path().join(CONFIG_DIR);
        fs::create_dir_all(&lk_dir).expect("Failed to create .lifecycle");
        fs::write(lk_dir.join("config.toml"), "roles = [invalid toml").expect("write");

        match load_config(dir.path()).await {
            Err(ConfigError::TomlParse { path, .. }) => assert!(path.ends_with("config.toml")),
            other => panic!("Expected TomlParse error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_load_config_invalid_yaml() {
        let dir = tempdir().expect("Failed to create temp dir");
        let lk_dir = dir.path().join(CONFIG_DIR);
        fs::create_dir_all(&lk_dir).expect("Failed to create .lifecycle");
        fs::write(lk_dir.join("build.yaml"), "steps:\n  - name: x\n    phase: [yaml").expect("write");

        match load_config(dir.path()).await {
            Err(ConfigError::YamlParse { path, .. }) => assert!(path.ends_with("build.yaml")),
            other => panic!("Expected YamlParse error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_duplicate_roles_are_rejected() {
        let dir = tempdir().expect("Failed to create temp dir");
        let lk_dir = dir.path().join(CONFIG_DIR);
        fs::create_dir_all(&lk_dir).expect("Failed to create .lifecycle");
        let toml = r#"
[[roles]]
name = "backend"
command = "a"

[[roles]]
name = "backend"
command = "b"
"#;
        fs::write(lk_dir.join("config.toml"), toml).expect("write");

        match load_config(dir.path()).await {
            Err(ConfigError::InvalidConfig { reason, .. }) => {
                assert!(reason.contains("duplicate role 'backend'"), "{reason}")
            }
            other => panic!("Expected InvalidConfig, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_health_without_port_is_rejected() {
        let dir = tempdir().expect("Failed to create temp dir");
        let lk_dir = dir.path().join(CONFIG_DIR);
        fs::create_dir_all(&lk_dir).expect("Failed to create .lifecycle");
        let toml = r#"
[[roles]]
name = "backend"

[roles.health]
path = "/api/health"
"#;
        fs::write(lk_dir.join("config.toml"), toml).expect("write");

        assert!(matches!(
            load_config(dir.path()).await,
            Err(ConfigError::InvalidConfig { .. })
        ));
    }

    #[tokio::test]
    async fn test_duplicate_build_steps_are_rejected() {
        let dir = tempdir().expect("Failed to create temp dir");
        let lk_dir = dir.path().join(CONFIG_DIR);
        fs::create_dir_all(&lk_dir).expect("Failed to create .lifecycle");
        let yaml = "steps:\n  - {name: a, phase: install, command: x}\n  - {name: a, phase: compile, command: y}\n";
        fs::write(lk_dir.join("build.yaml"), yaml).expect("write");

        assert!(matches!(
            load_config(dir.path()).await,
            Err(ConfigError::InvalidConfig { .. })
        ));
    }
}
