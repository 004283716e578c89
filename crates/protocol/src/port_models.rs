//! Port negotiation models.

use serde::{Deserialize, Serialize};

/// Port request for a role, as written in `config.toml`.
///
/// # Example
///
/// ```toml
/// [roles.port]
/// preferred = 3000
/// env = "LK_DEV_PORT"
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct PortConfig {
    /// Port to try first.
    pub preferred: u16,

    /// Host to bind the probe socket on.
    #[serde(default = "default_host")]
    pub host: String,

    /// Environment variable that may override `preferred`.
    #[serde(default)]
    pub env: Option<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

/// A port that was free when it was checked.
///
/// Resolved once at startup and immutable afterwards. Another process may
/// still bind the port between negotiation and the real server's bind.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PortBinding {
    /// Port that was asked for.
    pub requested: u16,

    /// Port that was found available (`>= requested`).
    pub port: u16,

    /// Host the availability check was made on.
    pub host: String,
}

impl PortBinding {
    /// Whether negotiation had to move away from the requested port.
    pub fn was_relocated(&self) -> bool {
        self.port != self.requested
    }

    /// `http://host:port` for dependents that need an address.
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_url_and_relocation() {
        let binding = PortBinding {
            requested: 3000,
            port: 3002,
            host: "127.0.0.1".to_string(),
        };
        assert!(binding.was_relocated());
        assert_eq!(binding.url(), "http://127.0.0.1:3002");
    }
}
