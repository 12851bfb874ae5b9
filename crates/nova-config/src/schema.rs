//! `CoreConfig` — storage paths, payload limits, replication/discovery
//! toggles, ACL defaults, observability sizing, and router enforcement.

use serde::{Deserialize, Serialize};

/// Default ACL treatment for a remote peer that has no explicit policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AclDefault {
    ReadOnly,
    NoAccess,
}

impl Default for AclDefault {
    fn default() -> Self {
        AclDefault::ReadOnly
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Root directory for persisted log data.
    pub storage_path: String,
    /// Maximum accepted payload size for a single log entry, in bytes.
    pub max_payload_bytes: u32,
    /// Whether the replication manager starts enabled.
    pub replication_enabled: bool,
    /// Discovery-transport bootstrap addresses (opaque to the core).
    pub discovery_bootstrap: Vec<String>,
    /// Default ACL mode applied to a remote peer with no explicit policy.
    pub acl_default_remote: AclDefault,
    /// Maximum number of events retained by `ObservabilityLogger`.
    pub observability_max_events: usize,
    /// Default timeout applied to router sends that do not set `ttl_ms`.
    pub router_default_timeout_ms: u64,
    /// Whether the router enforces the tier routing matrix.
    pub router_tier_enforcement: bool,
    /// Whether the router enforces sandbox-id matching.
    pub router_sandbox_enforcement: bool,
    /// Max reconnect attempts before a channel gives up and closes.
    pub channel_default_max_retries: u32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            storage_path: ".nova/hypercore".to_string(),
            max_payload_bytes: 1_048_576,
            replication_enabled: false,
            discovery_bootstrap: Vec::new(),
            acl_default_remote: AclDefault::ReadOnly,
            observability_max_events: 500,
            router_default_timeout_ms: 30_000,
            router_tier_enforcement: true,
            router_sandbox_enforcement: true,
            channel_default_max_retries: 5,
        }
    }
}

impl CoreConfig {
    /// Expand `~` and `$VARS` in `storage_path`, returning the resolved path.
    pub fn resolved_storage_path(&self) -> String {
        shellexpand::full(&self.storage_path)
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| self.storage_path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let c = CoreConfig::default();
        assert_eq!(c.storage_path, ".nova/hypercore");
        assert_eq!(c.max_payload_bytes, 1_048_576);
        assert!(!c.replication_enabled);
        assert!(c.discovery_bootstrap.is_empty());
        assert_eq!(c.acl_default_remote, AclDefault::ReadOnly);
        assert_eq!(c.observability_max_events, 500);
        assert!(c.router_tier_enforcement);
        assert!(c.router_sandbox_enforcement);
    }

    #[test]
    fn partial_yaml_fills_in_defaults() {
        let c: CoreConfig = serde_yaml::from_str("max_payload_bytes: 2048\n").unwrap();
        assert_eq!(c.max_payload_bytes, 2048);
        assert_eq!(c.storage_path, ".nova/hypercore");
    }

    #[test]
    fn acl_default_serializes_kebab_case() {
        let y = serde_yaml::to_string(&AclDefault::NoAccess).unwrap();
        assert!(y.trim().contains("no-access"));
    }

    #[test]
    fn storage_path_expands_home() {
        std::env::set_var("NOVA_TEST_HOME_MARKER", "/tmp/nova-test-home");
        let c = CoreConfig {
            storage_path: "$NOVA_TEST_HOME_MARKER/hypercore".to_string(),
            ..CoreConfig::default()
        };
        assert_eq!(c.resolved_storage_path(), "/tmp/nova-test-home/hypercore");
    }
}
