// Path: crates/client/src/config.rs
//! Adapter configuration.

use plugvm_chain::ChainStateConfig;
use plugvm_types::VmError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tuning for one [`crate::VmClient`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VmClientConfig {
    /// Per-call deadline in milliseconds. `0` leaves calls unbounded.
    #[serde(default)]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub chain: ChainStateConfig,
}

impl VmClientConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, VmError> {
        let config: Self =
            toml::from_str(s).map_err(|e| VmError::InvalidArgument(format!("vm client config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), VmError> {
        self.chain.validate()
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        match self.request_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let cfg = VmClientConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, VmClientConfig::default());
        assert_eq!(cfg.request_timeout(), None);
        assert_eq!(cfg.chain.decided_cache_size, 2048);
    }

    #[test]
    fn nested_chain_section() {
        let cfg = VmClientConfig::from_toml_str(
            r#"
            request_timeout_ms = 1500

            [chain]
            unverified_cache_size = 64
            "#,
        )
        .unwrap();
        assert_eq!(cfg.request_timeout(), Some(Duration::from_millis(1500)));
        assert_eq!(cfg.chain.unverified_cache_size, 64);
        assert_eq!(cfg.chain.missing_cache_size, 2048);
    }

    #[test]
    fn invalid_documents_are_rejected() {
        assert!(VmClientConfig::from_toml_str("timeout = 3").is_err());
        assert!(VmClientConfig::from_toml_str("[chain]\ndecided_cache_size = 0").is_err());
    }
}
