//! Registry configuration.

use serde::Deserialize;

use certreg_core::{IdDerivation, DEFAULT_MAX_NAME_BYTES};

use crate::error::{RegistryError, Result};

/// What issuance does when the derived identifier already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// Fail with `IdCollision` and leave the existing record alone.
    #[default]
    Reject,
    /// Replace the existing record (last write wins).
    Overwrite,
}

/// Configuration for the Registry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    /// Inputs to certificate identifier derivation.
    pub id_derivation: IdDerivation,
    /// Behavior on identifier collision.
    pub collision_policy: CollisionPolicy,
    /// Upper bound on certificate and recipient name length, in bytes.
    pub max_name_bytes: usize,
    /// Capacity of the event broadcast channel. Slow subscribers that fall
    /// further behind than this miss events and must poll `events_since`.
    pub event_buffer: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            id_derivation: IdDerivation::Sequenced,
            collision_policy: CollisionPolicy::Reject,
            max_name_bytes: DEFAULT_MAX_NAME_BYTES,
            event_buffer: 256,
        }
    }
}

impl RegistryConfig {
    /// The behavior of the reference deployment: plain fingerprints and
    /// silent overwrite on collision.
    pub fn reference() -> Self {
        Self {
            id_derivation: IdDerivation::Plain,
            collision_policy: CollisionPolicy::Overwrite,
            ..Self::default()
        }
    }

    /// Parse from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| RegistryError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the registry cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.event_buffer == 0 {
            return Err(RegistryError::Config("event_buffer must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_gives_defaults() {
        assert_eq!(RegistryConfig::from_json("{}").unwrap(), RegistryConfig::default());
    }

    #[test]
    fn test_parse_reference_behavior() {
        let config = RegistryConfig::from_json(
            r#"{"id_derivation": "plain", "collision_policy": "overwrite"}"#,
        )
        .unwrap();
        assert_eq!(config, RegistryConfig::reference());
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(matches!(
            RegistryConfig::from_json(r#"{"max_names": 5}"#),
            Err(RegistryError::Config(_))
        ));
    }

    #[test]
    fn test_zero_event_buffer_rejected() {
        assert!(RegistryConfig::from_json(r#"{"event_buffer": 0}"#).is_err());
    }
}
