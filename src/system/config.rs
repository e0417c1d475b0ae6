use super::ConfigError;
use serde::{Deserialize, Serialize};

/// Runtime settings shared by every actor of a [`System`](super::System).
///
/// Missing fields take their defaults, so a partial JSON document is
/// enough:
///
/// ```rust
/// use choreo::system::SystemConfig;
///
/// let config = SystemConfig::from_json(r#"{ "max_microsteps": 64 }"#).unwrap();
/// assert_eq!(config.max_microsteps, 64);
/// assert!(config.stop_children_with_parent);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Upper bound on microsteps in one drain of the mailbox. When it is
    /// exceeded the raised events are dropped and the drain ends with
    /// `ActorError::MicrostepLimit`; events still in the mailbox stay queued
    /// for the next `send` or settlement.
    pub max_microsteps: usize,
    pub stop_children_with_parent: bool,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            max_microsteps: 10_000,
            stop_children_with_parent: true,
        }
    }
}

impl SystemConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_microsteps == 0 {
            return Err(ConfigError::ZeroMicrosteps);
        }
        Ok(())
    }
}
