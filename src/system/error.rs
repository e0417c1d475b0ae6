use thiserror::Error;

/// Errors from registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Name '{name}' is already bound to a running actor")]
    Collision { name: String },
}

/// Errors loading a [`SystemConfig`](super::SystemConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid system configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("max_microsteps must be at least 1")]
    ZeroMicrosteps,
}
