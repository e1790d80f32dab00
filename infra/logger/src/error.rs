//! # Logger Errors

use thiserror::Error;

/// Failures raised while initializing the logging system.
#[derive(Debug, Error)]
pub enum LoggerError {
    /// The builder settings are unusable.
    #[error("invalid logger configuration: {message}")]
    InvalidConfiguration { message: String },

    /// A global subscriber is already installed.
    #[error("subscriber installation failed: {message}")]
    Subscriber { message: String },
}

impl LoggerError {
    /// Stable short code for programmatic handling.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfiguration { .. } => "invalid-configuration",
            Self::Subscriber { .. } => "subscriber",
        }
    }
}
