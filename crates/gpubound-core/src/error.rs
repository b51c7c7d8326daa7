// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use thiserror::Error;

/// Errors raised at the edges of the engine: capture construction, loading and
/// configuration validation. Classification itself never fails.
#[derive(Debug, Error)]
pub enum BoundError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not supported: {0}")]
    NotSupported(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "serde")]
    #[error("{context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

impl BoundError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn not_supported(msg: impl Into<String>) -> Self {
        Self::NotSupported(msg.into())
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    #[cfg(feature = "serde")]
    pub fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            context: context.into(),
            source,
        }
    }

    /// Stable machine-readable code for error envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::NotSupported(_) => "not_supported",
            Self::Io { .. } => "io_error",
            #[cfg(feature = "serde")]
            Self::Json { .. } => "json_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, BoundError>;

#[cfg(test)]
mod tests {
    use super::BoundError;

    #[test]
    fn invalid_input_renders_message_and_code() {
        let err = BoundError::invalid_input("duplicate header 'x'");
        assert_eq!(err.to_string(), "invalid input: duplicate header 'x'");
        assert_eq!(err.code(), "invalid_input");
    }

    #[test]
    fn io_error_keeps_context_and_source() {
        let err = BoundError::io(
            "failed to read 'capture.json'",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        assert_eq!(err.code(), "io_error");
        assert!(err.to_string().starts_with("failed to read 'capture.json'"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
