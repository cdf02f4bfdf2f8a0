// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Errors that stop the relay from starting or from shutting down cleanly.
///
/// Per-item delivery and fetch failures are not represented here; those are logged
/// and the relay keeps running.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to start {component}: {reason}")]
    Startup {
        component: &'static str,
        reason: String,
    },

    #[error("Shutdown drain timeout exceeded with {pending} items undelivered")]
    DrainTimeout { pending: usize },

    #[error("Runtime error: {0}")]
    Runtime(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = RelayError::InvalidConfig("IO_KEY is not defined".to_string());
        assert_eq!(
            error.to_string(),
            "Invalid configuration: IO_KEY is not defined"
        );

        let error = RelayError::DrainTimeout { pending: 3 };
        assert_eq!(
            error.to_string(),
            "Shutdown drain timeout exceeded with 3 items undelivered"
        );
    }

    #[test]
    fn test_startup_display() {
        let error = RelayError::Startup {
            component: "weather source",
            reason: "tls backend unavailable".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Failed to start weather source: tls backend unavailable"
        );
    }
}
