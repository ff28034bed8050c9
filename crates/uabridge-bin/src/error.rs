// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the uabridge binary.

use thiserror::Error;
use uabridge_opcua::OpcUaError;

/// Result type alias for binary operations.
pub type BinResult<T> = Result<T, BinError>;

/// Errors that can occur in the uabridge binary.
#[derive(Debug, Error)]
pub enum BinError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Runtime error.
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),

    /// Connector error.
    #[error("{}: {source}", .source.error_code())]
    Connector {
        /// The connector error.
        #[from]
        source: OpcUaError,
    },

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        /// The context description.
        context: String,
        /// The underlying error.
        #[source]
        source: Box<BinError>,
    },
}

impl BinError {
    /// Creates a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates a runtime error.
    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }

    /// Creates an I/O error.
    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    /// Adds context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Returns the connector error, if this wraps one.
    pub fn connector_error(&self) -> Option<&OpcUaError> {
        match self {
            Self::Connector { source } => Some(source),
            Self::WithContext { source, .. } => source.connector_error(),
            _ => None,
        }
    }

    /// Returns the exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) => 1,
            Self::Runtime(_) => 3,
            Self::Io(_) => 4,
            Self::Connector { source } => match source {
                OpcUaError::Configuration { .. } | OpcUaError::Parse { .. } => 1,
                OpcUaError::Authentication { .. } | OpcUaError::UnsupportedAuth { .. } => 5,
                OpcUaError::Certificate(_) => 6,
                OpcUaError::Canceled { .. } => 130,
                OpcUaError::Discovery { .. } | OpcUaError::Channel { .. } => 7,
            },
            Self::WithContext { source, .. } => source.exit_code(),
        }
    }
}

impl From<std::io::Error> for BinError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<anyhow::Error> for BinError {
    fn from(err: anyhow::Error) -> Self {
        if err.root_cause().is::<std::io::Error>() {
            Self::Io(format!("{:#}", err))
        } else {
            Self::Runtime(format!("{:#}", err))
        }
    }
}

impl From<serde_json::Error> for BinError {
    fn from(err: serde_json::Error) -> Self {
        Self::Runtime(format!("JSON serialization failed: {}", err))
    }
}

impl From<config::ConfigError> for BinError {
    fn from(err: config::ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

// =============================================================================
// Error Reporting
// =============================================================================

/// Reports an error with its cause chain and recovery hints.
pub fn report_error(error: &BinError) {
    eprintln!("Error: {}", error);

    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        eprintln!("  Caused by: {}", cause);
        source = cause.source();
    }

    if let Some(connector) = error.connector_error() {
        if let OpcUaError::Parse { errors } = connector {
            for item in errors {
                eprintln!("  - {}", item);
            }
        }
        for hint in connector.recovery_hints() {
            eprintln!("  Hint: {}", hint);
        }
    }
}

/// Reports an error and exits with the appropriate code.
pub fn report_error_and_exit(error: BinError) -> ! {
    report_error(&error);
    std::process::exit(error.exit_code())
}

// =============================================================================
// Tests
// =============================================================================
