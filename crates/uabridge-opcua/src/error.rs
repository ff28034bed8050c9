// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the OPC UA input connector.
//!
//! Every failure the connector can surface is one variant of [`OpcUaError`].
//! The variants map one-to-one onto the decisions a host has to make:
//!
//! ```text
//! OpcUaError
//! ├── Discovery       - endpoint list could not be fetched (retryable)
//! ├── UnsupportedAuth - no endpoint matches the configured security (fatal)
//! ├── Authentication  - server rejected the identity token (not auto-retried)
//! ├── Certificate     - server certificate failed inspection (fatal)
//! ├── Channel         - transport fault during a session (reconnect next cycle)
//! ├── Parse           - node identifiers could not be parsed (fatal at startup)
//! ├── Canceled        - caller canceled or deadline expired
//! └── Configuration   - invalid settings
//! ```
//!
//! # Examples
//!
//! ```
//! use uabridge_opcua::error::OpcUaError;
//!
//! let error = OpcUaError::discovery("opc.tcp://localhost:4840", "connection refused");
//! assert!(error.is_retryable());
//! assert!(error.is_transient());
//! assert_eq!(error.error_code().to_string(), "UA-0101");
//! ```

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tracing::Level;

use crate::certificate::CertificateError;
use crate::node_id::NodeIdParseError;

// =============================================================================
// OpcUaError - Main Error Type
// =============================================================================

/// The error type for all connector operations.
#[derive(Debug, Clone, Error)]
pub enum OpcUaError {
    /// The endpoint list could not be fetched.
    #[error("Endpoint discovery failed for '{endpoint}': {message}")]
    Discovery {
        /// Endpoint URL that was queried.
        endpoint: String,
        /// Failure description.
        message: String,
    },

    /// No discovered endpoint satisfies the configured security settings.
    #[error("Unsupported authentication: requested {requested}; server offers [{}]", .offered.join(", "))]
    UnsupportedAuth {
        /// What the configuration asked for.
        requested: String,
        /// What the server advertised.
        offered: Vec<String>,
    },

    /// The server rejected the presented identity.
    #[error("Authentication rejected by '{endpoint}': {message}")]
    Authentication {
        /// Endpoint URL of the rejected session.
        endpoint: String,
        /// Failure description.
        message: String,
        /// Raw OPC UA status code, when the server supplied one.
        status_code: Option<u32>,
    },

    /// The server certificate failed inspection or validation.
    #[error("{0}")]
    Certificate(#[from] CertificateError),

    /// The secure channel or session failed mid-operation.
    #[error("Channel fault: {message}")]
    Channel {
        /// Failure description.
        message: String,
        /// Raw OPC UA status code, when available.
        status_code: Option<u32>,
    },

    /// One or more node identifiers could not be parsed.
    #[error("Failed to parse {} node identifier(s): {}", .errors.len(), join_parse_errors(.errors))]
    Parse {
        /// Every per-item failure, in input order.
        errors: Vec<NodeIdParseError>,
    },

    /// The operation was canceled or its deadline expired.
    #[error("Operation '{operation}' canceled")]
    Canceled {
        /// Name of the interrupted operation.
        operation: &'static str,
    },

    /// The configuration is invalid.
    #[error("Invalid configuration for '{field}': {message}")]
    Configuration {
        /// Offending field.
        field: String,
        /// What is wrong with it.
        message: String,
    },
}

fn join_parse_errors(errors: &[NodeIdParseError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl OpcUaError {
    // =========================================================================
    // Factory Methods
    // =========================================================================

    /// Creates a discovery error.
    pub fn discovery(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Discovery {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Creates an unsupported authentication error.
    pub fn unsupported_auth(requested: impl Into<String>, offered: Vec<String>) -> Self {
        Self::UnsupportedAuth {
            requested: requested.into(),
            offered,
        }
    }

    /// Creates an authentication error.
    pub fn authentication(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Authentication {
            endpoint: endpoint.into(),
            message: message.into(),
            status_code: None,
        }
    }

    /// Creates an authentication error carrying the server status code.
    pub fn authentication_with_status(
        endpoint: impl Into<String>,
        message: impl Into<String>,
        status_code: u32,
    ) -> Self {
        Self::Authentication {
            endpoint: endpoint.into(),
            message: message.into(),
            status_code: Some(status_code),
        }
    }

    /// Creates a certificate error.
    #[inline]
    pub fn certificate(error: CertificateError) -> Self {
        Self::Certificate(error)
    }

    /// Creates a channel error.
    pub fn channel(message: impl Into<String>) -> Self {
        Self::Channel {
            message: message.into(),
            status_code: None,
        }
    }

    /// Creates a channel error carrying the transport status code.
    pub fn channel_with_status(message: impl Into<String>, status_code: u32) -> Self {
        Self::Channel {
            message: message.into(),
            status_code: Some(status_code),
        }
    }

    /// Creates a parse error from the collected per-item failures.
    #[inline]
    pub fn parse(errors: Vec<NodeIdParseError>) -> Self {
        Self::Parse { errors }
    }

    /// Creates a cancellation error.
    #[inline]
    pub fn canceled(operation: &'static str) -> Self {
        Self::Canceled { operation }
    }

    /// Creates a configuration error.
    pub fn configuration(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            field: field.into(),
            message: message.into(),
        }
    }

    // =========================================================================
    // Classification
    // =========================================================================

    /// Returns `true` if the same call may succeed when repeated later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Discovery { .. } | Self::Channel { .. })
    }

    /// Returns `true` for link-level problems, as opposed to rejected credentials
    /// or bad configuration.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Discovery { .. } | Self::Channel { .. } | Self::Canceled { .. }
        )
    }

    /// Returns `true` if the server rejected the presented identity.
    #[inline]
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// Returns `true` if this is a cancellation rather than a failure.
    #[inline]
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled { .. })
    }

    /// Returns `true` if the error invalidates the current session.
    #[inline]
    pub fn is_channel_fault(&self) -> bool {
        matches!(self, Self::Channel { .. })
    }

    /// Returns the suggested delay before retrying, if the error is retryable.
    pub fn suggested_retry_delay(&self) -> Option<Duration> {
        match self {
            Self::Discovery { .. } => Some(Duration::from_secs(5)),
            Self::Channel { .. } => Some(Duration::from_secs(1)),
            _ => None,
        }
    }

    /// Returns the raw OPC UA status code attached to this error, if any.
    pub fn status_code(&self) -> Option<u32> {
        match self {
            Self::Authentication { status_code, .. } | Self::Channel { status_code, .. } => {
                *status_code
            }
            _ => None,
        }
    }

    /// Returns the severity of this error.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Canceled { .. } => ErrorSeverity::Info,
            Self::Discovery { .. } | Self::Channel { .. } => ErrorSeverity::Warning,
            Self::Authentication { .. } | Self::Certificate(_) => ErrorSeverity::Error,
            Self::UnsupportedAuth { .. } | Self::Parse { .. } | Self::Configuration { .. } => {
                ErrorSeverity::Critical
            }
        }
    }

    /// Returns the error category name.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Discovery { .. } => "discovery",
            Self::UnsupportedAuth { .. } => "unsupported_auth",
            Self::Authentication { .. } => "authentication",
            Self::Certificate(_) => "certificate",
            Self::Channel { .. } => "channel",
            Self::Parse { .. } => "parse",
            Self::Canceled { .. } => "canceled",
            Self::Configuration { .. } => "configuration",
        }
    }

    /// Returns the stable error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Discovery { .. } => ErrorCode::new(1, 1),
            Self::UnsupportedAuth { .. } => ErrorCode::new(2, 1),
            Self::Authentication { .. } => ErrorCode::new(2, 2),
            Self::Certificate(e) => ErrorCode::new(3, e.code()),
            Self::Channel { .. } => ErrorCode::new(4, 1),
            Self::Parse { .. } => ErrorCode::new(5, 1),
            Self::Canceled { .. } => ErrorCode::new(6, 1),
            Self::Configuration { .. } => ErrorCode::new(7, 1),
        }
    }

    /// Returns operator-facing hints for resolving the error.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        match self {
            Self::Discovery { .. } => vec![
                "Check that the server is running and reachable",
                "Verify the endpoint URL host and port",
                "Check firewall rules for the OPC UA port",
            ],
            Self::UnsupportedAuth { .. } => vec![
                "Compare the configured security mode and policy with the server endpoints",
                "Run the endpoints command to list what the server offers",
                "Enable the required identity token type on the server",
            ],
            Self::Authentication { .. } => vec![
                "Verify the username and password",
                "Check that the user account is enabled on the server",
                "Reconnect explicitly after fixing the credentials",
            ],
            Self::Certificate(e) => e.recovery_hints(),
            Self::Channel { .. } => vec![
                "The session will be re-established on the next read cycle",
                "Check network stability between connector and server",
            ],
            Self::Parse { .. } => vec![
                "Use the form ns=<index>;<i|s|g|b>=<identifier>",
                "Run the validate command to list every invalid identifier",
            ],
            Self::Canceled { .. } => vec!["Increase the request timeout if reads are canceled too early"],
            Self::Configuration { .. } => vec!["Review the configuration file"],
        }
    }

    /// Returns the tracing level derived from severity.
    #[inline]
    pub fn tracing_level(&self) -> Level {
        self.severity().to_tracing_level()
    }

    /// Logs the error with a level matching its severity.
    pub fn log(&self, context: &str) {
        let level = self.tracing_level();
        let code = self.error_code();

        match level {
            Level::ERROR => tracing::error!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            Level::WARN => tracing::warn!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            _ => tracing::debug!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
        }
    }
}

// =============================================================================
// ErrorSeverity
// =============================================================================

/// Error severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    /// Informational - no action required.
    Info,
    /// Warning - action may be required.
    Warning,
    /// Error - action required, but recoverable.
    Error,
    /// Critical - immediate action required.
    Critical,
}

impl ErrorSeverity {
    /// Converts to tracing level.
    pub fn to_tracing_level(self) -> Level {
        match self {
            Self::Info => Level::INFO,
            Self::Warning => Level::WARN,
            Self::Error | Self::Critical => Level::ERROR,
        }
    }

    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// ErrorCode
// =============================================================================

/// Stable numeric error code, rendered as `UA-CCNN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode {
    /// Category (1-9).
    pub category: u8,
    /// Specific error within category.
    pub code: u8,
}

impl ErrorCode {
    /// Creates an error code.
    pub const fn new(category: u8, code: u8) -> Self {
        Self { category, code }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UA-{:02X}{:02X}", self.category, self.code)
    }
}

/// Result alias for connector operations.
pub type OpcUaResult<T> = Result<T, OpcUaError>;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(OpcUaError::discovery("opc.tcp://h:4840", "refused").is_retryable());
        assert!(OpcUaError::channel("BadConnectionClosed").is_retryable());
        assert!(!OpcUaError::authentication("opc.tcp://h:4840", "denied").is_retryable());
        assert!(!OpcUaError::configuration("endpoint", "empty").is_retryable());
        assert!(!OpcUaError::canceled("read").is_retryable());
    }

    #[test]
    fn test_auth_failure_is_not_transient() {
        let auth = OpcUaError::authentication_with_status("opc.tcp://h:4840", "denied", 0x801F_0000);
        assert!(auth.is_auth_failure());
        assert!(!auth.is_transient());
        assert_eq!(auth.status_code(), Some(0x801F_0000));

        let link = OpcUaError::channel("socket reset");
        assert!(link.is_transient());
        assert!(!link.is_auth_failure());
    }

    #[test]
    fn test_unsupported_auth_message_lists_offers() {
        let error = OpcUaError::unsupported_auth(
            "SignAndEncrypt/Basic256Sha256",
            vec!["None/None".into(), "Sign/Basic256".into()],
        );
        let text = error.to_string();
        assert!(text.contains("SignAndEncrypt/Basic256Sha256"));
        assert!(text.contains("None/None, Sign/Basic256"));
    }

    #[test]
    fn test_parse_error_keeps_every_item() {
        let error = OpcUaError::parse(vec![
            NodeIdParseError::new(0, "ns=x;i=1", "invalid namespace index 'x'"),
            NodeIdParseError::new(2, "", "empty identifier"),
        ]);
        let text = error.to_string();
        assert!(text.starts_with("Failed to parse 2 node identifier(s)"));
        assert!(text.contains("#0"));
        assert!(text.contains("#2"));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(OpcUaError::discovery("e", "m").error_code().to_string(), "UA-0101");
        assert_eq!(OpcUaError::authentication("e", "m").error_code().to_string(), "UA-0202");
        assert_eq!(OpcUaError::channel("m").error_code().to_string(), "UA-0401");
        assert_eq!(OpcUaError::configuration("f", "m").error_code().to_string(), "UA-0701");
    }

    #[test]
    fn test_severity_levels() {
        assert_eq!(OpcUaError::canceled("read").tracing_level(), Level::INFO);
        assert_eq!(OpcUaError::channel("m").tracing_level(), Level::WARN);
        assert_eq!(OpcUaError::parse(vec![]).severity(), ErrorSeverity::Critical);
        assert!(ErrorSeverity::Critical > ErrorSeverity::Warning);
    }

    #[test]
    fn test_recovery_hints_present() {
        for error in [
            OpcUaError::discovery("e", "m"),
            OpcUaError::unsupported_auth("None/None", vec![]),
            OpcUaError::channel("m"),
            OpcUaError::certificate(CertificateError::missing("opc.tcp://h:4840")),
        ] {
            assert!(!error.recovery_hints().is_empty());
        }
    }
}
