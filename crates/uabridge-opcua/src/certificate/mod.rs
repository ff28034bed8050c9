// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Server certificate inspection.
//!
//! Every discovered endpoint may carry the server's application instance
//! certificate. The [`CertificateInspector`] decodes it (DER or PEM),
//! extracts the fields operators care about, and applies the validation
//! policy before a secure channel is opened:
//!
//! ```text
//! EndpointDescriptor.server_certificate
//!         │
//!         ├── decode        → CertificateInfo
//!         ├── validity      → Expired / NotYetValid
//!         ├── hostname SAN  → HostnameMismatch
//!         └── fingerprint   → Untrusted
//! ```

mod inspector;

pub use inspector::{
    decode_certificate, describe_endpoint, CertificateInfo, CertificateInspector, EndpointSummary,
    ValidationPolicy,
};

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Certificate inspection and validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CertificateError {
    /// The certificate bytes could not be decoded.
    #[error("Failed to decode server certificate: {reason}")]
    Decode {
        /// Decoder message.
        reason: String,
    },

    /// A secured endpoint carries no certificate.
    #[error("Endpoint '{endpoint}' requires security but carries no server certificate")]
    Missing {
        /// Endpoint URL.
        endpoint: String,
    },

    /// The certificate validity period has ended.
    #[error("Server certificate expired at {not_after}")]
    Expired {
        /// End of validity.
        not_after: DateTime<Utc>,
    },

    /// The certificate validity period has not started.
    #[error("Server certificate not valid before {not_before}")]
    NotYetValid {
        /// Start of validity.
        not_before: DateTime<Utc>,
    },

    /// The endpoint host is not among the certificate's alternative names.
    #[error("Server certificate does not cover host '{hostname}' (names: [{}])", .names.join(", "))]
    HostnameMismatch {
        /// Host being connected to.
        hostname: String,
        /// DNS and IP names in the certificate.
        names: Vec<String>,
    },

    /// The certificate fingerprint is not in the trusted list.
    #[error("Server certificate {fingerprint} is not trusted")]
    Untrusted {
        /// SHA-256 fingerprint, lowercase hex.
        fingerprint: String,
    },

    /// The protocol stack rejected the certificate during the handshake.
    #[error("Server certificate rejected: {status}")]
    Rejected {
        /// Rendered status code.
        status: String,
    },
}

impl CertificateError {
    /// Creates a decode error.
    pub fn decode(reason: impl Into<String>) -> Self {
        Self::Decode {
            reason: reason.into(),
        }
    }

    /// Creates a missing-certificate error.
    pub fn missing(endpoint: impl Into<String>) -> Self {
        Self::Missing {
            endpoint: endpoint.into(),
        }
    }

    /// Returns the code within the certificate error category.
    pub(crate) fn code(&self) -> u8 {
        match self {
            Self::Decode { .. } => 1,
            Self::Missing { .. } => 2,
            Self::Expired { .. } => 3,
            Self::NotYetValid { .. } => 4,
            Self::HostnameMismatch { .. } => 5,
            Self::Untrusted { .. } => 6,
            Self::Rejected { .. } => 7,
        }
    }

    /// Returns operator-facing hints.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        match self {
            Self::Decode { .. } => vec!["Check that the server publishes a valid X.509 certificate"],
            Self::Missing { .. } => vec![
                "Configure a server application instance certificate",
                "Use security mode None if the link is otherwise protected",
            ],
            Self::Expired { .. } | Self::NotYetValid { .. } => vec![
                "Renew the server certificate",
                "Check the clock on the server and the connector host",
            ],
            Self::HostnameMismatch { .. } => vec![
                "Connect using a host name listed in the certificate",
                "Reissue the certificate with the correct subject alternative names",
            ],
            Self::Untrusted { .. } => vec![
                "Add the fingerprint to trusted_server_fingerprints",
                "Run the endpoints command to print the server fingerprint",
            ],
            Self::Rejected { .. } => vec![
                "Trust the server certificate in the client PKI directory",
                "Check that the client certificate is trusted by the server",
            ],
        }
    }
}

/// Result alias for certificate operations.
pub type CertificateResult<T> = Result<T, CertificateError>;
