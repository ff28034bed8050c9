// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Connector configuration.
//!
//! # Examples
//!
//! ```
//! use uabridge_opcua::config::InputConfig;
//! use uabridge_opcua::types::Credentials;
//!
//! let config = InputConfig::builder()
//!     .endpoint("opc.tcp://localhost:4840")
//!     .credentials(Credentials::user_name("root", "secret"))
//!     .node_id("ns=4;s=|var|Demo.Value")
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.node_ids.len(), 1);
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{OpcUaError, OpcUaResult};
use crate::node_id::{parse_node_ids, NodeId};
use crate::types::{Credentials, SecurityMode, SecurityPolicy};

/// Configuration of one OPC UA input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputConfig {
    /// Server endpoint URL (e.g. "opc.tcp://localhost:4840").
    pub endpoint: String,

    /// Required message security mode.
    #[serde(default)]
    pub security_mode: SecurityMode,

    /// Required security policy.
    #[serde(default)]
    pub security_policy: SecurityPolicy,

    /// Identity presented on session activation.
    #[serde(default)]
    pub credentials: Credentials,

    /// Node identifiers read on every cycle, in output order.
    #[serde(default)]
    pub node_ids: Vec<String>,

    /// Client application name.
    #[serde(default = "default_application_name")]
    pub application_name: String,

    /// Client application URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_uri: Option<String>,

    /// Requested session timeout.
    #[serde(default = "default_session_timeout", with = "humantime_serde")]
    pub session_timeout: Duration,

    /// Default deadline for a single connect or read call.
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Upper bound for a graceful session close.
    #[serde(default = "default_close_timeout", with = "humantime_serde")]
    pub close_timeout: Duration,

    /// Validate the server certificate when security is enabled.
    #[serde(default = "default_verify_server_certificate")]
    pub verify_server_certificate: bool,

    /// Accepted SHA-256 fingerprints of server certificates (hex, colons optional).
    #[serde(default)]
    pub trusted_server_fingerprints: Vec<String>,

    /// PKI directory of the protocol stack.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pki_dir: Option<PathBuf>,

    /// Client application instance certificate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_certificate_path: Option<PathBuf>,

    /// Private key of the client application instance certificate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_private_key_path: Option<PathBuf>,
}

fn default_application_name() -> String {
    "uabridge OPC UA Input".to_string()
}

fn default_session_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_close_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_verify_server_certificate() -> bool {
    true
}

impl InputConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> InputConfigBuilder {
        InputConfigBuilder::default()
    }

    /// Creates an anonymous, unsecured configuration for the endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Validates this configuration.
    ///
    /// Node identifiers are checked separately by [`InputConfig::parse_node_ids`].
    pub fn validate(&self) -> OpcUaResult<()> {
        if self.endpoint.trim().is_empty() {
            return Err(OpcUaError::configuration("endpoint", "endpoint is required"));
        }

        if !self.endpoint.starts_with("opc.tcp://") {
            return Err(OpcUaError::configuration(
                "endpoint",
                format!("'{}' must start with opc.tcp://", self.endpoint),
            ));
        }

        if self.endpoint_host().is_none() {
            return Err(OpcUaError::configuration(
                "endpoint",
                format!("'{}' has no host", self.endpoint),
            ));
        }

        if self.security_mode != SecurityMode::None && self.security_policy == SecurityPolicy::None
        {
            return Err(OpcUaError::configuration(
                "security_policy",
                format!("security mode {} requires a policy other than None", self.security_mode),
            ));
        }

        if self.security_mode == SecurityMode::None && self.security_policy != SecurityPolicy::None
        {
            return Err(OpcUaError::configuration(
                "security_mode",
                format!("security policy {} requires a mode other than None", self.security_policy),
            ));
        }

        self.credentials.validate()?;

        if self.client_certificate_path.is_some() != self.client_private_key_path.is_some() {
            return Err(OpcUaError::configuration(
                "client_certificate_path",
                "client certificate and private key must be configured together",
            ));
        }

        for (field, value) in [
            ("session_timeout", self.session_timeout),
            ("request_timeout", self.request_timeout),
            ("close_timeout", self.close_timeout),
        ] {
            if value.is_zero() {
                return Err(OpcUaError::configuration(field, "must be greater than 0"));
            }
        }

        for fingerprint in &self.trusted_server_fingerprints {
            let normalized = normalize_fingerprint(fingerprint);
            if normalized.len() != 64 || !normalized.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(OpcUaError::configuration(
                    "trusted_server_fingerprints",
                    format!("'{}' is not a SHA-256 hex fingerprint", fingerprint),
                ));
            }
        }

        Ok(())
    }

    /// Parses the configured node identifiers.
    pub fn parse_node_ids(&self) -> OpcUaResult<Vec<NodeId>> {
        parse_node_ids(&self.node_ids)
    }

    /// Returns the host part of the endpoint URL.
    pub fn endpoint_host(&self) -> Option<String> {
        endpoint_host(&self.endpoint)
    }

    /// Returns the effective application URI.
    pub fn effective_application_uri(&self) -> String {
        self.application_uri.clone().unwrap_or_else(|| {
            format!("urn:uabridge:opcua:{}", self.application_name.replace(' ', ""))
        })
    }

    /// Returns the trusted fingerprints in canonical lowercase form.
    pub fn normalized_fingerprints(&self) -> Vec<String> {
        self.trusted_server_fingerprints
            .iter()
            .map(|f| normalize_fingerprint(f))
            .collect()
    }

    /// Returns `true` if this configuration uses message security.
    #[inline]
    pub fn uses_security(&self) -> bool {
        !self.security_mode.is_none()
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            security_mode: SecurityMode::default(),
            security_policy: SecurityPolicy::default(),
            credentials: Credentials::default(),
            node_ids: Vec::new(),
            application_name: default_application_name(),
            application_uri: None,
            session_timeout: default_session_timeout(),
            request_timeout: default_request_timeout(),
            close_timeout: default_close_timeout(),
            verify_server_certificate: default_verify_server_certificate(),
            trusted_server_fingerprints: Vec::new(),
            pki_dir: None,
            client_certificate_path: None,
            client_private_key_path: None,
        }
    }
}

/// Extracts the host of an `opc.tcp://` URL, without brackets for IPv6.
pub fn endpoint_host(endpoint: &str) -> Option<String> {
    let url = url::Url::parse(endpoint).ok()?;
    let host = url.host_str()?;
    if host.is_empty() {
        return None;
    }
    Some(host.trim_start_matches('[').trim_end_matches(']').to_string())
}

/// Lowercases a fingerprint and strips `:` separators.
pub fn normalize_fingerprint(fingerprint: &str) -> String {
    fingerprint
        .chars()
        .filter(|c| *c != ':' && !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase()
}

// =============================================================================
// InputConfigBuilder
// =============================================================================

/// Builder for [`InputConfig`].
#[derive(Debug, Default)]
pub struct InputConfigBuilder {
    config: InputConfig,
    endpoint_set: bool,
}

impl InputConfigBuilder {
    /// Sets the server endpoint URL.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self.endpoint_set = true;
        self
    }

    /// Sets the security mode.
    pub fn security_mode(mut self, mode: SecurityMode) -> Self {
        self.config.security_mode = mode;
        self
    }

    /// Sets the security policy.
    pub fn security_policy(mut self, policy: SecurityPolicy) -> Self {
        self.config.security_policy = policy;
        self
    }

    /// Sets the credentials.
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.config.credentials = credentials;
        self
    }

    /// Appends one node identifier.
    pub fn node_id(mut self, node_id: impl Into<String>) -> Self {
        self.config.node_ids.push(node_id.into());
        self
    }

    /// Replaces the node identifier list.
    pub fn node_ids<I, S>(mut self, node_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.node_ids = node_ids.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the application name.
    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.config.application_name = name.into();
        self
    }

    /// Sets the application URI.
    pub fn application_uri(mut self, uri: impl Into<String>) -> Self {
        self.config.application_uri = Some(uri.into());
        self
    }

    /// Sets the session timeout.
    pub fn session_timeout(mut self, timeout: Duration) -> Self {
        self.config.session_timeout = timeout;
        self
    }

    /// Sets the request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Sets the close timeout.
    pub fn close_timeout(mut self, timeout: Duration) -> Self {
        self.config.close_timeout = timeout;
        self
    }

    /// Enables or disables server certificate validation.
    pub fn verify_server_certificate(mut self, verify: bool) -> Self {
        self.config.verify_server_certificate = verify;
        self
    }

    /// Adds a trusted server certificate fingerprint.
    pub fn trusted_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.config.trusted_server_fingerprints.push(fingerprint.into());
        self
    }

    /// Sets the PKI directory.
    pub fn pki_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.pki_dir = Some(dir.into());
        self
    }

    /// Sets the client application certificate and key.
    pub fn client_certificate(
        mut self,
        certificate_path: impl Into<PathBuf>,
        private_key_path: impl Into<PathBuf>,
    ) -> Self {
        self.config.client_certificate_path = Some(certificate_path.into());
        self.config.client_private_key_path = Some(private_key_path.into());
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> OpcUaResult<InputConfig> {
        if !self.endpoint_set {
            return Err(OpcUaError::configuration("endpoint", "endpoint is required"));
        }
        self.config.validate()?;
        Ok(self.config)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = InputConfig::builder()
            .endpoint("opc.tcp://localhost:4840")
            .build()
            .unwrap();

        assert_eq!(config.security_mode, SecurityMode::None);
        assert_eq!(config.credentials, Credentials::Anonymous);
        assert_eq!(config.session_timeout, Duration::from_secs(60));
        assert_eq!(config.close_timeout, Duration::from_secs(5));
        assert!(config.verify_server_certificate);
        assert!(config.node_ids.is_empty());
    }

    #[test]
    fn test_builder_requires_endpoint() {
        assert!(InputConfig::builder().build().is_err());
    }

    #[test]
    fn test_validate_endpoint_scheme() {
        let err = InputConfig::new("http://localhost:4840").validate().unwrap_err();
        assert!(err.to_string().contains("opc.tcp://"));
        assert!(InputConfig::new("opc.tcp://").validate().is_err());
    }

    #[test]
    fn test_validate_mode_policy_consistency() {
        let config = InputConfig {
            security_mode: SecurityMode::Sign,
            ..InputConfig::new("opc.tcp://plc:4840")
        };
        assert!(config.validate().is_err());

        let config = InputConfig {
            security_policy: SecurityPolicy::Basic256Sha256,
            ..InputConfig::new("opc.tcp://plc:4840")
        };
        assert!(config.validate().is_err());

        let config = InputConfig {
            security_mode: SecurityMode::SignAndEncrypt,
            security_policy: SecurityPolicy::Basic256Sha256,
            ..InputConfig::new("opc.tcp://plc:4840")
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_username() {
        let err = InputConfig::builder()
            .endpoint("opc.tcp://plc:4840")
            .credentials(Credentials::user_name("", "secret"))
            .build()
            .unwrap_err();
        assert!(matches!(err, OpcUaError::Configuration { ref field, .. } if field == "credentials.username"));
    }

    #[test]
    fn test_validate_fingerprints() {
        let good = "AB:".repeat(31) + "AB";
        let config = InputConfig::builder()
            .endpoint("opc.tcp://plc:4840")
            .trusted_fingerprint(good)
            .build()
            .unwrap();
        assert_eq!(config.normalized_fingerprints()[0], "ab".repeat(32));

        assert!(InputConfig::builder()
            .endpoint("opc.tcp://plc:4840")
            .trusted_fingerprint("abcd")
            .build()
            .is_err());
    }

    #[test]
    fn test_validate_zero_timeout() {
        assert!(InputConfig::builder()
            .endpoint("opc.tcp://plc:4840")
            .close_timeout(Duration::ZERO)
            .build()
            .is_err());
    }

    #[test]
    fn test_client_certificate_pairing() {
        let config = InputConfig {
            client_certificate_path: Some("client.der".into()),
            ..InputConfig::new("opc.tcp://plc:4840")
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_endpoint_host() {
        assert_eq!(endpoint_host("opc.tcp://plc.local:4840/ua"), Some("plc.local".into()));
        assert_eq!(endpoint_host("opc.tcp://10.0.0.5:4840"), Some("10.0.0.5".into()));
        assert_eq!(endpoint_host("opc.tcp://[::1]:4840"), Some("::1".into()));
        assert_eq!(endpoint_host("not a url"), None);
    }

    #[test]
    fn test_deserialize_with_humantime() {
        let json = r#"{
            "endpoint": "opc.tcp://plc:4840",
            "credentials": {"type": "username", "username": "root", "password": "secret"},
            "node_ids": ["ns=4;s=|var|Demo.Value"],
            "request_timeout": "2s",
            "close_timeout": "500ms"
        }"#;
        let config: InputConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.request_timeout, Duration::from_secs(2));
        assert_eq!(config.close_timeout, Duration::from_millis(500));
        assert_eq!(config.parse_node_ids().unwrap().len(), 1);
        assert!(config.validate().is_ok());
    }
}
