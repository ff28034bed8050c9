// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Security and endpoint types shared by the connector.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::OpcUaError;

// =============================================================================
// SecurityMode
// =============================================================================

/// OPC UA message security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SecurityMode {
    /// No security (messages are neither signed nor encrypted).
    #[default]
    None,

    /// Messages are signed but not encrypted.
    Sign,

    /// Messages are signed and encrypted.
    SignAndEncrypt,
}

impl SecurityMode {
    /// Returns `true` if this mode provides no security.
    #[inline]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Returns the display name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Sign => "Sign",
            Self::SignAndEncrypt => "SignAndEncrypt",
        }
    }
}

impl fmt::Display for SecurityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SecurityMode {
    type Err = OpcUaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "none" => Ok(Self::None),
            "sign" => Ok(Self::Sign),
            "signandencrypt" => Ok(Self::SignAndEncrypt),
            _ => Err(OpcUaError::configuration(
                "security_mode",
                format!("unknown security mode '{}'", s),
            )),
        }
    }
}

// =============================================================================
// SecurityPolicy
// =============================================================================

const POLICY_URI_PREFIX: &str = "http://opcfoundation.org/UA/SecurityPolicy#";

/// OPC UA security policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SecurityPolicy {
    /// No security policy.
    #[default]
    None,
    /// Basic128Rsa15 (deprecated).
    Basic128Rsa15,
    /// Basic256 (deprecated).
    Basic256,
    /// Basic256Sha256.
    Basic256Sha256,
    /// Aes128_Sha256_RsaOaep.
    Aes128Sha256RsaOaep,
    /// Aes256_Sha256_RsaPss.
    Aes256Sha256RsaPss,
}

impl SecurityPolicy {
    /// Returns the OPC UA policy URI.
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::None => "http://opcfoundation.org/UA/SecurityPolicy#None",
            Self::Basic128Rsa15 => "http://opcfoundation.org/UA/SecurityPolicy#Basic128Rsa15",
            Self::Basic256 => "http://opcfoundation.org/UA/SecurityPolicy#Basic256",
            Self::Basic256Sha256 => "http://opcfoundation.org/UA/SecurityPolicy#Basic256Sha256",
            Self::Aes128Sha256RsaOaep => {
                "http://opcfoundation.org/UA/SecurityPolicy#Aes128_Sha256_RsaOaep"
            }
            Self::Aes256Sha256RsaPss => {
                "http://opcfoundation.org/UA/SecurityPolicy#Aes256_Sha256_RsaPss"
            }
        }
    }

    /// Returns the short name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Basic128Rsa15 => "Basic128Rsa15",
            Self::Basic256 => "Basic256",
            Self::Basic256Sha256 => "Basic256Sha256",
            Self::Aes128Sha256RsaOaep => "Aes128Sha256RsaOaep",
            Self::Aes256Sha256RsaPss => "Aes256Sha256RsaPss",
        }
    }

    /// Creates from an exact policy URI.
    pub fn from_uri(uri: &str) -> Option<Self> {
        [
            Self::None,
            Self::Basic128Rsa15,
            Self::Basic256,
            Self::Basic256Sha256,
            Self::Aes128Sha256RsaOaep,
            Self::Aes256Sha256RsaPss,
        ]
        .into_iter()
        .find(|p| p.uri() == uri)
    }

    /// Returns a short label for any policy URI, known or not.
    pub fn short_name(uri: &str) -> &str {
        uri.strip_prefix(POLICY_URI_PREFIX).unwrap_or(uri)
    }
}

impl fmt::Display for SecurityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SecurityPolicy {
    type Err = OpcUaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(policy) = Self::from_uri(s) {
            return Ok(policy);
        }

        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "none" => Ok(Self::None),
            "basic128rsa15" => Ok(Self::Basic128Rsa15),
            "basic256" => Ok(Self::Basic256),
            "basic256sha256" => Ok(Self::Basic256Sha256),
            "aes128sha256rsaoaep" => Ok(Self::Aes128Sha256RsaOaep),
            "aes256sha256rsapss" => Ok(Self::Aes256Sha256RsaPss),
            _ => Err(OpcUaError::configuration(
                "security_policy",
                format!("unknown security policy '{}'", s),
            )),
        }
    }
}

// =============================================================================
// Identity tokens
// =============================================================================

/// Kind of identity token a server accepts or a client presents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// No user identity.
    Anonymous,
    /// Username and password.
    UserName,
    /// X.509 user certificate.
    Certificate,
    /// Externally issued token.
    IssuedToken,
}

impl TokenKind {
    /// Returns the display name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Anonymous => "Anonymous",
            Self::UserName => "UserName",
            Self::Certificate => "Certificate",
            Self::IssuedToken => "IssuedToken",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Identity-token policy advertised by an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserTokenPolicy {
    /// Server-assigned policy id, echoed back on activation.
    pub policy_id: String,
    /// Accepted token kind.
    pub token_type: TokenKind,
    /// Issued token type URI, if any.
    #[serde(default)]
    pub issued_token_type: Option<String>,
    /// Issuer endpoint URL, if any.
    #[serde(default)]
    pub issuer_endpoint_url: Option<String>,
    /// Security policy URI used to encrypt the token, if different from the channel.
    #[serde(default)]
    pub security_policy_uri: Option<String>,
}

impl UserTokenPolicy {
    /// Creates a policy with only id and type set.
    pub fn new(policy_id: impl Into<String>, token_type: TokenKind) -> Self {
        Self {
            policy_id: policy_id.into(),
            token_type,
            issued_token_type: None,
            issuer_endpoint_url: None,
            security_policy_uri: None,
        }
    }
}

// =============================================================================
// Credentials
// =============================================================================

/// Client identity presented when activating a session.
///
/// The password never appears in `Debug` or `Display` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credentials {
    /// No user identity.
    #[default]
    Anonymous,

    /// Username and password.
    #[serde(rename = "username")]
    UserName {
        /// The username.
        username: String,
        /// The password.
        password: String,
    },

    /// X.509 user certificate.
    Certificate {
        /// Path to the certificate file (DER or PEM).
        certificate_path: PathBuf,
        /// Path to the private key file.
        private_key_path: PathBuf,
    },
}

impl Credentials {
    /// Creates username/password credentials.
    pub fn user_name(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::UserName {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Creates certificate credentials.
    pub fn certificate(
        certificate_path: impl Into<PathBuf>,
        private_key_path: impl Into<PathBuf>,
    ) -> Self {
        Self::Certificate {
            certificate_path: certificate_path.into(),
            private_key_path: private_key_path.into(),
        }
    }

    /// Returns the token kind these credentials present.
    pub const fn kind(&self) -> TokenKind {
        match self {
            Self::Anonymous => TokenKind::Anonymous,
            Self::UserName { .. } => TokenKind::UserName,
            Self::Certificate { .. } => TokenKind::Certificate,
        }
    }

    /// Checks the credentials for values a server could never accept.
    pub fn validate(&self) -> Result<(), OpcUaError> {
        match self {
            Self::Anonymous => Ok(()),
            Self::UserName { username, password } => {
                if username.trim().is_empty() {
                    return Err(OpcUaError::configuration(
                        "credentials.username",
                        "username must not be empty",
                    ));
                }
                if password.is_empty() {
                    return Err(OpcUaError::configuration(
                        "credentials.password",
                        "password must not be empty",
                    ));
                }
                Ok(())
            }
            Self::Certificate {
                certificate_path,
                private_key_path,
            } => {
                if certificate_path.as_os_str().is_empty() {
                    return Err(OpcUaError::configuration(
                        "credentials.certificate_path",
                        "certificate path must not be empty",
                    ));
                }
                if private_key_path.as_os_str().is_empty() {
                    return Err(OpcUaError::configuration(
                        "credentials.private_key_path",
                        "private key path must not be empty",
                    ));
                }
                Ok(())
            }
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => f.write_str("Anonymous"),
            Self::UserName { username, .. } => f
                .debug_struct("UserName")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Self::Certificate {
                certificate_path,
                private_key_path,
            } => f
                .debug_struct("Certificate")
                .field("certificate_path", certificate_path)
                .field("private_key_path", private_key_path)
                .finish(),
        }
    }
}

impl fmt::Display for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => write!(f, "Anonymous"),
            Self::UserName { username, .. } => write!(f, "UserName({})", username),
            Self::Certificate {
                certificate_path, ..
            } => write!(f, "Certificate({})", certificate_path.display()),
        }
    }
}

// =============================================================================
// EndpointDescriptor
// =============================================================================

/// Application type of the server behind an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationType {
    /// Server.
    #[default]
    Server,
    /// Client.
    Client,
    /// Client and server.
    ClientAndServer,
    /// Discovery server.
    DiscoveryServer,
}

impl fmt::Display for ApplicationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Server => "Server",
            Self::Client => "Client",
            Self::ClientAndServer => "ClientAndServer",
            Self::DiscoveryServer => "DiscoveryServer",
        })
    }
}

/// Application description of the server that published an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServerApplication {
    /// Application URI.
    pub application_uri: String,
    /// Product URI.
    pub product_uri: String,
    /// Human-readable application name.
    pub application_name: String,
    /// Application type.
    pub application_type: ApplicationType,
    /// Gateway server URI, if the server is behind a gateway.
    #[serde(default)]
    pub gateway_server_uri: Option<String>,
    /// Discovery profile URI.
    #[serde(default)]
    pub discovery_profile_uri: Option<String>,
    /// Discovery URLs.
    #[serde(default)]
    pub discovery_urls: Vec<String>,
}

/// A discovered server endpoint.
///
/// Immutable once fetched; a session is opened against exactly one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointDescriptor {
    /// Endpoint URL.
    pub endpoint_url: String,
    /// Message security mode.
    pub security_mode: SecurityMode,
    /// Security policy URI as advertised.
    pub security_policy_uri: String,
    /// Transport profile URI.
    pub transport_profile_uri: String,
    /// Relative security level; higher is more secure.
    pub security_level: u8,
    /// Server application metadata.
    pub server: ServerApplication,
    /// Server certificate, DER or PEM encoded; empty when absent.
    #[serde(default, skip_serializing)]
    pub server_certificate: Vec<u8>,
    /// Supported identity-token policies.
    pub user_identity_tokens: Vec<UserTokenPolicy>,
}

impl EndpointDescriptor {
    /// Creates a descriptor with the given security settings and no tokens.
    pub fn new(
        endpoint_url: impl Into<String>,
        security_mode: SecurityMode,
        security_policy: SecurityPolicy,
    ) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            security_mode,
            security_policy_uri: security_policy.uri().to_string(),
            transport_profile_uri:
                "http://opcfoundation.org/UA-Profile/Transport/uatcp-uasc-uabinary".to_string(),
            security_level: 0,
            server: ServerApplication::default(),
            server_certificate: Vec::new(),
            user_identity_tokens: Vec::new(),
        }
    }

    /// Sets the security level.
    pub fn with_security_level(mut self, level: u8) -> Self {
        self.security_level = level;
        self
    }

    /// Adds an identity-token policy.
    pub fn with_token(mut self, policy_id: impl Into<String>, token_type: TokenKind) -> Self {
        self.user_identity_tokens
            .push(UserTokenPolicy::new(policy_id, token_type));
        self
    }

    /// Sets the server certificate bytes.
    pub fn with_certificate(mut self, certificate: Vec<u8>) -> Self {
        self.server_certificate = certificate;
        self
    }

    /// Returns `true` if mode and policy URI match exactly.
    pub fn matches_security(&self, mode: SecurityMode, policy: SecurityPolicy) -> bool {
        self.security_mode == mode && self.security_policy_uri == policy.uri()
    }

    /// Returns the first identity-token policy for the given kind.
    pub fn token_policy_for(&self, kind: TokenKind) -> Option<&UserTokenPolicy> {
        self.user_identity_tokens
            .iter()
            .find(|t| t.token_type == kind)
    }

    /// Returns `true` if the endpoint carries a certificate.
    #[inline]
    pub fn has_certificate(&self) -> bool {
        !self.server_certificate.is_empty()
    }

    /// Returns a `Mode/Policy` label.
    pub fn security_label(&self) -> String {
        format!(
            "{}/{}",
            self.security_mode,
            SecurityPolicy::short_name(&self.security_policy_uri)
        )
    }
}

// =============================================================================
// Tests
// =============================================================================
