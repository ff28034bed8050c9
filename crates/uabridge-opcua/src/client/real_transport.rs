// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA transport backed by the `opcua` crate.
//!
//! The `opcua` client API is synchronous, so every protocol call runs on
//! `tokio::task::spawn_blocking`. A fresh client is built for each discovery
//! and each session; the session keeps its own channel afterwards.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use uabridge_opcua::{OpcUaInput, RealOpcUaTransport};
//!
//! let input = OpcUaInput::new(config, Arc::new(RealOpcUaTransport::new()))?;
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, trace};
use uuid::Uuid;

use opcua::client::prelude::{
    AttributeId, AttributeService, Client, ClientBuilder, EndpointDescription, IdentityToken,
    ReadValueId, Session as UaSession, TimestampsToReturn,
};
use opcua::sync::RwLock as UaRwLock;

use super::transport::{OpcUaTransport, ReadResult, SessionSettings, TransportSession};
use crate::certificate::CertificateError;
use crate::error::{OpcUaError, OpcUaResult};
use crate::node_id::{NodeId, NodeIdentifier};
use crate::types::{
    ApplicationType, Credentials, EndpointDescriptor, SecurityMode, ServerApplication, TokenKind,
    UserTokenPolicy,
};
use crate::value::{OpcUaValue, StatusCode};

// =============================================================================
// RealOpcUaTransport
// =============================================================================

/// Transport speaking OPC UA binary over TCP through the `opcua` crate.
#[derive(Debug, Clone, Default)]
pub struct RealOpcUaTransport {
    trust_server_certs: bool,
}

impl RealOpcUaTransport {
    /// Creates a transport that relies on the client PKI directory for trust.
    pub fn new() -> Self {
        Self::default()
    }

    /// Trusts every server certificate at the protocol-stack level.
    ///
    /// Certificate inspection by the connection manager still applies.
    pub fn trust_server_certs(mut self, trust: bool) -> Self {
        self.trust_server_certs = trust;
        self
    }

    fn build_client(&self, settings: &SessionSettings) -> OpcUaResult<Client> {
        let mut builder = ClientBuilder::new()
            .application_name(settings.application_name.clone())
            .application_uri(settings.application_uri.clone())
            .session_retry_limit(0)
            .session_timeout(duration_millis(settings.session_timeout))
            .trust_server_certs(self.trust_server_certs);

        if let Some(ref pki_dir) = settings.pki_dir {
            builder = builder.pki_dir(pki_dir.clone());
        }

        match (
            &settings.client_certificate_path,
            &settings.client_private_key_path,
        ) {
            (Some(cert), Some(key)) => {
                builder = builder
                    .certificate_path(cert.clone())
                    .private_key_path(key.clone());
            }
            _ => {
                builder = builder.create_sample_keypair(true);
            }
        }

        builder.client().ok_or_else(|| {
            OpcUaError::configuration("client", "failed to build OPC UA client")
        })
    }
}

#[async_trait]
impl OpcUaTransport for RealOpcUaTransport {
    async fn get_endpoints(&self, endpoint_url: &str) -> OpcUaResult<Vec<EndpointDescriptor>> {
        let settings = SessionSettings {
            application_name: "uabridge discovery".to_string(),
            application_uri: "urn:uabridge:opcua:discovery".to_string(),
            session_timeout: std::time::Duration::from_secs(60),
            request_timeout: std::time::Duration::from_secs(10),
            pki_dir: None,
            client_certificate_path: None,
            client_private_key_path: None,
        };
        let client = self.build_client(&settings)?;
        let url = endpoint_url.to_string();

        debug!(endpoint = %url, "Requesting endpoint list");

        let endpoints = run_blocking(move || {
            client.get_server_endpoints_from_url(url.as_str()).map_err(|status| {
                OpcUaError::discovery(url.as_str(), StatusCode::from(status.bits()).to_string())
            })
        })
        .await?;

        Ok(endpoints.iter().map(from_endpoint_description).collect())
    }

    async fn open_session(
        &self,
        endpoint: &EndpointDescriptor,
        credentials: &Credentials,
        token_policy_id: &str,
        settings: &SessionSettings,
    ) -> OpcUaResult<Box<dyn TransportSession>> {
        let mut client = self.build_client(settings)?;
        let identity = identity_token(credentials);
        let description = EndpointDescription::from((
            endpoint.endpoint_url.as_str(),
            endpoint.security_policy_uri.as_str(),
            to_message_security_mode(endpoint.security_mode),
        ));
        let url = endpoint.endpoint_url.clone();

        debug!(
            endpoint = %url,
            security = %endpoint.security_label(),
            token_policy_id = token_policy_id,
            "Opening session"
        );

        let session = run_blocking(move || {
            client
                .connect_to_endpoint(description, identity)
                .map_err(|status| classify_status(&url, status.bits()))
        })
        .await?;

        let session_id = Uuid::new_v4().to_string();
        info!(endpoint = %endpoint.endpoint_url, session_id = %session_id, "Session activated");

        Ok(Box::new(RealSession {
            session,
            session_id,
        }))
    }

    fn name(&self) -> &'static str {
        "opcua-rs"
    }
}

// =============================================================================
// RealSession
// =============================================================================

struct RealSession {
    session: Arc<UaRwLock<UaSession>>,
    session_id: String,
}

#[async_trait]
impl TransportSession for RealSession {
    fn session_id(&self) -> String {
        self.session_id.clone()
    }

    async fn read(&self, nodes: &[NodeId]) -> OpcUaResult<Vec<ReadResult>> {
        let read_value_ids = value_read_ids(nodes);

        trace!(session_id = %self.session_id, count = nodes.len(), "Reading node values");

        let session = self.session.clone();
        let values = run_blocking(move || {
            let session = session.read();
            session
                .read(&read_value_ids, TimestampsToReturn::Both, 0.0)
                .map_err(|status| {
                    let code = StatusCode::from(status.bits());
                    OpcUaError::channel_with_status(format!("read failed: {}", code), code.bits())
                })
        })
        .await?;

        if values.len() != nodes.len() {
            return Err(OpcUaError::channel(format!(
                "server returned {} results for {} nodes",
                values.len(),
                nodes.len()
            )));
        }

        Ok(nodes
            .iter()
            .zip(values.iter())
            .map(|(node, data_value)| {
                let status = StatusCode::from(
                    data_value.status.as_ref().map(|s| s.bits()).unwrap_or(0),
                );
                let value = data_value
                    .value
                    .as_ref()
                    .map(from_opcua_variant)
                    .unwrap_or_default();
                ReadResult {
                    node_id: node.clone(),
                    status_code: status,
                    value,
                    server_timestamp: data_value.server_timestamp.as_ref().map(|t| t.as_chrono()),
                    source_timestamp: data_value.source_timestamp.as_ref().map(|t| t.as_chrono()),
                }
            })
            .collect())
    }

    async fn close(&self) -> OpcUaResult<()> {
        let session = self.session.clone();
        run_blocking(move || {
            session.read().disconnect();
            Ok(())
        })
        .await
    }
}

// =============================================================================
// Conversions
// =============================================================================

async fn run_blocking<F, T>(f: F) -> OpcUaResult<T>
where
    F: FnOnce() -> OpcUaResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| OpcUaError::channel(format!("protocol task failed: {}", e)))?
}

fn duration_millis(duration: std::time::Duration) -> u32 {
    u32::try_from(duration.as_millis()).unwrap_or(u32::MAX)
}

fn classify_status(endpoint: &str, bits: u32) -> OpcUaError {
    let code = StatusCode::from(bits);
    if code.is_auth_rejection() {
        OpcUaError::authentication_with_status(endpoint, code.name(), bits)
    } else if code.is_certificate_problem() {
        OpcUaError::certificate(CertificateError::Rejected {
            status: code.to_string(),
        })
    } else {
        OpcUaError::channel_with_status(format!("session open failed: {}", code), bits)
    }
}

fn identity_token(credentials: &Credentials) -> IdentityToken {
    match credentials {
        Credentials::Anonymous => IdentityToken::Anonymous,
        Credentials::UserName { username, password } => {
            IdentityToken::UserName(username.clone(), password.clone())
        }
        Credentials::Certificate {
            certificate_path,
            private_key_path,
        } => IdentityToken::X509(certificate_path.clone(), private_key_path.clone()),
    }
}

fn to_message_security_mode(mode: SecurityMode) -> opcua::types::MessageSecurityMode {
    match mode {
        SecurityMode::None => opcua::types::MessageSecurityMode::None,
        SecurityMode::Sign => opcua::types::MessageSecurityMode::Sign,
        SecurityMode::SignAndEncrypt => opcua::types::MessageSecurityMode::SignAndEncrypt,
    }
}

fn from_message_security_mode(mode: opcua::types::MessageSecurityMode) -> SecurityMode {
    match mode {
        opcua::types::MessageSecurityMode::Sign => SecurityMode::Sign,
        opcua::types::MessageSecurityMode::SignAndEncrypt => SecurityMode::SignAndEncrypt,
        _ => SecurityMode::None,
    }
}

fn ua_string(value: &opcua::types::UAString) -> String {
    value.as_ref().to_string()
}

fn ua_optional(value: &opcua::types::UAString) -> Option<String> {
    if value.is_null() || value.as_ref().is_empty() {
        None
    } else {
        Some(value.as_ref().to_string())
    }
}

fn from_endpoint_description(e: &EndpointDescription) -> EndpointDescriptor {
    let server = ServerApplication {
        application_uri: ua_string(&e.server.application_uri),
        product_uri: ua_string(&e.server.product_uri),
        application_name: ua_string(&e.server.application_name.text),
        application_type: match e.server.application_type {
            opcua::types::ApplicationType::Client => ApplicationType::Client,
            opcua::types::ApplicationType::ClientAndServer => ApplicationType::ClientAndServer,
            opcua::types::ApplicationType::DiscoveryServer => ApplicationType::DiscoveryServer,
            _ => ApplicationType::Server,
        },
        gateway_server_uri: ua_optional(&e.server.gateway_server_uri),
        discovery_profile_uri: ua_optional(&e.server.discovery_profile_uri),
        discovery_urls: e
            .server
            .discovery_urls
            .as_ref()
            .map(|urls| urls.iter().map(ua_string).collect())
            .unwrap_or_default(),
    };

    let user_identity_tokens = e
        .user_identity_tokens
        .as_ref()
        .map(|tokens| {
            tokens
                .iter()
                .map(|t| UserTokenPolicy {
                    policy_id: ua_string(&t.policy_id),
                    token_type: match t.token_type {
                        opcua::types::UserTokenType::UserName => TokenKind::UserName,
                        opcua::types::UserTokenType::Certificate => TokenKind::Certificate,
                        opcua::types::UserTokenType::IssuedToken => TokenKind::IssuedToken,
                        _ => TokenKind::Anonymous,
                    },
                    issued_token_type: ua_optional(&t.issued_token_type),
                    issuer_endpoint_url: ua_optional(&t.issuer_endpoint_url),
                    security_policy_uri: ua_optional(&t.security_policy_uri),
                })
                .collect()
        })
        .unwrap_or_default();

    EndpointDescriptor {
        endpoint_url: ua_string(&e.endpoint_url),
        security_mode: from_message_security_mode(e.security_mode),
        security_policy_uri: ua_string(&e.security_policy_uri),
        transport_profile_uri: ua_string(&e.transport_profile_uri),
        security_level: e.security_level,
        server,
        server_certificate: e.server_certificate.value.clone().unwrap_or_default(),
        user_identity_tokens,
    }
}

/// One Value-attribute read per node, in node order.
fn value_read_ids(nodes: &[NodeId]) -> Vec<ReadValueId> {
    nodes
        .iter()
        .map(|n| ReadValueId {
            node_id: to_opcua_node_id(n),
            attribute_id: AttributeId::Value as u32,
            index_range: opcua::types::UAString::null(),
            data_encoding: opcua::types::QualifiedName::null(),
        })
        .collect()
}

fn to_opcua_node_id(node_id: &NodeId) -> opcua::types::NodeId {
    let ns = node_id.namespace_index;
    match &node_id.identifier {
        NodeIdentifier::Numeric(v) => opcua::types::NodeId::new(ns, *v),
        NodeIdentifier::String(v) => opcua::types::NodeId::new(ns, v.clone()),
        NodeIdentifier::Guid(v) => {
            opcua::types::NodeId::new(ns, opcua::types::Guid::from_bytes(*v.as_bytes()))
        }
        NodeIdentifier::Opaque(v) => {
            opcua::types::NodeId::new(ns, opcua::types::ByteString::from(v.clone()))
        }
    }
}

fn from_opcua_variant(variant: &opcua::types::Variant) -> OpcUaValue {
    use opcua::types::Variant;

    match variant {
        Variant::Empty => OpcUaValue::Null,
        Variant::Boolean(v) => OpcUaValue::Boolean(*v),
        Variant::SByte(v) => OpcUaValue::SByte(*v),
        Variant::Byte(v) => OpcUaValue::Byte(*v),
        Variant::Int16(v) => OpcUaValue::Int16(*v),
        Variant::UInt16(v) => OpcUaValue::UInt16(*v),
        Variant::Int32(v) => OpcUaValue::Int32(*v),
        Variant::UInt32(v) => OpcUaValue::UInt32(*v),
        Variant::Int64(v) => OpcUaValue::Int64(*v),
        Variant::UInt64(v) => OpcUaValue::UInt64(*v),
        Variant::Float(v) => OpcUaValue::Float(*v),
        Variant::Double(v) => OpcUaValue::Double(*v),
        Variant::String(v) => OpcUaValue::String(v.as_ref().to_string()),
        Variant::DateTime(v) => OpcUaValue::DateTime(v.as_chrono()),
        Variant::Guid(v) => OpcUaValue::Guid(Uuid::from_bytes(*v.as_bytes())),
        Variant::ByteString(v) => OpcUaValue::ByteString(v.value.clone().unwrap_or_default()),
        Variant::Array(arr) => {
            OpcUaValue::Array(arr.values.iter().map(from_opcua_variant).collect())
        }
        other => OpcUaValue::String(format!("{:?}", other)),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_read_ids_keep_node_order() {
        let nodes: Vec<NodeId> = ["ns=2;i=7", "ns=4;s=Line1.Speed"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();

        let ids = value_read_ids(&nodes);
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0].node_id, opcua::types::NodeId::new(2, 7u32));
        assert_eq!(
            ids[1].node_id,
            opcua::types::NodeId::new(4, "Line1.Speed".to_string())
        );
        assert!(ids
            .iter()
            .all(|id| id.attribute_id == AttributeId::Value as u32));
    }

    #[test]
    fn test_security_mode_mapping_roundtrips() {
        for mode in [SecurityMode::None, SecurityMode::Sign, SecurityMode::SignAndEncrypt] {
            assert_eq!(from_message_security_mode(to_message_security_mode(mode)), mode);
        }
    }

    #[test]
    fn test_certificate_credentials_map_to_x509_token() {
        let token = identity_token(&Credentials::certificate("client.pem", "client.key"));
        assert!(matches!(token, IdentityToken::X509(_, _)));
    }
}
