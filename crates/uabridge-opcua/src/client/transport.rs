// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA transport abstraction layer.
//!
//! The protocol stack (secure channel handshake, framing, service
//! marshaling) is consumed through these traits so the connection manager
//! and batch reader can be exercised without a server.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::InputConfig;
use crate::error::OpcUaResult;
use crate::node_id::NodeId;
use crate::types::{Credentials, EndpointDescriptor};
use crate::value::{OpcUaValue, StatusCode};

// =============================================================================
// ReadResult
// =============================================================================

/// Per-node outcome of a read.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadResult {
    /// The node that was read.
    pub node_id: NodeId,

    /// Status code of the read.
    pub status_code: StatusCode,

    /// Value; `Null` when the status is Bad.
    pub value: OpcUaValue,

    /// Server timestamp.
    pub server_timestamp: Option<DateTime<Utc>>,

    /// Source timestamp.
    pub source_timestamp: Option<DateTime<Utc>>,
}

impl ReadResult {
    /// Creates a Good result stamped with the current time.
    pub fn good(node_id: NodeId, value: OpcUaValue) -> Self {
        Self {
            node_id,
            status_code: StatusCode::GOOD,
            value,
            server_timestamp: Some(Utc::now()),
            source_timestamp: None,
        }
    }

    /// Creates a result with the given non-Good status and no value.
    pub fn failure(node_id: NodeId, status_code: StatusCode) -> Self {
        Self {
            node_id,
            status_code,
            value: OpcUaValue::Null,
            server_timestamp: Some(Utc::now()),
            source_timestamp: None,
        }
    }

    /// Sets both timestamps.
    pub fn with_timestamps(
        mut self,
        server: Option<DateTime<Utc>>,
        source: Option<DateTime<Utc>>,
    ) -> Self {
        self.server_timestamp = server;
        self.source_timestamp = source;
        self
    }

    /// Returns `true` if the status is Good.
    #[inline]
    pub fn is_good(&self) -> bool {
        self.status_code.is_good()
    }
}

// =============================================================================
// SessionSettings
// =============================================================================

/// Client-side parameters for opening a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    /// Client application name.
    pub application_name: String,
    /// Client application URI.
    pub application_uri: String,
    /// Requested session timeout.
    pub session_timeout: Duration,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// PKI directory of the protocol stack.
    pub pki_dir: Option<PathBuf>,
    /// Client application instance certificate.
    pub client_certificate_path: Option<PathBuf>,
    /// Client application instance private key.
    pub client_private_key_path: Option<PathBuf>,
}

impl SessionSettings {
    /// Derives settings from the input configuration.
    pub fn from_config(config: &InputConfig) -> Self {
        Self {
            application_name: config.application_name.clone(),
            application_uri: config.effective_application_uri(),
            session_timeout: config.session_timeout,
            request_timeout: config.request_timeout,
            pki_dir: config.pki_dir.clone(),
            client_certificate_path: config.client_certificate_path.clone(),
            client_private_key_path: config.client_private_key_path.clone(),
        }
    }
}

// =============================================================================
// Transport traits
// =============================================================================

/// Entry point into an OPC UA protocol stack.
///
/// Errors must be classified: network failures as `Discovery` (during
/// endpoint discovery) or `Channel`, rejected identities as
/// `Authentication`, certificate rejections as `Certificate`.
#[async_trait]
pub trait OpcUaTransport: Send + Sync {
    /// Fetches the endpoint list published at `endpoint_url`.
    async fn get_endpoints(&self, endpoint_url: &str) -> OpcUaResult<Vec<EndpointDescriptor>>;

    /// Opens a secure channel and an activated session on `endpoint`.
    ///
    /// `token_policy_id` is the id of the endpoint's identity-token policy
    /// matching `credentials`.
    async fn open_session(
        &self,
        endpoint: &EndpointDescriptor,
        credentials: &Credentials,
        token_policy_id: &str,
        settings: &SessionSettings,
    ) -> OpcUaResult<Box<dyn TransportSession>>;

    /// Short name used in logs.
    fn name(&self) -> &'static str {
        "opcua"
    }
}

/// An open, activated session.
#[async_trait]
pub trait TransportSession: Send + Sync {
    /// Server-assigned session id, for logs.
    fn session_id(&self) -> String;

    /// Reads the Value attribute of every node in one service call.
    ///
    /// Returns one result per node in request order, or an error if the
    /// call as a whole failed.
    async fn read(&self, nodes: &[NodeId]) -> OpcUaResult<Vec<ReadResult>>;

    /// Closes the session and its secure channel.
    async fn close(&self) -> OpcUaResult<()>;
}
