// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Scripted in-memory OPC UA server shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use uabridge_opcua::client::{ConnectionState, ReadResult, SessionSettings, TransportSession};
use uabridge_opcua::observer::{ConnectorObserver, CycleSummary};
use uabridge_opcua::{
    Credentials, EndpointDescriptor, InputConfig, NodeId, OpcUaError, OpcUaResult,
    OpcUaTransport, OpcUaValue, SecurityMode, SecurityPolicy, StatusCode, TokenKind,
};

/// Endpoint used throughout the tests.
pub const ENDPOINT: &str = "opc.tcp://host:4840";

/// Demo node read in the end-to-end scenario.
pub const DEMO_NODE: &str = "ns=4;s=|var|Demo.Value";

// =============================================================================
// MockTransport
// =============================================================================

#[derive(Default)]
struct ServerState {
    endpoints: Vec<EndpointDescriptor>,
    users: HashMap<String, String>,
    values: HashMap<NodeId, (StatusCode, OpcUaValue)>,
    discovery_failures: VecDeque<OpcUaError>,
    read_failures: VecDeque<OpcUaError>,
    read_delay: Option<Duration>,
    close_delay: Option<Duration>,
    truncate_results: bool,
    read_sessions: Vec<String>,
    opened: Vec<OpenedSession>,
}

/// What the connector asked for when opening a session.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenedSession {
    pub security_level: u8,
    pub token_policy_id: String,
    pub credential_kind: TokenKind,
}

/// In-memory server counting every protocol call.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<ServerState>>,
    get_endpoints_calls: Arc<AtomicUsize>,
    open_session_calls: Arc<AtomicUsize>,
    read_calls: Arc<AtomicUsize>,
    close_calls: Arc<AtomicUsize>,
    next_session: Arc<AtomicU64>,
}

impl MockTransport {
    /// A server with one None/None endpoint offering Anonymous and UserName,
    /// accepting `root`/`secret`.
    pub fn demo() -> Self {
        let transport = Self::default();
        transport.set_endpoints(vec![demo_endpoint()]);
        transport.add_user("root", "secret");
        transport
    }

    pub fn set_endpoints(&self, endpoints: Vec<EndpointDescriptor>) {
        self.state.lock().unwrap().endpoints = endpoints;
    }

    pub fn add_user(&self, username: &str, password: &str) {
        self.state
            .lock()
            .unwrap()
            .users
            .insert(username.to_string(), password.to_string());
    }

    pub fn set_value(&self, node: &str, value: OpcUaValue) {
        self.set_status(node, StatusCode::GOOD, value);
    }

    pub fn set_status(&self, node: &str, status: StatusCode, value: OpcUaValue) {
        let node: NodeId = node.parse().unwrap();
        self.state.lock().unwrap().values.insert(node, (status, value));
    }

    pub fn fail_next_discovery(&self, error: OpcUaError) {
        self.state.lock().unwrap().discovery_failures.push_back(error);
    }

    pub fn fail_next_read(&self, error: OpcUaError) {
        self.state.lock().unwrap().read_failures.push_back(error);
    }

    pub fn set_read_delay(&self, delay: Option<Duration>) {
        self.state.lock().unwrap().read_delay = delay;
    }

    pub fn set_close_delay(&self, delay: Option<Duration>) {
        self.state.lock().unwrap().close_delay = delay;
    }

    pub fn truncate_results(&self, truncate: bool) {
        self.state.lock().unwrap().truncate_results = truncate;
    }

    pub fn get_endpoints_calls(&self) -> usize {
        self.get_endpoints_calls.load(Ordering::SeqCst)
    }

    pub fn open_session_calls(&self) -> usize {
        self.open_session_calls.load(Ordering::SeqCst)
    }

    pub fn read_calls(&self) -> usize {
        self.read_calls.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    /// Every accepted or attempted session open, in call order.
    pub fn opened(&self) -> Vec<OpenedSession> {
        self.state.lock().unwrap().opened.clone()
    }

    /// Session id of every read call, in call order.
    pub fn read_sessions(&self) -> Vec<String> {
        self.state.lock().unwrap().read_sessions.clone()
    }
}

#[async_trait]
impl OpcUaTransport for MockTransport {
    async fn get_endpoints(&self, _endpoint_url: &str) -> OpcUaResult<Vec<EndpointDescriptor>> {
        self.get_endpoints_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.discovery_failures.pop_front() {
            return Err(error);
        }
        Ok(state.endpoints.clone())
    }

    async fn open_session(
        &self,
        endpoint: &EndpointDescriptor,
        credentials: &Credentials,
        token_policy_id: &str,
        _settings: &SessionSettings,
    ) -> OpcUaResult<Box<dyn TransportSession>> {
        self.open_session_calls.fetch_add(1, Ordering::SeqCst);

        assert!(
            endpoint
                .user_identity_tokens
                .iter()
                .any(|t| t.policy_id == token_policy_id),
            "token policy {token_policy_id} not offered by the endpoint"
        );
        self.state.lock().unwrap().opened.push(OpenedSession {
            security_level: endpoint.security_level,
            token_policy_id: token_policy_id.to_string(),
            credential_kind: credentials.kind(),
        });

        if let Credentials::UserName { username, password } = credentials {
            let accepted = self
                .state
                .lock()
                .unwrap()
                .users
                .get(username)
                .is_some_and(|p| p == password);
            if !accepted {
                return Err(OpcUaError::authentication_with_status(
                    &endpoint.endpoint_url,
                    "BadUserAccessDenied",
                    StatusCode::BAD_USER_ACCESS_DENIED.bits(),
                ));
            }
        }

        let id = self.next_session.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Box::new(MockSession {
            id: format!("ns=1;i={id}"),
            transport: self.clone(),
        }))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

struct MockSession {
    id: String,
    transport: MockTransport,
}

#[async_trait]
impl TransportSession for MockSession {
    fn session_id(&self) -> String {
        self.id.clone()
    }

    async fn read(&self, nodes: &[NodeId]) -> OpcUaResult<Vec<ReadResult>> {
        self.transport.read_calls.fetch_add(1, Ordering::SeqCst);

        let delay = {
            let mut state = self.transport.state.lock().unwrap();
            state.read_sessions.push(self.id.clone());
            if let Some(error) = state.read_failures.pop_front() {
                return Err(error);
            }
            state.read_delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.transport.state.lock().unwrap();
        let now = Utc::now();
        let mut results: Vec<ReadResult> = nodes
            .iter()
            .map(|node| match state.values.get(node) {
                Some((status, value)) if status.is_good() => {
                    ReadResult::good(node.clone(), value.clone()).with_timestamps(Some(now), None)
                }
                Some((status, _)) => ReadResult::failure(node.clone(), *status),
                None => ReadResult::failure(node.clone(), StatusCode::BAD_NODE_ID_UNKNOWN),
            })
            .collect();

        if state.truncate_results {
            results.pop();
        }
        Ok(results)
    }

    async fn close(&self) -> OpcUaResult<()> {
        self.transport.close_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.transport.state.lock().unwrap().close_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }
}

// =============================================================================
// RecordingObserver
// =============================================================================

/// Observer keeping every event for assertions.
#[derive(Default)]
pub struct RecordingObserver {
    pub transitions: Mutex<Vec<(ConnectionState, ConnectionState)>>,
    pub bad_statuses: Mutex<Vec<(NodeId, StatusCode)>>,
    pub cycles: Mutex<Vec<CycleSummary>>,
    pub errors: Mutex<Vec<(String, String)>>,
}

impl RecordingObserver {
    pub fn states(&self) -> Vec<ConnectionState> {
        self.transitions.lock().unwrap().iter().map(|(_, new)| *new).collect()
    }

    pub fn error_codes(&self) -> Vec<String> {
        self.errors.lock().unwrap().iter().map(|(_, code)| code.clone()).collect()
    }
}

impl ConnectorObserver for RecordingObserver {
    fn on_state_change(&self, old: ConnectionState, new: ConnectionState) {
        self.transitions.lock().unwrap().push((old, new));
    }

    fn on_bad_status(&self, node_id: &NodeId, status: StatusCode) {
        self.bad_statuses.lock().unwrap().push((node_id.clone(), status));
    }

    fn on_cycle(&self, summary: &CycleSummary) {
        self.cycles.lock().unwrap().push(*summary);
    }

    fn on_error(&self, context: &str, error: &OpcUaError) {
        self.errors
            .lock()
            .unwrap()
            .push((context.to_string(), error.error_code().to_string()));
    }
}

// =============================================================================
// Fixtures
// =============================================================================

pub fn demo_endpoint() -> EndpointDescriptor {
    EndpointDescriptor::new(ENDPOINT, SecurityMode::None, SecurityPolicy::None)
        .with_token("anonymous", TokenKind::Anonymous)
        .with_token("username", TokenKind::UserName)
}

pub fn config(credentials: Credentials, nodes: &[&str]) -> InputConfig {
    InputConfig::builder()
        .endpoint(ENDPOINT)
        .credentials(credentials)
        .node_ids(nodes.iter().copied())
        .close_timeout(Duration::from_millis(200))
        .build()
        .unwrap()
}

pub fn root_config(nodes: &[&str]) -> InputConfig {
    config(Credentials::user_name("root", "secret"), nodes)
}
