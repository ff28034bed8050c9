// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Command tests against a scripted transport.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use uabridge_bin::cli::{OutputFormat, RunArgs};
use uabridge_bin::commands::{read_once, run_loop, write_endpoints, RunReport};
use uabridge_bin::ShutdownCoordinator;
use uabridge_opcua::{
    BatchInput, CallContext, Credentials, EndpointDescriptor, InputConfig, NodeId, OpcUaError,
    OpcUaInput, OpcUaResult, OpcUaTransport, OpcUaValue, ReadResult, SecurityMode,
    SecurityPolicy, SessionSettings, StatusCode, TokenKind, TransportSession,
};

const ENDPOINT: &str = "opc.tcp://plc:4840";

// =============================================================================
// Scripted transport
// =============================================================================

#[derive(Default)]
struct State {
    reject_password: bool,
    read_failures: AtomicUsize,
    sessions: AtomicUsize,
}

#[derive(Clone, Default)]
struct ScriptedTransport {
    state: Arc<State>,
}

impl ScriptedTransport {
    fn rejecting() -> Self {
        Self {
            state: Arc::new(State {
                reject_password: true,
                ..Default::default()
            }),
        }
    }

    fn fail_reads(&self, count: usize) {
        self.state.read_failures.store(count, Ordering::SeqCst);
    }

    fn sessions(&self) -> usize {
        self.state.sessions.load(Ordering::SeqCst)
    }
}

fn endpoint() -> EndpointDescriptor {
    EndpointDescriptor::new(ENDPOINT, SecurityMode::None, SecurityPolicy::None)
        .with_token("anon", TokenKind::Anonymous)
        .with_token("user", TokenKind::UserName)
}

#[async_trait]
impl OpcUaTransport for ScriptedTransport {
    async fn get_endpoints(&self, _endpoint_url: &str) -> OpcUaResult<Vec<EndpointDescriptor>> {
        Ok(vec![endpoint()])
    }

    async fn open_session(
        &self,
        endpoint: &EndpointDescriptor,
        _credentials: &Credentials,
        _token_policy_id: &str,
        _settings: &SessionSettings,
    ) -> OpcUaResult<Box<dyn TransportSession>> {
        if self.state.reject_password {
            return Err(OpcUaError::authentication_with_status(
                endpoint.endpoint_url.clone(),
                "BadUserAccessDenied",
                StatusCode::BAD_USER_ACCESS_DENIED.bits(),
            ));
        }
        let id = self.state.sessions.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Box::new(ScriptedSession {
            id,
            state: self.state.clone(),
        }))
    }
}

struct ScriptedSession {
    id: usize,
    state: Arc<State>,
}

#[async_trait]
impl TransportSession for ScriptedSession {
    fn session_id(&self) -> String {
        format!("session-{}", self.id)
    }

    async fn read(&self, nodes: &[NodeId]) -> OpcUaResult<Vec<ReadResult>> {
        let failures = &self.state.read_failures;
        if failures.load(Ordering::SeqCst) > 0 {
            failures.fetch_sub(1, Ordering::SeqCst);
            return Err(OpcUaError::channel("connection reset by peer"));
        }
        Ok(nodes
            .iter()
            .map(|node| ReadResult::good(node.clone(), OpcUaValue::Double(1.5)))
            .collect())
    }

    async fn close(&self) -> OpcUaResult<()> {
        Ok(())
    }
}

// =============================================================================
// Fixtures
// =============================================================================

fn config() -> InputConfig {
    InputConfig::builder()
        .endpoint(ENDPOINT)
        .credentials(Credentials::user_name("root", "secret"))
        .node_ids(["ns=2;i=7", "ns=4;s=Line1.Speed"])
        .close_timeout(Duration::from_millis(100))
        .build()
        .unwrap()
}

fn input(transport: &ScriptedTransport) -> OpcUaInput {
    OpcUaInput::new(config(), Arc::new(transport.clone())).unwrap()
}

fn run_args(cycles: u64) -> RunArgs {
    RunArgs {
        interval: Duration::from_millis(100),
        cycles: Some(cycles),
        full: false,
    }
}

fn lines(out: &[u8]) -> Vec<Value> {
    std::str::from_utf8(out)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

// =============================================================================
// read
// =============================================================================

#[tokio::test]
async fn test_read_once_writes_json_lines() {
    let transport = ScriptedTransport::default();
    let input = input(&transport);
    let ctx = CallContext::with_timeout(Duration::from_secs(5));

    let mut out = Vec::new();
    let count = read_once(&input, &ctx, false, &mut out).await.unwrap();
    assert_eq!(count, 2);

    let lines = lines(&out);
    assert_eq!(lines[0]["node_id"], "ns=2;i=7");
    assert_eq!(lines[0]["value"], 1.5);
    assert_eq!(lines[1]["node_id"], "ns=4;s=Line1.Speed");
    assert_eq!(input.stats().acks, 1);

    input.close(&CallContext::new()).await;
}

#[tokio::test]
async fn test_read_once_full_includes_metadata() {
    let transport = ScriptedTransport::default();
    let input = input(&transport);
    let ctx = CallContext::with_timeout(Duration::from_secs(5));

    let mut out = Vec::new();
    read_once(&input, &ctx, true, &mut out).await.unwrap();

    let lines = lines(&out);
    assert_eq!(lines[0]["data_type"], "Double");
    assert_eq!(lines[0]["status_code"], 0);
    assert!(lines[0]["server_timestamp"].is_string());
}

// =============================================================================
// run
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_run_loop_stops_at_cycle_limit() {
    let transport = ScriptedTransport::default();
    let input = input(&transport);
    let shutdown = ShutdownCoordinator::new();

    let mut out = Vec::new();
    let report = run_loop(&input, &shutdown, &run_args(3), Duration::from_secs(1), &mut out)
        .await
        .unwrap();

    assert_eq!(
        report,
        RunReport {
            cycles: 3,
            failed_cycles: 0,
            messages: 6,
        }
    );
    assert_eq!(lines(&out).len(), 6);
    assert_eq!(transport.sessions(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_run_loop_recovers_from_channel_fault() {
    let transport = ScriptedTransport::default();
    transport.fail_reads(1);
    let input = input(&transport);
    let shutdown = ShutdownCoordinator::new();

    let mut out = Vec::new();
    let report = run_loop(&input, &shutdown, &run_args(3), Duration::from_secs(1), &mut out)
        .await
        .unwrap();

    assert_eq!(report.cycles, 3);
    assert_eq!(report.failed_cycles, 1);
    assert_eq!(report.messages, 4);
    assert_eq!(transport.sessions(), 2);
    assert_eq!(input.stats().reconnects, 1);
}

#[tokio::test(start_paused = true)]
async fn test_run_loop_stops_on_rejected_credentials() {
    let transport = ScriptedTransport::rejecting();
    let input = input(&transport);
    let shutdown = ShutdownCoordinator::new();

    let mut out = Vec::new();
    let err = run_loop(&input, &shutdown, &run_args(5), Duration::from_secs(1), &mut out)
        .await
        .unwrap_err();

    assert_eq!(err.exit_code(), 5);
    assert!(out.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_run_loop_exits_on_shutdown() {
    let transport = ScriptedTransport::default();
    let input = input(&transport);
    let shutdown = ShutdownCoordinator::new();
    shutdown.initiate_shutdown();

    let mut out = Vec::new();
    let args = RunArgs {
        cycles: None,
        ..run_args(0)
    };
    let report = run_loop(&input, &shutdown, &args, Duration::from_secs(1), &mut out)
        .await
        .unwrap();

    assert_eq!(report.cycles, 0);
    assert_eq!(transport.sessions(), 0);
}

// =============================================================================
// endpoints
// =============================================================================

#[test]
fn test_write_endpoints_marks_selection() {
    let mut out = Vec::new();
    write_endpoints(&config(), &[endpoint()], OutputFormat::Text, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("Endpoint: opc.tcp://plc:4840"));
    assert!(text.contains("-> selected for"));

    let mut out = Vec::new();
    write_endpoints(&config(), &[endpoint()], OutputFormat::Json, &mut out).unwrap();
    let value: Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(value["endpoints"][0]["selected"], true);
    assert_eq!(value["token_policy"], "user");
}

#[test]
fn test_write_endpoints_marks_only_the_chosen_endpoint() {
    let anonymous_only = EndpointDescriptor::new(ENDPOINT, SecurityMode::None, SecurityPolicy::None)
        .with_security_level(4)
        .with_token("anon", TokenKind::Anonymous);
    let low = endpoint().with_security_level(1);
    let high = endpoint().with_security_level(3);
    let endpoints = [anonymous_only, low, high];

    let mut out = Vec::new();
    write_endpoints(&config(), &endpoints, OutputFormat::Json, &mut out).unwrap();
    let value: Value = serde_json::from_slice(&out).unwrap();
    let marks: Vec<bool> = value["endpoints"]
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["selected"].as_bool().unwrap())
        .collect();
    assert_eq!(marks, vec![false, false, true]);

    let mut out = Vec::new();
    write_endpoints(&config(), &endpoints, OutputFormat::Text, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert_eq!(text.matches("-> selected for").count(), 1);
}

#[test]
fn test_write_endpoints_without_match() {
    let secured = EndpointDescriptor::new(
        ENDPOINT,
        SecurityMode::SignAndEncrypt,
        SecurityPolicy::Basic256Sha256,
    )
    .with_token("user", TokenKind::UserName);

    let mut out = Vec::new();
    write_endpoints(&config(), &[secured], OutputFormat::Text, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("No endpoint matches"));
    assert!(!text.contains("-> selected"));
}
