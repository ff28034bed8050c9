// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The batch input facade handed to the host pipeline.
//!
//! [`OpcUaInput`] combines the [`ConnectionManager`] and the [`BatchReader`]
//! behind the [`BatchInput`] trait. Calls on one input are serialized through
//! an owned mutex, so at most one connect, read or close is in flight.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use uabridge_opcua::{BatchInput, CallContext, InputConfig, OpcUaInput};
//!
//! let config = InputConfig::builder()
//!     .endpoint("opc.tcp://plc:4840")
//!     .node_id("ns=4;s=|var|Demo.Value")
//!     .build()?;
//!
//! let input = OpcUaInput::new(config, Arc::new(transport))?;
//! let ctx = CallContext::with_timeout(Duration::from_secs(10));
//!
//! input.connect(&ctx).await?;
//! let batch = input.read_batch(&ctx).await?;
//! for message in &batch.messages {
//!     println!("{}", message.to_json());
//! }
//! batch.ack.ack();
//! input.close(&ctx).await;
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::client::{
    BatchReader, ConnectionManager, ConnectionState, ConnectorStats, OpcUaTransport,
    StatsSnapshot,
};
use crate::config::InputConfig;
use crate::context::CallContext;
use crate::error::{OpcUaError, OpcUaResult};
use crate::message::MessageBatch;
use crate::node_id::NodeId;
use crate::observer::{ConnectorObserver, TracingObserver};
use crate::types::EndpointDescriptor;

// =============================================================================
// BatchInput
// =============================================================================

/// A source polled by the host for batches of messages.
#[async_trait]
pub trait BatchInput: Send + Sync {
    /// Establishes the session. Clears a latched authentication failure.
    async fn connect(&self, ctx: &CallContext) -> OpcUaResult<()>;

    /// Runs one read cycle, reconnecting first if the session was lost.
    async fn read_batch(&self, ctx: &CallContext) -> OpcUaResult<MessageBatch>;

    /// Closes the session. Never fails; problems are logged.
    async fn close(&self, ctx: &CallContext);
}

// =============================================================================
// OpcUaInput
// =============================================================================

/// OPC UA batch-read input.
pub struct OpcUaInput {
    config: InputConfig,
    nodes: Vec<NodeId>,
    manager: Mutex<ConnectionManager>,
    reader: BatchReader,
    observer: Arc<dyn ConnectorObserver>,
    stats: Arc<ConnectorStats>,
}

impl OpcUaInput {
    /// Creates an input reporting through a [`TracingObserver`].
    ///
    /// Validates the configuration and parses every node identifier; any
    /// failure is returned before a connection is attempted.
    pub fn new(config: InputConfig, transport: Arc<dyn OpcUaTransport>) -> OpcUaResult<Self> {
        let observer = Arc::new(TracingObserver::new(config.endpoint.clone()));
        Self::with_observer(config, transport, observer)
    }

    /// Creates an input reporting to `observer`.
    pub fn with_observer(
        config: InputConfig,
        transport: Arc<dyn OpcUaTransport>,
        observer: Arc<dyn ConnectorObserver>,
    ) -> OpcUaResult<Self> {
        config.validate()?;
        let nodes = config.parse_node_ids()?;
        let stats = Arc::new(ConnectorStats::new());

        tracing::debug!(
            endpoint = %config.endpoint,
            nodes = nodes.len(),
            security_mode = %config.security_mode,
            security_policy = %config.security_policy,
            credential = %config.credentials.kind(),
            "OPC UA input created"
        );

        let manager =
            ConnectionManager::new(config.clone(), transport, observer.clone(), stats.clone());
        let reader = BatchReader::new(observer.clone(), stats.clone());

        Ok(Self {
            config,
            nodes,
            manager: Mutex::new(manager),
            reader,
            observer,
            stats,
        })
    }

    /// The configuration.
    pub fn config(&self) -> &InputConfig {
        &self.config
    }

    /// Parsed node identifiers in configuration order.
    pub fn node_ids(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Current counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Current connection state.
    pub async fn state(&self) -> ConnectionState {
        self.manager.lock().await.state()
    }

    /// Fetches the server's endpoint list without opening a session.
    pub async fn discover_endpoints(
        &self,
        ctx: &CallContext,
    ) -> OpcUaResult<Vec<EndpointDescriptor>> {
        let manager = self.manager.lock().await;
        manager.discover(ctx).await.map_err(|e| {
            self.report("discover", &e);
            e
        })
    }

    fn report(&self, context: &str, error: &OpcUaError) {
        if !error.is_canceled() {
            self.observer.on_error(context, error);
        }
    }
}

#[async_trait]
impl BatchInput for OpcUaInput {
    async fn connect(&self, ctx: &CallContext) -> OpcUaResult<()> {
        let mut manager = self.manager.lock().await;
        match manager.connect(ctx).await {
            Ok(_) => Ok(()),
            Err(e) => {
                self.report("connect", &e);
                Err(e)
            }
        }
    }

    async fn read_batch(&self, ctx: &CallContext) -> OpcUaResult<MessageBatch> {
        if self.nodes.is_empty() {
            return Ok(MessageBatch::new(Vec::new(), self.stats.clone()));
        }

        let mut manager = self.manager.lock().await;

        let result = match manager.ensure_connected(ctx).await {
            Ok(session) => self.reader.read(session, &self.nodes, ctx).await,
            Err(e) => {
                self.report("reconnect", &e);
                return Err(e);
            }
        };

        match result {
            Ok(outcome) => Ok(MessageBatch::new(outcome.messages, self.stats.clone())),
            Err(e) => {
                if e.is_channel_fault() {
                    manager.mark_channel_fault(&e);
                }
                self.report("read", &e);
                Err(e)
            }
        }
    }

    async fn close(&self, ctx: &CallContext) {
        self.manager.lock().await.close(ctx).await;
    }
}

impl std::fmt::Debug for OpcUaInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpcUaInput")
            .field("endpoint", &self.config.endpoint)
            .field("nodes", &self.nodes.len())
            .field("stats", &self.stats.snapshot())
            .finish_non_exhaustive()
    }
}
