// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Observability hooks.

use std::time::Duration;

use serde::Serialize;

use crate::client::ConnectionState;
use crate::error::OpcUaError;
use crate::node_id::NodeId;
use crate::value::StatusCode;

/// Per-cycle summary reported after each batch read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CycleSummary {
    /// Nodes requested.
    pub requested: usize,
    /// Messages emitted.
    pub emitted: usize,
    /// Nodes with a non-Good status.
    pub bad: usize,
    /// Wall time of the read call.
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
}

/// Receives connector events.
///
/// All methods default to doing nothing.
pub trait ConnectorObserver: Send + Sync {
    /// The connection manager changed state.
    fn on_state_change(&self, _old: ConnectionState, _new: ConnectionState) {}

    /// A node returned a non-Good status.
    fn on_bad_status(&self, _node_id: &NodeId, _status: StatusCode) {}

    /// A batch read finished.
    fn on_cycle(&self, _summary: &CycleSummary) {}

    /// An operation failed.
    fn on_error(&self, _context: &str, _error: &OpcUaError) {}
}

/// Emits every event as a structured `tracing` event.
#[derive(Debug, Clone, Default)]
pub struct TracingObserver {
    endpoint: String,
}

impl TracingObserver {
    /// Creates an observer tagging events with `endpoint`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

impl ConnectorObserver for TracingObserver {
    fn on_state_change(&self, old: ConnectionState, new: ConnectionState) {
        tracing::info!(
            endpoint = %self.endpoint,
            old_state = %old,
            new_state = %new,
            "Connection state changed"
        );
    }

    fn on_bad_status(&self, node_id: &NodeId, status: StatusCode) {
        tracing::warn!(
            endpoint = %self.endpoint,
            node_id = %node_id,
            status_code = status.bits(),
            status = status.name(),
            "Node read returned non-good status"
        );
    }

    fn on_cycle(&self, summary: &CycleSummary) {
        tracing::debug!(
            endpoint = %self.endpoint,
            requested = summary.requested,
            emitted = summary.emitted,
            bad = summary.bad,
            duration_ms = summary.duration.as_millis() as u64,
            "Batch read completed"
        );
    }

    fn on_error(&self, context: &str, error: &OpcUaError) {
        error.log(context);
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ConnectorObserver for NoopObserver {}
