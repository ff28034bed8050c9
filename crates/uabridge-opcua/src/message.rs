// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Messages handed to the host pipeline.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::client::{ConnectorStats, ReadResult};
use crate::node_id::NodeId;
use crate::value::{OpcUaValue, StatusCode};

/// Metadata key holding the node id.
pub const META_NODE_ID: &str = "opcua_node_id";
/// Metadata key holding the raw status code.
pub const META_STATUS_CODE: &str = "opcua_status_code";
/// Metadata key holding the data type name.
pub const META_DATA_TYPE: &str = "opcua_data_type";
/// Metadata key holding the server timestamp.
pub const META_SERVER_TIMESTAMP: &str = "opcua_server_timestamp";
/// Metadata key holding the source timestamp.
pub const META_SOURCE_TIMESTAMP: &str = "opcua_source_timestamp";

// =============================================================================
// OutputMessage
// =============================================================================

/// One Good read result.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputMessage {
    /// Originating node.
    pub node_id: NodeId,
    /// Typed value.
    pub value: OpcUaValue,
    /// Status code of the read.
    pub status_code: StatusCode,
    /// Server timestamp.
    pub server_timestamp: Option<DateTime<Utc>>,
    /// Source timestamp.
    pub source_timestamp: Option<DateTime<Utc>>,
}

impl OutputMessage {
    /// Builds a message for `node_id` from its read result.
    pub fn from_read(node_id: NodeId, result: ReadResult) -> Self {
        Self {
            node_id,
            value: result.value,
            status_code: result.status_code,
            server_timestamp: result.server_timestamp,
            source_timestamp: result.source_timestamp,
        }
    }

    /// Returns the value as JSON.
    pub fn payload(&self) -> Value {
        self.value.to_json()
    }

    /// Returns the message metadata as strings.
    ///
    /// Absent timestamps are omitted.
    pub fn metadata(&self) -> BTreeMap<String, String> {
        let mut meta = BTreeMap::new();
        meta.insert(META_NODE_ID.to_string(), self.node_id.to_string());
        meta.insert(
            META_STATUS_CODE.to_string(),
            self.status_code.bits().to_string(),
        );
        meta.insert(
            META_DATA_TYPE.to_string(),
            self.value.type_name().to_string(),
        );
        if let Some(ts) = self.server_timestamp {
            meta.insert(META_SERVER_TIMESTAMP.to_string(), format_timestamp(ts));
        }
        if let Some(ts) = self.source_timestamp {
            meta.insert(META_SOURCE_TIMESTAMP.to_string(), format_timestamp(ts));
        }
        meta
    }

    /// Returns the whole message as a JSON object.
    pub fn to_json(&self) -> Value {
        json!({
            "node_id": self.node_id.to_string(),
            "value": self.value.to_json(),
            "data_type": self.value.type_name(),
            "status_code": self.status_code.bits(),
            "server_timestamp": self.server_timestamp.map(format_timestamp),
            "source_timestamp": self.source_timestamp.map(format_timestamp),
        })
    }
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

// =============================================================================
// MessageBatch / AckHandle
// =============================================================================

/// Messages of one read cycle, in request order.
#[derive(Debug)]
pub struct MessageBatch {
    /// The messages.
    pub messages: Vec<OutputMessage>,
    /// Acknowledgment handle for the batch.
    pub ack: AckHandle,
}

impl MessageBatch {
    pub(crate) fn new(messages: Vec<OutputMessage>, stats: Arc<ConnectorStats>) -> Self {
        let ack = AckHandle::new(messages.len(), stats);
        Self { messages, ack }
    }

    /// Number of messages.
    #[inline]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns `true` if the batch has no messages.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Delivery acknowledgment for a [`MessageBatch`].
///
/// OPC UA reads are not replayable, so a nack is recorded and logged but
/// never causes a re-read.
#[derive(Debug)]
pub struct AckHandle {
    batch_id: Uuid,
    size: usize,
    stats: Arc<ConnectorStats>,
    resolved: bool,
}

impl AckHandle {
    fn new(size: usize, stats: Arc<ConnectorStats>) -> Self {
        Self {
            batch_id: Uuid::new_v4(),
            size,
            stats,
            resolved: false,
        }
    }

    /// Unique id of the batch.
    pub fn batch_id(&self) -> Uuid {
        self.batch_id
    }

    /// Marks the batch as delivered.
    pub fn ack(mut self) {
        self.resolved = true;
        self.stats.record_ack();
        tracing::trace!(batch_id = %self.batch_id, size = self.size, "Batch acknowledged");
    }

    /// Marks the batch as rejected downstream.
    pub fn nack(mut self, reason: &str) {
        self.resolved = true;
        self.stats.record_nack();
        tracing::warn!(
            batch_id = %self.batch_id,
            size = self.size,
            reason = reason,
            "Batch rejected downstream; values are not re-read"
        );
    }
}

impl Drop for AckHandle {
    fn drop(&mut self) {
        if !self.resolved {
            tracing::debug!(batch_id = %self.batch_id, size = self.size, "Batch dropped without ack");
        }
    }
}
