// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! One read request per cycle for all configured nodes.

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::session::{ConnectorStats, Session};
use crate::context::CallContext;
use crate::error::{OpcUaError, OpcUaResult};
use crate::message::OutputMessage;
use crate::node_id::NodeId;
use crate::observer::{ConnectorObserver, CycleSummary};
use crate::value::StatusCode;

/// Result of a batch read.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// Messages for Good results, in request order.
    pub messages: Vec<OutputMessage>,
    /// Nodes whose status was not Good.
    pub skipped: Vec<(NodeId, StatusCode)>,
    /// Wall time of the read call.
    pub duration: Duration,
}

impl BatchOutcome {
    fn summary(&self, requested: usize) -> CycleSummary {
        CycleSummary {
            requested,
            emitted: self.messages.len(),
            bad: self.skipped.len(),
            duration: self.duration,
        }
    }
}

/// Maps one read call onto output messages.
pub struct BatchReader {
    observer: Arc<dyn ConnectorObserver>,
    stats: Arc<ConnectorStats>,
}

impl BatchReader {
    /// Creates a reader reporting to `observer`.
    pub fn new(observer: Arc<dyn ConnectorObserver>, stats: Arc<ConnectorStats>) -> Self {
        Self { observer, stats }
    }

    /// Reads `nodes` on `session` with exactly one transport call.
    ///
    /// Good results become messages; Bad and Uncertain results are reported
    /// to the observer and skipped. A result count that differs from the
    /// request is a channel error. No nodes means no call.
    pub async fn read(
        &self,
        session: &Session,
        nodes: &[NodeId],
        ctx: &CallContext,
    ) -> OpcUaResult<BatchOutcome> {
        if nodes.is_empty() {
            return Ok(BatchOutcome::default());
        }

        let started = Instant::now();
        let results = ctx.run("read", session.transport().read(nodes)).await?;
        let duration = started.elapsed();

        if results.len() != nodes.len() {
            return Err(OpcUaError::channel(format!(
                "server returned {} results for {} nodes",
                results.len(),
                nodes.len()
            )));
        }

        let mut outcome = BatchOutcome {
            messages: Vec::with_capacity(nodes.len()),
            skipped: Vec::new(),
            duration,
        };

        for (node, result) in nodes.iter().zip(results) {
            if result.is_good() {
                outcome
                    .messages
                    .push(OutputMessage::from_read(node.clone(), result));
            } else {
                self.observer.on_bad_status(node, result.status_code);
                outcome.skipped.push((node.clone(), result.status_code));
            }
        }

        self.stats
            .record_read_cycle(outcome.messages.len(), outcome.skipped.len());
        self.observer.on_cycle(&outcome.summary(nodes.len()));

        tracing::trace!(
            session_id = %session.session_id(),
            requested = nodes.len(),
            emitted = outcome.messages.len(),
            "Batch read mapped"
        );

        Ok(outcome)
    }
}

impl std::fmt::Debug for BatchReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchReader").finish_non_exhaustive()
    }
}
