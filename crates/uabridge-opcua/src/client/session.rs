// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Session handle, connection state and connector statistics.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::transport::TransportSession;
use crate::types::{EndpointDescriptor, TokenKind};

// =============================================================================
// ConnectionState
// =============================================================================

/// Lifecycle state of the connection manager.
///
/// ```text
/// Disconnected → Discovering → Negotiating → Connected → Closing → Disconnected
///                                             Connected → Disconnected (channel fault)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No session.
    #[default]
    Disconnected,

    /// Fetching the endpoint list.
    Discovering,

    /// Selecting an endpoint and opening the session.
    Negotiating,

    /// Session is usable.
    Connected,

    /// Session is being closed.
    Closing,
}

impl ConnectionState {
    /// Returns `true` if a session is usable.
    #[inline]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns `true` if the manager is in a transitional state.
    #[inline]
    pub fn is_transitioning(&self) -> bool {
        matches!(self, Self::Discovering | Self::Negotiating | Self::Closing)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Discovering => write!(f, "Discovering"),
            Self::Negotiating => write!(f, "Negotiating"),
            Self::Connected => write!(f, "Connected"),
            Self::Closing => write!(f, "Closing"),
        }
    }
}

// =============================================================================
// Session
// =============================================================================

/// An established session, owned by the connection manager.
pub struct Session {
    transport: Box<dyn TransportSession>,
    endpoint: EndpointDescriptor,
    credential_kind: TokenKind,
    token_policy_id: String,
    created_at: DateTime<Utc>,
}

impl Session {
    pub(crate) fn new(
        transport: Box<dyn TransportSession>,
        endpoint: EndpointDescriptor,
        credential_kind: TokenKind,
        token_policy_id: String,
    ) -> Self {
        Self {
            transport,
            endpoint,
            credential_kind,
            token_policy_id,
            created_at: Utc::now(),
        }
    }

    /// The underlying transport session.
    pub fn transport(&self) -> &dyn TransportSession {
        self.transport.as_ref()
    }

    /// Server-assigned session id.
    pub fn session_id(&self) -> String {
        self.transport.session_id()
    }

    /// The negotiated endpoint.
    pub fn endpoint(&self) -> &EndpointDescriptor {
        &self.endpoint
    }

    /// The identity kind used for activation.
    pub fn credential_kind(&self) -> TokenKind {
        self.credential_kind
    }

    /// The identity-token policy id used for activation.
    pub fn token_policy_id(&self) -> &str {
        &self.token_policy_id
    }

    /// When the session was established.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("session_id", &self.session_id())
            .field("endpoint", &self.endpoint.endpoint_url)
            .field("security", &self.endpoint.security_label())
            .field("credential_kind", &self.credential_kind)
            .field("token_policy_id", &self.token_policy_id)
            .field("created_at", &self.created_at)
            .finish()
    }
}

// =============================================================================
// ConnectorStats
// =============================================================================

/// Counters shared by the connection manager, batch reader and ack handles.
#[derive(Debug, Default)]
pub struct ConnectorStats {
    connect_attempts: AtomicU64,
    connects: AtomicU64,
    reconnects: AtomicU64,
    channel_faults: AtomicU64,
    auth_failures: AtomicU64,
    read_cycles: AtomicU64,
    messages_emitted: AtomicU64,
    bad_statuses: AtomicU64,
    acks: AtomicU64,
    nacks: AtomicU64,
}

impl ConnectorStats {
    /// Creates zeroed statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a connection attempt.
    pub fn record_connect_attempt(&self) {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a successful connection.
    pub fn record_connect(&self) {
        self.connects.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an automatic reconnection.
    pub fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a channel fault.
    pub fn record_channel_fault(&self) {
        self.channel_faults.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an authentication failure.
    pub fn record_auth_failure(&self) {
        self.auth_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a completed read cycle.
    pub fn record_read_cycle(&self, emitted: usize, bad: usize) {
        self.read_cycles.fetch_add(1, Ordering::Relaxed);
        self.messages_emitted
            .fetch_add(emitted as u64, Ordering::Relaxed);
        self.bad_statuses.fetch_add(bad as u64, Ordering::Relaxed);
    }

    /// Records an acknowledged batch.
    pub fn record_ack(&self) {
        self.acks.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a negatively acknowledged batch.
    pub fn record_nack(&self) {
        self.nacks.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a point-in-time copy of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            connect_attempts: self.connect_attempts.load(Ordering::Relaxed),
            connects: self.connects.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            channel_faults: self.channel_faults.load(Ordering::Relaxed),
            auth_failures: self.auth_failures.load(Ordering::Relaxed),
            read_cycles: self.read_cycles.load(Ordering::Relaxed),
            messages_emitted: self.messages_emitted.load(Ordering::Relaxed),
            bad_statuses: self.bad_statuses.load(Ordering::Relaxed),
            acks: self.acks.load(Ordering::Relaxed),
            nacks: self.nacks.load(Ordering::Relaxed),
        }
    }

    /// Resets all counters.
    pub fn reset(&self) {
        for counter in [
            &self.connect_attempts,
            &self.connects,
            &self.reconnects,
            &self.channel_faults,
            &self.auth_failures,
            &self.read_cycles,
            &self.messages_emitted,
            &self.bad_statuses,
            &self.acks,
            &self.nacks,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Snapshot of [`ConnectorStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StatsSnapshot {
    /// Connection attempts, explicit and automatic.
    pub connect_attempts: u64,
    /// Successful connections.
    pub connects: u64,
    /// Successful automatic reconnections.
    pub reconnects: u64,
    /// Channel faults observed.
    pub channel_faults: u64,
    /// Sessions rejected for identity reasons.
    pub auth_failures: u64,
    /// Completed read cycles.
    pub read_cycles: u64,
    /// Messages handed to the host.
    pub messages_emitted: u64,
    /// Non-Good per-node statuses.
    pub bad_statuses: u64,
    /// Acknowledged batches.
    pub acks: u64,
    /// Negatively acknowledged batches.
    pub nacks: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state_display() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
        assert_eq!(ConnectionState::Negotiating.to_string(), "Negotiating");
        assert!(ConnectionState::Closing.is_transitioning());
        assert!(!ConnectionState::Connected.is_transitioning());
    }

    #[test]
    fn test_stats_snapshot_and_reset() {
        let stats = ConnectorStats::new();
        stats.record_connect_attempt();
        stats.record_connect();
        stats.record_read_cycle(3, 1);
        stats.record_read_cycle(2, 0);
        stats.record_ack();

        let snap = stats.snapshot();
        assert_eq!(snap.connect_attempts, 1);
        assert_eq!(snap.read_cycles, 2);
        assert_eq!(snap.messages_emitted, 5);
        assert_eq!(snap.bad_statuses, 1);
        assert_eq!(snap.acks, 1);

        stats.reset();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }
}
