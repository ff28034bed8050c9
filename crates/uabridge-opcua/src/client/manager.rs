// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Session lifecycle: discovery, negotiation, authentication and close.

use std::sync::Arc;

use super::session::{ConnectionState, ConnectorStats, Session};
use super::transport::{OpcUaTransport, SessionSettings};
use crate::certificate::{CertificateInspector, ValidationPolicy};
use crate::config::InputConfig;
use crate::context::CallContext;
use crate::error::{OpcUaError, OpcUaResult};
use crate::observer::ConnectorObserver;
use crate::types::{EndpointDescriptor, SecurityMode, SecurityPolicy, TokenKind, UserTokenPolicy};

// =============================================================================
// Endpoint selection
// =============================================================================

/// Picks the endpoint to open a session on.
///
/// Only endpoints whose mode and policy match exactly are considered; there
/// is no downgrade. Among those offering a token policy for `kind`, the
/// highest security level wins and ties keep discovery order.
pub fn select_endpoint(
    endpoints: &[EndpointDescriptor],
    mode: SecurityMode,
    policy: SecurityPolicy,
    kind: TokenKind,
) -> OpcUaResult<(EndpointDescriptor, UserTokenPolicy)> {
    let matching: Vec<&EndpointDescriptor> = endpoints
        .iter()
        .filter(|e| e.matches_security(mode, policy))
        .collect();

    if matching.is_empty() {
        let mut offered: Vec<String> = endpoints.iter().map(|e| e.security_label()).collect();
        offered.sort();
        offered.dedup();
        return Err(OpcUaError::unsupported_auth(
            format!("{}/{}", mode, policy),
            offered,
        ));
    }

    let mut best: Option<(&EndpointDescriptor, &UserTokenPolicy)> = None;
    for endpoint in &matching {
        if let Some(token) = endpoint.token_policy_for(kind) {
            let better = match best {
                Some((current, _)) => endpoint.security_level > current.security_level,
                None => true,
            };
            if better {
                best = Some((endpoint, token));
            }
        }
    }

    match best {
        Some((endpoint, token)) => Ok((endpoint.clone(), token.clone())),
        None => {
            let mut offered: Vec<String> = matching
                .iter()
                .flat_map(|e| e.user_identity_tokens.iter())
                .map(|t| format!("{} identity", t.token_type))
                .collect();
            offered.sort();
            offered.dedup();
            Err(OpcUaError::unsupported_auth(
                format!("{}/{} with {} identity", mode, policy, kind),
                offered,
            ))
        }
    }
}

// =============================================================================
// ConnectionManager
// =============================================================================

/// Owns the single session of one input.
///
/// Callers serialize access; every method takes `&mut self`.
pub struct ConnectionManager {
    config: InputConfig,
    transport: Arc<dyn OpcUaTransport>,
    inspector: CertificateInspector,
    settings: SessionSettings,
    observer: Arc<dyn ConnectorObserver>,
    stats: Arc<ConnectorStats>,
    state: ConnectionState,
    session: Option<Session>,
    auth_latch: Option<OpcUaError>,
    has_connected: bool,
}

impl ConnectionManager {
    /// Creates a disconnected manager.
    pub fn new(
        config: InputConfig,
        transport: Arc<dyn OpcUaTransport>,
        observer: Arc<dyn ConnectorObserver>,
        stats: Arc<ConnectorStats>,
    ) -> Self {
        let inspector = CertificateInspector::new(ValidationPolicy::from_config(&config));
        let settings = SessionSettings::from_config(&config);
        Self {
            config,
            transport,
            inspector,
            settings,
            observer,
            stats,
            state: ConnectionState::Disconnected,
            session: None,
            auth_latch: None,
            has_connected: false,
        }
    }

    /// Current state.
    #[inline]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// The active session, if connected.
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// The latched authentication failure, if any.
    pub fn auth_latch(&self) -> Option<&OpcUaError> {
        self.auth_latch.as_ref()
    }

    /// Shared statistics.
    pub fn stats(&self) -> &Arc<ConnectorStats> {
        &self.stats
    }

    /// Fetches the endpoint list without changing state.
    pub async fn discover(&self, ctx: &CallContext) -> OpcUaResult<Vec<EndpointDescriptor>> {
        let url = self.config.endpoint.as_str();
        let endpoints = ctx
            .run("discover", self.transport.get_endpoints(url))
            .await
            .map_err(|e| as_discovery_error(url, e))?;

        if endpoints.is_empty() {
            return Err(OpcUaError::discovery(url, "server returned no endpoints"));
        }
        Ok(endpoints)
    }

    /// Connects explicitly.
    ///
    /// Clears any latched authentication failure. A no-op returning the
    /// existing session when already connected.
    pub async fn connect(&mut self, ctx: &CallContext) -> OpcUaResult<&Session> {
        if self.auth_latch.take().is_some() {
            tracing::info!(endpoint = %self.config.endpoint, "Clearing latched authentication failure");
        }
        if self.state.is_connected() && self.session.is_some() {
            return self.current_session();
        }
        self.establish(ctx, false).await
    }

    /// Returns the current session, reconnecting if needed.
    ///
    /// A latched authentication failure is returned without contacting the
    /// server.
    pub async fn ensure_connected(&mut self, ctx: &CallContext) -> OpcUaResult<&Session> {
        if self.state.is_connected() && self.session.is_some() {
            return self.current_session();
        }
        if let Some(latched) = &self.auth_latch {
            tracing::debug!(
                endpoint = %self.config.endpoint,
                "Skipping reconnect after authentication failure"
            );
            return Err(latched.clone());
        }
        let reconnect = self.has_connected;
        self.establish(ctx, reconnect).await
    }

    /// Drops the session after a channel fault.
    pub fn mark_channel_fault(&mut self, error: &OpcUaError) {
        if self.session.take().is_some() {
            self.stats.record_channel_fault();
            tracing::warn!(
                endpoint = %self.config.endpoint,
                error = %error,
                "Channel fault, session dropped"
            );
        }
        self.set_state(ConnectionState::Disconnected);
    }

    /// Closes the session, bounded by the configured close timeout and by
    /// `ctx`.
    ///
    /// Failures, timeouts and cancellation are logged; the manager always
    /// ends `Disconnected`.
    pub async fn close(&mut self, ctx: &CallContext) {
        let Some(session) = self.session.take() else {
            self.set_state(ConnectionState::Disconnected);
            return;
        };

        self.set_state(ConnectionState::Closing);
        let session_id = session.session_id();

        let close = tokio::time::timeout(self.config.close_timeout, session.transport().close());
        match ctx.run("close", async { Ok(close.await) }).await {
            Ok(Ok(Ok(()))) => {
                tracing::info!(
                    endpoint = %self.config.endpoint,
                    session_id = %session_id,
                    "Session closed"
                );
            }
            Ok(Ok(Err(e))) => {
                tracing::warn!(
                    endpoint = %self.config.endpoint,
                    session_id = %session_id,
                    error = %e,
                    "Session close failed"
                );
            }
            Ok(Err(_)) => {
                tracing::warn!(
                    endpoint = %self.config.endpoint,
                    session_id = %session_id,
                    timeout_ms = self.config.close_timeout.as_millis() as u64,
                    "Session close timed out"
                );
            }
            Err(_) => {
                tracing::warn!(
                    endpoint = %self.config.endpoint,
                    session_id = %session_id,
                    "Session close abandoned by caller"
                );
            }
        }

        self.set_state(ConnectionState::Disconnected);
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn current_session(&self) -> OpcUaResult<&Session> {
        self.session
            .as_ref()
            .ok_or_else(|| OpcUaError::channel("no active session"))
    }

    fn set_state(&mut self, new_state: ConnectionState) {
        let old_state = self.state;
        if old_state == new_state {
            return;
        }
        self.state = new_state;
        tracing::trace!(old_state = %old_state, new_state = %new_state, "Connection state changed");
        self.observer.on_state_change(old_state, new_state);
    }

    async fn establish(&mut self, ctx: &CallContext, reconnect: bool) -> OpcUaResult<&Session> {
        self.stats.record_connect_attempt();

        match self.negotiate(ctx).await {
            Ok(session) => {
                tracing::info!(
                    endpoint = %session.endpoint().endpoint_url,
                    security = %session.endpoint().security_label(),
                    credential = %session.credential_kind(),
                    session_id = %session.session_id(),
                    reconnect = reconnect,
                    "Session established"
                );
                self.session = Some(session);
                self.has_connected = true;
                self.stats.record_connect();
                if reconnect {
                    self.stats.record_reconnect();
                }
                self.set_state(ConnectionState::Connected);
                self.current_session()
            }
            Err(e) => {
                if e.is_auth_failure() {
                    self.stats.record_auth_failure();
                    self.auth_latch = Some(e.clone());
                }
                self.set_state(ConnectionState::Disconnected);
                Err(e)
            }
        }
    }

    async fn negotiate(&mut self, ctx: &CallContext) -> OpcUaResult<Session> {
        self.set_state(ConnectionState::Discovering);
        let endpoints = self.discover(ctx).await?;
        tracing::debug!(
            endpoint = %self.config.endpoint,
            count = endpoints.len(),
            "Discovered endpoints"
        );

        self.set_state(ConnectionState::Negotiating);
        let kind = self.config.credentials.kind();
        let mode = self.config.security_mode;
        let policy = self.config.security_policy;
        // Security and identity mismatches are reported before any certificate is inspected.
        select_endpoint(&endpoints, mode, policy, kind)?;

        let trusted = self.trusted_candidates(endpoints, mode, policy, kind)?;
        let (endpoint, token) = select_endpoint(&trusted, mode, policy, kind)?;

        let transport_session = ctx
            .run(
                "open_session",
                self.transport.open_session(
                    &endpoint,
                    &self.config.credentials,
                    &token.policy_id,
                    &self.settings,
                ),
            )
            .await?;

        Ok(Session::new(transport_session, endpoint, kind, token.policy_id))
    }

    /// Drops the candidates whose certificate the inspector rejects.
    ///
    /// Fails with the first rejection when no candidate survives.
    fn trusted_candidates(
        &self,
        endpoints: Vec<EndpointDescriptor>,
        mode: SecurityMode,
        policy: SecurityPolicy,
        kind: TokenKind,
    ) -> OpcUaResult<Vec<EndpointDescriptor>> {
        let mut first_rejection = None;
        let mut trusted = Vec::new();

        for endpoint in endpoints {
            if !endpoint.matches_security(mode, policy) || endpoint.token_policy_for(kind).is_none() {
                continue;
            }
            match self.inspector.check_endpoint(&endpoint) {
                Ok(_) => trusted.push(endpoint),
                Err(e) => {
                    tracing::warn!(
                        endpoint = %endpoint.endpoint_url,
                        security = %endpoint.security_label(),
                        level = endpoint.security_level,
                        error = %e,
                        "Skipping endpoint with rejected certificate"
                    );
                    if first_rejection.is_none() {
                        first_rejection = Some(e);
                    }
                }
            }
        }

        match first_rejection {
            Some(e) if trusted.is_empty() => Err(e.into()),
            _ => Ok(trusted),
        }
    }
}

fn as_discovery_error(url: &str, error: OpcUaError) -> OpcUaError {
    match error {
        OpcUaError::Channel { message, .. } => OpcUaError::discovery(url, message),
        other => other,
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("endpoint", &self.config.endpoint)
            .field("transport", &self.transport.name())
            .field("state", &self.state)
            .field("session", &self.session)
            .field("auth_latched", &self.auth_latch.is_some())
            .finish()
    }
}
