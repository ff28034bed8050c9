// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Caller-supplied cancellation and deadline.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{OpcUaError, OpcUaResult};

/// Cancellation signal and optional deadline for one call.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use uabridge_opcua::context::CallContext;
///
/// let ctx = CallContext::with_timeout(Duration::from_secs(5));
/// assert!(ctx.deadline().is_some());
/// ctx.cancel();
/// assert!(ctx.is_canceled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    /// A context that is never canceled and has no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// A context bound to an existing token.
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// A context expiring `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new().timeout(timeout)
    }

    /// Sets the deadline to `timeout` from now.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Sets an absolute deadline.
    pub fn deadline_at(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Returns the deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the cancellation token.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Cancels the token.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns `true` if the token is canceled or the deadline has passed.
    pub fn is_canceled(&self) -> bool {
        self.token.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Runs `operation` until it completes, the token is canceled, or the
    /// deadline passes, whichever happens first.
    pub async fn run<F, T>(&self, name: &'static str, operation: F) -> OpcUaResult<T>
    where
        F: Future<Output = OpcUaResult<T>>,
    {
        if self.is_canceled() {
            return Err(OpcUaError::canceled(name));
        }

        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.token.cancelled() => {
                tracing::debug!(operation = name, "Operation canceled by caller");
                Err(OpcUaError::canceled(name))
            }
            _ = deadline => {
                tracing::debug!(operation = name, "Operation deadline expired");
                Err(OpcUaError::canceled(name))
            }
            result = operation => result,
        }
    }
}
