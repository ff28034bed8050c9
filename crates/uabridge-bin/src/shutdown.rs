// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Graceful shutdown coordination.
//!
//! OS signals (SIGTERM, SIGINT) cancel a root token. Every network call made
//! by a command runs under a child of that token, so an interrupt aborts an
//! in-flight discovery or read promptly and the command can close the
//! session before exiting.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uabridge_opcua::CallContext;

// =============================================================================
// ShutdownCoordinator
// =============================================================================

/// Owns the root cancellation token of the process.
///
/// # Example
///
/// ```ignore
/// use uabridge_bin::shutdown::ShutdownCoordinator;
///
/// let coordinator = ShutdownCoordinator::new();
/// coordinator.listen();
///
/// let ctx = coordinator.call_context(Some(Duration::from_secs(10)));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Creates a new shutdown coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// The root token.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Initiates shutdown.
    pub fn initiate_shutdown(&self) {
        if !self.token.is_cancelled() {
            info!("Shutdown initiated");
            self.token.cancel();
        }
    }

    /// Returns true if shutdown has been initiated.
    pub fn is_shutdown_initiated(&self) -> bool {
        self.token.is_cancelled()
    }

    /// A call context canceled on shutdown, with an optional deadline.
    pub fn call_context(&self, timeout: Option<Duration>) -> CallContext {
        let ctx = CallContext::from_token(self.token.child_token());
        match timeout {
            Some(timeout) => ctx.timeout(timeout),
            None => ctx,
        }
    }

    /// Spawns a task that initiates shutdown on the first OS signal.
    pub fn listen(&self) {
        let coordinator = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = wait_for_signal() => coordinator.initiate_shutdown(),
                _ = coordinator.token.cancelled() => {}
            }
        });
    }

    /// Sleeps for `duration` unless shutdown is initiated first.
    ///
    /// Returns `false` if shutdown interrupted the sleep.
    pub async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.token.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}

/// Resolves on SIGTERM or SIGINT (Unix) or Ctrl+C (elsewhere).
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                    result = tokio::signal::ctrl_c() => log_ctrl_c(result),
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to register SIGTERM handler");
                log_ctrl_c(tokio::signal::ctrl_c().await);
            }
        }
    }

    #[cfg(not(unix))]
    {
        log_ctrl_c(tokio::signal::ctrl_c().await);
    }
}

fn log_ctrl_c(result: std::io::Result<()>) {
    match result {
        Ok(()) => info!("Received SIGINT"),
        Err(e) => warn!(error = %e, "Failed to listen for Ctrl+C"),
    }
}

// =============================================================================
// Tests
// =============================================================================
