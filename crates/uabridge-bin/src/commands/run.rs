// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `run` command.
//!
//! Reads the configured nodes on a fixed interval. Link-level failures
//! (discovery, channel faults, expired deadlines) are logged and the next
//! tick reconnects. Rejected credentials, certificate problems and bad
//! configuration stop the loop, since retrying cannot fix them.

use std::io::Write;
use std::time::Duration;

use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use uabridge_opcua::{BatchInput, CallContext, OpcUaError};

use super::{build_input, write_batch};
use crate::cli::{Cli, RunArgs};
use crate::error::BinResult;
use crate::shutdown::ShutdownCoordinator;

/// Totals of one `run` invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Cycles attempted.
    pub cycles: u64,
    /// Cycles that failed and were retried on the next tick.
    pub failed_cycles: u64,
    /// Messages written.
    pub messages: u64,
}

/// Executes the `run` command.
pub async fn run(cli: &Cli, args: RunArgs) -> BinResult<()> {
    let input = build_input(cli)?;
    let request_timeout = input.config().request_timeout;

    info!(
        endpoint = %input.config().endpoint,
        nodes = input.node_ids().len(),
        interval = ?args.interval,
        "Starting read loop"
    );

    let shutdown = ShutdownCoordinator::new();
    shutdown.listen();

    let result = run_loop(
        &input,
        &shutdown,
        &args,
        request_timeout,
        &mut std::io::stdout().lock(),
    )
    .await;

    // A fresh context: shutdown cancels the root token but the close must still run.
    input.close(&CallContext::new()).await;

    let report = result?;
    info!(
        cycles = report.cycles,
        failed_cycles = report.failed_cycles,
        messages = report.messages,
        stats = ?input.stats(),
        "Read loop stopped"
    );
    Ok(())
}

/// Drives read cycles until shutdown, the cycle limit, or a fatal error.
///
/// The input is left open; the caller closes it.
pub async fn run_loop(
    input: &dyn BatchInput,
    shutdown: &ShutdownCoordinator,
    args: &RunArgs,
    request_timeout: Duration,
    out: &mut impl Write,
) -> BinResult<RunReport> {
    let mut report = RunReport::default();

    // Connect up front so bad credentials fail before the first tick.
    let ctx = shutdown.call_context(Some(request_timeout));
    if let Err(e) = input.connect(&ctx).await {
        if is_fatal(&e) {
            return Err(e.into());
        }
        if shutdown.is_shutdown_initiated() {
            return Ok(report);
        }
        warn!(error_code = %e.error_code(), "Initial connect failed; retrying on the first cycle");
    }

    let mut ticker = tokio::time::interval(args.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if args.cycles.is_some_and(|limit| report.cycles >= limit) {
            break;
        }

        tokio::select! {
            _ = shutdown.token().cancelled() => break,
            _ = ticker.tick() => {}
        }

        report.cycles += 1;
        let ctx = shutdown.call_context(Some(request_timeout));

        match input.read_batch(&ctx).await {
            Ok(batch) => {
                report.messages += batch.len() as u64;
                match write_batch(&batch, args.full, out) {
                    Ok(()) => batch.ack.ack(),
                    Err(e) => {
                        batch.ack.nack(&e.to_string());
                        return Err(e);
                    }
                }
            }
            Err(e) if e.is_canceled() && shutdown.is_shutdown_initiated() => break,
            Err(e) if is_fatal(&e) => {
                e.log("run");
                return Err(e.into());
            }
            Err(e) => {
                report.failed_cycles += 1;
                e.log("run");

                // The next tick is one interval away; stretch it to the
                // error's retry delay when that is longer.
                let backoff = e
                    .suggested_retry_delay()
                    .and_then(|delay| delay.checked_sub(args.interval));
                if let Some(extra) = backoff {
                    if !shutdown.sleep(extra).await {
                        break;
                    }
                }
            }
        }
    }

    Ok(report)
}

fn is_fatal(error: &OpcUaError) -> bool {
    !error.is_transient()
}
