// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `read` command.

use std::io::Write;

use tracing::info;
use uabridge_opcua::{BatchInput, CallContext};

use super::{build_input, write_batch};
use crate::cli::{Cli, ReadArgs};
use crate::error::BinResult;
use crate::shutdown::ShutdownCoordinator;

/// Executes the `read` command: connect, read once, close.
pub async fn read(cli: &Cli, args: ReadArgs) -> BinResult<()> {
    let input = build_input(cli)?;

    let shutdown = ShutdownCoordinator::new();
    shutdown.listen();
    let timeout = args.timeout.unwrap_or(input.config().request_timeout);
    let ctx = shutdown.call_context(Some(timeout));

    let result = read_once(&input, &ctx, args.full, &mut std::io::stdout().lock()).await;
    input.close(&CallContext::new()).await;
    result.map(|_| ())
}

/// Connects if needed, reads one batch and writes it to `out`.
///
/// Returns the number of messages written. The input stays open.
pub async fn read_once(
    input: &dyn BatchInput,
    ctx: &CallContext,
    full: bool,
    out: &mut impl Write,
) -> BinResult<usize> {
    input.connect(ctx).await?;
    let batch = input.read_batch(ctx).await?;

    let count = batch.len();
    write_batch(&batch, full, out)?;
    batch.ack.ack();

    info!(messages = count, "Read complete");
    Ok(count)
}
