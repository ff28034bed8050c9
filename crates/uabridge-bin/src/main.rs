// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! uabridge - OPC UA batch-read input
//!
//! Main binary entry point.

use uabridge_bin::cli::Cli;
use uabridge_bin::error::report_error_and_exit;
use uabridge_bin::logging::init_logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();
    init_logging(cli.effective_log_level(), cli.log_format);

    if let Err(e) = uabridge_bin::commands::execute(cli).await {
        report_error_and_exit(e);
    }
}
