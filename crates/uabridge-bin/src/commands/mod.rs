// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI command implementations.
//!
//! - `endpoints`: Discover and describe the server endpoints
//! - `read`: Run one batch read
//! - `run`: Read on a fixed interval until interrupted
//! - `validate`: Validate configuration file
//! - `version`: Show version information

mod endpoints;
mod read;
mod run;
mod validate;
mod version;

pub use endpoints::{endpoints, write_endpoints};
pub use read::{read, read_once};
pub use run::{run, run_loop, RunReport};
pub use validate::validate;
pub use version::version;

use std::io::Write;

use serde_json::json;
use uabridge_opcua::{MessageBatch, OpcUaInput};

use crate::cli::{Cli, Commands};
use crate::config::load_config;
use crate::error::BinResult;
use crate::transport::default_transport;

/// Executes the appropriate command based on CLI arguments.
pub async fn execute(cli: Cli) -> BinResult<()> {
    match cli.effective_command() {
        Commands::Endpoints(args) => endpoints::endpoints(&cli, args).await,
        Commands::Read(args) => read::read(&cli, args).await,
        Commands::Run(args) => run::run(&cli, args).await,
        Commands::Validate(args) => validate::validate(&cli, args),
        Commands::Version => version::version(&cli),
    }
}

/// Loads the configuration and builds the input with the default transport.
fn build_input(cli: &Cli) -> BinResult<OpcUaInput> {
    let config = load_config(&cli.config)?;
    let transport = default_transport(&config)?;
    Ok(OpcUaInput::new(config, transport)?)
}

/// Writes every message of `batch` as one JSON line.
pub fn write_batch(batch: &MessageBatch, full: bool, out: &mut impl Write) -> BinResult<()> {
    for message in &batch.messages {
        let line = if full {
            message.to_json()
        } else {
            json!({
                "node_id": message.node_id.to_string(),
                "value": message.payload(),
            })
        };
        writeln!(out, "{}", line)?;
    }
    out.flush()?;
    Ok(())
}
