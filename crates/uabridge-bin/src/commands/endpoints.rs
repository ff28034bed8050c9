// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `endpoints` command.

use std::io::Write;

use serde_json::json;
use uabridge_opcua::{describe_endpoint, select_endpoint, EndpointDescriptor, InputConfig};

use super::build_input;
use crate::cli::{Cli, EndpointsArgs, OutputFormat};
use crate::error::BinResult;
use crate::shutdown::ShutdownCoordinator;

/// Executes the `endpoints` command.
pub async fn endpoints(cli: &Cli, args: EndpointsArgs) -> BinResult<()> {
    let input = build_input(cli)?;

    let shutdown = ShutdownCoordinator::new();
    shutdown.listen();
    let ctx = shutdown.call_context(Some(input.config().request_timeout));

    let endpoints = input.discover_endpoints(&ctx).await?;
    write_endpoints(input.config(), &endpoints, args.format, &mut std::io::stdout().lock())
}

/// Writes a description of every endpoint, marking the one the configured
/// security settings and credentials would select.
pub fn write_endpoints(
    config: &InputConfig,
    endpoints: &[EndpointDescriptor],
    format: OutputFormat,
    out: &mut impl Write,
) -> BinResult<()> {
    let selected = select_endpoint(
        endpoints,
        config.security_mode,
        config.security_policy,
        config.credentials.kind(),
    )
    .ok()
    .and_then(|(chosen, token)| {
        endpoints
            .iter()
            .position(|endpoint| *endpoint == chosen)
            .map(|index| (index, token.policy_id))
    });

    let is_selected = |index: usize| selected.as_ref().is_some_and(|(chosen, _)| *chosen == index);

    match format {
        OutputFormat::Text => {
            writeln!(out, "Server: {} ({} endpoints)", config.endpoint, endpoints.len())?;
            for (index, endpoint) in endpoints.iter().enumerate() {
                writeln!(out)?;
                writeln!(out, "{}", describe_endpoint(endpoint))?;
                if is_selected(index) {
                    writeln!(out, "  -> selected for {} credentials", config.credentials.kind())?;
                }
            }
            if selected.is_none() {
                writeln!(out)?;
                writeln!(
                    out,
                    "No endpoint matches {}/{} with {} credentials",
                    config.security_mode,
                    config.security_policy,
                    config.credentials.kind()
                )?;
            }
        }
        OutputFormat::Json => {
            let entries: Vec<_> = endpoints
                .iter()
                .enumerate()
                .map(|(index, endpoint)| {
                    json!({
                        "selected": is_selected(index),
                        "endpoint": describe_endpoint(endpoint),
                    })
                })
                .collect();
            let output = json!({
                "server": config.endpoint,
                "endpoints": entries,
                "token_policy": selected.map(|(_, policy_id)| policy_id),
            });
            serde_json::to_writer_pretty(&mut *out, &output)?;
            writeln!(out)?;
        }
    }

    out.flush()?;
    Ok(())
}
