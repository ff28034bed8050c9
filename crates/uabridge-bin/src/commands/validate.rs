// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `validate` command.

use std::io::Write;
use std::path::Path;

use serde_json::{json, Value};
use uabridge_opcua::{Credentials, InputConfig};

use crate::cli::{Cli, OutputFormat, ValidateArgs};
use crate::config::load_config;
use crate::error::BinResult;

/// Executes the `validate` command to validate configuration.
pub fn validate(cli: &Cli, args: ValidateArgs) -> BinResult<()> {
    let config = load_config(&cli.config)
        .map_err(|e| e.with_context("Configuration validation failed"))?;
    write_report(&cli.config, &config, &args, &mut std::io::stdout().lock())
}

/// Writes the validation report for an already loaded configuration.
pub(crate) fn write_report(
    path: &Path,
    config: &InputConfig,
    args: &ValidateArgs,
    out: &mut impl Write,
) -> BinResult<()> {
    let nodes = config.parse_node_ids()?;
    let warnings = collect_warnings(config);

    match args.format {
        OutputFormat::Text => {
            writeln!(out, "✓ Configuration is valid: {}", path.display())?;
            writeln!(out)?;
            writeln!(out, "Summary:")?;
            writeln!(out, "  Endpoint: {}", config.endpoint)?;
            writeln!(
                out,
                "  Security: {}/{}",
                config.security_mode, config.security_policy
            )?;
            writeln!(out, "  Identity: {}", config.credentials.kind())?;
            writeln!(out, "  Nodes: {}", nodes.len())?;
            writeln!(out, "  Request timeout: {:?}", config.request_timeout)?;

            if !warnings.is_empty() {
                writeln!(out)?;
                writeln!(out, "Warnings:")?;
                for warning in &warnings {
                    writeln!(out, "  ⚠ {}", warning)?;
                }
            }

            if args.show_config {
                writeln!(out)?;
                writeln!(out, "Parsed configuration:")?;
                writeln!(out, "{}", serde_json::to_string_pretty(&redacted(config)?)?)?;
            }
        }
        OutputFormat::Json => {
            let output = json!({
                "valid": true,
                "config_path": path.display().to_string(),
                "summary": {
                    "endpoint": config.endpoint,
                    "security_mode": config.security_mode,
                    "security_policy": config.security_policy,
                    "identity": config.credentials.kind(),
                    "node_count": nodes.len(),
                },
                "nodes": nodes.iter().map(ToString::to_string).collect::<Vec<_>>(),
                "warnings": warnings,
                "config": if args.show_config { Some(redacted(config)?) } else { None },
            });
            writeln!(out, "{}", serde_json::to_string_pretty(&output)?)?;
        }
    }

    Ok(())
}

fn collect_warnings(config: &InputConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.node_ids.is_empty() {
        warnings.push("No node ids configured; every batch will be empty".to_string());
    }
    if !config.verify_server_certificate && config.trusted_server_fingerprints.is_empty() {
        warnings.push("Server certificate verification is disabled".to_string());
    }
    if !config.uses_security() && matches!(config.credentials, Credentials::UserName { .. }) {
        warnings.push("Password is sent over an unsecured channel".to_string());
    }
    if let Some(ref pki_dir) = config.pki_dir {
        if !pki_dir.exists() {
            warnings.push(format!("PKI directory does not exist: {}", pki_dir.display()));
        }
    }

    warnings
}

/// Serializes the configuration with the password masked.
fn redacted(config: &InputConfig) -> BinResult<Value> {
    let mut value = serde_json::to_value(config)?;
    if let Some(password) = value.pointer_mut("/credentials/password") {
        *password = Value::String("<redacted>".to_string());
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(config: &InputConfig, args: ValidateArgs) -> String {
        let mut out = Vec::new();
        write_report(Path::new("uabridge.yaml"), config, &args, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_text_report_warns_about_plaintext_password() {
        let config = InputConfig::builder()
            .endpoint("opc.tcp://plc:4840")
            .credentials(Credentials::user_name("root", "secret"))
            .node_id("ns=2;i=7")
            .build()
            .unwrap();

        let text = render(&config, ValidateArgs::default());
        assert!(text.contains("Nodes: 1"));
        assert!(text.contains("Password is sent over an unsecured channel"));
    }

    #[test]
    fn test_show_config_redacts_password() {
        let config = InputConfig::builder()
            .endpoint("opc.tcp://plc:4840")
            .credentials(Credentials::user_name("root", "secret"))
            .build()
            .unwrap();

        let json = render(
            &config,
            ValidateArgs {
                show_config: true,
                format: OutputFormat::Json,
            },
        );
        assert!(!json.contains("secret"));

        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["config"]["credentials"]["password"], "<redacted>");
        assert_eq!(value["summary"]["node_count"], 0);
    }

    #[test]
    fn test_invalid_node_id_fails() {
        let mut config = InputConfig::new("opc.tcp://plc:4840");
        config.node_ids = vec!["ns=2;i=7".to_string(), "bogus".to_string()];

        let mut out = Vec::new();
        let err = write_report(Path::new("x.yaml"), &config, &ValidateArgs::default(), &mut out)
            .unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }
}
