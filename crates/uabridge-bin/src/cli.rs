// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI argument parsing and command definitions.
//!
//! - `endpoints`: Discover and describe the server endpoints
//! - `read`: Run one batch read and print the messages
//! - `run`: Read on a fixed interval until interrupted (default)
//! - `validate`: Validate the configuration and node identifiers
//! - `version`: Show version information

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

// =============================================================================
// Main CLI Structure
// =============================================================================

/// uabridge - OPC UA batch-read input
///
/// Connects to an OPC UA server, reads the configured nodes in one request
/// per cycle and prints every Good value as a JSON line.
#[derive(Parser, Debug)]
#[command(
    name = "uabridge",
    author = "Sylvex <contact@sylvex.io>",
    version = crate::VERSION,
    about = "OPC UA batch-read input",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    /// Configuration file path
    #[arg(
        short,
        long,
        default_value = "uabridge.yaml",
        env = "UABRIDGE_CONFIG",
        global = true
    )]
    pub config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        short,
        long,
        default_value = "info",
        env = "UABRIDGE_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json, compact)
    #[arg(long, default_value = "text", env = "UABRIDGE_LOG_FORMAT", global = true)]
    pub log_format: LogFormat,

    /// Enable quiet mode (warnings and errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

// =============================================================================
// Subcommands
// =============================================================================

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Discover and describe the server endpoints
    ///
    /// Prints security settings, identity-token policies and certificate
    /// details of every endpoint the server publishes.
    Endpoints(EndpointsArgs),

    /// Run one batch read and print the messages
    Read(ReadArgs),

    /// Read on a fixed interval until interrupted
    ///
    /// This is the default command when no subcommand is specified.
    Run(RunArgs),

    /// Validate the configuration file
    ///
    /// Parses the configuration and every node identifier without
    /// contacting the server.
    Validate(ValidateArgs),

    /// Show version information
    Version,
}

// =============================================================================
// Command Arguments
// =============================================================================

/// Arguments for the `endpoints` command.
#[derive(Args, Debug, Clone, Default)]
pub struct EndpointsArgs {
    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the `read` command.
#[derive(Args, Debug, Clone, Default)]
pub struct ReadArgs {
    /// Deadline for connect and read (defaults to request_timeout)
    #[arg(short, long, value_parser = humantime_parse)]
    pub timeout: Option<Duration>,

    /// Print the full message with metadata instead of the value only
    #[arg(long)]
    pub full: bool,
}

/// Arguments for the `run` command.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Interval between read cycles
    #[arg(short, long, default_value = "1s", value_parser = humantime_parse)]
    pub interval: Duration,

    /// Stop after this many cycles
    #[arg(long)]
    pub cycles: Option<u64>,

    /// Print the full message with metadata instead of the value only
    #[arg(long)]
    pub full: bool,
}

/// Arguments for the `validate` command.
#[derive(Args, Debug, Clone, Default)]
pub struct ValidateArgs {
    /// Show parsed configuration after validation
    #[arg(short, long)]
    pub show_config: bool,

    /// Output format for validation results
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

// =============================================================================
// Enums
// =============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for structured logging
    Json,
    /// Compact format for minimal output
    Compact,
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for programmatic parsing
    Json,
}

fn humantime_parse(value: &str) -> Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(value).map_err(|e| e.to_string())
}

// =============================================================================
// Helper Methods
// =============================================================================

impl Cli {
    /// Parse CLI arguments from the command line.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the effective command, defaulting to `Run` if none specified.
    pub fn effective_command(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or_else(|| Commands::Run(RunArgs::default()))
    }

    /// Get the effective log level based on flags.
    pub fn effective_log_level(&self) -> &str {
        if self.quiet {
            "warn"
        } else if self.verbose {
            "debug"
        } else {
            &self.log_level
        }
    }
}

impl Default for RunArgs {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            cycles: None,
            full: false,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
