// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # uabridge-bin
//!
//! Command-line runner for the uabridge OPC UA input.
//!
//! - CLI argument parsing with clap
//! - Configuration loading (file plus `UABRIDGE_` environment overrides)
//! - Logging initialization
//! - Graceful shutdown on SIGTERM / SIGINT
//! - Command implementations (endpoints, read, run, validate, version)
//!
//! ## Architecture
//!
//! ```text
//!                    ┌─────────────┐
//!                    │   main.rs   │
//!                    └──────┬──────┘
//!                           │
//!                    ┌──────▼──────┐
//!                    │   cli.rs    │
//!                    └──────┬──────┘
//!                           │
//!               ┌───────────┼───────────┐
//!               ▼           ▼           ▼
//!        ┌──────────┐ ┌──────────┐ ┌──────────┐
//!        │ commands │ │  config  │ │ logging  │
//!        └────┬─────┘ └──────────┘ └──────────┘
//!             │
//!      ┌──────┴──────┐
//!      ▼             ▼
//! ┌──────────┐ ┌────────────────┐
//! │ shutdown │ │ uabridge-opcua │
//! └──────────┘ └────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Read every second until interrupted (default command)
//! uabridge -c plc.yaml
//!
//! # One batch with full metadata
//! uabridge -c plc.yaml read --full
//!
//! # Inspect the server's endpoints and certificates
//! uabridge -c plc.yaml endpoints
//!
//! # Validate configuration
//! uabridge -c plc.yaml validate --show-config
//! ```
//!
//! Stdout carries command output (JSON lines for `read` and `run`); logs go
//! to stderr.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod shutdown;
pub mod transport;

pub use cli::{Cli, Commands, LogFormat, OutputFormat};
pub use config::{load_config, ConfigFormat, ConfigLoader};
pub use error::{BinError, BinResult};
pub use shutdown::ShutdownCoordinator;

/// Binary version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Binary name.
pub const NAME: &str = "uabridge";
