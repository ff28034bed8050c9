// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA batch-read input connector.
//!
//! This crate connects to an OPC UA server, negotiates a secure session and
//! reads a fixed set of nodes in one service call per cycle. Every Good value
//! becomes an [`OutputMessage`] handed to the host pipeline together with an
//! acknowledgment handle.
//!
//! # Features
//!
//! - Endpoint discovery and exact security mode/policy matching
//! - Anonymous, UserName and Certificate identities
//! - Server certificate inspection (DER or PEM, SANs, fingerprint)
//! - Automatic reconnection on the next cycle after a channel fault
//! - Caller-driven cancellation and deadlines on every network call
//! - Pluggable protocol stack through [`OpcUaTransport`]
//!
//! # Error Handling
//!
//! ```text
//! OpcUaError
//! ├── Discovery       - Endpoint list could not be fetched
//! ├── UnsupportedAuth - No endpoint matches the requested security/identity
//! ├── Authentication  - Server rejected the identity
//! ├── Certificate     - Server certificate unusable
//! ├── Channel         - Secure channel or service call failed
//! ├── Parse           - Invalid node identifiers
//! ├── Canceled        - Caller canceled or deadline expired
//! └── Configuration   - Invalid settings
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use uabridge_opcua::{BatchInput, CallContext, Credentials, InputConfig, OpcUaInput};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = InputConfig::builder()
//!         .endpoint("opc.tcp://localhost:4840")
//!         .credentials(Credentials::user_name("root", "secret"))
//!         .node_id("ns=4;s=|var|Demo.Value")
//!         .build()?;
//!
//!     let input = OpcUaInput::new(config, Arc::new(RealOpcUaTransport::new()))?;
//!     let batch = input.read_batch(&CallContext::new()).await?;
//!     println!("{} messages", batch.len());
//!     batch.ack.ack();
//!     input.close(&CallContext::new()).await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod certificate;
pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod input;
pub mod message;
pub mod node_id;
pub mod observer;
pub mod types;
pub mod value;

pub use error::{ErrorCode, ErrorSeverity, OpcUaError, OpcUaResult};

pub use types::{
    ApplicationType, Credentials, EndpointDescriptor, SecurityMode, SecurityPolicy,
    ServerApplication, TokenKind, UserTokenPolicy,
};

pub use node_id::{parse_node_ids, NodeId, NodeIdParseError, NodeIdentifier};

pub use config::{InputConfig, InputConfigBuilder};

pub use context::CallContext;

pub use value::{OpcUaValue, StatusCode, StatusSeverity};

pub use client::{
    select_endpoint, BatchOutcome, BatchReader, ConnectionManager, ConnectionState,
    ConnectorStats, OpcUaTransport, ReadResult, Session, SessionSettings, StatsSnapshot,
    TransportSession,
};

#[cfg(feature = "real-transport")]
pub use client::RealOpcUaTransport;

pub use certificate::{
    decode_certificate, describe_endpoint, CertificateError, CertificateInfo,
    CertificateInspector, CertificateResult, EndpointSummary, ValidationPolicy,
};

pub use input::{BatchInput, OpcUaInput};
pub use message::{AckHandle, MessageBatch, OutputMessage};
pub use observer::{ConnectorObserver, CycleSummary, NoopObserver, TracingObserver};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
