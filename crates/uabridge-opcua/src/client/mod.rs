// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA client layers.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         OpcUaInput                              │
//! │                 (BatchInput impl, single flight)                │
//! └─────────────────────────────────────────────────────────────────┘
//!                 │                                 │
//!                 ▼                                 ▼
//! ┌───────────────────────────────┐ ┌───────────────────────────────┐
//! │       ConnectionManager       │ │          BatchReader          │
//! │ (discover, negotiate, close)  │ │   (one Read per cycle, map)   │
//! └───────────────────────────────┘ └───────────────────────────────┘
//!                 │                                 │
//!                 ▼                                 ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │              OpcUaTransport / TransportSession                  │
//! │                 (protocol stack boundary)                       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

mod manager;
mod reader;
mod session;
mod transport;

#[cfg(feature = "real-transport")]
mod real_transport;

pub use manager::{select_endpoint, ConnectionManager};
pub use reader::{BatchOutcome, BatchReader};
pub use session::{ConnectionState, ConnectorStats, Session, StatsSnapshot};
pub use transport::{OpcUaTransport, ReadResult, SessionSettings, TransportSession};

#[cfg(feature = "real-transport")]
pub use real_transport::RealOpcUaTransport;
