// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Transport selection.

use std::sync::Arc;

use uabridge_opcua::{InputConfig, OpcUaTransport};

use crate::error::BinResult;

/// Builds the transport used to reach the configured server.
#[cfg(feature = "real-transport")]
pub fn default_transport(config: &InputConfig) -> BinResult<Arc<dyn OpcUaTransport>> {
    use uabridge_opcua::RealOpcUaTransport;

    // Pinned fingerprints and the inspector decide trust; the PKI store only
    // matters when neither applies.
    let trust = !config.verify_server_certificate || !config.trusted_server_fingerprints.is_empty();
    Ok(Arc::new(RealOpcUaTransport::new().trust_server_certs(trust)))
}

/// Builds the transport used to reach the configured server.
#[cfg(not(feature = "real-transport"))]
pub fn default_transport(config: &InputConfig) -> BinResult<Arc<dyn OpcUaTransport>> {
    Err(crate::error::BinError::config(format!(
        "cannot connect to {}: uabridge was built without the `real-transport` feature",
        config.endpoint
    )))
}

#[cfg(all(test, not(feature = "real-transport")))]
mod tests {
    use super::*;

    #[test]
    fn test_transport_requires_feature() {
        let config = InputConfig::new("opc.tcp://plc:4840");
        let err = default_transport(&config).err().map(|e| e.exit_code());
        assert_eq!(err, Some(1));
    }
}
