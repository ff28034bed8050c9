// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Node identifier parsing.
//!
//! Configured tags are textual OPC UA node identifiers:
//!
//! | Form               | Example                                   |
//! |--------------------|-------------------------------------------|
//! | `ns=<N>;i=<u32>`   | `ns=2;i=1001`                             |
//! | `ns=<N>;s=<text>`  | `ns=4;s=\|var\|PLC.Application.GVL.Speed` |
//! | `ns=<N>;g=<guid>`  | `ns=1;g=72962b91-fa75-4ae6-8d28-b404dc7daf63` |
//! | `ns=<N>;b=<base64>`| `ns=3;b=AQID`                             |
//!
//! The `ns=<N>;` prefix is optional and defaults to namespace 0. Everything
//! after `s=` is kept verbatim, separators and spaces included.

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use uuid::Uuid;

use crate::error::{OpcUaError, OpcUaResult};

// =============================================================================
// NodeId
// =============================================================================

/// A parsed OPC UA node reference.
///
/// Serializes as its canonical text form.
///
/// # Examples
///
/// ```
/// use uabridge_opcua::node_id::NodeId;
///
/// let node: NodeId = "ns=2;i=1001".parse().unwrap();
/// assert_eq!(node, NodeId::numeric(2, 1001));
/// assert_eq!(node.to_string(), "ns=2;i=1001");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeId {
    /// Namespace index (0 = OPC UA standard namespace).
    pub namespace_index: u16,

    /// The node identifier.
    pub identifier: NodeIdentifier,
}

/// The identifier part of a [`NodeId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeIdentifier {
    /// Numeric identifier (`i=`).
    Numeric(u32),
    /// String identifier (`s=`).
    String(String),
    /// GUID identifier (`g=`).
    Guid(Uuid),
    /// Opaque byte string identifier (`b=`).
    Opaque(Vec<u8>),
}

impl NodeId {
    /// Creates a numeric node ID.
    #[inline]
    pub fn numeric(namespace_index: u16, value: u32) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Numeric(value),
        }
    }

    /// Creates a string node ID.
    #[inline]
    pub fn string(namespace_index: u16, value: impl Into<String>) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::String(value.into()),
        }
    }

    /// Creates a GUID node ID.
    #[inline]
    pub fn guid(namespace_index: u16, value: Uuid) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Guid(value),
        }
    }

    /// Creates an opaque node ID.
    #[inline]
    pub fn opaque(namespace_index: u16, value: Vec<u8>) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Opaque(value),
        }
    }

    /// Returns the identifier type as a string.
    pub const fn identifier_type(&self) -> &'static str {
        match &self.identifier {
            NodeIdentifier::Numeric(_) => "Numeric",
            NodeIdentifier::String(_) => "String",
            NodeIdentifier::Guid(_) => "Guid",
            NodeIdentifier::Opaque(_) => "Opaque",
        }
    }

    /// Converts to the canonical OPC UA string format.
    ///
    /// Namespace 0 omits the `ns=` prefix.
    pub fn to_opc_string(&self) -> String {
        let id_str = match &self.identifier {
            NodeIdentifier::Numeric(v) => format!("i={}", v),
            NodeIdentifier::String(v) => format!("s={}", v),
            NodeIdentifier::Guid(v) => format!("g={}", v),
            NodeIdentifier::Opaque(v) => format!("b={}", BASE64.encode(v)),
        };

        if self.namespace_index == 0 {
            id_str
        } else {
            format!("ns={};{}", self.namespace_index, id_str)
        }
    }

    /// Leading whitespace and trailing line breaks are dropped. Trailing
    /// spaces belong to an `s=` identifier and are kept; other forms ignore
    /// them.
    fn parse_text(input: &str) -> Result<Self, String> {
        let text = input.trim_start().trim_end_matches(&['\r', '\n'][..]);
        if text.trim_end().is_empty() {
            return Err("empty identifier".to_string());
        }

        let (namespace_index, id_part) = match text.strip_prefix("ns=") {
            Some(rest) => {
                let (ns, id) = rest
                    .split_once(';')
                    .ok_or_else(|| "missing identifier after namespace".to_string())?;
                let ns = ns
                    .parse::<u16>()
                    .map_err(|_| format!("invalid namespace index '{}'", ns))?;
                (ns, id)
            }
            None => (0, text),
        };

        if id_part.trim_end().is_empty() {
            return Err("missing identifier after namespace".to_string());
        }

        let (kind, raw_value) = id_part
            .split_once('=')
            .ok_or_else(|| format!("unknown identifier type in '{}'", id_part.trim_end()))?;
        let value = raw_value.trim_end();

        let identifier = match kind {
            "i" => value
                .parse::<u32>()
                .map(NodeIdentifier::Numeric)
                .map_err(|_| format!("invalid numeric identifier '{}'", value))?,
            "s" => {
                if value.is_empty() {
                    return Err("empty string identifier".to_string());
                }
                NodeIdentifier::String(raw_value.to_string())
            }
            "g" => Uuid::parse_str(value)
                .map(NodeIdentifier::Guid)
                .map_err(|e| format!("invalid GUID '{}': {}", value, e))?,
            "b" => {
                if value.is_empty() {
                    return Err("empty opaque identifier".to_string());
                }
                let bytes = BASE64
                    .decode(value)
                    .map_err(|e| format!("invalid base64 identifier '{}': {}", value, e))?;
                NodeIdentifier::Opaque(bytes)
            }
            other => return Err(format!("unknown identifier type '{}'", other)),
        };

        Ok(Self {
            namespace_index,
            identifier,
        })
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_opc_string())
    }
}

impl FromStr for NodeId {
    type Err = NodeIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_text(s).map_err(|reason| NodeIdParseError::new(0, s, reason))
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// NodeIdParseError
// =============================================================================

/// A single identifier that failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("#{index} '{input}': {reason}")]
pub struct NodeIdParseError {
    /// Position in the configured list.
    pub index: usize,
    /// The offending input, untrimmed.
    pub input: String,
    /// Why it was rejected.
    pub reason: String,
}

impl NodeIdParseError {
    /// Creates a parse error.
    pub fn new(index: usize, input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            index,
            input: input.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Batch parsing
// =============================================================================

/// Parses every identifier, preserving input order.
///
/// All failures are collected into a single [`OpcUaError::Parse`]; no partial
/// list is returned.
pub fn parse_node_ids<I, S>(identifiers: I) -> OpcUaResult<Vec<NodeId>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut nodes = Vec::new();
    let mut errors = Vec::new();

    for (index, raw) in identifiers.into_iter().enumerate() {
        let raw = raw.as_ref();
        match NodeId::parse_text(raw) {
            Ok(node) => nodes.push(node),
            Err(reason) => errors.push(NodeIdParseError::new(index, raw, reason)),
        }
    }

    if errors.is_empty() {
        tracing::debug!(count = nodes.len(), "Parsed node identifiers");
        Ok(nodes)
    } else {
        Err(OpcUaError::parse(errors))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn reason(input: &str) -> String {
        input.parse::<NodeId>().unwrap_err().reason
    }

    #[test]
    fn test_parse_numeric() {
        assert_eq!("ns=2;i=1001".parse::<NodeId>().unwrap(), NodeId::numeric(2, 1001));
        assert_eq!("i=85".parse::<NodeId>().unwrap(), NodeId::numeric(0, 85));
        assert_eq!(
            "ns=1;i=4294967295".parse::<NodeId>().unwrap(),
            NodeId::numeric(1, u32::MAX)
        );
    }

    #[test]
    fn test_parse_string_keeps_separators() {
        let node: NodeId = "ns=4;s=|var|WAGO 750-8101 PFC100 CS 2ETH.Application.GVL"
            .parse()
            .unwrap();
        assert_eq!(
            node,
            NodeId::string(4, "|var|WAGO 750-8101 PFC100 CS 2ETH.Application.GVL")
        );

        let node: NodeId = "ns=2;s=a;b=c".parse().unwrap();
        assert_eq!(node, NodeId::string(2, "a;b=c"));
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let node: NodeId = "  ns=3;i=7 \n".parse().unwrap();
        assert_eq!(node, NodeId::numeric(3, 7));
    }

    #[test]
    fn test_parse_keeps_trailing_spaces_of_string_identifier() {
        let node: NodeId = "ns=2;s=Tank 1 ".parse().unwrap();
        assert_eq!(node, NodeId::string(2, "Tank 1 "));
        assert_eq!(node.to_string(), "ns=2;s=Tank 1 ");

        let again: NodeId = node.to_string().parse().unwrap();
        assert_eq!(again, node);

        let node: NodeId = "ns=2;s=Tank 1 \r\n".parse().unwrap();
        assert_eq!(node, NodeId::string(2, "Tank 1 "));
    }

    #[test]
    fn test_parse_guid_and_opaque() {
        let node: NodeId = "ns=1;g=72962b91-fa75-4ae6-8d28-b404dc7daf63".parse().unwrap();
        assert_eq!(node.identifier_type(), "Guid");

        let node: NodeId = "ns=3;b=AQID".parse().unwrap();
        assert_eq!(node, NodeId::opaque(3, vec![1, 2, 3]));
    }

    #[test]
    fn test_rejections() {
        assert_eq!(reason(""), "empty identifier");
        assert_eq!(reason("   "), "empty identifier");
        assert!(reason("ns=x;i=1").contains("invalid namespace index"));
        assert!(reason("ns=70000;i=1").contains("invalid namespace index"));
        assert!(reason("ns=2").contains("missing identifier"));
        assert!(reason("ns=2;").contains("missing identifier"));
        assert!(reason("ns=2; ").contains("missing identifier"));
        assert!(reason("ns=2;x=1").contains("unknown identifier type"));
        assert!(reason("Temperature").contains("unknown identifier type"));
        assert!(reason("ns=2;i=abc").contains("invalid numeric identifier"));
        assert!(reason("ns=2;i=4294967296").contains("invalid numeric identifier"));
        assert!(reason("ns=2;i=-1").contains("invalid numeric identifier"));
        assert!(reason("ns=2;g=not-a-guid").contains("invalid GUID"));
        assert!(reason("ns=2;b=!!!").contains("invalid base64"));
        assert_eq!(reason("ns=2;s="), "empty string identifier");
        assert_eq!(reason("ns=2;b="), "empty opaque identifier");
    }

    #[test]
    fn test_display_roundtrip_is_idempotent() {
        for text in [
            "ns=2;i=1001",
            "i=2253",
            "ns=4;s=|var|Demo.Value",
            "ns=1;g=72962b91-fa75-4ae6-8d28-b404dc7daf63",
            "ns=3;b=AQID",
        ] {
            let node: NodeId = text.parse().unwrap();
            assert_eq!(node.to_string(), text);
            let again: NodeId = node.to_string().parse().unwrap();
            assert_eq!(again, node);
        }
    }

    #[test]
    fn test_ns_zero_renders_without_prefix() {
        let node: NodeId = "ns=0;i=85".parse().unwrap();
        assert_eq!(node.to_string(), "i=85");
    }

    #[test]
    fn test_parse_node_ids_preserves_order() {
        let nodes = parse_node_ids(["ns=2;i=3", "ns=2;i=1", "ns=2;i=2"]).unwrap();
        assert_eq!(
            nodes,
            vec![
                NodeId::numeric(2, 3),
                NodeId::numeric(2, 1),
                NodeId::numeric(2, 2)
            ]
        );
    }

    #[test]
    fn test_parse_node_ids_collects_all_failures() {
        let err = parse_node_ids(["ns=2;i=1", "bogus", "ns=2;i=2", "ns=q;s=x"]).unwrap_err();
        match err {
            OpcUaError::Parse { errors } => {
                assert_eq!(errors.len(), 2);
                assert_eq!(errors[0].index, 1);
                assert_eq!(errors[0].input, "bogus");
                assert_eq!(errors[1].index, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_node_ids_empty_input() {
        let nodes = parse_node_ids(Vec::<String>::new()).unwrap();
        assert!(nodes.is_empty());
    }

    #[test]
    fn test_serde_uses_text_form() {
        let node = NodeId::string(4, "|var|Demo.Value");
        let json = serde_json::to_string(&node).unwrap();
        assert_eq!(json, "\"ns=4;s=|var|Demo.Value\"");
        let back: NodeId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, node);
    }
}
