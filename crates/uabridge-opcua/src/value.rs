// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Typed values and status codes returned by reads.

use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use uuid::Uuid;

// =============================================================================
// StatusCode
// =============================================================================

/// Severity encoded in the top two bits of a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusSeverity {
    /// `00` - the operation succeeded.
    Good,
    /// `01` - the value may be unreliable.
    Uncertain,
    /// `10` or `11` - the operation failed.
    Bad,
}

/// An OPC UA status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCode(pub u32);

impl StatusCode {
    /// `Good`.
    pub const GOOD: Self = Self(0x0000_0000);
    /// `Uncertain`.
    pub const UNCERTAIN: Self = Self(0x4000_0000);
    /// `Bad`.
    pub const BAD: Self = Self(0x8000_0000);
    /// `BadTimeout`.
    pub const BAD_TIMEOUT: Self = Self(0x800A_0000);
    /// `BadCommunicationError`.
    pub const BAD_COMMUNICATION_ERROR: Self = Self(0x8005_0000);
    /// `BadUserAccessDenied`.
    pub const BAD_USER_ACCESS_DENIED: Self = Self(0x801F_0000);
    /// `BadIdentityTokenInvalid`.
    pub const BAD_IDENTITY_TOKEN_INVALID: Self = Self(0x8020_0000);
    /// `BadIdentityTokenRejected`.
    pub const BAD_IDENTITY_TOKEN_REJECTED: Self = Self(0x8021_0000);
    /// `BadNodeIdUnknown`.
    pub const BAD_NODE_ID_UNKNOWN: Self = Self(0x8034_0000);
    /// `BadNotReadable`.
    pub const BAD_NOT_READABLE: Self = Self(0x803A_0000);
    /// `BadConnectionClosed`.
    pub const BAD_CONNECTION_CLOSED: Self = Self(0x80AE_0000);

    const SEVERITY_MASK: u32 = 0xC000_0000;

    /// Returns the raw code.
    #[inline]
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Returns the severity.
    pub const fn severity(&self) -> StatusSeverity {
        match self.0 & Self::SEVERITY_MASK {
            0x0000_0000 => StatusSeverity::Good,
            0x4000_0000 => StatusSeverity::Uncertain,
            _ => StatusSeverity::Bad,
        }
    }

    /// Returns `true` for Good severity.
    #[inline]
    pub const fn is_good(&self) -> bool {
        matches!(self.severity(), StatusSeverity::Good)
    }

    /// Returns `true` for Uncertain severity.
    #[inline]
    pub const fn is_uncertain(&self) -> bool {
        matches!(self.severity(), StatusSeverity::Uncertain)
    }

    /// Returns `true` for Bad severity.
    #[inline]
    pub const fn is_bad(&self) -> bool {
        matches!(self.severity(), StatusSeverity::Bad)
    }

    /// Returns `true` if the code reports a rejected identity.
    pub const fn is_auth_rejection(&self) -> bool {
        matches!(
            self.0 & 0xFFFF_0000,
            0x801F_0000 | 0x8020_0000 | 0x8021_0000 | 0x8057_0000
        )
    }

    /// Returns `true` if the code reports a certificate problem (`BadCertificate*`).
    pub const fn is_certificate_problem(&self) -> bool {
        let code = self.0 & 0xFFFF_0000;
        code >= 0x8012_0000 && code <= 0x801E_0000
    }

    /// Returns the symbolic name of well-known codes.
    pub fn name(&self) -> &'static str {
        match self.0 & 0xFFFF_0000 {
            0x0000_0000 => "Good",
            0x4000_0000 => "Uncertain",
            0x8000_0000 => "Bad",
            0x8001_0000 => "BadUnexpectedError",
            0x8002_0000 => "BadInternalError",
            0x8005_0000 => "BadCommunicationError",
            0x800A_0000 => "BadTimeout",
            0x800B_0000 => "BadServiceUnsupported",
            0x800C_0000 => "BadShutdown",
            0x800D_0000 => "BadServerNotConnected",
            0x800E_0000 => "BadServerHalted",
            0x8010_0000 => "BadTooManyOperations",
            0x8012_0000 => "BadCertificateInvalid",
            0x8013_0000 => "BadSecurityChecksFailed",
            0x8014_0000 => "BadCertificateTimeInvalid",
            0x8016_0000 => "BadCertificateHostNameInvalid",
            0x8017_0000 => "BadCertificateUriInvalid",
            0x801A_0000 => "BadCertificateUntrusted",
            0x801D_0000 => "BadCertificateRevoked",
            0x801F_0000 => "BadUserAccessDenied",
            0x8020_0000 => "BadIdentityTokenInvalid",
            0x8021_0000 => "BadIdentityTokenRejected",
            0x8022_0000 => "BadSecureChannelIdInvalid",
            0x8025_0000 => "BadSessionIdInvalid",
            0x8026_0000 => "BadSessionClosed",
            0x8027_0000 => "BadSessionNotActivated",
            0x8033_0000 => "BadNodeIdInvalid",
            0x8034_0000 => "BadNodeIdUnknown",
            0x8035_0000 => "BadAttributeIdInvalid",
            0x803A_0000 => "BadNotReadable",
            0x803E_0000 => "BadNotFound",
            0x80AE_0000 => "BadConnectionClosed",
            0x8057_0000 => "BadUserSignatureInvalid",
            0x4092_0000 => "UncertainInitialValue",
            0x4090_0000 => "UncertainLastUsableValue",
            0x4093_0000 => "UncertainSensorNotAccurate",
            _ => match self.severity() {
                StatusSeverity::Good => "Good",
                StatusSeverity::Uncertain => "Uncertain",
                StatusSeverity::Bad => "Bad",
            },
        }
    }
}

impl From<u32> for StatusCode {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X} ({})", self.0, self.name())
    }
}

// =============================================================================
// OpcUaValue
// =============================================================================

/// A typed OPC UA value.
///
/// Integers and floats keep their wire width.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum OpcUaValue {
    /// Boolean value.
    Boolean(bool),
    /// Signed byte.
    SByte(i8),
    /// Unsigned byte.
    Byte(u8),
    /// 16-bit signed integer.
    Int16(i16),
    /// 16-bit unsigned integer.
    UInt16(u16),
    /// 32-bit signed integer.
    Int32(i32),
    /// 32-bit unsigned integer.
    UInt32(u32),
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit unsigned integer.
    UInt64(u64),
    /// 32-bit float.
    Float(f32),
    /// 64-bit double.
    Double(f64),
    /// String value.
    String(String),
    /// Date/time value.
    DateTime(DateTime<Utc>),
    /// GUID value.
    Guid(Uuid),
    /// Byte string.
    ByteString(Vec<u8>),
    /// Array of values.
    Array(Vec<OpcUaValue>),
    /// Null value.
    #[default]
    Null,
}

impl OpcUaValue {
    /// Returns the OPC UA data type name.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Boolean(_) => "Boolean",
            Self::SByte(_) => "SByte",
            Self::Byte(_) => "Byte",
            Self::Int16(_) => "Int16",
            Self::UInt16(_) => "UInt16",
            Self::Int32(_) => "Int32",
            Self::UInt32(_) => "UInt32",
            Self::Int64(_) => "Int64",
            Self::UInt64(_) => "UInt64",
            Self::Float(_) => "Float",
            Self::Double(_) => "Double",
            Self::String(_) => "String",
            Self::DateTime(_) => "DateTime",
            Self::Guid(_) => "Guid",
            Self::ByteString(_) => "ByteString",
            Self::Array(_) => "Array",
            Self::Null => "Null",
        }
    }

    /// Returns `true` if this is a null value.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Attempts to get the value as an i64 without loss.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::SByte(v) => Some(i64::from(*v)),
            Self::Byte(v) => Some(i64::from(*v)),
            Self::Int16(v) => Some(i64::from(*v)),
            Self::UInt16(v) => Some(i64::from(*v)),
            Self::Int32(v) => Some(i64::from(*v)),
            Self::UInt32(v) => Some(i64::from(*v)),
            Self::Int64(v) => Some(*v),
            Self::UInt64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Attempts to get the value as an f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(f64::from(*v)),
            Self::Double(v) => Some(*v),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    /// Attempts to get the value as a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Converts to JSON.
    ///
    /// Integers map to exact JSON numbers. Floats use their shortest
    /// round-tripping decimal form; non-finite floats become strings.
    /// Date/times are RFC 3339, byte strings base64.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Boolean(v) => Value::Bool(*v),
            Self::SByte(v) => Value::from(*v),
            Self::Byte(v) => Value::from(*v),
            Self::Int16(v) => Value::from(*v),
            Self::UInt16(v) => Value::from(*v),
            Self::Int32(v) => Value::from(*v),
            Self::UInt32(v) => Value::from(*v),
            Self::Int64(v) => Value::from(*v),
            Self::UInt64(v) => Value::from(*v),
            Self::Float(v) => float_to_json(f64::from(*v), v.to_string()),
            Self::Double(v) => float_to_json(*v, v.to_string()),
            Self::String(v) => Value::String(v.clone()),
            Self::DateTime(v) => Value::String(v.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Self::Guid(v) => Value::String(v.to_string()),
            Self::ByteString(v) => Value::String(BASE64.encode(v)),
            Self::Array(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Null => Value::Null,
        }
    }
}

// f32 widened to f64 picks up binary noise; reparse the shortest f32 text instead.
fn float_to_json(wide: f64, shortest: String) -> Value {
    if !wide.is_finite() {
        return Value::String(shortest);
    }
    shortest
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

impl fmt::Display for OpcUaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(v) => write!(f, "{}", v),
            Self::SByte(v) => write!(f, "{}", v),
            Self::Byte(v) => write!(f, "{}", v),
            Self::Int16(v) => write!(f, "{}", v),
            Self::UInt16(v) => write!(f, "{}", v),
            Self::Int32(v) => write!(f, "{}", v),
            Self::UInt32(v) => write!(f, "{}", v),
            Self::Int64(v) => write!(f, "{}", v),
            Self::UInt64(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Double(v) => write!(f, "{}", v),
            Self::String(v) => write!(f, "{}", v),
            Self::DateTime(v) => write!(f, "{}", v.to_rfc3339()),
            Self::Guid(v) => write!(f, "{}", v),
            Self::ByteString(v) => write!(f, "<{} bytes>", v.len()),
            Self::Array(v) => write!(f, "[{} items]", v.len()),
            Self::Null => write!(f, "null"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_severity_bits() {
        assert!(StatusCode::GOOD.is_good());
        assert!(StatusCode(0x0000_0400).is_good());
        assert!(StatusCode(0x4092_0000).is_uncertain());
        assert!(StatusCode::BAD_NODE_ID_UNKNOWN.is_bad());
        assert!(StatusCode(0xC000_0000).is_bad());
        assert_eq!(StatusCode::BAD_NODE_ID_UNKNOWN.name(), "BadNodeIdUnknown");
        assert_eq!(
            StatusCode::BAD_NODE_ID_UNKNOWN.to_string(),
            "0x80340000 (BadNodeIdUnknown)"
        );
    }

    #[test]
    fn test_status_classification() {
        assert!(StatusCode::BAD_USER_ACCESS_DENIED.is_auth_rejection());
        assert!(StatusCode::BAD_IDENTITY_TOKEN_REJECTED.is_auth_rejection());
        assert!(!StatusCode::BAD_TIMEOUT.is_auth_rejection());
        assert!(StatusCode(0x801A_0000).is_certificate_problem());
        assert!(!StatusCode::BAD_CONNECTION_CLOSED.is_certificate_problem());
    }

    #[test]
    fn test_json_keeps_integer_precision() {
        assert_eq!(OpcUaValue::UInt64(u64::MAX).to_json().to_string(), "18446744073709551615");
        assert_eq!(OpcUaValue::Int64(i64::MIN).to_json().to_string(), "-9223372036854775808");
        assert_eq!(OpcUaValue::Int16(-7).to_json(), serde_json::json!(-7));
    }

    #[test]
    fn test_json_floats() {
        assert_eq!(OpcUaValue::Float(1.1).to_json().to_string(), "1.1");
        assert_eq!(OpcUaValue::Double(0.1 + 0.2).to_json().to_string(), "0.30000000000000004");
        assert_eq!(OpcUaValue::Double(f64::NAN).to_json(), Value::String("NaN".into()));
    }

    #[test]
    fn test_json_composites() {
        let value = OpcUaValue::Array(vec![
            OpcUaValue::Boolean(true),
            OpcUaValue::ByteString(vec![1, 2, 3]),
            OpcUaValue::Null,
        ]);
        assert_eq!(value.to_json(), serde_json::json!([true, "AQID", null]));
        assert_eq!(value.type_name(), "Array");
    }

    #[test]
    fn test_lossless_accessors() {
        assert_eq!(OpcUaValue::UInt32(42).as_i64(), Some(42));
        assert_eq!(OpcUaValue::UInt64(u64::MAX).as_i64(), None);
        assert_eq!(OpcUaValue::Double(2.5).as_f64(), Some(2.5));
        assert_eq!(OpcUaValue::String("x".into()).as_str(), Some("x"));
        assert_eq!(OpcUaValue::Boolean(true).as_i64(), None);
    }
}
