// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! X.509 decoding and endpoint certificate checks.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use x509_parser::extensions::GeneralName;

use super::{CertificateError, CertificateResult};
use crate::config::InputConfig;
use crate::types::{EndpointDescriptor, SecurityMode, SecurityPolicy, ServerApplication};

/// Days before `not_after` at which an accepted certificate is logged as expiring.
const EXPIRY_WARNING_DAYS: i64 = 30;

// =============================================================================
// CertificateInfo
// =============================================================================

/// Decoded fields of a server certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificateInfo {
    /// Subject distinguished name.
    pub subject: String,
    /// Issuer distinguished name.
    pub issuer: String,
    /// Serial number, lowercase hex.
    pub serial_number: String,
    /// Start of validity.
    pub not_before: DateTime<Utc>,
    /// End of validity.
    pub not_after: DateTime<Utc>,
    /// DNS subject alternative names.
    pub dns_names: Vec<String>,
    /// IP subject alternative names.
    pub ip_addresses: Vec<IpAddr>,
    /// URI subject alternative names (OPC UA application URI).
    pub uris: Vec<String>,
    /// SHA-256 over the DER encoding, lowercase hex.
    pub fingerprint_sha256: String,
    /// Subject equals issuer.
    pub self_signed: bool,
}

impl CertificateInfo {
    /// Returns `true` if the certificate has expired at `now`.
    #[inline]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.not_after
    }

    /// Returns `true` if the certificate is not yet valid at `now`.
    #[inline]
    pub fn is_not_yet_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.not_before
    }

    /// Returns the days left until expiry; negative once expired.
    pub fn days_until_expiration(&self, now: DateTime<Utc>) -> i64 {
        (self.not_after - now).num_days()
    }

    /// Returns `true` if `hostname` is covered by a DNS or IP alternative name.
    ///
    /// DNS comparison is case-insensitive. `*.example.com` covers exactly one
    /// extra label.
    pub fn covers_host(&self, hostname: &str) -> bool {
        if let Ok(ip) = hostname.parse::<IpAddr>() {
            return self.ip_addresses.contains(&ip);
        }

        let host = hostname.to_ascii_lowercase();
        self.dns_names.iter().any(|name| {
            let name = name.to_ascii_lowercase();
            match name.strip_prefix("*.") {
                Some(domain) => host
                    .strip_suffix(domain)
                    .and_then(|label| label.strip_suffix('.'))
                    .is_some_and(|label| !label.is_empty() && !label.contains('.')),
                None => name == host,
            }
        })
    }

    /// Returns every DNS and IP alternative name as text.
    pub fn host_names(&self) -> Vec<String> {
        self.dns_names
            .iter()
            .cloned()
            .chain(self.ip_addresses.iter().map(ToString::to_string))
            .collect()
    }
}

/// Decodes a DER or PEM encoded certificate.
pub fn decode_certificate(bytes: &[u8]) -> CertificateResult<CertificateInfo> {
    if bytes.is_empty() {
        return Err(CertificateError::decode("certificate is empty"));
    }

    let der = if is_pem(bytes) {
        let (_, pem) = x509_parser::pem::parse_x509_pem(bytes)
            .map_err(|e| CertificateError::decode(format!("invalid PEM: {}", e)))?;
        pem.contents
    } else {
        bytes.to_vec()
    };

    let (_, cert) = x509_parser::parse_x509_certificate(&der)
        .map_err(|e| CertificateError::decode(format!("invalid X.509 DER: {}", e)))?;

    let not_before = timestamp_to_utc(cert.validity().not_before.timestamp())?;
    let not_after = timestamp_to_utc(cert.validity().not_after.timestamp())?;

    let mut dns_names = Vec::new();
    let mut ip_addresses = Vec::new();
    let mut uris = Vec::new();

    match cert.subject_alternative_name() {
        Ok(Some(san)) => {
            for name in &san.value.general_names {
                match name {
                    GeneralName::DNSName(dns) => dns_names.push(dns.to_string()),
                    GeneralName::IPAddress(raw) => {
                        if let Some(ip) = ip_from_bytes(raw) {
                            ip_addresses.push(ip);
                        }
                    }
                    GeneralName::URI(uri) => uris.push(uri.to_string()),
                    _ => {}
                }
            }
        }
        Ok(None) => {}
        Err(e) => {
            return Err(CertificateError::decode(format!(
                "invalid subject alternative name: {}",
                e
            )))
        }
    }

    Ok(CertificateInfo {
        subject: cert.subject().to_string(),
        issuer: cert.issuer().to_string(),
        serial_number: to_hex(cert.raw_serial()),
        not_before,
        not_after,
        dns_names,
        ip_addresses,
        uris,
        fingerprint_sha256: to_hex(&Sha256::digest(&der)),
        self_signed: cert.subject().as_raw() == cert.issuer().as_raw(),
    })
}

fn is_pem(bytes: &[u8]) -> bool {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    bytes[start..].starts_with(b"-----BEGIN")
}

fn timestamp_to_utc(seconds: i64) -> CertificateResult<DateTime<Utc>> {
    Utc.timestamp_opt(seconds, 0)
        .single()
        .ok_or_else(|| CertificateError::decode(format!("validity time {} out of range", seconds)))
}

fn ip_from_bytes(raw: &[u8]) -> Option<IpAddr> {
    match raw.len() {
        4 => <[u8; 4]>::try_from(raw).ok().map(|b| IpAddr::V4(Ipv4Addr::from(b))),
        16 => <[u8; 16]>::try_from(raw).ok().map(|b| IpAddr::V6(Ipv6Addr::from(b))),
        _ => None,
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

// =============================================================================
// ValidationPolicy
// =============================================================================

/// What the inspector enforces on secured endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationPolicy {
    /// Apply validity, hostname and trust checks.
    pub verify: bool,
    /// Host the connector dials, matched against alternative names.
    pub hostname: Option<String>,
    /// Accepted fingerprints (lowercase hex). Empty accepts any issuer.
    pub trusted_fingerprints: Vec<String>,
}

impl ValidationPolicy {
    /// Derives the policy from the input configuration.
    pub fn from_config(config: &InputConfig) -> Self {
        Self {
            verify: config.verify_server_certificate,
            hostname: config.endpoint_host(),
            trusted_fingerprints: config.normalized_fingerprints(),
        }
    }

    /// A policy that only decodes.
    pub fn permissive() -> Self {
        Self::default()
    }
}

// =============================================================================
// CertificateInspector
// =============================================================================

/// Decodes and validates endpoint certificates.
#[derive(Debug, Clone, Default)]
pub struct CertificateInspector {
    policy: ValidationPolicy,
}

impl CertificateInspector {
    /// Creates an inspector with the given policy.
    pub fn new(policy: ValidationPolicy) -> Self {
        Self { policy }
    }

    /// Returns the active policy.
    pub fn policy(&self) -> &ValidationPolicy {
        &self.policy
    }

    /// Decodes the endpoint's certificate; `None` when it carries none.
    pub fn inspect(&self, endpoint: &EndpointDescriptor) -> CertificateResult<Option<CertificateInfo>> {
        if !endpoint.has_certificate() {
            return Ok(None);
        }
        decode_certificate(&endpoint.server_certificate).map(Some)
    }

    /// Checks an endpoint selected for a session.
    ///
    /// For security mode None the certificate is informational and decode
    /// failures are ignored. Otherwise it must be present, decodable, and
    /// pass [`CertificateInspector::validate`] when verification is enabled.
    pub fn check_endpoint(
        &self,
        endpoint: &EndpointDescriptor,
    ) -> CertificateResult<Option<CertificateInfo>> {
        if endpoint.security_mode == SecurityMode::None {
            return match self.inspect(endpoint) {
                Ok(info) => Ok(info),
                Err(e) => {
                    tracing::debug!(
                        endpoint = %endpoint.endpoint_url,
                        error = %e,
                        "Ignoring undecodable certificate on unsecured endpoint"
                    );
                    Ok(None)
                }
            };
        }

        let info = self
            .inspect(endpoint)?
            .ok_or_else(|| CertificateError::missing(&endpoint.endpoint_url))?;

        let now = Utc::now();
        if self.policy.verify {
            self.validate(&info, now)?;
        }

        let days_left = info.days_until_expiration(now);
        if days_left < EXPIRY_WARNING_DAYS {
            tracing::warn!(
                endpoint = %endpoint.endpoint_url,
                subject = %info.subject,
                days_left = days_left,
                "Server certificate expires soon"
            );
        }

        tracing::debug!(
            endpoint = %endpoint.endpoint_url,
            subject = %info.subject,
            fingerprint = %info.fingerprint_sha256,
            "Server certificate accepted"
        );
        Ok(Some(info))
    }

    /// Applies validity, hostname and trust checks at `now`.
    pub fn validate(&self, info: &CertificateInfo, now: DateTime<Utc>) -> CertificateResult<()> {
        if info.is_expired_at(now) {
            return Err(CertificateError::Expired {
                not_after: info.not_after,
            });
        }
        if info.is_not_yet_valid_at(now) {
            return Err(CertificateError::NotYetValid {
                not_before: info.not_before,
            });
        }

        if let Some(hostname) = &self.policy.hostname {
            if !info.covers_host(hostname) {
                return Err(CertificateError::HostnameMismatch {
                    hostname: hostname.clone(),
                    names: info.host_names(),
                });
            }
        }

        if !self.policy.trusted_fingerprints.is_empty()
            && !self
                .policy
                .trusted_fingerprints
                .contains(&info.fingerprint_sha256)
        {
            return Err(CertificateError::Untrusted {
                fingerprint: info.fingerprint_sha256.clone(),
            });
        }

        Ok(())
    }
}

// =============================================================================
// Endpoint summaries
// =============================================================================

/// Printable summary of a discovered endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointSummary {
    /// Endpoint URL.
    pub endpoint_url: String,
    /// Security mode.
    pub security_mode: SecurityMode,
    /// Security policy URI.
    pub security_policy_uri: String,
    /// Transport profile URI.
    pub transport_profile_uri: String,
    /// Security level.
    pub security_level: u8,
    /// Server application data.
    pub server: ServerApplication,
    /// Identity-token policies as `policy_id (Kind)`.
    pub token_policies: Vec<String>,
    /// Decoded certificate, if present and decodable.
    pub certificate: Option<CertificateInfo>,
    /// Decode failure, if any.
    pub certificate_error: Option<String>,
}

/// Builds a summary of the endpoint, decoding its certificate.
pub fn describe_endpoint(endpoint: &EndpointDescriptor) -> EndpointSummary {
    let (certificate, certificate_error) = match CertificateInspector::default().inspect(endpoint) {
        Ok(info) => (info, None),
        Err(e) => (None, Some(e.to_string())),
    };

    EndpointSummary {
        endpoint_url: endpoint.endpoint_url.clone(),
        security_mode: endpoint.security_mode,
        security_policy_uri: endpoint.security_policy_uri.clone(),
        transport_profile_uri: endpoint.transport_profile_uri.clone(),
        security_level: endpoint.security_level,
        server: endpoint.server.clone(),
        token_policies: endpoint
            .user_identity_tokens
            .iter()
            .map(|t| format!("{} ({})", t.policy_id, t.token_type))
            .collect(),
        certificate,
        certificate_error,
    }
}

impl fmt::Display for EndpointSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Endpoint: {}", self.endpoint_url)?;
        writeln!(
            f,
            "  Security: {}/{} (level {})",
            self.security_mode,
            SecurityPolicy::short_name(&self.security_policy_uri),
            self.security_level
        )?;
        writeln!(f, "  Transport: {}", self.transport_profile_uri)?;
        writeln!(
            f,
            "  Server: {} ({}) [{}]",
            self.server.application_name, self.server.application_uri, self.server.application_type
        )?;
        writeln!(f, "  Product: {}", self.server.product_uri)?;
        if let Some(gateway) = &self.server.gateway_server_uri {
            writeln!(f, "  Gateway: {}", gateway)?;
        }
        if let Some(profile) = &self.server.discovery_profile_uri {
            writeln!(f, "  Discovery profile: {}", profile)?;
        }
        if !self.server.discovery_urls.is_empty() {
            writeln!(f, "  Discovery URLs: {}", self.server.discovery_urls.join(", "))?;
        }
        writeln!(f, "  Tokens: {}", self.token_policies.join(", "))?;

        match (&self.certificate, &self.certificate_error) {
            (Some(cert), _) => {
                writeln!(f, "  Certificate:")?;
                writeln!(f, "    Subject: {}", cert.subject)?;
                writeln!(f, "    Issuer: {}", cert.issuer)?;
                writeln!(f, "    Serial: {}", cert.serial_number)?;
                writeln!(f, "    NotBefore: {}", cert.not_before)?;
                writeln!(f, "    NotAfter: {}", cert.not_after)?;
                writeln!(f, "    DNSNames: {}", cert.dns_names.join(", "))?;
                let ips: Vec<String> = cert.ip_addresses.iter().map(ToString::to_string).collect();
                writeln!(f, "    IPAddresses: {}", ips.join(", "))?;
                writeln!(f, "    URIs: {}", cert.uris.join(", "))?;
                writeln!(f, "    SHA256: {}", cert.fingerprint_sha256)?;
                write!(f, "    SelfSigned: {}", cert.self_signed)
            }
            (None, Some(error)) => write!(f, "  Certificate: <{}>", error),
            (None, None) => write!(f, "  Certificate: <none>"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TokenKind;
    use chrono::Duration;

    fn make_cert(names: &[&str], not_before: (i32, u8, u8), not_after: (i32, u8, u8)) -> rcgen::Certificate {
        let mut params =
            rcgen::CertificateParams::new(names.iter().map(|s| s.to_string()).collect::<Vec<_>>())
                .unwrap();
        params
            .subject_alt_names
            .push(rcgen::SanType::URI("urn:demo:plc".try_into().unwrap()));
        params.not_before = rcgen::date_time_ymd(not_before.0, not_before.1, not_before.2);
        params.not_after = rcgen::date_time_ymd(not_after.0, not_after.1, not_after.2);
        let key = rcgen::KeyPair::generate().unwrap();
        params.self_signed(&key).unwrap()
    }

    fn valid_cert() -> rcgen::Certificate {
        make_cert(&["plc.local", "*.plant.local", "10.0.0.5"], (2020, 1, 1), (2090, 1, 1))
    }

    fn policy(hostname: &str) -> ValidationPolicy {
        ValidationPolicy {
            verify: true,
            hostname: Some(hostname.to_string()),
            trusted_fingerprints: Vec::new(),
        }
    }

    #[test]
    fn test_decode_der_fields() {
        let cert = valid_cert();
        let info = decode_certificate(cert.der()).unwrap();

        assert_eq!(info.dns_names, vec!["plc.local", "*.plant.local"]);
        assert_eq!(info.ip_addresses, vec!["10.0.0.5".parse::<IpAddr>().unwrap()]);
        assert_eq!(info.uris, vec!["urn:demo:plc"]);
        assert!(info.self_signed);
        assert_eq!(info.fingerprint_sha256.len(), 64);
        assert_eq!(info.fingerprint_sha256, to_hex(&Sha256::digest(cert.der())));
        assert!(info.not_before < info.not_after);
        assert!(!info.serial_number.is_empty());
    }

    #[test]
    fn test_decode_pem_matches_der() {
        let cert = valid_cert();
        let from_der = decode_certificate(cert.der()).unwrap();
        let from_pem = decode_certificate(cert.pem().as_bytes()).unwrap();
        assert_eq!(from_der, from_pem);
    }

    #[test]
    fn test_decode_garbage() {
        assert!(matches!(
            decode_certificate(&[0x01, 0x02, 0x03]),
            Err(CertificateError::Decode { .. })
        ));
        assert!(decode_certificate(&[]).is_err());
        assert!(decode_certificate(b"-----BEGIN CERTIFICATE-----\n!!\n").is_err());
    }

    #[test]
    fn test_covers_host() {
        let info = decode_certificate(valid_cert().der()).unwrap();
        assert!(info.covers_host("plc.local"));
        assert!(info.covers_host("PLC.LOCAL"));
        assert!(info.covers_host("line1.plant.local"));
        assert!(!info.covers_host("a.b.plant.local"));
        assert!(!info.covers_host("plant.local"));
        assert!(info.covers_host("10.0.0.5"));
        assert!(!info.covers_host("10.0.0.6"));
        assert!(!info.covers_host("other.local"));
    }

    #[test]
    fn test_validate_expiry() {
        let expired = decode_certificate(make_cert(&["plc.local"], (2001, 1, 1), (2002, 1, 1)).der()).unwrap();
        let inspector = CertificateInspector::new(policy("plc.local"));
        assert!(matches!(
            inspector.validate(&expired, Utc::now()),
            Err(CertificateError::Expired { .. })
        ));

        let info = decode_certificate(valid_cert().der()).unwrap();
        let before = info.not_before - Duration::days(1);
        assert!(matches!(
            inspector.validate(&info, before),
            Err(CertificateError::NotYetValid { .. })
        ));
        assert!(inspector.validate(&info, Utc::now()).is_ok());
    }

    #[test]
    fn test_validate_hostname_mismatch() {
        let info = decode_certificate(valid_cert().der()).unwrap();
        let inspector = CertificateInspector::new(policy("historian.local"));
        match inspector.validate(&info, Utc::now()) {
            Err(CertificateError::HostnameMismatch { hostname, names }) => {
                assert_eq!(hostname, "historian.local");
                assert!(names.contains(&"10.0.0.5".to_string()));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_validate_trusted_fingerprints() {
        let info = decode_certificate(valid_cert().der()).unwrap();
        let mut p = policy("plc.local");
        p.trusted_fingerprints = vec!["00".repeat(32)];
        let inspector = CertificateInspector::new(p.clone());
        assert!(matches!(
            inspector.validate(&info, Utc::now()),
            Err(CertificateError::Untrusted { .. })
        ));

        p.trusted_fingerprints.push(info.fingerprint_sha256.clone());
        assert!(CertificateInspector::new(p).validate(&info, Utc::now()).is_ok());
    }

    #[test]
    fn test_check_endpoint_secured_without_certificate() {
        let endpoint = EndpointDescriptor::new(
            "opc.tcp://plc.local:4840",
            SecurityMode::SignAndEncrypt,
            SecurityPolicy::Basic256Sha256,
        );
        let inspector = CertificateInspector::new(policy("plc.local"));
        assert!(matches!(
            inspector.check_endpoint(&endpoint),
            Err(CertificateError::Missing { .. })
        ));
    }

    #[test]
    fn test_check_endpoint_unsecured_ignores_bad_certificate() {
        let endpoint = EndpointDescriptor::new(
            "opc.tcp://plc.local:4840",
            SecurityMode::None,
            SecurityPolicy::None,
        )
        .with_certificate(vec![0xde, 0xad]);
        let inspector = CertificateInspector::new(policy("plc.local"));
        assert_eq!(inspector.check_endpoint(&endpoint).unwrap(), None);
    }

    #[test]
    fn test_check_endpoint_without_verification() {
        let expired = make_cert(&["elsewhere"], (2001, 1, 1), (2002, 1, 1));
        let endpoint = EndpointDescriptor::new(
            "opc.tcp://plc.local:4840",
            SecurityMode::Sign,
            SecurityPolicy::Basic256Sha256,
        )
        .with_certificate(expired.der().to_vec());
        let inspector = CertificateInspector::new(ValidationPolicy::permissive());
        assert!(inspector.check_endpoint(&endpoint).unwrap().is_some());
    }

    #[test]
    fn test_describe_endpoint() {
        let cert = valid_cert();
        let endpoint = EndpointDescriptor::new(
            "opc.tcp://plc.local:4840",
            SecurityMode::Sign,
            SecurityPolicy::Basic256Sha256,
        )
        .with_security_level(3)
        .with_token("anonymous", TokenKind::Anonymous)
        .with_token("username_basic256", TokenKind::UserName)
        .with_certificate(cert.der().to_vec());

        let summary = describe_endpoint(&endpoint);
        assert_eq!(summary.token_policies.len(), 2);
        assert!(summary.certificate.is_some());

        let text = summary.to_string();
        assert!(text.contains("Sign/Basic256Sha256 (level 3)"));
        assert!(text.contains("username_basic256 (UserName)"));
        assert!(text.contains("DNSNames: plc.local, *.plant.local"));
        assert!(text.contains("IPAddresses: 10.0.0.5"));

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["security_level"], 3);
    }

    #[test]
    fn test_describe_endpoint_without_certificate() {
        let endpoint =
            EndpointDescriptor::new("opc.tcp://plc:4840", SecurityMode::None, SecurityPolicy::None);
        let text = describe_endpoint(&endpoint).to_string();
        assert!(text.ends_with("Certificate: <none>"));
    }
}
