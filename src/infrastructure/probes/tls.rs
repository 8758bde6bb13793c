//! Certificate and TLS configuration grading.
//!
//! A first handshake runs against the webpki root store; if that fails the
//! probe retries with verification disabled so it can still inspect the
//! certificate the server presents. Plain-http targets are not applicable
//! here; the pipeline synthesizes the cleartext-transport finding itself.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, ProtocolVersion, RootCertStore, SignatureScheme};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use x509_parser::prelude::*;

use crate::domain::probes::{CertificateOutcome, CertificateProbe, ProbeError};
use crate::domain::value_objects::{Finding, Grade, ScanTarget, Severity};

const EXPIRY_WARNING_DAYS: i64 = 30;

struct TlsConnectionInfo {
    protocol: Option<ProtocolVersion>,
    cert_der: Option<Vec<u8>>,
}

#[derive(Debug, Default)]
pub struct RustlsCertificateProbe;

impl RustlsCertificateProbe {
    pub fn new() -> Self {
        Self
    }

    fn webpki_config() -> ClientConfig {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth()
    }

    fn unverified_config() -> ClientConfig {
        ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate))
            .with_no_client_auth()
    }

    async fn handshake(
        &self,
        target: &ScanTarget,
        verify: bool,
    ) -> Result<TlsConnectionInfo, ProbeError> {
        let config = if verify {
            Self::webpki_config()
        } else {
            Self::unverified_config()
        };
        let connector = TlsConnector::from(Arc::new(config));
        let server_name =
            ServerName::try_from(target.host.clone()).map_err(ProbeError::failure)?;

        let tcp = TcpStream::connect((target.host.as_str(), target.port))
            .await
            .map_err(ProbeError::failure)?;
        let tls = connector
            .connect(server_name, tcp)
            .await
            .map_err(ProbeError::failure)?;

        let (_, connection) = tls.get_ref();
        Ok(TlsConnectionInfo {
            protocol: connection.protocol_version(),
            cert_der: connection
                .peer_certificates()
                .and_then(|certs| certs.first())
                .map(|cert| cert.as_ref().to_vec()),
        })
    }

    fn analyze_certificate(der: &[u8], trusted: bool, findings: &mut Vec<Finding>) {
        let Ok((_, cert)) = X509Certificate::from_der(der) else {
            tracing::warn!("server certificate could not be parsed");
            return;
        };

        let now = Utc::now().timestamp();
        let not_after = cert.validity().not_after.timestamp();
        let not_before = cert.validity().not_before.timestamp();

        if not_after < now {
            findings.push(Finding::new(
                Severity::Critical,
                "Expired Certificate",
                format!(
                    "The certificate for {} expired on {}.",
                    cert.subject(),
                    cert.validity().not_after
                ),
                "Renew the TLS certificate immediately.",
                "certificates",
            ));
        } else if not_after - now < EXPIRY_WARNING_DAYS * 86_400 {
            findings.push(Finding::new(
                Severity::Medium,
                "Certificate Expiring Soon",
                format!(
                    "The certificate expires on {}, within {} days.",
                    cert.validity().not_after,
                    EXPIRY_WARNING_DAYS
                ),
                "Schedule certificate renewal before the expiry date.",
                "certificates",
            ));
        }

        if not_before > now {
            findings.push(Finding::new(
                Severity::Medium,
                "Certificate Not Yet Valid",
                format!(
                    "The certificate only becomes valid on {}.",
                    cert.validity().not_before
                ),
                "Check the server clock and certificate deployment.",
                "certificates",
            ));
        }

        let self_signed = cert.subject().to_string() == cert.issuer().to_string();
        if self_signed && !trusted {
            findings.push(Finding::new(
                Severity::High,
                "Self-Signed Certificate",
                format!("The certificate for {} is self-signed.", cert.subject()),
                "Deploy a certificate issued by a trusted authority.",
                "certificates",
            ));
        }
    }

    fn grade_from(findings: &[Finding]) -> Grade {
        let worst = findings.iter().map(|f| f.severity).min();
        match worst {
            Some(Severity::Critical) => Grade::F,
            Some(Severity::High) => Grade::D,
            Some(Severity::Medium) => Grade::C,
            Some(Severity::Low) => Grade::B,
            Some(Severity::Info) | None => Grade::A,
        }
    }
}

#[async_trait]
impl CertificateProbe for RustlsCertificateProbe {
    async fn grade(&self, target: &ScanTarget) -> Result<CertificateOutcome, ProbeError> {
        if !target.is_https() {
            // Nothing to grade on a cleartext target.
            return Ok(CertificateOutcome::default());
        }

        let mut findings = Vec::new();

        let (connection, trusted) = match self.handshake(target, true).await {
            Ok(info) => (info, true),
            Err(primary) => match self.handshake(target, false).await {
                Ok(info) => (info, false),
                Err(_) => {
                    return Err(ProbeError::failure(format!(
                        "tls handshake failed: {primary}"
                    )));
                }
            },
        };

        if !trusted {
            findings.push(Finding::new(
                Severity::High,
                "Untrusted Certificate Chain",
                format!(
                    "The certificate presented by {} does not chain to a trusted root.",
                    target.host
                ),
                "Install a certificate issued by a publicly trusted authority.",
                "certificates",
            ));
        }

        match connection.protocol {
            Some(ProtocolVersion::TLSv1_3) => {}
            Some(_) => {
                findings.push(Finding::new(
                    Severity::Medium,
                    "Outdated TLS Version",
                    format!(
                        "{} negotiates at most TLS 1.2; TLS 1.3 is not offered.",
                        target.host
                    ),
                    "Enable TLS 1.3 on the server.",
                    "certificates",
                ));
            }
            None => {}
        }

        if let Some(der) = &connection.cert_der {
            Self::analyze_certificate(der, trusted, &mut findings);
        }

        let grade = Some(Self::grade_from(&findings));
        tracing::debug!(host = %target.host, grade = ?grade, "certificate grading finished");

        Ok(CertificateOutcome { findings, grade })
    }
}

/// Verifier used for the diagnostic second handshake only; it records what
/// the server presents without trusting it.
#[derive(Debug)]
struct AcceptAnyCertificate;

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::ED25519,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(severity: Severity) -> Finding {
        Finding::new(severity, "t", "d", "r", "certificates")
    }

    #[test]
    fn grade_tracks_worst_finding() {
        assert_eq!(RustlsCertificateProbe::grade_from(&[]), Grade::A);
        assert_eq!(
            RustlsCertificateProbe::grade_from(&[finding(Severity::Info)]),
            Grade::A
        );
        assert_eq!(
            RustlsCertificateProbe::grade_from(&[finding(Severity::Low)]),
            Grade::B
        );
        assert_eq!(
            RustlsCertificateProbe::grade_from(&[
                finding(Severity::Medium),
                finding(Severity::Critical)
            ]),
            Grade::F
        );
    }

    #[tokio::test]
    async fn http_targets_are_not_applicable() {
        let probe = RustlsCertificateProbe::new();
        let target = ScanTarget {
            url: url::Url::parse("http://example.com/").unwrap(),
            host: "example.com".into(),
            port: 80,
            addresses: vec![],
        };
        let outcome = probe.grade(&target).await.unwrap();
        assert!(outcome.findings.is_empty());
        assert!(outcome.grade.is_none());
    }
}
