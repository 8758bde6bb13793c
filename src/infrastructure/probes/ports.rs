//! TCP connect scan over a fixed list of common service ports.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::net::TcpStream;
use tokio::sync::Semaphore;
use tokio::time::timeout;

use crate::domain::probes::{DetectedService, PortScanOutcome, PortScanProbe, ProbeError};
use crate::domain::value_objects::{Finding, ScanTarget, Severity};

/// Ports worth probing on a web-facing host.
const COMMON_PORTS: &[(u16, &str)] = &[
    (21, "ftp"),
    (22, "ssh"),
    (23, "telnet"),
    (25, "smtp"),
    (80, "http"),
    (110, "pop3"),
    (143, "imap"),
    (443, "https"),
    (445, "smb"),
    (3306, "mysql"),
    (3389, "rdp"),
    (5432, "postgresql"),
    (6379, "redis"),
    (8080, "http-alt"),
    (8443, "https-alt"),
    (27017, "mongodb"),
];

pub struct TcpPortScanProbe {
    connect_timeout: Duration,
    concurrency: usize,
}

impl TcpPortScanProbe {
    pub fn new(connect_timeout: Duration, concurrency: usize) -> Self {
        Self {
            connect_timeout,
            concurrency: concurrency.max(1),
        }
    }

    fn finding_for(port: u16, service: &str) -> Option<Finding> {
        let finding = match port {
            21 => Finding::new(
                Severity::High,
                "Unencrypted FTP Service Exposed",
                "Port 21 accepts connections; FTP transfers credentials in cleartext.",
                "Disable FTP or replace it with SFTP/FTPS.",
                "ports",
            ),
            23 => Finding::new(
                Severity::Critical,
                "Telnet Service Exposed",
                "Port 23 accepts connections; telnet sessions are unauthenticated-friendly \
                 and unencrypted.",
                "Disable telnet and use SSH for remote administration.",
                "ports",
            ),
            445 => Finding::new(
                Severity::Medium,
                "SMB Service Exposed",
                "Port 445 is reachable from the internet.",
                "Restrict SMB to internal networks.",
                "ports",
            ),
            3306 | 5432 | 27017 => Finding::new(
                Severity::High,
                "Database Port Publicly Reachable",
                format!("The {service} port {port} accepts connections from the internet."),
                "Bind the database to internal interfaces or firewall the port.",
                "ports",
            ),
            6379 => Finding::new(
                Severity::Critical,
                "Redis Port Publicly Reachable",
                "Port 6379 accepts connections; Redis ships without authentication by default.",
                "Firewall the port and require AUTH.",
                "ports",
            ),
            3389 => Finding::new(
                Severity::High,
                "Remote Desktop Exposed",
                "Port 3389 (RDP) accepts connections from the internet.",
                "Put RDP behind a VPN or gateway.",
                "ports",
            ),
            _ => return None,
        };
        Some(finding.with_component(service, None))
    }
}

#[async_trait]
impl PortScanProbe for TcpPortScanProbe {
    async fn scan(&self, target: &ScanTarget) -> Result<PortScanOutcome, ProbeError> {
        let ip = *target
            .addresses
            .first()
            .ok_or_else(|| ProbeError::failure("target has no resolved address"))?;

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let connect_timeout = self.connect_timeout;

        let attempts = COMMON_PORTS.iter().map(|&(port, service)| {
            let semaphore = Arc::clone(&semaphore);
            async move {
                let _permit = semaphore.acquire().await.ok()?;
                let addr = SocketAddr::new(ip, port);
                match timeout(connect_timeout, TcpStream::connect(addr)).await {
                    Ok(Ok(_stream)) => Some(DetectedService {
                        port,
                        service: service.to_string(),
                    }),
                    _ => None,
                }
            }
        });

        let services: Vec<DetectedService> =
            join_all(attempts).await.into_iter().flatten().collect();

        let mut findings: Vec<Finding> = services
            .iter()
            .filter_map(|s| Self::finding_for(s.port, &s.service))
            .collect();

        if !services.is_empty() {
            let listing = services
                .iter()
                .map(|s| format!("{} ({})", s.port, s.service))
                .collect::<Vec<_>>()
                .join(", ");
            findings.push(Finding::new(
                Severity::Info,
                "Open Ports Detected",
                format!("Reachable services on {ip}: {listing}."),
                "Review whether every exposed service is required.",
                "ports",
            ));
        }

        tracing::debug!(host = %target.host, open = services.len(), "port scan finished");

        Ok(PortScanOutcome { findings, services })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risky_ports_produce_findings() {
        assert_eq!(
            TcpPortScanProbe::finding_for(23, "telnet").map(|f| f.severity),
            Some(Severity::Critical)
        );
        assert_eq!(
            TcpPortScanProbe::finding_for(3306, "mysql").map(|f| f.severity),
            Some(Severity::High)
        );
        assert!(TcpPortScanProbe::finding_for(443, "https").is_none());
        assert!(TcpPortScanProbe::finding_for(80, "http").is_none());
    }
}
