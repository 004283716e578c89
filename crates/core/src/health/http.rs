//! Plain HTTP/1.1 health checks.

use super::HealthProbe;
use async_trait::async_trait;
use lk_protocol::health_models::HealthCheckSpec;
use std::io;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::trace;

/// Upper bound on how much of a response is read looking for the status line.
const MAX_STATUS_LINE: usize = 1024;

/// Issues `GET <path>` and compares the response status.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpProbe;

impl HttpProbe {
    pub fn new() -> Self {
        Self
    }

    async fn fetch_status(spec: &HealthCheckSpec) -> io::Result<u16> {
        let mut stream = TcpStream::connect((spec.host.as_str(), spec.port)).await?;
        let request = format!(
            "GET {} HTTP/1.1\r\nHost: {}:{}\r\nUser-Agent: lk-health\r\nAccept: */*\r\nConnection: close\r\n\r\n",
            spec.path, spec.host, spec.port
        );
        stream.write_all(request.as_bytes()).await?;

        let mut head = Vec::with_capacity(128);
        let mut chunk = [0u8; 256];
        while !head.windows(2).any(|w| w == b"\r\n") {
            let read = stream.read(&mut chunk).await?;
            if read == 0 || head.len() >= MAX_STATUS_LINE {
                break;
            }
            head.extend_from_slice(&chunk[..read]);
        }

        parse_status_line(&head).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidData, "malformed HTTP status line")
        })
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
    async fn check(&self, spec: &HealthCheckSpec) -> bool {
        match tokio::time::timeout(spec.attempt_timeout, Self::fetch_status(spec)).await {
            Ok(Ok(status)) => {
                trace!(url = %spec.url(), status, "health response");
                spec.is_success(status)
            }
            Ok(Err(error)) => {
                trace!(url = %spec.url(), %error, "health request failed");
                false
            }
            Err(_) => {
                trace!(url = %spec.url(), "health request timed out");
                false
            }
        }
    }
}

/// Extract the status code from `HTTP/1.x NNN reason`.
fn parse_status_line(head: &[u8]) -> Option<u16> {
    let text = std::str::from_utf8(head).ok()?;
    let line = text.split("\r\n").next()?;
    let mut parts = line.split_whitespace();
    if !parts.next()?.starts_with("HTTP/") {
        return None;
    }
    let code = parts.next()?;
    if code.len() != 3 {
        return None;
    }
    code.parse().ok()
}
