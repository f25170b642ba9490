//! Newline-delimited JSON transport over TCP
//!
//! Each call opens a connection, writes the request followed by `\n`, and
//! reads a single reply line. The whole exchange runs under the call timeout.

use async_trait::async_trait;
use peerscore_core::{CoreError, PeerTransport, Result};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

/// Maximum reply size accepted from a peer (4 MiB)
const MAX_REPLY_BYTES: usize = 4 * 1024 * 1024;

/// TCP transport configuration
#[derive(Debug, Clone)]
pub struct TcpTransportConfig {
    /// Maximum reply size in bytes
    pub max_reply_bytes: usize,
}

impl Default for TcpTransportConfig {
    fn default() -> Self {
        Self {
            max_reply_bytes: MAX_REPLY_BYTES,
        }
    }
}

/// Request/response transport over plain TCP
#[derive(Debug, Clone, Default)]
pub struct TcpTransport {
    config: TcpTransportConfig,
}

impl TcpTransport {
    /// Create a new TCP transport
    pub fn new(config: TcpTransportConfig) -> Self {
        Self { config }
    }

    async fn exchange(&self, address: &str, payload: &[u8]) -> Result<Vec<u8>> {
        let mut stream = TcpStream::connect(address)
            .await
            .map_err(|e| CoreError::transport(format!("connect {}: {}", address, e)))?;

        stream.write_all(payload).await?;
        stream.write_all(b"\n").await?;
        stream.flush().await?;

        let limit = self.config.max_reply_bytes as u64 + 1;
        let mut reader = BufReader::new(stream).take(limit);
        let mut line = Vec::new();
        let read = reader.read_until(b'\n', &mut line).await?;
        if read == 0 {
            return Err(CoreError::transport(format!("{} closed without reply", address)));
        }
        if line.last() != Some(&b'\n') && line.len() > self.config.max_reply_bytes {
            return Err(CoreError::transport(format!(
                "reply from {} exceeds {} bytes",
                address, self.config.max_reply_bytes
            )));
        }
        if line.last() == Some(&b'\n') {
            line.pop();
        }
        Ok(line)
    }
}

#[async_trait]
impl PeerTransport for TcpTransport {
    async fn call(&self, address: &str, payload: &[u8], timeout: Duration) -> Result<Vec<u8>> {
        tokio::time::timeout(timeout, self.exchange(address, payload))
            .await
            .map_err(|_| CoreError::Timeout)?
    }
}
