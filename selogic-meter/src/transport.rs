use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio_modbus::client::{tcp, Context};
use tokio_modbus::prelude::*;
use tracing::debug;

use crate::codec::Word;
use crate::error::{ConnectError, ReadError};
use crate::register_map::RegisterBlock;

#[async_trait]
/// Session to a Modbus server able to read holding registers.
///
/// `read_holding_registers` may only be called after a successful `connect`.
/// `close` is idempotent and never fails.
pub trait Transport: Send {
    async fn connect(&mut self) -> Result<(), ConnectError>;

    fn is_connected(&self) -> bool;

    async fn read_holding_registers(
        &mut self,
        block: RegisterBlock,
        timeout: Duration,
    ) -> Result<Vec<Word>, ReadError>;

    async fn close(&mut self);
}

/// Modbus-TCP transport over [tokio-modbus](https://github.com/slowtec/tokio-modbus).
pub struct TcpTransport {
    host: String,
    port: u16,
    connect_timeout: Duration,
    ctx: Option<Context>,
}

impl TcpTransport {
    pub fn new(host: impl Into<String>, port: u16, connect_timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout,
            ctx: None,
        }
    }
}

async fn resolve(host: &str, port: u16) -> Result<SocketAddr, ConnectError> {
    let target = format!("{}:{}", host, port);
    if let Ok(addr) = target.parse::<SocketAddr>() {
        return Ok(addr);
    }
    tokio::net::lookup_host((host, port))
        .await?
        .next()
        .ok_or(ConnectError::InvalidAddress(target))
}

#[async_trait]
impl Transport for TcpTransport {
    async fn connect(&mut self) -> Result<(), ConnectError> {
        if self.ctx.is_some() {
            return Ok(());
        }

        let addr = tokio::time::timeout(self.connect_timeout, resolve(&self.host, self.port))
            .await
            .map_err(|_| ConnectError::Timeout(self.connect_timeout))??;

        let ctx = tokio::time::timeout(self.connect_timeout, tcp::connect(addr))
            .await
            .map_err(|_| ConnectError::Timeout(self.connect_timeout))??;

        debug!("Connected to {}", addr);
        self.ctx = Some(ctx);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.ctx.is_some()
    }

    async fn read_holding_registers(
        &mut self,
        block: RegisterBlock,
        timeout: Duration,
    ) -> Result<Vec<Word>, ReadError> {
        let ctx = self
            .ctx
            .as_mut()
            .ok_or_else(|| ReadError::ConnectionLost("not connected".to_string()))?;
        ctx.set_slave(Slave(block.unit_id));

        let response =
            match tokio::time::timeout(timeout, ctx.read_holding_registers(block.start, block.count))
                .await
            {
                Ok(response) => response,
                Err(_) => {
                    // The request may still be in flight; the session is no longer usable.
                    self.ctx = None;
                    return Err(ReadError::Timeout(timeout));
                }
            };

        let words = match response {
            Ok(Ok(words)) => words,
            Ok(Err(exception)) => {
                return Err(ReadError::ProtocolError(format!(
                    "Exception: {:?}",
                    exception
                )))
            }
            Err(tokio_modbus::Error::Protocol(err)) => {
                return Err(ReadError::ProtocolError(err.to_string()))
            }
            Err(tokio_modbus::Error::Transport(err)) => {
                self.ctx = None;
                return Err(transport_error(err, timeout));
            }
        };

        if words.len() != usize::from(block.count) {
            return Err(ReadError::ProtocolError(format!(
                "expected {} registers, got {}",
                block.count,
                words.len()
            )));
        }

        Ok(words)
    }

    async fn close(&mut self) {
        if let Some(mut ctx) = self.ctx.take() {
            if let Err(err) = ctx.disconnect().await {
                debug!("Disconnect from {}:{} failed: {}", self.host, self.port, err);
            }
        }
    }
}

fn transport_error(err: io::Error, timeout: Duration) -> ReadError {
    match err.kind() {
        io::ErrorKind::TimedOut => ReadError::Timeout(timeout),
        _ => ReadError::ConnectionLost(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_timeouts_map_to_timeout() {
        let err = transport_error(io::Error::from(io::ErrorKind::TimedOut), Duration::from_secs(3));
        assert!(matches!(err, ReadError::Timeout(d) if d == Duration::from_secs(3)));

        let err = transport_error(
            io::Error::from(io::ErrorKind::ConnectionReset),
            Duration::from_secs(3),
        );
        assert!(matches!(err, ReadError::ConnectionLost(_)));
    }

    #[tokio::test]
    async fn read_requires_connection() {
        let mut transport = TcpTransport::new("127.0.0.1", 502, Duration::from_millis(100));
        assert!(!transport.is_connected());

        let err = transport
            .read_holding_registers(RegisterBlock::new(0, 2, 1), Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, ReadError::ConnectionLost(_)));

        // closing an unopened transport is a no-op
        transport.close().await;
        transport.close().await;
    }

    #[tokio::test]
    async fn refused_connection_is_reported() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut transport = TcpTransport::new("127.0.0.1", port, Duration::from_secs(2));
        assert!(transport.connect().await.is_err());
        assert!(!transport.is_connected());
    }
}
