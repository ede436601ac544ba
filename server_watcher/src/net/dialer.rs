use async_trait::async_trait;
use log::debug;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::Resolved;

/// Attempts TCP connections.
///
/// A failed attempt is not an error: callers inspect [`TcpDialer::is_connected`]
/// after [`TcpDialer::connect`] returns. Connecting to [`Resolved::None`] leaves
/// the dialer disconnected.
#[async_trait]
pub trait TcpDialer: Send + Sync {
    async fn connect(&mut self, address: Resolved, port: u16, timeout: Option<Duration>);

    fn is_connected(&self) -> bool;
}

/// TCP dialer backed by a tokio [`TcpStream`].
///
/// The stream stays open until the dialer is dropped.
#[derive(Debug, Default)]
pub struct TokioTcpDialer {
    stream: Option<TcpStream>,
}

impl TokioTcpDialer {
    pub fn new() -> Self {
        Self { stream: None }
    }
}

#[async_trait]
impl TcpDialer for TokioTcpDialer {
    async fn connect(&mut self, address: Resolved, port: u16, connect_timeout: Option<Duration>) {
        let Resolved::Address(ip) = address else {
            debug!("TCP connect skipped, no address to port {}", port);
            self.stream = None;
            return;
        };
        let target = SocketAddr::new(ip, port);
        debug!("TCP connecting to {}", target);

        let result = match connect_timeout {
            Some(t) => match timeout(t, TcpStream::connect(target)).await {
                Ok(r) => r,
                Err(_) => {
                    debug!("TCP connect to {} timed out after {:?}", target, t);
                    self.stream = None;
                    return;
                }
            },
            None => TcpStream::connect(target).await,
        };

        self.stream = match result {
            Ok(stream) => {
                debug!("TCP connect to {} succeeded", target);
                Some(stream)
            }
            Err(e) => {
                debug!("TCP connect to {} failed: {}", target, e);
                None
            }
        };
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}
