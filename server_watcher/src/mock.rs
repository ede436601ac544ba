//! Deterministic collaborators for exercising watchers without touching the network.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::net::{DnsResolver, PingStatus, Pinger, Resolved, TcpDialer};

/// Resolver that always answers with the same [`Resolved`] value
#[derive(Debug, Clone)]
pub struct MockDnsResolver {
    resolved: Resolved,
    lookups: Arc<Mutex<Vec<String>>>,
    instances: Arc<AtomicUsize>,
}

impl MockDnsResolver {
    pub fn new(resolved: impl Into<Resolved>) -> Self {
        Self {
            resolved: resolved.into(),
            lookups: Default::default(),
            instances: Default::default(),
        }
    }

    pub fn unresolvable() -> Self {
        Self::new(Resolved::None)
    }

    /// Provider handing out a fresh clone on every call
    pub fn provider(&self) -> impl Fn() -> Option<Box<dyn DnsResolver>> + Send + Sync + 'static {
        let template = self.clone();
        move || {
            template.instances.fetch_add(1, Ordering::SeqCst);
            Some(Box::new(template.clone()) as Box<dyn DnsResolver>)
        }
    }

    /// Hostnames looked up across all instances
    pub async fn lookups(&self) -> Vec<String> {
        self.lookups.lock().await.clone()
    }

    /// Number of instances created by [`Self::provider`]
    pub fn instances(&self) -> usize {
        self.instances.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DnsResolver for MockDnsResolver {
    async fn resolve(&self, hostname: &str) -> Resolved {
        self.lookups.lock().await.push(hostname.to_string());
        self.resolved
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialAttempt {
    pub address: Resolved,
    pub port: u16,
    pub timeout: Option<Duration>,
}

/// Dialer whose connects either all succeed or all fail, whatever the address
#[derive(Debug, Clone)]
pub struct MockTcpDialer {
    accept: bool,
    connected: bool,
    attempts: Arc<Mutex<Vec<DialAttempt>>>,
    instances: Arc<AtomicUsize>,
}

impl MockTcpDialer {
    pub fn accepting() -> Self {
        Self::new(true)
    }

    pub fn refusing() -> Self {
        Self::new(false)
    }

    fn new(accept: bool) -> Self {
        Self {
            accept,
            connected: false,
            attempts: Default::default(),
            instances: Default::default(),
        }
    }

    pub fn provider(&self) -> impl Fn() -> Option<Box<dyn TcpDialer>> + Send + Sync + 'static {
        let template = self.clone();
        move || {
            template.instances.fetch_add(1, Ordering::SeqCst);
            Some(Box::new(template.clone()) as Box<dyn TcpDialer>)
        }
    }

    pub async fn attempts(&self) -> Vec<DialAttempt> {
        self.attempts.lock().await.clone()
    }

    pub fn instances(&self) -> usize {
        self.instances.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TcpDialer for MockTcpDialer {
    async fn connect(&mut self, address: Resolved, port: u16, timeout: Option<Duration>) {
        self.attempts.lock().await.push(DialAttempt {
            address,
            port,
            timeout,
        });
        self.connected = self.accept;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingAttempt {
    pub address: Resolved,
    pub timeout: Option<Duration>,
}

/// Pinger that always reports the same [`PingStatus`]
#[derive(Debug, Clone)]
pub struct MockPinger {
    status: PingStatus,
    attempts: Arc<Mutex<Vec<PingAttempt>>>,
    instances: Arc<AtomicUsize>,
}

impl MockPinger {
    pub fn new(status: PingStatus) -> Self {
        Self {
            status,
            attempts: Default::default(),
            instances: Default::default(),
        }
    }

    pub fn provider(&self) -> impl Fn() -> Option<Box<dyn Pinger>> + Send + Sync + 'static {
        let template = self.clone();
        move || {
            template.instances.fetch_add(1, Ordering::SeqCst);
            Some(Box::new(template.clone()) as Box<dyn Pinger>)
        }
    }

    pub async fn attempts(&self) -> Vec<PingAttempt> {
        self.attempts.lock().await.clone()
    }

    pub fn instances(&self) -> usize {
        self.instances.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Pinger for MockPinger {
    async fn ping(&self, address: Resolved, timeout: Option<Duration>) -> PingStatus {
        self.attempts
            .lock()
            .await
            .push(PingAttempt { address, timeout });
        self.status
    }
}
