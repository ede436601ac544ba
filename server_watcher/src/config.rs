use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ConfigError;
use crate::net::{
    DnsResolver, HickoryDnsResolver, IcmpPinger, Pinger, TcpDialer, TokioTcpDialer,
};

/// Creates a fresh [`DnsResolver`] for each watcher run
pub type DnsResolverProvider = Arc<dyn Fn() -> Option<Box<dyn DnsResolver>> + Send + Sync>;
/// Creates a fresh [`TcpDialer`] for each watcher run
pub type TcpDialerProvider = Arc<dyn Fn() -> Option<Box<dyn TcpDialer>> + Send + Sync>;
/// Creates a fresh [`Pinger`] for each watcher run
pub type PingerProvider = Arc<dyn Fn() -> Option<Box<dyn Pinger>> + Send + Sync>;

fn default_dns_resolver_provider() -> DnsResolverProvider {
    Arc::new(|| Some(Box::new(HickoryDnsResolver::new()) as Box<dyn DnsResolver>))
}

fn default_tcp_dialer_provider() -> TcpDialerProvider {
    Arc::new(|| Some(Box::new(TokioTcpDialer::new()) as Box<dyn TcpDialer>))
}

fn default_pinger_provider() -> PingerProvider {
    Arc::new(|| Some(Box::new(IcmpPinger::new()) as Box<dyn Pinger>))
}

/// How the server is checked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckMode {
    /// TCP handshake against a port
    Tcp { port: u16 },
    /// ICMP echo, used when no port is configured
    Ping,
}

/// Validated settings for a server watcher
#[derive(Clone)]
pub struct ServerWatcherConfiguration {
    hostname: String,
    port: Option<u16>,
    timeout: Option<Duration>,
    dns_resolver_provider: DnsResolverProvider,
    tcp_dialer_provider: TcpDialerProvider,
    pinger_provider: PingerProvider,
}

impl ServerWatcherConfiguration {
    /// Start a ping-only configuration
    pub fn create(hostname: impl Into<String>) -> ServerWatcherConfigurationBuilder {
        ServerWatcherConfigurationBuilder::new(hostname.into(), None)
    }

    /// Start a TCP-connect configuration
    pub fn create_with_port(
        hostname: impl Into<String>,
        port: i32,
    ) -> ServerWatcherConfigurationBuilder {
        ServerWatcherConfigurationBuilder::new(hostname.into(), Some(port))
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn mode(&self) -> CheckMode {
        match self.port {
            Some(port) => CheckMode::Tcp { port },
            None => CheckMode::Ping,
        }
    }

    pub fn dns_resolver_provider(&self) -> &DnsResolverProvider {
        &self.dns_resolver_provider
    }

    pub fn tcp_dialer_provider(&self) -> &TcpDialerProvider {
        &self.tcp_dialer_provider
    }

    pub fn pinger_provider(&self) -> &PingerProvider {
        &self.pinger_provider
    }
}

impl fmt::Debug for ServerWatcherConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerWatcherConfiguration")
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Fluent builder for [`ServerWatcherConfiguration`], validated in [`Self::build`]
pub struct ServerWatcherConfigurationBuilder {
    hostname: String,
    port: Option<i32>,
    timeout: Option<Duration>,
    dns_resolver_provider: DnsResolverProvider,
    tcp_dialer_provider: TcpDialerProvider,
    pinger_provider: PingerProvider,
}

impl ServerWatcherConfigurationBuilder {
    fn new(hostname: String, port: Option<i32>) -> Self {
        Self {
            hostname,
            port,
            timeout: None,
            dns_resolver_provider: default_dns_resolver_provider(),
            tcp_dialer_provider: default_tcp_dialer_provider(),
            pinger_provider: default_pinger_provider(),
        }
    }

    /// Timeout for the TCP connect or ping attempt
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_dns_resolver_provider<F>(mut self, provider: F) -> Self
    where
        F: Fn() -> Option<Box<dyn DnsResolver>> + Send + Sync + 'static,
    {
        self.dns_resolver_provider = Arc::new(provider);
        self
    }

    pub fn with_tcp_dialer_provider<F>(mut self, provider: F) -> Self
    where
        F: Fn() -> Option<Box<dyn TcpDialer>> + Send + Sync + 'static,
    {
        self.tcp_dialer_provider = Arc::new(provider);
        self
    }

    pub fn with_pinger_provider<F>(mut self, provider: F) -> Self
    where
        F: Fn() -> Option<Box<dyn Pinger>> + Send + Sync + 'static,
    {
        self.pinger_provider = Arc::new(provider);
        self
    }

    pub fn build(self) -> Result<ServerWatcherConfiguration, ConfigError> {
        let hostname = self.hostname.trim();
        if hostname.is_empty() {
            return Err(ConfigError::EmptyHostname);
        }
        if hostname.contains("://") {
            return Err(ConfigError::HostnameWithProtocol(hostname.to_string()));
        }

        let port = match self.port {
            Some(p) if p < 0 => return Err(ConfigError::NegativePort(p)),
            Some(p) => Some(u16::try_from(p).map_err(|_| ConfigError::PortOutOfRange(p))?),
            None => None,
        };

        Ok(ServerWatcherConfiguration {
            hostname: hostname.to_string(),
            port,
            timeout: self.timeout,
            dns_resolver_provider: self.dns_resolver_provider,
            tcp_dialer_provider: self.tcp_dialer_provider,
            pinger_provider: self.pinger_provider,
        })
    }
}

/// Server check as read from a settings file
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ServerCheckConfig {
    /// Human-readable name for this check
    pub name: String,
    /// Hostname or IP address, without protocol
    pub hostname: String,
    /// TCP port, ping-only when absent
    pub port: Option<i32>,
    /// Connect / ping timeout in milliseconds
    pub timeout_ms: Option<u64>,
}

impl ServerCheckConfig {
    /// Build a configuration wired to the production collaborators
    pub fn build(&self) -> Result<ServerWatcherConfiguration, ConfigError> {
        let builder = match self.port {
            Some(port) => ServerWatcherConfiguration::create_with_port(&self.hostname, port),
            None => ServerWatcherConfiguration::create(&self.hostname),
        };
        match self.timeout_ms {
            Some(ms) => builder.with_timeout(Duration::from_millis(ms)).build(),
            None => builder.build(),
        }
    }
}
