use async_trait::async_trait;
use log::debug;

use super::{Watcher, WatcherCheckResult};
use crate::config::{CheckMode, ServerWatcherConfiguration};
use crate::error::{Collaborator, WatcherError};
use crate::net::{PingStatus, Resolved};

pub const WATCHER_TYPE: &str = "server";

/// Result of a server watcher run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerWatcherCheckResult {
    check: WatcherCheckResult,
    hostname: String,
    mode: CheckMode,
    address: Resolved,
    connected: Option<bool>,
    ping_status: Option<PingStatus>,
}

impl ServerWatcherCheckResult {
    pub fn is_valid(&self) -> bool {
        self.check.is_valid()
    }

    pub fn description(&self) -> &str {
        self.check.description()
    }

    pub fn check(&self) -> &WatcherCheckResult {
        &self.check
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn mode(&self) -> CheckMode {
        self.mode
    }

    pub fn address(&self) -> Resolved {
        self.address
    }

    /// Dialer state after the connect attempt, TCP mode only
    pub fn connected(&self) -> Option<bool> {
        self.connected
    }

    /// Echo status, ping mode only
    pub fn ping_status(&self) -> Option<PingStatus> {
        self.ping_status
    }
}

impl From<ServerWatcherCheckResult> for WatcherCheckResult {
    fn from(result: ServerWatcherCheckResult) -> Self {
        result.check
    }
}

/// Checks whether a server accepts TCP connections on a port, or answers
/// ICMP echo when no port is configured.
#[derive(Debug, Clone)]
pub struct ServerWatcher {
    name: String,
    configuration: ServerWatcherConfiguration,
}

impl ServerWatcher {
    pub fn create(name: impl Into<String>, configuration: ServerWatcherConfiguration) -> Self {
        Self {
            name: name.into(),
            configuration,
        }
    }

    pub fn configuration(&self) -> &ServerWatcherConfiguration {
        &self.configuration
    }

    fn missing(&self, collaborator: Collaborator) -> WatcherError {
        WatcherError::MissingCollaborator {
            watcher: self.name.clone(),
            collaborator,
        }
    }

    /// Resolve the hostname, then connect or ping once.
    ///
    /// Collaborators are created from the configured providers on every call.
    pub async fn execute(&self) -> Result<ServerWatcherCheckResult, WatcherError> {
        let config = &self.configuration;
        let resolver = (config.dns_resolver_provider())()
            .ok_or_else(|| self.missing(Collaborator::DnsResolver))?;
        let mut dialer = (config.tcp_dialer_provider())()
            .ok_or_else(|| self.missing(Collaborator::TcpDialer))?;
        let pinger = (config.pinger_provider())()
            .ok_or_else(|| self.missing(Collaborator::Pinger))?;

        let hostname = config.hostname();
        let timeout = config.timeout();
        let mode = config.mode();

        let address = resolver.resolve(hostname).await;
        debug!("{}: {} resolved to {}", self.name, hostname, address);

        let (connected, ping_status) = match mode {
            CheckMode::Tcp { port } => {
                dialer.connect(address, port, timeout).await;
                (Some(dialer.is_connected()), None)
            }
            CheckMode::Ping => (None, Some(pinger.ping(address, timeout).await)),
        };

        let reachable = address.is_resolved()
            && (connected == Some(true) || ping_status.is_some_and(|s| s.is_success()));
        let description = describe(hostname, &address, mode, reachable);
        debug!("{}: {}", self.name, description);

        let check = if reachable {
            WatcherCheckResult::valid(&self.name, WATCHER_TYPE, description)
        } else {
            WatcherCheckResult::invalid(&self.name, WATCHER_TYPE, description)
        };

        Ok(ServerWatcherCheckResult {
            check,
            hostname: hostname.to_string(),
            mode,
            address,
            connected,
            ping_status,
        })
    }
}

/// Failures name both possible causes without saying which one occurred.
fn describe(hostname: &str, address: &Resolved, mode: CheckMode, reachable: bool) -> String {
    match (mode, reachable) {
        (CheckMode::Tcp { port }, true) => format!(
            "Successfully connected to the hostname '{}' using IP address: '{}' and port: {}.",
            hostname, address, port
        ),
        (CheckMode::Ping, true) => format!(
            "Successfully connected to the hostname '{}' using IP address: '{}'.",
            hostname, address
        ),
        (CheckMode::Tcp { port }, false) => format!(
            "Could not resolve the hostname '{}' or connect to the server using IP address: '{}' and port: {}.",
            hostname, address, port
        ),
        (CheckMode::Ping, false) => format!(
            "Could not resolve the hostname '{}' or ping the server using IP address: '{}'.",
            hostname, address
        ),
    }
}

#[async_trait]
impl Watcher for ServerWatcher {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self) -> Result<WatcherCheckResult, WatcherError> {
        Ok(ServerWatcher::execute(self).await?.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{DialAttempt, MockDnsResolver, MockPinger, MockTcpDialer, PingAttempt};
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;

    const HOSTNAME: &str = "website.com";
    const PORT: i32 = 80;
    const IP: IpAddr = IpAddr::V4(Ipv4Addr::new(36, 20, 24, 143));

    struct Fixture {
        resolver: MockDnsResolver,
        dialer: MockTcpDialer,
        pinger: MockPinger,
    }

    impl Fixture {
        fn new(resolved: Resolved, dialer: MockTcpDialer, status: PingStatus) -> Self {
            Self {
                resolver: MockDnsResolver::new(resolved),
                dialer,
                pinger: MockPinger::new(status),
            }
        }

        fn watcher(&self, port: Option<i32>) -> ServerWatcher {
            let builder = match port {
                Some(p) => ServerWatcherConfiguration::create_with_port(HOSTNAME, p),
                None => ServerWatcherConfiguration::create(HOSTNAME),
            };
            let config = builder
                .with_dns_resolver_provider(self.resolver.provider())
                .with_tcp_dialer_provider(self.dialer.provider())
                .with_pinger_provider(self.pinger.provider())
                .build()
                .unwrap();
            ServerWatcher::create("Server watcher", config)
        }
    }

    #[tokio::test]
    async fn test_null_dns_resolver() {
        let config = ServerWatcherConfiguration::create_with_port(HOSTNAME, PORT)
            .with_dns_resolver_provider(|| None)
            .build()
            .unwrap();
        let watcher = ServerWatcher::create("Server watcher", config);

        let err = watcher.execute().await.unwrap_err();
        assert_eq!(
            err,
            WatcherError::MissingCollaborator {
                watcher: "Server watcher".to_string(),
                collaborator: Collaborator::DnsResolver,
            }
        );
    }

    #[tokio::test]
    async fn test_null_tcp_dialer() {
        let fixture = Fixture::new(IP.into(), MockTcpDialer::accepting(), PingStatus::Success);
        let config = ServerWatcherConfiguration::create_with_port(HOSTNAME, PORT)
            .with_dns_resolver_provider(fixture.resolver.provider())
            .with_tcp_dialer_provider(|| None)
            .build()
            .unwrap();
        let watcher = ServerWatcher::create("Server watcher", config);

        let err = watcher.execute().await.unwrap_err();
        assert!(matches!(
            err,
            WatcherError::MissingCollaborator {
                collaborator: Collaborator::TcpDialer,
                ..
            }
        ));
        assert!(fixture.resolver.lookups().await.is_empty());
    }

    #[tokio::test]
    async fn test_null_pinger() {
        let config = ServerWatcherConfiguration::create(HOSTNAME)
            .with_pinger_provider(|| None)
            .build()
            .unwrap();
        let watcher = ServerWatcher::create("Ping watcher", config);

        let err = watcher.execute().await.unwrap_err();
        assert!(matches!(
            err,
            WatcherError::MissingCollaborator {
                collaborator: Collaborator::Pinger,
                ..
            }
        ));
        assert!(err.to_string().contains("'Ping watcher'"));
    }

    #[tokio::test]
    async fn test_server_accepts_connection() {
        let fixture = Fixture::new(IP.into(), MockTcpDialer::accepting(), PingStatus::Success);
        let watcher = fixture.watcher(Some(PORT));

        let result = watcher.execute().await.unwrap();
        assert!(result.is_valid());
        assert!(result
            .description()
            .starts_with("Successfully connected to the hostname"));
        assert_eq!(result.address(), Resolved::Address(IP));
        assert_eq!(result.connected(), Some(true));
        assert_eq!(result.ping_status(), None);
        assert_eq!(fixture.dialer.attempts().await.len(), 1);
        assert!(fixture.pinger.attempts().await.is_empty());
        assert_eq!(fixture.resolver.lookups().await, vec![HOSTNAME.to_string()]);
    }

    #[tokio::test]
    async fn test_server_refuses_connection() {
        let fixture = Fixture::new(IP.into(), MockTcpDialer::refusing(), PingStatus::Unknown);
        let watcher = fixture.watcher(Some(PORT));

        let result = watcher.execute().await.unwrap();
        assert!(!result.is_valid());
        assert!(result
            .description()
            .starts_with("Could not resolve the hostname"));
        assert_eq!(result.connected(), Some(false));
        assert_eq!(
            fixture.dialer.attempts().await,
            vec![DialAttempt {
                address: Resolved::Address(IP),
                port: 80,
                timeout: None,
            }]
        );
    }

    #[tokio::test]
    async fn test_refused_even_when_ping_succeeds() {
        let fixture = Fixture::new(IP.into(), MockTcpDialer::refusing(), PingStatus::Success);
        let result = fixture.watcher(Some(PORT)).execute().await.unwrap();
        assert!(!result.is_valid());
        assert!(fixture.pinger.attempts().await.is_empty());
    }

    #[tokio::test]
    async fn test_hostname_cannot_be_resolved() {
        let fixture = Fixture {
            resolver: MockDnsResolver::unresolvable(),
            dialer: MockTcpDialer::accepting(),
            pinger: MockPinger::new(PingStatus::Success),
        };

        for port in [Some(PORT), None] {
            let result = fixture.watcher(port).execute().await.unwrap();
            assert!(!result.is_valid());
            assert!(result
                .description()
                .starts_with("Could not resolve the hostname"));
            assert!(result.description().contains("'none'"));
            assert_eq!(result.address(), Resolved::None);
        }

        // each mode still dials or pings once, with no address
        assert_eq!(
            fixture.dialer.attempts().await,
            vec![DialAttempt {
                address: Resolved::None,
                port: 80,
                timeout: None,
            }]
        );
        assert_eq!(
            fixture.pinger.attempts().await,
            vec![PingAttempt {
                address: Resolved::None,
                timeout: None,
            }]
        );
    }

    #[tokio::test]
    async fn test_watcher_keeps_configuration() {
        let fixture = Fixture::new(IP.into(), MockTcpDialer::accepting(), PingStatus::Success);
        let watcher = fixture.watcher(Some(PORT));
        watcher.execute().await.unwrap();
        watcher.execute().await.unwrap();

        let config = watcher.configuration();
        assert_eq!(config.hostname(), HOSTNAME);
        assert_eq!(config.port(), Some(80));
        assert_eq!(config.mode(), CheckMode::Tcp { port: 80 });
        assert_eq!(config.timeout(), None);
    }

    #[tokio::test]
    async fn test_ping_only_success() {
        let fixture = Fixture::new(IP.into(), MockTcpDialer::refusing(), PingStatus::Success);
        let result = fixture.watcher(None).execute().await.unwrap();

        assert!(result.is_valid());
        assert_eq!(result.mode(), CheckMode::Ping);
        assert_eq!(result.ping_status(), Some(PingStatus::Success));
        assert_eq!(
            result.description(),
            "Successfully connected to the hostname 'website.com' using IP address: '36.20.24.143'."
        );
        assert!(fixture.dialer.attempts().await.is_empty());
        assert_eq!(fixture.pinger.attempts().await.len(), 1);
    }

    #[tokio::test]
    async fn test_ping_only_failure_statuses() {
        for status in [
            PingStatus::TimedOut,
            PingStatus::DestinationUnreachable,
            PingStatus::TtlExpired,
            PingStatus::BadReply,
            PingStatus::Unknown,
        ] {
            let fixture = Fixture::new(IP.into(), MockTcpDialer::accepting(), status);
            let result = fixture.watcher(None).execute().await.unwrap();
            assert!(!result.is_valid(), "{} should not be reachable", status);
            assert!(result
                .description()
                .starts_with("Could not resolve the hostname"));
            assert_eq!(result.ping_status(), Some(status));
        }
    }

    #[tokio::test]
    async fn test_timeout_passed_through() {
        let timeout = Duration::from_millis(250);
        let fixture = Fixture::new(IP.into(), MockTcpDialer::accepting(), PingStatus::Success);

        let tcp = ServerWatcherConfiguration::create_with_port(HOSTNAME, PORT)
            .with_timeout(timeout)
            .with_dns_resolver_provider(fixture.resolver.provider())
            .with_tcp_dialer_provider(fixture.dialer.provider())
            .with_pinger_provider(fixture.pinger.provider())
            .build()
            .unwrap();
        ServerWatcher::create("tcp", tcp).execute().await.unwrap();

        let ping = ServerWatcherConfiguration::create(HOSTNAME)
            .with_timeout(timeout)
            .with_dns_resolver_provider(fixture.resolver.provider())
            .with_tcp_dialer_provider(fixture.dialer.provider())
            .with_pinger_provider(fixture.pinger.provider())
            .build()
            .unwrap();
        ServerWatcher::create("ping", ping).execute().await.unwrap();

        assert_eq!(fixture.dialer.attempts().await[0].timeout, Some(timeout));
        assert_eq!(
            fixture.pinger.attempts().await,
            vec![PingAttempt {
                address: Resolved::Address(IP),
                timeout: Some(timeout),
            }]
        );
    }

    #[tokio::test]
    async fn test_execute_is_idempotent() {
        let fixture = Fixture::new(IP.into(), MockTcpDialer::accepting(), PingStatus::Success);
        let watcher = fixture.watcher(Some(PORT));

        let first = watcher.execute().await.unwrap();
        let second = watcher.execute().await.unwrap();
        assert_eq!(first, second);

        // fresh collaborators on every run
        assert_eq!(fixture.resolver.instances(), 2);
        assert_eq!(fixture.dialer.instances(), 2);
        assert_eq!(fixture.pinger.instances(), 2);
        assert_eq!(fixture.dialer.attempts().await.len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_executions() {
        let fixture = Fixture::new(IP.into(), MockTcpDialer::accepting(), PingStatus::Success);
        let watcher = fixture.watcher(Some(PORT));

        let (a, b) = tokio::join!(watcher.execute(), watcher.execute());
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(fixture.dialer.instances(), 2);
    }

    #[tokio::test]
    async fn test_watcher_trait() {
        let fixture = Fixture::new(IP.into(), MockTcpDialer::accepting(), PingStatus::Success);
        let watcher: Box<dyn Watcher> = Box::new(fixture.watcher(Some(PORT)));

        assert_eq!(watcher.name(), "Server watcher");
        let result = watcher.execute().await.unwrap();
        assert!(result.is_valid());
        assert_eq!(result.watcher_type(), WATCHER_TYPE);
        assert_eq!(
            result.description(),
            "Successfully connected to the hostname 'website.com' using IP address: '36.20.24.143' and port: 80."
        );
    }

    #[tokio::test]
    async fn test_against_loopback_listener() {
        env_logger::try_init().ok();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let port = listener.local_addr().expect("No local address").port();
        tokio::spawn(async move {
            while let Ok((_stream, _addr)) = listener.accept().await {}
        });

        let config = ServerWatcherConfiguration::create_with_port("127.0.0.1", port as i32)
            .with_timeout(Duration::from_secs(1))
            .build()
            .unwrap();
        let result = ServerWatcher::create("loopback", config)
            .execute()
            .await
            .unwrap();
        assert!(result.is_valid(), "{}", result.description());
    }
}
