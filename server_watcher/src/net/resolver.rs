use async_trait::async_trait;
use hickory_resolver::config::ResolverConfig;
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::Resolver;
use log::{debug, warn};
use std::fmt;
use std::net::IpAddr;

/// Outcome of resolving a hostname
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resolved {
    /// The hostname resolved to this address
    Address(IpAddr),
    /// The hostname could not be resolved
    None,
}

impl Resolved {
    pub fn address(&self) -> Option<IpAddr> {
        match self {
            Resolved::Address(ip) => Some(*ip),
            Resolved::None => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolved::Address(_))
    }
}

impl From<IpAddr> for Resolved {
    fn from(ip: IpAddr) -> Self {
        Resolved::Address(ip)
    }
}

impl fmt::Display for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolved::Address(ip) => write!(f, "{}", ip),
            Resolved::None => write!(f, "none"),
        }
    }
}

/// Resolves hostnames to a single address.
///
/// Implementations must report failures as [`Resolved::None`] rather than erroring.
#[async_trait]
pub trait DnsResolver: Send + Sync {
    async fn resolve(&self, hostname: &str) -> Resolved;
}

/// DNS resolver backed by hickory, using the system resolver configuration
#[derive(Debug, Clone, Default)]
pub struct HickoryDnsResolver;

impl HickoryDnsResolver {
    pub fn new() -> Self {
        Self
    }

    fn create_resolver(&self) -> Resolver<TokioConnectionProvider> {
        match Resolver::builder_tokio() {
            Ok(builder) => builder.build(),
            Err(e) => {
                warn!("Failed to load system resolver config, using defaults: {}", e);
                Resolver::builder_with_config(
                    ResolverConfig::default(),
                    TokioConnectionProvider::default(),
                )
                .build()
            }
        }
    }
}

/// Pick the address to check, IPv4 first
pub(crate) fn pick_address(addrs: impl IntoIterator<Item = IpAddr>) -> Resolved {
    let addrs: Vec<IpAddr> = addrs.into_iter().collect();
    addrs
        .iter()
        .find(|ip| ip.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .map(Resolved::Address)
        .unwrap_or(Resolved::None)
}

#[async_trait]
impl DnsResolver for HickoryDnsResolver {
    async fn resolve(&self, hostname: &str) -> Resolved {
        if let Ok(ip) = hostname.parse::<IpAddr>() {
            return Resolved::Address(ip);
        }

        let resolver = self.create_resolver();
        match resolver.lookup_ip(hostname).await {
            Ok(lookup) => {
                let resolved = pick_address(lookup.iter());
                debug!("Resolved {} -> {}", hostname, resolved);
                resolved
            }
            Err(e) => {
                debug!("DNS lookup for {} failed: {}", hostname, e);
                Resolved::None
            }
        }
    }
}
