//! Network capabilities used by the server watcher: name resolution, TCP
//! connects and ICMP echo. Each sits behind a trait so a watcher can be
//! wired with alternate implementations.

pub mod dialer;
pub mod pinger;
pub mod resolver;

pub use dialer::{TcpDialer, TokioTcpDialer};
pub use pinger::{IcmpPinger, PingStatus, Pinger, DEFAULT_PING_TIMEOUT};
pub use resolver::{DnsResolver, HickoryDnsResolver, Resolved};
