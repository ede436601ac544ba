use async_trait::async_trait;
use log::debug;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::fmt;
use std::io::{self, Read};
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::{Duration, Instant};

use super::Resolved;

/// Timeout used for a ping when none is configured
pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(5);

const ICMP_ECHO_REPLY: u8 = 0;
const ICMP_DEST_UNREACHABLE: u8 = 3;
const ICMP_ECHO_REQUEST: u8 = 8;
const ICMP_TIME_EXCEEDED: u8 = 11;

const ICMPV6_DEST_UNREACHABLE: u8 = 1;
const ICMPV6_TIME_EXCEEDED: u8 = 3;
const ICMPV6_ECHO_REQUEST: u8 = 128;
const ICMPV6_ECHO_REPLY: u8 = 129;

const IPV6_HEADER_LEN: usize = 40;

const PAYLOAD: &[u8] = b"server-watcher-echo";

static SEQUENCE: AtomicU16 = AtomicU16::new(0);

/// Status of a single echo request. Only [`PingStatus::Success`] counts as reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PingStatus {
    Success,
    TimedOut,
    DestinationUnreachable,
    TtlExpired,
    BadReply,
    Unknown,
}

impl PingStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, PingStatus::Success)
    }
}

impl fmt::Display for PingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PingStatus::Success => "success",
            PingStatus::TimedOut => "timed out",
            PingStatus::DestinationUnreachable => "destination unreachable",
            PingStatus::TtlExpired => "TTL expired",
            PingStatus::BadReply => "bad reply",
            PingStatus::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// Sends ICMP echo requests.
///
/// Pinging [`Resolved::None`] reports [`PingStatus::Unknown`].
#[async_trait]
pub trait Pinger: Send + Sync {
    async fn ping(&self, address: Resolved, timeout: Option<Duration>) -> PingStatus;
}

/// Pinger sending one ICMP / ICMPv6 echo request per call.
///
/// Uses an unprivileged datagram ping socket where the kernel allows it
/// (`net.ipv4.ping_group_range` on Linux) and falls back to a raw socket.
#[derive(Debug, Clone, Default)]
pub struct IcmpPinger;

impl IcmpPinger {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Pinger for IcmpPinger {
    async fn ping(&self, address: Resolved, timeout: Option<Duration>) -> PingStatus {
        let Resolved::Address(address) = address else {
            debug!("Ping skipped, no address");
            return PingStatus::Unknown;
        };
        let timeout = timeout.unwrap_or(DEFAULT_PING_TIMEOUT);
        let sequence = SEQUENCE.fetch_add(1, Ordering::Relaxed);

        match tokio::task::spawn_blocking(move || send_echo(address, timeout, sequence)).await {
            Ok(status) => {
                debug!("Ping {} (seq {}): {}", address, sequence, status);
                status
            }
            Err(e) => {
                debug!("Ping task for {} failed: {}", address, e);
                PingStatus::Unknown
            }
        }
    }
}

struct EchoSocket {
    socket: Socket,
    /// Raw IPv4 sockets deliver the IP header with each packet
    raw: bool,
}

fn open_socket(address: &IpAddr) -> io::Result<EchoSocket> {
    let (domain, protocol) = match address {
        IpAddr::V4(_) => (Domain::IPV4, Protocol::ICMPV4),
        IpAddr::V6(_) => (Domain::IPV6, Protocol::ICMPV6),
    };

    match Socket::new(domain, Type::DGRAM, Some(protocol)) {
        Ok(socket) => Ok(EchoSocket { socket, raw: false }),
        Err(e) => {
            debug!("Datagram ICMP socket unavailable ({}), trying raw socket", e);
            let socket = Socket::new(domain, Type::RAW, Some(protocol))?;
            Ok(EchoSocket { socket, raw: true })
        }
    }
}

fn send_echo(address: IpAddr, timeout: Duration, sequence: u16) -> PingStatus {
    let EchoSocket { mut socket, raw } = match open_socket(&address) {
        Ok(s) => s,
        Err(e) => {
            debug!("Failed to create ICMP socket: {}", e);
            return PingStatus::Unknown;
        }
    };

    let identifier = std::process::id() as u16;
    let packet = echo_request(&address, identifier, sequence);
    let target = SockAddr::from(SocketAddr::new(address, 0));

    if let Err(e) = socket.send_to(&packet, &target) {
        debug!("Failed to send echo request to {}: {}", address, e);
        return status_from_io_error(&e);
    }

    let deadline = Instant::now() + timeout;
    let mut buf = [0u8; 1500];
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return PingStatus::TimedOut;
        }
        if let Err(e) = socket.set_read_timeout(Some(remaining)) {
            debug!("Failed to set read timeout: {}", e);
            return PingStatus::Unknown;
        }

        let len = match socket.read(&mut buf) {
            Ok(len) => len,
            Err(e) => return status_from_io_error(&e),
        };

        let icmp = if raw && address.is_ipv4() {
            strip_ipv4_header(&buf[..len])
        } else {
            Some(&buf[..len])
        };

        // A raw socket sees every ICMP packet on the host; keep reading until ours arrives
        if let Some(status) = icmp.and_then(|p| classify_reply(p, &address, raw, identifier, sequence))
        {
            return status;
        }
    }
}

fn echo_request(address: &IpAddr, identifier: u16, sequence: u16) -> Vec<u8> {
    let kind = match address {
        IpAddr::V4(_) => ICMP_ECHO_REQUEST,
        IpAddr::V6(_) => ICMPV6_ECHO_REQUEST,
    };

    let mut packet = Vec::with_capacity(8 + PAYLOAD.len());
    packet.extend_from_slice(&[kind, 0, 0, 0]);
    packet.extend_from_slice(&identifier.to_be_bytes());
    packet.extend_from_slice(&sequence.to_be_bytes());
    packet.extend_from_slice(PAYLOAD);

    // the kernel fills in the ICMPv6 checksum
    if address.is_ipv4() {
        let sum = checksum(&packet);
        packet[2..4].copy_from_slice(&sum.to_be_bytes());
    }
    packet
}

/// RFC 1071 internet checksum
fn checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = data
        .chunks(2)
        .map(|c| match c {
            [hi, lo] => u16::from_be_bytes([*hi, *lo]) as u32,
            [hi] => u16::from_be_bytes([*hi, 0]) as u32,
            _ => 0,
        })
        .sum();
    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}

fn strip_ipv4_header(packet: &[u8]) -> Option<&[u8]> {
    let ihl = (*packet.first()? & 0x0f) as usize * 4;
    packet.get(ihl..)
}

/// Map an ICMP message to a status, `None` if it is not a reply to our request
fn classify_reply(
    icmp: &[u8],
    address: &IpAddr,
    raw: bool,
    identifier: u16,
    sequence: u16,
) -> Option<PingStatus> {
    if icmp.len() < 8 {
        return Some(PingStatus::BadReply);
    }
    let kind = icmp[0];
    let reply_id = u16::from_be_bytes([icmp[4], icmp[5]]);
    let reply_seq = u16::from_be_bytes([icmp[6], icmp[7]]);
    // datagram ping sockets rewrite the identifier
    let ours = reply_seq == sequence && (!raw || reply_id == identifier);

    let (echo_reply, echo_request, unreachable, time_exceeded) = match address {
        IpAddr::V4(_) => (
            ICMP_ECHO_REPLY,
            ICMP_ECHO_REQUEST,
            ICMP_DEST_UNREACHABLE,
            ICMP_TIME_EXCEEDED,
        ),
        IpAddr::V6(_) => (
            ICMPV6_ECHO_REPLY,
            ICMPV6_ECHO_REQUEST,
            ICMPV6_DEST_UNREACHABLE,
            ICMPV6_TIME_EXCEEDED,
        ),
    };

    // errors on a raw socket may concern anyone's traffic, check the quoted request
    let quotes_ours = || {
        !raw || quoted_echo(&icmp[8..], address)
            .is_some_and(|(k, id, seq)| k == echo_request && id == identifier && seq == sequence)
    };

    match kind {
        k if k == echo_reply && ours => Some(PingStatus::Success),
        k if k == echo_reply || k == echo_request => None,
        k if k == unreachable && quotes_ours() => Some(PingStatus::DestinationUnreachable),
        k if k == time_exceeded && quotes_ours() => Some(PingStatus::TtlExpired),
        _ if raw => None,
        _ => Some(PingStatus::BadReply),
    }
}

/// Type, identifier and sequence of the echo request quoted in an ICMP error
fn quoted_echo(quoted: &[u8], address: &IpAddr) -> Option<(u8, u16, u16)> {
    let echo = match address {
        IpAddr::V4(_) => strip_ipv4_header(quoted)?,
        IpAddr::V6(_) => quoted.get(IPV6_HEADER_LEN..)?,
    };
    let header = echo.get(..8)?;
    Some((
        header[0],
        u16::from_be_bytes([header[4], header[5]]),
        u16::from_be_bytes([header[6], header[7]]),
    ))
}

fn status_from_io_error(e: &io::Error) -> PingStatus {
    match e.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => PingStatus::TimedOut,
        _ => match e.raw_os_error() {
            Some(libc::EHOSTUNREACH) | Some(libc::ENETUNREACH) => {
                PingStatus::DestinationUnreachable
            }
            _ => PingStatus::Unknown,
        },
    }
}
