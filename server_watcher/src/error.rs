use std::fmt;
use thiserror::Error;

/// Errors raised while building a [`crate::ServerWatcherConfiguration`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("The hostname can not be empty.")]
    EmptyHostname,

    #[error("The hostname should not contain protocol. Got: '{0}'")]
    HostnameWithProtocol(String),

    #[error("Port number can not be less than 0. Got: {0}")]
    NegativePort(i32),

    #[error("Port number can not be greater than 65535. Got: {0}")]
    PortOutOfRange(i32),
}

/// The collaborators a server watcher obtains from its providers on each run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collaborator {
    DnsResolver,
    TcpDialer,
    Pinger,
}

impl fmt::Display for Collaborator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Collaborator::DnsResolver => write!(f, "DNS resolver"),
            Collaborator::TcpDialer => write!(f, "TCP dialer"),
            Collaborator::Pinger => write!(f, "pinger"),
        }
    }
}

/// Errors raised while executing a watcher.
///
/// These signal a setup defect (e.g. a provider wired to return nothing), not an
/// unreachable server. Unreachable servers produce a negative check result instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WatcherError {
    #[error(
        "There was an error while executing watcher '{watcher}': {collaborator} provider returned no instance."
    )]
    MissingCollaborator {
        watcher: String,
        collaborator: Collaborator,
    },
}
