//! Transport streams and session configuration.

mod stream;
mod tls;

pub use stream::SmtpStream;
pub use tls::{PeerVerifyMode, TlsOptions};

use std::time::Duration;

/// How the transport connection is established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionType {
    /// Plain TCP, no encryption (port 25). **Not recommended.**
    Tcp,
    /// TLS from the first byte (port 465). **Recommended.**
    Tls,
    /// Plain TCP upgraded mid-session with STARTTLS (port 587).
    StartTls,
}

impl ConnectionType {
    /// Returns the customary submission port for this connection type.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::Tcp => 25,
            Self::Tls => 465,
            Self::StartTls => 587,
        }
    }
}

/// Per-instance deadlines for the blocking transport waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Establishing the connection, including TLS handshakes.
    pub connect: Duration,
    /// Each ready-read wait on a server reply.
    pub response: Duration,
    /// Writing a command or a full message body.
    pub send: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(15),
            response: Duration::from_secs(15),
            send: Duration::from_secs(60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ports() {
        assert_eq!(ConnectionType::Tcp.default_port(), 25);
        assert_eq!(ConnectionType::Tls.default_port(), 465);
        assert_eq!(ConnectionType::StartTls.default_port(), 587);
    }

    #[test]
    fn test_default_timeouts() {
        let timeouts = Timeouts::default();
        assert_eq!(timeouts.connect, Duration::from_secs(15));
        assert_eq!(timeouts.response, Duration::from_secs(15));
        assert_eq!(timeouts.send, Duration::from_secs(60));
    }
}
