//! SMTP command builder.

use crate::types::AuthMethod;
use mailcourier_mime::EmailAddress;

/// A client command, serialised onto the wire with a trailing CRLF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// EHLO - extended greeting.
    Ehlo {
        /// Client hostname.
        hostname: String,
    },
    /// STARTTLS - upgrade the connection to TLS.
    StartTls,
    /// AUTH - begin authentication.
    Auth {
        /// Authentication method.
        method: AuthMethod,
        /// Initial response (SASL-IR), already base64 encoded.
        initial_response: Option<String>,
    },
    /// MAIL FROM - start a mail transaction.
    MailFrom {
        /// Sender address.
        from: EmailAddress,
    },
    /// RCPT TO - add a recipient.
    RcptTo {
        /// Recipient address.
        to: EmailAddress,
    },
    /// DATA - begin message data.
    Data,
    /// QUIT - end the session.
    Quit,
}

impl Command {
    /// Serialises the command to bytes.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();

        match self {
            Self::Ehlo { hostname } => {
                buf.extend_from_slice(b"EHLO ");
                buf.extend_from_slice(hostname.as_bytes());
            }
            Self::StartTls => {
                buf.extend_from_slice(b"STARTTLS");
            }
            Self::Auth {
                method,
                initial_response,
            } => {
                buf.extend_from_slice(b"AUTH");
                if let Some(mechanism) = method.mechanism() {
                    buf.push(b' ');
                    buf.extend_from_slice(mechanism.as_bytes());
                }
                if let Some(response) = initial_response {
                    buf.push(b' ');
                    buf.extend_from_slice(response.as_bytes());
                }
            }
            Self::MailFrom { from } => {
                buf.extend_from_slice(b"MAIL FROM:<");
                buf.extend_from_slice(from.address().as_bytes());
                buf.push(b'>');
            }
            Self::RcptTo { to } => {
                buf.extend_from_slice(b"RCPT TO:<");
                buf.extend_from_slice(to.address().as_bytes());
                buf.push(b'>');
            }
            Self::Data => {
                buf.extend_from_slice(b"DATA");
            }
            Self::Quit => {
                buf.extend_from_slice(b"QUIT");
            }
        }

        buf.extend_from_slice(b"\r\n");
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ehlo_command() {
        let cmd = Command::Ehlo {
            hostname: "client.example.com".to_string(),
        };
        assert_eq!(cmd.serialize(), b"EHLO client.example.com\r\n");
    }

    #[test]
    fn test_starttls_command() {
        assert_eq!(Command::StartTls.serialize(), b"STARTTLS\r\n");
    }

    #[test]
    fn test_auth_plain_with_initial_response() {
        let cmd = Command::Auth {
            method: AuthMethod::Plain,
            initial_response: Some("AHVzZXIAcGFzcw==".to_string()),
        };
        assert_eq!(cmd.serialize(), b"AUTH PLAIN AHVzZXIAcGFzcw==\r\n");
    }

    #[test]
    fn test_auth_login_without_initial_response() {
        let cmd = Command::Auth {
            method: AuthMethod::Login,
            initial_response: None,
        };
        assert_eq!(cmd.serialize(), b"AUTH LOGIN\r\n");
    }

    #[test]
    fn test_auth_cram_md5() {
        let cmd = Command::Auth {
            method: AuthMethod::CramMd5,
            initial_response: None,
        };
        assert_eq!(cmd.serialize(), b"AUTH CRAM-MD5\r\n");
    }

    #[test]
    fn test_mail_from() {
        let cmd = Command::MailFrom {
            from: EmailAddress::new("sender@example.com"),
        };
        assert_eq!(cmd.serialize(), b"MAIL FROM:<sender@example.com>\r\n");
    }

    #[test]
    fn test_rcpt_to() {
        let cmd = Command::RcptTo {
            to: EmailAddress::new("recipient@example.com"),
        };
        assert_eq!(cmd.serialize(), b"RCPT TO:<recipient@example.com>\r\n");
    }

    #[test]
    fn test_data_command() {
        assert_eq!(Command::Data.serialize(), b"DATA\r\n");
    }

    #[test]
    fn test_quit_command() {
        assert_eq!(Command::Quit.serialize(), b"QUIT\r\n");
    }
}
