//! Authentication methods and EHLO capabilities.

use std::collections::HashSet;

/// SASL authentication method used at connect time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthMethod {
    /// No authentication.
    #[default]
    None,
    /// PLAIN - a single base64 initial response.
    Plain,
    /// LOGIN - base64 username, then base64 password.
    Login,
    /// CRAM-MD5 - HMAC-MD5 challenge/response.
    CramMd5,
}

impl AuthMethod {
    /// Wire name of the SASL mechanism, if this method uses one.
    #[must_use]
    pub const fn mechanism(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Plain => Some("PLAIN"),
            Self::Login => Some("LOGIN"),
            Self::CramMd5 => Some("CRAM-MD5"),
        }
    }
}

/// SMTP extension advertised in an EHLO response.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Extension {
    /// STARTTLS - TLS upgrade.
    StartTls,
    /// AUTH - offered SASL mechanism names, uppercased.
    Auth(Vec<String>),
    /// Any other extension line, kept verbatim and never negotiated.
    Unknown(String),
}

impl Extension {
    /// Parses one EHLO capability line.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some(keyword) = parts.first() else {
            return Self::Unknown(line.to_string());
        };

        match keyword.to_uppercase().as_str() {
            "STARTTLS" => Self::StartTls,
            "AUTH" => Self::Auth(parts[1..].iter().map(|m| m.to_uppercase()).collect()),
            _ => Self::Unknown(line.to_string()),
        }
    }
}

/// Server capabilities discovered from the greeting and EHLO exchange.
#[derive(Debug, Clone, Default)]
pub struct ServerInfo {
    /// Server hostname, the first word of the greeting.
    pub hostname: String,
    /// Advertised extensions.
    pub extensions: HashSet<Extension>,
}

impl ServerInfo {
    /// Checks whether STARTTLS was advertised.
    #[must_use]
    pub fn supports_starttls(&self) -> bool {
        self.extensions.contains(&Extension::StartTls)
    }

    /// Checks whether the given SASL mechanism was advertised.
    #[must_use]
    pub fn supports_auth(&self, mechanism: &str) -> bool {
        self.extensions
            .iter()
            .any(|ext| matches!(ext, Extension::Auth(mechs) if mechs.iter().any(|m| m == mechanism)))
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect
)]
mod tests {
    use super::*;

    #[test]
    fn parse_starttls() {
        assert_eq!(Extension::parse("STARTTLS"), Extension::StartTls);
        assert_eq!(Extension::parse("starttls"), Extension::StartTls);
    }

    #[test]
    fn parse_auth_mechanisms() {
        let ext = Extension::parse("AUTH plain LOGIN CRAM-MD5");
        assert_eq!(
            ext,
            Extension::Auth(vec![
                "PLAIN".to_string(),
                "LOGIN".to_string(),
                "CRAM-MD5".to_string()
            ])
        );
    }

    #[test]
    fn parse_unknown_is_kept_verbatim() {
        assert_eq!(
            Extension::parse("SIZE 52428800"),
            Extension::Unknown("SIZE 52428800".to_string())
        );
    }

    #[test]
    fn parse_empty_line() {
        assert!(matches!(Extension::parse(""), Extension::Unknown(_)));
    }

    #[test]
    fn server_info_capability_checks() {
        let mut info = ServerInfo::default();
        info.extensions.insert(Extension::StartTls);
        info.extensions
            .insert(Extension::parse("AUTH PLAIN CRAM-MD5"));

        assert!(info.supports_starttls());
        assert!(info.supports_auth("PLAIN"));
        assert!(info.supports_auth("CRAM-MD5"));
        assert!(!info.supports_auth("LOGIN"));
    }

    #[test]
    fn empty_server_info_supports_nothing() {
        let info = ServerInfo::default();
        assert!(!info.supports_starttls());
        assert!(!info.supports_auth("PLAIN"));
    }

    #[test]
    fn auth_method_mechanism_names() {
        assert_eq!(AuthMethod::None.mechanism(), None);
        assert_eq!(AuthMethod::Plain.mechanism(), Some("PLAIN"));
        assert_eq!(AuthMethod::Login.mechanism(), Some("LOGIN"));
        assert_eq!(AuthMethod::CramMd5.mechanism(), Some("CRAM-MD5"));
    }
}
