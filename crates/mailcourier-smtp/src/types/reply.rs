//! SMTP reply types.

/// A full SMTP reply from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Code of the terminal reply line.
    pub code: ReplyCode,
    /// Text of every reply line, continuations first, terminal line last.
    pub lines: Vec<String>,
}

impl Reply {
    /// Creates a new reply.
    #[must_use]
    pub fn new(code: ReplyCode, lines: Vec<String>) -> Self {
        Self { code, lines }
    }

    /// Text of the terminal line (a CRAM-MD5 challenge rides here).
    #[must_use]
    pub fn terminal_text(&self) -> &str {
        self.lines.last().map_or("", String::as_str)
    }
}

/// SMTP reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// Creates a new reply code.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Returns the numeric code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Returns true for a success code (2xx).
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 >= 200 && self.0 < 300
    }

    /// Returns true for an intermediate code (3xx).
    #[must_use]
    pub const fn is_intermediate(self) -> bool {
        self.0 >= 300 && self.0 < 400
    }
}

impl std::fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Codes this client consumes
impl ReplyCode {
    /// 220 Service ready
    pub const SERVICE_READY: Self = Self(220);
    /// 221 Service closing transmission channel
    pub const CLOSING: Self = Self(221);
    /// 235 Authentication succeeded
    pub const AUTH_SUCCEEDED: Self = Self(235);
    /// 250 Requested mail action okay, completed
    pub const OK: Self = Self(250);
    /// 334 Continue with authentication
    pub const AUTH_CONTINUE: Self = Self(334);
    /// 354 Start mail input
    pub const START_DATA: Self = Self(354);
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
    fn success_codes() {
        assert!(ReplyCode::SERVICE_READY.is_success());
        assert!(ReplyCode::CLOSING.is_success());
        assert!(ReplyCode::AUTH_SUCCEEDED.is_success());
        assert!(ReplyCode::OK.is_success());
    }

    #[test]
    fn intermediate_codes() {
        assert!(ReplyCode::AUTH_CONTINUE.is_intermediate());
        assert!(ReplyCode::START_DATA.is_intermediate());
        assert!(!ReplyCode::OK.is_intermediate());
    }

    #[test]
    fn as_u16() {
        assert_eq!(ReplyCode::OK.as_u16(), 250);
        assert_eq!(ReplyCode::new(550).as_u16(), 550);
    }

    #[test]
    fn display() {
        assert_eq!(format!("{}", ReplyCode::START_DATA), "354");
    }

    #[test]
    fn terminal_text_is_the_last_line() {
        let reply = Reply::new(
            ReplyCode::AUTH_CONTINUE,
            vec!["first".to_string(), "challenge".to_string()],
        );
        assert_eq!(reply.terminal_text(), "challenge");
    }

    #[test]
    fn terminal_text_of_empty_reply() {
        let reply = Reply::new(ReplyCode::OK, Vec::new());
        assert_eq!(reply.terminal_text(), "");
    }
}
