//! SMTP reply-line parser.

use crate::error::{Error, Result};
use crate::types::ReplyCode;

/// One parsed reply line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyLine {
    /// Three-digit reply code.
    pub code: ReplyCode,
    /// True when the separator is a space (last line of the reply).
    pub is_final: bool,
    /// Text after the separator.
    pub text: String,
}

/// Parses a reply line of the shape `DDD<sep><text>`, where `sep` is a space
/// on the terminal line and `-` on continuation lines.
///
/// # Errors
///
/// Returns [`Error::MalformedReply`] when the line does not match that
/// shape.
pub fn parse_reply_line(line: &str) -> Result<ReplyLine> {
    let bytes = line.as_bytes();
    if bytes.len() < 4 || !bytes[..3].iter().all(u8::is_ascii_digit) {
        return Err(Error::MalformedReply(line.to_string()));
    }

    let code = line[..3]
        .parse::<u16>()
        .map_err(|_| Error::MalformedReply(line.to_string()))?;
    let is_final = match bytes[3] {
        b' ' => true,
        b'-' => false,
        _ => return Err(Error::MalformedReply(line.to_string())),
    };

    Ok(ReplyLine {
        code: ReplyCode::new(code),
        is_final,
        text: line[4..].to_string(),
    })
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
    fn parses_a_terminal_line() {
        let line = parse_reply_line("250 OK").unwrap();
        assert_eq!(line.code, ReplyCode::OK);
        assert!(line.is_final);
        assert_eq!(line.text, "OK");
    }

    #[test]
    fn parses_a_continuation_line() {
        let line = parse_reply_line("250-STARTTLS").unwrap();
        assert_eq!(line.code, ReplyCode::OK);
        assert!(!line.is_final);
        assert_eq!(line.text, "STARTTLS");
    }

    #[test]
    fn parses_a_greeting() {
        let line = parse_reply_line("220 smtp.example.com ESMTP ready").unwrap();
        assert_eq!(line.code, ReplyCode::SERVICE_READY);
        assert_eq!(line.text, "smtp.example.com ESMTP ready");
    }

    #[test]
    fn empty_text_is_allowed() {
        let line = parse_reply_line("235 ").unwrap();
        assert!(line.is_final);
        assert_eq!(line.text, "");
    }

    #[test]
    fn rejects_a_short_line() {
        assert!(matches!(
            parse_reply_line("25"),
            Err(Error::MalformedReply(_))
        ));
    }

    #[test]
    fn rejects_a_bare_code() {
        assert!(parse_reply_line("250").is_err());
    }

    #[test]
    fn rejects_non_digit_codes() {
        assert!(parse_reply_line("ABC OK").is_err());
    }

    #[test]
    fn rejects_an_unknown_separator() {
        assert!(parse_reply_line("250+OK").is_err());
    }
}
