//! Email address model and header rendering.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::encoding::encode_mime_word_q;
use crate::error::{Error, Result};

static ADDRESS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]+$").expect("address pattern is valid")
});

/// An email address with an optional display name.
///
/// Either field may be empty. An *empty* address (both fields empty) is
/// distinct from an *invalid* one (non-empty but failing the syntax check);
/// rendering never serialises an invalid address into a header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailAddress {
    address: String,
    display_name: String,
}

impl EmailAddress {
    /// Creates an address with no display name.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            display_name: String::new(),
        }
    }

    /// Creates an address with a display name.
    pub fn with_name(address: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            display_name: display_name.into(),
        }
    }

    /// Returns the bare address.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Returns the display name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Checks whether both fields are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.address.is_empty() && self.display_name.is_empty()
    }

    /// Checks whether the address is syntactically valid.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.is_empty() && ADDRESS_PATTERN.is_match(&self.address)
    }

    /// Renders the address for a message header.
    ///
    /// With a display name, the name is emitted as an encoded word and the
    /// bracketed address follows on a continuation line so the line size
    /// stays bounded: `=?utf-8?Q?Name?=\r\n <addr>`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] for an empty or invalid address.
    pub fn encode(&self, max_word_size: usize) -> Result<Vec<u8>> {
        if !self.is_valid() {
            return Err(Error::InvalidAddress(self.address.clone()));
        }

        let mut encoded = Vec::new();
        if !self.display_name.is_empty() {
            encoded.extend_from_slice(&encode_mime_word_q(&self.display_name, max_word_size));
            encoded.extend_from_slice(b"\r\n <");
        }
        encoded.extend_from_slice(self.address.as_bytes());
        if !self.display_name.is_empty() {
            encoded.push(b'>');
        }
        Ok(encoded)
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address)
    }
}

/// Renders an address list for a header, entries joined with `,\r\n `.
///
/// # Errors
///
/// Returns [`Error::EmptyAddressList`] for an empty list and
/// [`Error::InvalidAddress`] when any entry fails validation.
pub fn encode_address_list(addresses: &[EmailAddress], max_word_size: usize) -> Result<Vec<u8>> {
    if addresses.is_empty() {
        return Err(Error::EmptyAddressList);
    }

    let mut encoded = Vec::new();
    for (ix, address) in addresses.iter().enumerate() {
        if ix > 0 {
            encoded.extend_from_slice(b",\r\n ");
        }
        encoded.extend_from_slice(&address.encode(max_word_size)?);
    }
    Ok(encoded)
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
    use crate::encoding::MAX_MIME_WORD_SIZE;

    #[test]
    fn valid_address() {
        assert!(EmailAddress::new("user@example.com").is_valid());
    }

    #[test]
    fn empty_and_invalid_are_distinct() {
        let empty = EmailAddress::default();
        assert!(empty.is_empty());
        assert!(!empty.is_valid());

        let invalid = EmailAddress::new("not-an-address");
        assert!(!invalid.is_empty());
        assert!(!invalid.is_valid());
    }

    #[test]
    fn name_only_is_not_empty_but_invalid() {
        let address = EmailAddress::with_name("", "Ann");
        assert!(!address.is_empty());
        assert!(!address.is_valid());
    }

    #[test]
    fn rejects_missing_tld() {
        assert!(!EmailAddress::new("user@host").is_valid());
    }

    #[test]
    fn rejects_whitespace() {
        assert!(!EmailAddress::new("user name@example.com").is_valid());
    }

    #[test]
    fn encodes_bare_address() {
        let encoded = EmailAddress::new("a@b.co").encode(MAX_MIME_WORD_SIZE).unwrap();
        assert_eq!(encoded, b"a@b.co");
    }

    #[test]
    fn encodes_named_address_with_continuation() {
        let encoded = EmailAddress::with_name("a@b.co", "Ann")
            .encode(MAX_MIME_WORD_SIZE)
            .unwrap();
        assert_eq!(encoded, b"=?utf-8?Q?Ann?=\r\n <a@b.co>");
    }

    #[test]
    fn refuses_to_encode_invalid_address() {
        let result = EmailAddress::new("broken").encode(MAX_MIME_WORD_SIZE);
        assert!(matches!(result, Err(Error::InvalidAddress(_))));
    }

    #[test]
    fn encodes_list_with_separators() {
        let list = [EmailAddress::new("a@b.co"), EmailAddress::new("c@d.co")];
        let encoded = encode_address_list(&list, MAX_MIME_WORD_SIZE).unwrap();
        assert_eq!(encoded, b"a@b.co,\r\n c@d.co");
    }

    #[test]
    fn list_fails_on_any_invalid_entry() {
        let list = [EmailAddress::new("a@b.co"), EmailAddress::new("oops")];
        assert!(encode_address_list(&list, MAX_MIME_WORD_SIZE).is_err());
    }

    #[test]
    fn empty_list_is_an_error() {
        assert!(matches!(
            encode_address_list(&[], MAX_MIME_WORD_SIZE),
            Err(Error::EmptyAddressList)
        ));
    }

    #[test]
    fn display_is_the_bare_address() {
        let address = EmailAddress::with_name("a@b.co", "Ann");
        assert_eq!(address.to_string(), "a@b.co");
    }
}
