//! MIME body part tree.
//!
//! Parts form a tagged sum with a common header record per variant; a
//! [`MultipartMixed`] owns its children exclusively, and serialisation is a
//! single [`MimePart::write_to`] dispatcher.

use std::sync::LazyLock;

use regex::Regex;

use crate::encoding::{self, MAX_LINE_SIZE};
use crate::error::{Error, Result};

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));
static DISALLOWED_NAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9\-_\.]").expect("name pattern is valid"));

/// Content-Transfer-Encoding of a body part.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransferEncoding {
    /// No encoding header is emitted.
    #[default]
    None,
    /// Base64 body encoding.
    Base64,
    /// Quoted-Printable body encoding.
    QuotedPrintable,
}

impl TransferEncoding {
    const fn header_token(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Base64 => Some("base64"),
            Self::QuotedPrintable => Some("quoted-printable"),
        }
    }
}

/// Content-Disposition of a file part.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Disposition {
    /// No disposition header is emitted.
    #[default]
    None,
    /// Rendered inline with the body.
    Inline,
    /// Offered as a downloadable attachment.
    Attachment,
}

/// Header fields shared by every part variant.
#[derive(Debug, Clone, Default)]
pub struct PartHeaders {
    content_type: String,
    content_name: String,
    content_charset: String,
    transfer_encoding: TransferEncoding,
}

impl PartHeaders {
    fn with_content_type(content_type: &str) -> Self {
        Self {
            content_type: content_type.to_string(),
            ..Self::default()
        }
    }

    /// Returns the content type.
    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Sets the content type.
    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.content_type = content_type.into();
    }

    /// Returns the sanitised content name.
    #[must_use]
    pub fn content_name(&self) -> &str {
        &self.content_name
    }

    /// Sets the content name, sanitised to a safe ASCII filename: whitespace
    /// runs become `_`, characters outside `[A-Za-z0-9._-]` are removed.
    pub fn set_content_name(&mut self, name: &str) {
        let underscored = WHITESPACE_RUN.replace_all(name, "_");
        self.content_name = DISALLOWED_NAME_CHARS
            .replace_all(&underscored, "")
            .into_owned();
    }

    /// Returns the content charset.
    #[must_use]
    pub fn content_charset(&self) -> &str {
        &self.content_charset
    }

    /// Sets the content charset.
    pub fn set_content_charset(&mut self, charset: impl Into<String>) {
        self.content_charset = charset.into();
    }

    /// Returns the transfer encoding.
    #[must_use]
    pub fn transfer_encoding(&self) -> TransferEncoding {
        self.transfer_encoding
    }

    /// Sets the transfer encoding.
    pub fn set_transfer_encoding(&mut self, encoding: TransferEncoding) {
        self.transfer_encoding = encoding;
    }

    /// Writes the standard `Content-Type` and `Content-Transfer-Encoding`
    /// headers. Only present fields are emitted; the boundary parameter only
    /// appears for multiparts.
    fn write_standard_headers(&self, out: &mut Vec<u8>, boundary: &str) -> Result<()> {
        if self.content_type.is_empty() {
            return Err(Error::MissingField("content type"));
        }

        out.extend_from_slice(b"Content-Type: ");
        out.extend_from_slice(self.content_type.as_bytes());
        if !self.content_name.is_empty() {
            out.extend_from_slice(b";\r\n  name=\"");
            out.extend_from_slice(self.content_name.as_bytes());
            out.push(b'"');
        }
        if !self.content_charset.is_empty() {
            out.extend_from_slice(b";\r\n  charset=");
            out.extend_from_slice(self.content_charset.as_bytes());
        }
        if !boundary.is_empty() {
            out.extend_from_slice(b";\r\n  boundary=");
            out.extend_from_slice(boundary.as_bytes());
        }
        out.extend_from_slice(b"\r\n");

        if let Some(token) = self.transfer_encoding.header_token() {
            out.extend_from_slice(b"Content-Transfer-Encoding: ");
            out.extend_from_slice(token.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        Ok(())
    }
}

/// A node in the message body tree.
#[derive(Debug, Clone)]
pub enum MimePart {
    /// Plain-text body.
    Text {
        /// Shared part headers.
        headers: PartHeaders,
        /// The text content.
        text: String,
    },
    /// HTML body.
    Html {
        /// Shared part headers.
        headers: PartHeaders,
        /// The HTML content.
        html: String,
    },
    /// Binary file content.
    File {
        /// Shared part headers; the content name carries the filename.
        headers: PartHeaders,
        /// The raw file bytes.
        content: Vec<u8>,
        /// How the receiver should present the file.
        disposition: Disposition,
    },
    /// Nested multipart container.
    Multipart(MultipartMixed),
}

impl MimePart {
    /// Creates a `text/plain` part, UTF-8, Quoted-Printable encoded.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        let mut headers = PartHeaders::with_content_type("text/plain");
        headers.set_content_charset("UTF-8");
        headers.set_transfer_encoding(TransferEncoding::QuotedPrintable);
        Self::Text {
            headers,
            text: text.into(),
        }
    }

    /// Creates a `text/html` part, UTF-8, Quoted-Printable encoded.
    #[must_use]
    pub fn html(html: impl Into<String>) -> Self {
        let mut headers = PartHeaders::with_content_type("text/html");
        headers.set_content_charset("UTF-8");
        headers.set_transfer_encoding(TransferEncoding::QuotedPrintable);
        Self::Html {
            headers,
            html: html.into(),
        }
    }

    /// Creates a file part, Base64 encoded, with no disposition.
    ///
    /// The filename is checked against the MIME-type database; when exactly
    /// one media type matches its extension, that type replaces the
    /// `application/octet-stream` default.
    #[must_use]
    pub fn file(content: Vec<u8>, file_name: &str) -> Self {
        let mut headers = PartHeaders::with_content_type("application/octet-stream");
        headers.set_content_name(file_name);
        headers.set_transfer_encoding(TransferEncoding::Base64);

        let mut types = media_types_for_name(headers.content_name());
        if types.len() == 1 {
            headers.set_content_type(types.remove(0));
        }

        Self::File {
            headers,
            content,
            disposition: Disposition::None,
        }
    }

    /// Creates a file part presented inline.
    #[must_use]
    pub fn inline_file(content: Vec<u8>, file_name: &str) -> Self {
        let mut part = Self::file(content, file_name);
        part.set_disposition(Disposition::Inline);
        part
    }

    /// Creates a file part presented as an attachment.
    #[must_use]
    pub fn attachment(content: Vec<u8>, file_name: &str) -> Self {
        let mut part = Self::file(content, file_name);
        part.set_disposition(Disposition::Attachment);
        part
    }

    /// Sets the disposition of a file part; other variants are unaffected.
    pub fn set_disposition(&mut self, disposition: Disposition) {
        if let Self::File {
            disposition: slot, ..
        } = self
        {
            *slot = disposition;
        }
    }

    /// Returns the shared headers of this part.
    #[must_use]
    pub fn headers(&self) -> &PartHeaders {
        match self {
            Self::Text { headers, .. } | Self::Html { headers, .. } | Self::File { headers, .. } => {
                headers
            }
            Self::Multipart(multipart) => &multipart.headers,
        }
    }

    /// Returns the shared headers of this part for mutation.
    pub fn headers_mut(&mut self) -> &mut PartHeaders {
        match self {
            Self::Text { headers, .. } | Self::Html { headers, .. } | Self::File { headers, .. } => {
                headers
            }
            Self::Multipart(multipart) => &mut multipart.headers,
        }
    }

    /// Serialises this part: standard headers, a blank line, the encoded
    /// body, a closing CRLF.
    ///
    /// # Errors
    ///
    /// Fails when a required field (content type, body content, filename) is
    /// empty, or a nested multipart has no parts.
    pub fn write_to(&self, out: &mut Vec<u8>) -> Result<()> {
        match self {
            Self::Text { headers, text } => write_text_body(headers, text, out),
            Self::Html { headers, html } => write_text_body(headers, html, out),
            Self::File {
                headers,
                content,
                disposition,
            } => write_file_body(headers, content, *disposition, out),
            Self::Multipart(multipart) => multipart.write_to(out),
        }
    }
}

fn write_text_body(headers: &PartHeaders, text: &str, out: &mut Vec<u8>) -> Result<()> {
    if text.is_empty() {
        return Err(Error::MissingField("text content"));
    }

    headers.write_standard_headers(out, "")?;
    out.extend_from_slice(b"\r\n");
    let encoded = encoding::encode_quoted_printable(text);
    out.extend_from_slice(&encoding::fold_quoted_printable(&encoded, MAX_LINE_SIZE));
    out.extend_from_slice(b"\r\n");
    Ok(())
}

fn write_file_body(
    headers: &PartHeaders,
    content: &[u8],
    disposition: Disposition,
    out: &mut Vec<u8>,
) -> Result<()> {
    if headers.content_name().is_empty() {
        return Err(Error::MissingField("file name"));
    }
    if content.is_empty() {
        return Err(Error::MissingField("file content"));
    }

    headers.write_standard_headers(out, "")?;
    match disposition {
        Disposition::Attachment => {
            out.extend_from_slice(b"Content-Disposition: attachment;\r\n  filename=\"");
            out.extend_from_slice(headers.content_name().as_bytes());
            out.extend_from_slice(b"\"\r\n");
        }
        Disposition::Inline => out.extend_from_slice(b"Content-Disposition: inline\r\n"),
        Disposition::None => {}
    }
    out.extend_from_slice(b"\r\n");
    let encoded = encoding::encode_base64(content);
    out.extend_from_slice(&encoding::fold_data(encoded.as_bytes(), MAX_LINE_SIZE));
    out.extend_from_slice(b"\r\n");
    Ok(())
}

fn media_types_for_name(name: &str) -> Vec<String> {
    let Some((_, extension)) = name.rsplit_once('.') else {
        return Vec::new();
    };

    let mut types: Vec<String> = Vec::new();
    for matched in file_type::FileType::from_extension(extension) {
        for media_type in matched.media_types().into_iter().map(ToString::to_string) {
            if !types.contains(&media_type) {
                types.push(media_type);
            }
        }
    }
    types
}

/// An ordered `multipart/mixed` container that owns its parts exclusively.
#[derive(Debug, Clone)]
pub struct MultipartMixed {
    headers: PartHeaders,
    parts: Vec<MimePart>,
}

impl MultipartMixed {
    /// Creates an empty container.
    #[must_use]
    pub fn new() -> Self {
        Self {
            headers: PartHeaders::with_content_type("multipart/mixed"),
            parts: Vec::new(),
        }
    }

    /// Appends a part, taking ownership of it.
    pub fn append_part(&mut self, part: MimePart) {
        self.parts.push(part);
    }

    /// Prepends a part, taking ownership of it.
    pub fn prepend_part(&mut self, part: MimePart) {
        self.parts.insert(0, part);
    }

    /// Removes and returns the first part, if any.
    pub fn remove_first(&mut self) -> Option<MimePart> {
        if self.parts.is_empty() {
            None
        } else {
            Some(self.parts.remove(0))
        }
    }

    /// Checks whether the container has no parts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Returns the number of parts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Returns the owned parts in order.
    #[must_use]
    pub fn parts(&self) -> &[MimePart] {
        &self.parts
    }

    /// Serialises the container.
    ///
    /// A single part is serialised transparently, with no boundary wrapping;
    /// otherwise a fresh random boundary wraps every child.
    ///
    /// # Errors
    ///
    /// Fails when the container is empty, or any child fails to serialise.
    pub fn write_to(&self, out: &mut Vec<u8>) -> Result<()> {
        match self.parts.as_slice() {
            [] => Err(Error::EmptyMultipart),
            [only] => only.write_to(out),
            parts => {
                let boundary = uuid::Uuid::new_v4().simple().to_string();
                self.headers.write_standard_headers(out, &boundary)?;
                out.extend_from_slice(b"\r\n");
                for part in parts {
                    out.extend_from_slice(b"--");
                    out.extend_from_slice(boundary.as_bytes());
                    out.extend_from_slice(b"\r\n");
                    part.write_to(out)?;
                }
                out.extend_from_slice(b"--");
                out.extend_from_slice(boundary.as_bytes());
                out.extend_from_slice(b"--\r\n");
                Ok(())
            }
        }
    }
}

impl Default for MultipartMixed {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::similar_names
)]
mod tests {
    use super::*;

    fn serialised(part: &MimePart) -> Vec<u8> {
        let mut out = Vec::new();
        part.write_to(&mut out).unwrap();
        out
    }

    mod headers_tests {
        use super::*;

        #[test]
        fn content_name_is_sanitised() {
            let mut headers = PartHeaders::default();
            headers.set_content_name("my report final.pdf");
            assert_eq!(headers.content_name(), "my_report_final.pdf");

            headers.set_content_name("wéird&name.txt");
            assert_eq!(headers.content_name(), "wirdname.txt");
        }

        #[test]
        fn empty_content_type_fails_serialisation() {
            let mut part = MimePart::text("hi");
            part.headers_mut().set_content_type("");
            let mut out = Vec::new();
            assert!(matches!(
                part.write_to(&mut out),
                Err(Error::MissingField("content type"))
            ));
        }
    }

    mod text_part_tests {
        use super::*;

        #[test]
        fn serialises_headers_and_encoded_body() {
            let part = MimePart::text("hi");
            assert_eq!(
                serialised(&part),
                b"Content-Type: text/plain;\r\n  charset=UTF-8\r\n\
                  Content-Transfer-Encoding: quoted-printable\r\n\
                  \r\n\
                  hi\r\n"
            );
        }

        #[test]
        fn body_is_quoted_printable() {
            let part = MimePart::text("a=b");
            let out = serialised(&part);
            assert!(out.windows(5).any(|w| w == b"a=3Db"));
        }

        #[test]
        fn html_uses_the_html_content_type() {
            let part = MimePart::html("<p>hi</p>");
            let out = serialised(&part);
            assert!(out.starts_with(b"Content-Type: text/html;"));
        }

        #[test]
        fn empty_text_fails() {
            let part = MimePart::text("");
            let mut out = Vec::new();
            assert!(part.write_to(&mut out).is_err());
        }
    }

    mod file_part_tests {
        use super::*;

        #[test]
        fn defaults_to_octet_stream_for_unknown_extensions() {
            let part = MimePart::file(b"data".to_vec(), "blob.zz-unknown");
            assert_eq!(part.headers().content_type(), "application/octet-stream");
        }

        #[test]
        fn body_is_base64() {
            let part = MimePart::file(b"hello".to_vec(), "greeting.bin");
            let out = serialised(&part);
            assert!(out.windows(8).any(|w| w == b"aGVsbG8="));
        }

        #[test]
        fn attachment_disposition_carries_the_filename() {
            let part = MimePart::attachment(b"data".to_vec(), "report 2024.bin");
            let out = serialised(&part);
            let text = String::from_utf8(out).unwrap();
            assert!(
                text.contains("Content-Disposition: attachment;\r\n  filename=\"report_2024.bin\"")
            );
        }

        #[test]
        fn inline_disposition_has_no_filename() {
            let part = MimePart::inline_file(b"data".to_vec(), "logo.bin");
            let text = String::from_utf8(serialised(&part)).unwrap();
            assert!(text.contains("Content-Disposition: inline\r\n"));
            assert!(!text.contains("filename"));
        }

        #[test]
        fn no_disposition_header_by_default() {
            let part = MimePart::file(b"data".to_vec(), "plain.bin");
            let text = String::from_utf8(serialised(&part)).unwrap();
            assert!(!text.contains("Content-Disposition"));
        }

        #[test]
        fn empty_content_fails() {
            let part = MimePart::file(Vec::new(), "empty.bin");
            let mut out = Vec::new();
            assert!(part.write_to(&mut out).is_err());
        }

        #[test]
        fn empty_filename_fails() {
            let part = MimePart::file(b"data".to_vec(), "");
            let mut out = Vec::new();
            assert!(part.write_to(&mut out).is_err());
        }
    }

    mod multipart_tests {
        use super::*;

        #[test]
        fn empty_container_fails() {
            let multipart = MultipartMixed::new();
            let mut out = Vec::new();
            assert!(matches!(
                multipart.write_to(&mut out),
                Err(Error::EmptyMultipart)
            ));
        }

        #[test]
        fn single_part_is_serialised_transparently() {
            let mut multipart = MultipartMixed::new();
            multipart.append_part(MimePart::text("hi"));
            let mut out = Vec::new();
            multipart.write_to(&mut out).unwrap();
            assert_eq!(out, serialised(&MimePart::text("hi")));
        }

        #[test]
        fn two_parts_are_wrapped_in_a_boundary() {
            let mut multipart = MultipartMixed::new();
            multipart.append_part(MimePart::text("first"));
            multipart.append_part(MimePart::text("second"));
            let mut out = Vec::new();
            multipart.write_to(&mut out).unwrap();
            let text = String::from_utf8(out).unwrap();

            assert!(text.starts_with("Content-Type: multipart/mixed;\r\n  boundary="));
            let boundary = text
                .lines()
                .find_map(|l| l.trim().strip_prefix("boundary="))
                .unwrap()
                .to_string();
            assert_eq!(boundary.len(), 32);
            assert_eq!(text.matches(&format!("--{boundary}\r\n")).count(), 2);
            assert!(text.ends_with(&format!("--{boundary}--\r\n")));
        }

        #[test]
        fn boundaries_are_unique_per_serialisation() {
            let mut multipart = MultipartMixed::new();
            multipart.append_part(MimePart::text("first"));
            multipart.append_part(MimePart::text("second"));
            let mut first = Vec::new();
            let mut second = Vec::new();
            multipart.write_to(&mut first).unwrap();
            multipart.write_to(&mut second).unwrap();
            assert_ne!(first, second);
        }

        #[test]
        fn failing_child_fails_the_container() {
            let mut multipart = MultipartMixed::new();
            multipart.append_part(MimePart::text("ok"));
            multipart.append_part(MimePart::text(""));
            let mut out = Vec::new();
            assert!(multipart.write_to(&mut out).is_err());
        }

        #[test]
        fn parts_are_owned_in_order() {
            let mut multipart = MultipartMixed::new();
            multipart.append_part(MimePart::text("second"));
            multipart.prepend_part(MimePart::text("first"));
            assert_eq!(multipart.len(), 2);
            assert!(matches!(
                multipart.parts().first(),
                Some(MimePart::Text { text, .. }) if text.as_str() == "first"
            ));

            let removed = multipart.remove_first();
            assert!(matches!(
                removed,
                Some(MimePart::Text { text, .. }) if text == "first"
            ));
            assert_eq!(multipart.len(), 1);
        }
    }
}
