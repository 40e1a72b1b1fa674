//! Composed MIME message.

use crate::address::{EmailAddress, encode_address_list};
use crate::encoding::{self, MAX_MIME_WORD_SIZE};
use crate::error::{Error, Result};
use crate::part::{MimePart, MultipartMixed};

/// Which kind of primary body occupies slot 0 of the multipart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum BodyKind {
    #[default]
    None,
    Text,
    Html,
}

/// A composed message: envelope headers plus an owned multipart body tree.
///
/// The primary body (text or HTML) always sits at the front of the
/// multipart; replacing it removes the previous one first. Extra parts added
/// with [`MimeMessage::add_part`] follow it.
#[derive(Debug, Default)]
pub struct MimeMessage {
    sender: EmailAddress,
    reply_to: EmailAddress,
    to: Vec<EmailAddress>,
    cc: Vec<EmailAddress>,
    subject: String,
    body_kind: BodyKind,
    multipart: MultipartMixed,
}

impl MimeMessage {
    /// Creates an empty message.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the sender address.
    pub fn set_sender(&mut self, sender: EmailAddress) {
        self.sender = sender;
    }

    /// Returns the sender address.
    #[must_use]
    pub fn sender(&self) -> &EmailAddress {
        &self.sender
    }

    /// Sets the reply-to address.
    pub fn set_reply_to(&mut self, reply_to: EmailAddress) {
        self.reply_to = reply_to;
    }

    /// Returns the reply-to address.
    #[must_use]
    pub fn reply_to(&self) -> &EmailAddress {
        &self.reply_to
    }

    /// Replaces the list of `To` recipients.
    pub fn set_to(&mut self, to: Vec<EmailAddress>) {
        self.to = to;
    }

    /// Adds a `To` recipient.
    pub fn add_to(&mut self, to: EmailAddress) {
        self.to.push(to);
    }

    /// Returns the `To` recipients.
    #[must_use]
    pub fn to(&self) -> &[EmailAddress] {
        &self.to
    }

    /// Replaces the list of `Cc` recipients.
    pub fn set_cc(&mut self, cc: Vec<EmailAddress>) {
        self.cc = cc;
    }

    /// Adds a `Cc` recipient.
    pub fn add_cc(&mut self, cc: EmailAddress) {
        self.cc.push(cc);
    }

    /// Returns the `Cc` recipients.
    #[must_use]
    pub fn cc(&self) -> &[EmailAddress] {
        &self.cc
    }

    /// Sets the subject.
    pub fn set_subject(&mut self, subject: impl Into<String>) {
        self.subject = subject.into();
    }

    /// Returns the subject.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Replaces the primary body with plain text.
    ///
    /// The previous primary body, text or HTML, is removed first; an empty
    /// string just clears the slot.
    pub fn set_body_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.drop_primary_body();
        if !text.is_empty() {
            self.multipart.prepend_part(MimePart::text(text));
            self.body_kind = BodyKind::Text;
        }
    }

    /// Returns the plain-text body, or `""` when the primary body is absent
    /// or is HTML.
    #[must_use]
    pub fn body_text(&self) -> &str {
        if self.body_kind == BodyKind::Text {
            if let Some(MimePart::Text { text, .. }) = self.multipart.parts().first() {
                return text;
            }
        }
        ""
    }

    /// Replaces the primary body with HTML.
    ///
    /// The previous primary body, text or HTML, is removed first; an empty
    /// string just clears the slot.
    pub fn set_body_html(&mut self, html: impl Into<String>) {
        let html = html.into();
        self.drop_primary_body();
        if !html.is_empty() {
            self.multipart.prepend_part(MimePart::html(html));
            self.body_kind = BodyKind::Html;
        }
    }

    /// Returns the HTML body, or `""` when the primary body is absent or is
    /// plain text.
    #[must_use]
    pub fn body_html(&self) -> &str {
        if self.body_kind == BodyKind::Html {
            if let Some(MimePart::Html { html, .. }) = self.multipart.parts().first() {
                return html;
            }
        }
        ""
    }

    fn drop_primary_body(&mut self) {
        if self.body_kind != BodyKind::None {
            self.multipart.remove_first();
            self.body_kind = BodyKind::None;
        }
    }

    /// Appends an extra part (attachment, inline file, …) after the body.
    pub fn add_part(&mut self, part: MimePart) {
        self.multipart.append_part(part);
    }

    /// Returns the owned multipart body tree.
    #[must_use]
    pub fn multipart(&self) -> &MultipartMixed {
        &self.multipart
    }

    /// Checks message validity: a valid sender, a valid reply-to when set,
    /// at least one `To` recipient with every recipient valid, a non-empty
    /// subject, and a text or HTML body.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    fn validate(&self) -> Result<()> {
        if !self.sender.is_valid() {
            return Err(Error::InvalidMessage("sender address is missing or invalid"));
        }
        if !self.reply_to.is_empty() && !self.reply_to.is_valid() {
            return Err(Error::InvalidMessage("reply-to address is invalid"));
        }
        if self.to.is_empty() {
            return Err(Error::InvalidMessage("no To recipient"));
        }
        if self.to.iter().any(|address| !address.is_valid()) {
            return Err(Error::InvalidMessage("a To recipient is invalid"));
        }
        if self.cc.iter().any(|address| !address.is_valid()) {
            return Err(Error::InvalidMessage("a Cc recipient is invalid"));
        }
        if self.subject.is_empty() {
            return Err(Error::InvalidMessage("subject is empty"));
        }
        if self.body_kind == BodyKind::None {
            return Err(Error::InvalidMessage("no message body"));
        }
        Ok(())
    }

    /// Serialises the full message: headers, the multipart body, and the
    /// SMTP end-of-data terminator, with dot transparency applied.
    ///
    /// # Errors
    ///
    /// Fails when the message is not valid or a part cannot be serialised.
    pub fn write_to(&self, out: &mut Vec<u8>) -> Result<()> {
        self.validate()?;

        let mut content = Vec::new();
        content.extend_from_slice(b"MIME-Version: 1.0\r\n");
        content.extend_from_slice(b"Date: ");
        content.extend_from_slice(chrono::Local::now().to_rfc2822().as_bytes());
        content.extend_from_slice(b"\r\n");
        content.extend_from_slice(b"From: ");
        content.extend_from_slice(&self.sender.encode(MAX_MIME_WORD_SIZE)?);
        content.extend_from_slice(b"\r\n");
        if !self.reply_to.is_empty() {
            content.extend_from_slice(b"Reply-To: ");
            content.extend_from_slice(&self.reply_to.encode(MAX_MIME_WORD_SIZE)?);
            content.extend_from_slice(b"\r\n");
        }
        content.extend_from_slice(b"To: ");
        content.extend_from_slice(&encode_address_list(&self.to, MAX_MIME_WORD_SIZE)?);
        content.extend_from_slice(b"\r\n");
        if !self.cc.is_empty() {
            content.extend_from_slice(b"Cc: ");
            content.extend_from_slice(&encode_address_list(&self.cc, MAX_MIME_WORD_SIZE)?);
            content.extend_from_slice(b"\r\n");
        }
        content.extend_from_slice(b"Subject: ");
        content.extend_from_slice(&encoding::encode_mime_word_q(
            &self.subject,
            MAX_MIME_WORD_SIZE,
        ));
        content.extend_from_slice(b"\r\n");

        // no blank line here: the multipart's own headers continue the
        // header block, and it emits its own separator
        self.multipart.write_to(&mut content)?;

        out.extend_from_slice(&encoding::dot_stuff(&content));
        out.extend_from_slice(b"\r\n.\r\n");
        Ok(())
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

    fn valid_message() -> MimeMessage {
        let mut message = MimeMessage::new();
        message.set_sender(EmailAddress::new("sender@example.com"));
        message.add_to(EmailAddress::new("recipient@example.com"));
        message.set_subject("hello");
        message.set_body_text("a short body");
        message
    }

    mod body_slot_tests {
        use super::*;

        #[test]
        fn text_round_trips() {
            let mut message = MimeMessage::new();
            message.set_body_text("plain words");
            assert_eq!(message.body_text(), "plain words");
            assert_eq!(message.body_html(), "");
        }

        #[test]
        fn html_round_trips() {
            let mut message = MimeMessage::new();
            message.set_body_html("<p>rich words</p>");
            assert_eq!(message.body_html(), "<p>rich words</p>");
            assert_eq!(message.body_text(), "");
        }

        #[test]
        fn html_replaces_text() {
            let mut message = MimeMessage::new();
            message.set_body_text("plain");
            message.set_body_html("<p>rich</p>");
            assert_eq!(message.body_text(), "");
            assert_eq!(message.body_html(), "<p>rich</p>");
            assert_eq!(message.multipart().len(), 1);
        }

        #[test]
        fn empty_text_clears_the_slot() {
            let mut message = MimeMessage::new();
            message.set_body_text("plain");
            message.set_body_text("");
            assert_eq!(message.body_text(), "");
            assert!(message.multipart().is_empty());
        }

        #[test]
        fn body_stays_ahead_of_added_parts() {
            let mut message = MimeMessage::new();
            message.add_part(MimePart::attachment(b"data".to_vec(), "file.bin"));
            message.set_body_text("body");
            assert!(matches!(
                message.multipart().parts().first(),
                Some(MimePart::Text { .. })
            ));
            assert_eq!(message.multipart().len(), 2);

            // replacing the body must not disturb the attachment
            message.set_body_html("<p>body</p>");
            assert_eq!(message.multipart().len(), 2);
            assert!(matches!(
                message.multipart().parts().first(),
                Some(MimePart::Html { .. })
            ));
        }
    }

    mod validity_tests {
        use super::*;

        #[test]
        fn complete_message_is_valid() {
            assert!(valid_message().is_valid());
        }

        #[test]
        fn missing_sender_is_invalid() {
            let mut message = valid_message();
            message.set_sender(EmailAddress::default());
            assert!(!message.is_valid());
        }

        #[test]
        fn invalid_recipient_is_invalid() {
            let mut message = valid_message();
            message.add_to(EmailAddress::new("nonsense"));
            assert!(!message.is_valid());
        }

        #[test]
        fn no_recipients_is_invalid() {
            let mut message = valid_message();
            message.set_to(Vec::new());
            assert!(!message.is_valid());
        }

        #[test]
        fn invalid_cc_is_invalid() {
            let mut message = valid_message();
            message.add_cc(EmailAddress::new("nonsense"));
            assert!(!message.is_valid());
        }

        #[test]
        fn empty_subject_is_invalid() {
            let mut message = valid_message();
            message.set_subject("");
            assert!(!message.is_valid());
        }

        #[test]
        fn missing_body_is_invalid() {
            let mut message = valid_message();
            message.set_body_text("");
            assert!(!message.is_valid());
        }

        #[test]
        fn set_but_invalid_reply_to_is_invalid() {
            let mut message = valid_message();
            message.set_reply_to(EmailAddress::new("nonsense"));
            assert!(!message.is_valid());

            message.set_reply_to(EmailAddress::new("ok@example.com"));
            assert!(message.is_valid());
        }
    }

    mod serialisation_tests {
        use super::*;

        fn serialised(message: &MimeMessage) -> String {
            let mut out = Vec::new();
            message.write_to(&mut out).unwrap();
            String::from_utf8(out).unwrap()
        }

        #[test]
        fn valid_message_serialises() {
            let mut out = Vec::new();
            assert!(valid_message().write_to(&mut out).is_ok());
        }

        #[test]
        fn invalid_message_does_not() {
            let mut message = valid_message();
            message.set_subject("");
            let mut out = Vec::new();
            assert!(message.write_to(&mut out).is_err());
        }

        #[test]
        fn ends_with_the_dot_terminator() {
            assert!(serialised(&valid_message()).ends_with("\r\n.\r\n"));
        }

        #[test]
        fn headers_come_in_order() {
            let text = serialised(&valid_message());
            assert!(text.starts_with("MIME-Version: 1.0\r\nDate: "));
            let from = text.find("\r\nFrom: sender@example.com\r\n").unwrap();
            let to = text.find("\r\nTo: recipient@example.com\r\n").unwrap();
            let subject = text.find("\r\nSubject: =?utf-8?Q?hello?=\r\n").unwrap();
            assert!(from < to && to < subject);
        }

        #[test]
        fn optional_headers_are_omitted() {
            let text = serialised(&valid_message());
            assert!(!text.contains("Reply-To:"));
            assert!(!text.contains("Cc:"));
        }

        #[test]
        fn optional_headers_appear_when_set() {
            let mut message = valid_message();
            message.set_reply_to(EmailAddress::new("replies@example.com"));
            message.add_cc(EmailAddress::new("copy@example.com"));
            let text = serialised(&message);
            assert!(text.contains("\r\nReply-To: replies@example.com\r\n"));
            assert!(text.contains("\r\nCc: copy@example.com\r\n"));
        }

        #[test]
        fn body_continues_the_header_block() {
            let text = serialised(&valid_message());
            // the single text part's Content-Type follows Subject directly
            assert!(text.contains("\r\nSubject: =?utf-8?Q?hello?=\r\nContent-Type: text/plain;"));
        }

        #[test]
        fn only_the_terminator_is_a_lone_dot_line() {
            let mut message = valid_message();
            message.set_body_text(".\nnot a terminator\n.");
            let text = serialised(&message);
            // QP escapes dots in the body, so no stuffed line remains
            assert_eq!(text.matches("\r\n.\r\n").count(), 1);
            assert!(text.ends_with("\r\n.\r\n"));
        }
    }
}
