//! # mailcourier-mime
//!
//! MIME message composition (RFC 5322 / 2045 / 2046 / 2047) for SMTP
//! submission.
//!
//! ## Features
//!
//! - **Message building**: envelope headers, text/HTML bodies, attachments
//! - **Part tree**: an owned `multipart/mixed` tree of typed parts
//! - **Encoding**: Quoted-Printable and Base64 bodies, RFC 2047 encoded
//!   words for non-ASCII header text, bounded line lengths throughout
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailcourier_mime::{EmailAddress, MimeMessage, MimePart};
//!
//! let mut message = MimeMessage::new();
//! message.set_sender(EmailAddress::with_name("ann@example.com", "Ann"));
//! message.add_to(EmailAddress::new("bob@example.com"));
//! message.set_subject("Quarterly figures");
//! message.set_body_text("Numbers attached.");
//! message.add_part(MimePart::attachment(report_bytes, "report.pdf"));
//!
//! assert!(message.is_valid());
//! let mut wire = Vec::new();
//! message.write_to(&mut wire)?;
//! ```
//!
//! The serialised output ends with the SMTP end-of-data terminator and has
//! dot transparency applied, ready to stream after a `DATA` command.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod address;
mod error;
mod message;
mod part;

pub mod encoding;

pub use address::{EmailAddress, encode_address_list};
pub use error::{Error, Result};
pub use message::MimeMessage;
pub use part::{Disposition, MimePart, MultipartMixed, PartHeaders, TransferEncoding};
