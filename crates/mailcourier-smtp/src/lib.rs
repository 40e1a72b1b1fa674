//! # mailcourier-smtp
//!
//! SMTP submission client implementing RFC 5321.
//!
//! ## Features
//!
//! - **Full submission flow**: greeting, EHLO, STARTTLS, AUTH, MAIL FROM,
//!   RCPT TO, DATA, QUIT
//! - **TLS support**: implicit TLS (port 465) and STARTTLS (port 587), with
//!   a configurable peer-verification policy
//! - **Authentication**: PLAIN, LOGIN, CRAM-MD5, checked against the
//!   mechanisms the server actually advertises
//! - **Strict conversations**: bounded waits on every read and write, and a
//!   no-crosstalk guard that refuses to send while server data is pending
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailcourier_mime::{EmailAddress, MimeMessage};
//! use mailcourier_smtp::{Client, ConnectionType};
//!
//! #[tokio::main]
//! async fn main() -> mailcourier_smtp::Result<()> {
//!     let mut client = Client::new();
//!     client.set_server_host("smtp.example.com");
//!     client.set_server_port(587);
//!     client.set_connection_type(ConnectionType::StartTls);
//!     client.set_username("user@example.com");
//!     client.set_password("password");
//!     client.connect().await?;
//!
//!     let mut message = MimeMessage::new();
//!     message.set_sender(EmailAddress::new("user@example.com"));
//!     message.add_to(EmailAddress::new("friend@example.com"));
//!     message.set_subject("Hello");
//!     message.set_body_text("Hi there!");
//!     client.send_message(&message).await?;
//!
//!     client.close().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`command`]: SMTP command builders
//! - [`connection`]: transport streams, TLS policy, timeouts
//! - [`parser`]: reply-line parser
//! - [`types`]: reply codes, capabilities, authentication methods

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod client;
pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod types;

pub use client::Client;
pub use connection::{ConnectionType, PeerVerifyMode, SmtpStream, Timeouts, TlsOptions};
pub use error::{Error, Result};
pub use types::{AuthMethod, Extension, Reply, ReplyCode, ServerInfo};
