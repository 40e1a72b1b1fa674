//! The SMTP conversation driver.

use std::collections::HashSet;
use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use md5::Md5;
use tracing::warn;

use mailcourier_log::format_positional;
use mailcourier_mime::MimeMessage;

use crate::command::Command;
use crate::connection::{ConnectionType, SmtpStream, Timeouts, TlsOptions};
use crate::error::{Error, Result};
use crate::parser::parse_reply_line;
use crate::types::{AuthMethod, Extension, Reply, ReplyCode, ServerInfo};

type HmacMd5 = Hmac<Md5>;

/// Session lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Status {
    #[default]
    Disconnected,
    Connected,
}

/// SMTP submission client.
///
/// Configuration is latched at connect time: every setter is ignored while a
/// session is established. Operations on one instance are strictly
/// sequential; each call drives the conversation to completion or to a
/// timeout before returning.
///
/// Any protocol or transport failure during an established session closes
/// the connection, so the next operation must reconnect.
#[derive(Debug)]
pub struct Client {
    server_host: String,
    server_port: u16,
    client_host: String,
    connection_type: Option<ConnectionType>,
    tls_options: TlsOptions,
    auth_method: AuthMethod,
    username: String,
    password: String,
    timeouts: Timeouts,
    traffic_log_enabled: bool,
    status: Status,
    stream: Option<SmtpStream>,
    server_info: ServerInfo,
}

impl Client {
    /// Creates a client with the local hostname as `client_host` and
    /// default timeouts.
    #[must_use]
    pub fn new() -> Self {
        Self {
            server_host: String::new(),
            server_port: 0,
            client_host: gethostname::gethostname().to_string_lossy().to_string(),
            connection_type: None,
            tls_options: TlsOptions::default(),
            auth_method: AuthMethod::None,
            username: String::new(),
            password: String::new(),
            timeouts: Timeouts::default(),
            traffic_log_enabled: false,
            status: Status::Disconnected,
            stream: None,
            server_info: ServerInfo::default(),
        }
    }

    /// Sets the server hostname. Ignored while connected.
    pub fn set_server_host(&mut self, host: impl Into<String>) {
        if self.status == Status::Connected {
            return;
        }
        self.server_host = host.into();
    }

    /// Returns the server hostname.
    #[must_use]
    pub fn server_host(&self) -> &str {
        &self.server_host
    }

    /// Sets the server port. Ignored while connected.
    pub fn set_server_port(&mut self, port: u16) {
        if self.status == Status::Connected {
            return;
        }
        self.server_port = port;
    }

    /// Returns the server port.
    #[must_use]
    pub fn server_port(&self) -> u16 {
        self.server_port
    }

    /// Sets the hostname announced in EHLO. Ignored while connected.
    pub fn set_client_host(&mut self, host: impl Into<String>) {
        if self.status == Status::Connected {
            return;
        }
        self.client_host = host.into();
    }

    /// Returns the hostname announced in EHLO.
    #[must_use]
    pub fn client_host(&self) -> &str {
        &self.client_host
    }

    /// Selects the connection type. Ignored while connected.
    pub fn set_connection_type(&mut self, connection_type: ConnectionType) {
        if self.status == Status::Connected {
            return;
        }
        self.connection_type = Some(connection_type);
    }

    /// Returns the selected connection type, if any.
    #[must_use]
    pub fn connection_type(&self) -> Option<ConnectionType> {
        self.connection_type
    }

    /// Sets the TLS policy for encrypted connections. Ignored while
    /// connected.
    pub fn set_tls_options(&mut self, options: TlsOptions) {
        if self.status == Status::Connected {
            return;
        }
        self.tls_options = options;
    }

    /// Returns the TLS policy.
    #[must_use]
    pub fn tls_options(&self) -> TlsOptions {
        self.tls_options
    }

    /// Sets the account username. Ignored while connected. While the auth
    /// method is `None`, this switches it to `Plain`.
    pub fn set_username(&mut self, username: impl Into<String>) {
        if self.status == Status::Connected {
            return;
        }
        self.username = username.into();
        if self.auth_method == AuthMethod::None {
            self.auth_method = AuthMethod::Plain;
        }
    }

    /// Returns the account username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Sets the account password. Ignored while connected. While the auth
    /// method is `None`, this switches it to `Plain`.
    pub fn set_password(&mut self, password: impl Into<String>) {
        if self.status == Status::Connected {
            return;
        }
        self.password = password.into();
        if self.auth_method == AuthMethod::None {
            self.auth_method = AuthMethod::Plain;
        }
    }

    /// Returns the account password.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Sets the authentication method. Ignored while connected.
    pub fn set_auth_method(&mut self, method: AuthMethod) {
        if self.status == Status::Connected {
            return;
        }
        self.auth_method = method;
    }

    /// Returns the authentication method.
    #[must_use]
    pub fn auth_method(&self) -> AuthMethod {
        self.auth_method
    }

    /// Sets the transport deadlines. Ignored while connected.
    pub fn set_timeouts(&mut self, timeouts: Timeouts) {
        if self.status == Status::Connected {
            return;
        }
        self.timeouts = timeouts;
    }

    /// Returns the transport deadlines.
    #[must_use]
    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    /// Enables or disables the socket traffic log. Ignored while connected.
    pub fn set_traffic_log_enabled(&mut self, enabled: bool) {
        if self.status == Status::Connected {
            return;
        }
        self.traffic_log_enabled = enabled;
    }

    /// Returns whether the socket traffic log is enabled.
    #[must_use]
    pub fn traffic_log_enabled(&self) -> bool {
        self.traffic_log_enabled
    }

    /// Returns true while a session is established.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.status == Status::Connected
    }

    /// Returns the capabilities discovered from the server.
    #[must_use]
    pub fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Connects to the server, upgrades to TLS and authenticates according
    /// to the configuration. Required before messages can be sent.
    ///
    /// # Errors
    ///
    /// Configuration problems are rejected before any I/O. Any failure
    /// after the socket opens closes it again and leaves the client
    /// disconnected.
    pub async fn connect(&mut self) -> Result<()> {
        if self.status == Status::Connected {
            return Err(self.fail(Error::Config("client is already connected".into())));
        }
        let Some(connection_type) = self.connection_type else {
            return Err(self.fail(Error::Config("connection type is not set".into())));
        };
        if self.server_host.is_empty() || self.server_port == 0 {
            return Err(self.fail(Error::Config("server host / port are not set".into())));
        }
        if self.client_host.is_empty() {
            return Err(self.fail(Error::Config("client host is not set".into())));
        }
        if self.auth_method != AuthMethod::None
            && (self.username.is_empty() || self.password.is_empty())
        {
            return Err(self.fail(Error::Config("account credentials are not set".into())));
        }

        match self.drive_connect(connection_type).await {
            Ok(()) => {
                self.status = Status::Connected;
                Ok(())
            }
            Err(err) => {
                self.disconnect().await;
                Err(self.fail(err))
            }
        }
    }

    async fn drive_connect(&mut self, connection_type: ConnectionType) -> Result<()> {
        let stream = match connection_type {
            ConnectionType::Tls => {
                SmtpStream::connect_tls(
                    &self.server_host,
                    self.server_port,
                    self.timeouts.connect,
                    self.tls_options,
                )
                .await?
            }
            ConnectionType::Tcp | ConnectionType::StartTls => {
                SmtpStream::connect(&self.server_host, self.server_port, self.timeouts.connect)
                    .await?
            }
        };
        self.stream = Some(stream);

        let greeting = self.read_reply(ReplyCode::SERVICE_READY).await?;
        self.server_info.hostname = greeting
            .terminal_text()
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_string();

        self.ehlo().await?;

        if connection_type == ConnectionType::StartTls {
            if !self.server_info.supports_starttls() {
                return Err(Error::NotSupported("STARTTLS".into()));
            }
            self.send_command(&Command::StartTls).await?;
            self.read_reply(ReplyCode::SERVICE_READY).await?;

            let stream = self
                .stream
                .take()
                .ok_or_else(|| Error::Config("client is not connected".into()))?;
            let upgraded = stream
                .upgrade_to_tls(&self.server_host, self.timeouts.connect, self.tls_options)
                .await?;
            self.stream = Some(upgraded);

            // capabilities can differ on the encrypted channel
            self.ehlo().await?;
        }

        self.authenticate().await
    }

    async fn ehlo(&mut self) -> Result<()> {
        self.send_command(&Command::Ehlo {
            hostname: self.client_host.clone(),
        })
        .await?;
        let reply = self.read_reply(ReplyCode::OK).await?;

        // the first line is the server greeting, the rest are capabilities
        let mut extensions = HashSet::new();
        for line in reply.lines.iter().skip(1) {
            extensions.insert(Extension::parse(line));
        }
        self.server_info.extensions = extensions;
        Ok(())
    }

    async fn authenticate(&mut self) -> Result<()> {
        let Some(mechanism) = self.auth_method.mechanism() else {
            return Ok(());
        };
        if !self.server_info.supports_auth(mechanism) {
            return Err(Error::NotSupported(format!("AUTH {mechanism}")));
        }

        match self.auth_method {
            AuthMethod::None => Ok(()),
            AuthMethod::Plain => self.auth_plain().await,
            AuthMethod::Login => self.auth_login().await,
            AuthMethod::CramMd5 => self.auth_cram_md5().await,
        }
    }

    async fn auth_plain(&mut self) -> Result<()> {
        let credentials = format!("\0{}\0{}", self.username, self.password);
        self.send_command(&Command::Auth {
            method: AuthMethod::Plain,
            initial_response: Some(STANDARD.encode(credentials.as_bytes())),
        })
        .await?;
        self.read_reply(ReplyCode::AUTH_SUCCEEDED).await?;
        Ok(())
    }

    async fn auth_login(&mut self) -> Result<()> {
        self.send_command(&Command::Auth {
            method: AuthMethod::Login,
            initial_response: None,
        })
        .await?;
        self.read_reply(ReplyCode::AUTH_CONTINUE).await?;
        self.send_line(STANDARD.encode(self.username.as_bytes()))
            .await?;
        self.read_reply(ReplyCode::AUTH_CONTINUE).await?;
        self.send_line(STANDARD.encode(self.password.as_bytes()))
            .await?;
        self.read_reply(ReplyCode::AUTH_SUCCEEDED).await?;
        Ok(())
    }

    async fn auth_cram_md5(&mut self) -> Result<()> {
        self.send_command(&Command::Auth {
            method: AuthMethod::CramMd5,
            initial_response: None,
        })
        .await?;
        let reply = self.read_reply(ReplyCode::AUTH_CONTINUE).await?;

        let challenge = STANDARD
            .decode(reply.terminal_text())
            .map_err(|_| Error::MalformedReply(reply.terminal_text().to_string()))?;
        let mut mac = HmacMd5::new_from_slice(self.password.as_bytes())
            .map_err(|_| Error::Config("unusable CRAM-MD5 key".into()))?;
        mac.update(&challenge);
        let token = format!("{} {}", self.username, hex::encode(mac.finalize().into_bytes()));

        self.send_line(STANDARD.encode(token.as_bytes())).await?;
        self.read_reply(ReplyCode::AUTH_SUCCEEDED).await?;
        Ok(())
    }

    /// Submits a message over the established session.
    ///
    /// # Errors
    ///
    /// An invalid message or a disconnected client is rejected without
    /// touching the connection. Any protocol or transport failure during
    /// the submission closes the connection, to keep later conversations
    /// from consuming stale replies.
    pub async fn send_message(&mut self, message: &MimeMessage) -> Result<()> {
        if !message.is_valid() {
            return Err(self.fail(Error::InvalidMessage));
        }
        if self.status != Status::Connected {
            return Err(self.fail(Error::Config("client is not connected".into())));
        }

        match self.drive_send(message).await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.disconnect().await;
                Err(self.fail(err))
            }
        }
    }

    async fn drive_send(&mut self, message: &MimeMessage) -> Result<()> {
        self.send_command(&Command::MailFrom {
            from: message.sender().clone(),
        })
        .await?;
        self.read_reply(ReplyCode::OK).await?;

        for recipient in message.to().iter().chain(message.cc()) {
            self.send_command(&Command::RcptTo {
                to: recipient.clone(),
            })
            .await?;
            self.read_reply(ReplyCode::OK).await?;
        }

        self.send_command(&Command::Data).await?;
        self.read_reply(ReplyCode::START_DATA).await?;

        // the serialised message carries its own dot-terminator
        let mut payload = Vec::new();
        message.write_to(&mut payload)?;
        self.send_payload(&payload).await?;
        self.read_reply(ReplyCode::OK).await?;
        Ok(())
    }

    /// Ends the session: sends QUIT, awaits the goodbye best effort, then
    /// drops the socket. Idempotent.
    pub async fn close(&mut self) {
        if self.status != Status::Connected {
            return;
        }
        if self.send_command(&Command::Quit).await.is_ok() {
            let _ = self.read_reply(ReplyCode::CLOSING).await;
        }
        self.disconnect().await;
    }

    async fn disconnect(&mut self) {
        if let Some(stream) = self.stream.as_mut() {
            stream.shutdown().await;
        }
        self.stream = None;
        self.server_info = ServerInfo::default();
        self.status = Status::Disconnected;
    }

    fn fail(&self, err: Error) -> Error {
        warn!(error = %err, "smtp client operation failed");
        err
    }

    /// Before any write there must be nothing readable on the socket:
    /// pending data would be consumed as the reply to the new command.
    async fn ensure_clear_to_send(&mut self) -> Result<()> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| Error::Config("client is not connected".into()))?;
        if !stream.has_buffered_line().await {
            return Ok(());
        }

        warn!("unexpected server data pending before send");
        for line in stream.drain_buffered_lines().await {
            warn!(pending = %line, "unsolicited server line");
        }
        Err(Error::Crosstalk)
    }

    async fn send_command(&mut self, command: &Command) -> Result<()> {
        self.ensure_clear_to_send().await?;
        let serialized = command.serialize();
        log_traffic(
            self.traffic_log_enabled,
            "C",
            String::from_utf8_lossy(&serialized).trim_end(),
        );
        let deadline = self.timeouts.send;
        self.stream_mut()?.write_all(&serialized, deadline).await
    }

    /// Writes a bare continuation line (base64 blob) with a CRLF appended.
    async fn send_line(&mut self, line: String) -> Result<()> {
        self.ensure_clear_to_send().await?;
        log_traffic(self.traffic_log_enabled, "C", &line);
        let mut framed = line.into_bytes();
        framed.extend_from_slice(b"\r\n");
        let deadline = self.timeouts.send;
        self.stream_mut()?.write_all(&framed, deadline).await
    }

    async fn send_payload(&mut self, payload: &[u8]) -> Result<()> {
        self.ensure_clear_to_send().await?;
        log_traffic(self.traffic_log_enabled, "C", &STANDARD.encode(payload));
        let deadline = self.timeouts.send;
        self.stream_mut()?.write_all(payload, deadline).await
    }

    /// Reads one full reply, collecting continuation-line texts, and
    /// matches the terminal line's code against `expected`. Continuation
    /// codes are not checked.
    async fn read_reply(&mut self, expected: ReplyCode) -> Result<Reply> {
        let response_timeout = self.timeouts.response;
        let traffic = self.traffic_log_enabled;
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| Error::Config("client is not connected".into()))?;

        let mut lines = Vec::new();
        loop {
            let line = stream.read_line(response_timeout).await?;
            log_traffic(traffic, "S", &line);
            if line.is_empty() {
                continue;
            }

            let parsed = parse_reply_line(&line)?;
            let is_final = parsed.is_final;
            let code = parsed.code;
            lines.push(parsed.text);

            if is_final {
                if code != expected {
                    return Err(Error::UnexpectedReply { expected, line });
                }
                return Ok(Reply::new(code, lines));
            }
        }
    }

    fn stream_mut(&mut self) -> Result<&mut SmtpStream> {
        self.stream
            .as_mut()
            .ok_or_else(|| Error::Config("client is not connected".into()))
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

fn log_traffic(enabled: bool, who: &str, line: &str) {
    if enabled {
        tracing::debug!(
            "{}",
            format_positional("smtp traffic > %1: %2", &[&who as &dyn fmt::Display, &line])
        );
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
    fn setters_apply_while_disconnected() {
        let mut client = Client::new();
        client.set_server_host("smtp.example.com");
        client.set_server_port(587);
        client.set_client_host("me.example.com");
        client.set_connection_type(ConnectionType::StartTls);
        client.set_auth_method(AuthMethod::CramMd5);
        client.set_username("user");
        client.set_password("pass");
        client.set_traffic_log_enabled(true);

        assert_eq!(client.server_host(), "smtp.example.com");
        assert_eq!(client.server_port(), 587);
        assert_eq!(client.client_host(), "me.example.com");
        assert_eq!(client.connection_type(), Some(ConnectionType::StartTls));
        assert_eq!(client.auth_method(), AuthMethod::CramMd5);
        assert_eq!(client.username(), "user");
        assert_eq!(client.password(), "pass");
        assert!(client.traffic_log_enabled());
        assert!(!client.is_connected());
    }

    #[test]
    fn credentials_upgrade_auth_none_to_plain() {
        let mut client = Client::new();
        assert_eq!(client.auth_method(), AuthMethod::None);
        client.set_username("user");
        assert_eq!(client.auth_method(), AuthMethod::Plain);

        // an explicit choice is preserved
        let mut client = Client::new();
        client.set_auth_method(AuthMethod::Login);
        client.set_password("pass");
        assert_eq!(client.auth_method(), AuthMethod::Login);
    }

    #[test]
    fn client_host_defaults_to_the_local_hostname() {
        let client = Client::new();
        assert!(!client.client_host().is_empty());
    }

    #[tokio::test]
    async fn connect_rejects_missing_configuration() {
        let mut client = Client::new();
        assert!(matches!(client.connect().await, Err(Error::Config(_))));

        client.set_connection_type(ConnectionType::Tcp);
        assert!(matches!(client.connect().await, Err(Error::Config(_))));

        client.set_server_host("localhost");
        client.set_server_port(2525);
        client.set_auth_method(AuthMethod::Plain);
        // credentials missing for the selected auth method
        assert!(matches!(client.connect().await, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn send_message_requires_a_connection() {
        let mut client = Client::new();
        let message = MimeMessage::new();
        // invalid message is reported first
        assert!(matches!(
            client.send_message(&message).await,
            Err(Error::InvalidMessage)
        ));

        let mut message = MimeMessage::new();
        message.set_sender(mailcourier_mime::EmailAddress::new("a@b.co"));
        message.add_to(mailcourier_mime::EmailAddress::new("c@d.co"));
        message.set_subject("s");
        message.set_body_text("b");
        assert!(matches!(
            client.send_message(&message).await,
            Err(Error::Config(_))
        ));
    }
}
