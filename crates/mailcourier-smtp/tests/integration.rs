//! Integration tests for the SMTP driver.
//!
//! Each test scripts a server on a local listener and drives the real
//! client against it, without a live mail server.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use mailcourier_mime::{EmailAddress, MimeMessage};
use mailcourier_smtp::{AuthMethod, Client, ConnectionType, Error, Timeouts};

/// One step of a scripted server conversation.
enum Step {
    /// Send a raw chunk without reading anything first.
    Push(String),
    /// Read one command line, assert its prefix, then send the reply.
    Expect(&'static str, String),
    /// Read lines up to the lone-dot terminator, then send the reply.
    ExpectData(String),
    /// Keep the socket open, doing nothing, for the given time.
    Sleep(u64),
}

fn push(chunk: &str) -> Step {
    Step::Push(chunk.to_string())
}

fn expect(prefix: &'static str, reply: &str) -> Step {
    Step::Expect(prefix, reply.to_string())
}

/// Runs the script against the first accepted connection and returns every
/// command line the client sent.
fn spawn_server(listener: TcpListener, script: Vec<Step>) -> JoinHandle<Vec<String>> {
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept failed");
        let mut reader = BufReader::new(stream);
        let mut seen = Vec::new();

        for step in script {
            match step {
                Step::Push(chunk) => {
                    reader
                        .get_mut()
                        .write_all(chunk.as_bytes())
                        .await
                        .expect("server write failed");
                }
                Step::Expect(prefix, reply) => {
                    let mut line = String::new();
                    reader.read_line(&mut line).await.expect("server read failed");
                    let line = line.trim_end().to_string();
                    assert!(
                        line.starts_with(prefix),
                        "server expected {prefix:?}, got {line:?}"
                    );
                    seen.push(line);
                    reader
                        .get_mut()
                        .write_all(reply.as_bytes())
                        .await
                        .expect("server write failed");
                }
                Step::ExpectData(reply) => loop {
                    let mut line = String::new();
                    reader.read_line(&mut line).await.expect("server read failed");
                    let line = line.trim_end().to_string();
                    let done = line == ".";
                    seen.push(line);
                    if done {
                        reader
                            .get_mut()
                            .write_all(reply.as_bytes())
                            .await
                            .expect("server write failed");
                        break;
                    }
                },
                Step::Sleep(millis) => {
                    tokio::time::sleep(Duration::from_millis(millis)).await;
                }
            }
        }
        seen
    })
}

async fn bound_listener() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let port = listener.local_addr().expect("local addr").port();
    (listener, port)
}

fn client_for(port: u16) -> Client {
    let mut client = Client::new();
    client.set_server_host("127.0.0.1");
    client.set_server_port(port);
    client.set_client_host("client.test");
    client.set_connection_type(ConnectionType::Tcp);
    client
}

fn test_message() -> MimeMessage {
    let mut message = MimeMessage::new();
    message.set_sender(EmailAddress::new("a@b.co"));
    message.add_to(EmailAddress::new("c@d.co"));
    message.set_subject("greetings");
    message.set_body_text("hello over there");
    message
}

#[tokio::test]
async fn submits_a_message_end_to_end() {
    let (listener, port) = bound_listener().await;
    let server = spawn_server(
        listener,
        vec![
            push("220 mail.test ESMTP\r\n"),
            expect("EHLO client.test", "250-mail.test\r\n250 OK\r\n"),
            expect("MAIL FROM:<a@b.co>", "250 ok\r\n"),
            expect("RCPT TO:<c@d.co>", "250 ok\r\n"),
            expect("DATA", "354 go ahead\r\n"),
            Step::ExpectData("250 queued\r\n".to_string()),
        ],
    );

    let mut client = client_for(port);
    client.connect().await.expect("connect should succeed");
    assert!(client.is_connected());
    assert_eq!(client.server_info().hostname, "mail.test");

    client
        .send_message(&test_message())
        .await
        .expect("send should succeed");
    assert!(client.is_connected());

    client.close().await;
    assert!(!client.is_connected());

    let seen = server.await.expect("server task");
    assert!(seen.iter().any(|l| l.as_str() == "Subject: =?utf-8?Q?greetings?="));
    assert!(seen.iter().any(|l| l.as_str() == "hello=20over=20there"));
    assert!(seen.last().is_some_and(|l| l.as_str() == "."));
}

#[tokio::test]
async fn sends_cc_recipients_in_the_envelope() {
    let (listener, port) = bound_listener().await;
    let server = spawn_server(
        listener,
        vec![
            push("220 mail.test ESMTP\r\n"),
            expect("EHLO", "250 OK\r\n"),
            expect("MAIL FROM:<a@b.co>", "250 ok\r\n"),
            expect("RCPT TO:<c@d.co>", "250 ok\r\n"),
            expect("RCPT TO:<copy@d.co>", "250 ok\r\n"),
            expect("DATA", "354 go ahead\r\n"),
            Step::ExpectData("250 queued\r\n".to_string()),
        ],
    );

    let mut client = client_for(port);
    client.connect().await.expect("connect should succeed");

    let mut message = test_message();
    message.add_cc(EmailAddress::new("copy@d.co"));
    client
        .send_message(&message)
        .await
        .expect("send should succeed");

    client.close().await;
    server.await.expect("server task");
}

#[tokio::test]
async fn authenticates_with_cram_md5() {
    // the worked example from RFC 2195 section 2
    let challenge = "<1896.697170952@postoffice.reston.mci.net>";
    let challenge_b64 = STANDARD.encode(challenge);
    let expected_token = STANDARD.encode("tim b913a602c7eda7a495b4e6e7334d3890");

    let (listener, port) = bound_listener().await;
    let server = spawn_server(
        listener,
        vec![
            push("220 mail.test ESMTP\r\n"),
            expect("EHLO", "250-mail.test\r\n250 AUTH CRAM-MD5\r\n"),
            expect("AUTH CRAM-MD5", &format!("334 {challenge_b64}\r\n")),
            expect("", "235 accepted\r\n"),
        ],
    );

    let mut client = client_for(port);
    client.set_auth_method(AuthMethod::CramMd5);
    client.set_username("tim");
    client.set_password("tanstaaftanstaaf");
    client.connect().await.expect("connect should succeed");
    assert!(client.is_connected());
    client.close().await;

    let seen = server.await.expect("server task");
    assert_eq!(seen.last().expect("token line"), &expected_token);
}

#[tokio::test]
async fn authenticates_with_login() {
    let (listener, port) = bound_listener().await;
    let server = spawn_server(
        listener,
        vec![
            push("220 mail.test ESMTP\r\n"),
            expect("EHLO", "250-mail.test\r\n250 AUTH LOGIN PLAIN\r\n"),
            expect("AUTH LOGIN", "334 VXNlcm5hbWU6\r\n"),
            expect("", "334 UGFzc3dvcmQ6\r\n"),
            expect("", "235 accepted\r\n"),
        ],
    );

    let mut client = client_for(port);
    client.set_auth_method(AuthMethod::Login);
    client.set_username("user");
    client.set_password("secret");
    client.connect().await.expect("connect should succeed");
    client.close().await;

    let seen = server.await.expect("server task");
    assert_eq!(seen[2], STANDARD.encode("user"));
    assert_eq!(seen[3], STANDARD.encode("secret"));
}

#[tokio::test]
async fn authenticates_with_plain() {
    let (listener, port) = bound_listener().await;
    let server = spawn_server(
        listener,
        vec![
            push("220 mail.test ESMTP\r\n"),
            expect("EHLO", "250-mail.test\r\n250 AUTH PLAIN\r\n"),
            expect("AUTH PLAIN ", "235 accepted\r\n"),
        ],
    );

    let mut client = client_for(port);
    client.set_username("user");
    client.set_password("secret");
    client.connect().await.expect("connect should succeed");
    client.close().await;

    let seen = server.await.expect("server task");
    let expected = STANDARD.encode("\0user\0secret");
    assert_eq!(seen[1], format!("AUTH PLAIN {expected}"));
}

#[tokio::test]
async fn refuses_auth_the_server_does_not_offer() {
    let (listener, port) = bound_listener().await;
    let server = spawn_server(
        listener,
        vec![
            push("220 mail.test ESMTP\r\n"),
            expect("EHLO", "250-mail.test\r\n250 AUTH PLAIN\r\n"),
            Step::Sleep(200),
        ],
    );

    let mut client = client_for(port);
    client.set_auth_method(AuthMethod::CramMd5);
    client.set_username("user");
    client.set_password("secret");

    let err = client.connect().await.expect_err("connect should fail");
    assert!(matches!(err, Error::NotSupported(_)));
    assert!(!client.is_connected());

    server.await.expect("server task");
}

#[tokio::test]
async fn crosstalk_before_a_send_fails_and_closes() {
    let (listener, port) = bound_listener().await;
    let server = spawn_server(
        listener,
        vec![
            push("220 mail.test ESMTP\r\n"),
            expect("EHLO", "250-mail.test\r\n250 AUTH PLAIN\r\n"),
            // an unsolicited status line rides along with the auth reply
            expect("AUTH PLAIN", "235 accepted\r\n250 surprise\r\n"),
            Step::Sleep(500),
        ],
    );

    let mut client = client_for(port);
    client.set_username("user");
    client.set_password("secret");
    client.connect().await.expect("connect should succeed");

    // let the stray line reach the client before the next send
    tokio::time::sleep(Duration::from_millis(50)).await;

    let err = client
        .send_message(&test_message())
        .await
        .expect_err("send should fail");
    assert!(matches!(err, Error::Crosstalk));
    assert!(!client.is_connected());

    server.await.expect("server task");
}

#[tokio::test]
async fn unexpected_reply_closes_the_connection() {
    let (listener, port) = bound_listener().await;
    let server = spawn_server(
        listener,
        vec![
            push("220 mail.test ESMTP\r\n"),
            expect("EHLO", "250 OK\r\n"),
            expect("MAIL FROM", "550 rejected\r\n"),
            Step::Sleep(200),
        ],
    );

    let mut client = client_for(port);
    client.connect().await.expect("connect should succeed");

    let err = client
        .send_message(&test_message())
        .await
        .expect_err("send should fail");
    match err {
        Error::UnexpectedReply { line, .. } => assert_eq!(line, "550 rejected"),
        other => panic!("expected UnexpectedReply, got {other:?}"),
    }
    assert!(!client.is_connected());

    server.await.expect("server task");
}

#[tokio::test]
async fn an_invalid_message_leaves_the_session_open() {
    let (listener, port) = bound_listener().await;
    let server = spawn_server(
        listener,
        vec![
            push("220 mail.test ESMTP\r\n"),
            expect("EHLO", "250 OK\r\n"),
            Step::Sleep(300),
        ],
    );

    let mut client = client_for(port);
    client.connect().await.expect("connect should succeed");

    let incomplete = MimeMessage::new();
    let err = client
        .send_message(&incomplete)
        .await
        .expect_err("send should fail");
    assert!(matches!(err, Error::InvalidMessage));
    assert!(client.is_connected());

    client.close().await;
    server.await.expect("server task");
}

#[tokio::test]
async fn setters_are_ignored_while_connected() {
    let (listener, port) = bound_listener().await;
    let server = spawn_server(
        listener,
        vec![
            push("220 mail.test ESMTP\r\n"),
            expect("EHLO", "250 OK\r\n"),
            Step::Sleep(300),
        ],
    );

    let mut client = client_for(port);
    client.connect().await.expect("connect should succeed");

    client.set_server_host("elsewhere.test");
    client.set_server_port(2626);
    client.set_client_host("other.test");
    client.set_auth_method(AuthMethod::Login);
    client.set_username("intruder");
    client.set_timeouts(Timeouts {
        connect: Duration::from_secs(1),
        response: Duration::from_secs(1),
        send: Duration::from_secs(1),
    });
    client.set_traffic_log_enabled(true);

    assert_eq!(client.server_host(), "127.0.0.1");
    assert_eq!(client.server_port(), port);
    assert_eq!(client.client_host(), "client.test");
    assert_eq!(client.auth_method(), AuthMethod::None);
    assert_eq!(client.username(), "");
    assert_eq!(client.timeouts(), Timeouts::default());
    assert!(!client.traffic_log_enabled());

    client.close().await;
    // disconnected again, configuration opens back up
    client.set_server_host("elsewhere.test");
    assert_eq!(client.server_host(), "elsewhere.test");

    server.await.expect("server task");
}

#[tokio::test]
async fn close_sends_quit_and_is_idempotent() {
    let (listener, port) = bound_listener().await;
    let server = spawn_server(
        listener,
        vec![
            push("220 mail.test ESMTP\r\n"),
            expect("EHLO", "250 OK\r\n"),
            expect("QUIT", "221 bye\r\n"),
        ],
    );

    let mut client = client_for(port);
    client.connect().await.expect("connect should succeed");

    client.close().await;
    assert!(!client.is_connected());
    client.close().await;
    assert!(!client.is_connected());

    let seen = server.await.expect("server task");
    assert!(seen.iter().any(|l| l.as_str() == "QUIT"));
}

#[tokio::test]
async fn a_silent_server_times_out_the_greeting() {
    let (listener, port) = bound_listener().await;
    let server = spawn_server(listener, vec![Step::Sleep(2_000)]);

    let mut client = client_for(port);
    client.set_timeouts(Timeouts {
        connect: Duration::from_secs(5),
        response: Duration::from_millis(200),
        send: Duration::from_secs(5),
    });

    let err = client.connect().await.expect_err("connect should fail");
    assert!(matches!(err, Error::Timeout(..)));
    assert!(!client.is_connected());

    server.abort();
    let _ = server.await;
}

#[tokio::test]
async fn connecting_twice_is_rejected() {
    let (listener, port) = bound_listener().await;
    let server = spawn_server(
        listener,
        vec![
            push("220 mail.test ESMTP\r\n"),
            expect("EHLO", "250 OK\r\n"),
            Step::Sleep(300),
        ],
    );

    let mut client = client_for(port);
    client.connect().await.expect("connect should succeed");
    assert!(matches!(client.connect().await, Err(Error::Config(_))));
    // the established session survives the rejected call
    assert!(client.is_connected());

    client.close().await;
    server.await.expect("server task");
}
