//! Integration tests for the IMAP session.
//!
//! These tests run the public API against a scripted in-memory server over
//! `tokio::io::duplex`, without requiring a real server connection.

#![allow(clippy::unwrap_used, clippy::similar_names)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio::task::JoinHandle;

use inboxkit_imap::{
    Completion, Connector, Credentials, Error, ProtocolLogger, ProviderConfig, Provider,
    RecordingLogger, Result, Security, Session, SessionState, Tag, Uid,
};

/// Hands the client half of a duplex pipe to the session.
struct Pipe(std::sync::Mutex<Option<DuplexStream>>);

impl Connector for Pipe {
    type Stream = DuplexStream;

    async fn connect(&self, _config: &ProviderConfig) -> Result<DuplexStream> {
        self.0
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| Error::ConnectionFailed("pipe already used".into()))
    }
}

/// Produces the server output for `(tag, command)`, or `None` to stay silent.
type Script = Box<dyn Fn(&str, &str) -> Option<String> + Send>;

/// Runs a fake server: greets, answers LOGIN/SELECT/LOGOUT, and defers every
/// other command to `script`. Returns the command lines it received.
fn spawn_server(
    stream: DuplexStream,
    greeting: &'static str,
    script: Script,
) -> JoinHandle<Vec<String>> {
    tokio::spawn(async move {
        let (read, mut write) = tokio::io::split(stream);
        let mut lines = BufReader::new(read).lines();
        let mut received = Vec::new();

        write.write_all(greeting.as_bytes()).await.unwrap();
        while let Ok(Some(line)) = lines.next_line().await {
            let (tag, command) = line.split_once(' ').unwrap();
            let reply = if command.starts_with("LOGIN ") || command.starts_with("SELECT ") {
                Some(format!("{tag} OK completed\r\n"))
            } else if command == "LOGOUT" {
                Some(format!("* BYE logging out\r\n{tag} OK LOGOUT completed\r\n"))
            } else {
                script(tag, command)
            };
            received.push(line.clone());
            if let Some(reply) = reply {
                // Yield so that a second client command, if one were sent
                // early, would be queued before this reply lands.
                tokio::task::yield_now().await;
                if write.write_all(reply.as_bytes()).await.is_err() {
                    break;
                }
            }
        }
        received
    })
}

fn config() -> ProviderConfig {
    ProviderConfig::builder("imap.test.invalid")
        .security(Security::None)
        .command_timeout(Duration::from_millis(200))
        .build()
}

fn start(greeting: &'static str, script: Script) -> (Session<Pipe>, JoinHandle<Vec<String>>) {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let server = spawn_server(server, greeting, script);
    let session = Session::with_connector(
        config(),
        Credentials::new("u", "p"),
        Pipe(std::sync::Mutex::new(Some(client))),
    );
    (session, server)
}

fn uid(n: u32) -> Uid {
    Uid::new(n).unwrap()
}

#[tokio::test]
async fn test_connect_and_list_newest_first() {
    let (session, server) = start(
        "* OK ready\r\n",
        Box::new(|tag: &str, command: &str| {
            (command == "UID SEARCH ALL")
                .then(|| format!("* SEARCH 3 5 9\r\n{tag} OK SEARCH done\r\n"))
        }),
    );

    session.connect().await.unwrap();
    let list: Vec<String> = session
        .fetch_inbox_uids(10, 0)
        .await
        .unwrap()
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(list, vec!["9", "5", "3"]);

    session.disconnect().await;
    let received = server.await.unwrap();
    assert_eq!(
        received,
        vec![
            "A0001 LOGIN \"u\" \"p\"",
            "A0002 SELECT INBOX",
            "A0003 UID SEARCH ALL",
            "A0004 LOGOUT",
        ]
    );
}

#[tokio::test]
async fn test_pagination_window() {
    let (session, _server) = start(
        "* OK ready\r\n",
        Box::new(|tag: &str, _: &str| Some(format!("* SEARCH 1 2 3 4 5 6 7\r\n{tag} OK\r\n"))),
    );
    session.connect().await.unwrap();

    assert_eq!(session.fetch_inbox_uids(3, 2).await.unwrap(), vec![uid(5), uid(4), uid(3)]);
    assert_eq!(session.fetch_inbox_uids(10, 5).await.unwrap(), vec![uid(2), uid(1)]);
    assert!(session.fetch_inbox_uids(10, 7).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_fetch_message_keeps_literal_bytes() {
    // The body contains a line that looks exactly like the completion.
    let body = "Subject: hi\r\n\r\nA0003 OK fake\r\n";
    let (session, _server) = start(
        "* OK ready\r\n",
        Box::new(move |tag: &str, command: &str| {
            if command == "NOOP" {
                return Some(format!("{tag} OK\r\n"));
            }
            assert_eq!(command, "UID FETCH 42 (FLAGS INTERNALDATE RFC822)");
            Some(format!(
                "* 1 FETCH (UID 42 FLAGS (\\Seen) \
                 INTERNALDATE \"02-Mar-2024 10:00:00 +0100\" \
                 RFC822 {{{}}}\r\n{body})\r\n{tag} OK FETCH completed\r\n",
                body.len()
            ))
        }),
    );
    session.connect().await.unwrap();

    let message = session.fetch_message(uid(42)).await.unwrap();
    assert_eq!(message.uid, uid(42));
    assert_eq!(&message.raw[..], body.as_bytes());
    assert!(message.flags.is_seen());
    assert!(message.internal_date.is_some());

    // The session is still in step with the server.
    session.noop().await.unwrap();
}

#[tokio::test]
async fn test_untagged_line_resembling_tag_is_not_a_completion() {
    let (session, _server) = start(
        "* OK ready\r\n",
        Box::new(|tag: &str, _: &str| {
            Some(format!("* {tag} OK decoy\r\n* SEARCH 8\r\n{tag} OK\r\n"))
        }),
    );
    session.connect().await.unwrap();
    assert_eq!(session.fetch_inbox_uids(10, 0).await.unwrap(), vec![uid(8)]);
}

#[tokio::test]
async fn test_no_is_protocol_error_and_no_such_is_not_found() {
    let (session, _server) = start(
        "* OK ready\r\n",
        Box::new(|tag: &str, command: &str| {
            Some(if command == "NOOP" {
                format!("{tag} NO Mailbox does not exist\r\n")
            } else {
                format!("{tag} NO no such message\r\n")
            })
        }),
    );
    session.connect().await.unwrap();

    match session.noop().await {
        Err(Error::Protocol(detail)) => assert!(detail.starts_with("IMAP NO for command: NOOP")),
        other => panic!("unexpected {other:?}"),
    }

    let err = session.trash_message(uid(42)).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(matches!(&err, Error::MessageNotFound(u) if u.to_string() == "42"));
}

#[tokio::test(start_paused = true)]
async fn test_stalled_command_times_out() {
    let (session, _server) = start("* OK ready\r\n", Box::new(|_: &str, _: &str| None));
    session.connect().await.unwrap();

    let started = tokio::time::Instant::now();
    let err = session.noop().await.unwrap_err();
    assert!(err.is_timeout(), "{err}");
    assert!(started.elapsed() >= Duration::from_millis(200));

    // Unusable afterwards, and disconnect still completes.
    assert!(session.fetch_inbox_uids(1, 0).await.is_err());
    session.disconnect().await;
    assert_eq!(session.state(), SessionState::Disconnected);
}

/// Counts commands between `on_command` and `on_completion`.
#[derive(Default)]
struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl ProtocolLogger for InFlight {
    fn on_command(&self, _tag: &Tag, _command: &str) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn on_completion(&self, _tag: &Tag, _completion: &Completion, _elapsed: Duration) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers_are_serialized() {
    let (session, server) = start(
        "* OK ready\r\n",
        Box::new(|tag: &str, command: &str| match command {
            "NOOP" => Some(format!("{tag} OK\r\n")),
            _ => Some(format!("* SEARCH 1 2\r\n{tag} OK\r\n")),
        }),
    );
    let in_flight = Arc::new(InFlight::default());
    let session = Arc::new(session.with_logger(in_flight.clone()));
    session.connect().await.unwrap();

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let session = Arc::clone(&session);
            tokio::spawn(async move {
                if i % 2 == 0 {
                    session.noop().await.map(|()| 0)
                } else {
                    session.fetch_inbox_uids(10, 0).await.map(|uids| uids.len())
                }
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }
    assert_eq!(in_flight.peak.load(Ordering::SeqCst), 1);

    session.disconnect().await;
    let received = server.await.unwrap();
    // LOGIN, SELECT, 16 commands, LOGOUT, with strictly increasing tags.
    assert_eq!(received.len(), 19);
    let tags: Vec<&str> = received.iter().map(|l| l.split(' ').next().unwrap()).collect();
    assert!(tags.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn test_default_archive_uses_detected_provider() {
    let (session, server) = start(
        "* OK Gimap ready for requests\r\n",
        Box::new(|tag: &str, _: &str| Some(format!("{tag} OK\r\n"))),
    );
    session.connect().await.unwrap();
    assert_eq!(session.provider(), Provider::Gmail);

    session.archive_message_default(uid(5)).await.unwrap();
    session.disconnect().await;

    let received = server.await.unwrap();
    assert_eq!(
        &received[2..5],
        &[
            "A0003 UID COPY 5 \"[Gmail]/All Mail\"".to_string(),
            "A0004 UID STORE 5 +FLAGS.SILENT (\\Deleted)".to_string(),
            "A0005 EXPUNGE".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_credentials_never_reach_logger() {
    let (client, server) = tokio::io::duplex(4096);
    let _server = spawn_server(server, "* OK ready\r\n", Box::new(|_: &str, _: &str| None));
    let logger = Arc::new(RecordingLogger::new());
    let session = Session::with_connector(
        config(),
        Credentials::new("alice@example.com", "correct horse battery"),
        Pipe(std::sync::Mutex::new(Some(client))),
    )
    .with_logger(logger.clone());

    session.connect().await.unwrap();
    session.disconnect().await;

    let lines = logger.lines();
    assert!(lines.iter().any(|l| l.contains("LOGIN <redacted>")));
    assert!(lines.iter().all(|l| !l.contains("correct horse") && !l.contains("alice@")));
}

#[tokio::test]
async fn test_refused_greeting() {
    let (session, _server) = start(
        "* BYE server shutting down\r\n",
        Box::new(|_: &str, _: &str| None),
    );
    assert!(matches!(session.connect().await, Err(Error::ConnectionFailed(_))));
    assert!(!session.is_connected());
}
