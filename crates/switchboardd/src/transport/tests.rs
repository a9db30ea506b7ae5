//! Listener and connection protocol tests.

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use rstest::{fixture, rstest};
use serde_json::json;
use switchboard_bus::protocol::authenticate_message;
use switchboard_bus::{Message, MessageKind, Registry};
use switchboard_capabilities::meta::{AuthenticateCapability, PingCapability};
use switchboard_config::{Config, RuntimePaths, SocketEndpoint};
use tempfile::TempDir;

use super::connection::MAX_LINE_BYTES;
use super::{BusConnectionHandler, ConnectionHandler, SocketListener};
use crate::bootstrap::BootstrapError;
use crate::health::HealthReporter;
use crate::lifecycle::Lifecycle;

struct CountingHandler {
    count: AtomicUsize,
}

impl ConnectionHandler for CountingHandler {
    fn handle(&self, _connection: u64, _stream: UnixStream) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ConnectionEvent {
    Opened,
    Rejected(String),
    Closed(usize),
}

#[derive(Default)]
struct RecordingReporter {
    events: Mutex<Vec<ConnectionEvent>>,
}

impl RecordingReporter {
    fn events(&self) -> Vec<ConnectionEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, event: ConnectionEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl HealthReporter for RecordingReporter {
    fn bootstrap_starting(&self) {}

    fn bootstrap_succeeded(&self, _config: &Config, _capabilities: usize) {}

    fn bootstrap_failed(&self, _error: &BootstrapError) {}

    fn connection_opened(&self, _connection: u64) {
        self.record(ConnectionEvent::Opened);
    }

    fn connection_rejected(&self, _connection: u64, reason: &str) {
        self.record(ConnectionEvent::Rejected(reason.to_owned()));
    }

    fn connection_closed(&self, _connection: u64, messages: usize) {
        self.record(ConnectionEvent::Closed(messages));
    }
}

struct Runtime {
    _dir: TempDir,
    paths: RuntimePaths,
}

#[fixture]
fn runtime() -> Runtime {
    let dir = TempDir::new().expect("temp dir");
    let socket =
        Utf8PathBuf::from_path_buf(dir.path().join("switchboardd.sock")).expect("utf-8 temp dir");
    let config = Config {
        daemon_socket: SocketEndpoint::unix(socket),
        ..Config::default()
    };
    let paths = RuntimePaths::from_config(&config).expect("runtime paths");
    Runtime { _dir: dir, paths }
}

#[fixture]
fn registry() -> Arc<Registry> {
    let registry = Registry::builder()
        .register("Authenticate", AuthenticateCapability)
        .and_then(|builder| builder.register("Ping", PingCapability))
        .expect("registry")
        .build();
    Arc::new(registry)
}

fn wait_for_count(count: &AtomicUsize, expected: usize) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if count.load(Ordering::SeqCst) >= expected {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    false
}

/// Runs `lines` through a handler over a socket pair and collects the replies.
fn converse(
    registry: Arc<Registry>,
    reporter: Arc<RecordingReporter>,
    lines: &[String],
) -> Vec<Message> {
    let (mut client, server) = UnixStream::pair().expect("socket pair");
    let handler = BusConnectionHandler::new(registry, reporter);
    let worker = thread::spawn(move || handler.handle(1, server));

    for line in lines {
        if client.write_all(line.as_bytes()).is_err() {
            break;
        }
    }
    client
        .shutdown(std::net::Shutdown::Write)
        .expect("close client writes");
    // A reset after the last reply is fine: the worker may close with input unread.
    let replies = BufReader::new(client)
        .lines()
        .map_while(Result::ok)
        .map(|line| serde_json::from_str(&line).expect("decode reply"))
        .collect();
    worker.join().expect("handler thread");
    replies
}

fn encode(message: &Message) -> String {
    let mut line = serde_json::to_string(message).expect("encode");
    line.push('\n');
    line
}

fn ping(payload: &str) -> Message {
    Message::new(MessageKind::Query, "Ping", json!({"payload": payload}))
}

#[rstest]
fn listener_publishes_socket_and_accepts_connections(runtime: Runtime) {
    let listener = SocketListener::bind(&runtime.paths).expect("bind");
    let staging = runtime.paths.staging_socket_path(std::process::id());
    assert!(staging.exists(), "bind happens at the staging path");
    assert!(!runtime.paths.socket_path().exists());

    let handler = Arc::new(CountingHandler {
        count: AtomicUsize::new(0),
    });
    let handle = listener
        .start(Arc::clone(&handler) as Arc<dyn ConnectionHandler>, Lifecycle::new())
        .expect("start");

    assert!(runtime.paths.socket_path().exists());
    assert!(!staging.exists(), "staging path is renamed away");
    UnixStream::connect(runtime.paths.socket_path()).expect("first client");
    UnixStream::connect(runtime.paths.socket_path()).expect("second client");
    assert!(wait_for_count(&handler.count, 2), "expected two connections");

    handle.shutdown();
    handle.join().expect("join listener");
    assert!(
        !runtime.paths.socket_path().exists(),
        "socket is removed on shutdown"
    );
}

#[rstest]
fn stale_sockets_are_replaced(runtime: Runtime) {
    drop(std::os::unix::net::UnixListener::bind(runtime.paths.socket_path()).expect("stale"));
    assert!(runtime.paths.socket_path().exists());

    let lifecycle = Lifecycle::new();
    let handler = Arc::new(CountingHandler {
        count: AtomicUsize::new(0),
    });
    let handle = SocketListener::bind(&runtime.paths)
        .expect("bind")
        .start(Arc::clone(&handler) as Arc<dyn ConnectionHandler>, lifecycle.clone())
        .expect("start");

    UnixStream::connect(runtime.paths.socket_path()).expect("connect to fresh socket");
    assert!(wait_for_count(&handler.count, 1));

    lifecycle.signal();
    handle.join().expect("join listener");
}

#[rstest]
fn messages_before_authenticate_are_rejected(registry: Arc<Registry>) {
    let reporter = Arc::new(RecordingReporter::default());
    let replies = converse(
        registry,
        Arc::clone(&reporter),
        &[encode(&ping("early")), encode(&authenticate_message())],
    );

    assert_eq!(replies.len(), 1, "connection closes after the rejection");
    let reply = replies.first().expect("reply");
    assert_eq!(reply.kind, MessageKind::Error);
    assert_eq!(reply.data["error"]["kind"], "protocol");
    assert!(reply.metadata.causation.is_none());
    assert!(matches!(
        reporter.events().as_slice(),
        [ConnectionEvent::Rejected(reason)] if reason.contains("Ping")
    ));
}

#[rstest]
fn replies_follow_request_order(registry: Arc<Registry>) {
    let reporter = Arc::new(RecordingReporter::default());
    let requests: Vec<Message> = (0..5).map(|index| ping(&format!("n{index}"))).collect();
    let mut lines = vec![encode(&authenticate_message()), "\n".to_owned()];
    lines.extend(requests.iter().map(encode));

    let replies = converse(registry, Arc::clone(&reporter), &lines);

    let (authenticated, rest) = replies.split_first().expect("authenticate reply");
    assert_eq!(authenticated.data, json!({"authenticated": true}));
    assert_eq!(rest.len(), requests.len());
    for (request, reply) in requests.iter().zip(rest) {
        assert_eq!(reply.kind, MessageKind::Reply);
        assert_eq!(reply.metadata.causation.as_deref(), Some(request.metadata.id.as_str()));
        assert_eq!(reply.data, request.data);
    }
    assert_eq!(
        reporter.events(),
        vec![ConnectionEvent::Opened, ConnectionEvent::Closed(5)]
    );
}

#[rstest]
fn clients_that_read_after_writing_everything_get_every_reply(registry: Arc<Registry>) {
    // Enough reply bytes to overflow the socket buffers several times over.
    let padding = "p".repeat(512);
    let count = 4_000;
    let mut lines = vec![encode(&authenticate_message())];
    lines.extend((0..count).map(|index| encode(&ping(&format!("{index}-{padding}")))));

    let replies = converse(registry, Arc::new(RecordingReporter::default()), &lines);

    assert_eq!(replies.len(), count + 1);
    let last = replies.last().expect("final reply");
    assert_eq!(last.data, json!({"payload": format!("{}-{padding}", count - 1)}));
}

#[rstest]
fn malformed_lines_do_not_end_the_session(registry: Arc<Registry>) {
    let request = ping("after");
    let lines = [
        encode(&authenticate_message()),
        "{not json\n".to_owned(),
        encode(&request),
    ];

    let replies = converse(registry, Arc::new(RecordingReporter::default()), &lines);

    let kinds: Vec<MessageKind> = replies.iter().map(|reply| reply.kind).collect();
    assert_eq!(
        kinds,
        vec![MessageKind::Reply, MessageKind::Error, MessageKind::Reply]
    );
    let last = replies.last().expect("ping reply");
    assert_eq!(last.metadata.causation.as_deref(), Some(request.metadata.id.as_str()));
}

#[rstest]
fn unknown_types_get_not_found(registry: Arc<Registry>) {
    let lines = [
        encode(&authenticate_message()),
        encode(&Message::new(MessageKind::Command, "Shell.Exec", json!({}))),
    ];

    let replies = converse(registry, Arc::new(RecordingReporter::default()), &lines);

    let last = replies.last().expect("reply");
    assert_eq!(last.data["error"]["kind"], "not_found");
}

#[rstest]
fn oversized_lines_end_the_session(registry: Arc<Registry>) {
    let mut huge = "x".repeat(MAX_LINE_BYTES + 16);
    huge.push('\n');
    let lines = [encode(&authenticate_message()), huge, encode(&ping("late"))];

    let replies = converse(registry, Arc::new(RecordingReporter::default()), &lines);

    assert_eq!(replies.len(), 2);
    let last = replies.last().expect("error reply");
    assert_eq!(last.data["error"]["kind"], "protocol");
}
