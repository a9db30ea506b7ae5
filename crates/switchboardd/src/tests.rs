//! End-to-end behaviour of an in-process worker.

use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::time::Duration;

use camino::Utf8PathBuf;
use rstest::{fixture, rstest};
use serde_json::{Value, json};
use switchboard_bus::protocol::authenticate_message;
use switchboard_bus::{Message, MessageKind};
use switchboard_capabilities::Builtin;
use switchboard_config::{Config, RuntimePaths, SocketEndpoint};
use tempfile::TempDir;

use crate::bootstrap::{StaticConfigLoader, bootstrap_with};
use crate::health::StructuredHealthReporter;
use crate::process::LaunchError;
use crate::testing::InProcessWorker;

const READY_TIMEOUT: Duration = Duration::from_secs(5);

struct Sandbox {
    _dir: TempDir,
    config: Config,
}

impl Sandbox {
    fn paths(&self) -> RuntimePaths {
        RuntimePaths::from_config_readonly(&self.config).expect("runtime paths")
    }
}

#[fixture]
fn sandbox() -> Sandbox {
    let dir = TempDir::new().expect("temp dir");
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 temp dir");
    let config = Config {
        daemon_socket: SocketEndpoint::unix(root.join("run").join("switchboardd.sock")),
        log_filter: "warn".to_owned(),
        vfs_root: root.clone(),
        store_path: Some(root.join("store.json")),
        ..Config::default()
    };
    Sandbox { _dir: dir, config }
}

fn exchange(worker: &InProcessWorker, requests: &[Message]) -> Vec<Message> {
    let mut stream = UnixStream::connect(worker.socket_path()).expect("connect");
    for message in requests {
        let mut line = serde_json::to_vec(message).expect("encode");
        line.push(b'\n');
        stream.write_all(&line).expect("send");
    }
    stream.shutdown(Shutdown::Write).expect("close writes");
    BufReader::new(stream)
        .lines()
        .map_while(Result::ok)
        .map(|line| serde_json::from_str(&line).expect("decode"))
        .collect()
}

#[rstest]
fn ping_round_trips_over_the_socket(sandbox: Sandbox) {
    let worker = InProcessWorker::start(sandbox.config.clone());
    assert!(worker.wait_until_ready(READY_TIMEOUT), "worker never listened");
    let ping = Message::new(MessageKind::Query, "Ping", json!({"payload": "hello"}));

    let replies = exchange(&worker, &[authenticate_message(), ping.clone()]);

    let [authenticated, echoed] = replies.as_slice() else {
        panic!("expected two replies, got {replies:?}");
    };
    assert_eq!(authenticated.data, json!({"authenticated": true}));
    assert_eq!(echoed.kind, MessageKind::Reply);
    assert_eq!(echoed.data, json!({"payload": "hello"}));
    assert_eq!(echoed.metadata.causation.as_deref(), Some(ping.metadata.id.as_str()));
    worker.stop().expect("clean shutdown");
}

#[rstest]
fn ping_before_authenticate_is_rejected(sandbox: Sandbox) {
    let worker = InProcessWorker::start(sandbox.config.clone());
    assert!(worker.wait_until_ready(READY_TIMEOUT));
    let ping = Message::new(MessageKind::Query, "Ping", json!({"payload": "early"}));

    let replies = exchange(&worker, &[ping]);

    let [rejection] = replies.as_slice() else {
        panic!("expected one rejection, got {replies:?}");
    };
    assert!(rejection.is_error());
    assert_eq!(rejection.data["error"]["kind"], "protocol");
    worker.stop().expect("clean shutdown");
}

#[rstest]
fn runtime_files_track_the_worker(sandbox: Sandbox) {
    let paths = sandbox.paths();
    let worker = InProcessWorker::start(sandbox.config.clone());
    assert!(worker.wait_until_ready(READY_TIMEOUT));

    let pid = fs::read_to_string(paths.pid_path()).expect("pid file");
    assert_eq!(pid.trim(), std::process::id().to_string());
    let health: Value =
        serde_json::from_str(&fs::read_to_string(paths.health_path()).expect("health file"))
            .expect("health json");
    assert_eq!(health["status"], "ready");

    worker.stop().expect("clean shutdown");
    assert!(!paths.socket_path().exists());
    assert!(!paths.pid_path().exists());
    assert!(!paths.health_path().exists());
}

#[rstest]
fn a_second_worker_takes_over_once_the_first_exits(sandbox: Sandbox) {
    let first = InProcessWorker::start(sandbox.config.clone());
    assert!(first.wait_until_ready(READY_TIMEOUT));
    let second = InProcessWorker::start(sandbox.config.clone());

    first.stop().expect("first shutdown");
    assert!(second.wait_until_ready(READY_TIMEOUT), "second worker never listened");
    let replies = exchange(&second, &[authenticate_message()]);
    assert_eq!(replies.len(), 1);
    second.stop().expect("second shutdown");
}

#[rstest]
fn malformed_mount_tables_fail_the_launch(mut sandbox: Sandbox) {
    sandbox.config.vfs_mounts = vec!["missing-separator".to_owned()];
    let paths = sandbox.paths();
    let worker = InProcessWorker::start(sandbox.config.clone());

    assert!(!worker.wait_until_ready(Duration::from_millis(500)));
    let error = worker.stop().expect_err("bootstrap should fail");
    assert!(matches!(error, LaunchError::Bootstrap { .. }), "{error}");
    assert!(!paths.pid_path().exists(), "guard cleans up on failure");
}

#[rstest]
fn bootstrap_registers_every_builtin(sandbox: Sandbox) {
    let paths = RuntimePaths::from_config(&sandbox.config).expect("runtime paths");
    let worker = bootstrap_with(
        &StaticConfigLoader::new(sandbox.config.clone()),
        &StructuredHealthReporter::new(),
        &paths,
    )
    .expect("bootstrap");

    assert_eq!(worker.registry().len(), Builtin::ALL.len());
    assert_eq!(worker.config(), &sandbox.config);
}
