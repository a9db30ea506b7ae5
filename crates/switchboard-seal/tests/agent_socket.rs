//! Sealing against an agent served over a Unix socket.

use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::thread::{self, JoinHandle};

use camino::Utf8PathBuf;
use rstest::{fixture, rstest};
use sha2::{Digest, Sha256};
use switchboard_seal::{SealError, Sealer, SshAgentConnector, is_token};
use tempfile::TempDir;

const IDENTITIES_ANSWER: u8 = 12;
const SIGN_RESPONSE: u8 = 14;
const FAILURE: u8 = 5;

fn ssh_string(out: &mut Vec<u8>, bytes: &[u8]) {
    let length = u32::try_from(bytes.len()).expect("length fits");
    out.extend_from_slice(&length.to_be_bytes());
    out.extend_from_slice(bytes);
}

fn key_blob() -> Vec<u8> {
    let mut blob = Vec::new();
    ssh_string(&mut blob, b"ssh-ed25519");
    ssh_string(&mut blob, &[0x5a; 32]);
    blob
}

fn read_frame(stream: &mut UnixStream) -> Option<Vec<u8>> {
    let mut prefix = [0_u8; 4];
    stream.read_exact(&mut prefix).ok()?;
    let mut frame = vec![0_u8; usize::try_from(u32::from_be_bytes(prefix)).ok()?];
    stream.read_exact(&mut frame).ok()?;
    Some(frame)
}

fn write_frame(stream: &mut UnixStream, payload: &[u8]) {
    let length = u32::try_from(payload.len()).expect("length fits");
    stream.write_all(&length.to_be_bytes()).expect("write length");
    stream.write_all(payload).expect("write payload");
}

/// Answers identity and sign requests for a single ed25519 key.
fn serve(mut stream: UnixStream) {
    let blob = key_blob();
    while let Some(frame) = read_frame(&mut stream) {
        let reply = match frame.first() {
            Some(11) => {
                let mut reply = vec![IDENTITIES_ANSWER];
                reply.extend_from_slice(&1_u32.to_be_bytes());
                ssh_string(&mut reply, &blob);
                ssh_string(&mut reply, b"test@switchboard");
                reply
            }
            Some(13) => {
                let body = frame.get(1..).unwrap_or_default();
                let digest = Sha256::new().chain_update(body).finalize();
                let mut signature = Vec::new();
                ssh_string(&mut signature, b"ssh-ed25519");
                ssh_string(&mut signature, &digest);
                let mut reply = vec![SIGN_RESPONSE];
                ssh_string(&mut reply, &signature);
                reply
            }
            _ => vec![FAILURE],
        };
        write_frame(&mut stream, &reply);
    }
}

struct FakeAgent {
    _dir: TempDir,
    socket: Utf8PathBuf,
    _thread: JoinHandle<()>,
}

#[fixture]
fn agent() -> FakeAgent {
    let dir = TempDir::new().expect("temp dir");
    let socket = Utf8PathBuf::from_path_buf(dir.path().join("agent.sock")).expect("utf8 path");
    let listener = UnixListener::bind(socket.as_std_path()).expect("bind agent socket");
    let thread = thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            serve(stream);
        }
    });
    FakeAgent {
        _dir: dir,
        socket,
        _thread: thread,
    }
}

#[rstest]
fn two_seals_of_the_same_secret_differ_and_both_open(agent: FakeAgent) {
    let sealer = Sealer::new(SshAgentConnector::new(Some(&agent.socket)));

    let first = sealer.seal("hello").expect("first seal");
    let second = sealer.seal("hello").expect("second seal");

    assert_ne!(first, second);
    assert!(is_token(&first) && is_token(&second));
    assert_eq!(sealer.open(&first).expect("open first").as_str(), "hello");
    assert_eq!(sealer.open(&second).expect("open second").as_str(), "hello");
}

#[rstest]
fn tokens_survive_a_new_sealer(agent: FakeAgent) {
    let token = Sealer::new(SshAgentConnector::new(Some(&agent.socket)))
        .seal("persisted")
        .expect("seal");
    let reopened = Sealer::new(SshAgentConnector::new(Some(&agent.socket)))
        .open(&token)
        .expect("open with fresh sealer");
    assert_eq!(reopened.as_str(), "persisted");
}

#[test]
fn unreachable_agents_fail_to_seal() {
    let dir = TempDir::new().expect("temp dir");
    let socket = Utf8PathBuf::from_path_buf(dir.path().join("missing.sock")).expect("utf8 path");
    let sealer = Sealer::new(SshAgentConnector::new(Some(&socket)));
    let error = sealer.seal("hello").expect_err("no agent");
    assert!(matches!(error, SealError::Agent(_)));
}
