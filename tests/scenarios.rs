use atvpause::app::{self, Options};
use atvpause::config::{CredentialMarker, CredentialStore, EnvFile, CERT_KEY, HOST_KEY};
use atvpause::endpoint::Endpoint;
use atvpause::error::Failure;
use atvpause::identity::IdentityError;
use atvpause::orchestrator::Settings;
use atvpause::pin::Pin;
use atvpause::prompt::Scripted;
use atvpause::tv::{
    Channel, ConnectError, KeyCode, PairingError, PairingSession, SendError, Transport,
};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;

type Log = Rc<RefCell<Vec<String>>>;

/// Transport whose device behaviour is fixed up front. Every call is
/// appended to a shared log so the test can inspect it after the run.
struct Device {
    log: Log,
    identity: bool,
    pin_replies: Rc<RefCell<VecDeque<Result<(), PairingError>>>>,
    connect_error: Option<ConnectError>,
    broken_channel: bool,
}

impl Device {
    fn new(log: &Log) -> Self {
        Self {
            log: log.clone(),
            identity: false,
            pin_replies: Rc::new(RefCell::new(VecDeque::new())),
            connect_error: None,
            broken_channel: false,
        }
    }

    fn with_identity(mut self) -> Self {
        self.identity = true;
        self
    }

    fn replying(self, replies: Vec<Result<(), PairingError>>) -> Self {
        self.pin_replies.borrow_mut().extend(replies);
        self
    }

    fn failing_connect(mut self, err: ConnectError) -> Self {
        self.connect_error = Some(err);
        self
    }

    fn dropping_keys(mut self) -> Self {
        self.broken_channel = true;
        self
    }
}

struct Session {
    log: Log,
    replies: Rc<RefCell<VecDeque<Result<(), PairingError>>>>,
}

impl PairingSession for Session {
    fn finish(&mut self, pin: &Pin) -> Result<(), PairingError> {
        self.log.borrow_mut().push(format!("pin {}", pin.as_str()));
        self.replies.borrow_mut().pop_front().unwrap_or(Ok(()))
    }
}

struct Remote {
    log: Log,
    broken: bool,
}

impl Channel for Remote {
    fn send_key(&mut self, key: KeyCode) -> Result<(), SendError> {
        self.log.borrow_mut().push(format!("key {}", key as u32));
        if self.broken {
            return Err(io::Error::from(io::ErrorKind::BrokenPipe).into());
        }
        Ok(())
    }
    fn close(&mut self) {
        self.log.borrow_mut().push("close".to_string());
    }
}

impl Transport for Device {
    type Channel = Remote;
    type Pairing = Session;

    fn identity_present(&self) -> bool {
        self.identity
    }
    fn ensure_identity(&mut self) -> Result<(), IdentityError> {
        if !self.identity {
            self.log.borrow_mut().push("generate".to_string());
            self.identity = true;
        }
        Ok(())
    }
    fn start_pairing(&mut self, endpoint: &Endpoint) -> Result<Session, PairingError> {
        self.log.borrow_mut().push(format!("pair {endpoint}"));
        Ok(Session {
            log: self.log.clone(),
            replies: self.pin_replies.clone(),
        })
    }
    fn connect(&mut self, endpoint: &Endpoint) -> Result<Remote, ConnectError> {
        self.log.borrow_mut().push(format!("connect {endpoint}"));
        match self.connect_error.take() {
            Some(err) => Err(err),
            None => Ok(Remote {
                log: self.log.clone(),
                broken: self.broken_channel,
            }),
        }
    }
}

fn options(host: Option<&str>, force_repair: bool) -> Options {
    Options {
        host: host.map(str::to_string),
        settings: Settings {
            force_repair,
            ..Default::default()
        },
    }
}

fn fresh_store() -> (tempfile::TempDir, EnvFile) {
    let dir = tempfile::tempdir().unwrap();
    let store = EnvFile::open(dir.path().join(".env")).unwrap();
    (dir, store)
}

fn paired_store(host: &str) -> (tempfile::TempDir, EnvFile) {
    let (dir, mut store) = fresh_store();
    let endpoint: Endpoint = host.parse().unwrap();
    store.set(HOST_KEY, host).unwrap();
    store
        .set(CERT_KEY, CredentialMarker::for_endpoint(&endpoint).as_str())
        .unwrap();
    (dir, store)
}

fn entries(log: &Log) -> Vec<String> {
    log.borrow().clone()
}

#[test]
fn test_fresh_run_pairs_then_sends() {
    let log = Log::default();
    let (_dir, mut store) = fresh_store();
    let mut prompt = Scripted::new(["4D292B"]);
    let result = app::run(
        &options(Some("10.0.0.5"), false),
        &mut store,
        Device::new(&log),
        &mut prompt,
    );

    assert_eq!(app::exit_code(&result), 0);
    assert_eq!(
        entries(&log),
        [
            "generate",
            "pair 10.0.0.5",
            "pin 4D292B",
            "connect 10.0.0.5",
            "key 85",
            "close"
        ]
    );
    let reopened = EnvFile::open(store.path()).unwrap();
    assert_eq!(
        reopened.get(CERT_KEY),
        Some(CredentialMarker::for_endpoint(&"10.0.0.5".parse().unwrap()).as_str().to_string())
    );
    // A host given on the command line is not saved.
    assert_eq!(reopened.get(HOST_KEY), None);
}

#[test]
fn test_invalid_host_flag_fails_before_network() {
    let log = Log::default();
    let (_dir, mut store) = fresh_store();
    let mut prompt = Scripted::new(["10.0.0.5", "4D292B"]);
    let result = app::run(
        &options(Some("not-an-ip"), false),
        &mut store,
        Device::new(&log),
        &mut prompt,
    );

    assert!(matches!(result, Err(Failure::Config(_))));
    assert_eq!(app::exit_code(&result), 1);
    assert!(entries(&log).is_empty());
    assert!(prompt.asked.is_empty());
}

#[test]
fn test_valid_credential_skips_pairing() {
    let log = Log::default();
    let (_dir, mut store) = paired_store("192.168.1.238");
    let mut prompt = Scripted::default();
    let result = app::run(
        &options(None, false),
        &mut store,
        Device::new(&log).with_identity(),
        &mut prompt,
    );

    assert_eq!(app::exit_code(&result), 0);
    assert_eq!(entries(&log), ["connect 192.168.1.238", "key 85", "close"]);
    assert!(prompt.asked.is_empty());
}

#[test]
fn test_forced_repair_always_pairs() {
    let log = Log::default();
    let (_dir, mut store) = paired_store("192.168.1.238");
    let mut prompt = Scripted::new(["abcdef"]);
    let result = app::run(
        &options(None, true),
        &mut store,
        Device::new(&log).with_identity(),
        &mut prompt,
    );

    assert_eq!(app::exit_code(&result), 0);
    assert_eq!(
        entries(&log),
        [
            "pair 192.168.1.238",
            "pin ABCDEF",
            "connect 192.168.1.238",
            "key 85",
            "close"
        ]
    );
}

#[test]
fn test_missing_identity_forces_pairing() {
    let log = Log::default();
    let (_dir, mut store) = paired_store("192.168.1.238");
    let mut prompt = Scripted::new(["4D292B"]);
    let result = app::run(&options(None, false), &mut store, Device::new(&log), &mut prompt);

    assert!(result.is_ok());
    assert_eq!(entries(&log)[..2], ["generate", "pair 192.168.1.238"]);
}

#[test]
fn test_timeout_reports_hint_without_channel() {
    let log = Log::default();
    let (_dir, mut store) = paired_store("192.168.1.238");
    let mut prompt = Scripted::default();
    let result = app::run(
        &options(None, false),
        &mut store,
        Device::new(&log)
            .with_identity()
            .failing_connect(ConnectError::Timeout),
        &mut prompt,
    );

    let failure = result.as_ref().unwrap_err();
    assert!(failure.to_string().to_lowercase().contains("timeout"));
    assert!(failure.hint().contains("powered on"));
    assert_eq!(app::exit_code(&result), 1);
    // No channel was opened, so nothing is closed.
    assert_eq!(entries(&log), ["connect 192.168.1.238"]);
}

#[test]
fn test_rejection_after_wrong_pin_stops_run() {
    let log = Log::default();
    let (_dir, mut store) = fresh_store();
    let mut prompt = Scripted::new(["111111", "222222", "333333"]);
    let device = Device::new(&log)
        .replying(vec![Err(PairingError::InvalidPin), Err(PairingError::Rejected)]);
    let result = app::run(&options(Some("10.0.0.5"), false), &mut store, device, &mut prompt);

    assert!(matches!(result, Err(Failure::PairingRejected)));
    assert_eq!(app::exit_code(&result), 1);
    assert_eq!(
        entries(&log),
        ["generate", "pair 10.0.0.5", "pin 111111", "pin 222222"]
    );
    assert_eq!(prompt.remaining(), 1);
    assert_eq!(store.get(CERT_KEY), None);
}

#[test]
fn test_protocol_error_stops_run() {
    let log = Log::default();
    let (_dir, mut store) = fresh_store();
    let mut prompt = Scripted::new(["111111"]);
    let device = Device::new(&log).replying(vec![Err(PairingError::Protocol(
        "connection closed".to_string(),
    ))]);
    let result = app::run(&options(Some("10.0.0.5"), false), &mut store, device, &mut prompt);

    assert!(matches!(result, Err(Failure::PairingProtocol(_))));
    assert!(!entries(&log).iter().any(|e| e.starts_with("connect")));
}

#[test]
fn test_prompted_host_is_saved_and_reused() {
    let log = Log::default();
    let (_dir, mut store) = fresh_store();
    let mut prompt = Scripted::new(["10.0.0.500", "10.0.0.5", "4D292B"]);
    let result = app::run(&options(None, false), &mut store, Device::new(&log), &mut prompt);
    assert!(result.is_ok());

    let mut store = EnvFile::open(store.path()).unwrap();
    assert_eq!(store.get(HOST_KEY).as_deref(), Some("10.0.0.5"));

    let second = Log::default();
    let mut prompt = Scripted::default();
    let result = app::run(
        &options(None, false),
        &mut store,
        Device::new(&second).with_identity(),
        &mut prompt,
    );
    assert!(result.is_ok());
    assert_eq!(entries(&second), ["connect 10.0.0.5", "key 85", "close"]);
}

#[test]
fn test_failed_send_still_closes_channel() {
    let log = Log::default();
    let (_dir, mut store) = paired_store("192.168.1.238");
    let mut prompt = Scripted::default();
    let result = app::run(
        &options(None, false),
        &mut store,
        Device::new(&log).with_identity().dropping_keys(),
        &mut prompt,
    );

    assert!(matches!(result, Err(Failure::Send(_))));
    assert_eq!(app::exit_code(&result), 1);
    assert_eq!(entries(&log), ["connect 192.168.1.238", "key 85", "close"]);
}
