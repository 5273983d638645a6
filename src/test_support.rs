//! Test support utilities shared across unit and integration tests.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::env;
use std::ffi::OsString;
use std::net::IpAddr;
use std::rc::Rc;
use std::sync::{Arc, Mutex, PoisonError};

use camino::{Utf8Path, Utf8PathBuf};
use serde_json::Value;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};

use crate::api::{ApiClient, ApiError, ApiFuture, UploadFile};
use crate::transfer::{
    CommandOutput, CommandRunner, ScpCredentials, SessionConnector, TransferError,
    TransferSession,
};

/// Base URL reported by [`StubApiClient::new`].
pub const STUB_BASE_URL: &str = "https://pve.test:8006/api2/json";

/// One request observed by [`StubApiClient`].
#[derive(Clone, Debug, PartialEq)]
pub struct ApiCall {
    /// HTTP method.
    pub method: &'static str,
    /// Request path.
    pub path: String,
    /// JSON body for `POST` requests.
    pub body: Option<Value>,
    /// Form fields for uploads.
    pub fields: Vec<(String, String)>,
    /// File streamed by uploads.
    pub file: Option<UploadFile>,
}

type Reply = Result<Value, ApiError>;

#[derive(Debug, Default)]
struct StubState {
    queued: HashMap<(String, String), VecDeque<Reply>>,
    sticky: HashMap<(String, String), Reply>,
    calls: Vec<ApiCall>,
}

/// In-memory [`ApiClient`] returning scripted replies and recording calls.
///
/// Replies queued with [`StubApiClient::respond`] are consumed in FIFO order
/// per method and path; [`StubApiClient::respond_always`] supplies a reply
/// once the queue is empty. Unscripted requests fail with a `404` status.
#[derive(Clone, Debug)]
pub struct StubApiClient {
    base_url: String,
    state: Arc<Mutex<StubState>>,
}

impl Default for StubApiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl StubApiClient {
    /// Creates a stub reporting [`STUB_BASE_URL`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            base_url: STUB_BASE_URL.to_owned(),
            state: Arc::new(Mutex::new(StubState::default())),
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut StubState) -> T) -> T {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    fn key(method: &str, path: &str) -> (String, String) {
        (method.to_owned(), path.to_owned())
    }

    /// Queues a successful reply.
    pub fn respond(&self, method: &str, path: &str, data: Value) {
        self.queue(method, path, Ok(data));
    }

    /// Queues a failing reply.
    pub fn fail(&self, method: &str, path: &str, error: ApiError) {
        self.queue(method, path, Err(error));
    }

    /// Queues a `500 ... does not exist` reply, as the API returns for
    /// unknown objects.
    pub fn missing(&self, method: &'static str, path: &str) {
        self.fail(
            method,
            path,
            ApiError::Status {
                method,
                path: path.to_owned(),
                status: 500,
                message: format!("{path} does not exist"),
            },
        );
    }

    /// Sets the reply used whenever the queue for this request is empty.
    pub fn respond_always(&self, method: &str, path: &str, data: Value) {
        self.with_state(|state| {
            state.sticky.insert(Self::key(method, path), Ok(data));
        });
    }

    fn queue(&self, method: &str, path: &str, reply: Reply) {
        self.with_state(|state| {
            state
                .queued
                .entry(Self::key(method, path))
                .or_default()
                .push_back(reply);
        });
    }

    /// Returns a snapshot of all recorded calls.
    #[must_use]
    pub fn calls(&self) -> Vec<ApiCall> {
        self.with_state(|state| state.calls.clone())
    }

    /// Returns the recorded calls matching `method` and `path`.
    #[must_use]
    pub fn calls_to(&self, method: &str, path: &str) -> Vec<ApiCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.method == method && call.path == path)
            .collect()
    }

    fn record(&self, call: ApiCall) -> Reply {
        self.with_state(|state| {
            let key = Self::key(call.method, &call.path);
            let method = call.method;
            let path = call.path.clone();
            state.calls.push(call);
            if let Some(reply) = state.queued.get_mut(&key).and_then(VecDeque::pop_front) {
                return reply;
            }
            state.sticky.get(&key).cloned().unwrap_or_else(|| {
                Err(ApiError::Status {
                    method,
                    path,
                    status: 404,
                    message: String::from("no scripted response available"),
                })
            })
        })
    }

    fn reply<'a>(&self, call: ApiCall) -> ApiFuture<'a, Value> {
        let reply = self.record(call);
        Box::pin(std::future::ready(reply))
    }
}

impl ApiClient for StubApiClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get<'a>(&'a self, path: &'a str) -> ApiFuture<'a, Value> {
        self.reply(ApiCall {
            method: "GET",
            path: path.to_owned(),
            body: None,
            fields: Vec::new(),
            file: None,
        })
    }

    fn post<'a>(&'a self, path: &'a str, body: &'a Value) -> ApiFuture<'a, Value> {
        self.reply(ApiCall {
            method: "POST",
            path: path.to_owned(),
            body: Some(body.clone()),
            fields: Vec::new(),
            file: None,
        })
    }

    fn delete<'a>(&'a self, path: &'a str) -> ApiFuture<'a, Value> {
        self.reply(ApiCall {
            method: "DELETE",
            path: path.to_owned(),
            body: None,
            fields: Vec::new(),
            file: None,
        })
    }

    fn upload<'a>(
        &'a self,
        path: &'a str,
        fields: &'a [(&'a str, &'a str)],
        file: &'a UploadFile,
    ) -> ApiFuture<'a, Value> {
        self.reply(ApiCall {
            method: "POST",
            path: path.to_owned(),
            body: None,
            fields: fields
                .iter()
                .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
                .collect(),
            file: Some(file.clone()),
        })
    }
}

/// Scripted command runner that returns pre-seeded outputs in FIFO order.
///
/// Used to drive deterministic command outcomes without spawning processes.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRunner {
    responses: Rc<RefCell<VecDeque<CommandOutput>>>,
    invocations: Rc<RefCell<Vec<CommandInvocation>>>,
}

/// Records a single invocation made through [`ScriptedRunner`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandInvocation {
    /// Program name as passed to the runner.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<OsString>,
}

impl CommandInvocation {
    /// Returns a shell-like command string for assertions.
    #[must_use]
    pub fn command_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(
            self.args
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned()),
        );
        parts.join(" ")
    }
}

impl ScriptedRunner {
    /// Creates a new runner with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all invocations recorded so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandInvocation> {
        self.invocations.borrow().clone()
    }

    /// Pushes a successful exit status.
    pub fn push_success(&self) {
        self.push_output(Some(0), "", "");
    }

    /// Pushes a failing exit code with stderr text.
    pub fn push_failure(&self, code: i32) {
        self.push_output(Some(code), "", "simulated failure");
    }

    /// Pushes an explicit command output response.
    pub fn push_output(
        &self,
        code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) {
        self.responses.borrow_mut().push_back(CommandOutput {
            code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        });
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, TransferError> {
        self.invocations.borrow_mut().push(CommandInvocation {
            program: program.to_owned(),
            args: args.to_vec(),
        });
        self.responses
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| TransferError::Spawn {
                program: program.to_owned(),
                message: String::from("no scripted response available"),
            })
    }
}

/// Counters shared between a [`CountingConnector`] and its sessions.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SessionLedger {
    /// Successful connects.
    pub connects: usize,
    /// Calls to [`TransferSession::close`].
    pub closes: usize,
    /// Copies attempted as `(local, remote, mode)`.
    pub copies: Vec<(Utf8PathBuf, Utf8PathBuf, u32)>,
    /// Addresses connected to.
    pub addresses: Vec<IpAddr>,
}

/// Fake connector counting connects, copies and closes.
#[derive(Clone, Debug, Default)]
pub struct CountingConnector {
    ledger: Arc<Mutex<SessionLedger>>,
    fail_connect: bool,
    fail_copy: bool,
    fail_close: bool,
}

impl CountingConnector {
    /// Creates a connector whose sessions always succeed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every connect attempt fail.
    #[must_use]
    pub const fn failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    /// Makes every copy fail.
    #[must_use]
    pub const fn failing_copy(mut self) -> Self {
        self.fail_copy = true;
        self
    }

    /// Makes every close fail.
    #[must_use]
    pub const fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// Returns a snapshot of the counters.
    #[must_use]
    pub fn ledger(&self) -> SessionLedger {
        self.ledger
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn failure(step: &str) -> TransferError {
        TransferError::CommandFailure {
            program: String::from("fake"),
            status: Some(1),
            status_text: String::from("1"),
            stderr: format!("simulated {step} failure"),
        }
    }
}

/// Session produced by [`CountingConnector`].
#[derive(Debug)]
pub struct CountingSession {
    ledger: Arc<Mutex<SessionLedger>>,
    fail_copy: bool,
    fail_close: bool,
}

impl SessionConnector for CountingConnector {
    type Session = CountingSession;

    fn connect(
        &self,
        address: IpAddr,
        _credentials: &ScpCredentials,
    ) -> Result<Self::Session, TransferError> {
        if self.fail_connect {
            return Err(Self::failure("connect"));
        }
        {
            let mut ledger = self.ledger.lock().unwrap_or_else(PoisonError::into_inner);
            ledger.connects += 1;
            ledger.addresses.push(address);
        }
        Ok(CountingSession {
            ledger: Arc::clone(&self.ledger),
            fail_copy: self.fail_copy,
            fail_close: self.fail_close,
        })
    }
}

impl TransferSession for CountingSession {
    fn copy_file(
        &mut self,
        local: &Utf8Path,
        remote: &Utf8Path,
        mode: u32,
    ) -> Result<(), TransferError> {
        self.ledger
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .copies
            .push((local.to_owned(), remote.to_owned(), mode));
        if self.fail_copy {
            return Err(CountingConnector::failure("copy"));
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransferError> {
        self.ledger
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .closes += 1;
        if self.fail_close {
            return Err(CountingConnector::failure("close"));
        }
        Ok(())
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets multiple environment variables while holding a global mutex.
    pub async fn set_vars(pairs: &[(&str, &str)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::set_var(key, value) };
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
