//! Secure copy transfers that bypass the HTTP upload endpoint.
//!
//! A transfer opens an authenticated session to a node, copies one local file
//! to a remote path with fixed permission bits, and closes the session. The
//! session moves through `Idle → Connecting → Connected → Transferring` and
//! ends in [`SessionState::ClosedOk`] or [`SessionState::ClosedError`].
//! [`ScopedSession`] guarantees the close happens exactly once on every path
//! out of a transfer once the connect succeeded.

use std::net::IpAddr;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

mod config;
mod openssh;
mod runner;
mod util;

pub use config::{DEFAULT_SSH_PORT, ScpConfig, ScpConfigLoadError};
pub use openssh::{OpenSshConnector, OpenSshSession};
pub use runner::{CommandOutput, CommandRunner, ProcessCommandRunner};
pub use util::expand_tilde;

/// Permission bits applied to every copied file.
pub const REMOTE_FILE_MODE: u32 = 0o655;

/// Errors surfaced while performing a secure copy.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum TransferError {
    /// Raised when configuration is missing required values.
    #[error("missing {field}: set PVE_SCP_{env_suffix} or add {field} to pve-content.toml", env_suffix = field.to_uppercase())]
    InvalidConfig {
        /// Configuration field that failed validation.
        field: String,
    },
    /// Raised when a command cannot be spawned.
    #[error("failed to spawn {program}: {message}")]
    Spawn {
        /// Command that failed to start.
        program: String,
        /// Operating system error string.
        message: String,
    },
    /// Raised when a command completes with a non-zero exit code.
    #[error("{program} exited with status {status_text}: {stderr}")]
    CommandFailure {
        /// Command name used for the attempted operation.
        program: String,
        /// Exit status as reported by the OS.
        status: Option<i32>,
        /// Human readable representation of the exit status.
        status_text: String,
        /// Stderr captured from the process.
        stderr: String,
    },
    /// Raised when a session is used after it was closed.
    #[error("session to {address} is already closed")]
    SessionClosed {
        /// Address of the node the session pointed at.
        address: IpAddr,
    },
}

/// Credentials for node sessions, owned by the configuration layer.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ScpCredentials {
    /// Remote user name.
    pub user: String,
    /// Private key file.
    pub identity_file: Utf8PathBuf,
    /// SSH port.
    pub port: u16,
}

/// Lifecycle of a transfer session.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SessionState {
    /// No connection attempted yet.
    Idle,
    /// Connection in progress.
    Connecting,
    /// Authenticated and ready to copy.
    Connected,
    /// Copy in progress.
    Transferring,
    /// Closed after a successful copy.
    ClosedOk,
    /// Closed after a failed copy or without completing one.
    ClosedError,
}

impl SessionState {
    /// Returns `true` for both terminal states.
    #[must_use]
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::ClosedOk | Self::ClosedError)
    }
}

/// Opens authenticated sessions to cluster nodes.
pub trait SessionConnector {
    /// Session type produced by a successful connect.
    type Session: TransferSession;

    /// Connects to `address` with `credentials`.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError`] when the connection cannot be established.
    fn connect(
        &self,
        address: IpAddr,
        credentials: &ScpCredentials,
    ) -> Result<Self::Session, TransferError>;
}

/// An open session able to copy files.
pub trait TransferSession {
    /// Copies `local` to `remote` and applies `mode`.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError`] when the copy or permission change fails.
    fn copy_file(
        &mut self,
        local: &Utf8Path,
        remote: &Utf8Path,
        mode: u32,
    ) -> Result<(), TransferError>;

    /// Tears the session down.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError`] when teardown fails.
    fn close(&mut self) -> Result<(), TransferError>;
}

/// Session wrapper that closes exactly once, explicitly or on drop.
#[derive(Debug)]
pub struct ScopedSession<S: TransferSession> {
    session: S,
    state: SessionState,
    copy_failed: bool,
}

impl<S: TransferSession> ScopedSession<S> {
    /// Takes ownership of a freshly connected session.
    pub const fn new(session: S) -> Self {
        Self {
            session,
            state: SessionState::Connected,
            copy_failed: false,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Copies one file through the session.
    ///
    /// # Errors
    ///
    /// Propagates copy failures from the underlying session.
    pub fn copy(
        &mut self,
        local: &Utf8Path,
        remote: &Utf8Path,
        mode: u32,
    ) -> Result<(), TransferError> {
        self.state = SessionState::Transferring;
        let result = self.session.copy_file(local, remote, mode);
        self.state = SessionState::Connected;
        self.copy_failed = result.is_err();
        result
    }

    /// Closes the session and reports the teardown result.
    ///
    /// # Errors
    ///
    /// Propagates teardown failures from the underlying session.
    pub fn close(mut self) -> Result<(), TransferError> {
        self.finish()
    }

    fn finish(&mut self) -> Result<(), TransferError> {
        if self.state.is_closed() {
            return Ok(());
        }
        let result = self.session.close();
        self.state = if result.is_ok() && !self.copy_failed {
            SessionState::ClosedOk
        } else {
            SessionState::ClosedError
        };
        debug!(state = ?self.state, "session closed");
        result
    }
}

impl<S: TransferSession> Drop for ScopedSession<S> {
    fn drop(&mut self) {
        if self.state.is_closed() {
            return;
        }
        if let Err(err) = self.finish() {
            warn!(error = %err, "failed to close session during unwind");
        }
    }
}

/// Single-shot file transfer over a [`SessionConnector`].
#[derive(Clone, Debug)]
pub struct SecureCopy<K> {
    connector: K,
    credentials: ScpCredentials,
}

impl<K: SessionConnector> SecureCopy<K> {
    /// Creates a transfer helper with shared credentials.
    pub const fn new(connector: K, credentials: ScpCredentials) -> Self {
        Self {
            connector,
            credentials,
        }
    }

    /// Returns the connector.
    #[must_use]
    pub const fn connector(&self) -> &K {
        &self.connector
    }

    /// Copies `local` to `remote` on the node at `address`.
    ///
    /// The session is acquired immediately before the copy and closed before
    /// returning. A copy failure takes precedence over a close failure.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError`] when connecting, copying or closing fails.
    pub fn push(
        &self,
        address: IpAddr,
        local: &Utf8Path,
        remote: &Utf8Path,
    ) -> Result<(), TransferError> {
        debug!(state = ?SessionState::Idle, %address);
        debug!(state = ?SessionState::Connecting, %address, port = self.credentials.port);
        let session = self.connector.connect(address, &self.credentials)?;
        let mut scoped = ScopedSession::new(session);
        let copied = scoped.copy(local, remote, REMOTE_FILE_MODE);
        let closed = scoped.close();
        copied?;
        closed?;
        info!(%address, %local, %remote, "copied file to node");
        Ok(())
    }
}
