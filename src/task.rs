//! Handles for server-side asynchronous jobs.
//!
//! Upload, download-by-URL and delete requests return as soon as the server
//! accepts the job. The returned [`TaskHandle`] carries the job token; whether
//! and how long to wait for completion is up to the caller.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;
use serde_json::Value;
use tokio::time::sleep;
use tracing::debug;

use crate::api::{ApiClient, ApiError, decode};
use crate::error::StorageError;

const TASK_STATUS_RUNNING: &str = "running";
const TASK_EXIT_OK: &str = "OK";

/// Opaque job identifier (`UPID:node:pid:...`) returned by the API.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Upid(String);

impl Upid {
    /// Decodes a job token from an API response payload.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Decode`] when the payload is not a non-empty
    /// string.
    pub fn from_response(path: &str, value: Value) -> Result<Self, ApiError> {
        let raw: String = decode(path, value)?;
        if raw.trim().is_empty() {
            return Err(ApiError::Decode {
                path: path.to_owned(),
                message: String::from("empty task identifier"),
            });
        }
        Ok(Self(raw))
    }

    /// Parses a token supplied by a user, such as one printed earlier.
    ///
    /// Returns `None` unless the value starts with `UPID:` and names a node.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let upid = Self(raw.trim().to_owned());
        upid.node().is_some().then_some(upid)
    }

    /// Returns the raw token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Node encoded in the token's second field.
    #[must_use]
    pub fn node(&self) -> Option<&str> {
        let mut fields = self.0.split(':');
        if fields.next() != Some("UPID") {
            return None;
        }
        fields.next().filter(|node| !node.is_empty())
    }
}

impl fmt::Display for Upid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Status snapshot of a server-side task.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct TaskStatus {
    /// `running` while the job is active, `stopped` afterwards.
    pub status: String,
    /// Exit status once stopped; `OK` on success.
    #[serde(default)]
    pub exitstatus: Option<String>,
}

impl TaskStatus {
    /// Returns `true` while the job is still executing.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.status == TASK_STATUS_RUNNING
    }

    /// Returns `true` when the job stopped with exit status `OK`.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        !self.is_running() && self.exitstatus.as_deref() == Some(TASK_EXIT_OK)
    }
}

/// Pending server-side job paired with the client that issued it.
#[derive(Debug)]
pub struct TaskHandle<C> {
    upid: Upid,
    node: String,
    client: Arc<C>,
}

impl<C> Clone for TaskHandle<C> {
    fn clone(&self) -> Self {
        Self {
            upid: self.upid.clone(),
            node: self.node.clone(),
            client: Arc::clone(&self.client),
        }
    }
}

impl<C: ApiClient> TaskHandle<C> {
    /// Wraps a job token issued for `node`.
    #[must_use]
    pub fn new(upid: Upid, node: impl Into<String>, client: Arc<C>) -> Self {
        Self {
            upid,
            node: node.into(),
            client,
        }
    }

    /// Job token.
    #[must_use]
    pub const fn upid(&self) -> &Upid {
        &self.upid
    }

    /// Node the job runs on.
    #[must_use]
    pub fn node(&self) -> &str {
        &self.node
    }

    fn status_path(&self) -> String {
        format!("/nodes/{}/tasks/{}/status", self.node, self.upid)
    }

    /// Fetches the current status with a single request.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Transport`] when the request or decoding fails.
    pub async fn status(&self) -> Result<TaskStatus, StorageError> {
        let path = self.status_path();
        let value = self.client.get(&path).await?;
        Ok(decode(&path, value)?)
    }

    /// Polls until the job stops or `timeout` elapses.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::TaskFailed`] when the job stops with a non-OK
    /// exit status, [`StorageError::TaskTimeout`] when the deadline passes,
    /// or any error from [`TaskHandle::status`].
    pub async fn wait(
        &self,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<TaskStatus, StorageError> {
        // A timeout too large to represent waits without a deadline.
        let deadline = Instant::now().checked_add(timeout);
        loop {
            let status = self.status().await?;
            if !status.is_running() {
                if status.succeeded() {
                    return Ok(status);
                }
                return Err(StorageError::TaskFailed {
                    upid: self.upid.to_string(),
                    exit_status: status
                        .exitstatus
                        .unwrap_or_else(|| String::from("unknown")),
                });
            }
            if deadline.is_some_and(|limit| Instant::now() >= limit) {
                return Err(StorageError::TaskTimeout {
                    upid: self.upid.to_string(),
                });
            }
            debug!(upid = %self.upid, "task still running");
            sleep(poll_interval).await;
        }
    }
}
