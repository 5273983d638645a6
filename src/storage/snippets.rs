//! Provisioning of the dedicated snippets pool.

use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::api::ApiClient;
use crate::error::StorageError;

use super::StorageContent;

/// Pool that holds every snippet, independent of the caller's pool.
pub const SNIPPETS_POOL: &str = "snippets";

/// Directory backing the snippets pool on every node.
pub const SNIPPETS_BASE_PATH: &str = "/var/lib/vz";

const SNIPPETS_STORAGE_PATH: &str = "/storage/snippets";

fn snippets_pool_definition() -> Value {
    json!({
        "storage": "snippet",
        "path": SNIPPETS_BASE_PATH,
        "content": "snippets",
        "shared": "1",
        "type": "dir",
        "disable": "0",
        "prune-backups": "keep-all=1",
    })
}

fn is_empty_payload(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(text) => text.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

impl<C: ApiClient> StorageContent<C> {
    /// Registers the cluster-wide snippets pool unless it already exists.
    ///
    /// Only a "not found" answer or an empty payload counts as absent; any
    /// other lookup failure is returned without attempting creation.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Transport`] when the lookup or the creation
    /// request fails.
    pub async fn ensure_snippet_directory(&self) -> Result<(), StorageError> {
        let present = match self.client.get(SNIPPETS_STORAGE_PATH).await {
            Ok(value) => !is_empty_payload(&value),
            Err(err) if err.is_not_found() => false,
            Err(err) => return Err(err.into()),
        };
        if present {
            debug!("snippets pool already registered");
            return Ok(());
        }

        warn!(path = SNIPPETS_BASE_PATH, "snippets pool missing, creating it");
        self.client
            .post(SNIPPETS_STORAGE_PATH, &snippets_pool_definition())
            .await?;
        Ok(())
    }
}
