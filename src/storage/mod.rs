//! Storage content operations against a single node's storage pool.
//!
//! [`StorageContent`] pairs a [`Storage`] reference with a shared API client
//! and implements the create, read and delete lifecycle for volumes. Every
//! operation checks the content category and any local file before the first
//! request is issued.

use std::collections::BTreeSet;
use std::sync::Arc;

use camino::Utf8Path;
use serde_json::Value;
use tracing::info;

use crate::api::ApiClient;
use crate::content::ContentType;
use crate::error::StorageError;
use crate::task::{TaskHandle, Upid};

mod delete;
mod fetch;
mod scp;
mod snippets;
mod upload;

pub use snippets::{SNIPPETS_BASE_PATH, SNIPPETS_POOL};

/// Reference to a storage pool on one node.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Storage {
    node: String,
    name: String,
    content: BTreeSet<ContentType>,
}

impl Storage {
    /// Creates a reference to pool `name` on `node`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidStorage`] when the node or pool name is
    /// blank.
    pub fn new(
        node: impl Into<String>,
        name: impl Into<String>,
        content: impl IntoIterator<Item = ContentType>,
    ) -> Result<Self, StorageError> {
        let node = node.into();
        let name = name.into();
        if node.trim().is_empty() {
            return Err(StorageError::InvalidStorage(String::from("node name")));
        }
        if name.trim().is_empty() {
            return Err(StorageError::InvalidStorage(String::from("pool name")));
        }
        Ok(Self {
            node,
            name,
            content: content.into_iter().collect(),
        })
    }

    /// Node owning the pool.
    #[must_use]
    pub fn node(&self) -> &str {
        &self.node
    }

    /// Pool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Content categories enabled on the pool, as far as the caller knows.
    #[must_use]
    pub const fn content(&self) -> &BTreeSet<ContentType> {
        &self.content
    }

    fn pool_path(&self, suffix: &str) -> String {
        format!("/nodes/{}/storage/{}/{suffix}", self.node, self.name)
    }
}

/// Volume lifecycle client for one storage pool.
#[derive(Debug)]
pub struct StorageContent<C> {
    storage: Storage,
    client: Arc<C>,
}

impl<C> Clone for StorageContent<C> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            client: Arc::clone(&self.client),
        }
    }
}

impl<C: ApiClient> StorageContent<C> {
    /// Creates a client for `storage` backed by `client`.
    #[must_use]
    pub const fn new(storage: Storage, client: Arc<C>) -> Self {
        Self { storage, client }
    }

    /// Storage reference this client operates on.
    #[must_use]
    pub const fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Shared API client.
    #[must_use]
    pub const fn client(&self) -> &Arc<C> {
        &self.client
    }

    fn task(&self, node: &str, path: &str, value: Value) -> Result<TaskHandle<C>, StorageError> {
        let upid = Upid::from_response(path, value)?;
        info!(%upid, node, "task accepted");
        Ok(TaskHandle::new(upid, node, Arc::clone(&self.client)))
    }
}

/// Stats `path` and returns its size in bytes.
///
/// Local preconditions are checked here so a missing file or a directory is
/// reported before any request is sent.
async fn stat_local_file(path: &Utf8Path) -> Result<u64, StorageError> {
    let metadata = tokio::fs::metadata(path).await.map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            StorageError::NotFound {
                path: path.to_owned(),
            }
        } else {
            StorageError::Io {
                path: path.to_owned(),
                message: err.to_string(),
            }
        }
    })?;
    if metadata.is_dir() {
        return Err(StorageError::IsDirectory {
            path: path.to_owned(),
        });
    }
    Ok(metadata.len())
}
