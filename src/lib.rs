//! Storage content management for Proxmox VE clusters.
//!
//! The crate uploads, downloads, inspects and deletes ISO images, container
//! templates, backup archives and configuration snippets on a node's storage
//! pool through the cluster API, tracks the server-side tasks those requests
//! start, and offers a secure copy path that writes files straight onto a
//! node when the HTTP upload endpoint is unsuitable.

pub mod api;
pub mod config;
pub mod content;
pub mod error;
pub mod storage;
pub mod task;
pub mod test_support;
pub mod topology;
pub mod transfer;
pub mod volume;

pub use api::{ApiClient, ApiError, HttpApiClient};
pub use config::{ConfigError, ProxmoxConfig};
pub use content::{ContentType, Operation};
pub use error::StorageError;
pub use storage::{SNIPPETS_POOL, Storage, StorageContent};
pub use task::{TaskHandle, TaskStatus, Upid};
pub use topology::{ClusterNode, ClusterTopology};
pub use transfer::{
    OpenSshConnector, ProcessCommandRunner, ScpConfig, ScpCredentials, SecureCopy, TransferError,
};
pub use volume::{Volume, VolumeId};
