//! Secure copy uploads that bypass the HTTP upload endpoint.

use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::info;

use crate::api::ApiClient;
use crate::content::{ContentType, Operation};
use crate::error::StorageError;
use crate::topology::ClusterTopology;
use crate::transfer::{SecureCopy, SessionConnector};

use super::{StorageContent, stat_local_file};

impl<C: ApiClient> StorageContent<C> {
    /// Copies `local_path` onto the node over a secure copy session.
    ///
    /// The destination is the path the API reports for volume `name`, so the
    /// volume must already be known to the server. Snippet uploads register
    /// the snippets pool first when it is missing.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidContentType`],
    /// [`StorageError::NotFound`] or [`StorageError::IsDirectory`] before any
    /// request; [`StorageError::NodeNotFound`] when the node has no address;
    /// [`StorageError::MissingVolumeReference`] when the volume has no path;
    /// or the underlying transport and transfer errors.
    pub async fn scp_upload<K: SessionConnector>(
        &self,
        name: &str,
        category: &str,
        local_path: &Utf8Path,
        copier: &SecureCopy<K>,
    ) -> Result<(), StorageError> {
        let content = ContentType::parse_for(Operation::Transfer, category)?;
        stat_local_file(local_path).await?;

        let address = ClusterTopology::new(Arc::clone(&self.client))
            .resolve_node_address(self.storage.node())
            .await?;

        let volume = match content {
            ContentType::Snippet => {
                self.ensure_snippet_directory().await?;
                self.snippet(name).await?
            }
            other => self.pool_volume(other, name).await?,
        };
        if volume.path.is_empty() {
            return Err(StorageError::MissingVolumeReference);
        }
        let remote = Utf8PathBuf::from(volume.path);

        copier.push(address, local_path, &remote)?;
        info!(node = self.storage.node(), %content, %remote, "secure copy complete");
        Ok(())
    }
}
