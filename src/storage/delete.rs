//! Volume removal.

use tracing::debug;

use crate::api::ApiClient;
use crate::content::Operation;
use crate::error::StorageError;
use crate::task::TaskHandle;
use crate::volume::Volume;

use super::StorageContent;

impl<C: ApiClient> StorageContent<C> {
    /// Deletes `volume` from the pool recorded on it.
    ///
    /// The identifier is derived from the path when the volume lacks one.
    /// Volumes that name no node or pool fall back to this client's storage.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::MissingVolumeReference`] when the volume has
    /// neither identifier nor path, or [`StorageError::Transport`] when the
    /// request fails.
    pub async fn delete(&self, volume: &Volume) -> Result<TaskHandle<C>, StorageError> {
        volume.content.ensure_allowed(Operation::Access)?;
        let volid = volume.delete_target()?;
        let node = non_empty_or(&volume.node, self.storage.node());
        let pool = non_empty_or(&volume.storage, self.storage.name());
        let path = format!("/nodes/{node}/storage/{pool}/content/{volid}");
        debug!(%volid, node, "deleting volume");
        let value = self.client.delete(&path).await?;
        self.task(node, &path, value)
    }
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}
