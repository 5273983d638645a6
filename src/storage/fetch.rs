//! Volume metadata lookups.

use crate::api::{ApiClient, decode};
use crate::content::{ContentType, Operation};
use crate::error::StorageError;
use crate::volume::{Volume, VolumeId, VolumeInfo};

use super::{SNIPPETS_POOL, StorageContent};

impl<C: ApiClient> StorageContent<C> {
    /// Fetches an installation image by name.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Transport`] when the lookup fails.
    pub async fn iso(&self, name: &str) -> Result<Volume, StorageError> {
        self.pool_volume(ContentType::Iso, name).await
    }

    /// Fetches a container template by name.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Transport`] when the lookup fails.
    pub async fn vztmpl(&self, name: &str) -> Result<Volume, StorageError> {
        self.pool_volume(ContentType::Vztmpl, name).await
    }

    /// Fetches a backup archive by name.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Transport`] when the lookup fails.
    pub async fn backup(&self, name: &str) -> Result<Volume, StorageError> {
        self.pool_volume(ContentType::Backup, name).await
    }

    /// Fetches a snippet from the dedicated snippets pool.
    ///
    /// The identifier is always `snippets:snippets/{name}` and the returned
    /// volume carries a fully qualified retrieval URL.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Transport`] when the lookup fails.
    pub async fn snippet(&self, name: &str) -> Result<Volume, StorageError> {
        let volid = VolumeId::new(SNIPPETS_POOL, ContentType::Snippet, name).to_string();
        let path = format!(
            "/nodes/{}/storage/{SNIPPETS_POOL}/content/{volid}",
            self.storage.node()
        );
        let value = self.client.get(&path).await?;
        let info: VolumeInfo = decode(&path, value)?;
        let mut volume =
            info.into_volume(ContentType::Snippet, self.storage.node(), SNIPPETS_POOL);
        volume.url = Some(format!("{}{path}", self.client.base_url()));
        volume.volid = volid;
        Ok(volume)
    }

    /// Fetches a volume of any accessible category.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidContentType`] for unknown categories or
    /// any error from the per-category lookup.
    pub async fn fetch(&self, category: &str, name: &str) -> Result<Volume, StorageError> {
        match ContentType::parse_for(Operation::Access, category)? {
            ContentType::Snippet => self.snippet(name).await,
            content => self.pool_volume(content, name).await,
        }
    }

    pub(super) async fn pool_volume(
        &self,
        content: ContentType,
        name: &str,
    ) -> Result<Volume, StorageError> {
        let pool = self.storage.name();
        let path = self
            .storage
            .pool_path(&format!("content/{pool}:{}/{name}", content.as_str()));
        let value = self.client.get(&path).await?;
        let info: VolumeInfo = decode(&path, value)?;
        let mut volume = info.into_volume(content, self.storage.node(), pool);
        volume.ensure_volid(name);
        Ok(volume)
    }
}
