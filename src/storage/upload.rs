//! HTTP upload and download-by-URL jobs.

use camino::Utf8Path;
use serde_json::json;
use tracing::debug;

use crate::api::{ApiClient, UploadFile};
use crate::content::{ContentType, Operation};
use crate::error::StorageError;
use crate::task::TaskHandle;
use crate::volume::basename;

use super::{StorageContent, stat_local_file};

impl<C: ApiClient> StorageContent<C> {
    /// Streams `local_path` into the pool as a multipart upload.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidContentType`] for categories that cannot
    /// be uploaded, [`StorageError::NotFound`] or
    /// [`StorageError::IsDirectory`] when the local file check fails, or
    /// [`StorageError::Transport`] when the request fails.
    pub async fn upload(
        &self,
        category: &str,
        local_path: &Utf8Path,
    ) -> Result<TaskHandle<C>, StorageError> {
        let content = ContentType::parse_for(Operation::Transfer, category)?;
        let size = stat_local_file(local_path).await?;
        let file = UploadFile {
            path: local_path.to_owned(),
            file_name: basename(local_path.as_str()).to_owned(),
            size,
        };
        let path = self.storage.pool_path("upload");
        debug!(%content, local = %local_path, size, "uploading file");
        let fields = [("content", content.as_str())];
        let value = self.client.upload(&path, &fields, &file).await?;
        self.task(self.storage.node(), &path, value)
    }

    /// Asks the node to fetch `url` into the pool as `filename`.
    ///
    /// Returns once the server accepts the job; the download itself runs
    /// server-side.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidContentType`] for categories that cannot
    /// be downloaded, or [`StorageError::Transport`] when the request fails.
    pub async fn download_url(
        &self,
        category: &str,
        filename: &str,
        url: &str,
    ) -> Result<TaskHandle<C>, StorageError> {
        let content = ContentType::parse_for(Operation::Transfer, category)?;
        let path = self.storage.pool_path("download-url");
        let body = json!({
            "content": content.as_str(),
            "filename": filename,
            "url": url,
        });
        debug!(%content, filename, url, "requesting download");
        let value = self.client.post(&path, &body).await?;
        self.task(self.storage.node(), &path, value)
    }
}
