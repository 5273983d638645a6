//! Cluster API client seam.
//!
//! Storage operations talk to the cluster exclusively through [`ApiClient`].
//! Implementations return the decoded `data` payload of each response, so the
//! callers only deal with typed decoding of the inner JSON value.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use camino::Utf8PathBuf;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

mod http;

pub use http::HttpApiClient;

/// Future returned by API client operations.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ApiError>> + Send + 'a>>;

/// Errors raised by API clients. Every variant names the failing request.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ApiError {
    /// Raised when the request cannot be sent or the body cannot be read.
    #[error("{method} {path} failed: {message}")]
    Transport {
        /// HTTP method of the failed request.
        method: &'static str,
        /// API path of the failed request.
        path: String,
        /// Underlying error message.
        message: String,
    },
    /// Raised when the server answers with a non-success status.
    #[error("{method} {path} returned status {status}: {message}")]
    Status {
        /// HTTP method of the failed request.
        method: &'static str,
        /// API path of the failed request.
        path: String,
        /// HTTP status code.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },
    /// Raised when a response body does not match the expected shape.
    #[error("failed to decode response from {path}: {message}")]
    Decode {
        /// API path of the request.
        path: String,
        /// Decoder error message.
        message: String,
    },
}

impl ApiError {
    /// Returns `true` when the server reported that the addressed object does
    /// not exist.
    ///
    /// The cluster API answers lookups of unknown objects with either `404`
    /// or a `500` whose message says "does not exist".
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Status { status: 404, .. } => true,
            Self::Status { message, .. } => message.contains("does not exist"),
            Self::Transport { .. } | Self::Decode { .. } => false,
        }
    }
}

/// Local file streamed by [`ApiClient::upload`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UploadFile {
    /// Path of the file on the local machine.
    pub path: Utf8PathBuf,
    /// File name announced to the server.
    pub file_name: String,
    /// Size in bytes, taken from the stat check preceding the upload.
    pub size: u64,
}

/// Minimal interface over the cluster's JSON API.
pub trait ApiClient: Send + Sync {
    /// Base address requests are resolved against, without a trailing slash.
    fn base_url(&self) -> &str;

    /// Issues a `GET` request.
    fn get<'a>(&'a self, path: &'a str) -> ApiFuture<'a, Value>;

    /// Issues a `POST` request with a JSON body.
    fn post<'a>(&'a self, path: &'a str, body: &'a Value) -> ApiFuture<'a, Value>;

    /// Issues a `DELETE` request.
    fn delete<'a>(&'a self, path: &'a str) -> ApiFuture<'a, Value>;

    /// Streams `file` as a multipart upload alongside the given form fields.
    fn upload<'a>(
        &'a self,
        path: &'a str,
        fields: &'a [(&'a str, &'a str)],
        file: &'a UploadFile,
    ) -> ApiFuture<'a, Value>;
}

impl<C: ApiClient + ?Sized> ApiClient for Arc<C> {
    fn base_url(&self) -> &str {
        (**self).base_url()
    }

    fn get<'a>(&'a self, path: &'a str) -> ApiFuture<'a, Value> {
        (**self).get(path)
    }

    fn post<'a>(&'a self, path: &'a str, body: &'a Value) -> ApiFuture<'a, Value> {
        (**self).post(path, body)
    }

    fn delete<'a>(&'a self, path: &'a str) -> ApiFuture<'a, Value> {
        (**self).delete(path)
    }

    fn upload<'a>(
        &'a self,
        path: &'a str,
        fields: &'a [(&'a str, &'a str)],
        file: &'a UploadFile,
    ) -> ApiFuture<'a, Value> {
        (**self).upload(path, fields, file)
    }
}

/// Decodes a response payload into `T`, attributing failures to `path`.
///
/// # Errors
///
/// Returns [`ApiError::Decode`] when the value does not match `T`.
pub fn decode<T: DeserializeOwned>(path: &str, value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|err| ApiError::Decode {
        path: path.to_owned(),
        message: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn status(code: u16, message: &str) -> ApiError {
        ApiError::Status {
            method: "GET",
            path: String::from("/storage/snippets"),
            status: code,
            message: message.to_owned(),
        }
    }

    #[test]
    fn not_found_recognises_404_and_missing_messages() {
        assert!(status(404, "Not Found").is_not_found());
        assert!(status(500, "storage 'snippets' does not exist").is_not_found());
        assert!(!status(500, "internal error").is_not_found());
        assert!(
            !ApiError::Transport {
                method: "GET",
                path: String::from("/x"),
                message: String::from("connection refused"),
            }
            .is_not_found()
        );
    }

    #[test]
    fn decode_reports_path() {
        let err = decode::<u64>("/cluster/status", json!("nope")).expect_err("mismatch");
        let ApiError::Decode { path, .. } = err else {
            panic!("expected decode error");
        };
        assert_eq!(path, "/cluster/status");
    }
}
