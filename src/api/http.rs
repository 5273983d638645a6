//! reqwest-backed implementation of [`ApiClient`] using API token auth.

use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, RequestBuilder};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{ApiClient, ApiError, ApiFuture, UploadFile};
use crate::config::{ConfigError, ProxmoxConfig};

/// Response envelope wrapping every API payload.
#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    data: Value,
}

/// API client that talks to the cluster over HTTPS.
#[derive(Clone, Debug)]
pub struct HttpApiClient {
    http: reqwest::Client,
    base_url: String,
    auth_header: String,
}

impl HttpApiClient {
    /// Builds a client from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when validation fails or the HTTP client
    /// cannot be constructed.
    pub fn new(config: &ProxmoxConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|err| ConfigError::HttpClient(err.to_string()))?;
        Ok(Self {
            http,
            base_url: config.api_url.trim().trim_end_matches('/').to_owned(),
            auth_header: format!(
                "PVEAPIToken={}={}",
                config.token_id.trim(),
                config.token_secret.trim()
            ),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn execute(
        &self,
        method: &'static str,
        path: &str,
        request: RequestBuilder,
    ) -> Result<Value, ApiError> {
        debug!(method, path, "sending API request");
        let transport = |err: reqwest::Error| ApiError::Transport {
            method,
            path: path.to_owned(),
            message: err.to_string(),
        };

        let response = request
            .header(AUTHORIZATION, &self.auth_header)
            .send()
            .await
            .map_err(transport)?;
        let status = response.status();
        let body = response.bytes().await.map_err(transport)?;

        if !status.is_success() {
            let text = String::from_utf8_lossy(&body).trim().to_owned();
            let message = if text.is_empty() {
                status.canonical_reason().unwrap_or("unknown").to_owned()
            } else {
                text
            };
            return Err(ApiError::Status {
                method,
                path: path.to_owned(),
                status: status.as_u16(),
                message,
            });
        }

        if body.is_empty() {
            return Ok(Value::Null);
        }
        let envelope: Envelope =
            serde_json::from_slice(&body).map_err(|err| ApiError::Decode {
                path: path.to_owned(),
                message: err.to_string(),
            })?;
        Ok(envelope.data)
    }
}

impl ApiClient for HttpApiClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get<'a>(&'a self, path: &'a str) -> ApiFuture<'a, Value> {
        Box::pin(async move {
            let request = self.http.get(self.url(path));
            self.execute("GET", path, request).await
        })
    }

    fn post<'a>(&'a self, path: &'a str, body: &'a Value) -> ApiFuture<'a, Value> {
        Box::pin(async move {
            let request = self.http.post(self.url(path)).json(body);
            self.execute("POST", path, request).await
        })
    }

    fn delete<'a>(&'a self, path: &'a str) -> ApiFuture<'a, Value> {
        Box::pin(async move {
            let request = self.http.delete(self.url(path));
            self.execute("DELETE", path, request).await
        })
    }

    fn upload<'a>(
        &'a self,
        path: &'a str,
        fields: &'a [(&'a str, &'a str)],
        file: &'a UploadFile,
    ) -> ApiFuture<'a, Value> {
        Box::pin(async move {
            let handle = tokio::fs::File::open(&file.path)
                .await
                .map_err(|err| ApiError::Transport {
                    method: "POST",
                    path: path.to_owned(),
                    message: format!("failed to open {}: {err}", file.path),
                })?;

            let mut form = Form::new();
            for (name, value) in fields {
                form = form.text((*name).to_owned(), (*value).to_owned());
            }
            let part = Part::stream_with_length(Body::from(handle), file.size)
                .file_name(file.file_name.clone());
            form = form.part("filename", part);

            let request = self.http.post(self.url(path)).multipart(form);
            self.execute("POST", path, request).await
        })
    }
}
