//! Configuration loading via `ortho-config`.

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::content::ContentType;
use crate::error::StorageError;
use crate::storage::Storage;

/// Default request timeout applied by the HTTP transport.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Cluster API settings derived from environment variables, configuration
/// files, and CLI flags.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "PVE",
    discovery(
        app_name = "pve-content",
        env_var = "PVE_CONTENT_CONFIG_PATH",
        config_file_name = "pve-content.toml",
        dotfile_name = ".pve-content.toml",
        project_file_name = "pve-content.toml"
    )
)]
pub struct ProxmoxConfig {
    /// API base address including the `/api2/json` suffix, for example
    /// `https://pve.example.com:8006/api2/json`.
    pub api_url: String,
    /// API token identifier in `user@realm!token` form.
    pub token_id: String,
    /// Secret associated with the API token.
    pub token_secret: String,
    /// Node addressed by storage operations.
    pub node: String,
    /// Storage pool addressed by storage operations. Defaults to `local`.
    #[ortho_config(default = "local".to_owned())]
    pub storage: String,
    /// Whether to accept self-signed TLS certificates.
    #[ortho_config(default = false)]
    pub accept_invalid_certs: bool,
    /// Per-request timeout in seconds.
    #[ortho_config(default = DEFAULT_REQUEST_TIMEOUT_SECS)]
    pub request_timeout_secs: u64,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }
}

pub(crate) fn require_field(
    value: &str,
    description: &str,
    env_var: &str,
    toml_key: &str,
) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::MissingField(format!(
            "missing {description}: set {env_var} or add {toml_key} to pve-content.toml"
        )));
    }
    Ok(())
}

impl ProxmoxConfig {
    fn require(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        require_field(
            value,
            metadata.description,
            metadata.env_var,
            metadata.toml_key,
        )
    }

    /// Loads configuration without attempting to parse CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("pve-content")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Builds the storage reference named by this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when validation fails.
    pub fn storage(&self) -> Result<Storage, ConfigError> {
        self.validate()?;
        Storage::new(
            self.node.trim(),
            self.storage.trim(),
            std::iter::empty::<ContentType>(),
        )
        .map_err(|err: StorageError| ConfigError::InvalidValue(err.to_string()))
    }

    /// Performs semantic validation on required fields. Error messages name
    /// the environment variable and TOML key that supply each value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty,
    /// or [`ConfigError::InvalidValue`] when a value is malformed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require(
            &self.api_url,
            &FieldMetadata::new("API base URL", "PVE_API_URL", "api_url"),
        )?;
        Self::require(
            &self.token_id,
            &FieldMetadata::new("API token ID", "PVE_TOKEN_ID", "token_id"),
        )?;
        Self::require(
            &self.token_secret,
            &FieldMetadata::new("API token secret", "PVE_TOKEN_SECRET", "token_secret"),
        )?;
        Self::require(&self.node, &FieldMetadata::new("node name", "PVE_NODE", "node"))?;
        Self::require(
            &self.storage,
            &FieldMetadata::new("storage pool", "PVE_STORAGE", "storage"),
        )?;

        let url = self.api_url.trim();
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(ConfigError::InvalidValue(format!(
                "api_url must start with https:// or http://, got '{url}'"
            )));
        }
        if !self.token_id.contains('!') {
            return Err(ConfigError::InvalidValue(String::from(
                "token_id must have the form user@realm!token",
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(String::from(
                "request_timeout_secs must be greater than zero",
            )));
        }
        Ok(())
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a configuration value is present but malformed.
    #[error("invalid configuration value: {0}")]
    InvalidValue(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
    /// Raised when the HTTP transport cannot be constructed.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
