//! Secure copy settings loaded via `ortho-config`.

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use super::util::expand_tilde;
use super::{ScpCredentials, TransferError};

/// Default SSH port on cluster nodes.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// OpenSSH client settings and node credentials.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "PVE_SCP",
    discovery(
        app_name = "pve-content",
        env_var = "PVE_CONTENT_CONFIG_PATH",
        config_file_name = "pve-content.toml",
        dotfile_name = ".pve-content.toml",
        project_file_name = "pve-content.toml"
    )
)]
pub struct ScpConfig {
    /// Path to the `ssh` executable.
    #[ortho_config(default = "ssh".to_owned())]
    pub ssh_bin: String,
    /// Path to the `scp` executable.
    #[ortho_config(default = "scp".to_owned())]
    pub scp_bin: String,
    /// Remote user to connect as.
    #[ortho_config(default = "root".to_owned())]
    pub ssh_user: String,
    /// TCP port of the node's SSH daemon.
    #[ortho_config(default = DEFAULT_SSH_PORT)]
    pub ssh_port: u16,
    /// Private key used for authentication. Supports tilde expansion
    /// (`~/.ssh/id_ed25519`).
    pub ssh_identity_file: String,
    /// Whether to enforce host key checking; nodes commonly present
    /// self-generated keys, so this defaults to disabled.
    #[ortho_config(default = false)]
    pub ssh_strict_host_key_checking: bool,
    /// Known hosts file override; defaults to `/dev/null`.
    #[ortho_config(default = "/dev/null".to_owned())]
    pub ssh_known_hosts_file: String,
}

/// Errors raised when loading the secure copy configuration.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ScpConfigLoadError {
    /// Indicates that parsing or merging configuration layers failed.
    #[error("secure copy configuration parsing failed: {0}")]
    Parse(String),
}

impl ScpConfig {
    /// Ensures configuration values are present after trimming whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::InvalidConfig`] when any required field is
    /// empty or the port is zero.
    pub fn validate(&self) -> Result<(), TransferError> {
        Self::require_value(&self.ssh_bin, "ssh_bin")?;
        Self::require_value(&self.scp_bin, "scp_bin")?;
        Self::require_value(&self.ssh_user, "ssh_user")?;
        Self::require_value(&self.ssh_identity_file, "ssh_identity_file")?;
        if self.ssh_port == 0 {
            return Err(TransferError::InvalidConfig {
                field: String::from("ssh_port"),
            });
        }
        Ok(())
    }

    fn require_value(value: &str, field: &str) -> Result<(), TransferError> {
        if value.trim().is_empty() {
            return Err(TransferError::InvalidConfig {
                field: field.to_owned(),
            });
        }
        Ok(())
    }

    /// Loads configuration from defaults, configuration files, and
    /// environment variables without parsing CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ScpConfigLoadError::Parse`] when merging sources fails.
    pub fn load_without_cli_args() -> Result<Self, ScpConfigLoadError> {
        Self::load_from_iter([std::ffi::OsString::from("pve-content")])
            .map_err(|err| ScpConfigLoadError::Parse(err.to_string()))
    }

    /// Credentials handed to session connectors.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::InvalidConfig`] when validation fails.
    pub fn credentials(&self) -> Result<ScpCredentials, TransferError> {
        self.validate()?;
        Ok(ScpCredentials {
            user: self.ssh_user.trim().to_owned(),
            identity_file: Utf8PathBuf::from(expand_tilde(self.ssh_identity_file.trim())),
            port: self.ssh_port,
        })
    }
}
