//! OpenSSH-backed sessions multiplexed over a control socket.
//!
//! Connecting starts a background master connection (`ssh -M -f -N`); copies
//! and the permission change reuse it through `ControlPath`, and closing sends
//! `-O exit` to the master.

use std::ffi::OsString;
use std::net::IpAddr;

use camino::{Utf8Path, Utf8PathBuf};
use shell_escape::unix::escape;
use tracing::debug;
use uuid::Uuid;

use super::util::{expand_tilde, scp_host};
use super::{
    CommandRunner, ScpConfig, ScpCredentials, SessionConnector, TransferError, TransferSession,
};

/// Connector that drives the system `ssh` and `scp` binaries.
#[derive(Clone, Debug)]
pub struct OpenSshConnector<R: CommandRunner + Clone> {
    config: ScpConfig,
    runner: R,
}

impl<R: CommandRunner + Clone> OpenSshConnector<R> {
    /// Creates a connector using the provided runner and configuration.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::InvalidConfig`] when configuration validation
    /// fails.
    pub fn new(config: ScpConfig, runner: R) -> Result<Self, TransferError> {
        config.validate()?;
        Ok(Self { config, runner })
    }

    /// Returns the runner, mainly for inspecting scripted runs.
    #[must_use]
    pub const fn runner(&self) -> &R {
        &self.runner
    }

    fn control_path() -> Result<Utf8PathBuf, TransferError> {
        let dir = Utf8PathBuf::from_path_buf(std::env::temp_dir()).map_err(|path| {
            TransferError::Spawn {
                program: String::from("ssh"),
                message: format!("temporary directory is not UTF-8: {}", path.display()),
            }
        })?;
        Ok(dir.join(format!("pve-content-{}.sock", Uuid::new_v4().simple())))
    }
}

impl<R: CommandRunner + Clone> SessionConnector for OpenSshConnector<R> {
    type Session = OpenSshSession<R>;

    fn connect(
        &self,
        address: IpAddr,
        credentials: &ScpCredentials,
    ) -> Result<Self::Session, TransferError> {
        let session = OpenSshSession {
            config: self.config.clone(),
            runner: self.runner.clone(),
            credentials: credentials.clone(),
            address,
            control_path: Self::control_path()?,
            open: false,
        };

        let mut args = session.ssh_options();
        args.extend([
            OsString::from("-o"),
            OsString::from("ControlMaster=yes"),
            OsString::from("-o"),
            OsString::from("ControlPersist=yes"),
            OsString::from("-f"),
            OsString::from("-N"),
            OsString::from(session.destination()),
        ]);
        debug!(%address, control_path = %session.control_path, "opening master connection");
        self.runner
            .run_detached(&self.config.ssh_bin, &args)?
            .into_result(&self.config.ssh_bin)?;

        Ok(OpenSshSession {
            open: true,
            ..session
        })
    }
}

/// Master connection held open through a control socket.
#[derive(Debug)]
pub struct OpenSshSession<R: CommandRunner> {
    config: ScpConfig,
    runner: R,
    credentials: ScpCredentials,
    address: IpAddr,
    control_path: Utf8PathBuf,
    open: bool,
}

impl<R: CommandRunner> OpenSshSession<R> {
    /// Control socket backing this session.
    #[must_use]
    pub fn control_path(&self) -> &Utf8Path {
        &self.control_path
    }

    fn destination(&self) -> String {
        format!("{}@{}", self.credentials.user, self.address)
    }

    fn common_options(&self) -> Vec<OsString> {
        let identity = expand_tilde(self.credentials.identity_file.as_str());
        let mut args = vec![
            OsString::from("-i"),
            OsString::from(identity),
            OsString::from("-o"),
            OsString::from("BatchMode=yes"),
            OsString::from("-o"),
            OsString::from(format!("ControlPath={}", self.control_path)),
        ];

        if !self.config.ssh_strict_host_key_checking {
            args.push(OsString::from("-o"));
            args.push(OsString::from("StrictHostKeyChecking=no"));
        }

        if !self.config.ssh_known_hosts_file.trim().is_empty() {
            args.push(OsString::from("-o"));
            args.push(OsString::from(format!(
                "UserKnownHostsFile={}",
                self.config.ssh_known_hosts_file
            )));
        }

        args
    }

    fn ssh_options(&self) -> Vec<OsString> {
        let mut args = vec![
            OsString::from("-p"),
            OsString::from(self.credentials.port.to_string()),
        ];
        args.extend(self.common_options());
        args
    }

    fn scp_args(&self, local: &Utf8Path, remote: &Utf8Path) -> Vec<OsString> {
        let mut args = vec![
            OsString::from("-P"),
            OsString::from(self.credentials.port.to_string()),
        ];
        args.extend(self.common_options());
        args.push(OsString::from("-q"));
        args.push(OsString::from(local.as_str()));
        args.push(OsString::from(format!(
            "{}@{}:{remote}",
            self.credentials.user,
            scp_host(self.address)
        )));
        args
    }

    fn chmod_args(&self, remote: &Utf8Path, mode: u32) -> Vec<OsString> {
        let mut args = self.ssh_options();
        args.push(OsString::from(self.destination()));
        let escaped = escape(remote.as_str().into());
        args.push(OsString::from(format!("chmod {mode:04o} {escaped}")));
        args
    }

    fn exit_args(&self) -> Vec<OsString> {
        let mut args = self.ssh_options();
        args.push(OsString::from("-O"));
        args.push(OsString::from("exit"));
        args.push(OsString::from(self.destination()));
        args
    }
}

impl<R: CommandRunner> TransferSession for OpenSshSession<R> {
    fn copy_file(
        &mut self,
        local: &Utf8Path,
        remote: &Utf8Path,
        mode: u32,
    ) -> Result<(), TransferError> {
        if !self.open {
            return Err(TransferError::SessionClosed {
                address: self.address,
            });
        }
        let scp_args = self.scp_args(local, remote);
        self.runner
            .run(&self.config.scp_bin, &scp_args)?
            .into_result(&self.config.scp_bin)?;
        let chmod_args = self.chmod_args(remote, mode);
        self.runner
            .run(&self.config.ssh_bin, &chmod_args)?
            .into_result(&self.config.ssh_bin)?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransferError> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        let args = self.exit_args();
        self.runner
            .run(&self.config.ssh_bin, &args)?
            .into_result(&self.config.ssh_bin)?;
        debug!(address = %self.address, "closed master connection");
        Ok(())
    }
}
