//! Process execution seam for the OpenSSH client.

use std::ffi::OsString;
use std::process::{Command, Stdio};

use super::TransferError;

/// Exit code and captured streams of one `ssh` or `scp` invocation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandOutput {
    /// Exit code, absent when the process was killed by a signal.
    pub code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Returns `true` when the exit code equals zero.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.code, Some(0))
    }

    /// Keeps successful outputs and turns anything else into a failure
    /// naming `program`.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::CommandFailure`] unless the exit code is zero.
    pub fn into_result(self, program: &str) -> Result<Self, TransferError> {
        if self.is_success() {
            return Ok(self);
        }
        Err(TransferError::CommandFailure {
            program: program.to_owned(),
            status: self.code,
            status_text: self
                .code
                .map_or_else(|| String::from("signal"), |code| code.to_string()),
            stderr: self.stderr.trim().to_owned(),
        })
    }
}

/// Runs external programs on behalf of the secure copy transport.
pub trait CommandRunner {
    /// Runs `program` to completion, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Spawn`] if the command cannot be started.
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, TransferError>;

    /// Runs a program that leaves a background child behind, such as
    /// `ssh -f`. Only the exit code is reported.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Spawn`] if the command cannot be started.
    fn run_detached(
        &self,
        program: &str,
        args: &[OsString],
    ) -> Result<CommandOutput, TransferError> {
        self.run(program, args)
    }
}

/// Runner backed by [`std::process::Command`].
#[derive(Clone, Debug, Default)]
pub struct ProcessCommandRunner;

impl ProcessCommandRunner {
    fn spawn_error(program: &str, err: &std::io::Error) -> TransferError {
        TransferError::Spawn {
            program: program.to_owned(),
            message: err.to_string(),
        }
    }
}

impl CommandRunner for ProcessCommandRunner {
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, TransferError> {
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|err| Self::spawn_error(program, &err))?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    // A forked master keeps inherited pipes open, so nothing is captured.
    fn run_detached(
        &self,
        program: &str,
        args: &[OsString],
    ) -> Result<CommandOutput, TransferError> {
        let status = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|err| Self::spawn_error(program, &err))?;

        Ok(CommandOutput {
            code: status.code(),
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}
