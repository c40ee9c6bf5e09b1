//! Post-write ownership and permission enforcement.
//!
//! After a blob's bytes are written and flushed, the store can hand the file to an
//! [`OwnershipEnforcer`]. The command-backed implementation shells out to the platform's
//! `chown` and `chmod` utilities, waiting synchronously for each.
//!
//! A failure here is reported to the caller of `create`, but the blob itself is not rolled
//! back: its content is already stored and it must be treated as created.

use crate::constants::{CHMOD_PROGRAM, CHOWN_PROGRAM};
use crate::{StoreError, StoreResult};
use blobfs_types::NonEmptyText;
use std::ffi::OsStr;
use std::fmt;
use std::io;
use std::path::Path;
use std::process::{Command, Stdio};

/// Applies ownership and permission settings to a freshly written blob.
pub trait OwnershipEnforcer: Send + Sync + fmt::Debug {
    fn apply(&self, path: &Path) -> StoreResult<()>;
}

/// Enforcer used when neither an owner nor a permission mode is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEnforcer;

impl OwnershipEnforcer for NoopEnforcer {
    fn apply(&self, _path: &Path) -> StoreResult<()> {
        Ok(())
    }
}

/// Exit code and captured standard error of a finished external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub stderr: String,
}

impl CommandOutcome {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    fn status_text(&self) -> String {
        match self.code {
            Some(code) => format!("exit status: {}", code),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Runs an external program to completion.
pub trait CommandRunner: Send + Sync + fmt::Debug {
    fn run(&self, program: &str, args: &[&OsStr]) -> io::Result<CommandOutcome>;
}

/// Runs commands as child processes of the current process.
///
/// Standard input and output are attached to the null device and standard error is
/// captured. `wait_with_output` takes ownership of the child, so every pipe is closed when
/// it returns, whether the command succeeded, failed or the wait itself errored.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &str, args: &[&OsStr]) -> io::Result<CommandOutcome> {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        let output = child.wait_with_output()?;

        Ok(CommandOutcome {
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// Enforces an owner (`chown`) and/or a permission mode (`chmod`) through external commands.
///
/// Each step is skipped when its setting is unset. Ownership is applied before permissions.
#[derive(Debug)]
pub struct CommandEnforcer {
    owner: Option<NonEmptyText>,
    permissions: Option<NonEmptyText>,
    runner: Box<dyn CommandRunner>,
}

impl CommandEnforcer {
    /// Creates an enforcer that runs commands with [`SystemCommandRunner`].
    pub fn new(owner: Option<NonEmptyText>, permissions: Option<NonEmptyText>) -> Self {
        Self::with_runner(owner, permissions, Box::new(SystemCommandRunner))
    }

    pub fn with_runner(
        owner: Option<NonEmptyText>,
        permissions: Option<NonEmptyText>,
        runner: Box<dyn CommandRunner>,
    ) -> Self {
        Self {
            owner,
            permissions,
            runner,
        }
    }

    /// Returns a [`CommandEnforcer`] when at least one setting is present, otherwise a
    /// [`NoopEnforcer`].
    pub fn from_settings(
        owner: Option<NonEmptyText>,
        permissions: Option<NonEmptyText>,
    ) -> Box<dyn OwnershipEnforcer> {
        if owner.is_none() && permissions.is_none() {
            Box::new(NoopEnforcer)
        } else {
            Box::new(Self::new(owner, permissions))
        }
    }

    fn invoke(&self, program: &str, setting: &NonEmptyText, path: &Path) -> StoreResult<()> {
        tracing::debug!("Running {} {} {}", program, setting, path.display());

        let args = [OsStr::new(setting.as_str()), path.as_os_str()];
        let outcome = self.runner.run(program, &args).map_err(|e| {
            let action = if e.kind() == io::ErrorKind::Interrupted {
                "Interrupted while waiting for"
            } else {
                "Failed to run"
            };
            StoreError::Io(io::Error::new(
                e.kind(),
                format!("{} {} on {}: {}", action, program, path.display(), e),
            ))
        })?;

        if outcome.success() {
            return Ok(());
        }

        Err(StoreError::CommandFailed {
            program: program.to_string(),
            path: path.display().to_string(),
            status: outcome.status_text(),
            stderr: outcome.stderr,
        })
    }
}

impl OwnershipEnforcer for CommandEnforcer {
    fn apply(&self, path: &Path) -> StoreResult<()> {
        if let Some(owner) = &self.owner {
            self.invoke(CHOWN_PROGRAM, owner, path)?;
        }
        if let Some(permissions) = &self.permissions {
            self.invoke(CHMOD_PROGRAM, permissions, path)?;
        }
        Ok(())
    }
}
