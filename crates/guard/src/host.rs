use std::{
    env,
    ffi::OsString,
    fmt, fs, io,
    path::{Path, PathBuf},
    process::{Command, ExitStatus, Stdio},
    sync::{Mutex, PoisonError},
};

use thiserror::Error;

use crate::routes::CommandSpec;

/// Resolves executable names the way a shell would, without running them.
pub trait ExecutableLocator: Send + Sync + fmt::Debug {
    fn which(&self, program: &str) -> Option<PathBuf>;
}

#[derive(Debug, Clone, Copy)]
pub struct ExecRequest<'a> {
    pub command: &'a CommandSpec,
    /// Capture stdout/stderr instead of letting them through to the console.
    pub capture: bool,
}

impl<'a> ExecRequest<'a> {
    pub fn uncaptured(command: &'a CommandSpec) -> Self {
        Self {
            command,
            capture: false,
        }
    }

    pub fn captured(command: &'a CommandSpec) -> Self {
        Self {
            command,
            capture: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub status_code: Option<i32>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
}

pub trait CommandExecutor: Send + Sync + fmt::Debug {
    fn execute(&self, request: ExecRequest<'_>) -> Result<ExecOutput, ExecError>;
}

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("`{command}` exited with status {code}")]
    ExitStatus {
        command: String,
        code: i32,
        stderr: Option<String>,
    },
    #[error("`{command}` was terminated by a signal")]
    Signalled { command: String },
}

impl ExecError {
    pub fn command(&self) -> &str {
        match self {
            Self::Spawn { command, .. }
            | Self::ExitStatus { command, .. }
            | Self::Signalled { command } => command,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SystemLocator {
    search_path: Option<OsString>,
}

impl SystemLocator {
    pub fn from_env() -> Self {
        Self {
            search_path: env::var_os("PATH"),
        }
    }

    pub fn with_search_path(search_path: impl Into<OsString>) -> Self {
        Self {
            search_path: Some(search_path.into()),
        }
    }
}

impl ExecutableLocator for SystemLocator {
    fn which(&self, program: &str) -> Option<PathBuf> {
        if program.is_empty() {
            return None;
        }
        if program.contains('/') {
            let candidate = PathBuf::from(program);
            return is_executable_file(&candidate).then_some(candidate);
        }

        let search_path = self.search_path.as_ref()?;
        env::split_paths(search_path)
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(|dir| dir.join(program))
            .find(|candidate| is_executable_file(candidate))
    }
}

#[cfg(unix)]
fn is_executable_file(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    fs::metadata(path)
        .map(|metadata| metadata.is_file() && metadata.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable_file(path: &Path) -> bool {
    fs::metadata(path)
        .map(|metadata| metadata.is_file())
        .unwrap_or(false)
}

/// Spawns commands directly from their argument vector.
#[derive(Debug, Clone)]
pub struct SystemExecutor {
    search_path: Option<OsString>,
    accepted_exit_codes: Vec<i32>,
}

impl Default for SystemExecutor {
    fn default() -> Self {
        Self {
            search_path: None,
            accepted_exit_codes: vec![0],
        }
    }
}

impl SystemExecutor {
    /// Overrides `PATH` for spawned commands, which also drives program
    /// lookup.
    pub fn with_search_path(mut self, search_path: impl Into<OsString>) -> Self {
        self.search_path = Some(search_path.into());
        self
    }

    /// Exit codes treated as success. Defaults to `[0]`.
    pub fn with_accepted_exit_codes(mut self, codes: impl IntoIterator<Item = i32>) -> Self {
        self.accepted_exit_codes = codes.into_iter().collect();
        self
    }

    fn check_status(
        &self,
        command: String,
        status: ExitStatus,
        stderr: Option<String>,
    ) -> Result<i32, ExecError> {
        let Some(code) = status.code() else {
            return Err(ExecError::Signalled { command });
        };
        if !self.accepted_exit_codes.contains(&code) {
            return Err(ExecError::ExitStatus {
                command,
                code,
                stderr,
            });
        }
        Ok(code)
    }
}

impl CommandExecutor for SystemExecutor {
    fn execute(&self, request: ExecRequest<'_>) -> Result<ExecOutput, ExecError> {
        let display = request.command.to_string();
        let mut child_command = Command::new(request.command.program);
        child_command.args(request.command.args).stdin(Stdio::null());
        if let Some(search_path) = &self.search_path {
            child_command.env("PATH", search_path);
        }
        let spawn_error = |source| ExecError::Spawn {
            command: display.clone(),
            source,
        };

        if request.capture {
            let output = child_command
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .output()
                .map_err(spawn_error)?;
            let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            let code = self.check_status(display, output.status, Some(stderr.clone()))?;
            Ok(ExecOutput {
                status_code: Some(code),
                stdout: Some(stdout),
                stderr: Some(stderr),
            })
        } else {
            let status = child_command
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit())
                .status()
                .map_err(spawn_error)?;
            let code = self.check_status(display, status, None)?;
            Ok(ExecOutput {
                status_code: Some(code),
                stdout: None,
                stderr: None,
            })
        }
    }
}

/// Records commands instead of running them.
#[derive(Debug, Default)]
pub struct DryRunExecutor {
    planned: Mutex<Vec<String>>,
}

impl DryRunExecutor {
    pub fn planned(&self) -> Vec<String> {
        self.planned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CommandExecutor for DryRunExecutor {
    fn execute(&self, request: ExecRequest<'_>) -> Result<ExecOutput, ExecError> {
        self.planned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.command.to_string());
        Ok(ExecOutput::default())
    }
}
