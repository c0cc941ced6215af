//! Centralized external-command execution.
//!
//! Every invocation of `debootstrap`, `apt`, `dpkg`, `chroot`, `qemu-*`, or
//! `zypper` goes through this module so child processes get consistent
//! stdio handling, logging, and error reporting.

use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use tracing::debug;

use crate::error::{Result, SysrootError};

/// Result of a command execution with output captured.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    pub fn code(&self) -> i32 {
        self.status.code().unwrap_or(-1)
    }

    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim()
    }

    pub fn stderr_trimmed(&self) -> &str {
        self.stderr.trim()
    }
}

/// Builder for an external command.
pub struct Cmd {
    program: String,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    envs: Vec<(String, String)>,
    allow_fail: bool,
}

impl Cmd {
    pub fn new(program: impl AsRef<str>) -> Self {
        Self {
            program: program.as_ref().to_string(),
            args: Vec::new(),
            current_dir: None,
            envs: Vec::new(),
            allow_fail: false,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<str>) -> Self {
        self.args.push(arg.as_ref().to_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for arg in args {
            self.args.push(arg.as_ref().to_string());
        }
        self
    }

    pub fn dir(mut self, dir: &Path) -> Self {
        self.current_dir = Some(dir.to_path_buf());
        self
    }

    pub fn env(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.envs
            .push((key.as_ref().to_string(), value.as_ref().to_string()));
        self
    }

    /// Allow a non-zero exit code without turning it into an error.
    pub fn allow_fail(mut self) -> Self {
        self.allow_fail = true;
        self
    }

    fn build(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(ref dir) = self.current_dir {
            cmd.current_dir(dir);
        }
        for (k, v) in &self.envs {
            cmd.env(k, v);
        }
        cmd
    }

    /// Run the command, capturing stdout/stderr.
    pub fn run(self) -> Result<CommandResult> {
        debug!(program = %self.program, args = ?self.args, "executing");
        let mut cmd = self.build();
        let output = cmd
            .output()
            .map_err(|e| SysrootError::io(PathBuf::from(&self.program), e))?;

        let result = CommandResult {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if !self.allow_fail && !result.success() {
            return Err(SysrootError::ExternalToolFailed(
                self.program.clone(),
                result.code(),
            ));
        }

        Ok(result)
    }

    /// Run the command with inherited stdio. Used for interactive/streaming
    /// invocations like `debootstrap` and `apt-get upgrade`.
    pub fn run_interactive(self) -> Result<ExitStatus> {
        debug!(program = %self.program, args = ?self.args, "executing (interactive)");
        let mut cmd = self.build();
        cmd.stdin(Stdio::inherit());
        cmd.stdout(Stdio::inherit());
        cmd.stderr(Stdio::inherit());

        let status = cmd
            .status()
            .map_err(|e| SysrootError::io(PathBuf::from(&self.program), e))?;

        if !self.allow_fail && !status.success() {
            return Err(SysrootError::ExternalToolFailed(
                self.program.clone(),
                status.code().unwrap_or(-1),
            ));
        }

        Ok(status)
    }
}

/// Run a command with arguments, failing on non-zero exit.
pub fn run<I, S>(program: &str, args: I) -> Result<CommandResult>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    Cmd::new(program).args(args).run()
}

/// Run a command with arguments, streaming stdio, failing on non-zero exit.
pub fn run_interactive<I, S>(program: &str, args: I) -> Result<ExitStatus>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    Cmd::new(program).args(args).run_interactive()
}
