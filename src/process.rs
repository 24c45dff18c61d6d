//! Subprocess wrapper for delegated external commands.
//!
//! Everything heavy (emerge, make, mount, grub2-mkconfig) runs through
//! [`Cmd`], which renders the command for dry runs, propagates non-zero
//! exit statuses as typed failures, and never retries.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::Error;

/// Builder for a single external command invocation.
pub struct Cmd {
    program: String,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    error_msg: Option<String>,
}

impl Cmd {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            current_dir: None,
            error_msg: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.current_dir = Some(dir.to_path_buf());
        self
    }

    /// Message used to wrap a failure of this command.
    pub fn error_msg(mut self, msg: &str) -> Self {
        self.error_msg = Some(msg.to_string());
        self
    }

    /// The command as a human-readable string, for dry runs and errors.
    pub fn rendered(&self) -> String {
        let mut out = self.program.clone();
        for arg in &self.args {
            out.push(' ');
            if arg.contains(' ') {
                out.push('\'');
                out.push_str(arg);
                out.push('\'');
            } else {
                out.push_str(arg);
            }
        }
        out
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }
        command
    }

    fn check_status(&self, status: std::process::ExitStatus) -> Result<()> {
        if status.success() {
            return Ok(());
        }
        let failure = Error::CommandFailed {
            command: self.rendered(),
            status: status.code().unwrap_or(-1),
        };
        match &self.error_msg {
            Some(msg) => Err(anyhow::Error::new(failure).context(msg.clone())),
            None => Err(failure.into()),
        }
    }

    /// Run the command, capturing stdout. Stderr is left attached to the
    /// terminal so external tools can report their own progress.
    pub fn run(self) -> Result<String> {
        let output = self
            .command()
            .stderr(Stdio::inherit())
            .output()
            .with_context(|| format!("spawning `{}`", self.rendered()))?;
        self.check_status(output.status)?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Run the command with stdio inherited, for interactive tools such
    /// as `make menuconfig` and long compiles the operator watches.
    pub fn run_interactive(self) -> Result<()> {
        let status = self
            .command()
            .status()
            .with_context(|| format!("spawning `{}`", self.rendered()))?;
        self.check_status(status)
    }

    /// Run the command, capturing stdout, but tolerate a non-zero exit.
    /// Returns the captured stdout and whether the command succeeded.
    pub fn run_unchecked(self) -> Result<(String, bool)> {
        let output = self
            .command()
            .stderr(Stdio::null())
            .output()
            .with_context(|| format!("spawning `{}`", self.rendered()))?;
        Ok((
            String::from_utf8_lossy(&output.stdout).into_owned(),
            output.status.success(),
        ))
    }

    /// Print the command instead of running it when `dry_run` is set.
    pub fn run_or_print(self, dry_run: bool) -> Result<()> {
        if dry_run {
            println!("{}", self.rendered());
            Ok(())
        } else {
            self.run_interactive()
        }
    }
}
