//! External process execution
//!
//! Everything this crate does to the outside world goes through
//! [`CommandRunner`]: rsync for the transfer, ssh-keygen and ssh-copy-id for
//! trust bootstrap.

use std::io::{self, Read};
use std::process::{Command, Stdio};

use crate::error::{Error, Result};

/// Result of a captured invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when terminated by a signal
    pub code: Option<i32>,
    /// Standard output and standard error, interleaved as written
    pub output: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs external programs
pub trait CommandRunner {
    /// Run with stdio attached to the caller's terminal and return the exit code
    fn run_attached(&self, program: &str, args: &[String]) -> Result<Option<i32>>;

    /// Run non-interactively, capturing combined output
    fn run_captured(&self, program: &str, args: &[String]) -> Result<CommandOutput>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run_attached(&self, program: &str, args: &[String]) -> Result<Option<i32>> {
        (**self).run_attached(program, args)
    }

    fn run_captured(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        (**self).run_captured(program, args)
    }
}

/// Runs programs with `std::process::Command`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run_attached(&self, program: &str, args: &[String]) -> Result<Option<i32>> {
        tracing::debug!("Running {} {}", program, args.join(" "));
        let status = Command::new(program)
            .args(args)
            .status()
            .map_err(|source| Error::Spawn {
                program: program.to_string(),
                source,
            })?;
        Ok(status.code())
    }

    fn run_captured(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        tracing::debug!("Running {} {}", program, args.join(" "));
        let spawn_error = |source| Error::Spawn {
            program: program.to_string(),
            source,
        };

        // One pipe for both streams keeps lines in the order the tool wrote them
        let (mut reader, writer) = io::pipe().map_err(spawn_error)?;
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(writer.try_clone().map_err(spawn_error)?)
            .stderr(writer);
        let mut child = command.spawn().map_err(spawn_error)?;
        // The command still holds the write ends; EOF needs them closed
        drop(command);

        let mut raw = Vec::new();
        reader.read_to_end(&mut raw)?;
        let status = child.wait()?;

        Ok(CommandOutput {
            code: status.code(),
            output: String::from_utf8_lossy(&raw).into_owned(),
        })
    }
}
