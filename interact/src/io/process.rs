//! Ownership of one child process: spawn, stdin writes, and bounded exit wait.
//!
//! A [`ProcessHandle`] kills and reaps its child when dropped, so every exit
//! path of the owner (success, mismatch, I/O error, panic unwind) terminates
//! the process.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, ErrorKind, Read, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

use crate::core::types::StderrPolicy;
use crate::error::HarnessError;

/// Program plus arguments, spawned without a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    program: String,
    args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
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

    /// Split a shell-like command line (`./main --flag "quoted arg"`).
    pub fn parse(line: &str) -> Result<Self> {
        let argv = shell_words::split(line).with_context(|| format!("split command {line:?}"))?;
        Self::from_argv(&argv)
    }

    pub fn from_argv(argv: &[String]) -> Result<Self> {
        let Some((program, args)) = argv.split_first() else {
            bail!("command must be a non-empty array");
        };
        if program.trim().is_empty() {
            bail!("command program must be non-empty");
        }
        Ok(Self::new(program.clone()).args(args.iter().cloned()))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.args.len() + 1);
        argv.push(self.program.clone());
        argv.extend(self.args.iter().cloned());
        argv
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&shell_words::join(self.argv()))
    }
}

/// Everything needed to start a child.
#[derive(Debug, Clone)]
pub struct SpawnOptions {
    pub command: CommandLine,
    pub stderr: StderrPolicy,
    pub current_dir: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
}

impl SpawnOptions {
    pub fn new(command: CommandLine) -> Self {
        Self {
            command,
            stderr: StderrPolicy::default(),
            current_dir: None,
            env: BTreeMap::new(),
        }
    }
}

type OutputPipe = Box<dyn Read + Send>;

pub struct ProcessHandle {
    program: String,
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Option<OutputPipe>,
    stderr: Option<OutputPipe>,
    status: Option<ExitStatus>,
}

impl ProcessHandle {
    #[instrument(skip_all, fields(command = %options.command, stderr = ?options.stderr))]
    pub fn spawn(options: &SpawnOptions) -> Result<Self, HarnessError> {
        let program = options.command.program().to_string();
        let spawn_error = |source: io::Error| HarnessError::Spawn {
            program: program.clone(),
            source,
        };

        let mut cmd = Command::new(&options.command.program);
        cmd.args(&options.command.args)
            .envs(&options.env)
            .stdin(Stdio::piped());
        if let Some(dir) = &options.current_dir {
            cmd.current_dir(dir);
        }

        let merged = match options.stderr {
            StderrPolicy::Merged => {
                let (reader, writer) = io::pipe().map_err(spawn_error)?;
                let writer_for_stderr = writer.try_clone().map_err(spawn_error)?;
                cmd.stdout(writer).stderr(writer_for_stderr);
                Some(reader)
            }
            StderrPolicy::Piped => {
                cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
                None
            }
            StderrPolicy::Inherit => {
                cmd.stdout(Stdio::piped()).stderr(Stdio::inherit());
                None
            }
        };

        debug!("spawning child process");
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(source) => {
                error!(err = %source, "failed to spawn command");
                return Err(spawn_error(source));
            }
        };
        // The command still owns the parent's copies of the merged pipe's
        // write ends; EOF on the reader is only observable once they close.
        drop(cmd);

        let stdout: OutputPipe = match merged {
            Some(reader) => Box::new(reader),
            None => Box::new(child.stdout.take().ok_or_else(|| {
                spawn_error(io::Error::other("stdout was not piped"))
            })?),
        };
        let stderr = child
            .stderr
            .take()
            .map(|pipe| Box::new(pipe) as OutputPipe);
        let stdin = child.stdin.take();

        debug!(pid = child.id(), "child process started");
        Ok(Self {
            program,
            child,
            stdin,
            stdout: Some(stdout),
            stderr,
            status: None,
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn id(&self) -> u32 {
        self.child.id()
    }

    pub fn take_stdout(&mut self) -> Option<Box<dyn Read + Send>> {
        self.stdout.take()
    }

    /// Present only when spawned with [`StderrPolicy::Piped`].
    pub fn take_stderr(&mut self) -> Option<Box<dyn Read + Send>> {
        self.stderr.take()
    }

    /// Write all of `data` to the child's stdin, one partial write at a time.
    pub fn write(&mut self, data: &[u8]) -> Result<(), HarnessError> {
        let stdin = self.stdin.as_mut().ok_or(HarnessError::BrokenPipe)?;
        let mut cursor = 0;
        while cursor < data.len() {
            match stdin.write(&data[cursor..]) {
                Ok(0) => return Err(HarnessError::BrokenPipe),
                Ok(n) => cursor += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::BrokenPipe => {
                    return Err(HarnessError::BrokenPipe);
                }
                Err(err) => return Err(HarnessError::Write(err)),
            }
        }
        Ok(())
    }

    /// Close stdin so the child observes end of input.
    pub fn close_stdin(&mut self) {
        if self.stdin.take().is_some() {
            debug!(pid = self.child.id(), "closed child stdin");
        }
    }

    pub fn is_running(&mut self) -> bool {
        if self.status.is_some() {
            return false;
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                self.status = Some(status);
                false
            }
            Ok(None) => true,
            Err(_) => false,
        }
    }

    /// Wait up to `timeout` for the child to exit with status 0.
    ///
    /// A child still alive at the bound is killed and reported as
    /// [`HarnessError::ProcessTimeout`].
    #[instrument(skip(self), fields(program = %self.program, timeout_ms = timeout.as_millis() as u64))]
    pub fn wait_for_exit(&mut self, timeout: Duration) -> Result<ExitStatus, HarnessError> {
        let status = match self.status {
            Some(status) => status,
            None => match self.child.wait_timeout(timeout).map_err(|source| {
                HarnessError::Wait {
                    program: self.program.clone(),
                    source,
                }
            })? {
                Some(status) => {
                    self.status = Some(status);
                    status
                }
                None => {
                    warn!("process still running, killing");
                    if let Err(err) = self.kill() {
                        warn!(err = %err, "failed to kill process");
                    }
                    return Err(HarnessError::ProcessTimeout {
                        program: self.program.clone(),
                        timeout,
                    });
                }
            },
        };

        debug!(exit_code = ?status.code(), "process exited");
        if status.success() {
            Ok(status)
        } else {
            Err(HarnessError::ProcessExit {
                program: self.program.clone(),
                code: status.code(),
            })
        }
    }

    /// Kill and reap the child if it has not been reaped yet.
    pub fn kill(&mut self) -> io::Result<()> {
        if self.status.is_some() {
            return Ok(());
        }
        match self.child.kill() {
            Ok(()) => {}
            // Already exited but not yet reaped.
            Err(err) if err.kind() == ErrorKind::InvalidInput => {}
            Err(err) => return Err(err),
        }
        let status = self.child.wait()?;
        debug!(pid = self.child.id(), exit_code = ?status.code(), "child process killed");
        self.status = Some(status);
        Ok(())
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        self.stdin.take();
        if let Err(err) = self.kill() {
            warn!(program = %self.program, err = %err, "failed to kill child process on drop");
        }
    }
}
