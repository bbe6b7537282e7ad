//! Scripted interaction with one child process.
//!
//! An [`Interactor`] owns the process, one [`StreamBuffer`] per readable
//! stream, and the transcript of everything exchanged. Dropping it kills the
//! process.

use std::io::{Read, Write};
use std::time::Duration;

use tracing::debug;

use crate::core::types::Stream;
use crate::error::HarnessError;
use crate::io::process::{CommandLine, ProcessHandle, SpawnOptions};
use crate::io::stream::{DEFAULT_CHUNK_SIZE, StreamBuffer};
use crate::io::transcript::{Direction, Transcript};

pub const DEFAULT_EXIT_TIMEOUT: Duration = Duration::from_secs(5);

type Pipe = Box<dyn Read + Send>;

#[derive(Debug, Clone)]
pub struct InteractorConfig {
    pub spawn: SpawnOptions,
    pub chunk_size: usize,
    /// Bound on waiting for exit after [`Interactor::pipe`] drains the output.
    pub exit_timeout: Duration,
}

impl InteractorConfig {
    pub fn new(command: CommandLine) -> Self {
        Self {
            spawn: SpawnOptions::new(command),
            chunk_size: DEFAULT_CHUNK_SIZE,
            exit_timeout: DEFAULT_EXIT_TIMEOUT,
        }
    }
}

pub struct Interactor {
    process: ProcessHandle,
    stdout: StreamBuffer<Pipe>,
    stderr: Option<StreamBuffer<Pipe>>,
    transcript: Transcript,
    exit_timeout: Duration,
}

impl Interactor {
    pub fn spawn(config: &InteractorConfig) -> Result<Self, HarnessError> {
        let mut process = ProcessHandle::spawn(&config.spawn)?;
        let stdout = process.take_stdout().ok_or(HarnessError::StreamUnavailable {
            stream: Stream::Stdout,
        })?;
        let stderr = process.take_stderr();
        Ok(Self {
            process,
            stdout: StreamBuffer::with_chunk_size(stdout, Stream::Stdout, config.chunk_size),
            stderr: stderr
                .map(|pipe| StreamBuffer::with_chunk_size(pipe, Stream::Stderr, config.chunk_size)),
            transcript: Transcript::new(),
            exit_timeout: config.exit_timeout,
        })
    }

    pub fn process(&self) -> &ProcessHandle {
        &self.process
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn write(&mut self, text: &str) -> Result<(), HarnessError> {
        self.transcript.record(Direction::Stdin, text.as_bytes());
        debug!(bytes = text.len(), "write to child stdin");
        self.process.write(text.as_bytes())
    }

    /// Read one line from stdout, without its terminator.
    pub fn getline(&mut self, terminator: &str) -> Result<String, HarnessError> {
        self.getline_on(Stream::Stdout, terminator)
    }

    pub fn getline_on(&mut self, stream: Stream, terminator: &str) -> Result<String, HarnessError> {
        let (buffer, log) = self.select(stream)?;
        buffer.read_line(terminator, log)
    }

    /// Consume `literal` from the front of stdout.
    pub fn expect(&mut self, literal: &str) -> Result<(), HarnessError> {
        self.expect_on(Stream::Stdout, literal)
    }

    pub fn expect_on(&mut self, stream: Stream, literal: &str) -> Result<(), HarnessError> {
        let (buffer, log) = self.select(stream)?;
        buffer.expect_prefix(literal, log)
    }

    /// Copy the rest of stdout to `sink`, then require a clean exit.
    pub fn pipe<W: Write + ?Sized>(&mut self, sink: &mut W) -> Result<(), HarnessError> {
        self.pipe_on(Stream::Stdout, sink)
    }

    /// End the interactive exchange: close stdin, copy `stream` to `sink`
    /// until end of stream, and wait for the process to exit with status 0.
    ///
    /// A non-zero exit here is [`HarnessError::ProcessExit`] even though the
    /// drain itself succeeded.
    pub fn pipe_on<W: Write + ?Sized>(
        &mut self,
        stream: Stream,
        sink: &mut W,
    ) -> Result<(), HarnessError> {
        self.process.close_stdin();
        let (buffer, log) = self.select(stream)?;
        let drained = buffer.drain_to(sink, log)?;
        debug!(stream = %stream, bytes = drained, "drained stream");
        self.process.wait_for_exit(self.exit_timeout)?;
        Ok(())
    }

    fn select(
        &mut self,
        stream: Stream,
    ) -> Result<(&mut StreamBuffer<Pipe>, &mut Transcript), HarnessError> {
        let buffer = match stream {
            Stream::Stdout => &mut self.stdout,
            Stream::Stderr => self
                .stderr
                .as_mut()
                .ok_or(HarnessError::StreamUnavailable { stream })?,
        };
        Ok((buffer, &mut self.transcript))
    }
}
