//! Buffered reads from one output stream of a child process.
//!
//! Bytes pulled from the pipe but not yet consumed by a logical read stay in
//! the buffer, in arrival order. Every chunk read is also appended to the
//! caller's [`Transcript`].

use std::io::{ErrorKind, Read, Write};

use tracing::trace;

use crate::core::matching::{PrefixStatus, find_from, prefix_status, resume_offset};
use crate::core::types::Stream;
use crate::error::HarnessError;
use crate::io::transcript::Transcript;

pub const DEFAULT_CHUNK_SIZE: usize = 1024;

pub struct StreamBuffer<R> {
    reader: R,
    stream: Stream,
    buffer: Vec<u8>,
    chunk: Vec<u8>,
}

impl<R: Read> StreamBuffer<R> {
    pub fn new(reader: R, stream: Stream) -> Self {
        Self::with_chunk_size(reader, stream, DEFAULT_CHUNK_SIZE)
    }

    pub fn with_chunk_size(reader: R, stream: Stream, chunk_size: usize) -> Self {
        Self {
            reader,
            stream,
            buffer: Vec::new(),
            chunk: vec![0; chunk_size.max(1)],
        }
    }

    pub fn stream(&self) -> Stream {
        self.stream
    }

    /// Bytes read but not yet consumed.
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    /// Read up to the first `terminator`, returning the text before it.
    ///
    /// The terminator itself is consumed. Invalid UTF-8 in the line is
    /// replaced; the transcript keeps the raw bytes.
    pub fn read_line(
        &mut self,
        terminator: &str,
        log: &mut Transcript,
    ) -> Result<String, HarnessError> {
        let needle = terminator.as_bytes();
        let mut from = 0;
        loop {
            if let Some(idx) = find_from(&self.buffer, needle, from) {
                let line = String::from_utf8_lossy(&self.buffer[..idx]).into_owned();
                self.buffer.drain(..idx + needle.len());
                return Ok(line);
            }
            from = resume_offset(self.buffer.len(), needle.len());
            self.fill(log)?;
        }
    }

    /// Consume `literal` from the front of the stream.
    ///
    /// Fails as soon as the buffered bytes stop being a prefix of `literal`,
    /// without waiting for the full length. Bytes past the literal are left
    /// in the buffer.
    pub fn expect_prefix(
        &mut self,
        literal: &str,
        log: &mut Transcript,
    ) -> Result<(), HarnessError> {
        let expected = literal.as_bytes();
        if expected.is_empty() {
            return Ok(());
        }
        loop {
            match prefix_status(&self.buffer, expected) {
                PrefixStatus::Complete => {
                    self.buffer.drain(..expected.len());
                    return Ok(());
                }
                PrefixStatus::Diverged => return Err(self.mismatch(literal)),
                PrefixStatus::Partial => {
                    self.fill(log)?;
                }
            }
        }
    }

    /// Copy buffered bytes, then everything else until end of stream, to `sink`.
    pub fn drain_to<W: Write + ?Sized>(
        &mut self,
        sink: &mut W,
        log: &mut Transcript,
    ) -> Result<u64, HarnessError> {
        let mut total = self.buffer.len() as u64;
        sink.write_all(&self.buffer).map_err(HarnessError::Sink)?;
        self.buffer.clear();
        loop {
            let n = self.read_chunk()?;
            if n == 0 {
                break;
            }
            log.record(self.stream.into(), &self.chunk[..n]);
            sink.write_all(&self.chunk[..n]).map_err(HarnessError::Sink)?;
            total += n as u64;
        }
        sink.flush().map_err(HarnessError::Sink)?;
        Ok(total)
    }

    /// Append one chunk to the buffer. End of stream is an error here.
    fn fill(&mut self, log: &mut Transcript) -> Result<usize, HarnessError> {
        let n = self.read_chunk()?;
        if n == 0 {
            return Err(HarnessError::EndOfStream {
                stream: self.stream,
            });
        }
        self.buffer.extend_from_slice(&self.chunk[..n]);
        log.record(self.stream.into(), &self.chunk[..n]);
        Ok(n)
    }

    fn read_chunk(&mut self) -> Result<usize, HarnessError> {
        loop {
            match self.reader.read(&mut self.chunk) {
                Ok(n) => {
                    trace!(stream = %self.stream, bytes = n, "read chunk");
                    return Ok(n);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(source) => {
                    return Err(HarnessError::Read {
                        stream: self.stream,
                        source,
                    });
                }
            }
        }
    }

    fn mismatch(&self, literal: &str) -> HarnessError {
        HarnessError::Mismatch {
            stream: self.stream,
            expected: literal.to_string(),
            actual: String::from_utf8_lossy(&self.buffer).into_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::transcript::Direction;
    use crate::test_support::{ChunkedReader, FailingReader};

    fn buffer(chunks: &[&str]) -> StreamBuffer<ChunkedReader> {
        StreamBuffer::new(ChunkedReader::new(chunks), Stream::Stdout)
    }

    #[test]
    fn line_then_prompt_from_one_chunk() {
        let mut buf = buffer(&["A1\n> "]);
        let mut log = Transcript::new();

        assert_eq!(buf.read_line("\n", &mut log).expect("line"), "A1");
        buf.expect_prefix("> ", &mut log).expect("prompt");
        assert_eq!(buf.reader.reads(), 1);
        assert!(buf.buffered().is_empty());
    }

    #[test]
    fn line_spans_several_reads() {
        let mut buf = buffer(&["Chan", "ged: A", "1\nrest"]);
        let mut log = Transcript::new();

        assert_eq!(buf.read_line("\n", &mut log).expect("line"), "Changed: A1");
        assert_eq!(buf.buffered(), b"rest");
        assert_eq!(buf.reader.reads(), 3);
    }

    #[test]
    fn terminator_split_across_reads() {
        let mut buf = buffer(&["ab\r", "\ncd"]);
        let mut log = Transcript::new();

        assert_eq!(buf.read_line("\r\n", &mut log).expect("line"), "ab");
        assert_eq!(buf.buffered(), b"cd");
    }

    #[test]
    fn custom_terminator_leaves_remainder() {
        let mut buf = buffer(&["one;two;"]);
        let mut log = Transcript::new();

        assert_eq!(buf.read_line(";", &mut log).expect("first"), "one");
        assert_eq!(buf.read_line(";", &mut log).expect("second"), "two");
        assert_eq!(buf.reader.reads(), 1);
    }

    #[test]
    fn line_at_eof_is_end_of_stream() {
        let mut buf = buffer(&["partial"]);
        let mut log = Transcript::new();

        let err = buf.read_line("\n", &mut log).expect_err("eof");
        assert!(matches!(
            err,
            HarnessError::EndOfStream {
                stream: Stream::Stdout
            }
        ));
        assert_eq!(buf.buffered(), b"partial");
    }

    #[test]
    fn read_error_is_reported() {
        let mut buf = StreamBuffer::new(FailingReader, Stream::Stderr);
        let mut log = Transcript::new();

        let err = buf.read_line("\n", &mut log).expect_err("read error");
        assert!(matches!(
            err,
            HarnessError::Read {
                stream: Stream::Stderr,
                ..
            }
        ));
    }

    #[test]
    fn expect_waits_for_full_literal() {
        let mut buf = buffer(&[">", " ", "A1"]);
        let mut log = Transcript::new();

        buf.expect_prefix("> ", &mut log).expect("prompt");
        assert_eq!(buf.reader.reads(), 2);
        assert!(buf.buffered().is_empty());
    }

    #[test]
    fn expect_fails_before_full_length_arrives() {
        let mut buf = buffer(&["O", "ut of bounds address\n"]);
        let mut log = Transcript::new();

        let err = buf
            .expect_prefix("\"\"\n", &mut log)
            .expect_err("divergence");
        match err {
            HarnessError::Mismatch {
                expected, actual, ..
            } => {
                assert_eq!(expected, "\"\"\n");
                assert_eq!(actual, "O");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(buf.reader.reads(), 1);
    }

    #[test]
    fn expect_is_a_prefix_match() {
        let mut buf = buffer(&["Changed: C3 extra\n"]);
        let mut log = Transcript::new();

        buf.expect_prefix("Changed: C3", &mut log).expect("prefix");
        assert_eq!(buf.buffered(), b" extra\n");
    }

    #[test]
    fn expect_uses_buffered_bytes_first() {
        let mut buf = buffer(&["> > ", "never read"]);
        let mut log = Transcript::new();

        buf.expect_prefix("> ", &mut log).expect("first");
        buf.expect_prefix("> ", &mut log).expect("second");
        assert_eq!(buf.reader.reads(), 1);
    }

    #[test]
    fn expect_empty_literal_reads_nothing() {
        let mut buf = buffer(&["data"]);
        let mut log = Transcript::new();

        buf.expect_prefix("", &mut log).expect("empty");
        assert_eq!(buf.reader.reads(), 0);
    }

    #[test]
    fn expect_at_eof_is_end_of_stream() {
        let mut buf = buffer(&[">"]);
        let mut log = Transcript::new();

        let err = buf.expect_prefix("> ", &mut log).expect_err("eof");
        assert!(matches!(err, HarnessError::EndOfStream { .. }));
    }

    #[test]
    fn drain_emits_buffered_bytes_first() {
        let mut buf = buffer(&["A1\nleft", "over\n", "tail"]);
        let mut log = Transcript::new();
        buf.read_line("\n", &mut log).expect("line");

        let mut sink = Vec::new();
        let written = buf.drain_to(&mut sink, &mut log).expect("drain");
        assert_eq!(sink, b"leftover\ntail");
        assert_eq!(written, 13);
        assert!(buf.buffered().is_empty());
        assert_eq!(log.bytes_for(Direction::Stdout), b"A1\nleftover\ntail");
    }

    #[test]
    fn chunk_size_bounds_each_read() {
        let mut buf = StreamBuffer::with_chunk_size(
            ChunkedReader::new(&["abcdef\n"]),
            Stream::Stdout,
            2,
        );
        let mut log = Transcript::new();

        assert_eq!(buf.read_line("\n", &mut log).expect("line"), "abcdef");
        assert_eq!(buf.reader.reads(), 4);
    }
}
