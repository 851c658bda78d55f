//! Line protocol session.
//!
//! One command per `\n`-terminated line (a trailing `\r` is dropped):
//!
//! ```text
//! <ngram>        load phase: initial vocabulary, one ngram per line
//! S              end of load phase; answered with "R"
//! A <ngram>      add
//! D <ngram>      delete
//! Q <document>   query; answered with one line
//! F              end of batch; pending answers are written and flushed
//! ```
//!
//! Consecutive queries are buffered into a segment and evaluated together by
//! the [`Dispatcher`]. A segment is dispatched before the next mutation is
//! applied, at `F`, and at end of input, so every query sees exactly the
//! mutations that precede it in the stream.

use std::io::{self, BufRead, Write};

use ngram_types::{IndexError, ProtocolError};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::dispatch::Dispatcher;
use crate::index::NgramIndex;

/// Line that ends the load phase.
pub const LOAD_TERMINATOR: &[u8] = b"S";

/// Line written once the load phase is complete.
pub const READY: &[u8] = b"R";

/// A parsed steady-state command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    /// `A <ngram>`
    Add(&'a [u8]),
    /// `D <ngram>`
    Delete(&'a [u8]),
    /// `Q <document>`
    Query(&'a [u8]),
    /// `F`
    Flush,
}

/// Everything that can end a session early.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Malformed command line.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    /// The index could not apply a mutation.
    #[error("line {line}: {source}")]
    Index {
        /// 1-based line of the failed command.
        line: usize,
        /// Underlying fault.
        source: IndexError,
    },
    /// Reading commands or writing answers failed.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

/// Counters describing a finished session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    /// Lines read, load phase included.
    pub lines: usize,
    /// Ngrams read during the load phase.
    pub loaded: usize,
    /// Whether the load phase ended with `S`.
    pub ready: bool,
    /// `A` commands.
    pub added: usize,
    /// `D` commands that removed a live ngram.
    pub deleted: usize,
    /// `Q` commands.
    pub queries: usize,
    /// Query segments dispatched.
    pub segments: usize,
    /// `F` commands.
    pub batches: usize,
}

/// Drops the line terminator: `\n`, then one `\r`.
#[inline]
pub fn trim_line(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Parses a steady-state line (already trimmed). `line_no` is 1-based.
pub fn parse_command(line: &[u8], line_no: usize) -> Result<Command<'_>, ProtocolError> {
    let Some((&opcode, rest)) = line.split_first() else {
        return Err(ProtocolError::EmptyLine { line: line_no });
    };

    let payload = match rest.split_first() {
        None => rest,
        Some((&b' ', payload)) => payload,
        Some(_) if matches!(opcode, b'A' | b'D' | b'Q' | b'F') => {
            return Err(ProtocolError::MissingSeparator {
                line: line_no,
                content: String::from_utf8_lossy(line).into_owned(),
            });
        }
        Some(_) => rest,
    };

    match opcode {
        b'A' => Ok(Command::Add(payload)),
        b'D' => Ok(Command::Delete(payload)),
        b'Q' => Ok(Command::Query(payload)),
        b'F' => Ok(Command::Flush),
        other => Err(ProtocolError::UnknownOpcode {
            line: line_no,
            opcode: char::from(other),
            content: String::from_utf8_lossy(line).into_owned(),
        }),
    }
}

/// Drives an index from a command stream.
pub struct Session<'a, W: Write> {
    index: &'a mut NgramIndex,
    dispatcher: &'a Dispatcher,
    out: W,
    pending: Vec<Vec<u8>>,
    summary: SessionSummary,
}

impl<'a, W: Write> Session<'a, W> {
    /// Creates a session writing answers to `out`.
    pub fn new(index: &'a mut NgramIndex, dispatcher: &'a Dispatcher, out: W) -> Self {
        Self {
            index,
            dispatcher,
            out,
            pending: Vec::new(),
            summary: SessionSummary::default(),
        }
    }

    /// Reads commands from `input` until end of input.
    ///
    /// # Errors
    ///
    /// Stops at the first malformed line, failed mutation or I/O error.
    /// Queries read before a malformed line are answered and flushed first.
    pub fn run<R: BufRead>(mut self, mut input: R) -> Result<SessionSummary, SessionError> {
        let mut buf = Vec::with_capacity(256);

        if !self.load(&mut input, &mut buf)? {
            warn!(
                loaded = self.summary.loaded,
                "input ended during load phase"
            );
            self.out.flush()?;
            return Ok(self.summary);
        }

        loop {
            buf.clear();
            if input.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            self.summary.lines += 1;
            let op = self.summary.lines;

            let command = match parse_command(trim_line(&buf), op) {
                Ok(command) => command,
                Err(e) => {
                    self.dispatch_pending()?;
                    self.out.flush()?;
                    return Err(e.into());
                }
            };

            match command {
                Command::Add(ngram) => {
                    self.dispatch_pending()?;
                    self.index
                        .add(ngram)
                        .map_err(|source| SessionError::Index { line: op, source })?;
                    self.summary.added += 1;
                }
                Command::Delete(ngram) => {
                    self.dispatch_pending()?;
                    if self.index.delete(ngram) {
                        self.summary.deleted += 1;
                    }
                }
                Command::Query(doc) => {
                    self.pending.push(doc.to_vec());
                    self.summary.queries += 1;
                }
                Command::Flush => {
                    self.dispatch_pending()?;
                    self.out.flush()?;
                    self.summary.batches += 1;
                    debug!(op, "batch complete");
                }
            }
        }

        self.dispatch_pending()?;
        self.out.flush()?;
        info!(
            lines = self.summary.lines,
            queries = self.summary.queries,
            batches = self.summary.batches,
            "input exhausted"
        );
        Ok(self.summary)
    }

    /// Inserts ngrams until the terminator line. Returns `false` on end of
    /// input.
    fn load<R: BufRead>(&mut self, input: &mut R, buf: &mut Vec<u8>) -> Result<bool, SessionError> {
        loop {
            buf.clear();
            if input.read_until(b'\n', buf)? == 0 {
                return Ok(false);
            }
            self.summary.lines += 1;

            let line = trim_line(buf);
            if line == LOAD_TERMINATOR {
                break;
            }
            self.index.add(line).map_err(|source| SessionError::Index {
                line: self.summary.lines,
                source,
            })?;
            self.summary.loaded += 1;
        }

        self.out.write_all(READY)?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        self.summary.ready = true;
        info!(
            ngrams = self.summary.loaded,
            live = self.index.len(),
            "load phase complete"
        );
        Ok(true)
    }

    /// Evaluates buffered queries and writes their answers in order.
    fn dispatch_pending(&mut self) -> Result<(), SessionError> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let answers = self.dispatcher.evaluate_segment(self.index, &self.pending);
        for answer in &answers {
            self.out.write_all(answer)?;
            self.out.write_all(b"\n")?;
        }
        self.pending.clear();
        self.summary.segments += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::DispatchConfig;
    use ngram_types::{Strategy, TrieConfig};

    fn run_with(config: DispatchConfig, input: &str) -> Result<(String, SessionSummary), SessionError> {
        let mut index = NgramIndex::with_shards(TrieConfig::default(), config.shards());
        let dispatcher = Dispatcher::new(config).unwrap();
        let mut out = Vec::new();
        let summary = Session::new(&mut index, &dispatcher, &mut out).run(input.as_bytes())?;
        Ok((String::from_utf8(out).unwrap(), summary))
    }

    fn run(input: &str) -> String {
        run_with(DispatchConfig::sequential(), input).unwrap().0
    }

    #[test]
    fn parse_opcodes() {
        assert_eq!(parse_command(b"A new york", 1), Ok(Command::Add(b"new york")));
        assert_eq!(parse_command(b"D x", 1), Ok(Command::Delete(b"x")));
        assert_eq!(parse_command(b"Q a b c", 1), Ok(Command::Query(b"a b c")));
        assert_eq!(parse_command(b"F", 1), Ok(Command::Flush));
        assert_eq!(parse_command(b"Q", 1), Ok(Command::Query(b"")));
        assert_eq!(parse_command(b"Q ", 1), Ok(Command::Query(b"")));
        assert_eq!(parse_command(b"A  x", 1), Ok(Command::Add(b" x")));
    }

    #[test]
    fn parse_errors() {
        assert_eq!(
            parse_command(b"", 7),
            Err(ProtocolError::EmptyLine { line: 7 })
        );
        assert!(matches!(
            parse_command(b"Qfoo", 2),
            Err(ProtocolError::MissingSeparator { line: 2, .. })
        ));
        assert!(matches!(
            parse_command(b"X foo", 3),
            Err(ProtocolError::UnknownOpcode { line: 3, opcode: 'X', .. })
        ));
        assert!(matches!(
            parse_command(b"S", 4),
            Err(ProtocolError::UnknownOpcode { opcode: 'S', .. })
        ));
    }

    #[test]
    fn trims_terminators() {
        assert_eq!(trim_line(b"abc\n"), b"abc");
        assert_eq!(trim_line(b"abc\r\n"), b"abc");
        assert_eq!(trim_line(b"abc"), b"abc");
        assert_eq!(trim_line(b"\r\r\n"), b"\r");
    }

    #[test]
    fn end_to_end_scenario() {
        let input = "new york\nnew york city\nS\n\
                     Q new york city hall\n\
                     D new york\n\
                     Q new york city hall\n\
                     Q nothing here\n\
                     F\n";
        assert_eq!(run(input), "R\nnew york|new york city\nnew york city\n-1\n");
    }

    #[test]
    fn queries_see_preceding_mutations_only() {
        let input = "S\nQ a\nA a\nQ a\nD a\nQ a\nA a\nF\nQ a\n";
        assert_eq!(run(input), "R\n-1\na\n-1\na\n");
    }

    #[test]
    fn crlf_input() {
        let input = "cat\r\nS\r\nQ the cat\r\nF\r\n";
        assert_eq!(run(input), "R\ncat\n");
    }

    #[test]
    fn eof_during_load_is_clean() {
        let (out, summary) = run_with(DispatchConfig::sequential(), "a\nb\n").unwrap();
        assert_eq!(out, "");
        assert!(!summary.ready);
        assert_eq!(summary.loaded, 2);
    }

    #[test]
    fn eof_dispatches_pending_queries() {
        let (out, summary) =
            run_with(DispatchConfig::sequential(), "x\nS\nQ x\nQ y").unwrap();
        assert_eq!(out, "R\nx\n-1\n");
        assert_eq!(summary.segments, 1);
        assert_eq!(summary.queries, 2);
    }

    #[test]
    fn protocol_error_is_fatal() {
        let err = run_with(DispatchConfig::sequential(), "S\nQ a\nZ oops\nQ b\n").unwrap_err();
        match err {
            SessionError::Protocol(ProtocolError::UnknownOpcode { line, .. }) => assert_eq!(line, 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn queries_before_a_bad_line_are_answered() {
        let mut index = NgramIndex::new();
        let dispatcher = Dispatcher::new(DispatchConfig::sequential()).unwrap();
        let mut out = Vec::new();
        let err = Session::new(&mut index, &dispatcher, &mut out)
            .run("a\nS\nQ a\nQ a b\nZ oops\nQ a\n".as_bytes())
            .unwrap_err();

        assert!(matches!(
            err,
            SessionError::Protocol(ProtocolError::UnknownOpcode { line: 5, .. })
        ));
        assert_eq!(String::from_utf8(out).unwrap(), "R\na\na\n");
    }

    #[test]
    fn empty_line_is_fatal_after_load() {
        let err = run_with(DispatchConfig::sequential(), "S\n\nQ a\n").unwrap_err();
        assert!(matches!(
            err,
            SessionError::Protocol(ProtocolError::EmptyLine { line: 2 })
        ));
    }

    #[test]
    fn summary_counts() {
        let input = "a\nb\nS\nA c\nD a\nD zzz\nQ a b c\nQ c\nF\nQ b\nF\n";
        let (out, summary) = run_with(DispatchConfig::sequential(), input).unwrap();
        assert_eq!(out, "R\nb|c\nc\nb\n");
        assert_eq!(
            summary,
            SessionSummary {
                lines: 11,
                loaded: 2,
                ready: true,
                added: 1,
                deleted: 1,
                queries: 3,
                segments: 2,
                batches: 2,
            }
        );
    }

    #[test]
    fn strategies_agree_on_a_stream() {
        let mut input = String::from("new york\nnew\nyork city\nS\n");
        for i in 0..50 {
            match i % 5 {
                0 => input.push_str(&format!("A w{i} x\n")),
                1 => input.push_str("Q new york city w0 x w5 x\n"),
                2 => input.push_str(&format!("D w{} x\n", i - 2)),
                3 => input.push_str("Q w10 x new york\n"),
                _ => input.push_str("F\n"),
            }
        }

        let reference = run_with(DispatchConfig::sequential(), &input).unwrap().0;
        for strategy in [Strategy::Queries, Strategy::Positions, Strategy::Shards] {
            let config = DispatchConfig { strategy, threads: 3 };
            assert_eq!(run_with(config, &input).unwrap().0, reference, "{strategy}");
        }
    }
}
