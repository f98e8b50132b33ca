//! Line framing and response matching
//!
//! [`LineChannel`] owns a [`Transport`] together with its read buffer and
//! exposes the protocol's only framing unit, the newline-terminated line.
//! Incoming lines are classified against an ordered list of
//! [`Expectation`]s; the first alternative that matches wins.

use core::fmt;
use std::time::{Duration, Instant};

use regex::Regex;

use crate::error::{EeprogError, Result};
use crate::protocol::SERIAL_TIMEOUT;
use crate::transport::Transport;

/// How a single alternative recognizes a line
#[derive(Debug, Clone)]
pub enum Matcher {
    /// The whole line must equal this string
    Exact(String),
    /// The pattern must match somewhere in the line
    Pattern(Regex),
}

impl Matcher {
    pub fn exact(s: &str) -> Self {
        Matcher::Exact(s.to_string())
    }

    pub fn pattern(re: &str) -> Result<Self> {
        Ok(Matcher::Pattern(Regex::new(re)?))
    }

    /// Match `line`, returning the matched text followed by any capture groups
    fn captures(&self, line: &str) -> Option<Vec<String>> {
        match self {
            Matcher::Exact(s) => (line == s.as_str()).then(|| vec![line.to_string()]),
            Matcher::Pattern(re) => re.captures(line).map(|caps| {
                caps.iter()
                    .map(|m| m.map_or_else(String::new, |m| m.as_str().to_string()))
                    .collect()
            }),
        }
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Exact(s) => write!(f, "{:?}", s),
            Matcher::Pattern(re) => write!(f, "/{}/", re.as_str()),
        }
    }
}

/// One tagged alternative of an expectation set
#[derive(Debug, Clone)]
pub struct Expectation<K> {
    pub tag: K,
    pub matcher: Matcher,
}

impl<K> Expectation<K> {
    pub fn new(tag: K, matcher: Matcher) -> Self {
        Self { tag, matcher }
    }
}

/// A line that matched one of the alternatives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matched<K> {
    /// Tag of the winning alternative
    pub tag: K,
    /// The full line as received (terminator stripped)
    pub line: String,
    /// Matched text at index 0, capture groups after it
    pub captures: Vec<String>,
}

/// Result of classifying one incoming line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineMatch<K> {
    Matched(Matched<K>),
    /// No alternative matched; carries the raw line
    Unmatched(String),
}

/// Classify `line` against `expectations` in order
pub fn classify<K: Copy>(line: &str, expectations: &[Expectation<K>]) -> LineMatch<K> {
    for exp in expectations {
        if let Some(captures) = exp.matcher.captures(line) {
            return LineMatch::Matched(Matched {
                tag: exp.tag,
                line: line.to_string(),
                captures,
            });
        }
    }
    LineMatch::Unmatched(line.to_string())
}

/// Render an expectation set for error messages
pub fn describe<K: fmt::Debug>(expectations: &[Expectation<K>]) -> String {
    let items: Vec<String> = expectations
        .iter()
        .map(|e| format!("{:?} => {}", e.tag, e.matcher))
        .collect();
    format!("{{ {} }}", items.join(", "))
}

/// Line-oriented wrapper around a byte transport
pub struct LineChannel<T: Transport> {
    transport: T,
    read_buffer: Vec<u8>,
    timeout: Duration,
    debug: bool,
}

impl<T: Transport> LineChannel<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            read_buffer: Vec::new(),
            timeout: SERIAL_TIMEOUT,
            debug: false,
        }
    }

    /// Mirror every line sent and received to the log at info level
    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    /// Override the per-line read timeout (default [`SERIAL_TIMEOUT`])
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Access the underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Read one line, blocking until its newline arrives or the timeout elapses
    ///
    /// The timeout bounds the whole line, not each transport read. Surrounding
    /// whitespace, including the `\r\n` terminator, is stripped.
    pub fn read_line(&mut self) -> Result<String> {
        let deadline = Instant::now() + self.timeout;
        loop {
            if let Some(pos) = self.read_buffer.iter().position(|&b| b == b'\n') {
                let raw: Vec<u8> = self.read_buffer.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&raw).trim().to_string();
                self.mirror("READ ", &line);
                return Ok(line);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(EeprogError::Timeout);
            }
            self.transport.set_read_timeout(remaining)?;

            let mut chunk = [0u8; 256];
            let n = self.transport.read(&mut chunk)?;
            self.read_buffer.extend_from_slice(&chunk[..n]);
        }
    }

    /// Write one line, appending the newline if absent
    pub fn write_line(&mut self, text: &str) -> Result<()> {
        self.mirror("WRITE", text.trim_end());
        if text.ends_with('\n') {
            self.transport.write(text.as_bytes())?;
        } else {
            let mut data = Vec::with_capacity(text.len() + 1);
            data.extend_from_slice(text.as_bytes());
            data.push(b'\n');
            self.transport.write(&data)?;
        }
        self.transport.flush()
    }

    /// Read exactly one line and classify it
    pub fn expect<K: Copy>(&mut self, expectations: &[Expectation<K>]) -> Result<LineMatch<K>> {
        let line = self.read_line()?;
        Ok(classify(&line, expectations))
    }

    /// Like [`expect`](Self::expect), but an unmatched line is an error
    pub fn expect_or_fail<K: Copy + fmt::Debug>(
        &mut self,
        expectations: &[Expectation<K>],
    ) -> Result<Matched<K>> {
        match self.expect(expectations)? {
            LineMatch::Matched(m) => Ok(m),
            LineMatch::Unmatched(line) => Err(EeprogError::ProtocolMismatch {
                line,
                expected: describe(expectations),
            }),
        }
    }

    fn mirror(&self, direction: &str, line: &str) {
        if self.debug {
            log::info!("Serial {} | {}", direction, line);
        } else {
            log::trace!("Serial {} | {}", direction, line);
        }
    }
}
