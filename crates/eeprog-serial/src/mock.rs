//! Scripted transport and log capture for unit tests

use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::Once;
use std::time::Duration;

use crate::error::{EeprogError, Result};
use crate::transport::Transport;

/// Replays canned reads one chunk per `read` call and records all writes
#[derive(Default)]
pub struct ScriptedTransport {
    reads: VecDeque<Vec<u8>>,
    written: Vec<u8>,
    read_timeouts: Vec<Duration>,
}

impl ScriptedTransport {
    pub fn new(chunks: &[&str]) -> Self {
        Self {
            reads: chunks.iter().map(|c| c.as_bytes().to_vec()).collect(),
            written: Vec::new(),
            read_timeouts: Vec::new(),
        }
    }

    pub fn written_lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.written)
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Every read timeout requested, in order
    pub fn read_timeouts(&self) -> &[Duration] {
        &self.read_timeouts
    }
}

impl Transport for ScriptedTransport {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.written.extend_from_slice(data);
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let Some(mut chunk) = self.reads.pop_front() else {
            return Err(EeprogError::Timeout);
        };
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            chunk.drain(..n);
            self.reads.push_front(chunk);
        }
        Ok(n)
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.read_timeouts.push(timeout);
        Ok(())
    }
}

thread_local! {
    static CAPTURED: RefCell<Option<Vec<(log::Level, String)>>> = const { RefCell::new(None) };
}

/// Records log output of the current thread while a capture is active
struct CaptureLogger;

impl log::Log for CaptureLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        CAPTURED.with(|c| {
            if let Some(records) = c.borrow_mut().as_mut() {
                records.push((record.level(), record.args().to_string()));
            }
        });
    }

    fn flush(&self) {}
}

static CAPTURE_LOGGER: CaptureLogger = CaptureLogger;
static INSTALL: Once = Once::new();

/// Run `f`, returning its result and every record it logged on this thread
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, Vec<(log::Level, String)>) {
    INSTALL.call_once(|| {
        if log::set_logger(&CAPTURE_LOGGER).is_ok() {
            log::set_max_level(log::LevelFilter::Trace);
        }
    });
    CAPTURED.with(|c| *c.borrow_mut() = Some(Vec::new()));
    let result = f();
    let records = CAPTURED.with(|c| c.borrow_mut().take()).unwrap_or_default();
    (result, records)
}
