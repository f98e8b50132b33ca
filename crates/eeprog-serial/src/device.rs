//! EEPROG transfer engine
//!
//! This module provides the main `Eeprog` struct. Constructing one performs
//! the version handshake; a value of this type therefore always talks to
//! compatible firmware. Transfers are strictly sequential: a chunk command
//! is only sent after the previous chunk has been acknowledged.

use std::thread;

use crate::error::{EeprogError, Result};
use crate::line::{Expectation, LineChannel, Matched, Matcher};
use crate::protocol::*;
use crate::transport::Transport;

/// Tags for the firmware replies the engine distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reply {
    Intro,
    Version,
    Okay,
    Fail,
}

/// Progress callback invoked after every completed chunk
pub trait TransferProgress {
    /// `done` of `total` bytes have been transferred
    fn transferred(&mut self, done: usize, total: usize);
}

impl TransferProgress for () {
    fn transferred(&mut self, _done: usize, _total: usize) {}
}

/// EEPROG programmer connection
pub struct Eeprog<T: Transport> {
    channel: LineChannel<T>,
    version: FirmwareVersion,
    status: [Expectation<Reply>; 2],
}

impl<T: Transport> Eeprog<T> {
    /// Create a new Eeprog instance over a raw transport
    pub fn new(transport: T) -> Result<Self> {
        Self::with_channel(LineChannel::new(transport))
    }

    /// Create a new Eeprog instance over a configured line channel
    ///
    /// This performs the handshake:
    /// 1. Send `version`
    /// 2. Accept either the boot greeting or the version reply
    /// 3. After a greeting, require the version reply on the next line
    /// 4. Check the version against the supported window
    pub fn with_channel(mut channel: LineChannel<T>) -> Result<Self> {
        let status = [
            Expectation::new(Reply::Okay, Matcher::pattern(OKAY_PATTERN)?),
            Expectation::new(Reply::Fail, Matcher::pattern(FAIL_PATTERN)?),
        ];
        let version = handshake(&mut channel)?;
        log::debug!("eeprog: Firmware version {}", version);

        Ok(Self {
            channel,
            version,
            status,
        })
    }

    /// Firmware version reported during the handshake
    pub fn version(&self) -> FirmwareVersion {
        self.version
    }

    /// Access the underlying transport
    pub fn transport(&self) -> &T {
        self.channel.transport()
    }

    /// Read the requested range into a new buffer
    pub fn read(
        &mut self,
        request: &TransferRequest,
        progress: &mut dyn TransferProgress,
    ) -> Result<Vec<u8>> {
        check_direction(request, Direction::Read)?;
        let total = request.length as usize;
        let mut buffer = Vec::with_capacity(total);

        for chunk in request.chunks() {
            self.read_chunk(&chunk, &mut buffer)?;
            progress.transferred(buffer.len(), total);
        }

        Ok(buffer)
    }

    /// Write `data` to the requested range
    ///
    /// Data shorter than the request is zero-padded; data beyond it is
    /// ignored.
    pub fn write(
        &mut self,
        request: &TransferRequest,
        data: &[u8],
        progress: &mut dyn TransferProgress,
    ) -> Result<()> {
        check_direction(request, Direction::Write)?;
        let total = request.length as usize;

        let mut buffer = data[..data.len().min(total)].to_vec();
        if buffer.len() < total {
            log::warn!(
                "Data size ({} bytes) is smaller than requested write size ({} bytes). Will write zero padded.",
                buffer.len(),
                total
            );
            buffer.resize(total, 0x00);
        }

        let mut offset = 0usize;
        for chunk in request.chunks() {
            let end = offset + chunk.byte_len();
            self.write_chunk(&chunk, &buffer[offset..end])?;
            offset = end;
            progress.transferred(offset, total);
        }

        Ok(())
    }

    // ---- Protocol implementation ----

    fn read_chunk(&mut self, chunk: &Chunk, buffer: &mut Vec<u8>) -> Result<()> {
        self.send_chunk_command(chunk, Direction::Read)?;

        let start = buffer.len();
        for _ in 0..chunk.line_count() {
            let line = self.channel.read_line()?;
            buffer.extend(decode_hex_line(&line)?);
        }

        let received = buffer.len() - start;
        if received != chunk.byte_len() {
            return Err(EeprogError::InvalidResponse(format!(
                "expected {} bytes for chunk at {}, got {}",
                chunk.byte_len(),
                address_string(chunk.address),
                received
            )));
        }
        Ok(())
    }

    fn write_chunk(&mut self, chunk: &Chunk, data: &[u8]) -> Result<()> {
        self.send_chunk_command(chunk, Direction::Write)?;

        for group in data.chunks(BYTES_PER_LINE) {
            self.channel.write_line(&encode_hex_line(group))?;
            thread::sleep(WRITE_LINE_DELAY);
        }

        let reply = self.channel.expect_or_fail(&self.status)?;
        check_status(reply, Direction::Write)?;
        log::debug!("eeprog: Chunk at {} written", address_string(chunk.address));
        Ok(())
    }

    /// Send a chunk command and wait for its OKAY/FAIL acknowledgement
    fn send_chunk_command(&mut self, chunk: &Chunk, direction: Direction) -> Result<()> {
        let command = chunk.command(direction);
        log::debug!("eeprog: {}", command);
        self.channel.write_line(&command)?;

        let reply = self.channel.expect_or_fail(&self.status)?;
        check_status(reply, direction)
    }
}

fn handshake<T: Transport>(channel: &mut LineChannel<T>) -> Result<FirmwareVersion> {
    let version_matcher = Matcher::pattern(VERSION_PATTERN)?;
    let first_line = [
        Expectation::new(Reply::Intro, Matcher::exact(GREETING)),
        Expectation::new(Reply::Version, version_matcher.clone()),
    ];

    channel.write_line(CMD_VERSION)?;
    let mut reply = channel.expect_or_fail(&first_line)?;

    // The greeting only consumes a line; the version reply follows it.
    if reply.tag == Reply::Intro {
        log::debug!("eeprog: Got boot greeting");
        reply = channel.expect_or_fail(&[Expectation::new(Reply::Version, version_matcher)])?;
    }

    let version = parse_version(&reply)?;
    version.check_supported()?;
    Ok(version)
}

fn parse_version(reply: &Matched<Reply>) -> Result<FirmwareVersion> {
    let field = |i: usize| -> Result<u32> {
        reply
            .captures
            .get(i)
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| EeprogError::InvalidResponse(format!("bad version line {:?}", reply.line)))
    };
    Ok(FirmwareVersion::new(field(1)?, field(2)?, field(3)?))
}

fn check_status(reply: Matched<Reply>, direction: Direction) -> Result<()> {
    match reply.tag {
        Reply::Okay => Ok(()),
        _ => {
            let message = reply.captures.into_iter().next().unwrap_or(reply.line);
            Err(EeprogError::ChunkFailed {
                operation: direction.name(),
                message,
            })
        }
    }
}

fn check_direction(request: &TransferRequest, expected: Direction) -> Result<()> {
    if request.direction != expected {
        return Err(EeprogError::InvalidRequest(format!(
            "{} request passed to {}",
            request.direction, expected
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emulator::{EmulatedEeprom, EmulatorConfig};
    use crate::mock::{capture_logs, ScriptedTransport};

    fn emulator(config: EmulatorConfig) -> Eeprog<EmulatedEeprom> {
        Eeprog::new(EmulatedEeprom::new(config)).unwrap()
    }

    fn with_version(line: &str) -> EmulatorConfig {
        EmulatorConfig {
            version_line: line.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_handshake_with_and_without_greeting() {
        let plain = emulator(with_version("EEPROG v0.1.0"));
        let greeted = emulator(EmulatorConfig {
            greeting: true,
            ..with_version("EEPROG v0.1.0")
        });
        assert_eq!(plain.version(), FirmwareVersion::new(0, 1, 0));
        assert_eq!(greeted.version(), plain.version());
        assert_eq!(greeted.transport().commands(), ["version"]);
    }

    #[test]
    fn test_handshake_rejects_unsupported_versions() {
        let too_old = Eeprog::new(EmulatedEeprom::new(with_version("EEPROG v0.0.9")));
        assert!(matches!(too_old, Err(EeprogError::VersionTooOld { .. })));

        let too_new = Eeprog::new(EmulatedEeprom::new(with_version("EEPROG v1.0.0")));
        assert!(matches!(too_new, Err(EeprogError::VersionTooNew(_))));
    }

    #[test]
    fn test_handshake_mismatch_is_fatal() {
        let result = Eeprog::new(ScriptedTransport::new(&["EEPROG Ready\n", "hello\n"]));
        match result {
            Err(EeprogError::ProtocolMismatch { line, .. }) => assert_eq!(line, "hello"),
            Err(e) => panic!("unexpected error {}", e),
            Ok(_) => panic!("handshake accepted garbage"),
        }
    }

    #[test]
    fn test_handshake_timeout() {
        let result = Eeprog::new(ScriptedTransport::new(&[]));
        assert!(matches!(result, Err(EeprogError::Timeout)));
    }

    #[test]
    fn test_read_range() {
        let mut emu = EmulatedEeprom::new_default();
        let pattern: Vec<u8> = (0..=255u8).cycle().take(1024).collect();
        emu.load(0x0140, &pattern);
        let mut eeprog = Eeprog::new(emu).unwrap();

        let request = TransferRequest::new(Direction::Read, 0x0140, 640).unwrap();
        let data = eeprog.read(&request, &mut ()).unwrap();

        assert_eq!(data, &pattern[..640]);
        assert_eq!(
            eeprog.transport().commands(),
            ["version", "chunkr 0140 8", "chunkr 0340 2"]
        );
    }

    #[test]
    fn test_read_fail_aborts() {
        let mut eeprog = emulator(EmulatorConfig {
            fail_at: Some(0x0200),
            ..Default::default()
        });
        let request = TransferRequest::new(Direction::Read, 0, 2048).unwrap();
        match eeprog.read(&request, &mut ()) {
            Err(EeprogError::ChunkFailed { operation, message }) => {
                assert_eq!(operation, "read");
                assert_eq!(message, "FAIL: device error");
            }
            other => panic!("unexpected {:?}", other.map(|d| d.len())),
        }
        assert_eq!(
            eeprog.transport().commands(),
            ["version", "chunkr 0000 8", "chunkr 0200 8"]
        );
    }

    #[test]
    fn test_read_short_payload_is_error() {
        let mut eeprog = Eeprog::new(ScriptedTransport::new(&[
            "EEPROG v0.1.0\n",
            "OKAY: reading 1 pages\n",
            "00 01 02\n",
            "00\n",
            "00\n",
            "00\n",
        ]))
        .unwrap();
        let request = TransferRequest::new(Direction::Read, 0, 64).unwrap();
        assert!(matches!(
            eeprog.read(&request, &mut ()),
            Err(EeprogError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_write_range() {
        let mut eeprog = emulator(EmulatorConfig::default());
        let data: Vec<u8> = (0..576u32).map(|i| (i * 7) as u8).collect();
        let request = TransferRequest::new(Direction::Write, 0x1000, 576).unwrap();

        let mut seen = Vec::new();
        struct Record<'a>(&'a mut Vec<usize>);
        impl TransferProgress for Record<'_> {
            fn transferred(&mut self, done: usize, _total: usize) {
                self.0.push(done);
            }
        }
        eeprog.write(&request, &data, &mut Record(&mut seen)).unwrap();

        let emu = eeprog.transport();
        assert_eq!(&emu.memory()[0x1000..0x1000 + 576], &data[..]);
        assert_eq!(emu.commands(), ["version", "chunkw 1000 8", "chunkw 1200 1"]);
        assert_eq!(emu.payload_lines(), 576 / 16);
        assert_eq!(seen, [512, 576]);
    }

    #[test]
    fn test_write_pads_short_data_with_zeros() {
        let mut eeprog = emulator(EmulatorConfig::default());
        let request = TransferRequest::new(Direction::Write, 0, 128).unwrap();
        eeprog.write(&request, &[0xAB; 64], &mut ()).unwrap();

        let memory = eeprog.transport().memory();
        assert!(memory[..64].iter().all(|&b| b == 0xAB));
        assert!(memory[64..128].iter().all(|&b| b == 0x00));
        assert!(memory[128..].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_write_warns_only_when_padding() {
        let request = TransferRequest::new(Direction::Write, 0, 128).unwrap();

        let mut eeprog = emulator(EmulatorConfig::default());
        let (result, records) = capture_logs(|| eeprog.write(&request, &[0xAB; 64], &mut ()));
        result.unwrap();
        let warnings: Vec<_> = records
            .iter()
            .filter(|(level, _)| *level == log::Level::Warn)
            .collect();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].1.contains("64 bytes"));
        assert!(warnings[0].1.contains("128 bytes"));

        let mut eeprog = emulator(EmulatorConfig::default());
        let (result, records) = capture_logs(|| eeprog.write(&request, &[0xAB; 128], &mut ()));
        result.unwrap();
        assert!(records.iter().all(|(level, _)| *level != log::Level::Warn));
    }

    #[test]
    fn test_failures_are_returned_not_logged() {
        let (result, records) = capture_logs(|| {
            let mut eeprog = emulator(EmulatorConfig {
                fail_at: Some(0),
                ..Default::default()
            });
            let request = TransferRequest::new(Direction::Read, 0, 64).unwrap();
            eeprog.read(&request, &mut ())
        });
        assert!(matches!(result, Err(EeprogError::ChunkFailed { .. })));

        let (mismatch, more) = capture_logs(|| {
            Eeprog::new(ScriptedTransport::new(&["garbage\n"])).map(|e| e.version())
        });
        assert!(matches!(mismatch, Err(EeprogError::ProtocolMismatch { .. })));

        let (too_new, rest) = capture_logs(|| {
            Eeprog::new(EmulatedEeprom::new(with_version("EEPROG v1.0.0"))).map(|e| e.version())
        });
        assert!(matches!(too_new, Err(EeprogError::VersionTooNew(_))));

        assert!(records
            .iter()
            .chain(&more)
            .chain(&rest)
            .all(|(level, _)| *level != log::Level::Error));
    }

    #[test]
    fn test_write_fail_stops_further_chunks() {
        let mut eeprog = emulator(EmulatorConfig {
            fail_at: Some(0x0200),
            ..Default::default()
        });
        let request = TransferRequest::new(Direction::Write, 0, 2048).unwrap();
        let result = eeprog.write(&request, &[0x11; 2048], &mut ());

        match result {
            Err(EeprogError::ChunkFailed { operation, message }) => {
                assert_eq!(operation, "write");
                assert_eq!(message, "FAIL: device error");
            }
            other => panic!("unexpected {:?}", other),
        }
        let emu = eeprog.transport();
        assert_eq!(emu.commands(), ["version", "chunkw 0000 8", "chunkw 0200 8"]);
        assert_eq!(emu.payload_lines(), 32);
    }

    #[test]
    fn test_write_fail_after_payload() {
        let mut eeprog = emulator(EmulatorConfig {
            fail_after_payload: true,
            ..Default::default()
        });
        let request = TransferRequest::new(Direction::Write, 0, 128).unwrap();
        assert!(matches!(
            eeprog.write(&request, &[0u8; 128], &mut ()),
            Err(EeprogError::ChunkFailed { .. })
        ));
        assert_eq!(eeprog.transport().commands(), ["version", "chunkw 0000 2"]);
    }

    #[test]
    fn test_direction_mismatch() {
        let mut eeprog = emulator(EmulatorConfig::default());
        let request = TransferRequest::new(Direction::Write, 0, 64).unwrap();
        assert!(matches!(
            eeprog.read(&request, &mut ()),
            Err(EeprogError::InvalidRequest(_))
        ));
    }
}
