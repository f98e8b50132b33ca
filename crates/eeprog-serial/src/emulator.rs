//! In-memory EEPROG firmware emulator
//!
//! [`EmulatedEeprom`] plays the device side of the line protocol over the
//! [`Transport`] trait, so the transfer engine can be driven without
//! hardware.

use std::collections::VecDeque;

use crate::error::{EeprogError, Result};
use crate::protocol::{
    address_string, decode_hex_line, encode_hex_line, BYTES_PER_LINE, CMD_CHUNK_READ,
    CMD_CHUNK_WRITE, CMD_VERSION, EEPROM_SIZE, GREETING, LINES_PER_PAGE, MAX_CHUNK_PAGES,
    PAGE_SIZE,
};
use crate::transport::Transport;

/// Configuration for the emulated programmer
#[derive(Debug, Clone)]
pub struct EmulatorConfig {
    /// Full version reply line
    pub version_line: String,
    /// Emit `EEPROG Ready` before the first reply
    pub greeting: bool,
    /// Reject any chunk command addressed here with `FAIL: device error`
    pub fail_at: Option<u32>,
    /// Reject write chunks after their payload has been received
    pub fail_after_payload: bool,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            version_line: "EEPROG v0.1.2".to_string(),
            greeting: false,
            fail_at: None,
            fail_after_payload: false,
        }
    }
}

struct PendingWrite {
    address: u32,
    lines_left: u32,
    data: Vec<u8>,
}

/// Emulated EEPROG programmer with a 32 KiB EEPROM, initially erased to 0xFF
pub struct EmulatedEeprom {
    config: EmulatorConfig,
    memory: Vec<u8>,
    incoming: Vec<u8>,
    outgoing: VecDeque<u8>,
    pending: Option<PendingWrite>,
    commands: Vec<String>,
    payload_lines: usize,
}

impl EmulatedEeprom {
    pub fn new(config: EmulatorConfig) -> Self {
        let mut emu = Self {
            memory: vec![0xFF; EEPROM_SIZE as usize],
            incoming: Vec::new(),
            outgoing: VecDeque::new(),
            pending: None,
            commands: Vec::new(),
            payload_lines: 0,
            config,
        };
        if emu.config.greeting {
            emu.reply(GREETING);
        }
        emu
    }

    pub fn new_default() -> Self {
        Self::new(EmulatorConfig::default())
    }

    /// EEPROM contents
    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    /// Preload EEPROM contents at `address`
    pub fn load(&mut self, address: usize, data: &[u8]) {
        self.memory[address..address + data.len()].copy_from_slice(data);
    }

    /// Every command line received so far, excluding payload lines
    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    /// Number of payload lines received for write chunks
    pub fn payload_lines(&self) -> usize {
        self.payload_lines
    }

    fn reply(&mut self, line: &str) {
        self.outgoing.extend(line.as_bytes());
        self.outgoing.extend(b"\r\n");
    }

    fn handle_line(&mut self, line: &str) {
        if let Some(mut pending) = self.pending.take() {
            self.payload_lines += 1;
            match decode_hex_line(line) {
                Ok(bytes) if bytes.len() == BYTES_PER_LINE => pending.data.extend(bytes),
                _ => {
                    self.reply("FAIL: malformed data line");
                    return;
                }
            }
            pending.lines_left -= 1;
            if pending.lines_left > 0 {
                self.pending = Some(pending);
                return;
            }
            if self.config.fail_after_payload {
                self.reply("FAIL: write verify error");
                return;
            }
            let start = pending.address as usize;
            self.memory[start..start + pending.data.len()].copy_from_slice(&pending.data);
            let msg = format!(
                "OKAY: wrote {} bytes at {}",
                pending.data.len(),
                address_string(pending.address)
            );
            self.reply(&msg);
            return;
        }

        self.commands.push(line.to_string());
        let words: Vec<&str> = line.split_whitespace().collect();
        match words.as_slice() {
            [CMD_VERSION] => {
                let version = self.config.version_line.clone();
                self.reply(&version);
            }
            [cmd @ (CMD_CHUNK_READ | CMD_CHUNK_WRITE), addr, pages] => {
                let (address, pages) = match self.parse_range(addr, pages) {
                    Ok(range) => range,
                    Err(msg) => {
                        self.reply(&format!("FAIL: {}", msg));
                        return;
                    }
                };
                if self.config.fail_at == Some(address) {
                    self.reply("FAIL: device error");
                    return;
                }
                if *cmd == CMD_CHUNK_READ {
                    self.reply(&format!("OKAY: reading {} pages", pages));
                    let start = address as usize;
                    let end = start + (pages * PAGE_SIZE) as usize;
                    let lines: Vec<String> = self.memory[start..end]
                        .chunks(BYTES_PER_LINE)
                        .map(encode_hex_line)
                        .collect();
                    for l in lines {
                        self.reply(&l);
                    }
                } else {
                    self.reply(&format!("OKAY: send {} pages", pages));
                    self.pending = Some(PendingWrite {
                        address,
                        lines_left: pages * LINES_PER_PAGE,
                        data: Vec::with_capacity((pages * PAGE_SIZE) as usize),
                    });
                }
            }
            _ => self.reply("FAIL: unknown command"),
        }
    }

    fn parse_range(&self, addr: &str, pages: &str) -> core::result::Result<(u32, u32), String> {
        let address =
            u32::from_str_radix(addr, 16).map_err(|_| format!("bad address {}", addr))?;
        let pages: u32 = pages.parse().map_err(|_| format!("bad page count {}", pages))?;
        if pages == 0 || pages > MAX_CHUNK_PAGES {
            return Err(format!("page count {} out of range", pages));
        }
        let in_range = address
            .checked_add(pages * PAGE_SIZE)
            .is_some_and(|end| end <= EEPROM_SIZE);
        if address % PAGE_SIZE != 0 || !in_range {
            return Err(format!("address {} out of range", addr));
        }
        Ok((address, pages))
    }
}

impl Transport for EmulatedEeprom {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.incoming.extend_from_slice(data);
        while let Some(pos) = self.incoming.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.incoming.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw).trim().to_string();
            self.handle_line(&line);
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.outgoing.is_empty() {
            return Err(EeprogError::Timeout);
        }
        let n = buf.len().min(self.outgoing.len());
        for (slot, byte) in buf.iter_mut().zip(self.outgoing.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(emu: &mut EmulatedEeprom) -> String {
        let mut out = Vec::new();
        let mut buf = [0u8; 64];
        while let Ok(n) = emu.read(&mut buf) {
            out.extend_from_slice(&buf[..n]);
        }
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_greeting_precedes_version() {
        let mut emu = EmulatedEeprom::new(EmulatorConfig {
            greeting: true,
            ..Default::default()
        });
        emu.write(b"version\n").unwrap();
        assert_eq!(drain(&mut emu), "EEPROG Ready\r\nEEPROG v0.1.2\r\n");
    }

    #[test]
    fn test_read_chunk_lines() {
        let mut emu = EmulatedEeprom::new_default();
        emu.load(0x40, &[0xA5; 64]);
        emu.write(b"chunkr 0040 1\n").unwrap();
        let out = drain(&mut emu);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("OKAY: "));
        assert!(lines[1..].iter().all(|l| *l == ["A5"; 16].join(" ")));
    }

    #[test]
    fn test_rejects_bad_ranges() {
        let mut emu = EmulatedEeprom::new_default();
        emu.write(b"chunkr 0010 1\nchunkr 7FC0 2\nchunkw 0000 9\nbogus\n")
            .unwrap();
        let out = drain(&mut emu);
        assert_eq!(out.lines().filter(|l| l.starts_with("FAIL: ")).count(), 4);
        assert_eq!(emu.commands().len(), 4);
    }

    #[test]
    fn test_rejects_address_past_u32() {
        let mut emu = EmulatedEeprom::new_default();
        emu.write(b"chunkr FFFFFFC0 1\nchunkw FFFFFFFF 8\n").unwrap();
        let out = drain(&mut emu);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.starts_with("FAIL: address")));
    }
}
