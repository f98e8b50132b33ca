//! CLI command implementations
//!
//! Both commands work against any `Transport`, so they run the same way
//! over a serial port or the in-memory emulator.

pub mod read;
pub mod write;

use crate::config::{Target, TransferConfig};
use eeprog_serial::{Direction, EmulatedEeprom, Eeprog, LineChannel, TransferProgress, Transport};
use indicatif::{ProgressBar, ProgressStyle};

/// Connect to the configured target and run the transfer
///
/// The connection is dropped, closing any serial port, before this returns.
pub fn execute(config: &TransferConfig, debug_serial: bool) -> Result<(), Box<dyn std::error::Error>> {
    match &config.target {
        Target::Serial(device) => {
            let mut eeprog = eeprog_serial::open_serial(
                device,
                Some(config.baud),
                config.timeout,
                debug_serial,
            )?;
            transfer(&mut eeprog, config)
        }
        Target::Emulated => {
            let mut channel = LineChannel::new(EmulatedEeprom::new_default());
            channel.set_timeout(config.timeout);
            channel.set_debug(debug_serial);
            let mut eeprog = Eeprog::with_channel(channel)?;
            transfer(&mut eeprog, config)
        }
    }
}

fn transfer<T: Transport>(
    eeprog: &mut Eeprog<T>,
    config: &TransferConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Firmware version {}", eeprog.version());
    match config.mode {
        Direction::Read => read::run_read(eeprog, config),
        Direction::Write => write::run_write(eeprog, config),
    }
}

/// Progress reporter using an indicatif progress bar
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    /// Create a byte progress bar labelled with `phase`
    pub fn new(total: u64, phase: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new(total);
        bar.set_style(
            ProgressStyle::default_bar()
                .template(&format!(
                    "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{bytes}}/{{total_bytes}} ({{bytes_per_sec}}, {{eta}}) {}",
                    phase
                ))?
                .progress_chars("#>-"),
        );
        Ok(Self { bar })
    }

    pub fn finish(&self, message: &'static str) {
        self.bar.finish_with_message(message);
    }

    pub fn abandon(&self, message: &'static str) {
        self.bar.abandon_with_message(message);
    }
}

impl TransferProgress for BarProgress {
    fn transferred(&mut self, done: usize, _total: usize) {
        self.bar.set_position(done as u64);
    }
}
