//! eeprog - Host-side driver for the EEPROG EEPROM programmer
//!
//! Reads or writes a page-aligned range of a 32 KiB parallel EEPROM through
//! a microcontroller running the EEPROG firmware.
//!
//! # Architecture
//!
//! The binary only resolves options and moves files. Everything that talks
//! to the programmer lives in the `eeprog-serial` crate:
//! - **Line transport** - newline framing and ordered response matching
//!   over a serial port, or over the in-memory emulator with `--emulate`
//! - **Transfer engine** - version handshake and paged chunk transfers

mod cli;
mod commands;
mod config;

use clap::Parser;
use cli::{Cli, Commands};
use config::TransferConfig;
use eeprog_serial::Direction;

/// Default log filter for the given `-v` count
fn log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize logger; RUST_LOG still takes precedence
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_filter(cli.verbose)),
    )
    .init();

    if let Err(e) = run(cli) {
        eprintln!("ERROR: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let (mode, args) = match &cli.command {
        Commands::Read { transfer } => (Direction::Read, transfer),
        Commands::Write { transfer } => (Direction::Write, transfer),
    };

    let config = TransferConfig::resolve(mode, args)?;
    log::info!(
        "{} {} bytes at 0x{:04X} via {}",
        match mode {
            Direction::Read => "Reading",
            Direction::Write => "Writing",
        },
        config.request.length,
        config.request.start_address,
        config.target
    );

    commands::execute(&config, cli.debug_serial)
}
