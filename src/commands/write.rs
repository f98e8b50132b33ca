//! Write command implementation

use super::BarProgress;
use crate::config::TransferConfig;
use eeprog_serial::{Eeprog, Transport};
use std::fs;
use std::time::Instant;

/// Run the write command
pub fn run_write<T: Transport>(
    eeprog: &mut Eeprog<T>,
    config: &TransferConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let started = Instant::now();
    let data = fs::read(&config.file)?;
    log::debug!("Read {} bytes from {:?}", data.len(), config.file);

    let mut progress = BarProgress::new(u64::from(config.request.length), "Writing")?;
    if let Err(e) = eeprog.write(&config.request, &data, &mut progress) {
        progress.abandon("Write failed");
        return Err(e.into());
    }
    progress.finish("Write complete");

    println!(
        "Wrote {} bytes from \"{}\" in {:.2} seconds.",
        config.request.length,
        config.file.display(),
        started.elapsed().as_secs_f64()
    );

    Ok(())
}
