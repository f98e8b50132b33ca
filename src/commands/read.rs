//! Read command implementation

use super::BarProgress;
use crate::config::TransferConfig;
use eeprog_serial::{Eeprog, Transport};
use std::fs;
use std::time::Instant;

/// Run the read command
pub fn run_read<T: Transport>(
    eeprog: &mut Eeprog<T>,
    config: &TransferConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let started = Instant::now();
    let mut progress = BarProgress::new(u64::from(config.request.length), "Reading")?;

    let data = match eeprog.read(&config.request, &mut progress) {
        Ok(data) => data,
        Err(e) => {
            progress.abandon("Read failed");
            return Err(e.into());
        }
    };
    progress.finish("Read complete");

    fs::write(&config.file, &data)?;

    println!(
        "Read {} bytes to \"{}\" in {:.2} seconds.",
        data.len(),
        config.file.display(),
        started.elapsed().as_secs_f64()
    );

    Ok(())
}
