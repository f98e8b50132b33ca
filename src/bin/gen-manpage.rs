//! Man page generator for eeprog
//!
//! Usage: cargo run --bin gen-manpage -- [output-dir]

use clap::CommandFactory;
use std::fs;
use std::path::PathBuf;

#[path = "../cli.rs"]
#[allow(dead_code)]
mod cli;

fn main() -> std::io::Result<()> {
    let output_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("man"));

    fs::create_dir_all(&output_dir)?;

    let cmd = cli::Cli::command();
    let man = clap_mangen::Man::new(cmd.clone());
    let mut buffer = Vec::new();
    man.render(&mut buffer)?;

    let output_path = output_dir.join("eeprog.1");
    fs::write(&output_path, buffer)?;

    for sub in cmd.get_subcommands() {
        let page = clap_mangen::Man::new(sub.clone());
        let mut buffer = Vec::new();
        page.render(&mut buffer)?;
        fs::write(output_dir.join(format!("eeprog-{}.1", sub.get_name())), buffer)?;
    }

    println!("Man pages generated in: {}", output_dir.display());
    println!("\nTo view the man page:");
    println!("  man -l {}", output_path.display());

    Ok(())
}
