mod config;

use std::fs;
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use emu::gba::Gba;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// Frames between two progress messages, about one second of emulated time.
const FRAMES_PER_REPORT: u64 = 60;

fn read_file(path: &Path) -> Result<Vec<u8>, String> {
    fs::read(path).map_err(|err| format!("cannot read {}: {err}", path.display()))
}

fn main() -> ExitCode {
    let (writer, _guard) = tracing_appender::non_blocking(std::io::stderr());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(writer)
        .init();

    let config = Config::parse();

    let bios = match read_file(&config.bios) {
        Ok(bios) => bios,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let rom = match config.rom.as_deref().map(read_file).transpose() {
        Ok(rom) => rom,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let mut gba = match Gba::new(bios, rom, config.skip_boot) {
        Ok(gba) => gba,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!("gbaemu v{}", env!("CARGO_PKG_VERSION"));

    // No front end: frames are produced and dropped until the process is stopped.
    loop {
        if let Err(err) = gba.run_frames(FRAMES_PER_REPORT) {
            tracing::error!("emulation stopped: {err}");
            return ExitCode::FAILURE;
        }

        tracing::debug!("{} frames", gba.frame_count());
    }
}
