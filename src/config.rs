use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(version, about = "Headless Game Boy Advance emulator.", long_about = None)]
pub struct Config {
    /// 16 KiB BIOS image.
    #[arg(long, value_name = "PATH")]
    pub bios: PathBuf,

    /// Cartridge image, an empty slot when omitted.
    #[arg(long, value_name = "PATH")]
    pub rom: Option<PathBuf>,

    /// Start at the cartridge entry point instead of running the BIOS boot code.
    #[arg(long)]
    pub skip_boot: bool,
}
