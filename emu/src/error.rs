use std::fmt;

use crate::cpu::arm7tdmi::CpuError;
use crate::memory::bios::BIOS_SIZE;
use crate::memory::cartridge::MAX_ROM_SIZE;

/// Host-level failures. None of these are retried: configuration errors are reported
/// before any hardware exists and an illegal CPU mode aborts the emulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GbaError {
    /// The BIOS image must be exactly 16 KiB.
    InvalidBiosSize { actual: usize },

    /// The cartridge image is bigger than the 32 MiB address window.
    RomTooLarge { actual: usize },

    /// A mode value outside the legal set reached CPSR/SPSR.
    UndefinedMode(u32),
}

impl fmt::Display for GbaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidBiosSize { actual } => write!(
                f,
                "wrong BIOS ROM size: expected {BIOS_SIZE} bytes, got {actual}"
            ),
            Self::RomTooLarge { actual } => write!(
                f,
                "ROM file too big: {actual} bytes (max {MAX_ROM_SIZE})"
            ),
            Self::UndefinedMode(mode) => write!(f, "Undefined mode 0b{mode:05b}"),
        }
    }
}

impl std::error::Error for GbaError {}

impl From<CpuError> for GbaError {
    fn from(err: CpuError) -> Self {
        match err {
            CpuError::UndefinedMode(mode) => Self::UndefinedMode(mode),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn check_messages() {
        assert_eq!(
            GbaError::InvalidBiosSize { actual: 12 }.to_string(),
            "wrong BIOS ROM size: expected 16384 bytes, got 12"
        );
        assert_eq!(
            GbaError::from(CpuError::UndefinedMode(0b00111)).to_string(),
            "Undefined mode 0b00111"
        );
    }
}
