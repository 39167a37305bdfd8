use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::error::GbaError;
use crate::memory::IoDevice;

pub const MAX_ROM_SIZE: usize = 0x0200_0000;

/// Backup chip advertised by the library ID string the SDK links into the ROM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaveType {
    /// `SRAM_V`: 32 KiB SRAM.
    Sram,
    /// `FLASH_V` / `FLASH512_V`: 64 KiB flash.
    Flash512,
    /// `FLASH1M_V`: 128 KiB flash.
    Flash1M,
}

const SAVE_TYPE_SIGNATURES: [(&[u8], SaveType); 4] = [
    (b"SRAM_V", SaveType::Sram),
    (b"FLASH_V", SaveType::Flash512),
    (b"FLASH512_V", SaveType::Flash512),
    (b"FLASH1M_V", SaveType::Flash1M),
];

/// Game Pak ROM.
///
/// The image is zero-padded up to the next power of two, the ROM is visible in the
/// three wait-state windows (0x08-0x0D) and writes are ignored.
#[derive(Default, Serialize, Deserialize)]
pub struct Cartridge {
    rom: Vec<u8>,
}

impl Cartridge {
    pub fn new(mut rom: Vec<u8>) -> Result<Self, GbaError> {
        if rom.len() > MAX_ROM_SIZE {
            return Err(GbaError::RomTooLarge { actual: rom.len() });
        }

        if !rom.is_empty() {
            rom.resize(rom.len().next_power_of_two(), 0);
        }

        Ok(Self { rom })
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.rom.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.rom.is_empty()
    }

    /// Looks for the backup library signature on word boundaries.
    #[must_use]
    pub fn detect_save_type(&self) -> Option<SaveType> {
        SAVE_TYPE_SIGNATURES
            .iter()
            .filter(|(signature, _)| {
                (0..self.rom.len())
                    .step_by(4)
                    .any(|offset| self.rom[offset..].starts_with(signature))
            })
            .map(|(_, save_type)| *save_type)
            .last()
    }
}

impl IoDevice for Cartridge {
    fn read_at(&self, address: u32) -> u8 {
        match address.get_bits(24..=27) {
            0x8..=0xD => self
                .rom
                .get(address as usize & (MAX_ROM_SIZE - 1))
                .copied()
                .unwrap_or(0),
            _ => 0,
        }
    }

    fn write_at(&mut self, _address: u32, _value: u8) {}
}
