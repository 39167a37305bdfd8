use serde::{Deserialize, Serialize};

use crate::error::GbaError;
use crate::memory::IoDevice;

pub const BIOS_SIZE: usize = 0x4000;

/// System ROM. Writes are ignored.
#[derive(Serialize, Deserialize)]
pub struct Bios {
    data: Vec<u8>,
}

impl Bios {
    pub fn new(data: Vec<u8>) -> Result<Self, GbaError> {
        if data.len() != BIOS_SIZE {
            return Err(GbaError::InvalidBiosSize { actual: data.len() });
        }

        Ok(Self { data })
    }
}

impl Default for Bios {
    /// A zero-filled image, enough for code that starts from the cartridge.
    fn default() -> Self {
        Self {
            data: vec![0; BIOS_SIZE],
        }
    }
}

impl IoDevice for Bios {
    fn read_at(&self, address: u32) -> u8 {
        self.data[address as usize & (BIOS_SIZE - 1)]
    }

    fn write_at(&mut self, _address: u32, _value: u8) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn check_size_is_enforced() {
        assert_eq!(
            Bios::new(vec![0; 100]).err(),
            Some(GbaError::InvalidBiosSize { actual: 100 })
        );
        assert!(Bios::new(vec![0; BIOS_SIZE + 1]).is_err());
    }

    #[test]
    fn check_read_only() {
        let mut data = vec![0; BIOS_SIZE];
        data[0..4].copy_from_slice(&0xEA00_0018_u32.to_le_bytes());
        let mut bios = Bios::new(data).unwrap();

        bios.write_word(0, 0);

        assert_eq!(bios.read_word(0), 0xEA00_0018);
        assert_eq!(bios.read_half_word(2), 0xEA00);
    }
}
