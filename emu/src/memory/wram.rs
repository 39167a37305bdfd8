use serde::{Deserialize, Serialize};

use crate::memory::IoDevice;

pub const EWRAM_SIZE: usize = 0x4_0000;
pub const IWRAM_SIZE: usize = 0x8000;

/// Working RAM, mirrored across its region through the size mask.
#[derive(Serialize, Deserialize)]
pub struct Wram {
    data: Vec<u8>,
    address_mask: usize,
}

impl Wram {
    /// `size` must be a power of two.
    #[must_use]
    pub fn new(size: usize) -> Self {
        debug_assert!(size.is_power_of_two());

        Self {
            data: vec![0; size],
            address_mask: size - 1,
        }
    }
}

impl IoDevice for Wram {
    fn read_at(&self, address: u32) -> u8 {
        self.data[address as usize & self.address_mask]
    }

    fn write_at(&mut self, address: u32, value: u8) {
        self.data[address as usize & self.address_mask] = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn check_mirroring() {
        let mut iwram = Wram::new(IWRAM_SIZE);

        iwram.write_word(0x0300_7FFC, 0xDEAD_BEEF);

        assert_eq!(iwram.read_word(0x0300_FFFC), 0xDEAD_BEEF);
        assert_eq!(iwram.read_at(0x0300_7FFF), 0xDE);
    }

    #[test]
    fn check_little_endian_composition() {
        let mut ewram = Wram::new(EWRAM_SIZE);

        ewram.write_half_word(0x0200_0010, 0x1234);
        ewram.write_at(0x0200_0012, 0x56);

        assert_eq!(ewram.read_word(0x0200_0010), 0x0056_1234);
    }
}
