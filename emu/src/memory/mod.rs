//! # Memory peripherals
//!
//! Every region reachable from the [`Bus`](crate::bus::Bus) implements [`IoDevice`].
//! Only the byte accessors are mandatory: halfword and word accesses are composed
//! little-endian from bytes unless a peripheral overrides them.
//!
//! ```text
//! 0x0000_0000 - 0x0000_3FFF  BIOS             16 KiB   (bios.rs)
//! 0x0200_0000 - 0x0203_FFFF  EWRAM            256 KiB  (wram.rs)
//! 0x0300_0000 - 0x0300_7FFF  IWRAM            32 KiB   (wram.rs)
//! 0x0400_0000 - 0x0400_03FF  IO registers     512 x 16 bit (io_registers.rs)
//! 0x0500_0000 - 0x07FF_FFFF  Palette/VRAM/OAM (owned by the LCD)
//! 0x0800_0000 - 0x0FFF_FFFF  Game Pak ROM     up to 32 MiB (cartridge.rs)
//! ```

pub mod bios;
pub mod cartridge;
pub mod io_registers;
pub mod wram;

/// Access contract shared by all bus peripherals.
pub trait IoDevice {
    fn read_at(&self, address: u32) -> u8;

    fn write_at(&mut self, address: u32, value: u8);

    fn read_half_word(&self, address: u32) -> u16 {
        u16::from_le_bytes([self.read_at(address), self.read_at(address.wrapping_add(1))])
    }

    fn read_word(&self, address: u32) -> u32 {
        u32::from(self.read_half_word(address))
            | (u32::from(self.read_half_word(address.wrapping_add(2))) << 16)
    }

    fn write_half_word(&mut self, address: u32, value: u16) {
        let [low, high] = value.to_le_bytes();
        self.write_at(address, low);
        self.write_at(address.wrapping_add(1), high);
    }

    fn write_word(&mut self, address: u32, value: u32) {
        self.write_half_word(address, value as u16);
        self.write_half_word(address.wrapping_add(2), (value >> 16) as u16);
    }
}
