//! LCD Memory - VRAM, Palette RAM, and OAM.
//!
//! # Memory Map
//!
//! | Region          | Address Range           | Size    | Purpose                          |
//! |-----------------|-------------------------|---------|----------------------------------|
//! | BG Palette RAM  | 0x0500_0000-0x0500_01FF | 512 B   | Background color palettes        |
//! | OBJ Palette RAM | 0x0500_0200-0x0500_03FF | 512 B   | Sprite color palettes            |
//! | VRAM            | 0x0600_0000-0x0601_7FFF | 96 KB   | Tile data, tilemaps and bitmaps  |
//! | OAM             | 0x0700_0000-0x0700_03FF | 1 KB    | Sprite attributes                |
//!
//! Palette RAM and OAM mirror every 1 KiB. VRAM mirrors every 128 KiB, the upper
//! 32 KiB of each mirror folding back onto the last 32 KiB of VRAM.
//!
//! The data bus of these regions is 16 bits wide: a byte written to palette RAM or
//! VRAM lands in both halves of the addressed halfword, and byte writes to OAM are
//! dropped.

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::memory::IoDevice;

const PALETTE_RAM_SIZE: usize = 0x400;
const VIDEO_RAM_SIZE: usize = 0x1_8000;
const OAM_SIZE: usize = 0x400;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    Palette(usize),
    Vram(usize),
    Oam(usize),
}

fn region(address: u32) -> Region {
    match (address >> 24) & 0xF {
        0x5 => Region::Palette(address as usize & (PALETTE_RAM_SIZE - 1)),
        0x6 => {
            let offset = address as usize & 0x1_FFFF;
            if offset >= VIDEO_RAM_SIZE {
                Region::Vram(offset & 0x1_7FFF)
            } else {
                Region::Vram(offset)
            }
        }
        _ => Region::Oam(address as usize & (OAM_SIZE - 1)),
    }
}

/// LCD memory regions, boxed to keep the ~98KB off the stack.
#[serde_as]
#[derive(Serialize, Deserialize)]
pub struct Memory {
    /// 256 background colors followed by 256 sprite colors, RGB555.
    #[serde_as(as = "Box<[_; 1024]>")]
    pub palette_ram: Box<[u8; PALETTE_RAM_SIZE]>,

    #[serde_as(as = "Box<[_; 98304]>")]
    pub video_ram: Box<[u8; VIDEO_RAM_SIZE]>,

    #[serde_as(as = "Box<[_; 1024]>")]
    pub obj_attributes: Box<[u8; OAM_SIZE]>,
}

impl Default for Memory {
    #[allow(clippy::large_stack_arrays)]
    fn default() -> Self {
        Self {
            palette_ram: Box::new([0; PALETTE_RAM_SIZE]),
            video_ram: Box::new([0; VIDEO_RAM_SIZE]),
            obj_attributes: Box::new([0; OAM_SIZE]),
        }
    }
}

impl Memory {
    /// Background palette entry `index` (0-255).
    #[must_use]
    pub fn bg_color(&self, index: usize) -> u16 {
        let offset = (index & 0xFF) * 2;
        u16::from_le_bytes([self.palette_ram[offset], self.palette_ram[offset + 1]])
    }

    /// VRAM byte at `offset`, 0 past the end of VRAM.
    #[must_use]
    pub fn vram_byte(&self, offset: usize) -> u8 {
        self.video_ram.get(offset).copied().unwrap_or_default()
    }

    #[must_use]
    pub fn vram_half_word(&self, offset: usize) -> u16 {
        u16::from_le_bytes([self.vram_byte(offset), self.vram_byte(offset + 1)])
    }

    fn store(&mut self, region: Region, value: u8) {
        match region {
            Region::Palette(offset) => self.palette_ram[offset] = value,
            Region::Vram(offset) => self.video_ram[offset] = value,
            Region::Oam(offset) => self.obj_attributes[offset] = value,
        }
    }
}

impl IoDevice for Memory {
    fn read_at(&self, address: u32) -> u8 {
        match region(address) {
            Region::Palette(offset) => self.palette_ram[offset],
            Region::Vram(offset) => self.video_ram[offset],
            Region::Oam(offset) => self.obj_attributes[offset],
        }
    }

    fn write_at(&mut self, address: u32, value: u8) {
        let halfword = address & !1;

        if matches!(region(halfword), Region::Oam(_)) {
            return;
        }

        self.store(region(halfword), value);
        self.store(region(halfword + 1), value);
    }

    fn write_half_word(&mut self, address: u32, value: u16) {
        let [low, high] = value.to_le_bytes();

        self.store(region(address), low);
        self.store(region(address.wrapping_add(1)), high);
    }
}
