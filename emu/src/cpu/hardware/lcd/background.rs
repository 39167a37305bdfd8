//! Tiled background rendering (modes 0-2).
//!
//! # Text backgrounds
//!
//! ```text
//! screen (x, y) + scroll ──▶ tilemap entry ──▶ tile pixel ──▶ palette color
//!                            (16 bit: tile,    (4 or 8 bpp)
//!                             flips, bank)
//! ```
//!
//! Maps bigger than 256 pixels are made of several 2 KiB screen blocks:
//!
//! ```text
//! 256×256: [0]        512×256: [0][1]
//! 256×512: [0]        512×512: [0][1]
//!          [1]                 [2][3]
//! ```
//!
//! # Affine backgrounds
//!
//! BG2 (modes 1 and 2) and BG3 (mode 2) map each screen pixel through a 2×2
//! matrix in 8.8 fixed point:
//!
//! ```text
//! texture_x = REF_X + PA × x        (REF advanced by PB/PD every line)
//! texture_y = REF_Y + PC × x
//! ```
//!
//! Affine maps are square, use 8-bit tilemap entries and always 8bpp tiles.
//!
//! Palette index 0 is transparent in both kinds.

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;

use super::memory::Memory;

const SCREEN_BLOCK_SIZE: usize = 0x800;
const CHARACTER_BLOCK_SIZE: usize = 0x4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackgroundKind {
    Text,
    Affine,
}

/// Decoded BGxCNT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackgroundControl {
    pub priority: u8,
    character_base_block: usize,
    colors_256: bool,
    screen_base_block: usize,
    /// Affine only: wrap instead of clipping outside the map.
    wraparound: bool,
    screen_size: u16,
}

impl From<u16> for BackgroundControl {
    fn from(value: u16) -> Self {
        Self {
            priority: value.get_bits(0..=1) as u8,
            character_base_block: usize::from(value.get_bits(2..=3)),
            colors_256: value.get_bit(7),
            screen_base_block: usize::from(value.get_bits(8..=12)),
            wraparound: value.get_bit(13),
            screen_size: value.get_bits(14..=15),
        }
    }
}

impl BackgroundControl {
    const fn text_size(self) -> (usize, usize) {
        match self.screen_size {
            0 => (256, 256),
            1 => (512, 256),
            2 => (256, 512),
            _ => (512, 512),
        }
    }

    const fn affine_size(self) -> i32 {
        128 << self.screen_size
    }
}

/// An enabled background of the current mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Background {
    pub index: usize,
    pub kind: BackgroundKind,
    pub control: BackgroundControl,
}

/// Palette index of a text background pixel, already offset by the palette bank.
#[must_use]
pub fn text_pixel(
    control: BackgroundControl,
    memory: &Memory,
    scroll: (u16, u16),
    x: usize,
    y: usize,
) -> Option<u16> {
    let (map_width, map_height) = control.text_size();

    let scroll_x = (x + usize::from(scroll.0 & 0x1FF)) % map_width;
    let scroll_y = (y + usize::from(scroll.1 & 0x1FF)) % map_height;

    let tile_x = scroll_x / 8;
    let tile_y = scroll_y / 8;

    let screen_block_x = tile_x / 32;
    let screen_block_y = tile_y / 32;
    let screen_block = match (map_width > 256, map_height > 256) {
        (true, true) => screen_block_y * 2 + screen_block_x,
        (true, false) => screen_block_x,
        (false, true) => screen_block_y,
        (false, false) => 0,
    };

    let entry_address = (control.screen_base_block + screen_block) * SCREEN_BLOCK_SIZE
        + ((tile_y % 32) * 32 + tile_x % 32) * 2;
    let entry = memory.vram_half_word(entry_address);

    let tile_number = usize::from(entry.get_bits(0..=9));
    let pixel_x = if entry.get_bit(10) {
        7 - scroll_x % 8
    } else {
        scroll_x % 8
    };
    let pixel_y = if entry.get_bit(11) {
        7 - scroll_y % 8
    } else {
        scroll_y % 8
    };
    let palette_bank = entry.get_bits(12..=15);

    let character_base = control.character_base_block * CHARACTER_BLOCK_SIZE;

    if control.colors_256 {
        let offset = character_base + tile_number * 64 + pixel_y * 8 + pixel_x;
        let index = u16::from(memory.vram_byte(offset));

        (index != 0).then_some(index)
    } else {
        let offset = character_base + tile_number * 32 + pixel_y * 4 + pixel_x / 2;
        let byte = memory.vram_byte(offset);
        let index = u16::from(if pixel_x % 2 == 0 { byte & 0x0F } else { byte >> 4 });

        (index != 0).then_some(palette_bank * 16 + index)
    }
}

/// Palette index of an affine background pixel at texture coordinates in 8.8
/// fixed point.
#[must_use]
pub fn affine_pixel(
    control: BackgroundControl,
    memory: &Memory,
    texture_x: i32,
    texture_y: i32,
) -> Option<u16> {
    let map_size = control.affine_size();
    let mut x = texture_x >> 8;
    let mut y = texture_y >> 8;

    if control.wraparound {
        x = x.rem_euclid(map_size);
        y = y.rem_euclid(map_size);
    } else if !(0..map_size).contains(&x) || !(0..map_size).contains(&y) {
        return None;
    }

    let (x, y) = (x as usize, y as usize);
    let tiles_per_row = map_size as usize / 8;

    let entry_address =
        control.screen_base_block * SCREEN_BLOCK_SIZE + (y / 8) * tiles_per_row + x / 8;
    let tile_number = usize::from(memory.vram_byte(entry_address));

    let offset = control.character_base_block * CHARACTER_BLOCK_SIZE
        + tile_number * 64
        + (y % 8) * 8
        + x % 8;
    let index = u16::from(memory.vram_byte(offset));

    (index != 0).then_some(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn check_control_decoding() {
        // Priority 2, char block 1, 256 colors, screen block 31, wrap, size 3.
        let control = BackgroundControl::from(0b1111_1111_1000_0110);

        assert_eq!(control.priority, 2);
        assert_eq!(control.character_base_block, 1);
        assert!(control.colors_256);
        assert_eq!(control.screen_base_block, 31);
        assert!(control.wraparound);
        assert_eq!(control.text_size(), (512, 512));
        assert_eq!(control.affine_size(), 1024);
    }

    #[test]
    fn check_text_4bpp_with_flip_and_bank() {
        let mut memory = Memory::default();
        // Screen block 8, char block 0.
        let control = BackgroundControl::from(8 << 8);

        // Tile 1, horizontal flip, palette bank 3.
        let entry: u16 = 1 | (1 << 10) | (3 << 12);
        memory.video_ram[8 * SCREEN_BLOCK_SIZE..8 * SCREEN_BLOCK_SIZE + 2]
            .copy_from_slice(&entry.to_le_bytes());
        // Row 0 of tile 1: pixel 7 has color 5.
        memory.video_ram[32 + 3] = 0x50;

        assert_eq!(text_pixel(control, &memory, (0, 0), 0, 0), Some(3 * 16 + 5));
        // Pixel 7 on screen is pixel 0 in the tile, transparent.
        assert_eq!(text_pixel(control, &memory, (0, 0), 7, 0), None);
        // Scrolling by 256 wraps back on the same tile.
        assert_eq!(text_pixel(control, &memory, (256, 0), 0, 0), Some(53));
    }

    #[test]
    fn check_text_second_screen_block() {
        let mut memory = Memory::default();
        // 512×256, 256 colors, screen block 4.
        let control = BackgroundControl::from((1 << 14) | (4 << 8) | (1 << 7));

        // First tile of the right-hand screen block uses tile 2.
        memory.video_ram[5 * SCREEN_BLOCK_SIZE] = 2;
        memory.video_ram[2 * 64] = 0x42;

        assert_eq!(text_pixel(control, &memory, (0, 0), 0, 0), None);
        assert_eq!(text_pixel(control, &memory, (256, 0), 0, 0), Some(0x42));
    }

    #[test]
    fn check_affine_clip_and_wrap() {
        let mut memory = Memory::default();
        // 128×128, screen block 2, char block 1.
        let clipped = BackgroundControl::from((2 << 8) | (1 << 2));
        let wrapped = BackgroundControl::from((1 << 13) | (2 << 8) | (1 << 2));

        memory.video_ram[2 * SCREEN_BLOCK_SIZE] = 3;
        memory.video_ram[CHARACTER_BLOCK_SIZE + 3 * 64 + 9] = 0x11;

        assert_eq!(affine_pixel(clipped, &memory, 1 << 8, 1 << 8), Some(0x11));
        assert_eq!(affine_pixel(clipped, &memory, -127 << 8, 1 << 8), None);
        assert_eq!(affine_pixel(wrapped, &memory, -127 << 8, 129 << 8), Some(0x11));
    }
}
