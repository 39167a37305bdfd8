//! Bitmap backgrounds (modes 3-5), all drawn on BG2.
//!
//! ```text
//! Mode 3: 240×160, 16bpp, one frame at 0x0600_0000
//! Mode 4: 240×160, 8bpp palette indices, frames at 0x0600_0000 / 0x0600_A000
//! Mode 5: 160×128, 16bpp, frames at 0x0600_0000 / 0x0600_A000
//! ```
//!
//! Mode 5 is centered on the screen, the border shows the backdrop.

use super::memory::Memory;
use super::{LCD_HEIGHT, LCD_WIDTH};

const SECOND_FRAME_OFFSET: usize = 0xA000;

const MODE_5_WIDTH: usize = 160;
const MODE_5_HEIGHT: usize = 128;
const MODE_5_LEFT: usize = (LCD_WIDTH - MODE_5_WIDTH) / 2;
const MODE_5_TOP: usize = (LCD_HEIGHT - MODE_5_HEIGHT) / 2;

const fn frame_offset(second_frame: bool) -> usize {
    if second_frame { SECOND_FRAME_OFFSET } else { 0 }
}

/// RGB555 color of a mode 3 pixel.
#[must_use]
pub fn mode_3_pixel(memory: &Memory, x: usize, y: usize) -> Option<u16> {
    Some(memory.vram_half_word((y * LCD_WIDTH + x) * 2))
}

/// RGB555 color of a mode 4 pixel, `None` for palette index 0.
#[must_use]
pub fn mode_4_pixel(memory: &Memory, second_frame: bool, x: usize, y: usize) -> Option<u16> {
    let index = memory.vram_byte(frame_offset(second_frame) + y * LCD_WIDTH + x);

    (index != 0).then(|| memory.bg_color(usize::from(index)))
}

/// RGB555 color of a mode 5 pixel, `None` outside the 160×128 picture.
#[must_use]
pub fn mode_5_pixel(memory: &Memory, second_frame: bool, x: usize, y: usize) -> Option<u16> {
    let x = x.checked_sub(MODE_5_LEFT).filter(|x| *x < MODE_5_WIDTH)?;
    let y = y.checked_sub(MODE_5_TOP).filter(|y| *y < MODE_5_HEIGHT)?;

    Some(memory.vram_half_word(frame_offset(second_frame) + (y * MODE_5_WIDTH + x) * 2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn check_mode_3() {
        let mut memory = Memory::default();
        let offset = (2 * LCD_WIDTH + 3) * 2;
        memory.video_ram[offset..offset + 2].copy_from_slice(&0x7C1F_u16.to_le_bytes());

        assert_eq!(mode_3_pixel(&memory, 3, 2), Some(0x7C1F));
        assert_eq!(mode_3_pixel(&memory, 4, 2), Some(0));
    }

    #[test]
    fn check_mode_4_page_flip() {
        let mut memory = Memory::default();
        memory.palette_ram[2..4].copy_from_slice(&0x001F_u16.to_le_bytes());
        memory.video_ram[SECOND_FRAME_OFFSET + 10] = 1;

        assert_eq!(mode_4_pixel(&memory, false, 10, 0), None);
        assert_eq!(mode_4_pixel(&memory, true, 10, 0), Some(0x001F));
    }

    #[test]
    fn check_mode_5_letterbox() {
        let mut memory = Memory::default();
        memory.video_ram[0..2].copy_from_slice(&0x03E0_u16.to_le_bytes());

        assert_eq!(mode_5_pixel(&memory, false, MODE_5_LEFT, MODE_5_TOP), Some(0x03E0));
        assert_eq!(mode_5_pixel(&memory, false, MODE_5_LEFT - 1, MODE_5_TOP), None);
        assert_eq!(mode_5_pixel(&memory, false, MODE_5_LEFT, MODE_5_TOP + 128), None);
        assert_eq!(mode_5_pixel(&memory, true, MODE_5_LEFT, MODE_5_TOP), Some(0));
    }
}
