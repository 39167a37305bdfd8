//! LCD controller (PPU) - handles display rendering.
//!
//! The GBA LCD is 240x160 pixels, 15-bit color (32,768 colors). The [`Lcd`] struct
//! owns palette RAM, VRAM and OAM, runs the dot clock and renders one scanline at a
//! time into a 32-bit frame buffer.
//!
//! # Display Timing
//!
//! The LCD advances one dot every 4 CPU cycles. A complete frame consists of:
//!
//! ```text
//!                    240 dots            68 dots
//!                   ◄──────────►       ◄──────────►
//!               ┌─────────────────────────────────────┐
//!               │                      │              │
//!    160 lines  │      Visible         │   HBlank    │ VDraw
//!               │      (VDraw)         │             │
//!               ├──────────────────────┼─────────────┤
//!     68 lines  │                VBlank              │ VBlank
//!               └─────────────────────────────────────┘
//!
//! - VDraw: Lines 0-159, dots 0-239 are visible
//! - HBlank: Dots 240-307 on each line
//! - VBlank: Lines 160-227
//! - Total: 228 lines × 308 dots × 4 = 280,896 cycles/frame ≈ 59.73 Hz
//! ```
//!
//! A visible line is drawn in one go when its HBlank starts.
//!
//! # Background Modes
//!
//! The DISPCNT register (bits 0-2) selects the background mode:
//!
//! | Mode | BG0    | BG1    | BG2      | BG3      | Description           |
//! |------|--------|--------|----------|----------|-----------------------|
//! | 0    | Text   | Text   | Text     | Text     | 4 text backgrounds    |
//! | 1    | Text   | Text   | Affine   | -        | 2 text + 1 affine     |
//! | 2    | -      | -      | Affine   | Affine   | 2 affine backgrounds  |
//! | 3    | -      | -      | Bitmap   | -        | 240x160 15-bit bitmap |
//! | 4    | -      | -      | Bitmap   | -        | 240x160 8-bit indexed |
//! | 5    | -      | -      | Bitmap   | -        | 160x128 15-bit bitmap |
//!
//! # Layer Priority
//!
//! Backgrounds are drawn back to front: highest BGxCNT priority value first, and
//! on equal priority the lower numbered background ends up on top. Transparent
//! pixels (palette index 0) let the layers below, or the backdrop color (BG
//! palette entry 0), show through.
//!
//! # Status and Interrupts
//!
//! DISPSTAT carries the VBlank (bit 0), HBlank (bit 1) and VCount match (bit 2)
//! flags, each with an IRQ enable (bits 3-5). The IRQs to raise are returned in
//! [`LcdStepOutput`] together with the blank edges that start DMA transfers.

use serde::Deserialize;
use serde::Serialize;
use std::cmp::Reverse;

use crate::bitwise::Bits;
use crate::memory::io_registers::{
    BG0CNT, BG0HOFS, BG0VOFS, BG2PA, BG2X_L, DISPCNT, DISPSTAT, IoRegisters, VCOUNT,
};

use self::background::{Background, BackgroundControl, BackgroundKind};
use self::memory::Memory;

mod background;
mod bitmap;
pub mod memory;

/// GBA display width
pub const LCD_WIDTH: usize = 240;

/// GBA display height
pub const LCD_HEIGHT: usize = 160;

const DOTS_PER_LINE: u16 = 308;
const LINES_PER_FRAME: u16 = 228;
const CYCLES_PER_DOT: u8 = 4;

/// RGB555 color as stored in palette RAM and VRAM.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color(pub u16);

impl Color {
    pub const WHITE: Self = Self(0x7FFF);

    #[must_use]
    pub fn from_rgb(red: u8, green: u8, blue: u8) -> Self {
        let red: u16 = red.into();
        let green: u16 = green.into();
        let blue: u16 = blue.into();

        Self((blue << 10) + (green << 5) + red)
    }

    #[must_use]
    pub fn red(self) -> u8 {
        self.0.get_bits(0..=4) as u8
    }

    #[must_use]
    pub fn green(self) -> u8 {
        self.0.get_bits(5..=9) as u8
    }

    #[must_use]
    pub fn blue(self) -> u8 {
        self.0.get_bits(10..=14) as u8
    }

    /// Frame buffer pixel: alpha, blue, green, red from the high byte down.
    #[must_use]
    pub fn to_argb(self) -> u32 {
        0xFF00_0000
            | (u32::from(self.red()) << 3)
            | (u32::from(self.green()) << 11)
            | (u32::from(self.blue()) << 19)
    }
}

#[allow(clippy::module_name_repetitions)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LcdStepOutput {
    pub request_vblank_irq: bool,
    pub request_hblank_irq: bool,
    pub request_vcount_irq: bool,
    /// Line 160 started: the frame buffer is complete.
    pub entered_vblank: bool,
    pub entered_hblank: bool,
}

#[derive(Serialize, Deserialize)]
pub struct Lcd {
    pub memory: Memory,
    frame_buffer: Vec<u32>,

    cycle: u8,
    column: u16,
    row: u16,

    /// BG2/BG3 internal reference points (20.8 fixed point), reloaded from
    /// BGxX/BGxY on write and at VBlank, moved by PB/PD after every drawn line.
    pub(crate) affine_reference: [(i32, i32); 2],
}

impl Default for Lcd {
    fn default() -> Self {
        Self {
            memory: Memory::default(),
            frame_buffer: vec![0; LCD_WIDTH * LCD_HEIGHT],
            cycle: 0,
            column: 0,
            row: 0,
            affine_reference: [(0, 0); 2],
        }
    }
}

/// BGxX/BGxY are 28-bit signed values split over two halfwords.
fn reference_point(io: &IoRegisters, address: u32) -> i32 {
    let low = u32::from(io.get(address));
    let high = u32::from(io.get(address + 2));

    (((high << 16) | low) & 0x0FFF_FFFF).sign_extended(28) as i32
}

fn affine_parameter(io: &IoRegisters, affine: usize, offset: u32) -> i32 {
    i32::from(io.get(BG2PA + affine as u32 * 0x10 + offset) as i16)
}

impl Lcd {
    /// 240×160 pixels, row by row.
    #[must_use]
    pub fn frame_buffer(&self) -> &[u32] {
        &self.frame_buffer
    }

    #[must_use]
    pub const fn current_row(&self) -> u16 {
        self.row
    }

    /// Advances the LCD by one CPU cycle.
    pub fn step(&mut self, io: &mut IoRegisters) -> LcdStepOutput {
        let mut output = LcdStepOutput::default();

        self.cycle += 1;
        if self.cycle < CYCLES_PER_DOT {
            return output;
        }
        self.cycle = 0;

        let mut dispstat = io.get(DISPSTAT);
        self.column += 1;

        if self.column == DOTS_PER_LINE {
            self.column = 0;
            self.row += 1;

            dispstat.set_bit_off(1);

            if self.row == LINES_PER_FRAME {
                self.row = 0;
                dispstat.set_bit_off(0);
            } else if self.row == LCD_HEIGHT as u16 {
                dispstat.set_bit_on(0);
                output.request_vblank_irq = dispstat.get_bit(3);
                output.entered_vblank = true;

                self.latch_affine_references(io);
            }

            if dispstat.get_bits(8..=15) == self.row {
                dispstat.set_bit_on(2);
                output.request_vcount_irq = dispstat.get_bit(5);
            } else {
                dispstat.set_bit_off(2);
            }

            io.set(VCOUNT, self.row);
        } else if self.column == LCD_WIDTH as u16 {
            dispstat.set_bit_on(1);
            output.request_hblank_irq = dispstat.get_bit(4);
            output.entered_hblank = true;

            if self.row < LCD_HEIGHT as u16 {
                self.render_scanline(io, usize::from(self.row));
            }
        }

        io.set(DISPSTAT, dispstat);

        output
    }

    fn latch_affine_references(&mut self, io: &IoRegisters) {
        for affine in 0..self.affine_reference.len() {
            self.reload_affine_reference(affine, io);
        }
    }

    /// Copies BGxX/BGxY of BG2 (`affine` 0) or BG3 (1) into the internal reference point.
    pub fn reload_affine_reference(&mut self, affine: usize, io: &IoRegisters) {
        let x_address = BG2X_L + affine as u32 * 0x10;

        self.affine_reference[affine] = (
            reference_point(io, x_address),
            reference_point(io, x_address + 4),
        );
    }

    fn render_scanline(&mut self, io: &IoRegisters, row: usize) {
        let dispcnt = io.get(DISPCNT);
        let line = row * LCD_WIDTH..(row + 1) * LCD_WIDTH;

        // Forced blank
        if dispcnt.get_bit(7) {
            self.frame_buffer[line].fill(Color::WHITE.to_argb());
            return;
        }

        let backdrop = self.memory.bg_color(0);
        let mut colors = [backdrop; LCD_WIDTH];
        let second_frame = dispcnt.get_bit(4);
        let bg2_enabled = dispcnt.get_bit(10);

        match dispcnt.get_bits(0..=2) {
            mode @ 0..=2 => self.draw_backgrounds(mode, dispcnt, io, row, &mut colors),
            3 if bg2_enabled => {
                for (x, color) in colors.iter_mut().enumerate() {
                    if let Some(pixel) = bitmap::mode_3_pixel(&self.memory, x, row) {
                        *color = pixel;
                    }
                }
            }
            4 if bg2_enabled => {
                for (x, color) in colors.iter_mut().enumerate() {
                    if let Some(pixel) = bitmap::mode_4_pixel(&self.memory, second_frame, x, row) {
                        *color = pixel;
                    }
                }
            }
            5 if bg2_enabled => {
                for (x, color) in colors.iter_mut().enumerate() {
                    if let Some(pixel) = bitmap::mode_5_pixel(&self.memory, second_frame, x, row) {
                        *color = pixel;
                    }
                }
            }
            // BG2 off, or the prohibited modes 6 and 7.
            _ => {}
        }

        for (pixel, color) in self.frame_buffer[line].iter_mut().zip(colors) {
            *pixel = Color(color).to_argb();
        }

        for (affine, reference) in self.affine_reference.iter_mut().enumerate() {
            reference.0 += affine_parameter(io, affine, 2);
            reference.1 += affine_parameter(io, affine, 6);
        }
    }

    /// Enabled backgrounds of a tiled mode, in drawing order.
    fn backgrounds(mode: u16, dispcnt: u16, io: &IoRegisters) -> Vec<Background> {
        let layout: &[(usize, BackgroundKind)] = match mode {
            0 => &[
                (0, BackgroundKind::Text),
                (1, BackgroundKind::Text),
                (2, BackgroundKind::Text),
                (3, BackgroundKind::Text),
            ],
            1 => &[
                (0, BackgroundKind::Text),
                (1, BackgroundKind::Text),
                (2, BackgroundKind::Affine),
            ],
            _ => &[(2, BackgroundKind::Affine), (3, BackgroundKind::Affine)],
        };

        let mut backgrounds = layout
            .iter()
            .filter(|(index, _)| dispcnt.get_bit(8 + *index as u8))
            .map(|&(index, kind)| Background {
                index,
                kind,
                control: BackgroundControl::from(io.get(BG0CNT + index as u32 * 2)),
            })
            .collect::<Vec<_>>();

        backgrounds.sort_by_key(|bg| Reverse((bg.control.priority, bg.index)));
        backgrounds
    }

    fn draw_backgrounds(
        &self,
        mode: u16,
        dispcnt: u16,
        io: &IoRegisters,
        row: usize,
        colors: &mut [u16; LCD_WIDTH],
    ) {
        for bg in Self::backgrounds(mode, dispcnt, io) {
            match bg.kind {
                BackgroundKind::Text => {
                    let scroll = (
                        io.get(BG0HOFS + bg.index as u32 * 4),
                        io.get(BG0VOFS + bg.index as u32 * 4),
                    );

                    for (x, color) in colors.iter_mut().enumerate() {
                        if let Some(index) =
                            background::text_pixel(bg.control, &self.memory, scroll, x, row)
                        {
                            *color = self.memory.bg_color(usize::from(index));
                        }
                    }
                }
                BackgroundKind::Affine => {
                    let affine = bg.index - 2;
                    let (reference_x, reference_y) = self.affine_reference[affine];
                    let pa = affine_parameter(io, affine, 0);
                    let pc = affine_parameter(io, affine, 4);

                    for (x, color) in colors.iter_mut().enumerate() {
                        let x = x as i32;
                        let texture_x = reference_x.wrapping_add(pa * x);
                        let texture_y = reference_y.wrapping_add(pc * x);

                        if let Some(index) =
                            background::affine_pixel(bg.control, &self.memory, texture_x, texture_y)
                        {
                            *color = self.memory.bg_color(usize::from(index));
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::io_registers::WriteHook;
    use pretty_assertions::assert_eq;

    const CYCLES_PER_LINE: usize = DOTS_PER_LINE as usize * CYCLES_PER_DOT as usize;

    fn run(lcd: &mut Lcd, io: &mut IoRegisters, cycles: usize) -> Vec<LcdStepOutput> {
        (0..cycles).map(|_| lcd.step(io)).collect()
    }

    fn set_bg_color(lcd: &mut Lcd, index: usize, color: u16) {
        lcd.memory.palette_ram[index * 2..index * 2 + 2].copy_from_slice(&color.to_le_bytes());
    }

    #[test]
    fn check_color_conversion() {
        assert_eq!(Color::from_rgb(31, 0, 0).to_argb(), 0xFF00_00F8);
        assert_eq!(Color::from_rgb(0, 31, 0).to_argb(), 0xFF00_F800);
        assert_eq!(Color::from_rgb(0, 0, 31).to_argb(), 0xFFF8_0000);
    }

    #[test]
    fn check_hblank_timing() {
        let mut lcd = Lcd::default();
        let mut io = IoRegisters::default();
        io.write_half_word(DISPSTAT, 1 << 4);

        let outputs = run(&mut lcd, &mut io, LCD_WIDTH * 4);

        let hblanks = outputs.iter().filter(|o| o.entered_hblank).count();
        assert_eq!(hblanks, 1);
        assert!(outputs.last().unwrap().request_hblank_irq);
        assert_eq!(io.get(DISPSTAT) & 0b11, 0b10);

        run(&mut lcd, &mut io, (DOTS_PER_LINE as usize - LCD_WIDTH) * 4);
        assert_eq!(io.get(DISPSTAT) & 0b11, 0);
        assert_eq!(io.read_half_word(VCOUNT), 1);
    }

    #[test]
    fn check_vblank_and_frame_wrap() {
        let mut lcd = Lcd::default();
        let mut io = IoRegisters::default();
        io.write_half_word(DISPSTAT, 1 << 3);

        let outputs = run(&mut lcd, &mut io, LCD_HEIGHT * CYCLES_PER_LINE);

        let last = outputs.last().unwrap();
        assert!(last.entered_vblank);
        assert!(last.request_vblank_irq);
        assert_eq!(outputs.iter().filter(|o| o.entered_vblank).count(), 1);
        assert_eq!(io.read_half_word(VCOUNT), 160);
        assert_eq!(io.get(DISPSTAT) & 1, 1);

        run(&mut lcd, &mut io, 68 * CYCLES_PER_LINE);
        assert_eq!(io.read_half_word(VCOUNT), 0);
        assert_eq!(io.get(DISPSTAT) & 1, 0);
    }

    #[test]
    fn check_vcount_match() {
        let mut lcd = Lcd::default();
        let mut io = IoRegisters::default();
        // Match on line 2, IRQ enabled.
        io.write_half_word(DISPSTAT, (2 << 8) | (1 << 5));

        let outputs = run(&mut lcd, &mut io, 2 * CYCLES_PER_LINE);

        assert!(outputs.last().unwrap().request_vcount_irq);
        assert_eq!(io.get(DISPSTAT) & 0b100, 0b100);

        run(&mut lcd, &mut io, CYCLES_PER_LINE);
        assert_eq!(io.get(DISPSTAT) & 0b100, 0);
    }

    #[test]
    fn check_mode_3_scanline() {
        let mut lcd = Lcd::default();
        let mut io = IoRegisters::default();
        io.write_half_word(DISPCNT, 3 | (1 << 10));
        lcd.memory.video_ram[0..2].copy_from_slice(&0x001F_u16.to_le_bytes());

        run(&mut lcd, &mut io, LCD_WIDTH * 4);

        assert_eq!(lcd.frame_buffer()[0], 0xFF00_00F8);
        assert_eq!(lcd.frame_buffer()[1], 0xFF00_0000);
    }

    #[test]
    fn check_forced_blank() {
        let mut lcd = Lcd::default();
        let mut io = IoRegisters::default();
        io.write_half_word(DISPCNT, 3 | (1 << 7) | (1 << 10));

        run(&mut lcd, &mut io, LCD_WIDTH * 4);

        assert!(lcd.frame_buffer()[..LCD_WIDTH].iter().all(|p| *p == 0xFFF8_F8F8));
    }

    #[test]
    fn check_priority_and_transparency() {
        let mut lcd = Lcd::default();
        let mut io = IoRegisters::default();

        // Mode 0, BG0 and BG1 on. Both 256 colors, BG0 map in block 8, BG1 in block 9.
        io.write_half_word(DISPCNT, (1 << 8) | (1 << 9));
        io.write_half_word(BG0CNT, (8 << 8) | (1 << 7) | 1);
        io.write_half_word(BG0CNT + 2, (9 << 8) | (1 << 7) | 1);

        set_bg_color(&mut lcd, 0, 0x1111);
        set_bg_color(&mut lcd, 1, 0x001F);
        set_bg_color(&mut lcd, 2, 0x03E0);

        // BG0 uses tile 1 (pixel 0 only), BG1 uses tile 2 (pixels 0 and 1).
        lcd.memory.video_ram[8 * 0x800] = 1;
        lcd.memory.video_ram[9 * 0x800] = 2;
        lcd.memory.video_ram[64] = 1;
        lcd.memory.video_ram[128] = 2;
        lcd.memory.video_ram[129] = 2;

        run(&mut lcd, &mut io, LCD_WIDTH * 4);

        let line = &lcd.frame_buffer()[..LCD_WIDTH];
        // Same priority: BG0 wins.
        assert_eq!(line[0], Color(0x001F).to_argb());
        // BG0 transparent, BG1 shows.
        assert_eq!(line[1], Color(0x03E0).to_argb());
        // Backdrop.
        assert_eq!(line[2], Color(0x1111).to_argb());
    }

    #[test]
    fn check_affine_reference_latch() {
        let mut lcd = Lcd::default();
        let mut io = IoRegisters::default();

        io.write_half_word(BG2X_L, 0x0100);
        io.write_half_word(BG2X_L + 6, 0xFFFF);
        io.write_half_word(BG2PA + 2, 0x0080);
        io.write_half_word(BG2PA + 6, 0x0100);

        run(&mut lcd, &mut io, LCD_HEIGHT * CYCLES_PER_LINE);
        assert_eq!(lcd.affine_reference[0], (0x100, -0x1_0000));

        // One drawn line moves the reference by (PB, PD).
        run(&mut lcd, &mut io, 68 * CYCLES_PER_LINE + LCD_WIDTH * 4);
        assert_eq!(lcd.affine_reference[0].0, 0x180);
    }

    #[test]
    fn check_affine_reference_reload_on_write() {
        let mut lcd = Lcd::default();
        let mut io = IoRegisters::default();

        // BG3Y_L
        let hooked = io.write_half_word(BG2X_L + 0x14, 0x0300).unwrap();
        assert_eq!(hooked.hook, WriteHook::AffineReference(1));

        lcd.reload_affine_reference(1, &io);
        assert_eq!(lcd.affine_reference[1], (0, 0x300));
        assert_eq!(lcd.affine_reference[0], (0, 0));
    }
}
