//! # IO Register Bank
//!
//! The `0x0400_0000` region is a flat array of 512 halfword registers.
//! Every register carries its own read and write masks:
//!
//! ```text
//! stored = (old & !write_mask) | (written & write_mask)
//! read   = stored & read_mask
//! ```
//!
//! Registers with side effects (DMA control, timers, KEYCNT, IF) also carry a
//! [`WriteHook`]. A write to one of them returns a [`HookedWrite`] holding the *raw*
//! written value, which the [`Bus`](crate::bus::Bus) dispatches to the owning
//! peripheral before the access completes.
//!
//! Hardware (LCD, timers, keypad, interrupt sources) bypasses the masks through
//! [`IoRegisters::get`] and [`IoRegisters::set`]: VCOUNT and KEYINPUT are read-only
//! for the CPU but are obviously written by the hardware behind them.

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::bitwise::Bits;

pub const DISPCNT: u32 = 0x0400_0000;
pub const DISPSTAT: u32 = 0x0400_0004;
pub const VCOUNT: u32 = 0x0400_0006;
pub const BG0CNT: u32 = 0x0400_0008;
pub const BG0HOFS: u32 = 0x0400_0010;
pub const BG0VOFS: u32 = 0x0400_0012;
pub const BG2PA: u32 = 0x0400_0020;
pub const BG2X_L: u32 = 0x0400_0028;
pub const DMA0SAD_L: u32 = 0x0400_00B0;
pub const DMA0CNT_H: u32 = 0x0400_00BA;
pub const TM0CNT_L: u32 = 0x0400_0100;
pub const KEYINPUT: u32 = 0x0400_0130;
pub const KEYCNT: u32 = 0x0400_0132;
pub const IE: u32 = 0x0400_0200;
pub const IF: u32 = 0x0400_0202;
pub const IME: u32 = 0x0400_0208;

const INTERNAL_MEMORY_CONTROL_LOW: u32 = 0x0400_0800;
const INTERNAL_MEMORY_CONTROL_HIGH: u32 = 0x0400_0802;
const REGISTERS_COUNT: usize = 512;
const REGISTERS_END: u32 = 0x0400_0400;

/// Peripheral reacting to a CPU/DMA write on a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteHook {
    /// DMAxCNT_H of the given channel.
    DmaControl(usize),
    /// TMxCNT_L of the given channel.
    TimerReload(usize),
    /// TMxCNT_H of the given channel.
    TimerControl(usize),
    KeypadControl,
    InterruptAcknowledge,
    /// BGxX/BGxY of BG2 (0) or BG3 (1).
    AffineReference(usize),
}

/// A write that landed on a hooked register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookedWrite {
    pub hook: WriteHook,
    pub address: u32,
    /// Written value merged with the untouched byte lane, before masking.
    pub value: u16,
    /// Byte lanes actually written (`0x00FF`, `0xFF00` or `0xFFFF`).
    pub lanes: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoRegister {
    value: u16,
    read_mask: u16,
    write_mask: u16,
    hook: Option<WriteHook>,
}

impl IoRegister {
    const fn new(value: u16, read_mask: u16, write_mask: u16) -> Self {
        Self {
            value,
            read_mask,
            write_mask,
            hook: None,
        }
    }

    const fn with_hook(mut self, hook: WriteHook) -> Self {
        self.hook = Some(hook);
        self
    }

    const fn read(&self) -> u16 {
        self.value & self.read_mask
    }
}

#[serde_as]
#[derive(Serialize, Deserialize)]
pub struct IoRegisters {
    #[serde_as(as = "[_; REGISTERS_COUNT]")]
    registers: [IoRegister; REGISTERS_COUNT],
    internal_memory_control_low: IoRegister,
    internal_memory_control_high: IoRegister,
    null_register: IoRegister,
}

impl Default for IoRegisters {
    fn default() -> Self {
        let mut registers = [IoRegister::new(0, 0, 0xFFFF); REGISTERS_COUNT];

        for (index, register) in registers.iter_mut().enumerate() {
            *register = initial_register(DISPCNT | ((index as u32) << 1));
        }

        Self {
            registers,
            internal_memory_control_low: IoRegister::new(0, 0xFFFF, 0xFFFF),
            internal_memory_control_high: IoRegister::new(0, 0xFFFF, 0xFFFF),
            null_register: IoRegister::new(0, 0, 0xFFFF),
        }
    }
}

/// Reset value, masks and hook of the register at `address`.
fn initial_register(address: u32) -> IoRegister {
    match address {
        // DISPCNT, GREENSWP
        0x0400_0000..=0x0400_0003 => IoRegister::new(0, 0xFFFF, 0xFFFF),
        // The blank and match flags belong to the LCD.
        DISPSTAT => IoRegister::new(0, 0xFFFF, 0xFF38),
        VCOUNT => IoRegister::new(0, 0xFFFF, 0),
        // BG0CNT..BG3CNT
        0x0400_0008..=0x0400_000F => IoRegister::new(0, 0xFFFF, 0xFFFF),
        // BG2X, BG2Y
        0x0400_0028..=0x0400_002F => {
            IoRegister::new(0, 0, 0xFFFF).with_hook(WriteHook::AffineReference(0))
        }
        // BG3X, BG3Y
        0x0400_0038..=0x0400_003F => {
            IoRegister::new(0, 0, 0xFFFF).with_hook(WriteHook::AffineReference(1))
        }
        // WININ, WINOUT
        0x0400_0048..=0x0400_004B => IoRegister::new(0, 0xFFFF, 0xFFFF),
        // BLDCNT, BLDALPHA
        0x0400_0050..=0x0400_0053 => IoRegister::new(0, 0xFFFF, 0xFFFF),
        // DMA0..DMA3
        0x0400_00B0..=0x0400_00DF => dma_register(address),
        // TM0..TM3
        0x0400_0100..=0x0400_010F => {
            let channel = ((address - TM0CNT_L) / 4) as usize;

            if address.get_bit(1) {
                IoRegister::new(0, 0x00C7, 0x00C7).with_hook(WriteHook::TimerControl(channel))
            } else {
                IoRegister::new(0, 0xFFFF, 0).with_hook(WriteHook::TimerReload(channel))
            }
        }
        KEYINPUT => IoRegister::new(0xFFFF, 0x03FF, 0),
        KEYCNT => IoRegister::new(0, 0xC3FF, 0xC3FF).with_hook(WriteHook::KeypadControl),
        IE => IoRegister::new(0, 0x3FFF, 0x3FFF),
        IF => IoRegister::new(0, 0x3FFF, 0).with_hook(WriteHook::InterruptAcknowledge),
        IME => IoRegister::new(0, 0x0001, 0x0001),
        // BG scroll/affine, windows, MOSAIC, BLDY and everything unlisted is write-only.
        _ => IoRegister::new(0, 0, 0xFFFF),
    }
}

fn dma_register(address: u32) -> IoRegister {
    let channel = ((address - DMA0SAD_L) / 12) as usize;

    match (address - DMA0SAD_L) % 12 {
        // SAD_L, DAD_L
        0 | 4 => IoRegister::new(0, 0, 0xFFFF),
        // SAD_H: channel 3 can read from the Game Pak.
        2 if channel == 3 => IoRegister::new(0, 0, 0x0FFF),
        2 | 6 => IoRegister::new(0, 0, 0x07FF),
        8 if channel == 3 => IoRegister::new(0, 0, 0xFFFF),
        8 => IoRegister::new(0, 0, 0x3FFF),
        _ => IoRegister::new(0, 0xFFE0, 0xFFE0).with_hook(WriteHook::DmaControl(channel)),
    }
}

impl IoRegisters {
    fn register(&self, address: u32) -> &IoRegister {
        match convert_address(address) {
            INTERNAL_MEMORY_CONTROL_LOW => &self.internal_memory_control_low,
            INTERNAL_MEMORY_CONTROL_HIGH => &self.internal_memory_control_high,
            a if a < REGISTERS_END => &self.registers[register_index(a)],
            _ => &self.null_register,
        }
    }

    fn register_mut(&mut self, address: u32) -> &mut IoRegister {
        match convert_address(address) {
            INTERNAL_MEMORY_CONTROL_LOW => &mut self.internal_memory_control_low,
            INTERNAL_MEMORY_CONTROL_HIGH => &mut self.internal_memory_control_high,
            a if a < REGISTERS_END => &mut self.registers[register_index(a)],
            _ => {
                tracing::debug!("write to unmapped IO address 0x{address:08X}");
                &mut self.null_register
            }
        }
    }

    /// Hardware-side read of the stored value, ignoring the read mask.
    #[must_use]
    pub fn get(&self, address: u32) -> u16 {
        self.register(address).value
    }

    /// Hardware-side write, ignoring the write mask and hooks.
    pub fn set(&mut self, address: u32, value: u16) {
        self.register_mut(address).value = value;
    }

    #[must_use]
    pub fn read_half_word(&self, address: u32) -> u16 {
        self.register(address & !1).read()
    }

    #[must_use]
    pub fn read_at(&self, address: u32) -> u8 {
        self.read_half_word(address).get_byte((address & 1) as u8)
    }

    #[must_use]
    pub fn read_word(&self, address: u32) -> u32 {
        u32::from(self.read_half_word(address)) | (u32::from(self.read_half_word(address + 2)) << 16)
    }

    /// Masked merge of the written `lanes`, returning the hook to dispatch if any.
    pub fn write(&mut self, address: u32, value: u16, lanes: u16) -> Option<HookedWrite> {
        let register = self.register_mut(address & !1);
        let mask = register.write_mask & lanes;

        register.value = (register.value & !mask) | (value & mask);

        register.hook.map(|hook| HookedWrite {
            hook,
            address: address & !1,
            value: (register.value & !lanes) | (value & lanes),
            lanes,
        })
    }

    pub fn write_half_word(&mut self, address: u32, value: u16) -> Option<HookedWrite> {
        self.write(address, value, 0xFFFF)
    }

    pub fn write_at(&mut self, address: u32, value: u8) -> Option<HookedWrite> {
        let value = u16::from(value);

        if address.get_bit(0) {
            self.write(address, value << 8, 0xFF00)
        } else {
            self.write(address, value, 0x00FF)
        }
    }
}

/// The internal memory control register is mirrored every 64 KiB.
const fn convert_address(address: u32) -> u32 {
    match address & 0xFFFF {
        0x0800 => INTERNAL_MEMORY_CONTROL_LOW,
        0x0802 => INTERNAL_MEMORY_CONTROL_HIGH,
        _ => address,
    }
}

const fn register_index(address: u32) -> usize {
    ((address & 0x3FF) >> 1) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn check_masked_round_trip() {
        let mut io = IoRegisters::default();

        for _ in 0..64 {
            let index = rand::random::<u32>() % 512;
            let address = DISPCNT | (index << 1);
            let before = io.get(address);
            let written = rand::random::<u16>();
            let register = *io.register(address);

            io.write_half_word(address, written);

            let expected = ((before & !register.write_mask) | (written & register.write_mask))
                & register.read_mask;
            assert_eq!(io.read_half_word(address), expected);
            // Reading never has side effects.
            assert_eq!(io.read_half_word(address), expected);
        }
    }

    #[test]
    fn check_read_only_and_write_only() {
        let mut io = IoRegisters::default();

        io.write_half_word(VCOUNT, 0x1234);
        assert_eq!(io.read_half_word(VCOUNT), 0);

        io.write_half_word(BG0HOFS, 0x00FF);
        assert_eq!(io.read_half_word(BG0HOFS), 0);
        assert_eq!(io.get(BG0HOFS), 0x00FF);

        assert_eq!(io.read_half_word(KEYINPUT), 0x03FF);
    }

    #[test]
    fn check_hook_gets_raw_value() {
        let mut io = IoRegisters::default();

        let hooked = io.write_half_word(0x0400_00C6, 0x801F);

        assert_eq!(
            hooked,
            Some(HookedWrite {
                hook: WriteHook::DmaControl(1),
                address: 0x0400_00C6,
                value: 0x801F,
                lanes: 0xFFFF,
            })
        );
        assert_eq!(io.read_half_word(0x0400_00C6), 0x8000);
    }

    #[test]
    fn check_byte_write_merges() {
        let mut io = IoRegisters::default();

        io.write_half_word(DISPCNT, 0x1234);
        io.write_at(DISPCNT + 1, 0xAB);

        assert_eq!(io.read_half_word(DISPCNT), 0xAB34);
        assert_eq!(io.read_at(DISPCNT), 0x34);

        io.write_half_word(DISPSTAT, 0xFFFF);
        assert_eq!(io.read_half_word(DISPSTAT), 0xFF38);

        let hooked = io.write_at(DMA0CNT_H + 1, 0x80);
        assert_eq!(hooked.map(|h| (h.value, h.lanes)), Some((0x8000, 0xFF00)));
    }

    #[test]
    fn check_internal_memory_control_and_null() {
        let mut io = IoRegisters::default();

        io.write_half_word(0x0400_0800, 0x0D00);
        assert_eq!(io.read_half_word(0x0401_0800), 0x0D00);

        io.write_half_word(0x0400_0500, 0xFFFF);
        assert_eq!(io.read_half_word(0x0400_0500), 0);
    }

    #[test]
    fn check_word_access() {
        let mut io = IoRegisters::default();

        io.write_half_word(BG0CNT, 0x1111);
        io.write_half_word(BG0CNT + 2, 0x2222);

        assert_eq!(io.read_word(BG0CNT), 0x2222_1111);
    }
}
