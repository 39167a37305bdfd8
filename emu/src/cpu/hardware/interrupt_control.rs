//! Interrupt sources and the IE/IF/IME registers.
//!
//! The registers themselves live in the IO bank. Peripherals raise their bit in IF
//! through [`IoRegisters::request_interrupt`], the CPU polls
//! [`IoRegisters::irq_pending`] before executing each instruction and software
//! acknowledges by writing 1s back to IF.

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::memory::io_registers::{IE, IF, IME, IoRegisters};

/// IF/IE bit of every interrupt source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interrupt {
    VBlank = 0,
    HBlank = 1,
    VCount = 2,
    Timer0 = 3,
    Timer1 = 4,
    Timer2 = 5,
    Timer3 = 6,
    Serial = 7,
    Dma0 = 8,
    Dma1 = 9,
    Dma2 = 10,
    Dma3 = 11,
    Keypad = 12,
    GamePak = 13,
}

impl Interrupt {
    #[must_use]
    pub const fn timer(channel: usize) -> Self {
        match channel {
            0 => Self::Timer0,
            1 => Self::Timer1,
            2 => Self::Timer2,
            _ => Self::Timer3,
        }
    }

    #[must_use]
    pub const fn dma(channel: usize) -> Self {
        match channel {
            0 => Self::Dma0,
            1 => Self::Dma1,
            2 => Self::Dma2,
            _ => Self::Dma3,
        }
    }

    const fn mask(self) -> u16 {
        1 << self as u16
    }
}

const INTERRUPT_SOURCES_MASK: u16 = 0x3FFF;

impl IoRegisters {
    pub fn request_interrupt(&mut self, interrupt: Interrupt) {
        let flags = self.get(IF);
        self.set(IF, flags | interrupt.mask());
    }

    /// Writing 1 to a bit of IF clears it, only in the byte lanes that were written.
    pub fn acknowledge_interrupts(&mut self, value: u16, lanes: u16) {
        let flags = self.get(IF);
        self.set(IF, flags & !(value & lanes));
    }

    /// IME enabled and at least one source both enabled and requested.
    #[must_use]
    pub fn irq_pending(&self) -> bool {
        self.get(IME).get_bit(0) && self.get(IE) & self.get(IF) & INTERRUPT_SOURCES_MASK != 0
    }
}
