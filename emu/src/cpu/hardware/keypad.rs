use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::cpu::hardware::interrupt_control::Interrupt;
use crate::memory::io_registers::{IoRegisters, KEYCNT, KEYINPUT};

/// GBA button bit positions in KEYINPUT register (when pressed are set to 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GbaButton {
    A = 1 << 0,
    B = 1 << 1,
    Select = 1 << 2,
    Start = 1 << 3,
    Right = 1 << 4,
    Left = 1 << 5,
    Up = 1 << 6,
    Down = 1 << 7,
    R = 1 << 8,
    L = 1 << 9,
}

impl GbaButton {
    /// Order in which front ends report the button states.
    pub const ALL: [Self; 10] = [
        Self::A,
        Self::B,
        Self::Select,
        Self::Start,
        Self::Right,
        Self::Left,
        Self::Up,
        Self::Down,
        Self::R,
        Self::L,
    ];
}

const KEYS_MASK: u16 = 0x03FF;

#[derive(Debug, Serialize, Deserialize)]
pub struct Keypad {
    pub key_input: u16,
}

impl Default for Keypad {
    fn default() -> Self {
        Self::new()
    }
}

impl Keypad {
    /// Create a new Keypad with all buttons released (all bits set to 1).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            key_input: KEYS_MASK,
        }
    }

    /// Set button state: pressed = true, released = false.
    /// GBA uses active-low logic: bit 0 = pressed, bit 1 = released.
    pub const fn set_button(&mut self, button: GbaButton, pressed: bool) {
        if pressed {
            self.key_input &= !(button as u16);
        } else {
            self.key_input |= button as u16;
        }
    }

    /// Replaces every button state, in [`GbaButton::ALL`] order, and publishes KEYINPUT.
    pub fn update(&mut self, pressed: [bool; 10], io: &mut IoRegisters) {
        for (button, pressed) in GbaButton::ALL.into_iter().zip(pressed) {
            self.set_button(button, pressed);
        }

        io.set(KEYINPUT, self.key_input);
        self.check_interrupt(io);
    }

    /// Raises the keypad IRQ when KEYCNT's condition holds.
    pub fn check_interrupt(&self, io: &mut IoRegisters) {
        let control = io.get(KEYCNT);

        if !control.get_bit(14) {
            return;
        }

        let selected = control & KEYS_MASK;
        let pressed = !self.key_input & selected;

        // Bit 15 selects AND (all selected keys) over OR (any of them).
        let triggered = if control.get_bit(15) {
            pressed == selected
        } else {
            pressed != 0
        };

        if triggered {
            io.request_interrupt(Interrupt::Keypad);
        }
    }
}
