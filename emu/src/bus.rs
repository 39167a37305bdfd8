//! # System Bus
//!
//! Routes every CPU and DMA access to the peripheral owning the address. Only
//! bits 27-24 take part in the decoding:
//!
//! | Bits 27-24 | Peripheral                  |
//! |------------|-----------------------------|
//! | `0x0-0x1`  | BIOS                        |
//! | `0x2`      | EWRAM                       |
//! | `0x3`      | IWRAM                       |
//! | `0x4`      | IO registers                |
//! | `0x5-0x7`  | Palette RAM, VRAM, OAM      |
//! | `0x8-0xF`  | Game Pak                    |
//!
//! Halfword and word accesses are rounded down to their natural alignment, they
//! never fault.
//!
//! The bus also owns the peripherals sitting behind the IO registers. Writes to
//! registers with side effects come back from the IO bank as a [`HookedWrite`] and
//! are forwarded to their peripheral before the access returns.

use serde::{Deserialize, Serialize};

use crate::cpu::hardware::dma::{Dma, StartTiming};
use crate::cpu::hardware::interrupt_control::Interrupt;
use crate::cpu::hardware::keypad::Keypad;
use crate::cpu::hardware::lcd::Lcd;
use crate::cpu::hardware::timers::Timers;
use crate::memory::IoDevice;
use crate::memory::bios::Bios;
use crate::memory::cartridge::Cartridge;
use crate::memory::io_registers::{HookedWrite, IoRegisters, WriteHook};
use crate::memory::wram::{EWRAM_SIZE, IWRAM_SIZE, Wram};

#[derive(Serialize, Deserialize)]
pub struct Bus {
    bios: Bios,
    ewram: Wram,
    iwram: Wram,
    pub io: IoRegisters,
    pub lcd: Lcd,
    cartridge: Cartridge,

    dma: Dma,
    timers: Timers,
    keypad: Keypad,
}

impl Default for Bus {
    fn default() -> Self {
        Self::new(Bios::default(), Cartridge::default())
    }
}

impl Bus {
    #[must_use]
    pub fn new(bios: Bios, cartridge: Cartridge) -> Self {
        let mut bus = Self {
            bios,
            ewram: Wram::new(EWRAM_SIZE),
            iwram: Wram::new(IWRAM_SIZE),
            io: IoRegisters::default(),
            lcd: Lcd::default(),
            cartridge,
            dma: Dma::default(),
            timers: Timers::default(),
            keypad: Keypad::default(),
        };
        bus.keypad.update([false; 10], &mut bus.io);

        bus
    }

    fn device(&self, address: u32) -> &dyn IoDevice {
        match (address >> 24) & 0xF {
            0x0 | 0x1 => &self.bios,
            0x2 => &self.ewram,
            0x3 => &self.iwram,
            0x5..=0x7 => &self.lcd.memory,
            _ => &self.cartridge,
        }
    }

    fn device_mut(&mut self, address: u32) -> &mut dyn IoDevice {
        match (address >> 24) & 0xF {
            0x0 | 0x1 => &mut self.bios,
            0x2 => &mut self.ewram,
            0x3 => &mut self.iwram,
            0x5..=0x7 => &mut self.lcd.memory,
            _ => &mut self.cartridge,
        }
    }

    const fn is_io(address: u32) -> bool {
        (address >> 24) & 0xF == 0x4
    }

    #[must_use]
    pub fn read_byte(&self, address: u32) -> u8 {
        if Self::is_io(address) {
            self.io.read_at(address)
        } else {
            self.device(address).read_at(address)
        }
    }

    #[must_use]
    pub fn read_half_word(&self, address: u32) -> u16 {
        let address = address & !1;

        if Self::is_io(address) {
            self.io.read_half_word(address)
        } else {
            self.device(address).read_half_word(address)
        }
    }

    #[must_use]
    pub fn read_word(&self, address: u32) -> u32 {
        let address = address & !3;

        if Self::is_io(address) {
            self.io.read_word(address)
        } else {
            self.device(address).read_word(address)
        }
    }

    pub fn write_byte(&mut self, address: u32, value: u8) {
        if Self::is_io(address) {
            if let Some(hooked) = self.io.write_at(address, value) {
                self.dispatch(hooked);
            }
        } else {
            self.device_mut(address).write_at(address, value);
        }
    }

    pub fn write_half_word(&mut self, address: u32, value: u16) {
        let address = address & !1;

        if Self::is_io(address) {
            if let Some(hooked) = self.io.write_half_word(address, value) {
                self.dispatch(hooked);
            }
        } else {
            self.device_mut(address).write_half_word(address, value);
        }
    }

    pub fn write_word(&mut self, address: u32, value: u32) {
        let address = address & !3;

        if Self::is_io(address) {
            // Each halfword may hit a different hooked register.
            self.write_half_word(address, value as u16);
            self.write_half_word(address + 2, (value >> 16) as u16);
        } else {
            self.device_mut(address).write_word(address, value);
        }
    }

    fn dispatch(&mut self, hooked: HookedWrite) {
        match hooked.hook {
            WriteHook::DmaControl(channel) => {
                self.dma.write_control(channel, hooked.value, &self.io);
            }
            WriteHook::TimerReload(channel) => {
                self.timers.write_reload(channel, hooked.value, hooked.lanes);
            }
            WriteHook::TimerControl(channel) => {
                self.timers
                    .write_control(channel, hooked.value, &mut self.io);
            }
            WriteHook::KeypadControl => self.keypad.check_interrupt(&mut self.io),
            WriteHook::InterruptAcknowledge => {
                self.io.acknowledge_interrupts(hooked.value, hooked.lanes);
            }
            WriteHook::AffineReference(affine) => {
                self.lcd.reload_affine_reference(affine, &self.io);
            }
        }
    }

    #[must_use]
    pub fn irq_pending(&self) -> bool {
        self.io.irq_pending()
    }

    /// Moves one unit for the highest priority running DMA channel.
    /// Returns false when no channel needs the bus.
    pub fn step_dma(&mut self) -> bool {
        let Some(transfer) = self.dma.next_transfer() else {
            return false;
        };

        if transfer.word {
            let value = self.read_word(transfer.source);
            self.write_word(transfer.destination, value);
        } else {
            let value = self.read_half_word(transfer.source);
            self.write_half_word(transfer.destination, value);
        }

        if let Some(interrupt) = self.dma.complete_transfer(transfer.channel, &mut self.io) {
            self.io.request_interrupt(interrupt);
        }

        true
    }

    /// Advances the LCD by one cycle, raising its interrupts and starting the DMA
    /// channels waiting for a blank. Returns true when a frame has just completed.
    pub fn step_lcd(&mut self) -> bool {
        let output = self.lcd.step(&mut self.io);

        if output.request_vblank_irq {
            self.io.request_interrupt(Interrupt::VBlank);
        }
        if output.request_hblank_irq {
            self.io.request_interrupt(Interrupt::HBlank);
        }
        if output.request_vcount_irq {
            self.io.request_interrupt(Interrupt::VCount);
        }

        if output.entered_vblank {
            self.dma.notify(StartTiming::VBlank);
        }
        if output.entered_hblank {
            self.dma.notify(StartTiming::HBlank);
        }

        output.entered_vblank
    }

    pub fn step_timers(&mut self) {
        self.timers.step(&mut self.io);
    }

    /// Button states in [`GbaButton::ALL`](crate::cpu::hardware::keypad::GbaButton::ALL) order.
    pub fn update_keys(&mut self, pressed: [bool; 10]) {
        self.keypad.update(pressed, &mut self.io);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::hardware::dma::control_register;
    use crate::cpu::hardware::lcd::LCD_HEIGHT;
    use crate::memory::bios::BIOS_SIZE;
    use crate::memory::io_registers::{DISPSTAT, IF, KEYCNT, KEYINPUT, TM0CNT_L};
    use pretty_assertions::assert_eq;

    const DMA3SAD: u32 = 0x0400_00D4;
    const DMA0SAD: u32 = 0x0400_00B0;

    #[test]
    fn check_region_routing() {
        let mut bios = vec![0; BIOS_SIZE];
        bios[0x10] = 0xAB;
        let cartridge = Cartridge::new(vec![0x11, 0x22, 0x33, 0x44]).unwrap();
        let mut bus = Bus::new(Bios::new(bios).unwrap(), cartridge);

        bus.write_word(0x0200_0000, 0x0102_0304);
        bus.write_word(0x0300_0000, 0x0506_0708);
        bus.write_half_word(0x0500_0000, 0x7FFF);
        bus.write_half_word(0x0600_0000, 0x1234);

        assert_eq!(bus.read_byte(0x0000_0010), 0xAB);
        assert_eq!(bus.read_word(0x0200_0000), 0x0102_0304);
        assert_eq!(bus.read_word(0x0300_0000), 0x0506_0708);
        assert_eq!(bus.read_half_word(0x0500_0000), 0x7FFF);
        assert_eq!(bus.lcd.memory.vram_half_word(0), 0x1234);
        assert_eq!(bus.read_word(0x0800_0000), 0x4433_2211);
        assert_eq!(bus.read_word(0x0C00_0000), 0x4433_2211);

        // Only bits 27-24 are decoded.
        assert_eq!(bus.read_word(0x1300_0000), 0x0506_0708);
    }

    #[test]
    fn check_unaligned_accesses_round_down() {
        let mut bus = Bus::default();

        bus.write_word(0x0300_0002, 0xDEAD_BEEF);
        assert_eq!(bus.read_word(0x0300_0000), 0xDEAD_BEEF);
        assert_eq!(bus.read_word(0x0300_0003), 0xDEAD_BEEF);
        assert_eq!(bus.read_half_word(0x0300_0003), 0xDEAD);

        bus.write_half_word(0x0300_0011, 0x1234);
        assert_eq!(bus.read_half_word(0x0300_0010), 0x1234);
    }

    #[test]
    fn check_bios_is_read_only() {
        let mut bus = Bus::default();

        bus.write_word(0x0000_0000, 0xFFFF_FFFF);
        assert_eq!(bus.read_word(0x0000_0000), 0);
    }

    #[test]
    fn check_immediate_dma_steals_the_bus() {
        let mut bus = Bus::default();
        bus.write_word(0x0300_0000, 0x1111_1111);
        bus.write_word(0x0300_0004, 0x2222_2222);

        bus.write_word(DMA3SAD, 0x0300_0000);
        bus.write_word(DMA3SAD + 4, 0x0200_0000);
        // Two words, 32 bit, immediate, enabled.
        bus.write_word(DMA3SAD + 8, 0x8400_0002);

        assert!(bus.step_dma());
        assert!(bus.step_dma());
        assert!(!bus.step_dma());

        assert_eq!(bus.read_word(0x0200_0000), 0x1111_1111);
        assert_eq!(bus.read_word(0x0200_0004), 0x2222_2222);
        assert_eq!(bus.io.get(control_register(3)) & 0x8000, 0);
    }

    #[test]
    fn check_dma_irq() {
        let mut bus = Bus::default();
        bus.write_half_word(0x0300_0000, 0xBEEF);

        bus.write_word(DMA0SAD, 0x0300_0000);
        bus.write_word(DMA0SAD + 4, 0x0300_0100);
        // One halfword, immediate, IRQ on completion.
        bus.write_word(DMA0SAD + 8, 0xC000_0001);

        assert!(bus.step_dma());

        assert_eq!(bus.read_half_word(0x0300_0100), 0xBEEF);
        assert_eq!(bus.io.get(IF), 1 << Interrupt::Dma0 as u16);
    }

    #[test]
    fn check_vblank_dma_and_irq() {
        let mut bus = Bus::default();
        bus.write_half_word(0x0300_0000, 0x00FF);

        bus.write_word(DMA0SAD, 0x0300_0000);
        bus.write_word(DMA0SAD + 4, 0x0500_0000);
        // One halfword on VBlank.
        bus.write_word(DMA0SAD + 8, 0x9000_0001);
        bus.write_half_word(DISPSTAT, 1 << 3);

        assert!(!bus.step_dma());

        let cycles_to_vblank = 4 * 308 * LCD_HEIGHT;
        let frame_ready = (0..cycles_to_vblank).filter(|_| bus.step_lcd()).count();

        assert_eq!(frame_ready, 1);
        assert_eq!(bus.io.get(IF), 1 << Interrupt::VBlank as u16);

        assert!(bus.step_dma());
        assert_eq!(bus.read_half_word(0x0500_0000), 0x00FF);
    }

    #[test]
    fn check_interrupt_acknowledge() {
        let mut bus = Bus::default();
        bus.io.request_interrupt(Interrupt::VBlank);
        bus.io.request_interrupt(Interrupt::Timer0);

        bus.write_half_word(IF, 1 << Interrupt::VBlank as u16);
        assert_eq!(bus.read_half_word(IF), 1 << Interrupt::Timer0 as u16);

        // Writing the high byte leaves the low byte untouched.
        bus.write_byte(IF + 1, 0xFF);
        assert_eq!(bus.read_half_word(IF), 1 << Interrupt::Timer0 as u16);
    }

    #[test]
    fn check_timer_through_the_bus() {
        let mut bus = Bus::default();

        bus.write_half_word(TM0CNT_L, 0xFFFE);
        // Prescaler 1, IRQ, operate.
        bus.write_half_word(TM0CNT_L + 2, 0x00C0);
        assert_eq!(bus.read_half_word(TM0CNT_L), 0xFFFE);

        bus.step_timers();
        assert_eq!(bus.read_half_word(TM0CNT_L), 0xFFFF);
        assert_eq!(bus.io.get(IF), 0);

        bus.step_timers();
        assert_eq!(bus.read_half_word(TM0CNT_L), 0xFFFE);
        assert_eq!(bus.io.get(IF), 1 << Interrupt::Timer0 as u16);
    }

    #[test]
    fn check_keypad_through_the_bus() {
        let mut bus = Bus::default();
        assert_eq!(bus.read_half_word(KEYINPUT), 0x03FF);

        let mut pressed = [false; 10];
        pressed[3] = true;
        bus.update_keys(pressed);
        assert_eq!(bus.read_half_word(KEYINPUT), 0x03F7);
        assert_eq!(bus.io.get(IF), 0);

        // Enabling the IRQ while Start is held raises it right away.
        bus.write_half_word(KEYCNT, 0x4008);
        assert_eq!(bus.io.get(IF), 1 << Interrupt::Keypad as u16);
    }
    #[test]
    fn check_affine_reference_write_mid_frame() {
        let mut bus = Bus::default();
        for _ in 0..10 {
            bus.step_lcd();
        }

        // BG2X, negative 28-bit value.
        bus.write_word(0x0400_0028, 0x0FFF_FF00);
        // BG2Y_L, low byte only.
        bus.write_byte(0x0400_002C, 0x40);

        assert_eq!(bus.lcd.affine_reference[0], (-0x100, 0x40));
        assert_eq!(bus.read_word(0x0400_0028), 0);
    }
}
