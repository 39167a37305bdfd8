//! # Banked Registers for Exception Modes
//!
//! Storage for registers that are swapped when changing CPU modes.
//! See [`cpu_modes`](super::cpu_modes) for the banking table.
//!
//! FIQ banks R8-R14, every other privileged mode banks only R13-R14 and shares
//! R8-R12 with User/System. The slot of the mode currently running is stale: its
//! live values are in [`Registers`] until the next switch.

use serde::{Deserialize, Serialize};

use crate::cpu::cpu_modes::Mode;
use crate::cpu::psr::Psr;
use crate::cpu::registers::Registers;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct RegisterBank {
    /// R8-R14 of User/System (R8-R12 also used by IRQ, SVC, ABT and UND).
    pub user: [u32; 7],
    /// R8-R14 of FIQ.
    pub fiq: [u32; 7],
    /// R13-R14 of IRQ.
    pub irq: [u32; 2],
    /// R13-R14 of Supervisor.
    pub svc: [u32; 2],
    /// R13-R14 of Abort.
    pub abt: [u32; 2],
    /// R13-R14 of Undefined.
    pub und: [u32; 2],

    pub spsr_fiq: Psr,
    pub spsr_svc: Psr,
    pub spsr_abt: Psr,
    pub spsr_irq: Psr,
    pub spsr_und: Psr,
}

impl RegisterBank {
    /// R13-R14 banked for `mode`.
    const fn stack(&self, mode: Mode) -> [u32; 2] {
        match mode.canonical() {
            Mode::Irq => self.irq,
            Mode::Supervisor => self.svc,
            Mode::Abort => self.abt,
            Mode::Undefined => self.und,
            _ => [self.user[5], self.user[6]],
        }
    }

    /// Copies R8-R14 of the outgoing `mode` into its bank.
    pub fn store(&mut self, mode: Mode, registers: &Registers) {
        if mode.canonical() == Mode::Fiq {
            for (index, slot) in self.fiq.iter_mut().enumerate() {
                *slot = registers.register_at(8 + index);
            }
            return;
        }

        for (index, slot) in self.user.iter_mut().take(5).enumerate() {
            *slot = registers.register_at(8 + index);
        }

        let stack = [registers.register_at(13), registers.register_at(14)];
        match mode.canonical() {
            Mode::Irq => self.irq = stack,
            Mode::Supervisor => self.svc = stack,
            Mode::Abort => self.abt = stack,
            Mode::Undefined => self.und = stack,
            _ => self.user[5..].copy_from_slice(&stack),
        }
    }

    /// Loads R8-R14 of the incoming `mode` from its bank.
    pub fn restore(&self, mode: Mode, registers: &mut Registers) {
        if mode.canonical() == Mode::Fiq {
            for (index, value) in self.fiq.iter().enumerate() {
                registers.set_register_at(8 + index, *value);
            }
            return;
        }

        for (index, value) in self.user.iter().take(5).enumerate() {
            registers.set_register_at(8 + index, *value);
        }

        let [sp, lr] = self.stack(mode);
        registers.set_register_at(13, sp);
        registers.set_register_at(14, lr);
    }

    /// SPSR of `mode`, `None` for User and System.
    #[must_use]
    pub const fn spsr(&self, mode: Mode) -> Option<Psr> {
        match mode.canonical() {
            Mode::Fiq => Some(self.spsr_fiq),
            Mode::Irq => Some(self.spsr_irq),
            Mode::Supervisor => Some(self.spsr_svc),
            Mode::Abort => Some(self.spsr_abt),
            Mode::Undefined => Some(self.spsr_und),
            _ => None,
        }
    }

    pub const fn spsr_mut(&mut self, mode: Mode) -> Option<&mut Psr> {
        match mode.canonical() {
            Mode::Fiq => Some(&mut self.spsr_fiq),
            Mode::Irq => Some(&mut self.spsr_irq),
            Mode::Supervisor => Some(&mut self.spsr_svc),
            Mode::Abort => Some(&mut self.spsr_abt),
            Mode::Undefined => Some(&mut self.spsr_und),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn numbered_registers() -> Registers {
        let mut registers = Registers::default();
        for reg in 0..16 {
            registers.set_register_at(reg, reg as u32 * 0x11);
        }
        registers
    }

    #[test]
    fn check_fiq_banks_everything() {
        let mut bank = RegisterBank::default();
        let mut registers = numbered_registers();

        bank.store(Mode::System, &registers);
        bank.restore(Mode::Fiq, &mut registers);

        for reg in 8..=14 {
            assert_eq!(registers.register_at(reg), 0);
        }
        assert_eq!(registers.register_at(7), 0x77);

        bank.store(Mode::Fiq, &registers);
        bank.restore(Mode::System, &mut registers);

        assert_eq!(registers.register_at(8), 0x88);
        assert_eq!(registers.register_at(14), 0xEE);
    }

    #[test]
    fn check_irq_shares_low_registers() {
        let mut bank = RegisterBank::default();
        let mut registers = numbered_registers();
        bank.irq = [0x0300_7FA0, 0x1234];

        bank.store(Mode::System, &registers);
        bank.restore(Mode::Irq, &mut registers);

        assert_eq!(registers.register_at(12), 0xCC);
        assert_eq!(registers.register_at(13), 0x0300_7FA0);
        assert_eq!(registers.register_at(14), 0x1234);

        registers.set_register_at(13, 0x0300_7F90);
        bank.store(Mode::IrqOld, &registers);
        assert_eq!(bank.irq[0], 0x0300_7F90);
    }

    #[test]
    fn check_spsr_per_mode() {
        let mut bank = RegisterBank::default();

        if let Some(spsr) = bank.spsr_mut(Mode::Supervisor) {
            spsr.set_carry_flag(true);
        }

        assert_eq!(bank.spsr(Mode::User), None);
        assert!(bank.spsr(Mode::SupervisorOld).is_some_and(Psr::carry_flag));
        assert!(bank.spsr(Mode::Irq).is_some_and(|spsr| !spsr.carry_flag()));
    }
}
