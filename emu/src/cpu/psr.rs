//! # Program Status Registers (CPSR and SPSR)
//!
//! The PSR contains condition flags (N, Z, C, V) and control bits (mode, state, interrupts).
//!
//! ```text
//! 31 30 29 28 27          8 7 6 5 4   0
//! ┌──┬──┬──┬──┬────────────┬─┬─┬─┬─────┐
//! │N │Z │C │V │  Reserved  │I│F│T│Mode │
//! └──┴──┴──┴──┴────────────┴─┴─┴─┴─────┘
//! ```
//!
//! - **Flags (28-31)**: See [`condition`](super::condition) for how these are tested
//! - **Mode (0-4)**: See [`cpu_modes`](super::cpu_modes), only the legal values can be stored
//! - **T bit (5)**: ARM (0) or Thumb (1) state
//! - **I/F bits (6-7)**: IRQ/FIQ disable
//!
//! A `Psr` never holds an illegal mode: every raw value goes through [`TryFrom<u32>`]
//! which hands back the offending mode bits instead.

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::cpu::arm::alu_instruction::ArithmeticOpResult;
use crate::cpu::{condition::Condition, cpu_modes::Mode};

/// Program Status Register (CPSR or SPSR).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Psr(u32);

impl Psr {
    pub(crate) fn can_execute(self, cond: Condition) -> bool {
        use Condition::{AL, CC, CS, EQ, GE, GT, HI, LE, LS, LT, MI, NE, NV, PL, VC, VS};
        match cond {
            EQ => self.zero_flag(),
            NE => !self.zero_flag(),
            CS => self.carry_flag(),
            CC => !self.carry_flag(),
            MI => self.sign_flag(),
            PL => !self.sign_flag(),
            VS => self.overflow_flag(),
            VC => !self.overflow_flag(),
            HI => self.carry_flag() && !self.zero_flag(),
            LS => !self.carry_flag() || self.zero_flag(),
            GE => self.sign_flag() == self.overflow_flag(),
            LT => self.sign_flag() != self.overflow_flag(),
            GT => !self.zero_flag() && (self.sign_flag() == self.overflow_flag()),
            LE => self.zero_flag() || (self.sign_flag() != self.overflow_flag()),
            AL => true,
            NV => false,
        }
    }

    /// N => Bit 31, (0=Not Signed, 1=Signed)
    #[must_use]
    pub fn sign_flag(self) -> bool {
        self.0.get_bit(31)
    }

    /// Z => Bit 30, (0=Not Zero, 1=Zero)
    #[must_use]
    pub fn zero_flag(self) -> bool {
        self.0.get_bit(30)
    }

    /// C => Bit 29, (0=Borrow/No Carry, 1=Carry/No Borrow)
    #[must_use]
    pub fn carry_flag(self) -> bool {
        self.0.get_bit(29)
    }

    /// V => Bit 28, (0=No Overflow, 1=Overflow)
    #[must_use]
    pub fn overflow_flag(self) -> bool {
        self.0.get_bit(28)
    }

    /// I => Bit 7, (0=Enable, 1=Disable)
    #[must_use]
    pub fn irq_disable(self) -> bool {
        self.0.get_bit(7)
    }

    /// T => Bit 5, (0=ARM, 1=THUMB)
    #[must_use]
    pub fn state_bit(self) -> bool {
        self.0.get_bit(5)
    }

    /// M4-M0 => Bits 4-0
    #[must_use]
    pub fn mode(self) -> Mode {
        // Construction rejects illegal modes so the fallback is never taken.
        Mode::try_from(self.0.get_bits(0..=4)).unwrap_or(Mode::System)
    }

    pub fn set_sign_flag(&mut self, value: bool) {
        self.0.set_bit(31, value);
    }

    pub fn set_zero_flag(&mut self, value: bool) {
        self.0.set_bit(30, value);
    }

    pub fn set_carry_flag(&mut self, value: bool) {
        self.0.set_bit(29, value);
    }

    pub fn set_overflow_flag(&mut self, value: bool) {
        self.0.set_bit(28, value);
    }

    /// N and Z from a result, used by every logical operation.
    pub fn set_sign_and_zero(&mut self, result: u32) {
        self.set_sign_flag(result.get_bit(31));
        self.set_zero_flag(result == 0);
    }

    pub fn set_flags(&mut self, op_result: &ArithmeticOpResult) {
        self.set_carry_flag(op_result.carry);
        self.set_zero_flag(op_result.zero);
        self.set_sign_flag(op_result.sign);
        self.set_overflow_flag(op_result.overflow);
    }

    pub fn set_irq_disable(&mut self, value: bool) {
        self.0.set_bit(7, value);
    }

    pub fn set_state_bit(&mut self, value: bool) {
        self.0.set_bit(5, value);
    }

    /// The Mode Bits M4-M0 contain the current operating mode.
    pub fn set_mode(&mut self, m: Mode) {
        self.0.set_bits(0..=4, m.into());
    }

    #[must_use]
    pub fn cpu_state(self) -> CpuState {
        self.state_bit().into()
    }

    pub fn set_cpu_state(&mut self, state: CpuState) {
        self.set_state_bit(state.into());
    }
}

impl From<Mode> for Psr {
    fn from(m: Mode) -> Self {
        let mut s = Self(0);

        s.set_mode(m);

        s
    }
}

impl TryFrom<u32> for Psr {
    /// The illegal mode bits.
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Mode::try_from(value.get_bits(0..=4))?;

        Ok(Self(value))
    }
}

impl From<Psr> for u32 {
    fn from(p: Psr) -> Self {
        p.0
    }
}

/// The CPU execution state (ARM or Thumb).
///
/// Controlled by the T bit (bit 5) in CPSR. Switch via `BX Rn`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuState {
    /// Thumb: 16-bit instructions. See `thumb` module.
    Thumb,
    /// ARM: 32-bit instructions. See `arm` module.
    Arm,
}

impl From<CpuState> for bool {
    fn from(state: CpuState) -> Self {
        match state {
            CpuState::Arm => false,
            CpuState::Thumb => true,
        }
    }
}

impl From<bool> for CpuState {
    fn from(state: bool) -> Self {
        if state { Self::Thumb } else { Self::Arm }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn check_flags() {
        let mut cpsr = Psr::default();

        cpsr.set_sign_flag(true);
        cpsr.set_carry_flag(true);
        assert!(cpsr.sign_flag());
        assert!(cpsr.carry_flag());
        assert!(!cpsr.zero_flag());
        assert_eq!(u32::from(cpsr), 0xA000_0000);

        cpsr.set_sign_and_zero(0);
        assert!(cpsr.zero_flag());
        assert!(!cpsr.sign_flag());
    }

    #[test]
    fn check_control_bits() {
        let mut cpsr = Psr::from(Mode::System);

        cpsr.set_irq_disable(true);
        cpsr.set_cpu_state(CpuState::Thumb);

        assert_eq!(u32::from(cpsr), 0b1011_1111);
        assert_eq!(cpsr.cpu_state(), CpuState::Thumb);
    }

    #[test]
    fn check_mode_round_trip() {
        for mode in [
            Mode::User,
            Mode::Fiq,
            Mode::Irq,
            Mode::Supervisor,
            Mode::Abort,
            Mode::Undefined,
            Mode::System,
            Mode::UserOld,
        ] {
            let mut psr = Psr::try_from(0xF000_0000).unwrap();
            psr.set_mode(mode);

            assert_eq!(psr.mode(), mode);
            assert_eq!(u32::from(psr) & 0xF000_0000, 0xF000_0000);
        }
    }

    #[test]
    fn check_illegal_mode_rejected() {
        assert_eq!(Psr::try_from(0x6000_0007), Err(0b00111));
        assert_eq!(Psr::try_from(0x6000_001F).map(Psr::mode), Ok(Mode::System));
    }

    #[test]
    fn check_conditions() {
        let mut psr = Psr::default();
        psr.set_zero_flag(true);

        assert!(psr.can_execute(Condition::EQ));
        assert!(!psr.can_execute(Condition::NE));
        assert!(psr.can_execute(Condition::LS));
        assert!(!psr.can_execute(Condition::HI));
        assert!(psr.can_execute(Condition::GE));
        assert!(!psr.can_execute(Condition::GT));
        assert!(psr.can_execute(Condition::LE));
        assert!(psr.can_execute(Condition::AL));
        assert!(!psr.can_execute(Condition::NV));

        psr.set_zero_flag(false);
        psr.set_sign_flag(true);
        assert!(psr.can_execute(Condition::LT));
        assert!(psr.can_execute(Condition::MI));

        psr.set_overflow_flag(true);
        assert!(psr.can_execute(Condition::GT));
        assert!(psr.can_execute(Condition::VS));
    }
}
