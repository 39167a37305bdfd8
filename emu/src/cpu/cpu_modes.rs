//! # Processor Modes
//!
//! The low five bits of CPSR select the operating mode. Each mode decides which
//! physical registers back R8-R14 and which SPSR is visible:
//!
//! ```text
//! ┌──────────┬───────┬──────────┬──────────┬──────┐
//! │ Mode     │ Bits  │ R8-R12   │ R13-R14  │ SPSR │
//! ├──────────┼───────┼──────────┼──────────┼──────┤
//! │ User     │ 10000 │ shared   │ user     │  -   │
//! │ FIQ      │ 10001 │ fiq      │ fiq      │ fiq  │
//! │ IRQ      │ 10010 │ shared   │ irq      │ irq  │
//! │ SVC      │ 10011 │ shared   │ svc      │ svc  │
//! │ Abort    │ 10111 │ shared   │ abt      │ abt  │
//! │ Undef    │ 11011 │ shared   │ und      │ und  │
//! │ System   │ 11111 │ shared   │ user     │  -   │
//! └──────────┴───────┴──────────┴──────────┴──────┘
//! ```
//!
//! The 26-bit compatibility values (`0b000xx`) are still accepted: they bank exactly
//! like their 32-bit counterparts.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    UserOld = 0b00000,
    FiqOld = 0b00001,
    IrqOld = 0b00010,
    SupervisorOld = 0b00011,

    /// The normal ARM program execution state.
    User = 0b10000,

    /// Designed to support a data transfer or channel process.
    Fiq = 0b10001,

    /// Used for general-purpose interrupt handling.
    Irq = 0b10010,

    /// Protected mode for the operating system
    Supervisor = 0b10011,

    /// Entered after a data or instruction prefetch abort.
    Abort = 0b10111,

    /// Entered when an undefined instruction is executed
    Undefined = 0b11011,

    /// A privileged user mode for the operating system.
    System = 0b11111,
}

impl Mode {
    /// Maps the 26-bit compatibility modes to the mode they bank like.
    #[must_use]
    pub const fn canonical(self) -> Self {
        match self {
            Self::UserOld => Self::User,
            Self::FiqOld => Self::Fiq,
            Self::IrqOld => Self::Irq,
            Self::SupervisorOld => Self::Supervisor,
            other => other,
        }
    }

    /// User and System share every register and have no SPSR.
    #[must_use]
    pub const fn has_spsr(self) -> bool {
        !matches!(self.canonical(), Self::User | Self::System)
    }
}

impl From<Mode> for u32 {
    fn from(m: Mode) -> Self {
        m as Self
    }
}

impl TryFrom<u32> for Mode {
    /// The rejected mode bits.
    type Error = u32;

    fn try_from(n: u32) -> Result<Self, Self::Error> {
        match n {
            0b00000 => Ok(Self::UserOld),
            0b00001 => Ok(Self::FiqOld),
            0b00010 => Ok(Self::IrqOld),
            0b00011 => Ok(Self::SupervisorOld),
            0b10000 => Ok(Self::User),
            0b10001 => Ok(Self::Fiq),
            0b10010 => Ok(Self::Irq),
            0b10011 => Ok(Self::Supervisor),
            0b10111 => Ok(Self::Abort),
            0b11011 => Ok(Self::Undefined),
            0b11111 => Ok(Self::System),
            _ => Err(n),
        }
    }
}
