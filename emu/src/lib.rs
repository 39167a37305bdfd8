//! Game Boy Advance emulation core.
//!
//! [`gba::Gba`] owns the whole machine and advances it one hardware cycle at a
//! time. Everything the CPU can reach hangs off the [`bus::Bus`].

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
#[allow(clippy::cast_possible_wrap)]
pub mod bitwise;

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::unreadable_literal)]
pub mod bus;
pub mod cpu;
pub mod error;
pub mod gba;

#[allow(clippy::cast_possible_truncation)]
pub mod memory;
