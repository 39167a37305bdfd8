//! IO-mapped peripherals. Their registers live in the IO bank, the state that
//! software cannot see (latched DMA addresses, timer prescalers, LCD dot clock)
//! lives here.

pub mod dma;
pub mod interrupt_control;
pub mod keypad;

#[allow(clippy::cast_sign_loss)]
#[allow(clippy::cast_possible_wrap)]
pub mod lcd;
pub mod timers;
