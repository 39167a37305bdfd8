//! # Timers
//!
//! Four 16-bit up-counters. Each one ticks every 1, 64, 256 or 1024 cycles, or in
//! count-up mode once per overflow of the previous channel (never for timer 0).
//! On overflow the counter restarts from its reload value and may raise its IRQ.
//!
//! TMxCNT_L reads the live counter and writes the reload value, which is why the
//! counter is mirrored into the IO bank after every change.

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::cpu::hardware::interrupt_control::Interrupt;
use crate::memory::io_registers::{IoRegisters, TM0CNT_L};

const PRESCALER_PERIODS: [u32; 4] = [1, 64, 256, 1024];

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct TimerChannel {
    counter: u16,
    reload: u16,
    period: u32,
    /// Cycles accumulated towards the next tick.
    elapsed: u32,
    count_up: bool,
    irq: bool,
    operate: bool,
}

impl TimerChannel {
    #[must_use]
    pub const fn counter(&self) -> u16 {
        self.counter
    }

    /// Returns true on overflow.
    fn increment(&mut self) -> bool {
        let (counter, overflow) = self.counter.overflowing_add(1);
        self.counter = if overflow { self.reload } else { counter };
        overflow
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Timers {
    pub channels: [TimerChannel; 4],
}

fn counter_register(channel: usize) -> u32 {
    TM0CNT_L + channel as u32 * 4
}

impl Timers {
    /// TMxCNT_L write, only the byte `lanes` written replace the reload value.
    pub fn write_reload(&mut self, channel: usize, value: u16, lanes: u16) {
        let timer = &mut self.channels[channel];
        timer.reload = (timer.reload & !lanes) | (value & lanes);
    }

    pub fn write_control(&mut self, channel: usize, value: u16, io: &mut IoRegisters) {
        let timer = &mut self.channels[channel];
        let was_operating = timer.operate;

        timer.period = PRESCALER_PERIODS[usize::from(value.get_bits(0..=1))];
        timer.irq = value.get_bit(6);
        timer.operate = value.get_bit(7);

        if channel == 0 {
            // Nothing precedes timer 0.
            timer.count_up = false;
            let control = io.get(TM0CNT_L + 2);
            io.set(TM0CNT_L + 2, control & !0b100);
        } else {
            timer.count_up = value.get_bit(2);
        }

        if timer.operate && !was_operating {
            timer.counter = timer.reload;
            timer.elapsed = 0;
            io.set(counter_register(channel), timer.counter);
        }
    }

    /// Advances every channel by one cycle.
    pub fn step(&mut self, io: &mut IoRegisters) {
        let mut previous_overflowed = false;

        for (channel, timer) in self.channels.iter_mut().enumerate() {
            let overflowed = if !timer.operate {
                false
            } else if timer.count_up {
                previous_overflowed && timer.increment()
            } else {
                timer.elapsed += 1;
                if timer.elapsed < timer.period {
                    false
                } else {
                    timer.elapsed = 0;
                    timer.increment()
                }
            };

            if timer.operate && (!timer.count_up || previous_overflowed) {
                io.set(counter_register(channel), timer.counter);
            }

            if overflowed {
                tracing::trace!("timer {channel} overflow");

                if timer.irq {
                    io.request_interrupt(Interrupt::timer(channel));
                }
            }

            previous_overflowed = overflowed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::io_registers::IF;
    use pretty_assertions::assert_eq;

    #[test]
    fn check_prescaler() {
        let mut io = IoRegisters::default();
        let mut timers = Timers::default();

        timers.write_reload(1, 0xFFF0, 0xFFFF);
        // F/64, enabled.
        timers.write_control(1, 0x0081, &mut io);
        assert_eq!(io.read_half_word(counter_register(1)), 0xFFF0);

        for _ in 0..63 {
            timers.step(&mut io);
        }
        assert_eq!(timers.channels[1].counter(), 0xFFF0);

        timers.step(&mut io);
        assert_eq!(timers.channels[1].counter(), 0xFFF1);
        assert_eq!(io.read_half_word(counter_register(1)), 0xFFF1);
    }

    #[test]
    fn check_overflow_reload_and_irq() {
        let mut io = IoRegisters::default();
        let mut timers = Timers::default();

        timers.write_reload(0, 0xFFFE, 0xFFFF);
        timers.write_control(0, 0x00C0, &mut io);

        timers.step(&mut io);
        assert_eq!(timers.channels[0].counter(), 0xFFFF);
        assert_eq!(io.get(IF), 0);

        timers.step(&mut io);
        assert_eq!(timers.channels[0].counter(), 0xFFFE);
        assert_eq!(io.get(IF), 1 << Interrupt::Timer0 as u16);
    }

    #[test]
    fn check_cascade() {
        let mut io = IoRegisters::default();
        let mut timers = Timers::default();

        timers.write_reload(0, 0xFFFF, 0xFFFF);
        timers.write_control(0, 0x0080, &mut io);
        // Count-up with IRQ.
        timers.write_control(1, 0x00C4, &mut io);

        for _ in 0..3 {
            timers.step(&mut io);
        }

        assert_eq!(timers.channels[1].counter(), 3);
        assert_eq!(io.read_half_word(counter_register(1)), 3);
    }

    #[test]
    fn check_timer_0_cannot_count_up() {
        let mut io = IoRegisters::default();
        let mut timers = Timers::default();

        io.write_half_word(TM0CNT_L + 2, 0x0084);
        timers.write_control(0, 0x0084, &mut io);

        assert!(!timers.channels[0].count_up);
        assert_eq!(io.read_half_word(TM0CNT_L + 2), 0x0080);

        timers.step(&mut io);
        assert_eq!(timers.channels[0].counter(), 1);
    }
}
