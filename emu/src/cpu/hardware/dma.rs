//! # DMA controller
//!
//! Four channels copy halfwords or words through the bus while the CPU is stalled.
//! A channel is armed by the rising edge of the enable bit in DMAxCNT_H: the
//! source, destination and count are latched from the IO registers at that moment.
//!
//! ```text
//! DMAxCNT_H
//!  15  enable            11  game pak DRQ (DMA3)
//!  14  IRQ on completion 10  32-bit transfer
//!  12-13 start timing     9  repeat
//!  7-8 source control    5-6 destination control
//! ```
//!
//! Only one unit moves per cycle. Lower channels win when several are running.

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::cpu::hardware::interrupt_control::Interrupt;
use crate::memory::io_registers::{DMA0CNT_H, DMA0SAD_L, IoRegisters};

const CHANNEL_STRIDE: u32 = 12;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressControl {
    #[default]
    Increment,
    Decrement,
    Fixed,
    /// Increments, and the destination reloads when a repeating transfer restarts.
    IncrementReload,
}

impl From<u16> for AddressControl {
    fn from(value: u16) -> Self {
        match value & 0b11 {
            0 => Self::Increment,
            1 => Self::Decrement,
            2 => Self::Fixed,
            _ => Self::IncrementReload,
        }
    }
}

impl AddressControl {
    const fn apply(self, address: u32, unit: u32) -> u32 {
        match self {
            Self::Increment | Self::IncrementReload => address.wrapping_add(unit),
            Self::Decrement => address.wrapping_sub(unit),
            Self::Fixed => address,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartTiming {
    #[default]
    Immediate,
    VBlank,
    HBlank,
    /// Sound FIFO and video capture, never triggered here.
    Special,
}

impl From<u16> for StartTiming {
    fn from(value: u16) -> Self {
        match value & 0b11 {
            0 => Self::Immediate,
            1 => Self::VBlank,
            2 => Self::HBlank,
            _ => Self::Special,
        }
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct DmaChannel {
    source: u32,
    destination: u32,
    /// Units left in the current transfer.
    remaining: u32,
    source_control: AddressControl,
    destination_control: AddressControl,
    repeat: bool,
    word_transfer: bool,
    start_timing: StartTiming,
    irq: bool,
    enabled: bool,
    running: bool,
}

impl DmaChannel {
    const fn unit_size(&self) -> u32 {
        if self.word_transfer { 4 } else { 2 }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }
}

/// One halfword or word to move on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaTransfer {
    pub channel: usize,
    pub source: u32,
    pub destination: u32,
    pub word: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Dma {
    pub channels: [DmaChannel; 4],
}

const fn address_mask(channel: usize) -> u32 {
    if channel == 3 { 0x0FFF_FFFF } else { 0x07FF_FFFF }
}

/// CNT_L of 0 stands for the largest count.
fn word_count(io: &IoRegisters, channel: usize) -> u32 {
    match io.get(register_address(channel, 8)) {
        0 if channel == 3 => 0x1_0000,
        0 => 0x4000,
        count => u32::from(count),
    }
}

fn register_address(channel: usize, offset: u32) -> u32 {
    DMA0SAD_L + channel as u32 * CHANNEL_STRIDE + offset
}

fn read_address(io: &IoRegisters, channel: usize, offset: u32) -> u32 {
    let low = u32::from(io.get(register_address(channel, offset)));
    let high = u32::from(io.get(register_address(channel, offset + 2)));

    ((high << 16) | low) & address_mask(channel)
}

impl Dma {
    /// DMAxCNT_H write. `value` is the raw value, the enable bit included.
    pub fn write_control(&mut self, channel: usize, value: u16, io: &IoRegisters) {
        let dma = &mut self.channels[channel];

        if !value.get_bit(15) {
            dma.enabled = false;
            dma.running = false;
            return;
        }

        if dma.enabled {
            return;
        }

        dma.source = read_address(io, channel, 0);
        dma.destination = read_address(io, channel, 4);
        dma.remaining = word_count(io, channel);
        dma.destination_control = AddressControl::from(value.get_bits(5..=6));
        dma.source_control = AddressControl::from(value.get_bits(7..=8));
        dma.repeat = value.get_bit(9);
        dma.word_transfer = value.get_bit(10);
        dma.start_timing = StartTiming::from(value.get_bits(12..=13));
        dma.irq = value.get_bit(14);
        dma.enabled = true;
        dma.running = dma.start_timing == StartTiming::Immediate;

        tracing::debug!(
            "DMA {channel} enabled, SAD={:08X} DAD={:08X} CNT={:04X} {:?}",
            dma.source,
            dma.destination,
            dma.remaining,
            dma.start_timing
        );
    }

    /// Starts the armed channels waiting for `timing` (VBlank or HBlank).
    pub fn notify(&mut self, timing: StartTiming) {
        for dma in &mut self.channels {
            if dma.enabled && !dma.running && dma.start_timing == timing {
                dma.running = true;
            }
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.channels.iter().any(DmaChannel::is_running)
    }

    /// The unit the highest priority running channel moves next.
    #[must_use]
    pub fn next_transfer(&self) -> Option<DmaTransfer> {
        self.channels
            .iter()
            .position(DmaChannel::is_running)
            .map(|channel| {
                let dma = &self.channels[channel];
                DmaTransfer {
                    channel,
                    source: dma.source,
                    destination: dma.destination,
                    word: dma.word_transfer,
                }
            })
    }

    /// Advances the addresses after a unit moved. On completion the channel
    /// either re-arms (repeat) or disables itself, and the IRQ to raise is returned.
    pub fn complete_transfer(&mut self, channel: usize, io: &mut IoRegisters) -> Option<Interrupt> {
        let dma = &mut self.channels[channel];
        let unit = dma.unit_size();

        dma.source = dma.source_control.apply(dma.source, unit);
        dma.destination = dma.destination_control.apply(dma.destination, unit);
        dma.remaining -= 1;

        if dma.remaining > 0 {
            return None;
        }

        dma.running = false;

        if dma.repeat && dma.start_timing != StartTiming::Immediate {
            dma.remaining = word_count(io, channel);

            if dma.destination_control == AddressControl::IncrementReload {
                dma.destination = read_address(io, channel, 4);
            }
        } else {
            dma.enabled = false;

            let control = register_address(channel, 10);
            let value = io.get(control);
            io.set(control, value & 0x7FFF);
        }

        tracing::debug!("DMA {channel} finished");

        dma.irq.then(|| Interrupt::dma(channel))
    }
}

/// DMAxCNT_H address of `channel`.
#[must_use]
pub const fn control_register(channel: usize) -> u32 {
    DMA0CNT_H + channel as u32 * CHANNEL_STRIDE
}
