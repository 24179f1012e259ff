//! Status snapshot and report
//!
//! All registers of all boards are read in one lock hold, so the report is
//! a consistent picture of the crate. Rendering happens afterwards, outside
//! the lock.

use crate::bus::{BusType, VmeBus};
use crate::error::Result;
use crate::register_file::RegisterFile;
use crate::registry::DeviceRegistry;
use std::fmt;
use vld_chip::regs::{self, OUTPUT_COUNT};
use vld_chip::timing::{bleach_seconds, random_pulser_hz};
use vld_chip::vme::MAX_VME_SLOTS;
use vld_chip::{FirmwareVersion, LedHalf, Register, TriggerTiming};

/// Raw register contents of one board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardStatus {
    /// Slot id.
    pub slot: u32,
    /// VME A24 base address.
    pub address: u32,
    /// Fixed registers, in [`Register::STATUS_SET`] order.
    pub registers: Vec<(Register, u32)>,
    /// LED connector control pairs, low then high.
    pub leds: [(u32, u32); OUTPUT_COUNT],
}

impl BoardStatus {
    fn read<B: VmeBus + ?Sized>(
        regs: &mut RegisterFile<'_, B>,
        slot: u32,
        address: u32,
    ) -> Result<Self> {
        let registers = Register::STATUS_SET
            .iter()
            .map(|&reg| regs.read(reg).map(|value| (reg, value)))
            .collect::<Result<Vec<_>>>()?;

        let mut leds = [(0, 0); OUTPUT_COUNT];
        for (connector, pair) in (0u8..).zip(leds.iter_mut()) {
            let low = Register::Led {
                connector,
                half: LedHalf::Low,
            };
            let high = Register::Led {
                connector,
                half: LedHalf::High,
            };
            *pair = (regs.read(low)?, regs.read(high)?);
        }

        Ok(Self {
            slot,
            address,
            registers,
            leds,
        })
    }

    /// Value of a fixed register from the snapshot (0 if not captured).
    pub fn get(&self, reg: Register) -> u32 {
        self.registers
            .iter()
            .find(|(r, _)| *r == reg)
            .map_or(0, |(_, v)| *v)
    }
}

/// Snapshot of every discovered board.
#[derive(Debug, Clone)]
pub struct StatusReport {
    /// Bus the snapshot was taken on.
    pub bus: BusType,
    /// Boards in discovery order.
    pub boards: Vec<BoardStatus>,
    /// Append the raw register dump when rendering.
    pub detailed: bool,
}

impl<B: VmeBus> DeviceRegistry<B> {
    /// Read every register of every board under one lock hold.
    ///
    /// # Errors
    ///
    /// Returns the first bus error.
    pub fn status(&self, detailed: bool) -> Result<StatusReport> {
        let mut guard = self.lock();
        let state = &mut *guard;
        let mut boards = Vec::with_capacity(MAX_VME_SLOTS as usize + 1);
        for device in &state.devices {
            let mut regs = RegisterFile::new(&mut state.bus, device.local);
            boards.push(BoardStatus::read(&mut regs, device.slot, device.address)?);
        }
        Ok(StatusReport {
            bus: state.bus.bus_type(),
            boards,
            detailed,
        })
    }
}

fn trigger_sources(mask: u32) -> String {
    let flags = [
        (regs::trig_src::PERIODIC, "PER"),
        (regs::trig_src::RANDOM, "RND"),
        (regs::trig_src::SEQUENCE, "SEQ"),
        (regs::trig_src::EXTERNAL, "EXT"),
    ];
    let names: Vec<&str> = flags
        .iter()
        .filter(|(bit, _)| mask & bit != 0)
        .map(|(_, name)| *name)
        .collect();
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(" ")
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(
            f,
            "VLD Module Status: {} board(s) on {}",
            self.boards.len(),
            self.bus
        )?;
        writeln!(f)?;

        writeln!(
            f,
            "Slot  A24       Firmware    BoardID     Clock     TrigSrc           TrigCnt"
        )?;
        writeln!(f, "{}", "-".repeat(80))?;
        for b in &self.boards {
            let clock = if b.get(Register::ClockSrc) & regs::clock::EXTERNAL != 0 {
                "external"
            } else {
                "internal"
            };
            writeln!(
                f,
                "{:>4}  {:#08x}  {:<10}  {:#010x}  {:<8}  {:<16}  {:>10}",
                b.slot,
                b.address,
                FirmwareVersion(b.get(Register::Firmware)).to_string(),
                b.get(Register::BoardId),
                clock,
                trigger_sources(b.get(Register::TrigSrc)),
                b.get(Register::TrigCnt),
            )?;
        }
        writeln!(f)?;

        writeln!(
            f,
            "Slot  Delay    Width   Bleach              CalWidth  Analog d/w   Random            Periodic"
        )?;
        writeln!(f, "{}", "-".repeat(96))?;
        for b in &self.boards {
            let timing = TriggerTiming::decode(b.get(Register::TrigDelay));
            let bleach = b.get(Register::BleachTime);
            let bleach_on = bleach & regs::bleach::ENABLE_MASK == regs::bleach::ENABLE;
            let analog = b.get(Register::AnalogCtrl);
            let random = b.get(Register::RandomTrig);
            let prescale = random & regs::random_trig::PRESCALE_MASK;
            let periodic = b.get(Register::PeriodicTrig);
            writeln!(
                f,
                "{:>4}  {:>4} ns  {:>3} ns  {:<3} {:>10.2} s    {:#07x}   {:#04x}/{:#04x}    {} {:>9.1} Hz {:<3}  {:#06x} x {}",
                b.slot,
                timing.delay_ns(),
                timing.width_ns(),
                on_off(bleach_on),
                bleach_seconds(bleach & regs::bleach::TIMER_MASK),
                b.get(Register::CalibrationWidth) & regs::CALIBRATION_WIDTH_MASK,
                analog & regs::analog::DELAY_MASK,
                (analog & regs::analog::WIDTH_MASK) >> 9,
                prescale,
                random_pulser_hz(prescale),
                on_off(random & regs::random_trig::ENABLE != 0),
                (periodic & regs::periodic_trig::PERIOD_MASK) >> 16,
                periodic & regs::periodic_trig::NPULSES_MASK,
            )?;
        }

        if self.detailed {
            for b in &self.boards {
                writeln!(f)?;
                writeln!(f, "Slot {} registers:", b.slot)?;
                for (reg, value) in &b.registers {
                    writeln!(
                        f,
                        "  {:<18} ({:#06x}) = {value:#010x}",
                        reg.name(),
                        reg.offset()
                    )?;
                }
                for (connector, (low, high)) in b.leds.iter().enumerate() {
                    writeln!(
                        f,
                        "  output[{connector}]          low = {low:#010x}  high = {high:#010x}"
                    )?;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_flags() {
        assert_eq!(trigger_sources(0), "none");
        assert_eq!(trigger_sources(0x13), "PER RND EXT");
    }

    #[test]
    fn empty_report_renders() {
        let report = StatusReport {
            bus: BusType::Simulated,
            boards: Vec::new(),
            detailed: true,
        };
        let text = report.to_string();
        assert!(text.contains("0 board(s) on Simulated"));
    }
}
