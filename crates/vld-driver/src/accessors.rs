//! Register accessors
//!
//! Every setter validates its arguments before taking the registry lock,
//! so a rejected call never reaches the bus. Two setters only log when a
//! field is out of range and then write the masked value:
//! [`DeviceRegistry::set_trigger_delay_width`] and
//! [`DeviceRegistry::set_random_pulser`].

use crate::bus::VmeBus;
use crate::error::{Result, VldError};
use crate::registry::DeviceRegistry;
use vld_chip::regs::{
    analog, bleach, clock, led, periodic_trig, random_trig, reset, trig_src,
    CALIBRATION_WIDTH_MASK, OUTPUT_COUNT,
};
use vld_chip::{BoardId, FirmwareVersion, LedHalf, Register, TriggerTiming};

/// Clock source selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockSource {
    /// On-board oscillator.
    Internal,
    /// Front panel clock.
    External,
}

impl ClockSource {
    const fn bits(self) -> u32 {
        match self {
            Self::Internal => clock::INTERNAL,
            Self::External => clock::EXTERNAL,
        }
    }
}

impl TryFrom<u32> for ClockSource {
    type Error = VldError;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            clock::INTERNAL => Ok(Self::Internal),
            clock::EXTERNAL => Ok(Self::External),
            other => Err(VldError::invalid_parameter("clock source", other, clock::EXTERNAL)),
        }
    }
}

impl std::fmt::Display for ClockSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Internal => write!(f, "internal"),
            Self::External => write!(f, "external"),
        }
    }
}

/// Bleach timer setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BleachTimer {
    /// Timer in units of `20 ns * 2^20`.
    pub timer: u32,
    /// Bleaching enabled.
    pub enabled: bool,
}

/// Random pulser setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RandomPulser {
    /// Prescale, rate is `700 kHz / 2^prescale`.
    pub prescale: u32,
    /// Pulser enabled.
    pub enabled: bool,
}

/// Periodic pulser setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PeriodicPulser {
    /// Period count.
    pub period: u32,
    /// Number of pulses.
    pub npulses: u32,
}

/// Analog switch enable timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AnalogSwitch {
    /// Enable delay, 0–0xFF.
    pub delay: u32,
    /// Enable width, 0–0x7F.
    pub width: u32,
}

/// Calibration and bleach configuration of one LED connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LedCalibration {
    /// Channels 1–18 to pulse.
    pub low: u32,
    /// Channels 19–36 to pulse.
    pub high: u32,
    /// Bleach current control, 0–0xF.
    pub bleach_ctrl: u32,
    /// Bleaching enabled for this connector.
    pub bleach_enable: bool,
}

const ANALOG_WIDTH_SHIFT: u32 = 9;
const BLEACH_CTRL_SHIFT: u32 = 24;
const BLEACH_CTRL_FIELD: u32 = led::BLEACH_CTRL_MASK | led::BLEACH_REG_ENABLE;

impl LedCalibration {
    fn channel_word(mask: u32) -> u32 {
        let enabled = if mask == 0 { 0 } else { led::CALIBRATION_ENABLED };
        enabled | ((mask << 1) & led::CH_ENABLE_MASK)
    }

    /// Low control word.
    pub fn low_word(&self) -> u32 {
        let bleach = if self.bleach_enable { led::BLEACH_ENABLE } else { 0 };
        Self::channel_word(self.low)
            | ((self.bleach_ctrl << BLEACH_CTRL_SHIFT) & BLEACH_CTRL_FIELD)
            | bleach
    }

    /// High control word.
    pub fn high_word(&self) -> u32 {
        Self::channel_word(self.high)
    }

    /// Decode a low/high control pair.
    pub const fn decode(low: u32, high: u32) -> Self {
        Self {
            low: (low & led::CH_ENABLE_MASK) >> 1,
            high: (high & led::CH_ENABLE_MASK) >> 1,
            bleach_ctrl: (low & BLEACH_CTRL_FIELD) >> BLEACH_CTRL_SHIFT,
            bleach_enable: low & led::BLEACH_ENABLE_MASK == led::BLEACH_ENABLE,
        }
    }
}

impl<B: VmeBus> DeviceRegistry<B> {
    fn read_register(&self, slot: u32, reg: Register) -> Result<u32> {
        self.with_device(slot, |regs| regs.read(reg))
    }

    fn write_register(&self, slot: u32, reg: Register, value: u32) -> Result<()> {
        self.with_device(slot, |regs| regs.write(reg, value))
    }

    /// Identity word.
    ///
    /// # Errors
    ///
    /// `NotInitialized` for an unknown slot, or a bus error.
    pub fn board_id(&self, slot: u32) -> Result<BoardId> {
        self.read_register(slot, Register::BoardId).map(BoardId)
    }

    /// Firmware version.
    ///
    /// # Errors
    ///
    /// `NotInitialized` for an unknown slot, or a bus error.
    pub fn firmware_version(&self, slot: u32) -> Result<FirmwareVersion> {
        self.read_register(slot, Register::Firmware).map(FirmwareVersion)
    }

    /// Geographic slot reported by the backplane; 0 outside a VME64X crate.
    ///
    /// # Errors
    ///
    /// `NotInitialized` for an unknown slot, or a bus error.
    pub fn geo_address(&self, slot: u32) -> Result<u32> {
        let geo = self.board_id(slot)?.geo_slot();
        if geo != 0 && geo != slot {
            tracing::warn!("Slot {slot}: board reports geographic address {geo}");
        }
        Ok(geo)
    }

    /// Program the trigger output delay and width.
    ///
    /// Out-of-range fields are logged and clipped, not rejected.
    ///
    /// # Errors
    ///
    /// `NotInitialized` for an unknown slot, or a bus error.
    pub fn set_trigger_delay_width(&self, slot: u32, timing: TriggerTiming) -> Result<()> {
        if timing.delay > 0x7F {
            tracing::error!("Slot {slot}: invalid trigger delay {:#x}, max 0x7f", timing.delay);
        }
        if timing.step > 1 {
            tracing::error!("Slot {slot}: invalid delay step {}, max 1", timing.step);
        }
        if timing.width > 0x1F {
            tracing::error!("Slot {slot}: invalid trigger width {:#x}, max 0x1f", timing.width);
        }
        self.write_register(slot, Register::TrigDelay, timing.encode())
    }

    /// Trigger output delay and width.
    ///
    /// # Errors
    ///
    /// `NotInitialized` for an unknown slot, or a bus error.
    pub fn trigger_delay_width(&self, slot: u32) -> Result<TriggerTiming> {
        self.read_register(slot, Register::TrigDelay)
            .map(TriggerTiming::decode)
    }

    /// Enable trigger sources (periodic bit 0, random bit 1, sequence bit 2,
    /// external bit 4).
    ///
    /// # Errors
    ///
    /// `InvalidParameter` for bits outside the source mask.
    pub fn set_trigger_source_mask(&self, slot: u32, mask: u32) -> Result<()> {
        VldError::check_mask("trigger source mask", mask, trig_src::MASK)?;
        self.write_register(slot, Register::TrigSrc, mask)
    }

    /// Enabled trigger sources.
    ///
    /// # Errors
    ///
    /// `NotInitialized` for an unknown slot, or a bus error.
    pub fn trigger_source_mask(&self, slot: u32) -> Result<u32> {
        Ok(self.read_register(slot, Register::TrigSrc)? & trig_src::MASK)
    }

    /// Select the clock source.
    ///
    /// # Errors
    ///
    /// `NotInitialized` for an unknown slot, or a bus error.
    pub fn set_clock_source(&self, slot: u32, source: ClockSource) -> Result<()> {
        self.write_register(slot, Register::ClockSrc, source.bits())
    }

    /// Selected clock source.
    ///
    /// # Errors
    ///
    /// `NotInitialized` for an unknown slot, or a bus error.
    pub fn clock_source(&self, slot: u32) -> Result<ClockSource> {
        let word = self.read_register(slot, Register::ClockSrc)?;
        Ok(if word & clock::EXTERNAL != 0 {
            ClockSource::External
        } else {
            ClockSource::Internal
        })
    }

    /// Program the bleach timer. Enabling clears the register first so the
    /// board sees a fresh start.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` if the timer exceeds 28 bits.
    pub fn set_bleach_time(&self, slot: u32, timer: u32, enable: bool) -> Result<()> {
        VldError::check_max("bleach timer", timer, bleach::TIMER_MASK)?;
        self.with_device(slot, |regs| {
            if enable {
                regs.write(Register::BleachTime, 0)?;
                regs.write(Register::BleachTime, timer | bleach::ENABLE)
            } else {
                regs.write(Register::BleachTime, timer)
            }
        })
    }

    /// Bleach timer and enable state.
    ///
    /// # Errors
    ///
    /// `NotInitialized` for an unknown slot, or a bus error.
    pub fn bleach_time(&self, slot: u32) -> Result<BleachTimer> {
        let word = self.read_register(slot, Register::BleachTime)?;
        Ok(BleachTimer {
            timer: word & bleach::TIMER_MASK,
            enabled: word & bleach::ENABLE_MASK == bleach::ENABLE,
        })
    }

    /// Program the calibration pulse width.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` if the width exceeds 0x3FF.
    pub fn set_calibration_pulse_width(&self, slot: u32, width: u32) -> Result<()> {
        VldError::check_max("calibration width", width, CALIBRATION_WIDTH_MASK)?;
        self.write_register(slot, Register::CalibrationWidth, width)
    }

    /// Calibration pulse width.
    ///
    /// # Errors
    ///
    /// `NotInitialized` for an unknown slot, or a bus error.
    pub fn calibration_pulse_width(&self, slot: u32) -> Result<u32> {
        Ok(self.read_register(slot, Register::CalibrationWidth)? & CALIBRATION_WIDTH_MASK)
    }

    /// Program the analog switch enable delay and width. The reserved bit
    /// keeps its current value.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` if delay exceeds 0xFF or width exceeds 0x7F.
    pub fn set_analog_switch_control(&self, slot: u32, delay: u32, width: u32) -> Result<()> {
        VldError::check_max("analog switch delay", delay, analog::DELAY_MASK)?;
        VldError::check_max(
            "analog switch width",
            width,
            analog::WIDTH_MASK >> ANALOG_WIDTH_SHIFT,
        )?;
        self.with_device(slot, |regs| {
            regs.modify(
                Register::AnalogCtrl,
                analog::DELAY_MASK | analog::WIDTH_MASK,
                delay | (width << ANALOG_WIDTH_SHIFT),
            )
        })
    }

    /// Analog switch enable delay and width.
    ///
    /// # Errors
    ///
    /// `NotInitialized` for an unknown slot, or a bus error.
    pub fn analog_switch_control(&self, slot: u32) -> Result<AnalogSwitch> {
        let word = self.read_register(slot, Register::AnalogCtrl)?;
        Ok(AnalogSwitch {
            delay: word & analog::DELAY_MASK,
            width: (word & analog::WIDTH_MASK) >> ANALOG_WIDTH_SHIFT,
        })
    }

    /// Program the random pulser.
    ///
    /// An out-of-range prescale is logged and clipped, not rejected.
    ///
    /// # Errors
    ///
    /// `NotInitialized` for an unknown slot, or a bus error.
    pub fn set_random_pulser(&self, slot: u32, prescale: u32, enable: bool) -> Result<()> {
        if prescale > random_trig::PRESCALE_MASK {
            tracing::error!("Slot {slot}: invalid prescale {prescale}, max 7");
        }
        let enable = if enable { random_trig::ENABLE } else { 0 };
        self.write_register(
            slot,
            Register::RandomTrig,
            (prescale & random_trig::PRESCALE_MASK) | enable,
        )
    }

    /// Random pulser setting.
    ///
    /// # Errors
    ///
    /// `NotInitialized` for an unknown slot, or a bus error.
    pub fn random_pulser(&self, slot: u32) -> Result<RandomPulser> {
        let word = self.read_register(slot, Register::RandomTrig)?;
        Ok(RandomPulser {
            prescale: word & random_trig::PRESCALE_MASK,
            enabled: word & random_trig::ENABLE != 0,
        })
    }

    /// Program the periodic pulser.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` if either value exceeds 0xFFFF.
    pub fn set_periodic_pulser(&self, slot: u32, period: u32, npulses: u32) -> Result<()> {
        VldError::check_max("periodic pulser period", period, 0xFFFF)?;
        VldError::check_max("periodic pulser count", npulses, periodic_trig::NPULSES_MASK)?;
        self.write_register(slot, Register::PeriodicTrig, (period << 16) | npulses)
    }

    /// Periodic pulser setting.
    ///
    /// # Errors
    ///
    /// `NotInitialized` for an unknown slot, or a bus error.
    pub fn periodic_pulser(&self, slot: u32) -> Result<PeriodicPulser> {
        let word = self.read_register(slot, Register::PeriodicTrig)?;
        Ok(PeriodicPulser {
            period: (word & periodic_trig::PERIOD_MASK) >> 16,
            npulses: word & periodic_trig::NPULSES_MASK,
        })
    }

    /// Trigger counter.
    ///
    /// # Errors
    ///
    /// `NotInitialized` for an unknown slot, or a bus error.
    pub fn trigger_count(&self, slot: u32) -> Result<u32> {
        self.read_register(slot, Register::TrigCnt)
    }

    /// Program calibration channels and bleaching for one LED connector.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` for a connector above 4, a channel mask above
    /// 18 bits or a bleach control above 0xF.
    pub fn set_led_calibration(
        &self,
        slot: u32,
        connector: u8,
        setting: LedCalibration,
    ) -> Result<()> {
        let (low_reg, high_reg) = led_pair(connector)?;
        VldError::check_max("low channel mask", setting.low, led::CH_MAX)?;
        VldError::check_max("high channel mask", setting.high, led::CH_MAX)?;
        VldError::check_max("bleach control", setting.bleach_ctrl, 0xF)?;
        self.with_device(slot, |regs| {
            regs.write(low_reg, setting.low_word())?;
            regs.write(high_reg, setting.high_word())
        })
    }

    /// Calibration and bleach configuration of one LED connector.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` for a connector above 4.
    pub fn led_calibration(&self, slot: u32, connector: u8) -> Result<LedCalibration> {
        let (low_reg, high_reg) = led_pair(connector)?;
        self.with_device(slot, |regs| {
            Ok(LedCalibration::decode(regs.read(low_reg)?, regs.read(high_reg)?))
        })
    }

    /// Load a calibration pulse shape, one 32-bit word per FIFO write.
    ///
    /// # Errors
    ///
    /// `EmptyPulse` for an empty shape.
    pub fn load_pulse(&self, slot: u32, samples: &[u32]) -> Result<()> {
        if samples.is_empty() {
            return Err(VldError::EmptyPulse);
        }
        self.with_device(slot, |regs| {
            samples
                .iter()
                .try_for_each(|&word| regs.write(Register::PulseLoad, word))
        })?;
        tracing::debug!("Slot {slot}: loaded {} pulse samples", samples.len());
        Ok(())
    }

    /// Pulse the reset bits in `mask`.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` for bits outside the reset mask.
    pub fn reset_mask(&self, slot: u32, mask: u32) -> Result<()> {
        VldError::check_mask("reset mask", mask, reset::MASK)?;
        self.write_register(slot, Register::Reset, mask)
    }

    /// Reset the I2C engine.
    ///
    /// # Errors
    ///
    /// `NotInitialized` for an unknown slot, or a bus error.
    pub fn reset_i2c(&self, slot: u32) -> Result<()> {
        self.reset_mask(slot, reset::I2C)
    }

    /// Reset the JTAG engine.
    ///
    /// # Errors
    ///
    /// `NotInitialized` for an unknown slot, or a bus error.
    pub fn reset_jtag(&self, slot: u32) -> Result<()> {
        self.reset_mask(slot, reset::JTAG)
    }

    /// Soft reset.
    ///
    /// # Errors
    ///
    /// `NotInitialized` for an unknown slot, or a bus error.
    pub fn soft_reset(&self, slot: u32) -> Result<()> {
        self.reset_mask(slot, reset::SOFT)
    }

    /// Reset the clock DCM.
    ///
    /// # Errors
    ///
    /// `NotInitialized` for an unknown slot, or a bus error.
    pub fn reset_clock_dcm(&self, slot: u32) -> Result<()> {
        self.reset_mask(slot, reset::CLK)
    }

    /// Reset the MGT.
    ///
    /// # Errors
    ///
    /// `NotInitialized` for an unknown slot, or a bus error.
    pub fn reset_mgt(&self, slot: u32) -> Result<()> {
        self.reset_mask(slot, reset::MGT)
    }

    /// Hard clock reset.
    ///
    /// # Errors
    ///
    /// `NotInitialized` for an unknown slot, or a bus error.
    pub fn hard_clock_reset(&self, slot: u32) -> Result<()> {
        self.reset_mask(slot, reset::HARD_CLK)
    }
}

#[allow(clippy::cast_possible_truncation)]
fn led_pair(connector: u8) -> Result<(Register, Register)> {
    match (
        Register::led(connector, LedHalf::Low),
        Register::led(connector, LedHalf::High),
    ) {
        (Some(low), Some(high)) => Ok((low, high)),
        _ => Err(VldError::invalid_parameter(
            "LED connector",
            u32::from(connector),
            OUTPUT_COUNT as u32 - 1,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn led_words() {
        let setting = LedCalibration {
            low: 3,
            high: 0,
            bleach_ctrl: 0x5,
            bleach_enable: true,
        };
        assert_eq!(setting.low_word(), 0xB500_0007);
        assert_eq!(setting.high_word(), 0);
        assert_eq!(LedCalibration::decode(setting.low_word(), setting.high_word()), setting);
    }

    #[test]
    fn full_channel_mask() {
        let setting = LedCalibration {
            high: led::CH_MAX,
            ..LedCalibration::default()
        };
        assert_eq!(setting.high_word(), 0x0007_FFFF);
    }

    #[test]
    fn clock_source_from_raw() {
        assert_eq!(ClockSource::try_from(1).unwrap(), ClockSource::External);
        assert!(matches!(
            ClockSource::try_from(2),
            Err(VldError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn connector_range() {
        assert!(led_pair(4).is_ok());
        assert!(matches!(
            led_pair(5),
            Err(VldError::InvalidParameter { max: 4, .. })
        ));
    }
}
