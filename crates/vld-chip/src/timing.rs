//! Field encodings with non-linear physical units.

use crate::regs::trig_delay;

/// Bleach timer tick: `20 ns * 2^20`.
pub const BLEACH_TICK_NS: u64 = 20 * (1 << 20);

/// Random pulser base rate before prescaling (Hz).
pub const RANDOM_PULSER_BASE_HZ: f64 = 700_000.0;

/// Trigger output delay and width as programmed into `trigDelay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TriggerTiming {
    /// Delay count, 0–0x7F.
    pub delay: u32,
    /// Delay step select, 0 (4 ns) or 1 (16 ns + 1024 ns offset).
    pub step: u32,
    /// Width count, 0–0x1F.
    pub width: u32,
}

impl TriggerTiming {
    /// Pack into the register word. Out-of-range fields are clipped by the field masks.
    #[must_use]
    pub const fn encode(self) -> u32 {
        let step = if self.step & 1 != 0 { trig_delay::STEP_16NS } else { 0 };
        (self.delay & trig_delay::DELAY_MASK) | step | ((self.width << 8) & trig_delay::WIDTH_MASK)
    }

    /// Unpack a register word.
    #[must_use]
    pub const fn decode(reg: u32) -> Self {
        Self {
            delay: reg & trig_delay::DELAY_MASK,
            step: if reg & trig_delay::STEP_16NS != 0 { 1 } else { 0 },
            width: (reg & trig_delay::WIDTH_MASK) >> 8,
        }
    }

    /// Output delay: `1024*step + (delay+1) * 4 * 4^step` ns.
    #[must_use]
    pub const fn delay_ns(self) -> u32 {
        let step = self.step & 1;
        let delay = self.delay & trig_delay::DELAY_MASK;
        1024 * step + (delay + 1) * 4 * (1 << (2 * step))
    }

    /// Output width: `(width+1) * 4` ns. Fields are masked as in [`encode`](Self::encode).
    #[must_use]
    pub const fn width_ns(self) -> u32 {
        let width = ((self.width << 8) & trig_delay::WIDTH_MASK) >> 8;
        (width + 1) * 4
    }
}

/// Bleach timer count to seconds.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn bleach_seconds(timer: u32) -> f64 {
    (u64::from(timer) * BLEACH_TICK_NS) as f64 * 1e-9
}

/// Approximate random pulser rate for a prescale setting.
#[must_use]
pub fn random_pulser_hz(prescale: u32) -> f64 {
    RANDOM_PULSER_BASE_HZ / f64::from(1u32 << (prescale & 0x7))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_settings_give_four_ns() {
        let t = TriggerTiming::default();
        assert_eq!(t.delay_ns(), 4);
        assert_eq!(t.width_ns(), 4);
    }

    #[test]
    fn sixteen_ns_step_adds_offset() {
        let t = TriggerTiming { delay: 0, step: 1, width: 0 };
        assert_eq!(t.delay_ns(), 1024 + 16);
        let t = TriggerTiming { delay: 35, step: 1, width: 31 };
        assert_eq!(t.delay_ns(), 1024 + 36 * 16);
        assert_eq!(t.width_ns(), 128);
    }

    #[test]
    fn encode_decode_fields() {
        let t = TriggerTiming { delay: 0x7F, step: 1, width: 0x1F };
        assert_eq!(t.encode(), 0x1FFF);
        assert_eq!(TriggerTiming::decode(0x1FFF), t);
        // clipped by masks
        let wide = TriggerTiming { delay: 0x80, step: 0, width: 0x20 };
        assert_eq!(wide.encode(), 0);
    }

    #[test]
    fn unit_conversions_mask_wide_fields() {
        let t = TriggerTiming { delay: u32::MAX, step: 0, width: u32::MAX };
        assert_eq!(t.delay_ns(), 0x80 * 4);
        assert_eq!(t.width_ns(), 0x20 * 4);
        assert_eq!(t.delay_ns(), TriggerTiming::decode(t.encode()).delay_ns());
    }

    #[test]
    fn bleach_units() {
        // 0xabcc counts is roughly a quarter hour
        let s = bleach_seconds(0xabcc);
        assert!((s - 922.3).abs() < 0.1, "{s}");
    }

    #[test]
    fn random_rate_halves_per_prescale() {
        assert!((random_pulser_hz(0) - 700_000.0).abs() < f64::EPSILON);
        assert!((random_pulser_hz(3) - 87_500.0).abs() < 1e-9);
    }
}
