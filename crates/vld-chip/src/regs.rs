//! A24 register map for the VLD board.
//!
//! All registers are 32 bits wide and live at fixed byte offsets from the
//! board's A24 base address (`slot << 19` under geographic addressing).
//!
//! ```text
//! 0x0000  boardID           identity (type tag, geo slot, crate id)
//! 0x0004  firmware          firmware id / type / version        (read-only)
//! 0x000C  trigDelay         trigger output delay and width
//! 0x0020  trigSrc           trigger source enables
//! 0x002C  clockSrc          internal / external clock
//! 0x0040  output[5]         LED connector control, low/high pairs
//! 0x0068  bleachTime        bleach timer + enable
//! 0x006C  pulseLoad         pulse shape FIFO write port
//! 0x0070  calibrationWidth  calibration pulse width
//! 0x0074  analogCtrl        analog switch delay / width
//! 0x0088  randomTrig        random pulser prescale + enable
//! 0x008C  periodicTrig      periodic pulser period + count
//! 0x00DC  trigCnt           trigger counter
//! 0x0100  reset             reset command register
//! 0x3FFF0 jtag              emergency JTAG shadow register (AM 0x19)
//! ```

// ── Identity ─────────────────────────────────────────────────────────────────

/// Board identity register.
pub const BOARD_ID: usize = 0x0000;
/// Firmware version register.
pub const FIRMWARE: usize = 0x0004;

// ── Trigger ──────────────────────────────────────────────────────────────────

/// Trigger output delay / width.
pub const TRIG_DELAY: usize = 0x000C;
/// Trigger source enable mask.
pub const TRIG_SRC: usize = 0x0020;
/// Clock source select.
pub const CLOCK_SRC: usize = 0x002C;

// ── LED connectors ───────────────────────────────────────────────────────────

/// First LED connector control register (connector 0, low half).
pub const OUTPUT_BASE: usize = 0x0040;
/// Stride between connector register pairs.
pub const OUTPUT_STRIDE: usize = 0x8;
/// Number of LED connectors on the board.
pub const OUTPUT_COUNT: usize = 5;

// ── Pulse shaping ────────────────────────────────────────────────────────────

/// Bleach timer.
pub const BLEACH_TIME: usize = 0x0068;
/// Pulse shape FIFO write port.
pub const PULSE_LOAD: usize = 0x006C;
/// Calibration pulse width.
pub const CALIBRATION_WIDTH: usize = 0x0070;
/// Analog switch control.
pub const ANALOG_CTRL: usize = 0x0074;

// ── Pulsers and counters ─────────────────────────────────────────────────────

/// Random pulser.
pub const RANDOM_TRIG: usize = 0x0088;
/// Periodic pulser.
pub const PERIODIC_TRIG: usize = 0x008C;
/// Trigger counter.
pub const TRIG_CNT: usize = 0x00DC;
/// Reset command register.
pub const RESET: usize = 0x0100;

// ── Emergency access ─────────────────────────────────────────────────────────

/// Emergency JTAG shadow register, reachable only with AM `0x19`.
///
/// Word index `0xFFFC` from the board base.
pub const EMERGENCY_JTAG: usize = 0xFFFC << 2;

/// Size of the A24 window one board decodes (`1 << 19`).
pub const BOARD_WINDOW: usize = 1 << 19;

// Layout checks (the register file is a plain struct in the firmware docs).
const _: () = assert!(OUTPUT_BASE + OUTPUT_STRIDE * OUTPUT_COUNT == BLEACH_TIME);
const _: () = assert!(ANALOG_CTRL + 4 < RANDOM_TRIG);
const _: () = assert!(EMERGENCY_JTAG == 0x3FFF0);
const _: () = assert!(EMERGENCY_JTAG + 4 <= BOARD_WINDOW);

/// Which half of an LED connector control pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedHalf {
    /// Channels 1–18 plus bleach control.
    Low,
    /// Channels 19–36.
    High,
}

/// A named, offset-validated register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    /// Board identity.
    BoardId,
    /// Firmware version.
    Firmware,
    /// Trigger delay / width.
    TrigDelay,
    /// Trigger source mask.
    TrigSrc,
    /// Clock source.
    ClockSrc,
    /// LED connector control (connector index checked by [`Register::led`]).
    Led {
        /// Connector 0–4.
        connector: u8,
        /// Low or high half.
        half: LedHalf,
    },
    /// Bleach timer.
    BleachTime,
    /// Pulse shape FIFO.
    PulseLoad,
    /// Calibration width.
    CalibrationWidth,
    /// Analog switch control.
    AnalogCtrl,
    /// Random pulser.
    RandomTrig,
    /// Periodic pulser.
    PeriodicTrig,
    /// Trigger count.
    TrigCnt,
    /// Reset command.
    Reset,
    /// Emergency JTAG shadow register.
    EmergencyJtag,
}

impl Register {
    /// Every fixed register read by a status snapshot, in address order.
    /// The write-side ports `PulseLoad` and `Reset` are never read.
    pub const STATUS_SET: [Register; 11] = [
        Self::BoardId,
        Self::Firmware,
        Self::TrigDelay,
        Self::TrigSrc,
        Self::ClockSrc,
        Self::BleachTime,
        Self::CalibrationWidth,
        Self::AnalogCtrl,
        Self::RandomTrig,
        Self::PeriodicTrig,
        Self::TrigCnt,
    ];

    /// Write-only command and FIFO ports.
    pub const WRITE_PORTS: [Register; 2] = [Self::PulseLoad, Self::Reset];

    /// LED control register for `connector`, or `None` if there is no such connector.
    #[must_use]
    pub const fn led(connector: u8, half: LedHalf) -> Option<Self> {
        if (connector as usize) < OUTPUT_COUNT {
            Some(Self::Led { connector, half })
        } else {
            None
        }
    }

    /// Byte offset from the board base address.
    #[must_use]
    pub const fn offset(self) -> usize {
        match self {
            Self::BoardId => BOARD_ID,
            Self::Firmware => FIRMWARE,
            Self::TrigDelay => TRIG_DELAY,
            Self::TrigSrc => TRIG_SRC,
            Self::ClockSrc => CLOCK_SRC,
            Self::Led { connector, half } => {
                let pair = OUTPUT_BASE + OUTPUT_STRIDE * connector as usize;
                match half {
                    LedHalf::Low => pair,
                    LedHalf::High => pair + 4,
                }
            }
            Self::BleachTime => BLEACH_TIME,
            Self::PulseLoad => PULSE_LOAD,
            Self::CalibrationWidth => CALIBRATION_WIDTH,
            Self::AnalogCtrl => ANALOG_CTRL,
            Self::RandomTrig => RANDOM_TRIG,
            Self::PeriodicTrig => PERIODIC_TRIG,
            Self::TrigCnt => TRIG_CNT,
            Self::Reset => RESET,
            Self::EmergencyJtag => EMERGENCY_JTAG,
        }
    }

    /// Register name as used in the firmware documentation.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::BoardId => "boardID",
            Self::Firmware => "firmware",
            Self::TrigDelay => "trigDelay",
            Self::TrigSrc => "trigSrc",
            Self::ClockSrc => "clockSrc",
            Self::Led { half: LedHalf::Low, .. } => "output.low_ctrl",
            Self::Led { half: LedHalf::High, .. } => "output.high",
            Self::BleachTime => "bleachTime",
            Self::PulseLoad => "pulseLoad",
            Self::CalibrationWidth => "calibrationWidth",
            Self::AnalogCtrl => "analogCtrl",
            Self::RandomTrig => "randomTrig",
            Self::PeriodicTrig => "periodicTrig",
            Self::TrigCnt => "trigCnt",
            Self::Reset => "reset",
            Self::EmergencyJtag => "jtag",
        }
    }
}

/// Register offsets for a layout dump, as `(name, offset)` pairs.
#[must_use]
pub fn layout() -> Vec<(&'static str, usize)> {
    let mut out: Vec<_> = Register::STATUS_SET
        .iter()
        .chain(&Register::WRITE_PORTS)
        .map(|r| (r.name(), r.offset()))
        .collect();
    out.extend((0..OUTPUT_COUNT as u8).flat_map(|c| {
        [LedHalf::Low, LedHalf::High]
            .into_iter()
            .map(move |half| Register::Led { connector: c, half })
            .map(|r| (r.name(), r.offset()))
    }));
    out.push((Register::EmergencyJtag.name(), EMERGENCY_JTAG));
    out.sort_by_key(|&(_, off)| off);
    out
}

// ── Bit definitions ──────────────────────────────────────────────────────────

/// `boardID` fields.
pub mod board_id {
    /// Type tag identifying a VLD.
    pub const TYPE_VLD: u32 = 0x1D;
    /// Type tag field.
    pub const TYPE_MASK: u32 = 0xFF00_0000;
    /// Board sits in a VME64X crate.
    pub const VME64X: u32 = 1 << 13;
    /// Production code field.
    pub const PROD_MASK: u32 = 0x00FF_0000;
    /// Geographic slot field.
    pub const GEOADR_MASK: u32 = 0x0000_1F00;
    /// Crate id field.
    pub const CRATEID_MASK: u32 = 0x0000_00FF;
}

/// Firmware register fields.
pub mod firmware {
    /// Firmware id field.
    pub const ID_MASK: u32 = 0xFFFF_0000;
    /// Firmware type field.
    pub const TYPE_MASK: u32 = 0x0000_F000;
    /// Production firmware.
    pub const TYPE_PROD: u32 = 1;
    /// Prototype firmware.
    pub const TYPE_P: u32 = 3;
    /// Major version field.
    pub const MAJOR_VERSION_MASK: u32 = 0x0000_0FF0;
    /// Minor version field.
    pub const MINOR_VERSION_MASK: u32 = 0x0000_000F;

    /// Oldest major version the driver supports.
    pub const SUPPORTED_MAJOR: u32 = 0x81;
    /// Firmware type the driver supports.
    pub const SUPPORTED_TYPE: u32 = TYPE_P;
}

/// `trigDelay` fields.
pub mod trig_delay {
    /// Delay field, 4 ns steps.
    pub const DELAY_MASK: u32 = 0x0000_007F;
    /// Multiply the delay step by four and add 1024 ns.
    pub const STEP_16NS: u32 = 1 << 7;
    /// Width field, 4 ns steps.
    pub const WIDTH_MASK: u32 = 0x0000_1F00;
}

/// `trigSrc` fields.
pub mod trig_src {
    /// Every source bit.
    pub const MASK: u32 = 0x17;
    /// Periodic pulser.
    pub const PERIODIC: u32 = 1 << 0;
    /// Random pulser.
    pub const RANDOM: u32 = 1 << 1;
    /// Sequence generator.
    pub const SEQUENCE: u32 = 1 << 2;
    /// Front panel input.
    pub const EXTERNAL: u32 = 1 << 4;
}

/// `clockSrc` values.
pub mod clock {
    /// On-board oscillator.
    pub const INTERNAL: u32 = 0x0;
    /// Front panel clock.
    pub const EXTERNAL: u32 = 0x1;
}

/// LED connector control fields.
pub mod led {
    /// Set when any channel is enabled.
    pub const CALIBRATION_ENABLED: u32 = 1 << 0;
    /// Channel enable field, bits 1–18.
    pub const CH_ENABLE_MASK: u32 = 0x0007_FFFE;
    /// Largest channel mask a caller may pass (18 channels per half).
    pub const CH_MAX: u32 = 0x3FFFF;
    /// Bleach current control.
    pub const BLEACH_CTRL_MASK: u32 = 0x0700_0000;
    /// Bleach regulator enable.
    pub const BLEACH_REG_ENABLE: u32 = 1 << 27;
    /// Bleach enable field.
    pub const BLEACH_ENABLE_MASK: u32 = 0xF000_0000;
    /// Bleach enable pattern.
    pub const BLEACH_ENABLE: u32 = 0xB000_0000;
}

/// `bleachTime` fields.
pub mod bleach {
    /// Timer field, units of 20 ns × 2^20.
    pub const TIMER_MASK: u32 = 0x0FFF_FFFF;
    /// Enable pattern.
    pub const ENABLE: u32 = 0xB000_0000;
    /// Enable field.
    pub const ENABLE_MASK: u32 = 0xF000_0000;
}

/// `pulseLoad` fields.
pub mod pulse_load {
    /// DAC sample value.
    pub const DAC_D_MASK: u32 = 0x3F;
    /// Force the DAC sample to zero.
    pub const DAC_D_ZERO: u32 = 1 << 6;
    /// Generate a trigger with this sample.
    pub const GEN_TRIG: u32 = 1 << 7;
}

/// `calibrationWidth` mask.
pub const CALIBRATION_WIDTH_MASK: u32 = 0x0000_03FF;

/// `analogCtrl` fields.
pub mod analog {
    /// Enable delay field.
    pub const DELAY_MASK: u32 = 0x0000_00FF;
    /// Reserved, preserved on write.
    pub const RESERVED: u32 = 1 << 8;
    /// Enable width field.
    pub const WIDTH_MASK: u32 = 0x0000_FE00;
}

/// `randomTrig` fields.
pub mod random_trig {
    /// Prescale field.
    pub const PRESCALE_MASK: u32 = 0x0000_0007;
    /// Pulser enable.
    pub const ENABLE: u32 = 1 << 7;
}

/// `periodicTrig` fields.
pub mod periodic_trig {
    /// Pulse count field.
    pub const NPULSES_MASK: u32 = 0x0000_FFFF;
    /// Period field.
    pub const PERIOD_MASK: u32 = 0xFFFF_0000;
}

/// `reset` bits.
pub mod reset {
    /// I2C engine.
    pub const I2C: u32 = 1 << 1;
    /// JTAG engine.
    pub const JTAG: u32 = 1 << 2;
    /// Soft reset.
    pub const SOFT: u32 = 1 << 4;
    /// Clock DCM.
    pub const CLK: u32 = 1 << 8;
    /// MGT.
    pub const MGT: u32 = 1 << 10;
    /// Hard clock reset.
    pub const HARD_CLK: u32 = 1 << 21;
    /// Every reset bit.
    pub const MASK: u32 = 0x0020_0516;
}
