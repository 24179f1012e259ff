//! Pure Rust driver for the JLab VME LED Driver (VLD).
//!
//! The VLD is a single-width VME board that pulses LED arrays for detector
//! calibration. This crate discovers boards in a crate, drives their
//! register file, reports their status, and reloads the configuration PROM
//! through the emergency JTAG port.
//!
//! # Bus hierarchy
//!
//! ```text
//! Hardware:
//!   MappedBus     A24 window(s) exported by the VME bridge, volatile access
//!
//! Development:
//!   SimulatedBus  in-memory crate, records every write and the AM sequence
//! ```
//!
//! Everything above the bus is written against the [`VmeBus`] trait.
//!
//! # Quick start
//!
//! ```no_run
//! use vld_driver::buses::MappedBus;
//! use vld_driver::{DeviceRegistry, InitConfig};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bus = MappedBus::open(Path::new("/dev/vme_a24"), None)?;
//! let registry = DeviceRegistry::new(bus);
//! registry.init(&InitConfig::scan())?;
//!
//! for slot in registry.slots() {
//!     println!("slot {slot}: {} triggers", registry.trigger_count(slot)?);
//! }
//! print!("{}", registry.status(false)?);
//! # Ok(())
//! # }
//! ```
//!
//! # Locking
//!
//! One mutex guards the bus and the device table. Register accessors hold
//! it for a single read, write or read-modify-write. A PROM load holds it
//! for the whole file, together with the bus lock and the 0x19 address
//! modifier.

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

mod accessors;
mod bus;
pub mod buses;
mod discovery;
mod error;
pub mod firmware;
pub mod jtag;
mod register_file;
mod registry;
mod status;

pub use accessors::{
    AnalogSwitch, BleachTimer, ClockSource, LedCalibration, PeriodicPulser, RandomPulser,
};
pub use bus::{BusType, VmeBus};
pub use discovery::{check_addresses, InitConfig, InitFlags};
pub use error::{Result, VldError};
pub use firmware::{FirmwareLoader, LoadEvent, LoadReport, LoaderConfig};
pub use jtag::{EmergencyAddressing, JtagPort};
pub use register_file::RegisterFile;
pub use registry::{Device, DeviceRegistry};
pub use status::{BoardStatus, StatusReport};

/// Board model types (re-exported from vld-chip).
pub mod chip {
    pub use vld_chip::{
        identity, jtag, regs, timing, vme, BoardId, FirmwareVersion, LedHalf, Register, TapOp,
        TapState, TriggerTiming,
    };
}

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        ClockSource, DeviceRegistry, FirmwareLoader, InitConfig, InitFlags, LedCalibration,
        LoaderConfig, Result, StatusReport, VldError, VmeBus,
    };
    pub use vld_chip::{Register, TriggerTiming};
}
