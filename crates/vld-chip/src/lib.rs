//! Silicon model for the JLab VME LED Driver (VLD).
//!
//! This crate has **no dependencies** and **no hardware access**. It is a
//! pure model of the board: register offsets and bit fields, identity and
//! firmware decoding, VME geographic addressing, field encodings with
//! physical units, and the emergency JTAG word sequences.
//!
//! # Crate organisation
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`regs`] | A24 register map, `Register` enum, bit definitions |
//! | [`identity`] | `boardID` and firmware version decoding, version gate |
//! | [`vme`] | Slot ↔ address conversion, address modifiers, default scan list |
//! | [`timing`] | Trigger delay/width, bleach timer and random pulser units |
//! | [`jtag`] | TAP operations and their shadow register word sequences |

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod identity;
pub mod jtag;
pub mod regs;
pub mod timing;
pub mod vme;

pub use identity::{BoardId, FirmwareVersion};
pub use jtag::{TapOp, TapState};
pub use regs::{LedHalf, Register};
pub use timing::TriggerTiming;
