//! VME bus implementations
//!
//! - **Mapped**: A24 windows mapped from bridge device files (hardware)
//! - **Simulated**: in-memory crate of boards (tests, `--simulate`)

pub mod mapped;
pub mod simulated;

pub use mapped::MappedBus;
pub use simulated::{SimBoard, SimulatedBus};
