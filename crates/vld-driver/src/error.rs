//! Error types for VLD driver operations

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for VLD operations
pub type Result<T> = std::result::Result<T, VldError>;

/// Errors that can occur during VLD operations
#[derive(Debug, Error)]
pub enum VldError {
    /// Bus address could not be mapped or accessed
    #[error("Addressing error at {address:#010x}: {reason}")]
    Addressing {
        /// VME address
        address: u32,
        /// Reason for failure
        reason: String,
    },

    /// Bus access layer failure not tied to one address
    #[error("Bus error: {reason}")]
    Bus {
        /// Reason for failure
        reason: String,
    },

    /// Slot has no initialized device
    #[error("VLD in slot {slot} not initialized")]
    NotInitialized {
        /// Requested slot
        slot: u32,
    },

    /// Identity register does not carry the VLD type tag
    #[error("Board at {address:#010x} is not a VLD (boardID {board_id:#010x})")]
    WrongBoardType {
        /// VME address probed
        address: u32,
        /// Identity word read
        board_id: u32,
    },

    /// Slot number outside 1..=21
    #[error("Invalid slot number {slot}")]
    InvalidSlot {
        /// Offending slot
        slot: u32,
    },

    /// Firmware older than the driver supports
    #[error("VLD in slot {slot} has unsupported firmware {version:#010x}")]
    UnsupportedFirmware {
        /// Slot of the device
        slot: u32,
        /// Raw firmware register
        version: u32,
    },

    /// No VLD devices detected
    #[error("No VLD devices detected")]
    NoDevicesFound,

    /// Caller-supplied value out of range for a register field
    #[error("Invalid {name} {value:#x} (max {max:#x})")]
    InvalidParameter {
        /// Parameter name
        name: &'static str,
        /// Supplied value
        value: u32,
        /// Largest allowed value
        max: u32,
    },

    /// Pulse shape with no samples
    #[error("Pulse shape has no samples")]
    EmptyPulse,

    /// SVF input error
    #[error(transparent)]
    Svf(#[from] vld_svf::SvfError),

    /// Legacy JTAG opcode not recognised
    #[error("JTAG type {opcode} unrecognized")]
    UnknownJtagOp {
        /// Opcode supplied
        opcode: u32,
    },

    /// Window device not found
    #[error("Window device not found: {path}")]
    WindowNotFound {
        /// Path that was checked
        path: PathBuf,
    },

    /// I/O error
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },
}

impl VldError {
    /// Create an addressing error
    pub fn addressing(address: u32, reason: impl Into<String>) -> Self {
        Self::Addressing {
            address,
            reason: reason.into(),
        }
    }

    /// Create a bus error
    pub fn bus(reason: impl Into<String>) -> Self {
        Self::Bus {
            reason: reason.into(),
        }
    }

    /// Create an invalid parameter error
    pub const fn invalid_parameter(name: &'static str, value: u32, max: u32) -> Self {
        Self::InvalidParameter { name, value, max }
    }

    /// Check `value <= max`
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` when the check fails.
    pub fn check_max(name: &'static str, value: u32, max: u32) -> Result<()> {
        if value > max {
            Err(Self::invalid_parameter(name, value, max))
        } else {
            Ok(())
        }
    }

    /// Check that `value` only sets bits in `allowed`
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` when the check fails.
    pub fn check_mask(name: &'static str, value: u32, allowed: u32) -> Result<()> {
        if value & !allowed != 0 {
            Err(Self::invalid_parameter(name, value, allowed))
        } else {
            Ok(())
        }
    }
}
