//! Bus access seam
//!
//! The VME bridge library is an external collaborator. This trait captures
//! exactly the part of its contract the driver relies on: address
//! translation, a probe that fails instead of faulting, synchronous 32-bit
//! reads and writes, the bus lock pair and the A24 address-modifier switch.

use crate::error::Result;
use std::fmt::Debug;

/// VME bus access layer
pub trait VmeBus: Debug + Send {
    /// Translate a VME address in address space `am` to a local address.
    ///
    /// # Errors
    ///
    /// Returns `VldError::Addressing` if the address is outside the mapped window.
    fn bus_to_local(&mut self, am: u8, address: u32) -> Result<usize>;

    /// Read a word, failing without side effects if nothing answers.
    ///
    /// # Errors
    ///
    /// Returns `VldError::Addressing` if the read is not acknowledged.
    fn probe32(&mut self, local: usize) -> Result<u32>;

    /// Read a 32-bit word.
    ///
    /// # Errors
    ///
    /// Returns an error if the access is out of range.
    fn read32(&mut self, local: usize) -> Result<u32>;

    /// Write a 32-bit word.
    ///
    /// # Errors
    ///
    /// Returns an error if the access is out of range.
    fn write32(&mut self, local: usize, value: u32) -> Result<()>;

    /// Take the bus lock.
    fn lock(&mut self);

    /// Release the bus lock.
    fn unlock(&mut self);

    /// Select the address modifier used for A24 accesses (0 restores the default).
    ///
    /// # Errors
    ///
    /// Returns an error if the bridge cannot produce the modifier.
    fn set_a24_am(&mut self, am: u8) -> Result<()>;

    /// Bus type for diagnostics
    fn bus_type(&self) -> BusType;
}

impl<B: VmeBus + ?Sized> VmeBus for Box<B> {
    fn bus_to_local(&mut self, am: u8, address: u32) -> Result<usize> {
        (**self).bus_to_local(am, address)
    }

    fn probe32(&mut self, local: usize) -> Result<u32> {
        (**self).probe32(local)
    }

    fn read32(&mut self, local: usize) -> Result<u32> {
        (**self).read32(local)
    }

    fn write32(&mut self, local: usize, value: u32) -> Result<()> {
        (**self).write32(local, value)
    }

    fn lock(&mut self) {
        (**self).lock();
    }

    fn unlock(&mut self) {
        (**self).unlock();
    }

    fn set_a24_am(&mut self, am: u8) -> Result<()> {
        (**self).set_a24_am(am)
    }

    fn bus_type(&self) -> BusType {
        (**self).bus_type()
    }
}

/// Bus type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusType {
    /// In-memory boards, no hardware required
    Simulated,

    /// Memory-mapped A24 window files
    Mapped,
}

impl std::fmt::Display for BusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Simulated => write!(f, "Simulated"),
            Self::Mapped => write!(f, "Mapped A24 window"),
        }
    }
}
