//! Device registry
//!
//! Owns the bus and the table of discovered boards behind one mutex. Every
//! register access for every board goes through that lock, so two threads
//! can never interleave a read-modify-write on the same register.

use crate::bus::VmeBus;
use crate::error::{Result, VldError};
use crate::register_file::RegisterFile;
use std::sync::{Mutex, MutexGuard, PoisonError};
use vld_chip::vme::MAX_VME_SLOTS;

/// A discovered board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Device {
    /// Slot id used to address the board.
    pub slot: u32,
    /// VME A24 base address.
    pub address: u32,
    /// Local (bus-translated) base address.
    pub local: usize,
}

#[derive(Debug)]
pub(crate) struct Crate<B> {
    pub(crate) bus: B,
    pub(crate) devices: Vec<Device>,
}

impl<B: VmeBus> Crate<B> {
    pub(crate) fn find(&self, slot: u32) -> Option<Device> {
        self.devices.iter().copied().find(|d| d.slot == slot)
    }
}

/// Discovered VLD boards and the bus that reaches them.
#[derive(Debug)]
pub struct DeviceRegistry<B> {
    inner: Mutex<Crate<B>>,
}

impl<B: VmeBus> DeviceRegistry<B> {
    /// Registry with no devices yet.
    pub fn new(bus: B) -> Self {
        Self {
            inner: Mutex::new(Crate {
                bus,
                devices: Vec::with_capacity(MAX_VME_SLOTS as usize + 1),
            }),
        }
    }

    /// Slot ids in discovery order.
    pub fn slots(&self) -> Vec<u32> {
        self.lock().devices.iter().map(|d| d.slot).collect()
    }

    /// Number of discovered devices.
    pub fn device_count(&self) -> usize {
        self.lock().devices.len()
    }

    /// Table entry for `slot`.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` if the slot was not discovered.
    pub fn device(&self, slot: u32) -> Result<Device> {
        self.lock()
            .find(slot)
            .ok_or(VldError::NotInitialized { slot })
    }

    /// Run `f` against the registers of `slot` under the registry lock.
    ///
    /// An unknown slot fails before any bus access.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` for an unknown slot, otherwise whatever `f`
    /// returns.
    pub fn with_device<T>(
        &self,
        slot: u32,
        f: impl FnOnce(&mut RegisterFile<'_, B>) -> Result<T>,
    ) -> Result<T> {
        let mut guard = self.lock();
        let device = guard.find(slot).ok_or(VldError::NotInitialized { slot })?;
        let mut regs = RegisterFile::new(&mut guard.bus, device.local);
        f(&mut regs)
    }

    /// Give the bus back.
    pub fn into_bus(self) -> B {
        self.inner
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .bus
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Crate<B>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buses::{SimBoard, SimulatedBus};
    use vld_chip::Register;

    #[test]
    fn unknown_slot_touches_nothing() {
        let sim = SimulatedBus::new().with_board(3, SimBoard::vld(3));
        let registry = DeviceRegistry::new(sim.clone());
        let err = registry
            .with_device(3, |regs| regs.read(Register::TrigCnt))
            .unwrap_err();
        assert!(matches!(err, VldError::NotInitialized { slot: 3 }));
        assert_eq!(sim.bus_accesses(), 0);
    }

    #[test]
    fn empty_registry() {
        let registry = DeviceRegistry::new(SimulatedBus::new());
        assert!(registry.slots().is_empty());
        assert_eq!(registry.device_count(), 0);
        assert!(registry.device(5).is_err());
    }
}
