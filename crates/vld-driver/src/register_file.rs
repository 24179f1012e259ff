//! Typed register access for one board
//!
//! A `RegisterFile` binds a board's local base address to the bus for the
//! duration of one locked access. Offsets only come from [`Register`], so
//! nothing outside `vld_chip::regs` does address arithmetic.

use crate::bus::VmeBus;
use crate::error::Result;
use vld_chip::Register;

/// Register window of one board, borrowed for a single locked access.
#[derive(Debug)]
pub struct RegisterFile<'a, B: ?Sized> {
    bus: &'a mut B,
    base: usize,
}

impl<'a, B: VmeBus + ?Sized> RegisterFile<'a, B> {
    /// Bind the board at local address `base`.
    pub fn new(bus: &'a mut B, base: usize) -> Self {
        Self { bus, base }
    }

    /// Local address of the board window.
    pub const fn base(&self) -> usize {
        self.base
    }

    /// Local address of `reg`.
    pub const fn address(&self, reg: Register) -> usize {
        self.base + reg.offset()
    }

    /// Read a register.
    ///
    /// # Errors
    ///
    /// Propagates bus errors.
    pub fn read(&mut self, reg: Register) -> Result<u32> {
        let value = self.bus.read32(self.address(reg))?;
        tracing::trace!("{} -> {value:#010x}", reg.name());
        Ok(value)
    }

    /// Write a register.
    ///
    /// # Errors
    ///
    /// Propagates bus errors.
    pub fn write(&mut self, reg: Register, value: u32) -> Result<()> {
        tracing::trace!("{} <- {value:#010x}", reg.name());
        self.bus.write32(self.address(reg), value)
    }

    /// Replace the bits selected by `mask` and keep the rest.
    ///
    /// # Errors
    ///
    /// Propagates bus errors.
    pub fn modify(&mut self, reg: Register, mask: u32, value: u32) -> Result<()> {
        let current = self.read(reg)?;
        self.write(reg, (current & !mask) | (value & mask))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buses::{SimBoard, SimulatedBus};
    use vld_chip::regs;
    use vld_chip::vme::slot_address;

    #[test]
    fn modify_keeps_unselected_bits() {
        let sim = SimulatedBus::new().with_board(7, SimBoard::vld(7));
        sim.set_register(7, regs::ANALOG_CTRL, 0x0000_0100);
        let mut bus = sim.clone();
        let mut file = RegisterFile::new(&mut bus, slot_address(7) as usize);
        file.modify(Register::AnalogCtrl, 0xFEFF, 0x0000_0A05).unwrap();
        assert_eq!(file.read(Register::AnalogCtrl).unwrap(), 0x0000_0B05);
    }

    #[test]
    fn addresses_are_base_plus_offset() {
        let mut bus = SimulatedBus::new();
        let file = RegisterFile::new(&mut bus, 0x18_0000);
        assert_eq!(file.address(Register::TrigCnt), 0x18_00DC);
        assert_eq!(file.base(), 0x18_0000);
    }
}
