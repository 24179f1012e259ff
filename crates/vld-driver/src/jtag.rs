//! Emergency JTAG port
//!
//! With the FPGA unconfigured the board still decodes one shadow register
//! under address modifier 0x19. [`JtagPort`] drives the PROM TAP through it,
//! one write per TCK, and tracks which stable state the TAP is parked in.
//!
//! Entering emergency addressing takes the bus lock and switches the A24
//! modifier. [`EmergencyAddressing`] undoes both when it goes out of scope,
//! whatever path the caller leaves by.

use crate::bus::VmeBus;
use crate::error::{Result, VldError};
use vld_chip::jtag::PAUSE_TO_IDLE;
use vld_chip::regs::{BOARD_ID, EMERGENCY_JTAG};
use vld_chip::vme::am;
use vld_chip::{TapOp, TapState};

/// Bus held locked with the A24 modifier set to 0x19.
#[derive(Debug)]
pub struct EmergencyAddressing<'a, B: VmeBus + ?Sized> {
    bus: &'a mut B,
}

impl<'a, B: VmeBus + ?Sized> EmergencyAddressing<'a, B> {
    /// Lock the bus and select the emergency modifier.
    ///
    /// # Errors
    ///
    /// Returns the bus error if the modifier cannot be set; the lock is
    /// released again before returning.
    pub fn enter(bus: &'a mut B) -> Result<Self> {
        bus.lock();
        let mut guard = Self { bus };
        guard.bus.set_a24_am(am::EMERGENCY)?;
        tracing::debug!("A24 memory map set to AM {:#x}", am::EMERGENCY);
        Ok(guard)
    }

    /// The locked bus.
    pub fn bus(&mut self) -> &mut B {
        self.bus
    }
}

impl<B: VmeBus + ?Sized> Drop for EmergencyAddressing<'_, B> {
    fn drop(&mut self) {
        if let Err(e) = self.bus.set_a24_am(am::DEFAULT) {
            tracing::error!("Failed to restore A24 address modifier: {e}");
        }
        self.bus.unlock();
        tracing::debug!("A24 address modifier restored, bus unlocked");
    }
}

/// Convert a legacy emergency opcode.
///
/// 0 reset, 1 instruction shift, 2 data shift, 3 instruction shift parking
/// in Pause-IR, 4 data shift starting from Pause-IR, 5 run-test (`bits` is
/// the cycle count).
///
/// # Errors
///
/// Returns `UnknownJtagOp` for any other opcode.
pub fn legacy_op(opcode: u32, bits: usize, data: &[u32]) -> Result<TapOp> {
    let data = data.to_vec();
    match opcode {
        0 => Ok(TapOp::Reset),
        1 => Ok(TapOp::ShiftInstruction {
            bits,
            data,
            end: TapState::Idle,
        }),
        2 => Ok(TapOp::ShiftData {
            bits,
            data,
            start: TapState::Idle,
        }),
        3 => Ok(TapOp::ShiftInstruction {
            bits,
            data,
            end: TapState::PauseIr,
        }),
        4 => Ok(TapOp::ShiftData {
            bits,
            data,
            start: TapState::PauseIr,
        }),
        5 => Ok(TapOp::RunTest { cycles: bits }),
        opcode => Err(VldError::UnknownJtagOp { opcode }),
    }
}

/// PROM TAP driven through the emergency shadow register of one board.
#[derive(Debug)]
pub struct JtagPort<'a, B: VmeBus + ?Sized> {
    addressing: EmergencyAddressing<'a, B>,
    base: usize,
    state: TapState,
    writes: u64,
}

impl<'a, B: VmeBus + ?Sized> JtagPort<'a, B> {
    /// Enter emergency addressing for the board at local address `base`.
    ///
    /// # Errors
    ///
    /// Returns the bus error if emergency addressing cannot be entered.
    pub fn open(bus: &'a mut B, base: usize) -> Result<Self> {
        Ok(Self {
            addressing: EmergencyAddressing::enter(bus)?,
            base,
            state: TapState::Idle,
            writes: 0,
        })
    }

    /// Stable state the TAP is parked in.
    pub const fn state(&self) -> TapState {
        self.state
    }

    /// Shadow register writes issued so far.
    pub const fn writes(&self) -> u64 {
        self.writes
    }

    /// Probe the identity word under the emergency modifier.
    ///
    /// # Errors
    ///
    /// Returns the probe error if the board does not answer.
    pub fn probe(&mut self) -> Result<u32> {
        self.addressing.bus().probe32(self.base + BOARD_ID)
    }

    fn clock(&mut self, word: u32) -> Result<()> {
        self.writes += 1;
        self.addressing
            .bus()
            .write32(self.base + EMERGENCY_JTAG, word)
    }

    /// Run one TAP operation.
    ///
    /// An operation that starts in Run-Test/Idle while the TAP is parked in
    /// Pause-IR first walks back to Idle.
    ///
    /// # Errors
    ///
    /// Propagates bus errors.
    pub fn execute(&mut self, op: &TapOp) -> Result<()> {
        match (op.entry_state(), self.state) {
            (Some(TapState::Idle), TapState::PauseIr) => {
                tracing::trace!("TAP parked in Pause-IR, returning to Idle");
                for &word in PAUSE_TO_IDLE {
                    self.clock(word)?;
                }
            }
            (Some(TapState::PauseIr), TapState::Idle) => {
                tracing::warn!("Data shift from Pause-IR requested with the TAP in Idle");
            }
            _ => {}
        }

        for word in op.words() {
            self.clock(word)?;
        }
        self.state = op.exit_state();
        Ok(())
    }

    /// Run a legacy-opcode operation.
    ///
    /// # Errors
    ///
    /// Returns `UnknownJtagOp` without touching the bus for an unknown
    /// opcode, otherwise propagates bus errors.
    pub fn emergency(&mut self, opcode: u32, bits: usize, data: &[u32]) -> Result<()> {
        let op = legacy_op(opcode, bits, data)?;
        self.execute(&op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buses::{SimBoard, SimulatedBus};
    use vld_chip::vme::slot_address;

    fn crate_with_board() -> (SimulatedBus, usize) {
        let sim = SimulatedBus::new().with_board(9, SimBoard::vld(9));
        (sim, slot_address(9) as usize)
    }

    #[test]
    fn guard_restores_addressing() {
        let (sim, _) = crate_with_board();
        let mut bus = sim.clone();
        {
            let _guard = EmergencyAddressing::enter(&mut bus).unwrap();
            assert!(sim.is_locked());
            assert_eq!(sim.a24_am(), am::EMERGENCY);
        }
        assert!(!sim.is_locked());
        assert_eq!(sim.am_history(), vec![am::EMERGENCY, am::DEFAULT]);
    }

    #[test]
    fn reset_sequence() {
        let (sim, base) = crate_with_board();
        let mut bus = sim.clone();
        let mut port = JtagPort::open(&mut bus, base).unwrap();
        port.emergency(0, 0, &[]).unwrap();
        drop(port);
        assert_eq!(sim.board(9).unwrap().jtag, vec![1, 1, 1, 1, 1, 0]);
    }

    #[test]
    fn unknown_opcode_writes_nothing() {
        let (sim, base) = crate_with_board();
        let mut bus = sim.clone();
        let mut port = JtagPort::open(&mut bus, base).unwrap();
        let err = port.emergency(7, 8, &[0xFF]).unwrap_err();
        assert!(matches!(err, VldError::UnknownJtagOp { opcode: 7 }));
        assert_eq!(port.writes(), 0);
        drop(port);
        assert!(sim.board(9).unwrap().jtag.is_empty());
    }

    #[test]
    fn pause_ir_then_data_shift() {
        let (sim, base) = crate_with_board();
        let mut bus = sim.clone();
        let mut port = JtagPort::open(&mut bus, base).unwrap();
        port.emergency(3, 2, &[0b01]).unwrap();
        assert_eq!(port.state(), TapState::PauseIr);
        port.emergency(4, 1, &[1]).unwrap();
        assert_eq!(port.state(), TapState::Idle);
        drop(port);
        assert_eq!(
            sim.board(9).unwrap().jtag,
            vec![0, 1, 1, 0, 0, 2, 1, 0, 0, 1, 1, 1, 0, 0, 3, 1, 0]
        );
    }

    #[test]
    fn instruction_while_parked_returns_to_idle() {
        let (sim, base) = crate_with_board();
        let mut bus = sim.clone();
        let mut port = JtagPort::open(&mut bus, base).unwrap();
        port.emergency(3, 1, &[0]).unwrap();
        port.emergency(1, 1, &[0]).unwrap();
        drop(port);
        assert_eq!(
            sim.board(9).unwrap().jtag,
            vec![0, 1, 1, 0, 0, 1, 0, 0, 1, 1, 0, 0, 1, 1, 0, 0, 1, 1, 0]
        );
    }

    #[test]
    fn runtest_clocks_in_idle() {
        let op = legacy_op(5, 4, &[]).unwrap();
        assert_eq!(op, TapOp::RunTest { cycles: 4 });
        assert_eq!(op.words().collect::<Vec<_>>(), vec![0, 0, 0, 0]);
    }
}
