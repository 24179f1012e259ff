//! Simulated VME crate
//!
//! An in-memory arena of VLD boards keyed by base address. Local addresses
//! are A24 addresses. The bus is cheaply cloneable: clones share the same
//! crate, so a test can hand one clone to the driver and inspect the
//! boards through another.
//!
//! Address decoding follows the board: data registers answer only under the
//! default/data modifier. Under AM 0x19 only the JTAG shadow register and
//! the identity word decode. Boards can be marked unresponsive to model a
//! bad PROM image, in which case only the emergency decode still works.

use crate::bus::{BusType, VmeBus};
use crate::error::{Result, VldError};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use vld_chip::regs::{self, BOARD_WINDOW};
use vld_chip::vme::{am, slot_address};
use vld_chip::{BoardId, FirmwareVersion};

const A24_LIMIT: usize = 1 << 24;

/// One simulated board.
#[derive(Debug, Clone)]
pub struct SimBoard {
    /// Register contents by offset. The identity and firmware words live here.
    pub registers: BTreeMap<usize, u32>,
    /// Every data-space write as `(offset, value)`, in order.
    pub writes: Vec<(usize, u32)>,
    /// Every emergency shadow register write, in order.
    pub jtag: Vec<u32>,
    /// Whether the board decodes data-space accesses.
    pub responsive: bool,
}

impl SimBoard {
    /// Board with the given identity and firmware words.
    pub fn new(board_id: BoardId, firmware: FirmwareVersion) -> Self {
        let mut registers = BTreeMap::new();
        registers.insert(regs::BOARD_ID, board_id.0);
        registers.insert(regs::FIRMWARE, firmware.0);
        Self {
            registers,
            writes: Vec::new(),
            jtag: Vec::new(),
            responsive: true,
        }
    }

    /// VME64X VLD reporting `slot` with supported firmware.
    pub fn vld(slot: u32) -> Self {
        Self::new(BoardId::compose(slot, 0), FirmwareVersion::minimum_supported())
    }

    /// VLD in a crate without geographic addressing.
    pub fn legacy() -> Self {
        Self::new(
            BoardId::compose(0, 0).without_geographic(),
            FirmwareVersion::minimum_supported(),
        )
    }

    /// Replace the firmware word.
    #[must_use]
    pub fn with_firmware(mut self, firmware: FirmwareVersion) -> Self {
        self.registers.insert(regs::FIRMWARE, firmware.0);
        self
    }

    /// Stop answering data-space accesses.
    #[must_use]
    pub fn unresponsive(mut self) -> Self {
        self.responsive = false;
        self
    }

    /// Current register value (0 if never written).
    pub fn register(&self, offset: usize) -> u32 {
        self.registers.get(&offset).copied().unwrap_or(0)
    }

    /// Data-space writes to one register, in order.
    pub fn writes_to(&self, offset: usize) -> Vec<u32> {
        self.writes
            .iter()
            .filter(|(o, _)| *o == offset)
            .map(|(_, v)| *v)
            .collect()
    }

    fn write(&mut self, offset: usize, value: u32) {
        self.writes.push((offset, value));
        match offset {
            regs::BOARD_ID | regs::FIRMWARE => {
                tracing::trace!("Write to read-only register {offset:#x} dropped");
            }
            _ => {
                self.registers.insert(offset, value);
            }
        }
    }
}

#[derive(Debug, Default)]
struct CrateState {
    boards: BTreeMap<u32, SimBoard>,
    a24_am: u8,
    locked: bool,
    lock_count: usize,
    am_history: Vec<u8>,
    bus_accesses: usize,
}

impl CrateState {
    fn board_mut(&mut self, local: usize) -> Option<(&mut SimBoard, usize)> {
        let (base, board) = self.boards.range_mut(..=u32::try_from(local).ok()?).next_back()?;
        let offset = local - *base as usize;
        (offset < BOARD_WINDOW).then_some((board, offset))
    }
}

/// In-memory VME bus.
#[derive(Debug, Clone, Default)]
pub struct SimulatedBus {
    state: Arc<Mutex<CrateState>>,
}

impl SimulatedBus {
    /// Empty crate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a board in `slot`, builder style.
    #[must_use]
    pub fn with_board(self, slot: u32, board: SimBoard) -> Self {
        self.insert_board(slot, board);
        self
    }

    /// Add a board in `slot`.
    pub fn insert_board(&self, slot: u32, board: SimBoard) {
        self.insert_board_at(slot_address(slot), board);
    }

    /// Add a board at an arbitrary base address.
    pub fn insert_board_at(&self, base: u32, board: SimBoard) {
        self.state().boards.insert(base, board);
    }

    /// Snapshot of the board in `slot`.
    pub fn board(&self, slot: u32) -> Option<SimBoard> {
        self.board_at(slot_address(slot))
    }

    /// Snapshot of the board at `base`.
    pub fn board_at(&self, base: u32) -> Option<SimBoard> {
        self.state().boards.get(&base).cloned()
    }

    /// Overwrite one register of the board in `slot`.
    pub fn set_register(&self, slot: u32, offset: usize, value: u32) {
        if let Some(board) = self.state().boards.get_mut(&slot_address(slot)) {
            board.registers.insert(offset, value);
        }
    }

    /// Current A24 address modifier.
    pub fn a24_am(&self) -> u8 {
        self.state().a24_am
    }

    /// Whether the bus lock is held.
    pub fn is_locked(&self) -> bool {
        self.state().locked
    }

    /// How many times the bus lock was taken.
    pub fn lock_count(&self) -> usize {
        self.state().lock_count
    }

    /// Every modifier passed to `set_a24_am`, in order.
    pub fn am_history(&self) -> Vec<u8> {
        self.state().am_history.clone()
    }

    /// Number of reads, probes and writes issued.
    pub fn bus_accesses(&self) -> usize {
        self.state().bus_accesses
    }

    fn state(&self) -> MutexGuard<'_, CrateState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[allow(clippy::cast_possible_truncation)]
fn bus_error(local: usize, reason: &str) -> VldError {
    VldError::addressing(local as u32, reason)
}

impl VmeBus for SimulatedBus {
    fn bus_to_local(&mut self, modifier: u8, address: u32) -> Result<usize> {
        if modifier != am::A24_DATA && modifier != am::EMERGENCY {
            return Err(VldError::addressing(
                address,
                format!("address modifier {modifier:#x} not mapped"),
            ));
        }
        let local = address as usize;
        if local + 4 > A24_LIMIT {
            return Err(VldError::addressing(address, "outside the A24 space"));
        }
        Ok(local)
    }

    fn probe32(&mut self, local: usize) -> Result<u32> {
        self.read32(local)
            .map_err(|_| bus_error(local, "no response to probe"))
    }

    fn read32(&mut self, local: usize) -> Result<u32> {
        let mut state = self.state();
        state.bus_accesses += 1;
        let emergency = state.a24_am == am::EMERGENCY;
        let (board, offset) = state
            .board_mut(local)
            .ok_or_else(|| bus_error(local, "bus error"))?;
        let decoded = if emergency {
            offset == regs::BOARD_ID
        } else {
            board.responsive && offset != regs::EMERGENCY_JTAG
        };
        if !decoded {
            return Err(bus_error(local, "bus error"));
        }
        Ok(board.register(offset))
    }

    fn write32(&mut self, local: usize, value: u32) -> Result<()> {
        let mut state = self.state();
        state.bus_accesses += 1;
        let emergency = state.a24_am == am::EMERGENCY;
        let (board, offset) = state
            .board_mut(local)
            .ok_or_else(|| bus_error(local, "bus error"))?;
        match (emergency, offset == regs::EMERGENCY_JTAG) {
            (true, true) => board.jtag.push(value),
            (false, false) if board.responsive => board.write(offset, value),
            (true, false) => return Err(bus_error(local, "not decoded under AM 0x19")),
            (false, true) => return Err(bus_error(local, "shadow register needs AM 0x19")),
            (false, false) => return Err(bus_error(local, "bus error")),
        }
        Ok(())
    }

    fn lock(&mut self) {
        let mut state = self.state();
        state.locked = true;
        state.lock_count += 1;
    }

    fn unlock(&mut self) {
        self.state().locked = false;
    }

    fn set_a24_am(&mut self, modifier: u8) -> Result<()> {
        let mut state = self.state();
        state.a24_am = modifier;
        state.am_history.push(modifier);
        Ok(())
    }

    fn bus_type(&self) -> BusType {
        BusType::Simulated
    }
}
