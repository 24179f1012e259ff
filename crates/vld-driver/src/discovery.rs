//! Board discovery
//!
//! Probes candidate A24 addresses for a VLD identity word and fills the
//! registry. A candidate is skipped when it does not answer, carries the
//! wrong type tag, reports a bad or duplicate slot or runs firmware that is
//! too old. Discovery only fails when nothing at all was accepted.
//!
//! Outside a VME64X crate the board reports no geographic address and the
//! slot is taken from the base address instead.

use crate::bus::VmeBus;
use crate::error::{Result, VldError};
use crate::register_file::RegisterFile;
use crate::registry::{Device, DeviceRegistry};
use vld_chip::vme::{self, am, MAX_VME_SLOTS};
use vld_chip::{regs, BoardId, FirmwareVersion, Register};

/// Initialization flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InitFlags {
    /// Record candidates without touching the bus.
    pub no_init: bool,
    /// Accept boards whose firmware is older than supported.
    pub skip_firmware_check: bool,
    /// Use [`InitConfig::address_list`] instead of address/increment/count.
    pub use_address_list: bool,
    /// Log probe failures at debug instead of warn.
    pub quiet: bool,
}

impl InitFlags {
    /// Bit 0: no init.
    pub const NO_INIT: u32 = 1 << 0;
    /// Bit 2: skip the firmware check.
    pub const SKIP_FIRMWARE_CHECK: u32 = 1 << 2;
    /// Bit 3: use the address list.
    pub const USE_ADDR_LIST: u32 = 1 << 3;

    /// Decode the flag word used by existing readout configurations.
    pub const fn from_bits(bits: u32) -> Self {
        Self {
            no_init: bits & Self::NO_INIT != 0,
            skip_firmware_check: bits & Self::SKIP_FIRMWARE_CHECK != 0,
            use_address_list: bits & Self::USE_ADDR_LIST != 0,
            quiet: false,
        }
    }
}

/// Where to look for boards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitConfig {
    /// First address, or a slot number below 22. 0 scans the default slots.
    pub address: u32,
    /// Step between consecutive candidates.
    pub increment: u32,
    /// Number of candidates (0 and 1 both mean one).
    pub count: u32,
    /// Explicit candidates, used with [`InitFlags::use_address_list`].
    pub address_list: Vec<u32>,
    /// Behaviour flags.
    pub flags: InitFlags,
}

impl InitConfig {
    /// Scan the default geographic slots.
    pub fn scan() -> Self {
        Self::default()
    }

    /// A single board by slot number or address.
    pub fn single(address: u32) -> Self {
        Self {
            address,
            ..Self::default()
        }
    }

    /// Explicit candidate list.
    pub fn list(addresses: impl IntoIterator<Item = u32>) -> Self {
        Self {
            address_list: addresses.into_iter().collect(),
            flags: InitFlags {
                use_address_list: true,
                ..InitFlags::default()
            },
            ..Self::default()
        }
    }

    /// Replace the flags.
    #[must_use]
    pub fn with_flags(mut self, flags: InitFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Candidate VME addresses, slot numbers already expanded.
    pub fn candidates(&self) -> Vec<u32> {
        let raw: Vec<u32> = if self.flags.use_address_list {
            self.address_list.clone()
        } else if self.address == 0 {
            vme::default_addresses().collect()
        } else {
            (0..self.count.max(1))
                .map(|i| self.address.wrapping_add(i.wrapping_mul(self.increment)))
                .collect()
        };
        raw.into_iter().map(expand_slot).collect()
    }
}

/// Numbers below 22 name a slot rather than an address.
const fn expand_slot(candidate: u32) -> u32 {
    if candidate != 0 && candidate <= MAX_VME_SLOTS {
        vme::slot_address(candidate)
    } else {
        candidate
    }
}

/// Register names and offsets in address order, for debug output.
pub fn check_addresses() -> Vec<(&'static str, usize)> {
    let layout = regs::layout();
    for (name, offset) in &layout {
        tracing::debug!("{name:<18} {offset:#07x}");
    }
    layout
}

impl<B: VmeBus> DeviceRegistry<B> {
    /// Discover boards and replace the device table.
    ///
    /// Returns the number of accepted boards.
    ///
    /// # Errors
    ///
    /// Returns `NoDevicesFound` when no candidate was accepted; the table is
    /// left empty in that case.
    pub fn init(&self, config: &InitConfig) -> Result<usize> {
        let candidates = config.candidates();
        let flags = config.flags;
        let mut guard = self.lock();
        let state = &mut *guard;
        state.devices.clear();

        tracing::info!("Probing {} VLD candidate address(es)", candidates.len());

        for address in candidates {
            if flags.no_init {
                let slot = vme::address_slot(address);
                if slot == 0 || slot > MAX_VME_SLOTS {
                    tracing::warn!("Address {address:#x} does not map to a valid slot");
                    continue;
                }
                if state.find(slot).is_some() {
                    tracing::warn!("Slot {slot} listed twice");
                    continue;
                }
                let local = match state.bus.bus_to_local(am::A24_DATA, address) {
                    Ok(local) => local,
                    Err(e) => {
                        tracing::warn!("{e}");
                        continue;
                    }
                };
                state.devices.push(Device {
                    slot,
                    address,
                    local,
                });
                continue;
            }

            let local = match state.bus.bus_to_local(am::A24_DATA, address) {
                Ok(local) => local,
                Err(e) => {
                    tracing::error!("{e}");
                    continue;
                }
            };

            let board_id = match state.bus.probe32(local + Register::BoardId.offset()) {
                Ok(word) => BoardId(word),
                Err(e) => {
                    if flags.quiet {
                        tracing::debug!("No addressable board at {address:#x}: {e}");
                    } else {
                        tracing::warn!("No addressable board at {address:#x}: {e}");
                    }
                    continue;
                }
            };

            if !board_id.is_vld() {
                tracing::warn!(
                    "{}",
                    VldError::WrongBoardType {
                        address,
                        board_id: board_id.0,
                    }
                );
                continue;
            }

            let slot = if board_id.vme64x() {
                board_id.geo_slot()
            } else {
                tracing::debug!("Board at {address:#x} is not in a VME64X crate");
                vme::address_slot(address)
            };
            if slot == 0 || slot > MAX_VME_SLOTS {
                tracing::warn!("Board at {address:#x}: {}", VldError::InvalidSlot { slot });
                continue;
            }
            if state.find(slot).is_some() {
                tracing::warn!("Board at {address:#x} reports slot {slot}, already registered");
                continue;
            }

            let device = Device {
                slot,
                address,
                local,
            };
            state.devices.push(device);
            tracing::info!(
                "VLD in slot {slot} at {address:#x} (production {})",
                board_id.production()
            );

            let firmware = match RegisterFile::new(&mut state.bus, local).read(Register::Firmware) {
                Ok(word) => FirmwareVersion(word),
                Err(e) => {
                    tracing::error!("Slot {slot}: firmware read failed: {e}");
                    state.devices.pop();
                    continue;
                }
            };

            if firmware.is_supported() {
                tracing::debug!("Slot {slot}: firmware {firmware}");
            } else if flags.skip_firmware_check {
                tracing::warn!(
                    "Slot {slot}: firmware {firmware} below {} accepted (check skipped)",
                    FirmwareVersion::minimum_supported()
                );
            } else {
                tracing::error!(
                    "{}",
                    VldError::UnsupportedFirmware {
                        slot,
                        version: firmware.0,
                    }
                );
                state.devices.pop();
            }
        }

        let found = state.devices.len();
        if found == 0 {
            tracing::error!("Unable to initialize any VLD modules");
            return Err(VldError::NoDevicesFound);
        }

        tracing::info!("Found {found} VLD module(s)");
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_address_scans_default_slots() {
        let candidates = InitConfig::scan().candidates();
        assert_eq!(candidates.len(), 16);
        assert_eq!(candidates[0], 3 << 19);
        assert_eq!(candidates[15], 20 << 19);
    }

    #[test]
    fn slot_numbers_are_expanded() {
        assert_eq!(InitConfig::single(5).candidates(), vec![5 << 19]);
        assert_eq!(InitConfig::single(21).candidates(), vec![21 << 19]);
        assert_eq!(InitConfig::single(22).candidates(), vec![22]);
        assert_eq!(InitConfig::single(0x28_0000).candidates(), vec![0x28_0000]);
    }

    #[test]
    fn increment_and_count() {
        let config = InitConfig {
            address: 0x18_0000,
            increment: 0x8_0000,
            count: 3,
            ..InitConfig::default()
        };
        assert_eq!(config.candidates(), vec![0x18_0000, 0x20_0000, 0x28_0000]);
    }

    #[test]
    fn address_list_takes_precedence() {
        let config = InitConfig::list([4, 0x48_0000]);
        assert_eq!(config.candidates(), vec![4 << 19, 0x48_0000]);
    }

    #[test]
    fn flag_word() {
        let flags = InitFlags::from_bits(0b1101);
        assert!(flags.no_init && flags.skip_firmware_check && flags.use_address_list);
        assert_eq!(InitFlags::from_bits(0), InitFlags::default());
    }

    #[test]
    fn layout_is_ordered() {
        let layout = check_addresses();
        assert!(layout.windows(2).all(|w| w[0].1 < w[1].1));
        assert_eq!(layout.first().map(|e| e.1), Some(0));
    }
}
