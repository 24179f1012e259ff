//! VME addressing constants.
//!
//! Under VME64X geographic addressing a board in slot `n` answers at A24
//! address `n << 19`. Slots 11 and 12 are conventionally reserved for
//! the crate controller and trigger distribution, so the default scan
//! covers 3–10 and 13–20.

/// Highest VME slot number.
pub const MAX_VME_SLOTS: u32 = 21;

/// Shift from slot number to A24 base address.
pub const SLOT_SHIFT: u32 = 19;

/// Address modifiers used by the driver.
pub mod am {
    /// A24 non-privileged data access.
    pub const A24_DATA: u8 = 0x39;
    /// Emergency JTAG access to the PROM shadow register.
    pub const EMERGENCY: u8 = 0x19;
    /// Restore the bus layer's default A24 modifier.
    pub const DEFAULT: u8 = 0x00;
}

/// Slots scanned when no explicit address is given.
pub const DEFAULT_SLOTS: [u32; 16] = [3, 4, 5, 6, 7, 8, 9, 10, 13, 14, 15, 16, 17, 18, 19, 20];

/// A24 base address for a slot.
#[must_use]
pub const fn slot_address(slot: u32) -> u32 {
    slot << SLOT_SHIFT
}

/// Slot implied by an A24 base address.
#[must_use]
pub const fn address_slot(address: u32) -> u32 {
    address >> SLOT_SHIFT
}

/// Default candidate addresses, in scan order.
pub fn default_addresses() -> impl Iterator<Item = u32> {
    DEFAULT_SLOTS.into_iter().map(slot_address)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geographic_addresses() {
        assert_eq!(slot_address(20), 0x00A0_0000);
        assert_eq!(address_slot(0x00A0_0000), 20);
        let addrs: Vec<_> = default_addresses().collect();
        assert_eq!(addrs.first(), Some(&0x0018_0000));
        assert_eq!(addrs.len(), 16);
        assert!(!addrs.contains(&slot_address(11)));
        assert!(!addrs.contains(&slot_address(12)));
    }
}
