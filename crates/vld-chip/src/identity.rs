//! Board identity and firmware version decoding.

use crate::regs::{board_id, firmware};
use crate::vme::MAX_VME_SLOTS;

/// Decoded `boardID` register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardId(pub u32);

impl BoardId {
    /// Type tag (`0x1D` for a VLD).
    #[must_use]
    pub const fn type_tag(self) -> u32 {
        (self.0 & board_id::TYPE_MASK) >> 24
    }

    /// Whether the type tag identifies a VLD.
    #[must_use]
    pub const fn is_vld(self) -> bool {
        self.type_tag() == board_id::TYPE_VLD
    }

    /// Production code.
    #[must_use]
    pub const fn production(self) -> u32 {
        (self.0 & board_id::PROD_MASK) >> 16
    }

    /// Geographic slot number reported by the backplane (0 outside a VME64X crate).
    #[must_use]
    pub const fn geo_slot(self) -> u32 {
        (self.0 & board_id::GEOADR_MASK) >> 8
    }

    /// Whether the geographic slot lies in `1..=21`.
    #[must_use]
    pub const fn has_valid_slot(self) -> bool {
        let slot = self.geo_slot();
        slot >= 1 && slot <= MAX_VME_SLOTS
    }

    /// Board reports a VME64X crate.
    #[must_use]
    pub const fn vme64x(self) -> bool {
        self.0 & board_id::VME64X != 0
    }

    /// Crate id.
    #[must_use]
    pub const fn crate_id(self) -> u32 {
        self.0 & board_id::CRATEID_MASK
    }

    /// Compose an identity word (used by simulation and tests).
    #[must_use]
    pub const fn compose(geo_slot: u32, crate_id: u32) -> Self {
        Self(
            (board_id::TYPE_VLD << 24)
                | board_id::VME64X
                | ((geo_slot << 8) & board_id::GEOADR_MASK)
                | (crate_id & board_id::CRATEID_MASK),
        )
    }

    /// The same word as reported outside a VME64X crate.
    #[must_use]
    pub const fn without_geographic(self) -> Self {
        Self(self.0 & !(board_id::VME64X | board_id::GEOADR_MASK))
    }
}

/// Decoded firmware version register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareVersion(pub u32);

impl FirmwareVersion {
    /// Firmware id (upper half word).
    #[must_use]
    pub const fn id(self) -> u32 {
        (self.0 & firmware::ID_MASK) >> 16
    }

    /// Firmware type (1 production, 3 "P").
    #[must_use]
    pub const fn fw_type(self) -> u32 {
        (self.0 & firmware::TYPE_MASK) >> 12
    }

    /// Major version.
    #[must_use]
    pub const fn major(self) -> u32 {
        (self.0 & firmware::MAJOR_VERSION_MASK) >> 4
    }

    /// Minor version.
    #[must_use]
    pub const fn minor(self) -> u32 {
        self.0 & firmware::MINOR_VERSION_MASK
    }

    /// Type and major version meet the driver minimum.
    #[must_use]
    pub const fn is_supported(self) -> bool {
        self.fw_type() == firmware::SUPPORTED_TYPE && self.major() >= firmware::SUPPORTED_MAJOR
    }

    /// Compose a firmware word (used by simulation and tests).
    #[must_use]
    pub const fn compose(fw_type: u32, major: u32, minor: u32) -> Self {
        Self(
            ((fw_type << 12) & firmware::TYPE_MASK)
                | ((major << 4) & firmware::MAJOR_VERSION_MASK)
                | (minor & firmware::MINOR_VERSION_MASK),
        )
    }

    /// The oldest firmware the driver accepts.
    #[must_use]
    pub const fn minimum_supported() -> Self {
        Self::compose(firmware::SUPPORTED_TYPE, firmware::SUPPORTED_MAJOR, 0)
    }
}

impl std::fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{:#04x}.{}", self.fw_type(), self.major(), self.minor())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn board_id_fields() {
        let id = BoardId(0x1D00_2A07);
        assert!(id.is_vld());
        assert_eq!(id.geo_slot(), 0x0A);
        assert!(id.vme64x());
        assert_eq!(id.crate_id(), 7);
        assert!(id.has_valid_slot());
    }

    #[test]
    fn wrong_type_tag() {
        let id = BoardId(0x7100_0A00);
        assert!(!id.is_vld());
    }

    #[test]
    fn slot_range() {
        assert!(!BoardId::compose(0, 0).has_valid_slot());
        assert!(BoardId::compose(21, 0).has_valid_slot());
        assert!(!BoardId::compose(22, 0).has_valid_slot());
        assert_eq!(BoardId::compose(13, 2).geo_slot(), 13);
    }

    #[test]
    fn firmware_gate() {
        assert!(FirmwareVersion::minimum_supported().is_supported());
        assert!(FirmwareVersion::compose(3, 0x82, 1).is_supported());
        assert!(!FirmwareVersion::compose(3, 0x80, 9).is_supported());
        assert!(!FirmwareVersion::compose(1, 0x90, 0).is_supported());
    }

    #[test]
    fn firmware_display() {
        assert_eq!(FirmwareVersion::compose(3, 0x81, 2).to_string(), "3-0x81.2");
    }
}
