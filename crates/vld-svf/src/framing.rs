//! Physical line framing of long `SDR` payloads.
//!
//! The PROM toolchain wraps bitstream-sized `SDR` vectors over many physical
//! lines. How many bytes land on the header line and on the closing line
//! depends on the payload size bracket. The byte counts below are placeholder
//! configuration and must be replaced with the layout the real toolchain
//! writes. The reader only uses them to predict line counts and report
//! statements that do not fit.

/// Bytes carried by every full intermediate line.
pub const INTERMEDIATE_LINE_BYTES: usize = 127;

/// Framing for one payload size bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SdrFraming {
    /// Bracket applies to payloads strictly smaller than this many bytes.
    pub below_bytes: usize,
    /// Payload bytes on the `SDR` header line.
    pub first_line_bytes: usize,
    /// Payload bytes on the closing line.
    pub trailing_line_bytes: usize,
}

/// Size brackets, smallest first.
pub const SDR_FRAMING: [SdrFraming; 4] = [
    SdrFraming { below_bytes: 160, first_line_bytes: 120, trailing_line_bytes: 40 },
    SdrFraming { below_bytes: 300, first_line_bytes: 120, trailing_line_bytes: 53 },
    SdrFraming { below_bytes: 1_200_000, first_line_bytes: 119, trailing_line_bytes: 26 },
    SdrFraming { below_bytes: 1_300_000, first_line_bytes: 119, trailing_line_bytes: 71 },
];

impl SdrFraming {
    /// Framing bracket for a payload of `nbytes`, if any.
    #[must_use]
    pub fn for_payload(nbytes: usize) -> Option<Self> {
        SDR_FRAMING.iter().copied().find(|f| nbytes < f.below_bytes)
    }

    /// Number of full-width lines between the header and closing lines.
    #[must_use]
    pub fn intermediate_lines(&self, nbytes: usize) -> usize {
        nbytes
            .saturating_sub(self.first_line_bytes + self.trailing_line_bytes)
            .div_ceil(INTERMEDIATE_LINE_BYTES)
    }

    /// Physical lines following the header line (intermediate plus closing).
    #[must_use]
    pub fn continuation_lines(&self, nbytes: usize) -> usize {
        self.intermediate_lines(nbytes) + 1
    }
}

/// Bytes needed for `bits` bits.
#[must_use]
pub const fn byte_count(bits: usize) -> usize {
    if bits == 0 {
        0
    } else {
        (bits - 1) / 8 + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bracket_lookup() {
        assert_eq!(SdrFraming::for_payload(4).unwrap().below_bytes, 160);
        assert_eq!(SdrFraming::for_payload(160).unwrap().below_bytes, 300);
        assert_eq!(SdrFraming::for_payload(299_999).unwrap().below_bytes, 1_200_000);
        assert_eq!(SdrFraming::for_payload(1_250_000).unwrap().below_bytes, 1_300_000);
        assert!(SdrFraming::for_payload(1_300_000).is_none());
    }

    #[test]
    fn small_payloads_need_only_a_closing_line() {
        let f = SdrFraming::for_payload(64).unwrap();
        assert_eq!(f.intermediate_lines(64), 0);
        assert_eq!(f.continuation_lines(64), 1);
    }

    #[test]
    fn intermediate_lines_round_up() {
        let f = SdrFraming::for_payload(4096).unwrap();
        // 4096 - 145 = 3951 bytes over 127-byte lines
        assert_eq!(f.intermediate_lines(4096), 32);
    }

    #[test]
    fn byte_counts() {
        assert_eq!(byte_count(1), 1);
        assert_eq!(byte_count(8), 1);
        assert_eq!(byte_count(9), 2);
        assert_eq!(byte_count(0), 0);
    }
}
