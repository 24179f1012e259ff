//! Emergency JTAG encoding for the PROM shadow register.
//!
//! The board exposes no JTAG controller on the emergency path. Each write of
//! the shadow register clocks the PROM TAP once, with bit 0 driving TMS and
//! bit 1 driving TDI. A TAP operation is therefore a fixed header that walks
//! the state machine into a shift state, one word per shifted bit, and a
//! fixed tail that leaves it again.
//!
//! ```text
//! Reset                 1 1 1 1 1 0            any → Test-Logic-Reset → Idle
//! ShiftInstruction      0 1 1 0 0  bits  1 0   Idle → Shift-IR → Update-IR → Idle
//!   (end = PauseIr)     0 1 1 0 0  bits  0 0   Idle → Shift-IR → Pause-IR
//! ShiftData             0 1 0 0    bits  1 0   Idle → Shift-DR → Update-DR → Idle
//!   (start = PauseIr)   1 1 1 0 0  bits  1 0   Pause-IR → Update-IR → Shift-DR → Idle
//! RunTest               0 × cycles             stay in Idle
//! ```

/// TMS bit of a shadow register word.
pub const TMS: u32 = 1 << 0;
/// TDI bit of a shadow register word.
pub const TDI: u32 = 1 << 1;

const RESET_SEQ: &[u32] = &[1, 1, 1, 1, 1, 0];
const IR_HEADER: &[u32] = &[0, 1, 1, 0, 0];
const IR_TAIL_IDLE: &[u32] = &[1, 0];
const IR_TAIL_PAUSE: &[u32] = &[0, 0];
const DR_HEADER_IDLE: &[u32] = &[0, 1, 0, 0];
const DR_HEADER_PAUSE: &[u32] = &[1, 1, 1, 0, 0];
const DR_TAIL: &[u32] = &[1, 0];
/// Pause-IR → Exit2-IR → Update-IR → Idle.
pub const PAUSE_TO_IDLE: &[u32] = &[1, 1, 0];

/// Stable TAP states the emergency sequences start and end in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TapState {
    /// Run-Test/Idle.
    #[default]
    Idle,
    /// Pause-IR, reached by an instruction shift under `ENDIR IRPAUSE`.
    PauseIr,
}

/// One emergency TAP operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TapOp {
    /// Test-Logic-Reset then Run-Test/Idle.
    Reset,
    /// Shift `bits` bits of `data` into the instruction register.
    ShiftInstruction {
        /// Number of bits to shift.
        bits: usize,
        /// Vector, LSB first, packed in little-endian words.
        data: Vec<u32>,
        /// State to park in afterwards.
        end: TapState,
    },
    /// Shift `bits` bits of `data` into the selected data register.
    ShiftData {
        /// Number of bits to shift.
        bits: usize,
        /// Vector, LSB first, packed in little-endian words.
        data: Vec<u32>,
        /// State the shift starts from.
        start: TapState,
    },
    /// Clock TCK `cycles` times in Run-Test/Idle.
    RunTest {
        /// Idle clocks.
        cycles: usize,
    },
}

impl TapOp {
    fn header(&self) -> &'static [u32] {
        match self {
            Self::Reset => RESET_SEQ,
            Self::ShiftInstruction { .. } => IR_HEADER,
            Self::ShiftData { start: TapState::Idle, .. } => DR_HEADER_IDLE,
            Self::ShiftData { start: TapState::PauseIr, .. } => DR_HEADER_PAUSE,
            Self::RunTest { .. } => &[],
        }
    }

    fn tail(&self) -> &'static [u32] {
        match self {
            Self::ShiftInstruction { end: TapState::Idle, .. } => IR_TAIL_IDLE,
            Self::ShiftInstruction { end: TapState::PauseIr, .. } => IR_TAIL_PAUSE,
            Self::ShiftData { .. } => DR_TAIL,
            Self::Reset | Self::RunTest { .. } => &[],
        }
    }

    /// State the TAP must be in before the operation.
    #[must_use]
    pub fn entry_state(&self) -> Option<TapState> {
        match self {
            Self::Reset => None,
            Self::ShiftData { start, .. } => Some(*start),
            Self::ShiftInstruction { .. } | Self::RunTest { .. } => Some(TapState::Idle),
        }
    }

    /// State the TAP is left in.
    #[must_use]
    pub fn exit_state(&self) -> TapState {
        match self {
            Self::ShiftInstruction { end, .. } => *end,
            Self::Reset | Self::ShiftData { .. } | Self::RunTest { .. } => TapState::Idle,
        }
    }

    /// Shadow register words for this operation, in write order.
    #[must_use]
    pub fn words(&self) -> Words<'_> {
        let body = match self {
            Self::ShiftInstruction { bits, data, .. } | Self::ShiftData { bits, data, .. } => {
                ShiftBits { data, len: *bits, index: 0, exit_on_last: true }
            }
            Self::RunTest { cycles } => ShiftBits { data: &[], len: *cycles, index: 0, exit_on_last: false },
            Self::Reset => ShiftBits { data: &[], len: 0, index: 0, exit_on_last: false },
        };
        Words {
            inner: self.header().iter().copied().chain(body).chain(self.tail().iter().copied()),
        }
    }

    /// Number of shadow register writes the operation needs.
    #[must_use]
    pub fn write_count(&self) -> usize {
        let body = match self {
            Self::ShiftInstruction { bits, .. } | Self::ShiftData { bits, .. } => *bits,
            Self::RunTest { cycles } => *cycles,
            Self::Reset => 0,
        };
        self.header().len() + body + self.tail().len()
    }
}

/// Per-bit words of a shift: `TDI << 1`, with TMS raised on the final bit.
#[derive(Debug, Clone)]
pub struct ShiftBits<'a> {
    data: &'a [u32],
    len: usize,
    index: usize,
    exit_on_last: bool,
}

impl Iterator for ShiftBits<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.index >= self.len {
            return None;
        }
        let i = self.index;
        self.index += 1;
        let word = self.data.get(i / 32).copied().unwrap_or(0);
        let mut out = ((word >> (i % 32)) << 1) & TDI;
        if self.exit_on_last && i + 1 == self.len {
            out |= TMS;
        }
        Some(out)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.len - self.index;
        (n, Some(n))
    }
}

type WordChain<'a> = std::iter::Chain<
    std::iter::Chain<std::iter::Copied<std::slice::Iter<'static, u32>>, ShiftBits<'a>>,
    std::iter::Copied<std::slice::Iter<'static, u32>>,
>;

/// Iterator over the shadow register words of a [`TapOp`].
#[derive(Debug, Clone)]
pub struct Words<'a> {
    inner: WordChain<'a>,
}

impl Iterator for Words<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// Pack LSB-first bytes into little-endian 32-bit words, zero padding the last word.
#[must_use]
pub fn pack_words(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks(4)
        .map(|chunk| {
            let mut buf = [0u8; 4];
            buf[..chunk.len()].copy_from_slice(chunk);
            u32::from_le_bytes(buf)
        })
        .collect()
}

/// Words needed for `bits` bits.
#[must_use]
pub const fn word_count(bits: usize) -> usize {
    if bits == 0 {
        0
    } else {
        (bits - 1) / 32 + 1
    }
}
