//! Instruction grammar shared by the encoder and the decoder.

// --- Match classes ---

/// Short 2-byte match reachable after 1..3 trailing literals.
pub(crate) const M1_MAX_OFFSET: usize = 0x0400;
/// Short 3..8 byte match within 2KB.
pub(crate) const M2_MAX_OFFSET: usize = 0x0800;
/// Match of any length within 16KB.
pub(crate) const M3_MAX_OFFSET: usize = 0x4000;
/// Match of any length within 16KB..48KB.
pub(crate) const M4_MAX_OFFSET: usize = 0xBFFF;

pub(crate) const M2_MIN_LEN: usize = 3;
pub(crate) const M2_MAX_LEN: usize = 8;
pub(crate) const M3_MAX_LEN: usize = 33;
pub(crate) const M4_MAX_LEN: usize = 9;

pub(crate) const M1_MARKER: u8 = 0x00;
pub(crate) const M3_MARKER: u8 = 0x20;
pub(crate) const M4_MARKER: u8 = 0x10;

/// Any opcode with one of these bits set is an M2 instruction.
pub(crate) const M2_MASK: u8 = 0xC0;

/// Distance bias of M4 matches. An M4 whose raw distance equals this value
/// is the end-of-stream marker.
pub(crate) const M4_DISTANCE_BIAS: usize = 0x4000;

/// Length table size used by the lazy heuristic (max M3 length + 1).
pub(crate) const MAX_MATCH_BY_LENGTH: usize = M3_MAX_LEN + 1;

// --- Literal runs ---

/// Bias of the first-byte literal run encoding (`byte - 17`).
pub(crate) const FIRST_LITERAL_BIAS: usize = 17;
/// Longest literal run representable by the first-byte encoding.
pub(crate) const FIRST_LITERAL_MAX: usize = 238;
/// Literal runs up to this length fit in a single M1 length byte.
pub(crate) const SHORT_LITERAL_MAX: usize = 18;
/// Trailing literal runs up to this length ride in the previous match.
pub(crate) const STATE_LITERAL_MAX: usize = 3;

/// Upper bound on zero bytes in a length extension before the additive
/// length would overflow `usize`.
pub(crate) const MAX_255_COUNT: usize = usize::MAX / 255 - 2;

/// Fixed end-of-stream instruction: M4, length 3, distance 16384.
pub(crate) const END_MARKER: [u8; 3] = [M4_MARKER | 1, 0, 0];

/// Number of bytes a zero-byte length extension of `len` occupies: one zero
/// byte per 255 units beyond the first, then the non-zero remainder.
#[inline]
pub(crate) const fn zero_byte_length_size(len: usize) -> usize {
    len.saturating_sub(1) / 255 + 1
}
