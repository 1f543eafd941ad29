use alloc::vec::Vec;
use tracing::{debug, trace};

use crate::dict::{BestOffsets, Dict};
use crate::error::LzoError;
use crate::opcode::{
    END_MARKER, FIRST_LITERAL_BIAS, FIRST_LITERAL_MAX, M1_MARKER, M1_MAX_OFFSET,
    M2_MAX_LEN, M2_MAX_OFFSET, M2_MIN_LEN, M3_MARKER, M3_MAX_LEN, M3_MAX_OFFSET,
    M4_DISTANCE_BIAS, M4_MARKER, M4_MAX_LEN, M4_MAX_OFFSET, MAX_255_COUNT, MAX_MATCH_BY_LENGTH,
    SHORT_LITERAL_MAX, STATE_LITERAL_MAX, zero_byte_length_size,
};

type Result<T> = core::result::Result<T, LzoError>;

/// Upper bound on the compressed size of `uncompressed_size` bytes.
///
/// Buffers of at least this size never fail with
/// [`LzoError::OutputOverrun`].
#[must_use]
pub const fn compress_worst_size(uncompressed_size: usize) -> usize {
    uncompressed_size + uncompressed_size / 16 + 64 + 3
}

/// Bounds-checked writer over the caller's output buffer.
struct Output<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Output<'a> {
    const fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    #[inline]
    const fn needs(&self, count: usize) -> Result<()> {
        if count > self.buf.len() - self.pos {
            return Err(LzoError::OutputOverrun { written: self.pos });
        }
        Ok(())
    }

    #[inline]
    fn put(&mut self, byte: u8) {
        self.buf[self.pos] = byte;
        self.pos += 1;
    }

    #[inline]
    fn put_slice(&mut self, bytes: &[u8]) {
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
    }

    /// Writes `len` as a zero-byte length extension.
    fn put_zero_byte_length(&mut self, mut len: usize) {
        while len > 255 {
            self.put(0);
            len -= 255;
        }
        self.put(len as u8);
    }

    /// Writes an M3/M4 opcode carrying `len`, extending it with zero bytes
    /// when it exceeds the class's inline maximum.
    fn put_match_length(&mut self, marker: u8, len: usize, inline_max: usize) -> Result<()> {
        if len <= inline_max {
            self.needs(1)?;
            self.put(marker | (len - 2) as u8);
        } else {
            let ext = len - inline_max;
            self.needs(zero_byte_length_size(ext) + 1)?;
            self.put(marker);
            self.put_zero_byte_length(ext);
        }
        Ok(())
    }

    /// Writes the LE16 distance word of an M3/M4 instruction. The low two
    /// bits (trailing literal count) are filled in by the next literal run.
    fn put_distance(&mut self, dist: usize) -> Result<()> {
        self.needs(2)?;
        self.put((dist << 2) as u8);
        self.put((dist >> 6) as u8);
        Ok(())
    }

    /// Sets the trailing-literal bits of the previous instruction. They
    /// always live two bytes back from the end of a match instruction.
    fn set_trailing_count(&mut self, count: usize) {
        self.buf[self.pos - 2] |= count as u8;
    }
}

/// Shortens a far match when a slightly shorter one fits a cheaper class.
///
/// `best_off[n]` holds the nearest offset with a match of exactly `n` bytes
/// at the current position. Only offsets that fit the targeted class are
/// taken, so the result is always encodable.
fn find_better_match(best_off: &BestOffsets, len: &mut usize, off: &mut usize) {
    if *len <= M2_MIN_LEN || *off <= M2_MAX_OFFSET {
        return;
    }

    let fits = |l: usize, max_off: usize| best_off[l] != 0 && best_off[l] <= max_off;

    let shorter = if (M2_MIN_LEN + 1..=M2_MAX_LEN + 1).contains(len) && fits(*len - 1, M2_MAX_OFFSET)
    {
        *len - 1
    } else if *off > M3_MAX_OFFSET && *len == M2_MAX_LEN + 2 && fits(*len - 2, M2_MAX_OFFSET) {
        *len - 2
    } else if *off > M3_MAX_OFFSET
        && (M4_MAX_LEN + 1..=M3_MAX_LEN + 1).contains(len)
        && fits(*len - 1, M3_MAX_OFFSET)
    {
        *len - 1
    } else {
        return;
    };

    *len = shorter;
    *off = best_off[shorter];
}

/// Decides whether a match found by the dictionary is worth an instruction.
///
/// `lit_len` is the pending literal run and `at_start` is true while
/// nothing has been written yet.
const fn worth_encoding(len: usize, off: usize, lit_len: usize, at_start: bool) -> bool {
    if len < 2 {
        return false;
    }
    // Two-byte matches only exist as M1 after a 1..=3 literal run.
    if len == 2 && (off > M1_MAX_OFFSET || lit_len == 0 || lit_len > STATE_LITERAL_MAX || at_start)
    {
        return false;
    }
    // The stream must open with literals.
    if at_start && lit_len == 0 {
        return false;
    }
    // A 3-byte match beyond M1's reach costs as much as the literals.
    if len == M2_MIN_LEN && off > M1_MAX_OFFSET + M2_MAX_OFFSET && lit_len > STATE_LITERAL_MAX {
        return false;
    }
    true
}

/// Emits a pending literal run.
///
/// Runs of 1..=3 bytes after a match ride in that match's trailing bits.
fn encode_literal_run(out: &mut Output<'_>, lits: &[u8]) -> Result<()> {
    let len = lits.len();
    if len == 0 {
        return Ok(());
    }

    if out.pos == 0 && len <= FIRST_LITERAL_MAX {
        out.needs(1)?;
        out.put((FIRST_LITERAL_BIAS + len) as u8);
    } else if len <= STATE_LITERAL_MAX {
        out.set_trailing_count(len);
    } else if len <= SHORT_LITERAL_MAX {
        out.needs(1)?;
        out.put((len - 3) as u8);
    } else {
        let ext = len - SHORT_LITERAL_MAX;
        if ext / 255 > MAX_255_COUNT {
            return Err(LzoError::Malformed { written: out.pos });
        }
        out.needs(zero_byte_length_size(ext) + 1)?;
        out.put(0);
        out.put_zero_byte_length(ext);
    }

    out.needs(len)?;
    out.put_slice(lits);
    Ok(())
}

/// Emits one lookback match in the cheapest class that can express it.
///
/// `last_lit_len` is the length of the literal run written just before, which
/// fixes how the decoder will read an M1 opcode.
fn encode_lookback_match(
    out: &mut Output<'_>,
    len: usize,
    off: usize,
    last_lit_len: usize,
) -> Result<()> {
    debug_assert!(off > 0 && off <= M4_MAX_OFFSET);

    if len == 2 {
        // 0 0 0 0 D D S S, H: distance = (H << 2) + D + 1
        let dist = off - 1;
        out.needs(2)?;
        out.put(M1_MARKER | ((dist & 0x3) << 2) as u8);
        out.put((dist >> 2) as u8);
    } else if len <= M2_MAX_LEN && off <= M2_MAX_OFFSET {
        // L L L D D D S S, H: distance = (H << 3) + D + 1
        let dist = off - 1;
        out.needs(2)?;
        out.put((((len - 1) << 5) | ((dist & 0x7) << 2)) as u8);
        out.put((dist >> 3) as u8);
    } else if len == M2_MIN_LEN
        && off <= M1_MAX_OFFSET + M2_MAX_OFFSET
        && last_lit_len > STATE_LITERAL_MAX
    {
        // 0 0 0 0 D D S S, H after a long literal run: distance + 2049
        let dist = off - 1 - M2_MAX_OFFSET;
        out.needs(2)?;
        out.put(M1_MARKER | ((dist & 0x3) << 2) as u8);
        out.put((dist >> 2) as u8);
    } else if off <= M3_MAX_OFFSET {
        out.put_match_length(M3_MARKER, len, M3_MAX_LEN)?;
        out.put_distance(off - 1)?;
    } else {
        let dist = off - M4_DISTANCE_BIAS;
        let high = ((dist & 0x4000) >> 11) as u8;
        out.put_match_length(M4_MARKER | high, len, M4_MAX_LEN)?;
        out.put_distance(dist)?;
    }
    Ok(())
}

fn encode(input: &[u8], out: &mut Output<'_>, dict: &mut Dict) -> Result<()> {
    let mut window = dict.reset(input);
    let mut best_off: BestOffsets = [0; MAX_MATCH_BY_LENGTH];
    let mut lit_start = 0;
    let mut lit_len = 0;

    let mut next = dict.advance(&mut window, 0, &mut best_off);
    while let Some(candidate) = next {
        if lit_len == 0 {
            lit_start = candidate.src_pos;
        }

        let (mut len, mut off) = (candidate.len, candidate.off);
        if !worth_encoding(len, off, lit_len, out.pos == 0) {
            lit_len += 1;
            next = dict.advance(&mut window, 0, &mut best_off);
            continue;
        }

        find_better_match(&best_off, &mut len, &mut off);
        encode_literal_run(out, &input[lit_start..lit_start + lit_len])?;
        encode_lookback_match(out, len, off, lit_len)?;
        lit_len = 0;
        next = dict.advance(&mut window, len - 1, &mut best_off);
    }

    encode_literal_run(out, &input[lit_start..lit_start + lit_len])?;

    out.needs(END_MARKER.len())?;
    out.put_slice(&END_MARKER);
    Ok(())
}

/// Compresses `input` into `output` using a caller-provided [`Dict`].
///
/// Returns the number of bytes written. Size `output` with
/// [`compress_worst_size`] to rule out [`LzoError::OutputOverrun`].
///
/// # Errors
/// [`LzoError::OutputOverrun`] if `output` is too small, carrying the number
/// of bytes written before the instruction that did not fit.
pub fn compress_with_dict(input: &[u8], output: &mut [u8], dict: &mut Dict) -> Result<usize> {
    let mut out = Output::new(output);
    match encode(input, &mut out, dict) {
        Ok(()) => {
            trace!(input_len = input.len(), written = out.pos, "LZO1X stream encoded");
            Ok(out.pos)
        }
        Err(err) => {
            debug!(%err, input_len = input.len(), "LZO1X compression failed");
            Err(err)
        }
    }
}

/// Compresses `input` into `output`, allocating a fresh [`Dict`].
///
/// # Errors
/// See [`compress_with_dict`].
pub fn compress_to_slice(input: &[u8], output: &mut [u8]) -> Result<usize> {
    compress_with_dict(input, output, &mut Dict::new())
}

/// Compresses `input`, appending the LZO1X stream to `output`.
///
/// # Errors
/// Never fails in practice since the scratch region is sized with
/// [`compress_worst_size`]; on error `output` is left unchanged.
pub fn compress(input: &[u8], output: &mut Vec<u8>) -> Result<()> {
    let start = output.len();
    output.resize(start + compress_worst_size(input.len()), 0);

    match compress_to_slice(input, &mut output[start..]) {
        Ok(written) => {
            output.truncate(start + written);
            Ok(())
        }
        Err(err) => {
            output.truncate(start);
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_match(len: usize, off: usize, last_lit_len: usize) -> Vec<u8> {
        let mut buf = [0u8; 16];
        let mut out = Output::new(&mut buf);
        encode_lookback_match(&mut out, len, off, last_lit_len).unwrap();
        let n = out.pos;
        buf[..n].to_vec()
    }

    #[test]
    fn empty_input_is_end_marker_only() {
        let mut out = [0u8; 8];
        assert_eq!(compress_to_slice(&[], &mut out), Ok(3));
        assert_eq!(&out[..3], &[0x11, 0x00, 0x00]);
    }

    #[test]
    fn lone_literal_uses_first_byte_encoding() {
        let mut out = [0u8; 8];
        assert_eq!(compress_to_slice(b"Z", &mut out), Ok(5));
        assert_eq!(&out[..5], &[18, b'Z', 0x11, 0x00, 0x00]);
    }

    #[test]
    fn match_classes() {
        // M1 two-byte, distance 5.
        assert_eq!(encode_match(2, 5, 1), [0x00, 0x01]);
        // M2 length 4, distance 9.
        assert_eq!(encode_match(4, 9, 0), [3 << 5, 0x01]);
        // M1 three-byte after a long literal run, distance 2049.
        assert_eq!(encode_match(3, 2049, 4), [0x00, 0x00]);
        // M3 length 20, distance 3000.
        assert_eq!(
            encode_match(20, 3000, 0),
            [0x20 | 18, (2999u16 << 2) as u8, (2999 >> 6) as u8]
        );
        // M3 length 40: zero-byte extension of 7.
        assert_eq!(encode_match(40, 100, 0), [0x20, 7, (99u16 << 2) as u8, 0x01]);
        // M4 length 5, distance 0x4001.
        assert_eq!(encode_match(5, 0x4001, 0), [0x10 | 3, 0x04, 0x00]);
        // M4 with the high distance bit.
        assert_eq!(encode_match(3, 0x8000, 0), [0x18 | 1, 0x00, 0x00]);
    }

    #[test]
    fn short_trailing_run_rides_in_previous_match() {
        let mut buf = [0u8; 16];
        let mut out = Output::new(&mut buf);
        encode_literal_run(&mut out, b"abcd").unwrap();
        encode_lookback_match(&mut out, 4, 4, 4).unwrap();
        encode_literal_run(&mut out, b"xy").unwrap();
        let n = out.pos;
        assert_eq!(
            &buf[..n],
            &[21, b'a', b'b', b'c', b'd', (3 << 5) | (3 << 2) | 2, 0x00, b'x', b'y']
        );
    }

    #[test]
    fn long_literal_run_extension() {
        let mut buf = [0u8; 64];
        let mut out = Output::new(&mut buf);
        out.put_slice(&[0xFF; 3]);
        let lits = [7u8; 20];
        encode_literal_run(&mut out, &lits).unwrap();
        // 0, then 20 - 18 = 2.
        assert_eq!(&buf[3..5], &[0x00, 0x02]);
    }

    #[test]
    fn better_match_prefers_m2_offset() {
        let mut best_off = [0usize; MAX_MATCH_BY_LENGTH];
        best_off[4] = 100;
        let (mut len, mut off) = (5, 5000);
        find_better_match(&best_off, &mut len, &mut off);
        assert_eq!((len, off), (4, 100));
    }

    #[test]
    fn better_match_prefers_m3_for_far_matches() {
        let mut best_off = [0usize; MAX_MATCH_BY_LENGTH];
        best_off[19] = 9000;
        let (mut len, mut off) = (20, 40000);
        find_better_match(&best_off, &mut len, &mut off);
        assert_eq!((len, off), (19, 9000));
    }

    #[test]
    fn better_match_ignores_unfit_offsets() {
        let mut best_off = [0usize; MAX_MATCH_BY_LENGTH];
        best_off[19] = 20000;
        let (mut len, mut off) = (20, 40000);
        find_better_match(&best_off, &mut len, &mut off);
        assert_eq!((len, off), (20, 40000));
    }

    #[test]
    fn acceptance_policy() {
        assert!(!worth_encoding(1, 0, 3, false));
        assert!(!worth_encoding(3, 10, 0, true));
        assert!(!worth_encoding(2, 10, 2, true));
        assert!(!worth_encoding(2, 2000, 2, false));
        assert!(!worth_encoding(2, 10, 4, false));
        assert!(worth_encoding(2, 10, 2, false));
        assert!(!worth_encoding(3, 4000, 5, false));
        assert!(worth_encoding(3, 4000, 0, false));
        assert!(worth_encoding(3, 10, 1, true));
    }

    #[test]
    fn small_output_reports_overrun() {
        let input = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let mut out = [0u8; 4];
        assert_eq!(
            compress_to_slice(&input, &mut out),
            Err(LzoError::OutputOverrun { written: 1 })
        );
    }

    #[test]
    fn vec_compress_appends() {
        let mut out = alloc::vec![0xAA];
        compress(b"hello hello hello hello", &mut out).unwrap();
        assert_eq!(out[0], 0xAA);
        assert_eq!(&out[out.len() - 3..], &END_MARKER);
    }
}
