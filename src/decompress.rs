use crate::error::LzoError;
use crate::opcode::{
    FIRST_LITERAL_BIAS, M2_MASK, M3_MARKER, M3_MAX_LEN, M4_DISTANCE_BIAS, M4_MARKER, M4_MAX_LEN,
    MAX_255_COUNT, M2_MAX_OFFSET,
};
use alloc::vec::Vec;
use tracing::{debug, trace};

type Result<T> = core::result::Result<T, LzoError>;

// --- Constants ---

/// Shortest stream that can hold the end marker.
const MIN_STREAM_LEN: usize = 3;

/// First bytes at or above this value open a literal run of 5..=238 bytes.
const FIRST_LONG_LITERAL: u8 = 22;

/// First bytes at or above this value (and below `FIRST_LONG_LITERAL`) carry
/// 1..=4 literals.
const FIRST_SHORT_LITERAL: u8 = 18;

/// Base length of an M1 long literal run (`0 0 0 0 L L L L`).
const M1_LITERAL_BASE: usize = 3;

/// Base length of an M1 long literal run once `L` is zero and the length
/// continues in zero-byte extension.
const M1_LITERAL_EXTENDED_BASE: usize = 18;

/// Distance bias of the 3-byte M1 match that follows a long literal run.
const M1_LONG_DISTANCE_BIAS: usize = M2_MAX_OFFSET + 1;

/// Number of literals the previous instruction copied. Decides what an M1
/// opcode (`0x00..=0x0F`) means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LiteralState {
    /// No literals: M1 opens a long literal run.
    None,
    /// 1..=3 literals: M1 copies 2 bytes from within 1KB.
    Short,
    /// 4 or more literals: M1 copies 3 bytes from 2..3KB.
    Long,
}

impl LiteralState {
    const fn from_count(count: usize) -> Self {
        match count {
            0 => Self::None,
            1..=3 => Self::Short,
            _ => Self::Long,
        }
    }
}

/// Bounds-checked cursor pair over the compressed input and the output.
struct Decoder<'a, 'b> {
    input: &'a [u8],
    in_pos: usize,
    output: &'b mut [u8],
    out_pos: usize,
}

impl<'a, 'b> Decoder<'a, 'b> {
    const fn new(input: &'a [u8], output: &'b mut [u8]) -> Self {
        Self {
            input,
            in_pos: 0,
            output,
            out_pos: 0,
        }
    }

    #[inline]
    const fn needs_in(&self, count: usize) -> Result<()> {
        if count > self.input.len() - self.in_pos {
            return Err(LzoError::InputOverrun {
                written: self.out_pos,
            });
        }
        Ok(())
    }

    #[inline]
    const fn needs_out(&self, count: usize) -> Result<()> {
        if count > self.output.len() - self.out_pos {
            return Err(LzoError::OutputOverrun {
                written: self.out_pos,
            });
        }
        Ok(())
    }

    #[inline]
    fn byte(&mut self) -> Result<u8> {
        self.needs_in(1)?;
        let b = self.input[self.in_pos];
        self.in_pos += 1;
        Ok(b)
    }

    /// Reads the little-endian distance/state word of an M3 or M4 instruction.
    #[inline]
    fn le16(&mut self) -> Result<usize> {
        self.needs_in(2)?;
        let word = u16::from_le_bytes([self.input[self.in_pos], self.input[self.in_pos + 1]]);
        self.in_pos += 2;
        Ok(word as usize)
    }

    /// Reads a zero-byte length extension: a run of zero bytes, each worth
    /// 255, closed by one non-zero byte added to `base`.
    fn zero_byte_length(&mut self, base: usize) -> Result<usize> {
        let zeros = self.input[self.in_pos..]
            .iter()
            .take_while(|&&b| b == 0)
            .count();
        if zeros > MAX_255_COUNT {
            return Err(LzoError::Malformed {
                written: self.out_pos,
            });
        }
        self.in_pos += zeros;
        let tail = self.byte()? as usize;

        zeros
            .checked_mul(255)
            .and_then(|n| n.checked_add(base))
            .and_then(|n| n.checked_add(tail))
            .ok_or(LzoError::Malformed {
                written: self.out_pos,
            })
    }

    fn copy_literals(&mut self, len: usize) -> Result<()> {
        self.needs_in(len)?;
        self.needs_out(len)?;
        self.output[self.out_pos..self.out_pos + len]
            .copy_from_slice(&self.input[self.in_pos..self.in_pos + len]);
        self.in_pos += len;
        self.out_pos += len;
        Ok(())
    }

    /// Copies `len` bytes from `distance` bytes back, then `trailing`
    /// literal bytes from the input.
    fn copy_match(&mut self, distance: usize, len: usize, trailing: usize) -> Result<()> {
        if distance > self.out_pos {
            return Err(LzoError::LookbehindOverrun {
                written: self.out_pos,
            });
        }
        self.needs_in(trailing)?;
        self.needs_out(len + trailing)?;

        let src = self.out_pos - distance;
        if distance == 1 {
            let byte = self.output[src];
            self.output[self.out_pos..self.out_pos + len].fill(byte);
        } else if distance >= len {
            self.output.copy_within(src..src + len, self.out_pos);
        } else {
            // Overlapping copy replicates the period of the source.
            for k in 0..len {
                self.output[self.out_pos + k] = self.output[src + k];
            }
        }
        self.out_pos += len;

        self.copy_literals(trailing)
    }

    /// Handles the special encoding of the first instruction byte.
    fn first_instruction(&mut self) -> Result<LiteralState> {
        let first = self.input[0];
        if first >= FIRST_LONG_LITERAL {
            self.in_pos += 1;
            self.copy_literals(first as usize - FIRST_LITERAL_BIAS)?;
            Ok(LiteralState::Long)
        } else if first >= FIRST_SHORT_LITERAL {
            self.in_pos += 1;
            let count = first as usize - FIRST_LITERAL_BIAS;
            self.copy_literals(count)?;
            Ok(LiteralState::from_count(count))
        } else {
            // 0..=17 follow the regular grammar. 16 and 17 reference an empty
            // dictionary and can only be valid as the end marker.
            Ok(LiteralState::None)
        }
    }

    /// Validates the end marker and the amount of input consumed.
    fn finish(&self, marker_len: usize) -> Result<usize> {
        if marker_len != 3 {
            return Err(LzoError::Malformed {
                written: self.out_pos,
            });
        }
        if self.in_pos < self.input.len() {
            return Err(LzoError::InputNotConsumed {
                written: self.out_pos,
            });
        }
        Ok(self.out_pos)
    }

    fn run(&mut self) -> Result<usize> {
        let mut state = self.first_instruction()?;

        loop {
            let inst = self.byte()?;

            let (distance, len, trailing) = if inst & M2_MASK != 0 {
                // 1 L L D D D S S / 0 1 L D D D S S, then H:
                // length = (inst >> 5) + 1, distance = (H << 3) + D + 1
                let high = self.byte()? as usize;
                let distance = (high << 3) + ((inst as usize >> 2) & 0x7) + 1;
                (distance, (inst as usize >> 5) + 1, inst as usize & 0x3)
            } else if inst & M3_MARKER != 0 {
                // 0 0 1 L L L L L, then LE16 D..D S S: distance = D + 1
                let mut len = (inst as usize & 0x1F) + 2;
                if len == 2 {
                    len = self.zero_byte_length(M3_MAX_LEN)?;
                }
                let word = self.le16()?;
                ((word >> 2) + 1, len, word & 0x3)
            } else if inst & M4_MARKER != 0 {
                // 0 0 0 1 H L L L, then LE16 D..D S S:
                // distance = 16384 + (H << 14) + D
                let mut len = (inst as usize & 0x7) + 2;
                if len == 2 {
                    len = self.zero_byte_length(M4_MAX_LEN)?;
                }
                let word = self.le16()?;
                let raw = ((inst as usize & 0x8) << 11) + (word >> 2);
                if raw == 0 {
                    return self.finish(len);
                }
                (raw + M4_DISTANCE_BIAS, len, word & 0x3)
            } else {
                match state {
                    LiteralState::None => {
                        let mut len = inst as usize + M1_LITERAL_BASE;
                        if len == M1_LITERAL_BASE {
                            len = self.zero_byte_length(M1_LITERAL_EXTENDED_BASE)?;
                        }
                        self.copy_literals(len)?;
                        state = LiteralState::Long;
                        continue;
                    }
                    LiteralState::Short => {
                        let high = self.byte()? as usize;
                        let distance = (inst as usize >> 2) + (high << 2) + 1;
                        (distance, 2, inst as usize & 0x3)
                    }
                    LiteralState::Long => {
                        let high = self.byte()? as usize;
                        let distance = (inst as usize >> 2) + (high << 2) + M1_LONG_DISTANCE_BIAS;
                        (distance, 3, inst as usize & 0x3)
                    }
                }
            };

            self.copy_match(distance, len, trailing)?;
            state = LiteralState::from_count(trailing);
        }
    }
}

/// Decompresses an LZO1X stream into a caller-sized buffer.
///
/// `output` must be at least as long as the original data; its length is the
/// output capacity. Returns the number of bytes written.
///
/// # Errors
/// Returns the first [`LzoError`] encountered. Each error carries the number
/// of bytes already written to `output`.
pub fn decompress_to_slice(input: &[u8], output: &mut [u8]) -> Result<usize> {
    if input.len() < MIN_STREAM_LEN {
        debug!(input_len = input.len(), "LZO1X stream shorter than end marker");
        return Err(LzoError::InputOverrun { written: 0 });
    }

    let mut decoder = Decoder::new(input, output);
    let result = decoder.run();

    match &result {
        Ok(written) => trace!(input_len = input.len(), written, "LZO1X stream decoded"),
        Err(err) => debug!(
            %err,
            input_pos = decoder.in_pos,
            input_len = input.len(),
            "LZO1X decompression failed"
        ),
    }
    result
}

/// Decompresses an LZO1X stream, appending the result to `output`.
///
/// The format has no embedded size field, so the caller passes the expected
/// decompressed length. On error `output` keeps the bytes decoded so far.
///
/// # Errors
/// See [`decompress_to_slice`].
pub fn decompress(input: &[u8], expected_len: usize, output: &mut Vec<u8>) -> Result<()> {
    let start = output.len();
    output.resize(start + expected_len, 0);

    match decompress_to_slice(input, &mut output[start..]) {
        Ok(written) => {
            output.truncate(start + written);
            Ok(())
        }
        Err(err) => {
            output.truncate(start + err.written());
            Err(err)
        }
    }
}
