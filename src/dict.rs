//! Hash-chain dictionary and match finder used by the encoder.
//!
//! Every ring position is indexed twice: by its exact 2-byte prefix in
//! [`Match2`] (most recent position only) and by a 14-bit hash of its 3-byte
//! prefix in [`Match3`] (a newest-first chain). Chains are index links into
//! fixed arrays; a chain's live length is tracked per bucket, so evicting the
//! oldest position is a counter decrement and the walk never reaches a slot
//! that has been recycled.

use alloc::vec;
use alloc::vec::Vec;

use crate::opcode::MAX_MATCH_BY_LENGTH;
use crate::window::{DICT_BUF_SIZE, DICT_MAX_MATCH_LEN, Ring, Window};

/// Number of Match3 hash buckets (14-bit key).
const HASH_SIZE: usize = 0x4000;

/// Match2 keys are the raw 16-bit prefix.
const MATCH2_SIZE: usize = 1 << 16;

/// Marker for an empty head or chain link.
const NO_POS: u16 = u16::MAX;

/// Recorded as the best length of positions that must not cut a walk short.
const UNBOUNDED_LEN: u16 = (DICT_MAX_MATCH_LEN + 1) as u16;

/// Per-length table of the nearest offset producing exactly that match
/// length. Zero means no candidate of that length was seen.
pub(crate) type BestOffsets = [usize; MAX_MATCH_BY_LENGTH];

/// Longest match found for the byte at `src_pos`.
///
/// `len` is 1 and `off` is 0 when no match of length 2 or more exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Candidate {
    pub(crate) len: usize,
    pub(crate) off: usize,
    pub(crate) src_pos: usize,
}

/// Chains of positions sharing a 3-byte hash.
struct Match3 {
    /// key -> newest position
    head: Vec<u16>,
    /// key -> live chain length
    chain_sz: Vec<u16>,
    /// position -> next older position with the same key
    chain: Vec<u16>,
    /// position -> longest match found when it was inserted
    best_len: Vec<u16>,
}

impl Match3 {
    fn new() -> Self {
        Self {
            head: vec![NO_POS; HASH_SIZE],
            chain_sz: vec![0; HASH_SIZE],
            chain: vec![NO_POS; DICT_BUF_SIZE],
            best_len: vec![0; DICT_BUF_SIZE],
        }
    }

    #[inline]
    fn key(ring: &Ring, pos: usize) -> usize {
        let b0 = u32::from(ring.at(pos));
        let b1 = u32::from(ring.at(pos + 1));
        let b2 = u32::from(ring.at(pos + 2));
        let mixed = ((b0 << 5 ^ b1) << 5) ^ b2;
        ((0x9F5F_u32.wrapping_mul(mixed) >> 5) & 0x3FFF) as usize
    }

    fn reset(&mut self) {
        self.chain_sz.fill(0);
    }

    #[inline]
    fn get_head(&self, key: usize) -> u16 {
        if self.chain_sz[key] == 0 {
            NO_POS
        } else {
            self.head[key]
        }
    }

    /// Drops the oldest entry of `pos`'s chain, which is always `pos` itself.
    fn remove(&mut self, ring: &Ring, pos: usize) {
        let key = Self::key(ring, pos);
        self.chain_sz[key] = self.chain_sz[key].wrapping_sub(1);
    }

    /// Links `pos` at the head of its chain and returns the previous head
    /// together with how many chain entries are worth walking.
    fn insert(&mut self, ring: &Ring, pos: usize) -> (u16, usize) {
        let key = Self::key(ring, pos);
        let prev = self.get_head(key);
        self.chain[pos] = prev;
        let count = usize::from(self.chain_sz[key]).min(DICT_MAX_MATCH_LEN);
        self.chain_sz[key] = self.chain_sz[key].wrapping_add(1);
        self.head[key] = pos as u16;
        (prev, count)
    }

    /// Links a position covered by an emitted match. It is never searched
    /// from, so its best length must not prune later walks.
    fn insert_skipped(&mut self, ring: &Ring, pos: usize) {
        self.insert(ring, pos);
        self.best_len[pos] = UNBOUNDED_LEN;
    }
}

/// Most recent position of every 2-byte prefix.
struct Match2 {
    head: Vec<u16>,
}

impl Match2 {
    fn new() -> Self {
        Self {
            head: vec![NO_POS; MATCH2_SIZE],
        }
    }

    #[inline]
    fn key(ring: &Ring, pos: usize) -> usize {
        usize::from(ring.at(pos)) | usize::from(ring.at(pos + 1)) << 8
    }

    fn reset(&mut self) {
        self.head.fill(NO_POS);
    }

    fn add(&mut self, ring: &Ring, pos: usize) {
        self.head[Self::key(ring, pos)] = pos as u16;
    }

    fn remove(&mut self, ring: &Ring, pos: usize) {
        let slot = &mut self.head[Self::key(ring, pos)];
        if usize::from(*slot) == pos {
            *slot = NO_POS;
        }
    }

    fn search(&self, ring: &Ring, pos: usize) -> Option<usize> {
        match self.head[Self::key(ring, pos)] {
            NO_POS => None,
            found => Some(usize::from(found)),
        }
    }
}

/// Reusable encoder working memory: the ring buffer and both match indexes.
///
/// Allocating a `Dict` once and passing it to
/// [`compress_with_dict`](crate::compress::compress_with_dict) avoids
/// reallocating roughly 400KB of tables per call. Its contents are reset at
/// the start of every call.
pub struct Dict {
    match3: Match3,
    match2: Match2,
    ring: Ring,
}

impl Default for Dict {
    fn default() -> Self {
        Self::new()
    }
}

impl Dict {
    #[must_use]
    pub fn new() -> Self {
        Self {
            match3: Match3::new(),
            match2: Match2::new(),
            ring: Ring::new(),
        }
    }

    /// Clears all indexes and loads the start of `src` into the ring.
    pub(crate) fn reset<'a>(&mut self, src: &'a [u8]) -> Window<'a> {
        self.match3.reset();
        self.match2.reset();
        self.ring.clear();
        Window::new(src, &mut self.ring)
    }

    /// Evicts the ring slot about to be overwritten, once the ring is full.
    fn reset_next_input_entry(&mut self, win: &mut Window<'_>) {
        if win.warmup == 0 {
            self.match3.remove(&self.ring, win.end);
            self.match2.remove(&self.ring, win.end);
        } else {
            win.warmup -= 1;
        }
    }

    /// Skips `skip` bytes already covered by an emitted match, then finds
    /// the longest match for the next byte and steps past it.
    ///
    /// Returns `None` once the input is exhausted. `best_off` is refreshed
    /// whenever a search runs.
    pub(crate) fn advance(
        &mut self,
        win: &mut Window<'_>,
        skip: usize,
        best_off: &mut BestOffsets,
    ) -> Option<Candidate> {
        for _ in 0..skip {
            self.reset_next_input_entry(win);
            self.match3.insert_skipped(&self.ring, win.begin);
            self.match2.add(&self.ring, win.begin);
            win.get_byte(&mut self.ring);
        }

        let mut lb_len = 1;
        let mut lb_off = 0;
        let exhausted = win.size == 0;
        let src_pos = win.src_pos();

        let (mut match_pos, match_count) = self.match3.insert(&self.ring, win.begin);

        if lb_len >= win.size {
            self.match3.best_len[win.begin] = UNBOUNDED_LEN;
        } else {
            let mut lb_pos = 0;
            let mut best_pos = [0usize; MAX_MATCH_BY_LENGTH];

            if let Some(pos) = self.match2.search(&self.ring, win.begin) {
                best_pos[2] = pos + 1;
                lb_len = 2;
                lb_pos = pos;

                if win.size >= 3 {
                    for _ in 0..match_count {
                        if match_pos == NO_POS {
                            break;
                        }
                        let candidate = usize::from(match_pos);
                        let match_len =
                            self.ring.common_prefix_len(win.begin, candidate, win.size);

                        if match_len >= 2 {
                            if match_len < MAX_MATCH_BY_LENGTH && best_pos[match_len] == 0 {
                                best_pos[match_len] = candidate + 1;
                            }
                            if match_len > lb_len {
                                lb_len = match_len;
                                lb_pos = candidate;
                                if match_len == win.size
                                    || match_len > usize::from(self.match3.best_len[candidate])
                                {
                                    break;
                                }
                            }
                        }
                        match_pos = self.match3.chain[candidate];
                    }
                }
            }

            if lb_len > 1 {
                lb_off = win.pos2off(lb_pos);
            }
            self.match3.best_len[win.begin] = lb_len as u16;
            for (off, &pos) in best_off.iter_mut().zip(best_pos.iter()).skip(2) {
                *off = if pos > 0 { win.pos2off(pos - 1) } else { 0 };
            }
        }

        self.reset_next_input_entry(win);
        self.match2.add(&self.ring, win.begin);
        win.get_byte(&mut self.ring);

        if exhausted {
            return None;
        }
        Some(Candidate {
            len: lb_len,
            off: lb_off,
            src_pos,
        })
    }
}
