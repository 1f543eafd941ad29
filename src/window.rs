use alloc::vec;
use alloc::vec::Vec;

/// Largest lookback distance the encoder will emit.
pub(crate) const DICT_MAX_DIST: usize = 0xBFFF;

/// Lookahead size, and therefore the longest match the finder reports.
pub(crate) const DICT_MAX_MATCH_LEN: usize = 0x800;

/// Ring capacity: full lookback distance plus full lookahead.
pub(crate) const DICT_BUF_SIZE: usize = DICT_MAX_DIST + DICT_MAX_MATCH_LEN;

/// Fixed-size circular byte buffer addressed by ring positions.
///
/// Positions passed in may run up to one lap past the end; they wrap back to
/// the start, so comparisons never need a linearized copy of the head.
pub(crate) struct Ring {
    buf: Vec<u8>,
}

impl Ring {
    pub(crate) fn new() -> Self {
        Self {
            buf: vec![0; DICT_BUF_SIZE],
        }
    }

    pub(crate) fn clear(&mut self) {
        self.buf.fill(0);
    }

    #[inline]
    pub(crate) const fn wrap(pos: usize) -> usize {
        if pos >= DICT_BUF_SIZE {
            pos - DICT_BUF_SIZE
        } else {
            pos
        }
    }

    #[inline]
    pub(crate) fn at(&self, pos: usize) -> u8 {
        self.buf[Self::wrap(pos)]
    }

    #[inline]
    fn set(&mut self, pos: usize, byte: u8) {
        self.buf[pos] = byte;
    }

    /// Length of the common run starting at positions `a` and `b`, up to `limit`.
    pub(crate) fn common_prefix_len(&self, a: usize, b: usize, limit: usize) -> usize {
        let mut len = 0;
        while len < limit && self.at(a + len) == self.at(b + len) {
            len += 1;
        }
        len
    }
}

/// Sliding view of the input over a [`Ring`].
///
/// `begin` is the ring position of the byte currently being matched; the
/// `size` bytes starting there are the lookahead. `end` is where the next
/// input byte lands.
pub(crate) struct Window<'a> {
    src: &'a [u8],
    inp: usize,
    pub(crate) size: usize,
    pub(crate) begin: usize,
    pub(crate) end: usize,
    /// Steps left before the ring is full and every step evicts a position.
    pub(crate) warmup: usize,
}

impl<'a> Window<'a> {
    /// Loads the first lookahead's worth of `src` into a cleared ring.
    pub(crate) fn new(src: &'a [u8], ring: &mut Ring) -> Self {
        let size = src.len().min(DICT_MAX_MATCH_LEN);
        ring.buf[..size].copy_from_slice(&src[..size]);

        Self {
            src,
            inp: size,
            size,
            begin: 0,
            end: size,
            warmup: DICT_MAX_DIST,
        }
    }

    /// Index into `src` of the byte at `begin`.
    #[inline]
    pub(crate) const fn src_pos(&self) -> usize {
        self.inp - self.size
    }

    /// Pulls the next input byte into the ring and slides both ends forward.
    /// Past the end of input the lookahead shrinks and zeroes are stored.
    pub(crate) fn get_byte(&mut self, ring: &mut Ring) {
        if self.inp >= self.src.len() {
            self.size = self.size.saturating_sub(1);
            ring.set(self.end, 0);
        } else {
            ring.set(self.end, self.src[self.inp]);
            self.inp += 1;
        }
        self.end = Ring::wrap(self.end + 1);
        self.begin = Ring::wrap(self.begin + 1);
    }

    /// Backward distance from `begin` to ring position `pos`.
    #[inline]
    pub(crate) const fn pos2off(&self, pos: usize) -> usize {
        if self.begin > pos {
            self.begin - pos
        } else {
            DICT_BUF_SIZE - (pos - self.begin)
        }
    }
}
