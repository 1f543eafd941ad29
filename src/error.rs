use thiserror::Error;

/// Failure modes shared by the encoder and the decoder.
///
/// Every variant records how many output bytes were produced before the
/// codec stopped, so callers can inspect or keep the partial output.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LzoError {
    /// An instruction needs more input bytes than remain.
    #[error("Input overrun after {written} output bytes")]
    InputOverrun { written: usize },

    /// The output buffer is exhausted before the instruction completed.
    #[error("Output overrun after {written} output bytes")]
    OutputOverrun { written: usize },

    /// A back-reference points before the start of the output.
    #[error("Lookbehind overrun after {written} output bytes")]
    LookbehindOverrun { written: usize },

    /// Length arithmetic overflowed, or the end marker was invalid.
    #[error("Malformed stream after {written} output bytes")]
    Malformed { written: usize },

    /// The stream decoded cleanly but trailing input bytes were left unread.
    #[error("Input not consumed, {written} bytes decoded")]
    InputNotConsumed { written: usize },
}

impl LzoError {
    /// Number of output bytes produced before the error was raised.
    #[must_use]
    pub const fn written(&self) -> usize {
        match *self {
            Self::InputOverrun { written }
            | Self::OutputOverrun { written }
            | Self::LookbehindOverrun { written }
            | Self::Malformed { written }
            | Self::InputNotConsumed { written } => written,
        }
    }
}
