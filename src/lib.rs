//! # LZO1X Compression
//!
//! `lzo1x` is a safe, pure-Rust implementation of the LZO1X compression format.
//! Streams are byte-compatible with other LZO1X encoders and decoders, so it can
//! read existing compressed assets as well as produce new ones.
//!
//! The format carries no size header: callers store the uncompressed length next
//! to the payload and hand it back to the decoder.
//!
//! ## Example
//!
//! ```rust
//! extern crate alloc;
//! use lzo1x::{compress, decompress};
//! use alloc::vec::Vec;
//!
//! let original = b"Hello world, hello world, hello world!";
//!
//! let mut compressed = Vec::new();
//! compress(original, &mut compressed).expect("Compression failed");
//!
//! let mut buffer = Vec::new();
//! decompress(&compressed, original.len(), &mut buffer).expect("Decompression failed");
//! assert_eq!(buffer, original);
//! ```

#![no_std]
#![forbid(unsafe_code)]

extern crate alloc;

pub mod compress;
pub mod decompress;
pub mod error;

mod dict;
mod opcode;
mod window;

pub use compress::{compress, compress_to_slice, compress_with_dict, compress_worst_size};
pub use decompress::{decompress, decompress_to_slice};
pub use dict::Dict;
pub use error::LzoError;

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::{Dict, LzoError, compress, compress_with_dict, compress_worst_size, decompress};

    #[test]
    fn test_round_trip() {
        let original = b"Hello world repeated Hello world repeated Hello world repeated";
        let mut compressed = Vec::new();
        let mut decompressed = Vec::new();

        compress(original, &mut compressed).unwrap();
        decompress(&compressed, original.len(), &mut decompressed).unwrap();

        assert_eq!(original.to_vec(), decompressed);
    }

    #[test]
    fn test_compress_rle() {
        let original = alloc::vec![b'A'; 100];
        let mut compressed = Vec::new();
        compress(&original, &mut compressed).unwrap();

        // One literal, one long distance-1 match, end marker.
        assert!(compressed.len() < 10);

        let mut decompressed = Vec::new();
        decompress(&compressed, original.len(), &mut decompressed).unwrap();
        assert_eq!(original, decompressed);
    }

    #[test]
    fn test_incompressible() {
        // No repeated pairs: a single first-byte literal run plus end marker.
        let original: Vec<u8> = (0..200).map(|i| (i * 7) as u8).collect();
        let mut compressed = Vec::new();
        compress(&original, &mut compressed).unwrap();

        assert_eq!(compressed.len(), 1 + 200 + 3);
        assert!(compressed.len() <= compress_worst_size(original.len()));

        let mut decompressed = Vec::new();
        decompress(&compressed, original.len(), &mut decompressed).unwrap();
        assert_eq!(original, decompressed);
    }

    #[test]
    fn test_reused_dict_is_deterministic() {
        let first: Vec<u8> = (0..5000u32).map(|i| (i % 97) as u8).collect();
        let second = b"abcabcabcabcabcabc";
        let mut dict = Dict::new();

        let mut out_a = alloc::vec![0; compress_worst_size(second.len())];
        let mut out_b = out_a.clone();
        let mut scratch = alloc::vec![0; compress_worst_size(first.len())];

        let n_a = compress_with_dict(second, &mut out_a, &mut dict).unwrap();
        compress_with_dict(&first, &mut scratch, &mut dict).unwrap();
        let n_b = compress_with_dict(second, &mut out_b, &mut dict).unwrap();

        assert_eq!(out_a[..n_a], out_b[..n_b]);
    }

    #[test]
    fn test_error_reports_written() {
        let err = LzoError::InputNotConsumed { written: 42 };
        assert_eq!(err.written(), 42);
    }
}
