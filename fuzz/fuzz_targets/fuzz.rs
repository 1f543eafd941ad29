#![no_main]

use libfuzzer_sys::fuzz_target;
use lzo1x::{LzoError, compress, compress_worst_size, decompress, decompress_to_slice};

/// Output capacity for decoding untrusted input.
const UNTRUSTED_CAPACITY: usize = 1 << 20;

/// Arbitrary bytes must decode to `Ok` or a typed error, never a panic, and
/// the reported count must stay within the output buffer.
fn verify_decompression_robustness(data: &[u8], output: &mut [u8]) {
    let written = match decompress_to_slice(data, output) {
        Ok(written) => written,
        Err(err) => err.written(),
    };
    assert!(written <= output.len());
}

/// `decompress(compress(data)) == data`, within the worst-case size bound.
fn verify_round_trip(data: &[u8]) {
    let mut compressed = Vec::new();
    if let Err(e) = compress(data, &mut compressed) {
        panic!("Compressor failed on {} bytes: {e:?}", data.len());
    }
    assert!(
        compressed.len() <= compress_worst_size(data.len()),
        "Compressed {} bytes to {}, over the worst-case bound",
        data.len(),
        compressed.len()
    );

    let mut decompressed = Vec::new();
    match decompress(&compressed, data.len(), &mut decompressed) {
        Ok(()) => {
            if decompressed != data {
                panic!(
                    "Round-trip mismatch!\nInput len: {}\nCompressed len: {}\nDecompressed len: {}",
                    data.len(),
                    compressed.len(),
                    decompressed.len()
                );
            }
        }
        Err(e) => {
            panic!(
                "Round-trip failed! Decompressor rejected valid compressed data.\nError: {e:?}\nInput len: {}",
                data.len()
            );
        }
    }

    // Dropping the last byte always leaves the end marker incomplete.
    let truncated = &compressed[..compressed.len() - 1];
    let mut scratch = vec![0u8; data.len()];
    assert!(matches!(
        decompress_to_slice(truncated, &mut scratch),
        Err(LzoError::InputOverrun { .. })
    ));
}

fuzz_target!(|data: &[u8]| {
    let mut output = vec![0u8; UNTRUSTED_CAPACITY];
    verify_decompression_robustness(data, &mut output);

    verify_round_trip(data);
});
