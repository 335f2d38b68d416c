//! Pure codec: raw bytes <-> gzip-compressed bytes.

use std::io::prelude::*;

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("malformed gzip stream")]
pub struct DecompressError(#[from] std::io::Error);

/// Compresses `bytes` into a gzip member at the given level (1-9).
///
/// Levels outside 1..=9 are clamped rather than rejected; the caller-facing
/// contract only promises a valid level produces a valid stream.
pub fn compress(bytes: &[u8], level: u32) -> Vec<u8> {
    let level = level.clamp(1, 9);
    let mut encoder = GzEncoder::new(Vec::new(), Compression::new(level));
    // Writing to a Vec<u8> can't fail.
    encoder.write_all(bytes).expect("in-memory write failed");
    encoder.finish().expect("in-memory gzip finish failed")
}

/// Decompresses a single gzip member.
pub fn decompress(bytes: &[u8]) -> Result<Vec<u8>, DecompressError> {
    let mut decoder = GzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn roundtrip() {
        let data = b"the quick brown fox jumps over the lazy dog".repeat(64);
        for level in 1..=9 {
            let compressed = compress(&data, level);
            let decompressed = decompress(&compressed).unwrap();
            assert_eq!(decompressed, data);
        }
    }

    #[test]
    fn empty_roundtrip() {
        let compressed = compress(&[], 6);
        assert_eq!(decompress(&compressed).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn garbage_fails_to_decompress() {
        assert!(decompress(b"not a gzip stream").is_err());
    }

    #[test]
    fn higher_levels_dont_grow_compressible_data() {
        let data = vec![0u8; 16 * 1024];
        let low = compress(&data, 1);
        let high = compress(&data, 9);
        assert!(high.len() <= low.len() + 16);
    }
}
