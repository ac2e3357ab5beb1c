//! Compression algorithms and their raw byte-level compress/decompress
//! functions (spec.md §4.2: `{NONE, GZIP, DEFLATE, BROTLI, LZ4, ZSTD}`).

use std::io::{Read, Write};

/// One compression algorithm. `Brotli` is only ever selected when the
/// `brotli` feature is enabled; callers compiled without it never see it
/// chosen by `compress_adaptive` (spec.md §4.2: "skip if host runtime lacks
/// it; fall back to GZIP").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    None,
    Gzip,
    Deflate,
    Brotli,
    Lz4,
    Zstd,
}

impl Algorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            Algorithm::None => "none",
            Algorithm::Gzip => "gzip",
            Algorithm::Deflate => "deflate",
            Algorithm::Brotli => "brotli",
            Algorithm::Lz4 => "lz4",
            Algorithm::Zstd => "zstd",
        }
    }

    /// `true` if this binary can actually run this algorithm.
    pub fn is_available(self) -> bool {
        match self {
            Algorithm::Brotli => cfg!(feature = "brotli"),
            _ => true,
        }
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compresses `data` with `algorithm`. `Algorithm::None` returns a clone of
/// the input (spec.md §4.2: "When algorithm = NONE, return input unchanged").
pub fn compress_bytes(data: &[u8], algorithm: Algorithm) -> std::io::Result<Vec<u8>> {
    match algorithm {
        Algorithm::None => Ok(data.to_vec()),
        Algorithm::Gzip => {
            let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(data)?;
            encoder.finish()
        }
        Algorithm::Deflate => {
            let mut encoder =
                flate2::write::DeflateEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(data)?;
            encoder.finish()
        }
        Algorithm::Brotli => compress_brotli(data),
        Algorithm::Lz4 => Ok(lz4_flex::compress_prepend_size(data)),
        Algorithm::Zstd => zstd::stream::encode_all(data, 0),
    }
}

/// Decompresses `data`, previously produced by [`compress_bytes`] with the
/// same `algorithm`.
pub fn decompress_bytes(data: &[u8], algorithm: Algorithm) -> std::io::Result<Vec<u8>> {
    match algorithm {
        Algorithm::None => Ok(data.to_vec()),
        Algorithm::Gzip => {
            let mut decoder = flate2::read::GzDecoder::new(data);
            let mut out = Vec::new();
            decoder.read_to_end(&mut out)?;
            Ok(out)
        }
        Algorithm::Deflate => {
            let mut decoder = flate2::read::DeflateDecoder::new(data);
            let mut out = Vec::new();
            decoder.read_to_end(&mut out)?;
            Ok(out)
        }
        Algorithm::Brotli => decompress_brotli(data),
        Algorithm::Lz4 => lz4_flex::decompress_size_prepended(data)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
        Algorithm::Zstd => zstd::stream::decode_all(data),
    }
}

#[cfg(feature = "brotli")]
fn compress_brotli(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    let params = brotli::enc::BrotliEncoderParams::default();
    brotli::BrotliCompress(&mut std::io::Cursor::new(data), &mut out, &params)?;
    Ok(out)
}

#[cfg(not(feature = "brotli"))]
fn compress_brotli(data: &[u8]) -> std::io::Result<Vec<u8>> {
    // Host runtime lacks brotli; the adaptive chooser never picks this path
    // without the feature, but an explicit caller request falls back to gzip.
    compress_bytes(data, Algorithm::Gzip)
}

#[cfg(feature = "brotli")]
fn decompress_brotli(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    brotli::BrotliDecompress(&mut std::io::Cursor::new(data), &mut out)?;
    Ok(out)
}

#[cfg(not(feature = "brotli"))]
fn decompress_brotli(data: &[u8]) -> std::io::Result<Vec<u8>> {
    decompress_bytes(data, Algorithm::Gzip)
}
