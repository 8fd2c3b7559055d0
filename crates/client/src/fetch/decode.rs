//! Transfer decoding for direct fetches.

use std::io::Read;

use bytes::Bytes;
use flate2::read::GzDecoder;

/// Error decoding a response body.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("corrupt gzip body: {0}")]
    Gzip(#[from] std::io::Error),
}

/// Whether a Content-Encoding value denotes gzip.
pub fn is_gzip(content_encoding: &str) -> bool {
    let encoding = content_encoding.trim();
    encoding.eq_ignore_ascii_case("gzip") || encoding.eq_ignore_ascii_case("x-gzip")
}

/// Decode a response body according to its Content-Encoding.
///
/// Only gzip is decoded; any other encoding is returned untouched.
pub fn decode_body(body: Bytes, content_encoding: Option<&str>) -> Result<Bytes, DecodeError> {
    match content_encoding {
        Some(encoding) if is_gzip(encoding) => {
            let mut decoder = GzDecoder::new(body.as_ref());
            let mut decoded = Vec::with_capacity(body.len() * 2);
            decoder.read_to_end(&mut decoded)?;
            Ok(Bytes::from(decoded))
        }
        _ => Ok(body),
    }
}
