//! gzip transport for the payload text.
//!
//! Compression is an external library concern: the wire format is simply
//! UTF-8 payload text passed through gzip. These helpers wrap `flate2`
//! so the rest of the crate deals in strings only.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::Result;

/// Compresses payload text onto a writer.
pub fn compress_to_writer<W: Write>(payload: &str, writer: W) -> Result<()> {
    let mut encoder = GzEncoder::new(writer, Compression::default());
    encoder.write_all(payload.as_bytes())?;
    let mut inner = encoder.finish()?;
    inner.flush()?;
    Ok(())
}

/// Compresses payload text into an in-memory buffer.
pub fn compress_to_vec(payload: &str) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(payload.len() / 4);
    compress_to_writer(payload, &mut out)?;
    Ok(out)
}

/// Decompresses a gzip stream into payload text.
///
/// The payload must be valid UTF-8; anything else is an I/O error from the
/// underlying decoder.
pub fn decompress_from_reader<R: Read>(reader: R) -> Result<String> {
    let mut decoder = GzDecoder::new(reader);
    let mut text = String::new();
    decoder.read_to_string(&mut text)?;
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_round_trips_through_gzip() {
        let payload = "<g><k>1.2.0</k></g>";
        let compressed = compress_to_vec(payload).expect("compress");
        assert_ne!(compressed.as_slice(), payload.as_bytes());
        let back = decompress_from_reader(compressed.as_slice()).expect("decompress");
        assert_eq!(back, payload);
    }

    #[test]
    fn garbage_input_is_an_io_error() {
        let err = decompress_from_reader(&b"not gzip at all"[..]).expect_err("garbage");
        assert!(matches!(err, crate::ModexError::Io(_)));
    }
}
