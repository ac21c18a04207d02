//! `0x01`-prefixed zlib blobs.
//!
//! Rich message content (JSON and XML cards) is carried as bytes: a single `0x01`
//! marker followed by a zlib stream. Inside templates these bytes travel as `hex->`
//! strings.

use std::io::{Read, Write};

use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression};

use crate::{Error, Result};

/// Marker byte in front of the zlib stream.
pub const ZLIB_MARKER: u8 = 0x01;

/// Compress `data` into a marked zlib blob.
///
/// # Errors
/// Returns [`Error::FileError`] if the encoder fails.
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(vec![ZLIB_MARKER], Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Inflate a marked zlib blob.
///
/// # Errors
/// Returns [`Error::Decompress`] if the marker is missing or the stream is damaged.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let Some((&ZLIB_MARKER, stream)) = data.split_first() else {
        return Err(Error::Decompress("missing 0x01 marker".to_string()));
    };

    let mut decoder = ZlibDecoder::new(stream);
    let mut inflated = Vec::new();
    decoder
        .read_to_end(&mut inflated)
        .map_err(|e| Error::Decompress(e.to_string()))?;

    Ok(inflated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_and_zlib_header() {
        let blob = compress("聊天记录".as_bytes()).unwrap();
        assert_eq!(blob[0], ZLIB_MARKER);
        // zlib CMF byte for deflate with a 32K window
        assert_eq!(blob[1], 0x78);
        assert_eq!(decompress(&blob).unwrap(), "聊天记录".as_bytes());
    }

    #[test]
    fn rejects_unmarked_and_damaged() {
        assert!(matches!(decompress(&[]), Err(Error::Decompress(_))));
        assert!(matches!(decompress(&[0x78, 0x9c]), Err(Error::Decompress(_))));
        assert!(matches!(
            decompress(&[ZLIB_MARKER, 0x78, 0x9c, 0xff]),
            Err(Error::Decompress(_))
        ));
    }
}
