//! Block-transform decoder seam
//!
//! Archive records are stored in an encoded frame format. Frame decoding
//! lives outside this crate; the resolver hands every record payload to a
//! [`BlockDecoder`] as a reader bounded to the payload length.

use crate::ArchiveError;
use std::io::Read;

/// Turns an encoded archive payload into content bytes
pub trait BlockDecoder: Send + Sync {
    /// Decode exactly `length` bytes from `input`
    fn decode(&self, input: &mut dyn Read, length: u64) -> Result<Vec<u8>, ArchiveError>;
}

/// Decoder for stores whose payloads are kept verbatim
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughDecoder;

impl BlockDecoder for PassthroughDecoder {
    fn decode(&self, input: &mut dyn Read, length: u64) -> Result<Vec<u8>, ArchiveError> {
        // Sized by the bytes actually read, never by the declared length
        let mut out = Vec::new();
        input.take(length).read_to_end(&mut out)?;
        if out.len() as u64 != length {
            return Err(ArchiveError::Decode(format!(
                "payload truncated: expected {length} bytes, got {}",
                out.len()
            )));
        }
        Ok(out)
    }
}
