//! Payload length validation and start-code resynchronization.

use crate::bitreader::{BitReader, ByteSource};
use crate::constants::RESYNC_CHUNK;
use crate::error::Result;
use crate::ps::packet::is_known_start_code;

/// Whether a payload of `len` bytes starting at `from` ends on a packet
/// boundary: either a known start code or the exact end of the source.
pub fn payload_fits<S: ByteSource>(reader: &BitReader<S>, from: u64, len: u64) -> Result<bool> {
    let Some(end) = from.checked_add(len) else {
        return Ok(false);
    };
    let size = reader.size();
    if end == size {
        return Ok(true);
    }
    if end > size || size - end < 4 {
        return Ok(false);
    }
    let mut code = [0u8; 4];
    if reader.read_at(&mut code, end)? < 4 {
        return Ok(false);
    }
    Ok(is_known_start_code(u32::from_be_bytes(code)))
}

/// Position of the first known start code at or after `from`, or the
/// source size when there is none. The sequential cursor is not touched.
pub fn find_next_start_code<S: ByteSource>(reader: &BitReader<S>, from: u64) -> Result<u64> {
    let size = reader.size();
    let mut buf = vec![0u8; RESYNC_CHUNK];
    let mut pos = from;
    while pos < size {
        let n = reader.read_at(&mut buf, pos)?;
        if n < 4 {
            break;
        }
        if let Some(i) = buf[..n]
            .windows(4)
            .position(|w| is_known_start_code(u32::from_be_bytes([w[0], w[1], w[2], w[3]])))
        {
            return Ok(pos + i as u64);
        }
        // keep the last three bytes, a code may straddle chunks
        pos += (n - 3) as u64;
    }
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream() -> Vec<u8> {
        let mut data = vec![0x11; 10];
        data.extend([0x00, 0x00, 0x01, 0xC0, 0x22]);
        data
    }

    #[test]
    fn lookahead_accepts_start_code_or_eof() {
        let data = stream();
        let br = BitReader::new(&data[..]);
        assert!(payload_fits(&br, 2, 8).unwrap());
        assert!(payload_fits(&br, 2, 13).unwrap());
        assert!(!payload_fits(&br, 2, 7).unwrap());
        assert!(!payload_fits(&br, 2, 14).unwrap());
        assert!(!payload_fits(&br, 2, u64::MAX).unwrap());
    }

    #[test]
    fn scan_finds_next_code() {
        let data = stream();
        let br = BitReader::new(&data[..]);
        assert_eq!(find_next_start_code(&br, 0).unwrap(), 10);
        assert_eq!(find_next_start_code(&br, 10).unwrap(), 10);
        assert_eq!(find_next_start_code(&br, 11).unwrap(), data.len() as u64);
    }

    #[test]
    fn scan_sees_codes_across_chunks() {
        let mut data = vec![0x11; RESYNC_CHUNK - 2];
        data.extend([0x00, 0x00, 0x01, 0xBA]);
        data.extend([0x11; 8]);
        let br = BitReader::new(&data[..]);
        assert_eq!(find_next_start_code(&br, 0).unwrap(), (RESYNC_CHUNK - 2) as u64);
    }
}
