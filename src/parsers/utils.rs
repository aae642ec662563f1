//! Exp-Golomb and RBSP helpers shared by the H.264 parser

use bitstream_io::{BigEndian, BitRead, BitReader};

/// Unsigned Exp-Golomb decoder
pub fn ue<R: std::io::Read>(br: &mut BitReader<R, BigEndian>) -> Option<u32> {
    let mut zeros = 0u32;
    while br.read::<1, u8>().ok()? == 0 {
        zeros += 1;
        if zeros > 31 {
            return None;
        }
    }
    let mut val = 1u64;
    for _ in 0..zeros {
        val = (val << 1) | br.read::<1, u8>().ok()? as u64;
    }
    u32::try_from(val - 1).ok()
}

/// Signed Exp-Golomb decoder
pub fn se<R: std::io::Read>(br: &mut BitReader<R, BigEndian>) -> Option<i32> {
    let k = ue(br)? as i64;
    let v = if k & 1 == 0 { -(k / 2) } else { (k + 1) / 2 };
    i32::try_from(v).ok()
}

/// Strips emulation prevention bytes (00 00 03 -> 00 00)
pub fn remove_ep(data: &[u8]) -> Vec<u8> {
    let mut v = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        if i + 2 < data.len() && data[i] == 0 && data[i + 1] == 0 && data[i + 2] == 3 {
            v.extend_from_slice(&data[i..i + 2]);
            i += 3;
        } else {
            v.push(data[i]);
            i += 1;
        }
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exp_golomb_codes() {
        // 1 | 010 | 011 | 00100 | 00101
        let data = [0b1010_0110, 0b0100_0010, 0b1000_0000];
        let mut br = BitReader::endian(&data[..], BigEndian);
        assert_eq!(ue(&mut br), Some(0));
        assert_eq!(ue(&mut br), Some(1));
        assert_eq!(ue(&mut br), Some(2));
        assert_eq!(se(&mut br), Some(2));
        assert_eq!(se(&mut br), Some(-2));
    }

    #[test]
    fn ue_stops_at_end_of_data() {
        let data = [0u8, 0];
        let mut br = BitReader::endian(&data[..], BigEndian);
        assert_eq!(ue(&mut br), None);
    }

    #[test]
    fn emulation_prevention_is_removed() {
        assert_eq!(remove_ep(&[0, 0, 3, 1, 0, 0, 3]), vec![0, 0, 1, 0, 0]);
        assert_eq!(remove_ep(&[0, 3, 0]), vec![0, 3, 0]);
    }
}
