//! Pack header and system header decoders.

use tracing::warn;

use crate::bitreader::ByteSource;
use crate::error::Result;
use crate::field::{field, FieldDecoder, FieldSpec};

/// Fixed 80-bit MPEG-2 pack header body following the start code.
pub(crate) const PACK_HEADER: &[FieldSpec] = &[
    field("marker_01", 2),
    field("system_clock_reference_base_32_30", 3),
    field("marker_bit", 1),
    field("system_clock_reference_base_29_15", 15),
    field("marker_bit", 1),
    field("system_clock_reference_base_14_0", 15),
    field("marker_bit", 1),
    field("system_clock_reference_extension", 9),
    field("marker_bit", 1),
    field("program_mux_rate", 22),
    field("marker_bit", 1),
    field("marker_bit", 1),
    field("reserved", 5),
    field("pack_stuffing_length", 3),
];

pub(crate) const SYSTEM_HEADER: &[FieldSpec] = &[
    field("header_length", 16),
    field("marker_bit", 1),
    field("rate_bound", 22),
    field("marker_bit", 1),
    field("audio_bound", 6),
    field("fixed_flag", 1),
    field("CSPS_flag", 1),
    field("system_audio_lock_flag", 1),
    field("system_video_lock_flag", 1),
    field("marker_bit", 1),
    field("video_bound", 5),
    field("packet_rate_restriction_flag", 1),
    field("reserved_bits", 7),
];

/// One P-STD bound record of the system header loop.
pub(crate) const STREAM_BOUND: &[FieldSpec] = &[
    field("stream_id", 8),
    field("marker_11", 2),
    field("P-STD_buffer_bound_scale", 1),
    field("P-STD_buffer_size_bound", 13),
];

/// Decodes a pack header, records the assembled SCR and skips stuffing.
///
/// Marker bits are taken positionally and never checked.
pub fn decode_pack_header<S: ByteSource>(dec: &mut FieldDecoder<'_, S>) -> Result<()> {
    dec.decode(PACK_HEADER)?;
    let base = (dec.get("system_clock_reference_base_32_30")? << 30)
        | (dec.get("system_clock_reference_base_29_15")? << 15)
        | dec.get("system_clock_reference_base_14_0")?;
    let ext = dec.get("system_clock_reference_extension")?;
    // 27 MHz units
    dec.set("system_clock_reference", base * 300 + ext);

    let stuffing = dec.get("pack_stuffing_length")?;
    dec.skip_bytes(stuffing)
}

/// Decodes a system header and its stream bound loop.
///
/// The loop runs while the next bit (the high bit of a stream_id) is set.
/// Afterwards the position is reconciled with `header_length`: bytes the
/// loop did not account for are skipped.
pub fn decode_system_header<S: ByteSource>(dec: &mut FieldDecoder<'_, S>) -> Result<()> {
    let body_start = dec.offset();
    dec.decode(SYSTEM_HEADER)?;
    let declared_end = body_start + 2 + dec.get("header_length")?;

    let mut index = 0;
    while !dec.reader().is_exhausted() && dec.peek(1)? == 1 {
        dec.decode_nested("stream", index, STREAM_BOUND)?;
        index += 1;
    }

    let end = dec.offset();
    if end < declared_end {
        dec.skip_bytes(declared_end - end)?;
    } else if end > declared_end {
        warn!(
            offset = body_start,
            overrun = end - declared_end,
            "system header stream loop runs past header_length"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitreader::BitReader;
    use bitstream_io::{BigEndian, BitWrite, BitWriter};

    fn pack_body(scr_base: u64, scr_ext: u16, mux_rate: u32, stuffing: u8) -> Vec<u8> {
        let mut w = BitWriter::endian(Vec::new(), BigEndian);
        w.write::<2, u8>(0b01).unwrap();
        w.write::<3, u64>(scr_base >> 30).unwrap();
        w.write::<1, u8>(1).unwrap();
        w.write::<15, u64>((scr_base >> 15) & 0x7FFF).unwrap();
        w.write::<1, u8>(1).unwrap();
        w.write::<15, u64>(scr_base & 0x7FFF).unwrap();
        w.write::<1, u8>(1).unwrap();
        w.write::<9, u16>(scr_ext).unwrap();
        w.write::<1, u8>(1).unwrap();
        w.write::<22, u32>(mux_rate).unwrap();
        w.write::<2, u8>(0b11).unwrap();
        w.write::<5, u8>(0x1F).unwrap();
        w.write::<3, u8>(stuffing).unwrap();
        let mut out = w.into_writer();
        out.extend(std::iter::repeat_n(0xFF, usize::from(stuffing)));
        out
    }

    #[test]
    fn pack_header_fields_and_stuffing() {
        let mut data = pack_body(0x1_2345_6789, 0x155, 0x3_FFFF, 2);
        data.extend([0xAB]);
        let mut br = BitReader::new(&data[..]);
        let mut dec = FieldDecoder::new(&mut br, "pack_header", 0x1BA);
        decode_pack_header(&mut dec).unwrap();

        assert_eq!(dec.get("program_mux_rate").unwrap(), 0x3_FFFF);
        assert_eq!(dec.get("system_clock_reference_extension").unwrap(), 0x155);
        assert_eq!(dec.get("system_clock_reference").unwrap(), 0x1_2345_6789 * 300 + 0x155);
        assert_eq!(dec.offset(), 12);
        drop(dec);
        assert_eq!(br.read(8).unwrap(), 0xAB);
    }

    fn system_body(header_length: u16, streams: &[(u8, u16)], padding: usize) -> Vec<u8> {
        let mut w = BitWriter::endian(Vec::new(), BigEndian);
        w.write::<16, u16>(header_length).unwrap();
        w.write::<1, u8>(1).unwrap();
        w.write::<22, u32>(5000).unwrap();
        w.write::<1, u8>(1).unwrap();
        w.write::<6, u8>(1).unwrap();
        w.write::<4, u8>(0b0011).unwrap();
        w.write::<1, u8>(1).unwrap();
        w.write::<5, u8>(1).unwrap();
        w.write::<1, u8>(0).unwrap();
        w.write::<7, u8>(0x7F).unwrap();
        for (id, size) in streams {
            w.write::<8, u8>(*id).unwrap();
            w.write::<2, u8>(0b11).unwrap();
            w.write::<1, u8>(1).unwrap();
            w.write::<13, u16>(*size).unwrap();
        }
        let mut out = w.into_writer();
        out.extend(std::iter::repeat_n(0x00, padding));
        out
    }

    #[test]
    fn system_header_stream_loop() {
        let mut data = system_body(12, &[(0xE0, 232), (0xC0, 32)], 0);
        data.extend([0x00, 0x00, 0x01, 0xBC]);
        let mut br = BitReader::new(&data[..]);
        let mut dec = FieldDecoder::new(&mut br, "system_header", 0x1BB);
        decode_system_header(&mut dec).unwrap();
        assert_eq!(dec.offset(), 14);

        let tree = dec.finish();
        let ids: Vec<_> = tree.children_named("stream").filter_map(|s| s.get("stream_id")).collect();
        assert_eq!(ids, [0xE0, 0xC0]);
        assert_eq!(tree.get("rate_bound"), Some(5000));
    }

    #[test]
    fn system_header_leftover_bytes_are_skipped() {
        // one declared stream plus two bytes the loop cannot see
        let data = system_body(11, &[(0xE0, 100)], 2);
        let mut br = BitReader::new(&data[..]);
        let mut dec = FieldDecoder::new(&mut br, "system_header", 0x1BB);
        decode_system_header(&mut dec).unwrap();
        assert_eq!(dec.offset(), 13);
        assert!(dec.reader().is_exhausted());
    }
}
