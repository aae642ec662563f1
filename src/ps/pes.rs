//! PES header decoder: base header plus the flag-gated optional fields.

use crate::bitreader::ByteSource;
use crate::constants::PES_FIXED_HEADER_BYTES;
use crate::error::Result;
use crate::field::{field, FieldDecoder, FieldSpec};

pub(crate) const PES_HEADER: &[FieldSpec] = &[
    field("PES_packet_length", 16),
    field("marker_10", 2),
    field("PES_scrambling_control", 2),
    field("PES_priority", 1),
    field("data_alignment_indicator", 1),
    field("copyright", 1),
    field("original_or_copy", 1),
    field("PTS_DTS_flags", 2),
    field("ESCR_flag", 1),
    field("ES_rate_flag", 1),
    field("DSM_trick_mode_flag", 1),
    field("additional_copy_info_flag", 1),
    field("PES_CRC_flag", 1),
    field("PES_extension_flag", 1),
    field("PES_header_data_length", 8),
];

/// 33-bit timestamp split over three marker-separated parts.
const fn timestamp(prefix: &'static str, hi: &'static str, mid: &'static str, lo: &'static str) -> [FieldSpec; 7] {
    [
        field(prefix, 4),
        field(hi, 3),
        field("marker_bit", 1),
        field(mid, 15),
        field("marker_bit", 1),
        field(lo, 15),
        field("marker_bit", 1),
    ]
}

const PTS: [FieldSpec; 7] = timestamp("marker_pts", "PTS_32_30", "PTS_29_15", "PTS_14_0");
const DTS: [FieldSpec; 7] = timestamp("marker_dts", "DTS_32_30", "DTS_29_15", "DTS_14_0");

const ESCR: &[FieldSpec] = &[
    field("reserved", 2),
    field("ESCR_base_32_30", 3),
    field("marker_bit", 1),
    field("ESCR_base_29_15", 15),
    field("marker_bit", 1),
    field("ESCR_base_14_0", 15),
    field("marker_bit", 1),
    field("ESCR_extension", 9),
    field("marker_bit", 1),
];

const ES_RATE: &[FieldSpec] = &[field("marker_bit", 1), field("ES_rate", 22), field("marker_bit", 1)];

const ADDITIONAL_COPY_INFO: &[FieldSpec] = &[field("marker_bit", 1), field("additional_copy_info", 7)];

const PES_EXTENSION_FLAGS: &[FieldSpec] = &[
    field("PES_private_data_flag", 1),
    field("pack_header_field_flag", 1),
    field("program_packet_sequence_counter_flag", 1),
    field("P-STD_buffer_flag", 1),
    field("reserved", 3),
    field("PES_extension_flag_2", 1),
];

const SEQUENCE_COUNTER: &[FieldSpec] = &[
    field("marker_bit", 1),
    field("program_packet_sequence_counter", 7),
    field("marker_bit", 1),
    field("MPEG1_MPEG2_identifier", 1),
    field("original_stuff_length", 6),
];

const P_STD_BUFFER: &[FieldSpec] = &[
    field("marker_01", 2),
    field("P-STD_buffer_scale", 1),
    field("P-STD_buffer_size", 13),
];

/// Trick mode tails, selected by `trick_mode_control`.
const TRICK_FAST: &[FieldSpec] = &[
    field("field_id", 2),
    field("intra_slice_refresh", 1),
    field("frequency_truncation", 2),
];
const TRICK_SLOW: &[FieldSpec] = &[field("rep_cntrl", 5)];
const TRICK_FREEZE: &[FieldSpec] = &[field("field_id", 2), field("reserved", 3)];
const TRICK_RESERVED: &[FieldSpec] = &[field("reserved", 5)];

/// Lengths declared by a decoded PES header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PesHeader {
    pub packet_length: u64,
    pub header_data_length: u64,
    /// Optional fields consumed more than `PES_header_data_length` bytes.
    pub header_overrun: bool,
}

impl PesHeader {
    /// Payload bytes implied by the header, `None` when the lengths
    /// contradict each other.
    pub fn payload_len(&self) -> Option<u64> {
        if self.header_overrun {
            return None;
        }
        self.packet_length
            .checked_sub(PES_FIXED_HEADER_BYTES + self.header_data_length)
    }
}

/// Decodes a PES header up to the first payload byte.
pub fn decode_pes_header<S: ByteSource>(dec: &mut FieldDecoder<'_, S>) -> Result<PesHeader> {
    dec.decode(PES_HEADER)?;
    let packet_length = dec.get("PES_packet_length")?;
    let header_data_length = dec.get("PES_header_data_length")?;
    let optional_start = dec.offset();

    match dec.get("PTS_DTS_flags")? {
        0b10 => decode_timestamp(dec, "PTS", &PTS, "PTS_value")?,
        0b11 => {
            decode_timestamp(dec, "PTS", &PTS, "PTS_value")?;
            decode_timestamp(dec, "DTS", &DTS, "DTS_value")?;
        }
        _ => {}
    }
    if dec.get("ESCR_flag")? == 1 {
        dec.decode_nested("ESCR", 0, ESCR)?;
    }
    if dec.get("ES_rate_flag")? == 1 {
        dec.decode_nested("ES_rate", 0, ES_RATE)?;
    }
    if dec.get("DSM_trick_mode_flag")? == 1 {
        decode_trick_mode(dec)?;
    }
    if dec.get("additional_copy_info_flag")? == 1 {
        dec.decode_nested("additional_copy_info", 0, ADDITIONAL_COPY_INFO)?;
    }
    if dec.get("PES_CRC_flag")? == 1 {
        dec.read("previous_PES_packet_CRC", 16)?;
    }
    if dec.get("PES_extension_flag")? == 1 {
        decode_extension(dec)?;
    }

    let consumed = dec.offset() - optional_start;
    let header_overrun = consumed > header_data_length;
    if !header_overrun {
        // stuffing bytes
        dec.skip_bytes(header_data_length - consumed)?;
    }
    Ok(PesHeader { packet_length, header_data_length, header_overrun })
}

fn decode_timestamp<S: ByteSource>(
    dec: &mut FieldDecoder<'_, S>,
    group: &'static str,
    spec: &[FieldSpec; 7],
    value_name: &'static str,
) -> Result<()> {
    dec.enter(group, 0);
    let res = dec.decode(spec).and_then(|_| {
        let ts = (dec.get(spec[1].name)? << 30) | (dec.get(spec[3].name)? << 15) | dec.get(spec[5].name)?;
        dec.set(value_name, ts);
        Ok(())
    });
    dec.leave();
    res
}

fn decode_trick_mode<S: ByteSource>(dec: &mut FieldDecoder<'_, S>) -> Result<()> {
    dec.enter("DSM_trick_mode", 0);
    let res = dec.read("trick_mode_control", 3).and_then(|control| {
        let tail = match control {
            0b000 | 0b011 => TRICK_FAST,
            0b001 | 0b100 => TRICK_SLOW,
            0b010 => TRICK_FREEZE,
            _ => TRICK_RESERVED,
        };
        dec.decode(tail)
    });
    dec.leave();
    res
}

fn decode_extension<S: ByteSource>(dec: &mut FieldDecoder<'_, S>) -> Result<()> {
    dec.enter("PES_extension", 0);
    let res = decode_extension_body(dec);
    dec.leave();
    res
}

fn decode_extension_body<S: ByteSource>(dec: &mut FieldDecoder<'_, S>) -> Result<()> {
    dec.decode(PES_EXTENSION_FLAGS)?;
    if dec.get("PES_private_data_flag")? == 1 {
        dec.read("PES_private_data_hi", 64)?;
        dec.read("PES_private_data_lo", 64)?;
    }
    if dec.get("pack_header_field_flag")? == 1 {
        let len = dec.read("pack_field_length", 8)?;
        dec.skip_bytes(len)?;
    }
    if dec.get("program_packet_sequence_counter_flag")? == 1 {
        dec.decode_nested("program_packet_sequence_counter", 0, SEQUENCE_COUNTER)?;
    }
    if dec.get("P-STD_buffer_flag")? == 1 {
        dec.decode_nested("P-STD_buffer", 0, P_STD_BUFFER)?;
    }
    if dec.get("PES_extension_flag_2")? == 1 {
        dec.read("marker_bit", 1)?;
        let len = dec.read("PES_extension_field_length", 7)?;
        dec.skip_bytes(len)?;
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::bitreader::BitReader;
    use bitstream_io::{BigEndian, BitWrite, BitWriter};

    /// PES header bytes after the start code, PTS only, plus stuffing.
    pub(crate) fn pes_header_with_pts(packet_length: u16, pts: u64, stuffing: u8) -> Vec<u8> {
        let mut w = BitWriter::endian(Vec::new(), BigEndian);
        w.write::<16, u16>(packet_length).unwrap();
        w.write::<8, u8>(0x80).unwrap();
        w.write::<8, u8>(0x80).unwrap(); // PTS only
        w.write::<8, u8>(5 + stuffing).unwrap();
        w.write::<4, u8>(0b0010).unwrap();
        w.write::<3, u64>(pts >> 30).unwrap();
        w.write::<1, u8>(1).unwrap();
        w.write::<15, u64>((pts >> 15) & 0x7FFF).unwrap();
        w.write::<1, u8>(1).unwrap();
        w.write::<15, u64>(pts & 0x7FFF).unwrap();
        w.write::<1, u8>(1).unwrap();
        let mut out = w.into_writer();
        out.extend(std::iter::repeat_n(0xFF, usize::from(stuffing)));
        out
    }

    fn decode(data: &[u8]) -> (PesHeader, crate::field::FieldNode, u64) {
        let mut br = BitReader::new(data);
        let mut dec = FieldDecoder::new(&mut br, "PES_packet", 0x1E0);
        let header = decode_pes_header(&mut dec).unwrap();
        let end = dec.offset();
        (header, dec.finish(), end)
    }

    #[test]
    fn pts_is_assembled_and_stuffing_skipped() {
        let data = pes_header_with_pts(20, 0x1_0000_8001, 3);
        let (header, tree, end) = decode(&data);
        assert_eq!(end, 5 + 5 + 3);
        assert_eq!(header.payload_len(), Some(20 - 3 - 8));
        let pts = tree.child("PTS").unwrap();
        assert_eq!(pts.get("PTS_value"), Some(0x1_0000_8001));
    }

    #[test]
    fn pts_and_dts_records() {
        let mut data = vec![0x00, 0x20, 0x80, 0xC0, 0x0A];
        // PTS = 1, DTS = 2
        data.extend([0x31, 0x00, 0x01, 0x00, 0x03]);
        data.extend([0x11, 0x00, 0x01, 0x00, 0x05]);
        let (header, tree, end) = decode(&data);
        assert_eq!(end, 15);
        assert_eq!(tree.child("PTS").and_then(|n| n.get("PTS_value")), Some(1));
        assert_eq!(tree.child("DTS").and_then(|n| n.get("DTS_value")), Some(2));
        assert_eq!(header.payload_len(), Some(0x20 - 13));
    }

    #[test]
    fn trick_mode_tail_follows_control() {
        // slow motion, rep_cntrl = 0b10101
        let data = [0x00, 0x10, 0x80, 0x08, 0x01, 0b0011_0101];
        let (_, tree, _) = decode(&data);
        let trick = tree.child("DSM_trick_mode").unwrap();
        assert_eq!(trick.get("trick_mode_control"), Some(1));
        assert_eq!(trick.get("rep_cntrl"), Some(0b10101));
    }

    #[test]
    fn fast_and_freeze_trick_tails() {
        // fast forward: field_id 2, intra_slice_refresh 1, frequency_truncation 3
        let data = [0x00, 0x10, 0x80, 0x08, 0x01, 0b0001_0111];
        let (_, tree, end) = decode(&data);
        assert_eq!(end, 6);
        let trick = tree.child("DSM_trick_mode").unwrap();
        assert_eq!(trick.get("trick_mode_control"), Some(0));
        assert_eq!(trick.get("field_id"), Some(2));
        assert_eq!(trick.get("intra_slice_refresh"), Some(1));
        assert_eq!(trick.get("frequency_truncation"), Some(3));

        // fast reverse shares the fast tail
        let data = [0x00, 0x10, 0x80, 0x08, 0x01, 0b0110_0010];
        let (_, tree, _) = decode(&data);
        let trick = tree.child("DSM_trick_mode").unwrap();
        assert_eq!(trick.get("trick_mode_control"), Some(3));
        assert_eq!(trick.get("field_id"), Some(0));
        assert_eq!(trick.get("frequency_truncation"), Some(2));

        // freeze frame: field_id 1
        let data = [0x00, 0x10, 0x80, 0x08, 0x01, 0b0100_1111];
        let (_, tree, end) = decode(&data);
        assert_eq!(end, 6);
        let trick = tree.child("DSM_trick_mode").unwrap();
        assert_eq!(trick.get("trick_mode_control"), Some(2));
        assert_eq!(trick.get("field_id"), Some(1));
        assert_eq!(trick.get("rep_cntrl"), None);
    }

    #[test]
    fn escr_rate_copy_info_and_private_data() {
        let escr_base = 0x1_2345_6789u64;
        let mut w = BitWriter::endian(Vec::new(), BigEndian);
        w.write::<16, u16>(64).unwrap();
        w.write::<8, u8>(0x80).unwrap();
        // ESCR, ES_rate, additional_copy_info, extension
        w.write::<8, u8>(0b0011_0101).unwrap();
        w.write::<8, u8>(30).unwrap();

        w.write::<2, u8>(0b11).unwrap();
        w.write::<3, u64>(escr_base >> 30).unwrap();
        w.write::<1, u8>(1).unwrap();
        w.write::<15, u64>((escr_base >> 15) & 0x7FFF).unwrap();
        w.write::<1, u8>(1).unwrap();
        w.write::<15, u64>(escr_base & 0x7FFF).unwrap();
        w.write::<1, u8>(1).unwrap();
        w.write::<9, u16>(0x1AB).unwrap();
        w.write::<1, u8>(1).unwrap();

        w.write::<1, u8>(1).unwrap();
        w.write::<22, u32>(0x2_ABCD).unwrap();
        w.write::<1, u8>(1).unwrap();

        w.write::<1, u8>(1).unwrap();
        w.write::<7, u8>(0x55).unwrap();

        // private data + pack header field
        w.write::<8, u8>(0b1100_1110).unwrap();
        for b in 0..16u8 {
            w.write::<8, u8>(b).unwrap();
        }
        w.write::<8, u8>(2).unwrap();
        w.write::<8, u8>(0xAA).unwrap();
        w.write::<8, u8>(0xBB).unwrap();
        let mut data = w.into_writer();
        data.push(0x47);

        let (header, tree, end) = decode(&data);
        assert_eq!(end, 35);
        assert!(!header.header_overrun);
        assert_eq!(header.payload_len(), Some(31));

        let escr = tree.child("ESCR").unwrap();
        assert_eq!(escr.get("ESCR_base_32_30"), Some(escr_base >> 30));
        assert_eq!(escr.get("ESCR_base_29_15"), Some((escr_base >> 15) & 0x7FFF));
        assert_eq!(escr.get("ESCR_base_14_0"), Some(escr_base & 0x7FFF));
        assert_eq!(escr.get("ESCR_extension"), Some(0x1AB));
        assert_eq!(tree.child("ES_rate").and_then(|n| n.get("ES_rate")), Some(0x2_ABCD));
        assert_eq!(
            tree.child("additional_copy_info").and_then(|n| n.get("additional_copy_info")),
            Some(0x55)
        );

        let ext = tree.child("PES_extension").unwrap();
        assert_eq!(ext.get("PES_private_data_hi"), Some(0x0001_0203_0405_0607));
        assert_eq!(ext.get("PES_private_data_lo"), Some(0x0809_0A0B_0C0D_0E0F));
        assert_eq!(ext.get("pack_field_length"), Some(2));
        assert_eq!(ext.get("program_packet_sequence_counter_flag"), Some(0));
    }

    #[test]
    fn extension_fields_are_gated() {
        // sequence counter + P-STD buffer, then extension 2 with 1 byte
        let data = [
            0x00, 0x20, 0x80, 0x01, 0x07,
            0b0011_0001,
            0x85, 0x43,
            0x60, 0x10,
            0x81, 0xAA,
        ];
        let (header, tree, end) = decode(&data);
        assert_eq!(end, 12);
        assert!(!header.header_overrun);
        let ext = tree.child("PES_extension").unwrap();
        let counter = ext.child("program_packet_sequence_counter").unwrap();
        assert_eq!(counter.get("program_packet_sequence_counter"), Some(5));
        assert_eq!(counter.get("original_stuff_length"), Some(3));
        assert_eq!(ext.child("P-STD_buffer").and_then(|n| n.get("P-STD_buffer_size")), Some(16));
        assert_eq!(ext.get("PES_extension_field_length"), Some(1));
    }

    #[test]
    fn lying_lengths_have_no_payload() {
        // header claims 0 optional bytes but carries a PES CRC
        let data = [0x00, 0x20, 0x80, 0x02, 0x00, 0xAB, 0xCD];
        let (header, _, _) = decode(&data);
        assert!(header.header_overrun);
        assert_eq!(header.payload_len(), None);

        let short = PesHeader { packet_length: 4, header_data_length: 5, header_overrun: false };
        assert_eq!(short.payload_len(), None);
    }
}
