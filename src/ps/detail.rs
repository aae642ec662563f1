//! Re-decoding a single packet on demand.

use crate::bitreader::{BitReader, ByteSource};
use crate::error::{PsError, Result};
use crate::field::{FieldDecoder, FieldNode};
use crate::ps::demuxer::decode_body;
use crate::ps::packet::PacketKind;

/// Decodes the `kind` packet starting at byte `offset` into its field tree.
///
/// Runs on a fresh reader, so it never disturbs a demux in progress on the
/// same source. PES payloads are not part of the tree.
pub fn parse_detail<S: ByteSource>(source: S, offset: u64, kind: PacketKind) -> Result<FieldNode> {
    let mut reader = BitReader::at(source, offset)?;
    let code = reader.read(32)? as u32;
    if code != kind.start_code() {
        return Err(PsError::KindMismatch { offset, expected: kind.name() });
    }
    decode_tree(&mut reader, kind, code)
}

/// Like [`parse_detail`], taking the packet kind from the start code found
/// at `offset`.
pub fn parse_detail_at<S: ByteSource>(source: S, offset: u64) -> Result<(PacketKind, FieldNode)> {
    let mut reader = BitReader::at(source, offset)?;
    let code = reader.read(32)? as u32;
    let kind = PacketKind::from_start_code(code).ok_or(PsError::UnknownStartCode { code, offset })?;
    Ok((kind, decode_tree(&mut reader, kind, code)?))
}

fn decode_tree<S: ByteSource>(reader: &mut BitReader<S>, kind: PacketKind, code: u32) -> Result<FieldNode> {
    let mut dec = FieldDecoder::new(reader, kind.tree_root(), u64::from(code));
    decode_body(&mut dec, kind)?;
    Ok(dec.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ps::psm::tests::psm_bytes;

    fn stream() -> Vec<u8> {
        let mut data = vec![0x00, 0x00, 0x01, 0xC0, 0x00, 0x04, 0x80, 0x00, 0x00, 0x42];
        data.extend(psm_bytes(&[(0x1B, 0xE0, &[]), (0x0F, 0xC0, &[])], &[]));
        data
    }

    #[test]
    fn map_detail_mid_stream() {
        let data = stream();
        let tree = parse_detail(&data[..], 10, PacketKind::ProgramStreamMap).unwrap();
        assert_eq!(tree.name, "program_stream_map");
        assert_eq!(tree.value, 0x1BC);
        let types: Vec<_> = tree.children_named("stream").filter_map(|s| s.get("stream_type")).collect();
        assert_eq!(types, [0x1B, 0x0F]);
    }

    #[test]
    fn wrong_kind_is_rejected() {
        let data = stream();
        let err = parse_detail(&data[..], 0, PacketKind::VideoPes).unwrap_err();
        assert!(matches!(err, PsError::KindMismatch { offset: 0, expected: "video pes" }));
    }

    #[test]
    fn kind_from_start_code() {
        let data = stream();
        let (kind, tree) = parse_detail_at(&data[..], 0).unwrap();
        assert_eq!(kind, PacketKind::AudioPes);
        assert_eq!(tree.get("PES_packet_length"), Some(4));
        assert!(matches!(parse_detail_at(&data[..], 1), Err(PsError::UnknownStartCode { offset: 1, .. })));
    }
}
