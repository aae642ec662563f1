//! Program stream map decoder.

use crc::{Crc, CRC_32_MPEG_2};
use tracing::warn;

use crate::bitreader::ByteSource;
use crate::constants::{AUDIO_STREAM_IDS, PSM_CRC_BYTES, VIDEO_STREAM_IDS};
use crate::error::{PsError, Result};
use crate::field::{field, FieldDecoder, FieldSpec};
use crate::ps::packet::StreamKind;

const MPEG2_CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_MPEG_2);

pub(crate) const PSM_HEADER: &[FieldSpec] = &[
    field("program_stream_map_length", 16),
    field("current_next_indicator", 1),
    field("single_extension_stream_flag", 1),
    field("reserved", 1),
    field("program_stream_map_version", 5),
    field("reserved", 7),
    field("marker_bit", 1),
    field("program_stream_info_length", 16),
];

pub(crate) const STREAM_MAP_ENTRY: &[FieldSpec] = &[
    field("stream_type", 8),
    field("elementary_stream_id", 8),
    field("elementary_stream_info_length", 16),
];

/// Stream of the map that the demuxer tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappedStream {
    pub kind: StreamKind,
    pub stream_type: u8,
    pub elementary_stream_id: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamMap {
    pub streams: Vec<MappedStream>,
    pub crc_valid: bool,
}

/// Decodes a program stream map whose start code was just consumed.
///
/// Lengths are reconciled before the CRC is read: every entry must fit in
/// the declared `elementary_stream_map_length` (`CheckLength`) and the map
/// must end exactly on its 4-byte CRC (`FormatMismatch`). A wrong CRC is
/// only recorded as `CRC_valid = 0`.
pub fn decode_program_stream_map<S: ByteSource>(dec: &mut FieldDecoder<'_, S>) -> Result<StreamMap> {
    let start_code_at = dec.offset().saturating_sub(4);
    dec.decode(PSM_HEADER)?;
    let map_length = dec.get("program_stream_map_length")? as i64;
    let info_length = dec.get("program_stream_info_length")?;
    dec.skip_bytes(info_length)?;
    let es_map_length = dec.read("elementary_stream_map_length", 16)?;

    let mut map = StreamMap::default();
    let mut remaining = es_map_length;
    let mut index = 0;
    while remaining > 0 {
        if remaining < 4 {
            return Err(PsError::CheckLength { needed: 4, remaining });
        }
        dec.enter("stream", index);
        let entry = dec.decode(STREAM_MAP_ENTRY).and_then(|_| {
            Ok((
                dec.get("stream_type")? as u8,
                dec.get("elementary_stream_id")? as u8,
                dec.get("elementary_stream_info_length")?,
            ))
        });
        dec.leave();
        let (stream_type, es_id, es_info_length) = entry?;

        let needed = 4 + es_info_length;
        if needed > remaining {
            return Err(PsError::CheckLength { needed, remaining });
        }
        dec.skip_bytes(es_info_length)?;
        remaining -= needed;
        index += 1;

        let kind = if VIDEO_STREAM_IDS.contains(&es_id) {
            Some(StreamKind::Video)
        } else if AUDIO_STREAM_IDS.contains(&es_id) {
            Some(StreamKind::Audio)
        } else {
            None
        };
        if let Some(kind) = kind {
            map.streams.push(MappedStream { kind, stream_type, elementary_stream_id: es_id });
        }
    }

    let left = map_length - 2 - (info_length as i64 + 2) - (2 + es_map_length as i64);
    if left != PSM_CRC_BYTES {
        return Err(PsError::FormatMismatch { remaining: left });
    }

    let crc = dec.read("CRC_32", 32)?;
    let covered = dec.offset() - 4 - start_code_at;
    let mut body = vec![0u8; covered as usize];
    dec.reader().source().read_exact_at(&mut body, start_code_at)?;
    map.crc_valid = MPEG2_CRC.checksum(&body) == crc as u32;
    dec.set("CRC_valid", u64::from(map.crc_valid));
    if !map.crc_valid {
        warn!(offset = start_code_at, crc, "program stream map CRC mismatch");
    }
    Ok(map)
}
