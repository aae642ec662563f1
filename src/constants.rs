//! Constants for MPEG-PS demultiplexing

/// Packet start codes (prefix 0x000001 + stream id)
pub const START_CODE_PACK: u32 = 0x0000_01BA;
pub const START_CODE_SYSTEM: u32 = 0x0000_01BB;
pub const START_CODE_PSM: u32 = 0x0000_01BC;
pub const START_CODE_VIDEO: u32 = 0x0000_01E0;
pub const START_CODE_AUDIO: u32 = 0x0000_01C0;

/// Start codes the demuxer recognizes, also the resync targets
pub const KNOWN_START_CODES: &[u32] = &[
    START_CODE_PACK,
    START_CODE_SYSTEM,
    START_CODE_PSM,
    START_CODE_VIDEO,
    START_CODE_AUDIO,
];

/// Elementary stream id ranges used by the program stream map
pub const VIDEO_STREAM_IDS: std::ops::RangeInclusive<u8> = 0xE0..=0xEF;
pub const AUDIO_STREAM_IDS: std::ops::RangeInclusive<u8> = 0xC0..=0xDF;

/// PES header bytes covered by PES_packet_length before the payload:
/// two flag bytes plus PES_header_data_length itself
pub const PES_FIXED_HEADER_BYTES: u64 = 3;

/// The CRC_32 closing a program stream map
pub const PSM_CRC_BYTES: i64 = 4;

/// H.264 NAL header bytes seen at payload offset 4 (after 00 00 00 01)
pub const NAL_OFFSET: usize = 4;
pub const NAL_SPS: u8 = 0x67;
pub const NAL_PPS: u8 = 0x68;
pub const NAL_IDR: u8 = 0x65;
pub const NAL_P_FRAME: u8 = 0x61;

/// Bytes of a PES packet dumped with `dump_pes_start_bytes`
pub const PES_DUMP_BYTES: usize = 16;

/// Chunk size of the forward start-code scan
pub const RESYNC_CHUNK: usize = 64 * 1024;

/// Default capacity of the packet event queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;
