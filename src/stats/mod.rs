//! Run-state counters accumulated by the demuxer

use serde::Serialize;

use crate::parsers::h264::{NalKind, SpsInfo};
use crate::ps::packet::StreamKind;

/// Counters for one demux run.
///
/// Owned by the demuxer and handed to the reporter when the run ends,
/// including runs that stop early.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub packet_count:       u64,
    pub total_video_frames: u64,
    pub err_video_frames:   u64,
    pub total_audio_frames: u64,
    pub err_audio_frames:   u64,
    pub i_frames:           u64,
    pub err_i_frames:       u64,
    pub p_frames:           u64,
    pub sps_count:          u64,
    pub pps_count:          u64,
    pub psm_count:          u64,
    pub video_stream_type:  Option<u8>,
    pub audio_stream_type:  Option<u8>,
    /// Bytes thrown away while resynchronizing.
    pub bytes_discarded:    u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video:              Option<SpsInfo>,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one PES frame of `stream`; `errored` frames also bump the
    /// matching error counter.
    pub fn record_frame(&mut self, stream: StreamKind, errored: bool) {
        match stream {
            StreamKind::Video => {
                self.total_video_frames += 1;
                if errored {
                    self.err_video_frames += 1;
                }
            }
            StreamKind::Audio => {
                self.total_audio_frames += 1;
                if errored {
                    self.err_audio_frames += 1;
                }
            }
        }
    }

    /// Updates the NAL counters for a classified video payload.
    pub fn record_nal(&mut self, nal: NalKind, errored: bool) {
        match nal {
            NalKind::Sps => self.sps_count += 1,
            NalKind::Pps => self.pps_count += 1,
            NalKind::Idr if errored => self.err_i_frames += 1,
            NalKind::Idr => self.i_frames += 1,
            // P-frames count regardless of the payload outcome
            NalKind::PFrame => self.p_frames += 1,
            NalKind::Other(_) | NalKind::Empty => {}
        }
    }

    /// Records the stream type of a program stream map entry; last one wins.
    pub fn record_stream_type(&mut self, stream: StreamKind, stream_type: u8) {
        match stream {
            StreamKind::Video => self.video_stream_type = Some(stream_type),
            StreamKind::Audio => self.audio_stream_type = Some(stream_type),
        }
    }
}
