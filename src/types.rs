use std::path::PathBuf;

use crate::constants::DEFAULT_QUEUE_CAPACITY;
use crate::ps::packet::{PacketKind, StreamKind};

/// Configuration options for the inspector
#[derive(Debug, Clone)]
pub struct Options {
    pub file: PathBuf,
    pub output_video: PathBuf,
    pub output_audio: PathBuf,
    pub dump_video: bool,
    pub dump_audio: bool,
    pub print_ps_header: bool,
    pub print_sys_header: bool,
    pub print_psm: bool,
    pub verbose: bool,
    pub dump_pes_start_bytes: bool,
    pub report_pack_headers: bool,
    pub queue_capacity: usize,
    /// Print the run summary as JSON
    pub json: bool,
}

impl Options {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            output_video: PathBuf::from("./output.video"),
            output_audio: PathBuf::from("./output.audio"),
            dump_video: false,
            dump_audio: false,
            print_ps_header: false,
            print_sys_header: false,
            print_psm: false,
            verbose: false,
            dump_pes_start_bytes: false,
            report_pack_headers: false,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            json: false,
        }
    }

    pub fn demux_config(&self) -> DemuxConfig {
        DemuxConfig {
            verbose: self.verbose,
            print_pack_header: self.print_ps_header,
            print_system_header: self.print_sys_header,
            print_psm: self.print_psm,
            dump_pes_start_bytes: self.dump_pes_start_bytes,
            report_pack_headers: self.report_pack_headers,
            forward_video: self.dump_video,
            forward_audio: self.dump_audio,
        }
    }
}

/// What the demuxer itself needs to know
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemuxConfig {
    /// Log every packet at debug level
    pub verbose: bool,
    pub print_pack_header: bool,
    pub print_system_header: bool,
    pub print_psm: bool,
    pub dump_pes_start_bytes: bool,
    /// Send pack headers to the sink as well
    pub report_pack_headers: bool,
    pub forward_video: bool,
    pub forward_audio: bool,
}

impl DemuxConfig {
    pub fn prints(&self, kind: PacketKind) -> bool {
        match kind {
            PacketKind::PackHeader => self.print_pack_header,
            PacketKind::SystemHeader => self.print_system_header,
            PacketKind::ProgramStreamMap => self.print_psm,
            PacketKind::VideoPes | PacketKind::AudioPes => false,
        }
    }

    pub fn forwards(&self, stream: StreamKind) -> bool {
        match stream {
            StreamKind::Video => self.forward_video,
            StreamKind::Audio => self.forward_audio,
        }
    }
}

impl Default for DemuxConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            print_pack_header: false,
            print_system_header: false,
            print_psm: false,
            dump_pes_start_bytes: false,
            report_pack_headers: false,
            forward_video: true,
            forward_audio: true,
        }
    }
}
