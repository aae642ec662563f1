// src/lib.rs
pub mod inspector {
    use std::path::Path;

    pub use crate::report::{Outcome, RunReport};
    pub use crate::types::Options;

    /// Async entry-point; returns when the file is done, a fatal packet
    /// error stops the demux, or Ctrl-C is hit
    pub async fn run(opts: Options) -> anyhow::Result<RunReport> {
        crate::core::run(opts).await
    }

    /// Re-decodes a single packet without running the whole demux
    pub fn detail(path: &Path, offset: u64) -> anyhow::Result<(crate::ps::PacketKind, crate::field::FieldNode)> {
        crate::core::detail(path, offset)
    }
}

pub mod bitreader;
pub mod constants;
pub mod error;
pub mod field;
pub mod parsers;
pub mod ps;
pub mod report;
pub mod sink;
pub mod stats;
pub mod types;
pub mod writer;
mod core;

pub use bitreader::{BitReader, ByteSource, FileSource};
pub use error::{PsError, Result};
pub use field::{FieldDecoder, FieldNode, FieldSpec};
pub use ps::{parse_detail, parse_detail_at, Demuxer, PacketEvent, PacketKind, PacketStatus, StreamKind};
pub use sink::{ChannelSink, CollectSink, PacketSink, SinkEvent};
pub use stats::RunStats;
pub use types::DemuxConfig;
