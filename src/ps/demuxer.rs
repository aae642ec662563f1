//! The demux loop: start code dispatch, payload bounding and resync.

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::bitreader::{BitReader, ByteSource};
use crate::constants::{NAL_OFFSET, PES_DUMP_BYTES, PES_FIXED_HEADER_BYTES};
use crate::error::{PsError, Result};
use crate::field::FieldDecoder;
use crate::parsers::h264::{parse_sps_payload, NalKind};
use crate::ps::headers::{decode_pack_header, decode_system_header};
use crate::ps::packet::{PacketEvent, PacketKind, PacketStatus, StreamKind};
use crate::ps::pes::{decode_pes_header, PesHeader};
use crate::ps::psm::{decode_program_stream_map, StreamMap};
use crate::ps::resync::{find_next_start_code, payload_fits};
use crate::sink::PacketSink;
use crate::stats::RunStats;
use crate::types::DemuxConfig;

/// One decoded packet and, for a bounded PES, its payload.
#[derive(Debug, Clone)]
pub struct Packet {
    pub event: PacketEvent,
    pub payload: Option<(StreamKind, Bytes)>,
}

/// What a packet body decoder hands back besides the field tree.
pub(crate) enum Body {
    Plain,
    Map(StreamMap),
    Pes(PesHeader),
}

/// Decodes the body of a `kind` packet whose start code was just read.
pub(crate) fn decode_body<S: ByteSource>(dec: &mut FieldDecoder<'_, S>, kind: PacketKind) -> Result<Body> {
    match kind {
        PacketKind::PackHeader => decode_pack_header(dec).map(|_| Body::Plain),
        PacketKind::SystemHeader => decode_system_header(dec).map(|_| Body::Plain),
        PacketKind::ProgramStreamMap => decode_program_stream_map(dec).map(Body::Map),
        PacketKind::VideoPes | PacketKind::AudioPes => decode_pes_header(dec).map(Body::Pes),
    }
}

/// Sequential MPEG-PS demultiplexer.
///
/// Nothing is carried between packets except the reader position and the
/// run counters, which stay readable after the run stops for any reason.
pub struct Demuxer<S> {
    reader: BitReader<S>,
    config: DemuxConfig,
    stats:  RunStats,
}

impl<S: ByteSource> Demuxer<S> {
    pub fn new(source: S, config: DemuxConfig) -> Self {
        Self { reader: BitReader::new(source), config, stats: RunStats::new() }
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn into_stats(self) -> RunStats {
        self.stats
    }

    pub fn offset(&self) -> u64 {
        self.reader.offset()
    }

    /// Demuxes until end of source, a fatal error or cancellation.
    ///
    /// Every decoded packet reaches `sink` before the run stops, including
    /// the one that failed. A lying PES length is reported and skipped over.
    pub fn run<K: PacketSink + ?Sized>(&mut self, sink: &mut K, cancel: &CancellationToken) -> Result<()> {
        while !self.reader.is_exhausted() {
            if cancel.is_cancelled() {
                warn!(offset = self.reader.offset(), "demux cancelled");
                return Err(PsError::Cancelled);
            }
            let (packet, fatal) = match self.step() {
                Ok(step) => step,
                Err(err) => {
                    error!(offset = self.reader.offset(), %err, "demux stopped");
                    return Err(err);
                }
            };
            self.deliver(packet, sink)?;
            if let Some(err) = fatal {
                error!(offset = self.reader.offset(), %err, "demux stopped");
                return Err(err);
            }
        }
        Ok(())
    }

    /// Decodes one packet; `Ok(None)` once the source is exhausted.
    ///
    /// A resynchronized PES still comes back as `Ok` with an Error status.
    pub fn next_packet(&mut self) -> Result<Option<Packet>> {
        if self.reader.is_exhausted() {
            return Ok(None);
        }
        match self.step()? {
            (_, Some(err)) => Err(err),
            (packet, None) => Ok(Some(packet)),
        }
    }

    fn step(&mut self) -> Result<(Packet, Option<PsError>)> {
        let offset = self.reader.offset();
        let code = self.reader.read(32)? as u32;
        let kind = PacketKind::from_start_code(code).ok_or(PsError::UnknownStartCode { code, offset })?;
        self.stats.packet_count += 1;
        if kind == PacketKind::ProgramStreamMap {
            self.stats.psm_count += 1;
        }
        if self.config.dump_pes_start_bytes && kind.stream_kind().is_some() {
            self.dump_start_bytes(offset)?;
        }

        let mut dec = FieldDecoder::new(&mut self.reader, kind.tree_root(), u64::from(code));
        let body = decode_body(&mut dec, kind);
        let fields = dec.finish();

        let mut payload = None;
        let outcome = match body {
            Ok(Body::Plain) => Ok(()),
            Ok(Body::Map(map)) => {
                for s in &map.streams {
                    self.stats.record_stream_type(s.kind, s.stream_type);
                }
                Ok(())
            }
            Ok(Body::Pes(header)) => match kind.stream_kind() {
                Some(stream) => self
                    .pes_payload(stream, &header)
                    .map(|data| payload = Some((stream, data))),
                None => Ok(()),
            },
            Err(err) => Err(err),
        };

        let (status, error, fatal) = match outcome {
            Ok(()) => (PacketStatus::Ok, None, None),
            Err(err) if err.is_recoverable() => (PacketStatus::Error, Some(err.to_string()), None),
            Err(err) => (PacketStatus::Error, Some(err.to_string()), Some(err)),
        };
        let size = self.reader.offset().saturating_sub(offset);

        debug!(offset, kind = %kind, status = %status, size, "packet");
        if self.config.prints(kind) {
            info!("{kind} at byte {offset}\n{fields}");
        } else if self.config.verbose {
            debug!("{kind} at byte {offset}\n{fields}");
        }

        let event = PacketEvent { offset, kind, status, size, fields, error };
        Ok((Packet { event, payload }, fatal))
    }

    /// Reads the payload after a PES header, or resynchronizes when the
    /// declared length does not end on a packet boundary.
    fn pes_payload(&mut self, stream: StreamKind, header: &PesHeader) -> Result<Bytes> {
        let from = self.reader.offset();
        match header.payload_len() {
            Some(len) if payload_fits(&self.reader, from, len)? => {
                let mut buf = vec![0u8; len as usize];
                self.reader.read_bytes(&mut buf)?;
                let data = Bytes::from(buf);
                self.stats.record_frame(stream, false);
                if stream == StreamKind::Video {
                    self.inspect_video(&data);
                }
                Ok(data)
            }
            _ => {
                let declared = header
                    .packet_length
                    .saturating_sub(PES_FIXED_HEADER_BYTES + header.header_data_length);
                let discarded = self.resync(stream, from)?;
                Err(PsError::PayloadLengthInvalid { declared, actual: discarded })
            }
        }
    }

    /// Discards everything up to the next known start code and counts the
    /// chunk as an errored frame. Returns the number of bytes discarded.
    fn resync(&mut self, stream: StreamKind, from: u64) -> Result<u64> {
        let next = find_next_start_code(&self.reader, from)?;
        let discarded = next - from;

        let mut head = [0u8; NAL_OFFSET + 1];
        let n = self.reader.read_at(&mut head, from)?.min(discarded as usize);
        self.reader.skip_bytes(discarded)?;

        self.stats.bytes_discarded += discarded;
        self.stats.record_frame(stream, true);
        if stream == StreamKind::Video {
            self.stats.record_nal(NalKind::classify(&head[..n]), true);
        }
        warn!(offset = from, discarded, next, ?stream, "PES length invalid, resynchronized");
        Ok(discarded)
    }

    fn inspect_video(&mut self, data: &[u8]) {
        let nal = NalKind::classify(data);
        self.stats.record_nal(nal, false);
        if nal == NalKind::Sps && self.stats.video.is_none() {
            if let Some(info) = parse_sps_payload(data) {
                info!(
                    profile = info.profile_idc,
                    level = info.level_idc,
                    width = info.width,
                    height = info.height,
                    chroma = info.chroma,
                    "H.264 SPS"
                );
                self.stats.video = Some(info);
            }
        }
    }

    fn deliver<K: PacketSink + ?Sized>(&self, packet: Packet, sink: &mut K) -> Result<()> {
        let Packet { event, payload } = packet;
        if event.kind != PacketKind::PackHeader || self.config.report_pack_headers {
            sink.packet(event)?;
        }
        if let Some((stream, data)) = payload {
            if self.config.forwards(stream) {
                sink.payload(stream, data)?;
            }
        }
        Ok(())
    }

    fn dump_start_bytes(&self, offset: u64) -> Result<()> {
        let mut buf = [0u8; PES_DUMP_BYTES];
        let n = self.reader.read_at(&mut buf, offset)?;
        let hex = buf[..n].iter().map(|b| format!("{b:02x}")).collect::<Vec<_>>().join(" ");
        info!(offset, bytes = %hex, "PES start bytes");
        Ok(())
    }
}
