use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::bitreader::{ByteSource, FileSource};
use crate::error::PsError;
use crate::field::FieldNode;
use crate::ps::{parse_detail_at, Demuxer, PacketKind, StreamKind};
use crate::report::{Reporter, RunReport};
use crate::sink::{ChannelSink, PacketSink, SinkEvent};
use crate::stats::RunStats;
use crate::types::{DemuxConfig, Options};
use crate::writer::EsWriter;

/// Demuxes `opts.file` on a blocking task while this task drains the event
/// queue: one table row per packet, payloads to the dump files.
///
/// The summary is logged whether the demux completed, failed or was
/// cancelled with Ctrl-C; only setup and dump-file errors end in `Err`.
pub async fn run(opts: Options) -> anyhow::Result<RunReport> {
    let source = FileSource::open(&opts.file)
        .with_context(|| format!("opening {}", opts.file.display()))?;

    let mut writer = EsWriter::new();
    if opts.dump_video {
        writer
            .open(StreamKind::Video, &opts.output_video)
            .await
            .with_context(|| format!("creating {}", opts.output_video.display()))?;
    }
    if opts.dump_audio {
        writer
            .open(StreamKind::Audio, &opts.output_audio)
            .await
            .with_context(|| format!("creating {}", opts.output_audio.display()))?;
    }

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let (sink, mut rx) = ChannelSink::channel(opts.queue_capacity);
    let config = opts.demux_config();
    let demux_cancel = cancel.clone();
    let producer = tokio::task::spawn_blocking(move || {
        let mut sink = sink;
        demux_to_end(source, config, &mut sink, &demux_cancel)
    });

    println!("{:>12}  {:<20} {}", "offset", "type", "status");
    let mut write_error = None;
    while let Some(event) = rx.recv().await {
        match event {
            SinkEvent::Packet(ev) => {
                println!("{:>12}  {:<20} {}", ev.offset, ev.kind, ev.status);
                if let Some(err) = &ev.error {
                    debug!(offset = ev.offset, %err, "packet error");
                }
            }
            SinkEvent::Payload(stream, data) => {
                if write_error.is_some() {
                    continue;
                }
                if let Err(e) = writer.write(stream, &data).await {
                    error!(?stream, %e, "elementary stream write failed, stopping");
                    write_error = Some(e);
                    cancel.cancel();
                }
            }
        }
    }

    let (stats, result) = producer.await.context("demux task failed")?;
    ctrl_c.abort();
    let flushed = writer.finish().await;

    let report = Reporter::create_report(&opts.file.display().to_string(), stats, &result);
    Reporter::log_summary(&report);
    if opts.json {
        println!("{}", Reporter::generate_json_report(&report));
    }

    if let Some(e) = write_error {
        return Err(e).context("writing elementary stream");
    }
    flushed.context("flushing elementary streams")?;
    for (stream, enabled, path) in [
        (StreamKind::Video, opts.dump_video, &opts.output_video),
        (StreamKind::Audio, opts.dump_audio, &opts.output_audio),
    ] {
        if enabled {
            info!(?stream, bytes = writer.written(stream), path = %path.display(), "elementary stream dumped");
        }
    }
    Ok(report)
}

/// Runs a demuxer over `source` until it stops. A panic in a decoder is
/// turned into [`PsError::Aborted`] so the counters still reach the report.
fn demux_to_end<S: ByteSource, K: PacketSink>(
    source: S,
    config: DemuxConfig,
    sink: &mut K,
    cancel: &CancellationToken,
) -> (RunStats, Result<(), PsError>) {
    let mut demux = Demuxer::new(source, config);
    let result = catch_unwind(AssertUnwindSafe(|| demux.run(sink, cancel))).unwrap_or_else(|panic| {
        let reason = panic_message(panic.as_ref());
        error!(offset = demux.offset(), %reason, "demux panicked");
        Err(PsError::Aborted(reason))
    });
    (demux.into_stats(), result)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Decodes the packet at `offset` of `path` into its field tree.
pub fn detail(path: &Path, offset: u64) -> anyhow::Result<(PacketKind, FieldNode)> {
    let source = FileSource::open(path).with_context(|| format!("opening {}", path.display()))?;
    parse_detail_at(source, offset).with_context(|| format!("decoding packet at byte {offset}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ps::PacketEvent;
    use bytes::Bytes;

    struct ExplodingSink;

    impl PacketSink for ExplodingSink {
        fn packet(&mut self, event: PacketEvent) -> crate::Result<()> {
            panic!("cannot take packet at {}", event.offset);
        }

        fn payload(&mut self, _: StreamKind, _: Bytes) -> crate::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn panic_keeps_counters_and_fails_the_run() {
        let data = vec![0x00, 0x00, 0x01, 0xC0, 0x00, 0x04, 0x80, 0x00, 0x00, 0x11];
        let (stats, result) =
            demux_to_end(data, DemuxConfig::default(), &mut ExplodingSink, &CancellationToken::new());
        assert_eq!(stats.packet_count, 1);
        assert_eq!(stats.total_audio_frames, 1);
        let err = result.unwrap_err();
        assert!(matches!(&err, PsError::Aborted(msg) if msg == "cannot take packet at 0"));

        let report = Reporter::create_report("a.ps", stats, &Err(err));
        assert_eq!(report.outcome, crate::report::Outcome::Failed);
        assert!(report.error.unwrap().starts_with("demux aborted"));
    }
}
