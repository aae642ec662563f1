//! Elementary stream dump files.

use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::ps::packet::StreamKind;

/// Appends bounded PES payloads to per-stream files.
///
/// A stream whose file was not opened is silently dropped.
#[derive(Debug, Default)]
pub struct EsWriter {
    video: Option<BufWriter<File>>,
    audio: Option<BufWriter<File>>,
    written: [u64; 2],
}

impl EsWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates (truncating) the dump file for `stream`.
    pub async fn open(&mut self, stream: StreamKind, path: &Path) -> std::io::Result<()> {
        let file = BufWriter::new(File::create(path).await?);
        match stream {
            StreamKind::Video => self.video = Some(file),
            StreamKind::Audio => self.audio = Some(file),
        }
        Ok(())
    }

    pub async fn write(&mut self, stream: StreamKind, data: &[u8]) -> std::io::Result<()> {
        let (slot, idx) = match stream {
            StreamKind::Video => (&mut self.video, 0),
            StreamKind::Audio => (&mut self.audio, 1),
        };
        if let Some(out) = slot {
            out.write_all(data).await?;
            self.written[idx] += data.len() as u64;
        }
        Ok(())
    }

    /// Bytes written so far for `stream`.
    pub fn written(&self, stream: StreamKind) -> u64 {
        match stream {
            StreamKind::Video => self.written[0],
            StreamKind::Audio => self.written[1],
        }
    }

    pub async fn finish(&mut self) -> std::io::Result<()> {
        for out in [&mut self.video, &mut self.audio].into_iter().flatten() {
            out.flush().await?;
        }
        Ok(())
    }
}
