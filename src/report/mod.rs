//! Run summary: log lines and the JSON report

use serde::Serialize;
use tracing::info;

use crate::error::PsError;
use crate::parsers::SpsInfo;
use crate::stats::RunStats;

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Completed,
    Cancelled,
    Failed,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Completed => "completed",
            Outcome::Cancelled => "cancelled",
            Outcome::Failed => "failed",
        }
    }
}

/// Outcome of a finished run (public API)
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub timestamp: String,
    pub file: String,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub stats: RunStats,
}

/// JSON structure for a resolved stream (internal serialization)
#[derive(Serialize)]
struct StreamJson<'a> {
    stream_type: u8,
    codec: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sps: Option<&'a SpsInfo>,
}

/// JSON structure for the complete report (internal serialization)
#[derive(Serialize)]
struct ReportJson<'a> {
    ps_time: &'a str,
    file: &'a str,
    outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    video: Option<StreamJson<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    audio: Option<StreamJson<'a>>,
    counters: &'a RunStats,
}

/// Report generator for demux runs
pub struct Reporter;

impl Reporter {
    pub fn create_report(file: &str, stats: RunStats, result: &Result<(), PsError>) -> RunReport {
        let (outcome, error) = match result {
            Ok(()) => (Outcome::Completed, None),
            Err(PsError::Cancelled) => (Outcome::Cancelled, None),
            Err(e) => (Outcome::Failed, Some(e.to_string())),
        };
        RunReport {
            timestamp: chrono::Utc::now().to_rfc3339(),
            file: file.to_string(),
            outcome,
            error,
            stats,
        }
    }

    /// Logs the counters, one line per concern.
    pub fn log_summary(report: &RunReport) {
        let s = &report.stats;
        info!(file = %report.file, outcome = report.outcome.as_str(), packets = s.packet_count, "demux finished");
        if let Some(err) = &report.error {
            info!(error = %err, "run stopped early");
        }
        info!(
            total = s.total_video_frames,
            errors = s.err_video_frames,
            i_frames = s.i_frames,
            err_i_frames = s.err_i_frames,
            p_frames = s.p_frames,
            sps = s.sps_count,
            pps = s.pps_count,
            "video frames"
        );
        info!(total = s.total_audio_frames, errors = s.err_audio_frames, "audio frames");
        info!(
            psm = s.psm_count,
            video_type = %stream_type_label(s.video_stream_type),
            audio_type = %stream_type_label(s.audio_stream_type),
            discarded = s.bytes_discarded,
            "streams"
        );
        if let Some(v) = &s.video {
            info!(
                profile = v.profile_idc,
                level = v.level_idc,
                "{}x{} {}{}",
                v.width,
                v.height,
                v.chroma,
                if v.interlaced { " interlaced" } else { "" }
            );
        }
    }

    /// Pretty-printed JSON for CLI output
    pub fn generate_json_report(report: &RunReport) -> String {
        let s = &report.stats;
        let rep = ReportJson {
            ps_time: &report.timestamp,
            file: &report.file,
            outcome: report.outcome,
            error: report.error.as_deref(),
            video: s.video_stream_type.map(|t| StreamJson {
                stream_type: t,
                codec: stream_type_name(t),
                sps: s.video.as_ref(),
            }),
            audio: s.audio_stream_type.map(|t| StreamJson {
                stream_type: t,
                codec: stream_type_name(t),
                sps: None,
            }),
            counters: s,
        };
        serde_json::to_string_pretty(&rep)
            .unwrap_or_else(|_| "{\"error\": \"JSON serialization failed\"}".to_string())
    }
}

/// Codec name for a program stream map stream_type
pub fn stream_type_name(st: u8) -> &'static str {
    match st {
        0x01 => "MPEG-1",
        0x02 => "MPEG-2",
        0x03 | 0x04 => "MP2",
        0x0F => "AAC",
        0x10 => "MPEG-4",
        0x1B => "H.264",
        0x24 => "HEVC",
        0x80 => "SVAC",
        0x90 => "G.711",
        0x92 => "G.722.1",
        0x93 => "G.723.1",
        0x99 => "G.729",
        _ => "unk",
    }
}

fn stream_type_label(st: Option<u8>) -> String {
    match st {
        Some(t) => format!("{t:#04x} ({})", stream_type_name(t)),
        None => "none".to_string(),
    }
}
