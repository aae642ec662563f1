//! Packet kinds, statuses and the events reported per packet.

use std::fmt;

use serde::Serialize;

use crate::constants::*;
use crate::field::FieldNode;

/// PS packet kind selected by the 32-bit start code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PacketKind {
    PackHeader,
    SystemHeader,
    ProgramStreamMap,
    VideoPes,
    AudioPes,
}

impl PacketKind {
    pub fn from_start_code(code: u32) -> Option<Self> {
        match code {
            START_CODE_PACK => Some(Self::PackHeader),
            START_CODE_SYSTEM => Some(Self::SystemHeader),
            START_CODE_PSM => Some(Self::ProgramStreamMap),
            START_CODE_VIDEO => Some(Self::VideoPes),
            START_CODE_AUDIO => Some(Self::AudioPes),
            _ => None,
        }
    }

    pub fn start_code(self) -> u32 {
        match self {
            Self::PackHeader => START_CODE_PACK,
            Self::SystemHeader => START_CODE_SYSTEM,
            Self::ProgramStreamMap => START_CODE_PSM,
            Self::VideoPes => START_CODE_VIDEO,
            Self::AudioPes => START_CODE_AUDIO,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::PackHeader => "pack header",
            Self::SystemHeader => "system header",
            Self::ProgramStreamMap => "program stream map",
            Self::VideoPes => "video pes",
            Self::AudioPes => "audio pes",
        }
    }

    /// Root name of the field tree decoded for this kind.
    pub(crate) fn tree_root(self) -> &'static str {
        match self {
            Self::PackHeader => "pack_header",
            Self::SystemHeader => "system_header",
            Self::ProgramStreamMap => "program_stream_map",
            Self::VideoPes | Self::AudioPes => "PES_packet",
        }
    }

    pub fn stream_kind(self) -> Option<StreamKind> {
        match self {
            Self::VideoPes => Some(StreamKind::Video),
            Self::AudioPes => Some(StreamKind::Audio),
            _ => None,
        }
    }
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

pub fn is_known_start_code(code: u32) -> bool {
    KNOWN_START_CODES.contains(&code)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PacketStatus {
    #[serde(rename = "OK")]
    Ok,
    Error,
}

impl fmt::Display for PacketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Self::Ok => "OK",
            Self::Error => "Error",
        })
    }
}

/// Elementary stream a payload belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StreamKind {
    Video,
    Audio,
}

/// One classified packet, as handed to the sink.
#[derive(Debug, Clone, Serialize)]
pub struct PacketEvent {
    /// Byte position of the start code.
    pub offset: u64,
    pub kind: PacketKind,
    pub status: PacketStatus,
    /// Bytes consumed from the start code up to the next packet.
    pub size: u64,
    pub fields: FieldNode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
