//! Error taxonomy for bit reading and PS demultiplexing.

use thiserror::Error;

/// Every failure the reader, the field model and the demuxer can raise.
#[derive(Debug, Error)]
pub enum PsError {
    /// More than 64 bits requested from the bit window.
    #[error("bit request of {0} exceeds 64 bits")]
    RequestTooLong(u32),

    /// Source exhausted in the middle of a read.
    #[error("unexpected end of data at byte {offset}")]
    UnexpectedEndOfData { offset: u64 },

    /// Byte-oriented access while bits of a partial byte are still pending.
    #[error("reader is not byte aligned ({pending} bits pending)")]
    Misaligned { pending: u32 },

    #[error("unknown start code {code:#010x} at byte {offset}")]
    UnknownStartCode { code: u32, offset: u64 },

    /// A stream map entry claims more bytes than the map has left.
    #[error("stream map entry needs {needed} bytes but only {remaining} remain")]
    CheckLength { needed: u64, remaining: u64 },

    /// Program stream map lengths do not leave exactly the 4-byte CRC.
    #[error("program stream map length mismatch: {remaining} bytes left for CRC_32, expected 4")]
    FormatMismatch { remaining: i64 },

    /// Declared PES payload length does not land on a start code.
    #[error("PES payload length invalid: declared {declared}, next start code after {actual}")]
    PayloadLengthInvalid { declared: u64, actual: u64 },

    #[error("field `{0}` was not decoded")]
    MissingField(&'static str),

    #[error("packet at byte {offset} is not a {expected}")]
    KindMismatch { offset: u64, expected: &'static str },

    #[error("packet sink closed")]
    SinkClosed,

    #[error("run cancelled")]
    Cancelled,

    /// A decoder panicked; the run stops with the counters gathered so far.
    #[error("demux aborted: {0}")]
    Aborted(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PsError {
    /// Only a lying PES length can be recovered from by resynchronizing.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, PsError::PayloadLengthInvalid { .. })
    }
}

pub type Result<T> = std::result::Result<T, PsError>;
