//! Elementary stream inspection
//!
//! Only H.264 video is looked into: NAL units are classified by type and
//! the first SPS of a run is parsed for picture parameters.

pub mod h264;
mod utils;

pub use h264::{parse_sps_payload, NalKind, SpsInfo};
