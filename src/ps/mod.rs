//! MPEG Program Stream demultiplexing
//!
//! Packets are delimited by 32-bit start codes and decoded one after the
//! other; the layout of each is only known after reading the previous one.

pub mod demuxer;
pub mod detail;
pub mod headers;
pub mod packet;
pub mod pes;
pub mod psm;
pub mod resync;

pub use demuxer::{Demuxer, Packet};
pub use detail::{parse_detail, parse_detail_at};
pub use packet::{PacketEvent, PacketKind, PacketStatus, StreamKind};
