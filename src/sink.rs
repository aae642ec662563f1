//! Packet event sinks: where the demuxer pushes packets and payloads.

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::{PsError, Result};
use crate::ps::packet::{PacketEvent, StreamKind};

/// Receiver of demuxer output, in stream order.
pub trait PacketSink {
    fn packet(&mut self, event: PacketEvent) -> Result<()>;

    /// Elementary stream bytes of a PES packet whose length checked out.
    fn payload(&mut self, stream: StreamKind, data: Bytes) -> Result<()>;
}

impl<T: PacketSink + ?Sized> PacketSink for &mut T {
    fn packet(&mut self, event: PacketEvent) -> Result<()> {
        (**self).packet(event)
    }

    fn payload(&mut self, stream: StreamKind, data: Bytes) -> Result<()> {
        (**self).payload(stream, data)
    }
}

/// Message carried by the event queue.
#[derive(Debug, Clone)]
pub enum SinkEvent {
    Packet(PacketEvent),
    Payload(StreamKind, Bytes),
}

/// Bounded queue producer; sends block while the queue is full.
///
/// Must be driven from a blocking context (`spawn_blocking` or a plain
/// thread), never from inside an async task.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<SinkEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<SinkEvent>) -> Self {
        Self { tx }
    }

    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<SinkEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    fn send(&self, event: SinkEvent) -> Result<()> {
        self.tx.blocking_send(event).map_err(|_| PsError::SinkClosed)
    }
}

impl PacketSink for ChannelSink {
    fn packet(&mut self, event: PacketEvent) -> Result<()> {
        self.send(SinkEvent::Packet(event))
    }

    fn payload(&mut self, stream: StreamKind, data: Bytes) -> Result<()> {
        self.send(SinkEvent::Payload(stream, data))
    }
}

/// Keeps everything in memory.
#[derive(Debug, Default)]
pub struct CollectSink {
    pub events: Vec<PacketEvent>,
    pub payloads: Vec<(StreamKind, Bytes)>,
}

impl CollectSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PacketSink for CollectSink {
    fn packet(&mut self, event: PacketEvent) -> Result<()> {
        self.events.push(event);
        Ok(())
    }

    fn payload(&mut self, stream: StreamKind, data: Bytes) -> Result<()> {
        self.payloads.push((stream, data));
        Ok(())
    }
}
