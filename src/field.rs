//! Named, positional field decoding into an ordered tree.
//!
//! Packet syntax is bit-packed and not self-describing, so every table is an
//! ordered list of `(name, bits)` pairs read back-to-back. Loop bodies and
//! optional records become nested groups so the whole packet can be shown
//! as a tree after the fact.

use std::fmt;

use serde::Serialize;

use crate::bitreader::{BitReader, ByteSource};
use crate::error::{PsError, Result};

/// One entry of a field table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub bits: u32,
}

pub const fn field(name: &'static str, bits: u32) -> FieldSpec {
    FieldSpec { name, bits }
}

/// Decoded value (or group) with its children in decode order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldNode {
    pub name: &'static str,
    pub value: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FieldNode>,
}

impl FieldNode {
    pub fn new(name: &'static str, value: u64) -> Self {
        Self { name, value, children: Vec::new() }
    }

    /// First direct child called `name`.
    pub fn child(&self, name: &str) -> Option<&FieldNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Value of the first direct child called `name`.
    pub fn get(&self, name: &str) -> Option<u64> {
        self.child(name).map(|c| c.value)
    }

    /// Direct children called `name`, e.g. every entry of a loop.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FieldNode> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let pad = depth * 2;
        if self.children.is_empty() {
            writeln!(f, "{:pad$}{} : {:#x}", "", self.name, self.value)?;
        } else {
            writeln!(f, "{:pad$}{}", "", self.name)?;
        }
        for child in &self.children {
            child.fmt_indented(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for FieldNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}

/// Reads field tables from a [`BitReader`] into a [`FieldNode`] tree.
///
/// Groups opened with [`enter`](Self::enter) stay current until
/// [`leave`](Self::leave); `decode`, `read`, `set` and `get` all act on the
/// current group.
pub struct FieldDecoder<'r, S> {
    reader: &'r mut BitReader<S>,
    stack: Vec<FieldNode>,
}

impl<'r, S: ByteSource> FieldDecoder<'r, S> {
    pub fn new(reader: &'r mut BitReader<S>, root: &'static str, value: u64) -> Self {
        Self { reader, stack: vec![FieldNode::new(root, value)] }
    }

    /// Reads one field and records it.
    pub fn read(&mut self, name: &'static str, bits: u32) -> Result<u64> {
        let value = self.reader.read(bits)?;
        self.current_mut().children.push(FieldNode::new(name, value));
        Ok(value)
    }

    /// Reads every field of `spec` in declared order.
    pub fn decode(&mut self, spec: &[FieldSpec]) -> Result<()> {
        for f in spec {
            self.read(f.name, f.bits)?;
        }
        Ok(())
    }

    /// Decodes `spec` into a new child group and returns it.
    pub fn decode_nested(&mut self, group: &'static str, value: u64, spec: &[FieldSpec]) -> Result<&FieldNode> {
        self.enter(group, value);
        let res = self.decode(spec);
        self.leave();
        res?;
        self.current().children.last().ok_or(PsError::MissingField(group))
    }

    /// Records a derived value without reading bits.
    pub fn set(&mut self, name: &'static str, value: u64) {
        self.current_mut().children.push(FieldNode::new(name, value));
    }

    /// Looks up a field already decoded in the current group.
    pub fn get(&self, name: &'static str) -> Result<u64> {
        self.current().get(name).ok_or(PsError::MissingField(name))
    }

    pub fn peek(&mut self, bits: u32) -> Result<u64> {
        self.reader.peek(bits)
    }

    /// Discards `n` bytes (descriptors, stuffing) without recording them.
    pub fn skip_bytes(&mut self, n: u64) -> Result<()> {
        self.reader.skip_bytes(n)
    }

    pub fn enter(&mut self, group: &'static str, value: u64) {
        self.stack.push(FieldNode::new(group, value));
    }

    pub fn leave(&mut self) {
        if self.stack.len() > 1 {
            if let Some(done) = self.stack.pop() {
                self.current_mut().children.push(done);
            }
        }
    }

    pub fn offset(&self) -> u64 {
        self.reader.offset()
    }

    pub fn reader(&mut self) -> &mut BitReader<S> {
        &mut *self.reader
    }

    /// Closes any open groups and hands back the finished tree.
    pub fn finish(mut self) -> FieldNode {
        while self.stack.len() > 1 {
            self.leave();
        }
        self.stack.pop().unwrap_or_else(|| FieldNode::new("", 0))
    }

    fn current(&self) -> &FieldNode {
        // the root is never popped before `finish`
        &self.stack[self.stack.len() - 1]
    }

    fn current_mut(&mut self) -> &mut FieldNode {
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAIR: &[FieldSpec] = &[field("high", 4), field("low", 4)];

    #[test]
    fn decode_appends_in_order() {
        let data = [0xA5u8, 0xFF];
        let mut br = BitReader::new(&data[..]);
        let mut dec = FieldDecoder::new(&mut br, "root", 0);
        dec.decode(PAIR).unwrap();
        assert_eq!(dec.get("high").unwrap(), 0xA);
        assert_eq!(dec.get("low").unwrap(), 0x5);

        let tree = dec.finish();
        let names: Vec<_> = tree.children.iter().map(|c| c.name).collect();
        assert_eq!(names, ["high", "low"]);
    }

    #[test]
    fn get_is_stable_without_reads() {
        let data = [0x3Cu8];
        let mut br = BitReader::new(&data[..]);
        let mut dec = FieldDecoder::new(&mut br, "root", 0);
        dec.decode(PAIR).unwrap();
        for _ in 0..3 {
            assert_eq!(dec.get("high").unwrap(), 0x3);
        }
        assert!(matches!(dec.get("absent"), Err(PsError::MissingField("absent"))));
    }

    #[test]
    fn nested_groups_are_scoped() {
        let data = [0x12u8, 0x34, 0x56];
        let mut br = BitReader::new(&data[..]);
        let mut dec = FieldDecoder::new(&mut br, "root", 0);
        dec.read("lead", 8).unwrap();
        let entry = dec.decode_nested("entry", 0, PAIR).unwrap();
        assert_eq!(entry.get("high"), Some(0x3));
        dec.decode_nested("entry", 1, PAIR).unwrap();

        // group fields are not visible from the parent
        assert!(dec.get("high").is_err());
        let tree = dec.finish();
        assert_eq!(tree.children_named("entry").count(), 2);
        assert_eq!(tree.children[2].get("low"), Some(0x6));
    }

    #[test]
    fn finish_closes_open_groups() {
        let data = [0xFFu8];
        let mut br = BitReader::new(&data[..]);
        let mut dec = FieldDecoder::new(&mut br, "root", 7);
        dec.enter("group", 0);
        dec.set("derived", 42);
        let tree = dec.finish();
        assert_eq!(tree.value, 7);
        assert_eq!(tree.child("group").and_then(|g| g.get("derived")), Some(42));
    }

    #[test]
    fn failed_nested_decode_keeps_partial_group() {
        let data = [0xF0u8];
        let mut br = BitReader::new(&data[..]);
        let mut dec = FieldDecoder::new(&mut br, "root", 0);
        let spec = [field("a", 8), field("b", 8)];
        assert!(dec.decode_nested("entry", 0, &spec).is_err());
        let tree = dec.finish();
        assert_eq!(tree.child("entry").and_then(|e| e.get("a")), Some(0xF0));
    }

    #[test]
    fn display_indents_children() {
        let mut root = FieldNode::new("pack_header", 0);
        let mut group = FieldNode::new("entry", 0);
        group.children.push(FieldNode::new("stream_type", 0x1B));
        root.children.push(FieldNode::new("fixed", 1));
        root.children.push(group);
        assert_eq!(root.to_string(), "pack_header\n  fixed : 0x1\n  entry\n    stream_type : 0x1b\n");
    }
}
