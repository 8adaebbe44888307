use crate::message::{Header, MessageType};

/// Reassembly buffer for one handshake message, addressed by
/// `(message_seq, total length)`.
///
/// Fragments may arrive in any order and may overlap; overlapping bytes
/// overwrite. The message is complete once the coverage intervals merge
/// into a single `[0, total_length)` span.
pub(crate) struct FragmentBuffer {
    msg_type: MessageType,
    total_length: usize,
    data: Vec<u8>,
    /// Sorted, disjoint coverage intervals (end exclusive).
    ranges: Vec<(usize, usize)>,
}

impl FragmentBuffer {
    pub fn new(header: &Header) -> Self {
        let total_length = header.length as usize;
        FragmentBuffer {
            msg_type: header.msg_type,
            total_length,
            data: vec![0; total_length],
            ranges: Vec::new(),
        }
    }

    pub fn msg_type(&self) -> MessageType {
        self.msg_type
    }

    /// Add one fragment. Returns false when the fragment contradicts the
    /// message this buffer was created for (different type or total
    /// length, or out-of-bounds coverage); such fragments are dropped.
    pub fn add(&mut self, header: &Header, body: &[u8]) -> bool {
        let offset = header.fragment_offset as usize;

        if header.msg_type != self.msg_type
            || header.length as usize != self.total_length
            || body.len() != header.fragment_length as usize
            || offset + body.len() > self.total_length
        {
            return false;
        }

        self.data[offset..offset + body.len()].copy_from_slice(body);
        self.insert_range(offset, offset + body.len());
        true
    }

    fn insert_range(&mut self, start: usize, end: usize) {
        if start == end {
            // Zero-length fragment (e.g. ServerHelloDone-style empty body).
            if self.total_length == 0 && self.ranges.is_empty() {
                self.ranges.push((0, 0));
            }
            return;
        }

        self.ranges.push((start, end));
        self.ranges.sort_unstable();

        let mut merged: Vec<(usize, usize)> = Vec::with_capacity(self.ranges.len());
        for &(s, e) in self.ranges.iter() {
            match merged.last_mut() {
                Some(last) if s <= last.1 => last.1 = last.1.max(e),
                _ => merged.push((s, e)),
            }
        }
        self.ranges = merged;
    }

    pub fn is_complete(&self) -> bool {
        if self.total_length == 0 {
            return !self.ranges.is_empty();
        }
        matches!(self.ranges.as_slice(), [(0, end)] if *end == self.total_length)
    }

    /// The reassembled body, once complete.
    pub fn body(&self) -> &[u8] {
        debug_assert!(self.is_complete());
        &self.data
    }
}
