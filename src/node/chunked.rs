//! Chunked and appendable nodes: a concatenation of same-typed pieces
//! addressed by cumulative count, and a growing tail chunk that seals into
//! an ordinary chunk past a threshold.

use crate::error::{CoreError, Result};
use crate::node::NodeRef;
use crate::types::LogicalType;
use crate::value::Value;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ChunkedNode {
    pub chunks: Vec<NodeRef>,
    /// Cumulative element counts; `cumulative[i]` is the first global index
    /// of `chunks[i]`, with a trailing total at the end.
    cumulative: Vec<usize>,
}

impl ChunkedNode {
    pub fn new(chunks: Vec<NodeRef>) -> ChunkedNode {
        let mut cumulative = Vec::with_capacity(chunks.len() + 1);
        let mut total = 0usize;
        cumulative.push(0);
        for c in &chunks {
            total += c.len();
            cumulative.push(total);
        }
        ChunkedNode { chunks, cumulative }
    }

    pub fn len(&self) -> usize {
        *self.cumulative.last().unwrap_or(&0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maps a global index to `(chunk index, offset within chunk)` via
    /// binary search over `cumulative`.
    fn locate(&self, i: usize) -> (usize, usize) {
        let chunk = match self.cumulative.binary_search(&i) {
            Ok(pos) if pos < self.chunks.len() => pos,
            Ok(pos) => pos - 1,
            Err(pos) => pos - 1,
        };
        (chunk, i - self.cumulative[chunk])
    }

    pub fn get(&self, i: usize) -> Result<Value> {
        if i >= self.len() {
            return Err(CoreError::OutOfBounds {
                index: i as i64,
                len: self.len(),
            });
        }
        let (chunk, offset) = self.locate(i);
        self.chunks[chunk].get(offset)
    }

    pub fn node_type(&self) -> LogicalType {
        self.chunks
            .first()
            .map(|c| c.node_type())
            .unwrap_or(LogicalType::Sum(vec![]))
    }

    /// Row-axis slice across chunk boundaries; chunks fully inside
    /// `[start, stop)` are shared, boundary chunks are sliced down.
    pub fn slice(&self, start: usize, stop: usize) -> Result<NodeRef> {
        if start > stop || stop > self.len() {
            return Err(CoreError::OutOfBounds {
                index: stop as i64,
                len: self.len(),
            });
        }
        if start == stop {
            return Ok(Arc::new(crate::node::Node::Chunked(ChunkedNode::new(vec![]))));
        }
        let (start_chunk, start_offset) = self.locate(start);
        let (stop_chunk_inclusive, stop_offset) = self.locate(stop - 1);
        let mut pieces = Vec::new();
        for c in start_chunk..=stop_chunk_inclusive {
            let chunk = &self.chunks[c];
            let lo = if c == start_chunk { start_offset } else { 0 };
            let hi = if c == stop_chunk_inclusive { stop_offset + 1 } else { chunk.len() };
            pieces.push(crate::node::slice_node(chunk, lo, hi)?);
        }
        Ok(Arc::new(crate::node::Node::Chunked(ChunkedNode::new(pieces))))
    }
}

/// A chunked node whose last chunk is still growing; once it reaches
/// `seal_at` elements it is sealed off and a fresh empty tail is started.
#[derive(Debug, Clone)]
pub struct AppendableNode {
    pub sealed: ChunkedNode,
    pub tail: Vec<Value>,
    pub seal_at: usize,
}

impl AppendableNode {
    pub fn new(seal_at: usize) -> AppendableNode {
        AppendableNode {
            sealed: ChunkedNode::new(vec![]),
            tail: Vec::new(),
            seal_at,
        }
    }

    pub fn len(&self) -> usize {
        self.sealed.len() + self.tail.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, i: usize) -> Result<Value> {
        if i < self.sealed.len() {
            self.sealed.get(i)
        } else {
            self.tail
                .get(i - self.sealed.len())
                .cloned()
                .ok_or(CoreError::OutOfBounds {
                    index: i as i64,
                    len: self.len(),
                })
        }
    }

    pub fn node_type(&self) -> LogicalType {
        if self.sealed.len() > 0 {
            self.sealed.node_type()
        } else if let Some(first) = self.tail.first() {
            crate::from_iter::infer_value_type(first)
        } else {
            LogicalType::Sum(vec![])
        }
    }

    /// Appends a value, sealing the tail into `sealed` once it reaches
    /// `seal_at` (a TODO since seal-on-threshold never triggers mid-append
    /// of a single batch larger than `seal_at`, only between calls).
    pub fn push(&mut self, value: Value) -> Result<()> {
        self.tail.push(value);
        if self.tail.len() >= self.seal_at {
            self.seal()?;
        }
        Ok(())
    }

    pub fn seal(&mut self) -> Result<()> {
        if self.tail.is_empty() {
            return Ok(());
        }
        let values = std::mem::take(&mut self.tail);
        let node = crate::from_iter::from_values(values)?;
        let mut chunks = self.sealed.chunks.clone();
        chunks.push(node);
        self.sealed = ChunkedNode::new(chunks);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Buffer;
    use crate::node::Node;

    fn leaf(v: Vec<f64>) -> NodeRef {
        Node::leaf(Buffer::from_f64_vec(v))
    }

    #[test]
    fn chunked_locates_global_index_across_chunks() {
        let c = ChunkedNode::new(vec![leaf(vec![1.0, 2.0]), leaf(vec![3.0, 4.0, 5.0])]);
        assert_eq!(c.len(), 5);
        assert_eq!(c.get(0).unwrap(), Value::Float(1.0));
        assert_eq!(c.get(2).unwrap(), Value::Float(3.0));
        assert_eq!(c.get(4).unwrap(), Value::Float(5.0));
    }

    #[test]
    fn chunked_slice_spans_chunk_boundary() {
        let c = ChunkedNode::new(vec![leaf(vec![1.0, 2.0]), leaf(vec![3.0, 4.0, 5.0])]);
        let sliced = c.slice(1, 4).unwrap();
        assert_eq!(
            sliced.to_list().unwrap(),
            vec![Value::Float(2.0), Value::Float(3.0), Value::Float(4.0)]
        );
    }

    #[test]
    fn appendable_seals_once_threshold_reached() {
        let mut a = AppendableNode::new(2);
        a.push(Value::Int(1)).unwrap();
        assert_eq!(a.sealed.len(), 0);
        a.push(Value::Int(2)).unwrap();
        assert_eq!(a.sealed.len(), 2);
        assert_eq!(a.get(1).unwrap(), Value::Int(2));
    }
}
