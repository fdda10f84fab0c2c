//! The closed family of array node variants: a `List`/`Value`-like enum
//! dispatched by `match`, widened from a couple of variants to the full
//! node family, with trait-free `match`-based dispatch rather than open
//! inheritance.

pub mod chunked;
pub mod indexed;
pub mod jagged;
pub mod leaf;
pub mod masked;
pub mod object;
pub mod table;
pub mod union_node;
pub mod virtual_node;

use crate::error::{CoreError, Result};
use crate::types::LogicalType;
use crate::value::Value;
use std::sync::Arc;

pub use chunked::{AppendableNode, ChunkedNode};
pub use indexed::{IndexedNode, SparseNode};
pub use jagged::JaggedNode;
pub use leaf::LeafNode;
pub use masked::{BitmaskedNode, BoolmaskedNode, IndexedMaskNode, MaskedWhen};
pub use object::{ObjectNode, StringNode};
pub use table::TableNode;
pub use union_node::UnionNode;
pub use virtual_node::VirtualNode;

/// Every node is a value sharing ownership of its children; cloning a
/// `NodeRef` is a refcount bump, never a data copy.
pub type NodeRef = Arc<Node>;

#[derive(Debug, Clone)]
pub enum Node {
    Leaf(LeafNode),
    Jagged(JaggedNode),
    Bitmasked(BitmaskedNode),
    Boolmasked(BoolmaskedNode),
    IndexedMask(IndexedMaskNode),
    Indexed(IndexedNode),
    Sparse(SparseNode),
    Table(TableNode),
    Union(UnionNode),
    Object(ObjectNode),
    Str(StringNode),
    Chunked(ChunkedNode),
    Appendable(AppendableNode),
    Virtual(VirtualNode),
}

impl Node {
    pub fn leaf(buffer: crate::buffer::Buffer) -> NodeRef {
        Arc::new(Node::Leaf(LeafNode::new(buffer)))
    }

    pub fn len(&self) -> usize {
        match self {
            Node::Leaf(n) => n.len(),
            Node::Jagged(n) => n.len(),
            Node::Bitmasked(n) => n.len(),
            Node::Boolmasked(n) => n.len(),
            Node::IndexedMask(n) => n.len(),
            Node::Indexed(n) => n.len(),
            Node::Sparse(n) => n.len(),
            Node::Table(n) => n.len(),
            Node::Union(n) => n.len(),
            Node::Object(n) => n.len(),
            Node::Str(n) => n.len(),
            Node::Chunked(n) => n.len(),
            Node::Appendable(n) => n.len(),
            Node::Virtual(n) => n.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Materialize logical element `i`, the building block `to_list` and
    /// `iter` share. Never a hot path; broadcasting and slicing never call
    /// this per-element on leaf buffers.
    pub fn get(&self, i: usize) -> Result<Value> {
        match self {
            Node::Leaf(n) => n.get(i),
            Node::Jagged(n) => n.get(i),
            Node::Bitmasked(n) => n.get(i),
            Node::Boolmasked(n) => n.get(i),
            Node::IndexedMask(n) => n.get(i),
            Node::Indexed(n) => n.get(i),
            Node::Sparse(n) => n.get(i),
            Node::Table(n) => n.get(i),
            Node::Union(n) => n.get(i),
            Node::Object(n) => n.get(i),
            Node::Str(n) => n.get(i),
            Node::Chunked(n) => n.get(i),
            Node::Appendable(n) => n.get(i),
            Node::Virtual(n) => n.materialize()?.get(i),
        }
    }

    pub fn node_type(&self) -> LogicalType {
        match self {
            Node::Leaf(n) => n.node_type(),
            Node::Jagged(n) => n.node_type(),
            Node::Bitmasked(n) => n.node_type(),
            Node::Boolmasked(n) => n.node_type(),
            Node::IndexedMask(n) => n.node_type(),
            Node::Indexed(n) => n.node_type(),
            Node::Sparse(n) => n.node_type(),
            Node::Table(n) => n.node_type(),
            Node::Union(n) => n.node_type(),
            Node::Object(n) => n.node_type(),
            Node::Str(n) => n.node_type(),
            Node::Chunked(n) => n.node_type(),
            Node::Appendable(n) => n.node_type(),
            Node::Virtual(n) => n.node_type(),
        }
    }

    /// Nested ordinary values, for test/debug only.
    pub fn to_list(&self) -> Result<Vec<Value>> {
        (0..self.len()).map(|i| self.get(i)).collect()
    }

    pub fn iter(&self) -> NodeIter<'_> {
        NodeIter {
            node: self,
            pos: 0,
            len: self.len(),
        }
    }

    /// True when `self` is a jagged-of-table (possibly masked), used by the
    /// indexing algebra's field-projection fall-through.
    pub fn as_table_through_jagged(&self) -> Option<&TableNode> {
        match self {
            Node::Table(t) => Some(t),
            _ => None,
        }
    }
}

/// Lazy in-order traversal; each `next()` materializes one more element on
/// demand rather than eagerly building the whole `Vec` `to_list` returns.
pub struct NodeIter<'a> {
    node: &'a Node,
    pos: usize,
    len: usize,
}

impl<'a> Iterator for NodeIter<'a> {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.len {
            return None;
        }
        let out = self.node.get(self.pos);
        self.pos += 1;
        Some(out)
    }
}

/// Generic row-axis `[start, stop)` slice, dispatched per variant. Shares
/// buffers with the parent wherever the variant allows it (views, not
/// copies) rather than materializing a full gather.
pub fn slice_node(node: &NodeRef, start: usize, stop: usize) -> Result<NodeRef> {
    if start > stop || stop > node.len() {
        return Err(CoreError::OutOfBounds {
            index: stop as i64,
            len: node.len(),
        });
    }
    match node.as_ref() {
        Node::Leaf(n) => Ok(Arc::new(Node::Leaf(n.slice(start, stop)?))),
        Node::Jagged(n) => Ok(Arc::new(Node::Jagged(JaggedNode::new(
            n.starts[start..stop].to_vec(),
            n.stops[start..stop].to_vec(),
            Arc::clone(&n.content),
        )?))),
        Node::Indexed(n) => Ok(Arc::new(Node::Indexed(IndexedNode::new(
            n.index[start..stop].to_vec(),
            Arc::clone(&n.content),
        )?))),
        Node::Table(n) => {
            let mut fields = Vec::with_capacity(n.fields.len());
            for (name, child) in &n.fields {
                fields.push((name.clone(), slice_node(child, start, stop)?));
            }
            Ok(Arc::new(Node::Table(TableNode::new(fields)?)))
        }
        Node::Boolmasked(n) => Ok(Arc::new(Node::Boolmasked(BoolmaskedNode::new(
            n.mask[start..stop].to_vec(),
            slice_node(&n.content, start, stop)?,
            n.masked_when,
        )?))),
        Node::Union(n) => Ok(Arc::new(Node::Union(UnionNode::new(
            n.tags[start..stop].to_vec(),
            n.index[start..stop].to_vec(),
            n.contents.clone(),
        )?))),
        Node::Chunked(n) => n.slice(start, stop),
        Node::Virtual(n) => slice_node(&n.materialize()?, start, stop),
        _ => {
            // Fall back to an index-based gather for variants without a
            // cheaper structural slice (bitmasked/indexed-mask/sparse/
            // object/string/appendable).
            let idx: Vec<usize> = (start..stop).collect();
            take_node(node, &idx)
        }
    }
}

/// Generic gather `out[j] = node[index[j]]`, dispatched per variant; this
/// always produces a new index array but never copies leaf data it does
/// not have to.
pub fn take_node(node: &NodeRef, index: &[usize]) -> Result<NodeRef> {
    for &i in index {
        if i >= node.len() {
            return Err(CoreError::OutOfBounds {
                index: i as i64,
                len: node.len(),
            });
        }
    }
    match node.as_ref() {
        Node::Leaf(n) => Ok(Arc::new(Node::Leaf(n.take(index)?))),
        Node::Jagged(n) => {
            let starts: Vec<i64> = index.iter().map(|&i| n.starts[i]).collect();
            let stops: Vec<i64> = index.iter().map(|&i| n.stops[i]).collect();
            Ok(Arc::new(Node::Jagged(JaggedNode::new(
                starts,
                stops,
                Arc::clone(&n.content),
            )?)))
        }
        Node::Indexed(n) => {
            let gathered: Vec<i64> = index.iter().map(|&i| n.index[i]).collect();
            Ok(Arc::new(Node::Indexed(IndexedNode::new(
                gathered,
                Arc::clone(&n.content),
            )?)))
        }
        Node::Table(n) => {
            let mut fields = Vec::with_capacity(n.fields.len());
            for (name, child) in &n.fields {
                fields.push((name.clone(), take_node(child, index)?));
            }
            Ok(Arc::new(Node::Table(TableNode::new(fields)?)))
        }
        Node::Union(n) => {
            let tags: Vec<u8> = index.iter().map(|&i| n.tags[i]).collect();
            let idxs: Vec<i64> = index.iter().map(|&i| n.index[i]).collect();
            Ok(Arc::new(Node::Union(UnionNode::new(
                tags,
                idxs,
                n.contents.clone(),
            )?)))
        }
        Node::Boolmasked(n) => {
            let mask: Vec<bool> = index.iter().map(|&i| n.mask[i]).collect();
            let content = take_node(&n.content, index)?;
            Ok(Arc::new(Node::Boolmasked(BoolmaskedNode::new(
                mask,
                content,
                n.masked_when,
            )?)))
        }
        Node::Virtual(n) => take_node(&n.materialize()?, index),
        _ => {
            // General fallback: materialize each selected element as a
            // `Value` and rebuild via the heterogeneous-iterable
            // constructor. Correct for every variant, just not as sharing
            // as a dedicated structural gather.
            let values: Result<Vec<Value>> = index.iter().map(|&i| node.get(i)).collect();
            crate::from_iter::from_values(values?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Buffer;

    #[test]
    fn leaf_iter_is_lazy_and_total() {
        let n = Node::leaf(Buffer::from_i64_vec(vec![1, 2, 3]));
        let collected: Result<Vec<Value>> = n.iter().collect();
        assert_eq!(collected.unwrap(), vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
    }
}
