//! Structural element-wise dispatch: a binary kernel recurses down
//! matching node shapes to the leaf buffers, where it is finally delegated
//! to the external primitive library (`Buffer::binary`).

use crate::buffer::{BinOp, Buffer, Scalar};
use crate::error::{CoreError, Result};
use crate::node::{
    take_node, BitmaskedNode, BoolmaskedNode, ChunkedNode, IndexedMaskNode, IndexedNode,
    JaggedNode, LeafNode, Node, NodeRef, SparseNode, TableNode, UnionNode,
};
use std::sync::Arc;

/// Two-operand structural recursion. Both sides are resolved through
/// `Virtual`/`Chunked` wrappers before the shape match proceeds.
pub fn binary(op: BinOp, left: &NodeRef, right: &NodeRef) -> Result<NodeRef> {
    if let Node::Virtual(v) = left.as_ref() {
        return binary(op, &v.materialize()?, right);
    }
    if let Node::Virtual(v) = right.as_ref() {
        return binary(op, left, &v.materialize()?);
    }
    if let Node::Chunked(l) = left.as_ref() {
        return binary_chunked(op, l, right, true);
    }
    if let Node::Chunked(r) = right.as_ref() {
        return binary_chunked(op, r, left, false);
    }

    match (left.as_ref(), right.as_ref()) {
        (Node::Leaf(l), Node::Leaf(r)) => {
            Ok(Arc::new(Node::Leaf(LeafNode::new(l.buffer.binary(op, &r.buffer)?))))
        }
        (Node::Jagged(l), Node::Jagged(r)) => binary_jagged_jagged(op, l, r),
        (Node::Jagged(l), _) if right.len() == l.len() => binary_jagged_scalar_per_row(op, l, right, true),
        (_, Node::Jagged(r)) if left.len() == r.len() => binary_jagged_scalar_per_row(op, r, left, false),
        (Node::Table(l), Node::Table(r)) => binary_table(op, l, r),
        (Node::Union(l), Node::Union(r)) => binary_union(op, l, r),
        (Node::Indexed(l), _) => {
            let content = binary(op, &l.content, &expand_like_indexed(right, l)?)?;
            Ok(Arc::new(Node::Indexed(IndexedNode::new(l.index.clone(), content)?)))
        }
        (Node::Boolmasked(l), _) => binary_masked(op, l, right),
        (_, Node::Boolmasked(r)) => binary_masked_rhs(op, left, r),
        (left_node, right_node) if is_masked(left_node) || is_masked(right_node) => {
            Err(CoreError::UnsupportedConversion {
                reason: "mixed mask representations must be normalized to BoolMasked before a binary kernel".to_string(),
            })
        }
        _ => Err(CoreError::UnsupportedConversion {
            reason: format!(
                "no element-wise kernel between {} and {}",
                left.node_type(),
                right.node_type()
            ),
        }),
    }
}

fn is_masked(n: &Node) -> bool {
    matches!(n, Node::Bitmasked(_) | Node::IndexedMask(_))
}

fn expand_like_indexed(other: &NodeRef, l: &IndexedNode) -> Result<NodeRef> {
    if other.len() == l.content.len() {
        Ok(other.clone())
    } else {
        take_node(other, &l.index.iter().map(|&i| i as usize).collect::<Vec<_>>())
    }
}

fn binary_chunked(op: BinOp, chunked: &ChunkedNode, other: &NodeRef, chunked_is_left: bool) -> Result<NodeRef> {
    let mut results = Vec::with_capacity(chunked.chunks.len());
    let mut offset = 0usize;
    for chunk in &chunked.chunks {
        let other_slice = crate::node::slice_node(other, offset, offset + chunk.len())?;
        let result = if chunked_is_left {
            binary(op, chunk, &other_slice)?
        } else {
            binary(op, &other_slice, chunk)?
        };
        results.push(result);
        offset += chunk.len();
    }
    Ok(Arc::new(Node::Chunked(ChunkedNode::new(results))))
}

/// Jagged vs. jagged requires identical shape after compaction.
fn binary_jagged_jagged(op: BinOp, l: &JaggedNode, r: &JaggedNode) -> Result<NodeRef> {
    let lc = l.compact()?;
    let rc = r.compact()?;
    if lc.counts() != rc.counts() {
        return Err(CoreError::IncompatibleJagged {
            left_len: lc.len(),
            right_len: rc.len(),
        });
    }
    let content = binary(op, &lc.content, &rc.content)?;
    Ok(Arc::new(Node::Jagged(JaggedNode::new(
        lc.starts.clone(),
        lc.stops.clone(),
        content,
    )?)))
}

/// A jagged node combined with a flat per-row operand: the row value is
/// repeated across each row's content positions according to `parents`.
fn binary_jagged_scalar_per_row(op: BinOp, jagged: &JaggedNode, flat: &NodeRef, jagged_is_left: bool) -> Result<NodeRef> {
    let parents = jagged.parents();
    let expand_index: Vec<usize> = parents
        .iter()
        .filter(|&&p| p >= 0)
        .map(|&p| p as usize)
        .collect();
    let expanded = take_node(flat, &expand_index)?;
    let result = if jagged_is_left {
        binary(op, &jagged.content, &expanded)?
    } else {
        binary(op, &expanded, &jagged.content)?
    };
    Ok(Arc::new(Node::Jagged(JaggedNode::new(
        jagged.starts.clone(),
        jagged.stops.clone(),
        result,
    )?)))
}

fn binary_table(op: BinOp, l: &TableNode, r: &TableNode) -> Result<NodeRef> {
    let mut fields = Vec::new();
    for (name, lcol) in &l.fields {
        let rcol = r.field(name)?;
        fields.push((name.clone(), binary(op, lcol, &rcol)?));
    }
    Ok(Arc::new(Node::Table(TableNode::new(fields)?)))
}

fn binary_union(op: BinOp, l: &UnionNode, r: &UnionNode) -> Result<NodeRef> {
    if l.tags != r.tags {
        return Err(CoreError::UnsupportedConversion {
            reason: "union operands must share tag assignment for a binary kernel".to_string(),
        });
    }
    let contents: Result<Vec<NodeRef>> = l
        .contents
        .iter()
        .zip(r.contents.iter())
        .map(|(lc, rc)| binary(op, lc, rc))
        .collect();
    Ok(Arc::new(Node::Union(UnionNode::new(
        l.tags.clone(),
        l.index.clone(),
        contents?,
    )?)))
}

/// Masked → compute on content, combine input masks by OR of nulls, rewrap.
fn binary_masked(op: BinOp, l: &BoolmaskedNode, right: &NodeRef) -> Result<NodeRef> {
    let (right_content, right_mask): (NodeRef, Vec<bool>) = match right.as_ref() {
        Node::Boolmasked(r) => (r.content.clone(), (0..r.len()).map(|i| r.is_null(i)).collect()),
        _ => (right.clone(), vec![false; right.len()]),
    };
    let content = binary(op, &l.content, &right_content)?;
    let mask: Vec<bool> = (0..l.len())
        .map(|i| l.is_null(i) || right_mask.get(i).copied().unwrap_or(false))
        .collect();
    Ok(Arc::new(Node::Boolmasked(BoolmaskedNode::new(
        mask,
        content,
        l.masked_when,
    )?)))
}

/// Mirror of `binary_masked` when the masked operand is on the right.
fn binary_masked_rhs(op: BinOp, left: &NodeRef, r: &BoolmaskedNode) -> Result<NodeRef> {
    let content = binary(op, left, &r.content)?;
    let mask: Vec<bool> = (0..r.len()).map(|i| r.is_null(i)).collect();
    Ok(Arc::new(Node::Boolmasked(BoolmaskedNode::new(
        mask,
        content,
        r.masked_when,
    )?)))
}

/// Single-operand structural recursion for a kernel against a broadcast
/// scalar: the `binary_scalar` leaf delegation generalized to every
/// wrapper.
pub fn binary_scalar(op: BinOp, node: &NodeRef, scalar: Scalar) -> Result<NodeRef> {
    match node.as_ref() {
        Node::Virtual(v) => binary_scalar(op, &v.materialize()?, scalar),
        Node::Chunked(c) => {
            let results: Result<Vec<NodeRef>> = c
                .chunks
                .iter()
                .map(|chunk| binary_scalar(op, chunk, scalar))
                .collect();
            Ok(Arc::new(Node::Chunked(ChunkedNode::new(results?))))
        }
        Node::Leaf(l) => Ok(Arc::new(Node::Leaf(LeafNode::new(l.buffer.binary_scalar(op, scalar)?)))),
        Node::Jagged(j) => {
            let content = binary_scalar(op, &j.content, scalar)?;
            Ok(Arc::new(Node::Jagged(JaggedNode::new(
                j.starts.clone(),
                j.stops.clone(),
                content,
            )?)))
        }
        Node::Indexed(n) => {
            let content = binary_scalar(op, &n.content, scalar)?;
            Ok(Arc::new(Node::Indexed(IndexedNode::new(n.index.clone(), content)?)))
        }
        Node::Table(t) => {
            let mut fields = Vec::with_capacity(t.fields.len());
            for (name, child) in &t.fields {
                fields.push((name.clone(), binary_scalar(op, child, scalar)?));
            }
            Ok(Arc::new(Node::Table(TableNode::new(fields)?)))
        }
        Node::Union(u) => {
            let contents: Result<Vec<NodeRef>> =
                u.contents.iter().map(|c| binary_scalar(op, c, scalar)).collect();
            Ok(Arc::new(Node::Union(UnionNode::new(
                u.tags.clone(),
                u.index.clone(),
                contents?,
            )?)))
        }
        Node::Boolmasked(m) => {
            let content = binary_scalar(op, &m.content, scalar)?;
            Ok(Arc::new(Node::Boolmasked(BoolmaskedNode::new(
                m.mask.clone(),
                content,
                m.masked_when,
            )?)))
        }
        Node::Bitmasked(m) => {
            let content = binary_scalar(op, &m.content, scalar)?;
            BitmaskedNode::new(m.mask.clone(), m.len, content, m.masked_when, m.lsb_order).map(|n| Arc::new(Node::Bitmasked(n)))
        }
        Node::IndexedMask(m) => {
            let content = binary_scalar(op, &m.content, scalar)?;
            Ok(Arc::new(Node::IndexedMask(IndexedMaskNode::new(m.mask.clone(), content))))
        }
        Node::Sparse(s) => {
            let content = binary_scalar(op, &s.content, scalar)?;
            SparseNode::new(s.index.clone(), content, s.length, s.default.clone())
                .map(|n| Arc::new(Node::Sparse(n)))
        }
        Node::Object(_) | Node::Str(_) | Node::Appendable(_) => Err(CoreError::UnsupportedConversion {
            reason: "no element-wise kernel is defined over object/string/appendable nodes".to_string(),
        }),
    }
}

/// Reductions collapse the innermost axis: a jagged node reduces per-sublist
/// to one flat value per row.
pub fn reduce_sum_innermost(node: &NodeRef) -> Result<NodeRef> {
    match node.as_ref() {
        Node::Virtual(v) => reduce_sum_innermost(&v.materialize()?),
        Node::Jagged(j) => {
            let mut sums = Vec::with_capacity(j.len());
            for i in 0..j.len() {
                let row = j.row(i)?;
                let mut total = 0.0;
                for v in row.to_list()? {
                    total += v.as_f64().unwrap_or(0.0);
                }
                sums.push(total);
            }
            Ok(Node::leaf(Buffer::from_f64_vec(sums)))
        }
        Node::Table(t) => {
            let mut fields = Vec::with_capacity(t.fields.len());
            for (name, child) in &t.fields {
                fields.push((name.clone(), reduce_sum_innermost(child)?));
            }
            Ok(Arc::new(Node::Table(TableNode::new(fields)?)))
        }
        Node::Leaf(_) => Err(CoreError::UnsupportedConversion {
            reason: "a leaf buffer has no inner axis left to reduce".to_string(),
        }),
        _ => Err(CoreError::NotImplemented {
            what: format!("reduction over {}", node.node_type()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Buffer;
    use crate::node::JaggedNode;

    #[test]
    fn leaf_binary_delegates_to_buffer() {
        let a = Node::leaf(Buffer::from_f64_vec(vec![1.0, 2.0, 3.0]));
        let b = Node::leaf(Buffer::from_f64_vec(vec![10.0, 20.0, 30.0]));
        let out = binary(BinOp::Add, &a, &b).unwrap();
        assert_eq!(
            out.to_list().unwrap(),
            vec![
                crate::value::Value::Float(11.0),
                crate::value::Value::Float(22.0),
                crate::value::Value::Float(33.0)
            ]
        );
    }

    #[test]
    fn jagged_binary_requires_matching_shape() {
        let a = Arc::new(Node::Jagged(
            JaggedNode::from_offsets(vec![0, 2, 3], Node::leaf(Buffer::from_f64_vec(vec![1.0, 2.0, 3.0]))).unwrap(),
        ));
        let b = Arc::new(Node::Jagged(
            JaggedNode::from_offsets(vec![0, 1, 3], Node::leaf(Buffer::from_f64_vec(vec![1.0, 2.0, 3.0]))).unwrap(),
        ));
        assert!(binary(BinOp::Add, &a, &b).is_err());
    }

    #[test]
    fn reduce_sum_collapses_jagged_rows() {
        let j = Arc::new(Node::Jagged(
            JaggedNode::from_offsets(vec![0, 2, 2, 5], Node::leaf(Buffer::from_f64_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0])))
                .unwrap(),
        ));
        let summed = reduce_sum_innermost(&j).unwrap();
        assert_eq!(
            summed.to_list().unwrap(),
            vec![crate::value::Value::Float(3.0), crate::value::Value::Float(0.0), crate::value::Value::Float(12.0)]
        );
    }
}
