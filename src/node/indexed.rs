//! Indexed (gather-only) and sparse (index+default) nodes.

use crate::error::{CoreError, Result};
use crate::node::NodeRef;
use crate::types::LogicalType;
use crate::value::Value;

#[derive(Debug, Clone)]
pub struct IndexedNode {
    pub index: Vec<i64>,
    pub content: NodeRef,
}

impl IndexedNode {
    pub fn new(index: Vec<i64>, content: NodeRef) -> Result<IndexedNode> {
        let content_len = content.len() as i64;
        for &i in &index {
            if i < 0 || i >= content_len {
                return Err(CoreError::OutOfBounds {
                    index: i,
                    len: content.len(),
                });
            }
        }
        Ok(IndexedNode { index, content })
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn get(&self, i: usize) -> Result<Value> {
        if i >= self.len() {
            return Err(CoreError::OutOfBounds {
                index: i as i64,
                len: self.len(),
            });
        }
        self.content.get(self.index[i] as usize)
    }

    pub fn node_type(&self) -> LogicalType {
        self.content.node_type()
    }
}

/// Sparse array: only non-default positions are stored; `index` is sorted
/// and unique. Random access binary-searches `index`, returning `default`
/// on miss.
#[derive(Debug, Clone)]
pub struct SparseNode {
    pub index: Vec<i64>,
    pub content: NodeRef,
    pub length: usize,
    pub default: Value,
}

impl SparseNode {
    pub fn new(index: Vec<i64>, content: NodeRef, length: usize, default: Value) -> Result<SparseNode> {
        if index.len() != content.len() {
            return Err(CoreError::LengthMismatch {
                context: "SparseArray.index",
                expected: content.len(),
                found: index.len(),
            });
        }
        if let Some(&last) = index.last() {
            if last >= length as i64 {
                return Err(CoreError::OutOfBounds {
                    index: last,
                    len: length,
                });
            }
        }
        if !index.windows(2).all(|w| w[0] < w[1]) {
            return Err(CoreError::UnsupportedConversion {
                reason: "SparseArray.index must be sorted and unique".to_string(),
            });
        }
        Ok(SparseNode {
            index,
            content,
            length,
            default,
        })
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn get(&self, i: usize) -> Result<Value> {
        if i >= self.length {
            return Err(CoreError::OutOfBounds {
                index: i as i64,
                len: self.length,
            });
        }
        match self.index.binary_search(&(i as i64)) {
            Ok(pos) => self.content.get(pos),
            Err(_) => Ok(self.default.clone()),
        }
    }

    pub fn node_type(&self) -> LogicalType {
        self.content.node_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Buffer;
    use crate::node::Node;

    #[test]
    fn indexed_gathers_by_index() {
        let content = Node::leaf(Buffer::from_f64_vec(vec![10.0, 20.0, 30.0]));
        let n = IndexedNode::new(vec![2, 0, 0], content).unwrap();
        assert_eq!(n.get(0).unwrap(), Value::Float(30.0));
        assert_eq!(n.get(1).unwrap(), Value::Float(10.0));
    }

    #[test]
    fn indexed_out_of_range_errors_at_construction() {
        let content = Node::leaf(Buffer::from_f64_vec(vec![10.0]));
        assert!(IndexedNode::new(vec![5], content).is_err());
    }

    #[test]
    fn sparse_returns_default_on_miss() {
        let content = Node::leaf(Buffer::from_f64_vec(vec![7.0, 9.0]));
        let n = SparseNode::new(vec![1, 3], content, 5, Value::Float(0.0)).unwrap();
        assert_eq!(n.get(0).unwrap(), Value::Float(0.0));
        assert_eq!(n.get(1).unwrap(), Value::Float(7.0));
        assert_eq!(n.get(3).unwrap(), Value::Float(9.0));
    }
}
