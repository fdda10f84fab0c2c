//! Union node: a tag+index pair selecting among alternative content arrays
//! of heterogeneous type.

use crate::error::{CoreError, Result};
use crate::node::NodeRef;
use crate::types::LogicalType;
use crate::value::Value;

#[derive(Debug, Clone)]
pub struct UnionNode {
    pub tags: Vec<u8>,
    pub index: Vec<i64>,
    pub contents: Vec<NodeRef>,
}

impl UnionNode {
    pub fn new(tags: Vec<u8>, index: Vec<i64>, contents: Vec<NodeRef>) -> Result<UnionNode> {
        if tags.len() != index.len() {
            return Err(CoreError::LengthMismatch {
                context: "UnionArray.tags",
                expected: tags.len(),
                found: index.len(),
            });
        }
        for (&tag, &idx) in tags.iter().zip(index.iter()) {
            let t = tag as usize;
            if t >= contents.len() {
                return Err(CoreError::UnknownVariant {
                    what: format!("union tag {} has no matching alternative", t),
                });
            }
            if idx < 0 || idx >= contents[t].len() as i64 {
                return Err(CoreError::OutOfBounds {
                    index: idx,
                    len: contents[t].len(),
                });
            }
        }
        Ok(UnionNode {
            tags,
            index,
            contents,
        })
    }

    /// Sparse encoding convenience: `index[i] = i`, each content array has
    /// the full length.
    pub fn new_sparse(tags: Vec<u8>, contents: Vec<NodeRef>) -> Result<UnionNode> {
        let index: Vec<i64> = (0..tags.len() as i64).collect();
        UnionNode::new(tags, index, contents)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn get(&self, i: usize) -> Result<Value> {
        if i >= self.len() {
            return Err(CoreError::OutOfBounds {
                index: i as i64,
                len: self.len(),
            });
        }
        self.contents[self.tags[i] as usize].get(self.index[i] as usize)
    }

    /// Merging logical types deduplicates structurally equal alternatives.
    pub fn node_type(&self) -> LogicalType {
        self.contents
            .iter()
            .map(|c| c.node_type())
            .reduce(|a, b| a.sum(b))
            .unwrap_or(LogicalType::Sum(vec![]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Buffer;
    use crate::node::Node;

    #[test]
    fn row_materializes_from_tagged_alternative() {
        let ints = Node::leaf(Buffer::from_i64_vec(vec![1, 2]));
        let floats = Node::leaf(Buffer::from_f64_vec(vec![9.9]));
        let u = UnionNode::new(vec![0, 1, 0], vec![0, 0, 1], vec![ints, floats]).unwrap();
        assert_eq!(u.get(0).unwrap(), Value::Int(1));
        assert_eq!(u.get(1).unwrap(), Value::Float(9.9));
        assert_eq!(u.get(2).unwrap(), Value::Int(2));
    }

    #[test]
    fn invalid_tag_is_rejected() {
        let ints = Node::leaf(Buffer::from_i64_vec(vec![1]));
        assert!(UnionNode::new(vec![5], vec![0], vec![ints]).is_err());
    }
}
