//! Leaf buffer node: the rectangular, external primitive wrapped as the
//! bottom of every node tree.

use crate::buffer::Buffer;
use crate::dtype::DType;
use crate::error::Result;
use crate::types::LogicalType;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct LeafNode {
    pub buffer: Buffer,
}

impl LeafNode {
    pub fn new(buffer: Buffer) -> LeafNode {
        LeafNode { buffer }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn dtype(&self) -> DType {
        self.buffer.dtype()
    }

    pub fn get(&self, i: usize) -> Result<Value> {
        if i >= self.len() {
            return Err(crate::error::CoreError::OutOfBounds {
                index: i as i64,
                len: self.len(),
            });
        }
        Ok(self.buffer.value_at(i))
    }

    pub fn node_type(&self) -> LogicalType {
        LogicalType::Primitive(self.buffer.dtype())
    }

    pub fn slice(&self, start: usize, stop: usize) -> Result<LeafNode> {
        Ok(LeafNode::new(self.buffer.slice(start, stop)?))
    }

    pub fn take(&self, index: &[usize]) -> Result<LeafNode> {
        Ok(LeafNode::new(self.buffer.take(index)?))
    }
}
