//! The three mask representations: a bit-packed mask, a boolean mask, and
//! an indexed mask that only stores present values. All three present the
//! same logical option(T) wrapper and convert freely between each other.

use crate::error::{CoreError, Result};
use crate::node::NodeRef;
use crate::types::LogicalType;
use crate::value::Value;

/// Which mask value means "null": `true` (masked_when = 1) or `false`
/// (masked_when = 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskedWhen {
    False,
    True,
}

impl MaskedWhen {
    fn is_null(self, bit: bool) -> bool {
        match self {
            MaskedWhen::True => bit,
            MaskedWhen::False => !bit,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BoolmaskedNode {
    pub mask: Vec<bool>,
    pub content: NodeRef,
    pub masked_when: MaskedWhen,
}

impl BoolmaskedNode {
    pub fn new(mask: Vec<bool>, content: NodeRef, masked_when: MaskedWhen) -> Result<BoolmaskedNode> {
        if mask.len() > content.len() {
            return Err(CoreError::LengthMismatch {
                context: "BoolMaskedArray.mask",
                expected: content.len(),
                found: mask.len(),
            });
        }
        Ok(BoolmaskedNode {
            mask,
            content,
            masked_when,
        })
    }

    pub fn len(&self) -> usize {
        self.mask.len()
    }

    pub fn is_null(&self, i: usize) -> bool {
        self.masked_when.is_null(self.mask[i])
    }

    pub fn get(&self, i: usize) -> Result<Value> {
        if i >= self.len() {
            return Err(CoreError::OutOfBounds {
                index: i as i64,
                len: self.len(),
            });
        }
        if self.is_null(i) {
            Ok(Value::Null)
        } else {
            self.content.get(i)
        }
    }

    pub fn node_type(&self) -> LogicalType {
        LogicalType::option(self.content.node_type())
    }

    pub fn to_bitmask(&self) -> BitmaskedNode {
        let mut bits = vec![0u8; (self.mask.len() + 7) / 8];
        for (i, &b) in self.mask.iter().enumerate() {
            if b {
                bits[i / 8] |= 1 << (i % 8);
            }
        }
        BitmaskedNode {
            mask: bits,
            len: self.mask.len(),
            content: self.content.clone(),
            masked_when: self.masked_when,
            lsb_order: true,
        }
    }

    pub fn to_indexed_mask(&self) -> Result<IndexedMaskNode> {
        let mut index = Vec::with_capacity(self.mask.len());
        let mut present = Vec::new();
        for (i, &b) in self.mask.iter().enumerate() {
            if self.masked_when.is_null(b) {
                index.push(-1);
            } else {
                index.push(present.len() as i64);
                present.push(i);
            }
        }
        let content = crate::node::take_node(&self.content, &present)?;
        Ok(IndexedMaskNode {
            mask: index,
            content,
        })
    }
}

/// Bit-packed mask, one bit per logical element.
#[derive(Debug, Clone)]
pub struct BitmaskedNode {
    pub mask: Vec<u8>,
    pub len: usize,
    pub content: NodeRef,
    pub masked_when: MaskedWhen,
    /// Whether bit 0 of each byte is the first (least-significant) or last
    /// element represented by that byte.
    pub lsb_order: bool,
}

impl BitmaskedNode {
    pub fn new(
        mask: Vec<u8>,
        len: usize,
        content: NodeRef,
        masked_when: MaskedWhen,
        lsb_order: bool,
    ) -> Result<BitmaskedNode> {
        let expected_bytes = (len + 7) / 8;
        if mask.len() < expected_bytes {
            return Err(CoreError::LengthMismatch {
                context: "BitMaskedArray.mask",
                expected: expected_bytes,
                found: mask.len(),
            });
        }
        Ok(BitmaskedNode {
            mask,
            len,
            content,
            masked_when,
            lsb_order,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    fn bit(&self, i: usize) -> bool {
        let byte = self.mask[i / 8];
        let shift = if self.lsb_order { i % 8 } else { 7 - (i % 8) };
        (byte >> shift) & 1 == 1
    }

    pub fn is_null(&self, i: usize) -> bool {
        self.masked_when.is_null(self.bit(i))
    }

    pub fn get(&self, i: usize) -> Result<Value> {
        if i >= self.len {
            return Err(CoreError::OutOfBounds {
                index: i as i64,
                len: self.len,
            });
        }
        if self.is_null(i) {
            Ok(Value::Null)
        } else {
            self.content.get(i)
        }
    }

    pub fn node_type(&self) -> LogicalType {
        LogicalType::option(self.content.node_type())
    }

    pub fn to_boolmask(&self) -> BoolmaskedNode {
        let mask = (0..self.len).map(|i| self.bit(i)).collect();
        BoolmaskedNode {
            mask,
            content: self.content.clone(),
            masked_when: self.masked_when,
        }
    }
}

/// Indexed mask: a signed index per element, negative meaning null,
/// otherwise an index into `content`, which stores only present values.
#[derive(Debug, Clone)]
pub struct IndexedMaskNode {
    pub mask: Vec<i64>,
    pub content: NodeRef,
}

impl IndexedMaskNode {
    pub fn new(mask: Vec<i64>, content: NodeRef) -> IndexedMaskNode {
        IndexedMaskNode { mask, content }
    }

    pub fn len(&self) -> usize {
        self.mask.len()
    }

    pub fn is_null(&self, i: usize) -> bool {
        self.mask[i] < 0
    }

    pub fn get(&self, i: usize) -> Result<Value> {
        if i >= self.len() {
            return Err(CoreError::OutOfBounds {
                index: i as i64,
                len: self.len(),
            });
        }
        let m = self.mask[i];
        if m < 0 {
            Ok(Value::Null)
        } else {
            self.content.get(m as usize)
        }
    }

    pub fn node_type(&self) -> LogicalType {
        LogicalType::option(self.content.node_type())
    }

    pub fn to_boolmask(&self) -> Result<BoolmaskedNode> {
        let mask: Vec<bool> = self.mask.iter().map(|&m| m < 0).collect();
        let present: Vec<usize> = self.mask.iter().filter(|&&m| m >= 0).map(|&m| m as usize).collect();
        let content = crate::node::take_node(&self.content, &present)?;
        BoolmaskedNode::new(mask, content, MaskedWhen::True)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Buffer;
    use crate::node::Node;

    fn content() -> NodeRef {
        Node::leaf(Buffer::from_f64_vec(vec![1.0, 2.0, 3.0]))
    }

    #[test]
    fn boolmask_null_predicate_respects_masked_when() {
        let n = BoolmaskedNode::new(
            vec![true, false, true],
            content(),
            MaskedWhen::True,
        )
        .unwrap();
        assert!(n.is_null(0));
        assert!(!n.is_null(1));
        assert_eq!(n.get(1).unwrap(), Value::Float(2.0));
        assert_eq!(n.get(0).unwrap(), Value::Null);
    }

    #[test]
    fn bitmask_boolmask_roundtrip_preserves_null_positions() {
        for lsb in [true, false] {
            let bool_mask = vec![true, false, false, true, true, false, true];
            let content_buf: NodeRef = Node::leaf(Buffer::from_i64_vec(vec![0; 7]));
            let bm = BoolmaskedNode::new(bool_mask.clone(), content_buf, MaskedWhen::True).unwrap();
            let mut bit_mask = bm.to_bitmask();
            bit_mask.lsb_order = lsb;
            if !lsb {
                // Rebuild bits under the opposite bit order for the same logical nulls.
                let mut bits = vec![0u8; (bool_mask.len() + 7) / 8];
                for (i, &b) in bool_mask.iter().enumerate() {
                    if b {
                        bits[i / 8] |= 1 << (7 - (i % 8));
                    }
                }
                bit_mask.mask = bits;
            }
            for i in 0..bool_mask.len() {
                assert_eq!(bit_mask.is_null(i), bool_mask[i], "lsb_order={}", lsb);
            }
        }
    }

    #[test]
    fn indexed_mask_compresses_present_values() {
        let present = Node::leaf(Buffer::from_f64_vec(vec![10.0, 20.0]));
        let n = IndexedMaskNode::new(vec![-1, 0, -1, 1], present);
        assert_eq!(n.get(0).unwrap(), Value::Null);
        assert_eq!(n.get(1).unwrap(), Value::Float(10.0));
        assert_eq!(n.get(3).unwrap(), Value::Float(20.0));
    }
}
