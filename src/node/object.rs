//! Object and string nodes: `ObjectNode` decodes a content row into a user
//! type through a whitelisted decoder name rather than an arbitrary
//! closure, so it stays persistence-safe; `StringNode` decodes UTF-8 byte
//! ranges directly.

use crate::error::{CoreError, Result};
use crate::node::NodeRef;
use crate::types::LogicalType;
use crate::value::Value;

/// A content row plus the name of a whitelisted decoder. The decoder itself
/// lives in the persistence registry; this node only carries its name and
/// the content it applies to.
#[derive(Debug, Clone)]
pub struct ObjectNode {
    pub content: NodeRef,
    pub decoder_name: String,
}

impl ObjectNode {
    pub fn new(content: NodeRef, decoder_name: impl Into<String>) -> ObjectNode {
        ObjectNode {
            content,
            decoder_name: decoder_name.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    /// Without invoking the decoder (which requires the persistence
    /// registry), `get` exposes the underlying row; callers that need the
    /// decoded user type go through `persist::decode_object`.
    pub fn get(&self, i: usize) -> Result<Value> {
        self.content.get(i)
    }

    pub fn node_type(&self) -> LogicalType {
        self.content.node_type()
    }
}

/// UTF-8 string array stored as jagged byte ranges over a flat character
/// buffer, the same layering a jagged-of-bytes array gets elsewhere in this
/// node family.
#[derive(Debug, Clone)]
pub struct StringNode {
    pub offsets: Vec<i64>,
    pub chars: Vec<u8>,
}

impl StringNode {
    pub fn new(offsets: Vec<i64>, chars: Vec<u8>) -> Result<StringNode> {
        if offsets.is_empty() {
            return Err(CoreError::MalformedSchema {
                reason: "StringArray.offsets must contain at least one boundary".to_string(),
            });
        }
        let n = chars.len() as i64;
        for w in offsets.windows(2) {
            if w[0] < 0 || w[1] < w[0] || w[1] > n {
                return Err(CoreError::JaggedShapeMismatch { row: 0 });
            }
        }
        Ok(StringNode { offsets, chars })
    }

    pub fn from_strings(values: &[&str]) -> StringNode {
        let mut offsets = vec![0i64];
        let mut chars = Vec::new();
        for v in values {
            chars.extend_from_slice(v.as_bytes());
            offsets.push(chars.len() as i64);
        }
        StringNode { offsets, chars }
    }

    pub fn len(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    pub fn get(&self, i: usize) -> Result<Value> {
        if i + 1 >= self.offsets.len() {
            return Err(CoreError::OutOfBounds {
                index: i as i64,
                len: self.len(),
            });
        }
        let (start, stop) = (self.offsets[i] as usize, self.offsets[i + 1] as usize);
        let s = std::str::from_utf8(&self.chars[start..stop])
            .map_err(|_| CoreError::MalformedSchema {
                reason: "StringArray bytes are not valid UTF-8".to_string(),
            })?;
        Ok(Value::Str(s.to_string()))
    }

    pub fn node_type(&self) -> LogicalType {
        LogicalType::Utf8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Buffer;
    use crate::node::Node;

    #[test]
    fn string_node_decodes_utf8_rows() {
        let s = StringNode::from_strings(&["ab", "", "xyz"]);
        assert_eq!(s.get(0).unwrap(), Value::Str("ab".to_string()));
        assert_eq!(s.get(1).unwrap(), Value::Str("".to_string()));
        assert_eq!(s.get(2).unwrap(), Value::Str("xyz".to_string()));
    }

    #[test]
    fn object_node_exposes_underlying_content_row() {
        let content = Node::leaf(Buffer::from_i64_vec(vec![1, 2]));
        let o = ObjectNode::new(content, "demo::Color");
        assert_eq!(o.get(0).unwrap(), Value::Int(1));
        assert_eq!(o.decoder_name, "demo::Color");
    }
}
