//! Table node: an ordered named mapping of co-indexed children sharing a
//! common row count.

use crate::error::{CoreError, Result};
use crate::node::NodeRef;
use crate::types::LogicalType;
use crate::value::Value;

#[derive(Debug, Clone)]
pub struct TableNode {
    pub fields: Vec<(String, NodeRef)>,
    row_count: usize,
}

impl TableNode {
    pub fn new(fields: Vec<(String, NodeRef)>) -> Result<TableNode> {
        let row_count = fields.first().map(|(_, c)| c.len()).unwrap_or(0);
        for (name, child) in &fields {
            if child.len() != row_count {
                return Err(CoreError::LengthMismatch {
                    context: "Table.column",
                    expected: row_count,
                    found: child.len(),
                });
            }
            let _ = name;
        }
        Ok(TableNode { fields, row_count })
    }

    pub fn len(&self) -> usize {
        self.row_count
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn field(&self, name: &str) -> Result<NodeRef> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c.clone())
            .ok_or_else(|| CoreError::NoSuchField {
                name: name.to_string(),
            })
    }

    /// Multi-field projection; result column order matches the requested
    /// order.
    pub fn project(&self, names: &[&str]) -> Result<TableNode> {
        let mut fields = Vec::with_capacity(names.len());
        for &name in names {
            fields.push((name.to_string(), self.field(name)?));
        }
        TableNode::new(fields)
    }

    pub fn get(&self, i: usize) -> Result<Value> {
        if i >= self.row_count {
            return Err(CoreError::OutOfBounds {
                index: i as i64,
                len: self.row_count,
            });
        }
        let mut record = Vec::with_capacity(self.fields.len());
        for (name, child) in &self.fields {
            record.push((name.clone(), child.get(i)?));
        }
        Ok(Value::Record(record))
    }

    pub fn node_type(&self) -> LogicalType {
        LogicalType::Product(
            self.fields
                .iter()
                .map(|(name, child)| (name.clone(), child.node_type()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Buffer;
    use crate::node::Node;

    fn table() -> TableNode {
        TableNode::new(vec![
            ("x".to_string(), Node::leaf(Buffer::from_i64_vec(vec![1, 2, 3]))),
            (
                "y".to_string(),
                Node::leaf(Buffer::from_f64_vec(vec![1.1, 2.2, 3.3])),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn field_access_matches_column_projection() {
        let t = table();
        let x = t.field("x").unwrap();
        let projected = t.project(&["x"]).unwrap();
        assert_eq!(x.to_list().unwrap(), projected.field("x").unwrap().to_list().unwrap());
    }

    #[test]
    fn row_materializes_lazily_as_record() {
        let t = table();
        let row0 = t.get(0).unwrap();
        assert_eq!(
            row0,
            Value::Record(vec![("x".into(), Value::Int(1)), ("y".into(), Value::Float(1.1))])
        );
    }

    #[test]
    fn mismatched_column_lengths_fail() {
        let bad = TableNode::new(vec![
            ("x".to_string(), Node::leaf(Buffer::from_i64_vec(vec![1, 2]))),
            ("y".to_string(), Node::leaf(Buffer::from_i64_vec(vec![1, 2, 3]))),
        ]);
        assert!(bad.is_err());
    }
}
