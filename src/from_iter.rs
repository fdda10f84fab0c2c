//! Builds a node from a heterogeneous iterable of ordinary values. Two
//! passes: first infer a shape for the whole sequence, then fill it.

use crate::buffer::Buffer;
use crate::dtype::{promote, DType};
use crate::error::Result;
use crate::node::{IndexedMaskNode, JaggedNode, Node, NodeRef, TableNode, UnionNode};
use crate::types::{ArrayLength, LogicalType};
use crate::value::Value;
use std::sync::Arc;

/// The shape family a single value belongs to, used to decide which node
/// variant the whole sequence becomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Null,
    Scalar,
    List,
    Record,
}

fn shape_of(v: &Value) -> Shape {
    match v {
        Value::Null => Shape::Null,
        Value::List(_) => Shape::List,
        Value::Record(_) => Shape::Record,
        _ => Shape::Scalar,
    }
}

pub fn from_values(values: Vec<Value>) -> Result<NodeRef> {
    if values.is_empty() {
        return Ok(Node::leaf(Buffer::from_f64_vec(vec![])));
    }

    let has_null = values.iter().any(|v| matches!(v, Value::Null));
    let non_null_shapes: Vec<Shape> = values
        .iter()
        .filter(|v| !matches!(v, Value::Null))
        .map(shape_of)
        .collect();

    if has_null && non_null_shapes.iter().all(|s| *s == non_null_shapes[0]) && !non_null_shapes.is_empty() {
        return build_masked(values);
    }

    let all_same = non_null_shapes.windows(2).all(|w| w[0] == w[1]);
    if !has_null && all_same {
        return build_uniform(values);
    }

    build_union(values)
}

fn build_masked(values: Vec<Value>) -> Result<NodeRef> {
    let mut mask = Vec::with_capacity(values.len());
    let mut present = Vec::new();
    for v in values {
        match v {
            Value::Null => mask.push(-1i64),
            other => {
                mask.push(present.len() as i64);
                present.push(other);
            }
        }
    }
    let content = if present.is_empty() {
        Node::leaf(Buffer::from_f64_vec(vec![]))
    } else {
        build_uniform(present)?
    };
    Ok(Arc::new(Node::IndexedMask(IndexedMaskNode::new(mask, content))))
}

fn build_uniform(values: Vec<Value>) -> Result<NodeRef> {
    match shape_of(&values[0]) {
        Shape::List => build_jagged(values),
        Shape::Record => build_table(values),
        Shape::Scalar => build_leaf(values),
        Shape::Null => unreachable!("build_uniform is never called with an all-null sequence"),
    }
}

fn build_leaf(values: Vec<Value>) -> Result<NodeRef> {
    let dtype = values
        .iter()
        .map(value_dtype)
        .reduce(promote)
        .unwrap_or(DType::Float64);
    let buffer = match dtype {
        DType::Bool => Buffer::from_bool_vec(values.iter().map(|v| matches!(v, Value::Bool(true))).collect()),
        d if d.is_integer() => Buffer::from_i64_vec(
            values
                .iter()
                .map(|v| v.as_f64().unwrap_or(0.0) as i64)
                .collect(),
        ),
        _ => Buffer::from_f64_vec(values.iter().map(|v| v.as_f64().unwrap_or(0.0)).collect()),
    };
    Ok(Node::leaf(buffer))
}

fn value_dtype(v: &Value) -> DType {
    match v {
        Value::Bool(_) => DType::Bool,
        Value::Int(_) => DType::Int64,
        Value::UInt(_) => DType::UInt64,
        _ => DType::Float64,
    }
}

fn build_jagged(values: Vec<Value>) -> Result<NodeRef> {
    let mut flat = Vec::new();
    let mut counts = Vec::with_capacity(values.len());
    for v in values {
        if let Value::List(inner) = v {
            counts.push(inner.len() as i64);
            flat.extend(inner);
        }
    }
    let content = from_values(flat)?;
    Ok(Arc::new(Node::Jagged(JaggedNode::from_counts(&counts, content)?)))
}

fn build_table(values: Vec<Value>) -> Result<NodeRef> {
    let field_names: Vec<String> = match &values[0] {
        Value::Record(fields) => fields.iter().map(|(n, _)| n.clone()).collect(),
        _ => unreachable!(),
    };
    let mut columns: Vec<Vec<Value>> = vec![Vec::with_capacity(values.len()); field_names.len()];
    for v in values {
        if let Value::Record(fields) = v {
            for (name, columns_slot) in field_names.iter().zip(columns.iter_mut()) {
                let value = fields
                    .iter()
                    .find(|(n, _)| n == name)
                    .map(|(_, v)| v.clone())
                    .unwrap_or(Value::Null);
                columns_slot.push(value);
            }
        }
    }
    let mut fields = Vec::with_capacity(field_names.len());
    for (name, column) in field_names.into_iter().zip(columns.into_iter()) {
        fields.push((name, from_values(column)?));
    }
    Ok(Arc::new(Node::Table(TableNode::new(fields)?)))
}

fn build_union(values: Vec<Value>) -> Result<NodeRef> {
    // Mixed shapes plus nulls would need a masked union; not constructible
    // from the value algebra alone without an extra null-alternative slot.
    if values.iter().any(|v| matches!(v, Value::Null)) {
        return Err(crate::error::CoreError::NotImplemented {
            what: "mixed-shape iterables containing nulls".to_string(),
        });
    }

    let mut alternative_shapes: Vec<Shape> = Vec::new();
    let mut tags = Vec::with_capacity(values.len());
    let mut buckets: Vec<Vec<Value>> = Vec::new();
    let mut index = Vec::with_capacity(values.len());

    for v in values {
        let shape = shape_of(&v);
        let tag = match alternative_shapes.iter().position(|s| *s == shape) {
            Some(t) => t,
            None => {
                alternative_shapes.push(shape);
                buckets.push(Vec::new());
                alternative_shapes.len() - 1
            }
        };
        index.push(buckets[tag].len() as i64);
        buckets[tag].push(v);
        tags.push(tag as u8);
    }

    let contents: Result<Vec<NodeRef>> = buckets.into_iter().map(from_values).collect();
    Ok(Arc::new(Node::Union(UnionNode::new(tags, index, contents?)?)))
}

/// Type-only inference for a single value, used by `AppendableNode` before
/// its tail has sealed into a node it can ask for `node_type()` directly.
pub fn infer_value_type(v: &Value) -> LogicalType {
    match v {
        Value::Null => LogicalType::option(LogicalType::Bytes),
        Value::Bool(_) => LogicalType::Primitive(DType::Bool),
        Value::Int(_) => LogicalType::Primitive(DType::Int64),
        Value::UInt(_) => LogicalType::Primitive(DType::UInt64),
        Value::Float(_) => LogicalType::Primitive(DType::Float64),
        Value::Str(_) => LogicalType::Utf8,
        Value::Bytes(_) => LogicalType::Bytes,
        Value::List(items) => LogicalType::array(
            ArrayLength::Unbounded,
            items.first().map(infer_value_type).unwrap_or(LogicalType::Bytes),
        ),
        Value::Record(fields) => LogicalType::Product(
            fields
                .iter()
                .map(|(name, v)| (name.clone(), infer_value_type(v)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_scalars_build_a_leaf() {
        let n = from_values(vec![Value::Int(1), Value::Int(2), Value::Float(3.5)]).unwrap();
        assert_eq!(n.to_list().unwrap(), vec![Value::Float(1.0), Value::Float(2.0), Value::Float(3.5)]);
    }

    #[test]
    fn nested_lists_build_a_jagged_node() {
        let n = from_values(vec![
            Value::List(vec![Value::Int(1), Value::Int(2)]),
            Value::List(vec![]),
            Value::List(vec![Value::Int(3)]),
        ])
        .unwrap();
        match n.as_ref() {
            Node::Jagged(j) => assert_eq!(j.counts(), vec![2, 0, 1]),
            _ => panic!("expected Jagged"),
        }
    }

    #[test]
    fn records_build_a_table_with_first_seen_field_order() {
        let n = from_values(vec![
            Value::Record(vec![("x".into(), Value::Int(1)), ("y".into(), Value::Int(2))]),
            Value::Record(vec![("x".into(), Value::Int(3)), ("y".into(), Value::Int(4))]),
        ])
        .unwrap();
        match n.as_ref() {
            Node::Table(t) => assert_eq!(t.field("x").unwrap().to_list().unwrap(), vec![Value::Float(1.0), Value::Float(3.0)]),
            _ => panic!("expected Table"),
        }
    }

    #[test]
    fn some_nulls_build_an_indexed_mask() {
        let n = from_values(vec![Value::Int(1), Value::Null, Value::Int(3)]).unwrap();
        match n.as_ref() {
            Node::IndexedMask(m) => {
                assert!(m.is_null(1));
                assert!(!m.is_null(0));
            }
            _ => panic!("expected IndexedMask"),
        }
    }

    #[test]
    fn mixed_shapes_build_a_union() {
        let n = from_values(vec![Value::Int(1), Value::Str("a".to_string())]).unwrap();
        match n.as_ref() {
            Node::Union(u) => assert_eq!(u.len(), 2),
            _ => panic!("expected Union"),
        }
    }
}
