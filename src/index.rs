//! The indexing algebra: a chain of selectors applied outer-to-inner, with
//! field selectors commuting to the front and jagged rows reducing to a
//! sub-node rather than a value.
//!
//! Each selector in the chain consumes one axis. The first selector always
//! targets the outermost axis. A later selector targets the next axis in —
//! if the node reached at that point is still jagged (the prior selector
//! filtered or reordered rows without collapsing to a single row), the
//! selector is mapped over the content of each surviving row rather than
//! applied again to the row count.

use crate::error::{CoreError, Result};
use crate::from_iter::from_values;
use crate::node::{slice_node, take_node, JaggedNode, Node, NodeRef, TableNode};
use crate::value::Value;

#[derive(Debug, Clone)]
pub enum Selector {
    Int(i64),
    Slice {
        start: Option<i64>,
        stop: Option<i64>,
        step: i64,
    },
    Ellipsis,
    BoolArray(Vec<bool>),
    IntArray(Vec<i64>),
    Field(String),
    Fields(Vec<String>),
}

impl Selector {
    pub fn slice(start: Option<i64>, stop: Option<i64>) -> Selector {
        Selector::Slice { start, stop, step: 1 }
    }
}

/// The result of a selector chain: still a node if the chain ended on a
/// slice/array/field selector, or a terminal scalar if the last selector
/// was an integer applied to a non-jagged axis ("an integer collapses an
/// axis").
#[derive(Debug, Clone)]
pub enum Selected {
    Node(NodeRef),
    Value(Value),
}

impl Selected {
    pub fn into_node(self) -> Result<NodeRef> {
        match self {
            Selected::Node(n) => Ok(n),
            Selected::Value(_) => Err(CoreError::UnsupportedConversion {
                reason: "selector chain collapsed to a scalar value, not a node".to_string(),
            }),
        }
    }

    pub fn into_value(self) -> Result<Value> {
        match self {
            Selected::Node(n) => Ok(Value::List(n.to_list()?)),
            Selected::Value(v) => Ok(v),
        }
    }
}

pub fn select(node: &NodeRef, selectors: &[Selector]) -> Result<Selected> {
    select_axis(node, selectors)
}

/// Applies `selectors` against the axis `node` currently sits on. Leading
/// field selectors commute through immediately since they don't consume an
/// axis; the first non-field selector consumes the current axis, and
/// whatever remains after it is applied one axis further in.
fn select_axis(node: &NodeRef, selectors: &[Selector]) -> Result<Selected> {
    let mut current = node.clone();
    let mut i = 0;
    while i < selectors.len() {
        match &selectors[i] {
            Selector::Field(name) => {
                current = project_field(&current, &[name.as_str()])?;
                i += 1;
            }
            Selector::Fields(names) => {
                let refs: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
                current = project_field(&current, &refs)?;
                i += 1;
            }
            _ => break,
        }
    }
    if i == selectors.len() {
        return Ok(Selected::Node(current));
    }

    let selector = &selectors[i];
    let rest = &selectors[i + 1..];
    let applied = apply_one(&current, selector, rest.is_empty())?;

    match applied {
        Selected::Value(v) => {
            if rest.is_empty() {
                Ok(Selected::Value(v))
            } else {
                Err(CoreError::UnsupportedConversion {
                    reason: "cannot apply a further selector to an already-collapsed value"
                        .to_string(),
                })
            }
        }
        Selected::Node(new_node) => {
            if rest.is_empty() {
                Ok(Selected::Node(new_node))
            } else if let Node::Jagged(j) = new_node.as_ref() {
                map_rows(j, rest)
            } else {
                select_axis(&new_node, rest)
            }
        }
    }
}

/// Applies `rest` to the content of each row independently, then reassembles
/// the per-row results into a single selection. A row whose own selector
/// application fails (for example an out-of-bounds integer pick) fails the
/// whole chain.
fn map_rows(j: &JaggedNode, rest: &[Selector]) -> Result<Selected> {
    let mut values = Vec::with_capacity(j.len());
    for i in 0..j.len() {
        let row = j.row(i)?;
        let result = select_axis(&row, rest)?;
        values.push(result.into_value()?);
    }
    Ok(Selected::Node(from_values(values)?))
}

fn apply_one(node: &NodeRef, selector: &Selector, is_last: bool) -> Result<Selected> {
    match selector {
        Selector::Field(name) => Ok(Selected::Node(project_field(node, &[name.as_str()])?)),
        Selector::Fields(names) => {
            let refs: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
            Ok(Selected::Node(project_field(node, &refs)?))
        }
        Selector::Ellipsis => Ok(Selected::Node(node.clone())),
        Selector::Int(i) => apply_int(node, *i, is_last),
        Selector::Slice { start, stop, step } => {
            Ok(Selected::Node(apply_slice(node, *start, *stop, *step)?))
        }
        Selector::BoolArray(mask) => Ok(Selected::Node(apply_bool_array(node, mask)?)),
        Selector::IntArray(idx) => Ok(Selected::Node(apply_int_array(node, idx)?)),
    }
}

/// Rule 1: field selection commutes to the front. A jagged node wrapping a
/// table projects the table and rewraps the same starts/stops.
fn project_field(node: &NodeRef, names: &[&str]) -> Result<NodeRef> {
    match node.as_ref() {
        Node::Table(t) => Ok(std::sync::Arc::new(Node::Table(project_table(t, names)?))),
        Node::Jagged(j) => {
            let projected = project_field(&j.content, names)?;
            Ok(std::sync::Arc::new(Node::Jagged(
                crate::node::JaggedNode::new(j.starts.clone(), j.stops.clone(), projected)?,
            )))
        }
        Node::Boolmasked(m) => {
            let projected = project_field(&m.content, names)?;
            Ok(std::sync::Arc::new(Node::Boolmasked(
                crate::node::BoolmaskedNode::new(m.mask.clone(), projected, m.masked_when)?,
            )))
        }
        Node::IndexedMask(m) => {
            let projected = project_field(&m.content, names)?;
            Ok(std::sync::Arc::new(Node::IndexedMask(
                crate::node::IndexedMaskNode::new(m.mask.clone(), projected),
            )))
        }
        _ => Err(CoreError::UnsupportedConversion {
            reason: "field selection requires a table, or a jagged/masked wrapper around one"
                .to_string(),
        }),
    }
}

fn project_table(t: &TableNode, names: &[&str]) -> Result<TableNode> {
    t.project(names)
}

fn apply_int(node: &NodeRef, i: i64, is_last: bool) -> Result<Selected> {
    let len = node.len() as i64;
    let idx = wrap_index(i, len)?;
    match node.as_ref() {
        // Rule 3: a single integer row on a jagged node is the view over
        // content[starts[i]:stops[i]], a node, not a terminal value.
        Node::Jagged(j) => Ok(Selected::Node(j.row(idx as usize)?)),
        _ if is_last => Ok(Selected::Value(node.get(idx as usize)?)),
        _ => Ok(Selected::Node(slice_node(node, idx as usize, idx as usize + 1)?)),
    }
}

fn apply_slice(node: &NodeRef, start: Option<i64>, stop: Option<i64>, step: i64) -> Result<NodeRef> {
    if step == 0 {
        return Err(CoreError::UnsupportedConversion {
            reason: "slice step must not be zero".to_string(),
        });
    }
    let len = node.len() as i64;
    let (start, stop) = resolve_slice_bounds(start, stop, len, step);
    if step == 1 {
        return slice_node(node, start as usize, stop as usize);
    }
    let idx: Vec<usize> = if step > 0 {
        (start..stop).step_by(step as usize).map(|v| v as usize).collect()
    } else {
        let mut out = Vec::new();
        let mut cur = start;
        while cur > stop {
            out.push(cur as usize);
            cur += step;
        }
        out
    };
    take_node(node, &idx)
}

fn resolve_slice_bounds(start: Option<i64>, stop: Option<i64>, len: i64, step: i64) -> (i64, i64) {
    if step > 0 {
        let s = start.map(|v| clamp(wrap_unchecked(v, len), 0, len)).unwrap_or(0);
        let e = stop.map(|v| clamp(wrap_unchecked(v, len), 0, len)).unwrap_or(len);
        (s, e.max(s))
    } else {
        let s = start.map(|v| clamp(wrap_unchecked(v, len), -1, len - 1)).unwrap_or(len - 1);
        let e = stop.map(|v| clamp(wrap_unchecked(v, len), -1, len - 1)).unwrap_or(-1);
        (s, e.min(s))
    }
}

fn clamp(v: i64, lo: i64, hi: i64) -> i64 {
    v.max(lo).min(hi)
}

fn wrap_unchecked(i: i64, len: i64) -> i64 {
    if i < 0 {
        i + len
    } else {
        i
    }
}

/// Rule 8: negative entries wrap, out-of-range entries fail.
fn wrap_index(i: i64, len: i64) -> Result<i64> {
    let w = if i < 0 { i + len } else { i };
    if w < 0 || w >= len {
        return Err(CoreError::OutOfBounds { index: i, len: len as usize });
    }
    Ok(w)
}

/// Rule 7: a boolean selector must match the axis length exactly.
fn apply_bool_array(node: &NodeRef, mask: &[bool]) -> Result<NodeRef> {
    if mask.len() != node.len() {
        return Err(CoreError::LengthMismatch {
            context: "boolean selector",
            expected: node.len(),
            found: mask.len(),
        });
    }
    let idx: Vec<usize> = mask
        .iter()
        .enumerate()
        .filter(|(_, &b)| b)
        .map(|(i, _)| i)
        .collect();
    take_node(node, &idx)
}

fn apply_int_array(node: &NodeRef, raw: &[i64]) -> Result<NodeRef> {
    let len = node.len() as i64;
    let mut idx = Vec::with_capacity(raw.len());
    for &i in raw {
        idx.push(wrap_index(i, len)? as usize);
    }
    take_node(node, &idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Buffer;
    use crate::node::JaggedNode;
    use std::sync::Arc;

    fn jagged() -> NodeRef {
        let content = Node::leaf(Buffer::from_f64_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]));
        Arc::new(Node::Jagged(
            JaggedNode::from_offsets(vec![0, 3, 3, 6], content).unwrap(),
        ))
    }

    fn table() -> NodeRef {
        Arc::new(Node::Table(
            TableNode::new(vec![
                ("x".to_string(), Node::leaf(Buffer::from_i64_vec(vec![1, 2, 3]))),
                ("y".to_string(), Node::leaf(Buffer::from_f64_vec(vec![1.5, 2.5, 3.5]))),
            ])
            .unwrap(),
        ))
    }

    #[test]
    fn integer_row_on_jagged_returns_node_not_scalar() {
        let selected = select(&jagged(), &[Selector::Int(0)]).unwrap();
        match selected {
            Selected::Node(n) => assert_eq!(n.to_list().unwrap().len(), 3),
            Selected::Value(_) => panic!("jagged row selection should stay a node"),
        }
    }

    #[test]
    fn negative_integer_wraps() {
        let selected = select(&jagged(), &[Selector::Int(-1)]).unwrap();
        let n = selected.into_node().unwrap();
        assert_eq!(n.to_list().unwrap(), vec![Value::Float(4.0), Value::Float(5.0), Value::Float(6.0)]);
    }

    #[test]
    fn slice_preserves_jagged_wrapper() {
        let selected = select(&jagged(), &[Selector::slice(Some(1), Some(3))]).unwrap();
        let n = selected.into_node().unwrap();
        assert!(matches!(n.as_ref(), Node::Jagged(_)));
        assert_eq!(n.len(), 2);
    }

    #[test]
    fn field_selector_commutes_through_jagged_wrapper() {
        let j = {
            let content = table();
            Arc::new(Node::Jagged(
                JaggedNode::from_offsets(vec![0, 2, 3], content).unwrap(),
            ))
        };
        let selected = select(&j, &[Selector::Field("x".to_string())]).unwrap();
        let n = selected.into_node().unwrap();
        assert!(matches!(n.as_ref(), Node::Jagged(_)));
    }

    #[test]
    fn boolean_array_must_match_length() {
        let err = select(&table(), &[Selector::BoolArray(vec![true, false])]);
        assert!(err.is_err());
    }

    #[test]
    fn integer_array_gathers_rows() {
        let selected = select(&table(), &[Selector::IntArray(vec![2, 0])]).unwrap();
        let n = selected.into_node().unwrap();
        assert_eq!(n.len(), 2);
    }
}
