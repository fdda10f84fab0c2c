//! Jagged node: variable-length sublists via parallel `starts`/`stops`
//! index arrays over a flat content node.

use crate::error::{CoreError, Result};
use crate::node::NodeRef;
use crate::types::{ArrayLength, LogicalType};
use crate::value::Value;

#[derive(Debug, Clone)]
pub struct JaggedNode {
    pub starts: Vec<i64>,
    pub stops: Vec<i64>,
    pub content: NodeRef,
}

impl JaggedNode {
    pub fn new(starts: Vec<i64>, stops: Vec<i64>, content: NodeRef) -> Result<JaggedNode> {
        check_starts_stops(&starts, &stops)?;
        let content_len = content.len() as i64;
        for (&s, &e) in starts.iter().zip(stops.iter()) {
            if s < 0 || e < s || e > content_len {
                return Err(CoreError::OutOfBounds {
                    index: e,
                    len: content.len(),
                });
            }
        }
        Ok(JaggedNode {
            starts,
            stops,
            content,
        })
    }

    pub fn from_offsets(offsets: Vec<i64>, content: NodeRef) -> Result<JaggedNode> {
        if offsets.is_empty() {
            return Err(CoreError::LengthMismatch {
                context: "JaggedArray.offsets",
                expected: 1,
                found: 0,
            });
        }
        let starts = offsets[..offsets.len() - 1].to_vec();
        let stops = offsets[1..].to_vec();
        JaggedNode::new(starts, stops, content)
    }

    pub fn from_counts(counts: &[i64], content: NodeRef) -> Result<JaggedNode> {
        let mut offsets = Vec::with_capacity(counts.len() + 1);
        offsets.push(0i64);
        for &c in counts {
            let last = *offsets.last().unwrap();
            offsets.push(last + c);
        }
        JaggedNode::from_offsets(offsets, content)
    }

    pub fn len(&self) -> usize {
        self.starts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }

    pub fn counts(&self) -> Vec<i64> {
        self.starts
            .iter()
            .zip(self.stops.iter())
            .map(|(&s, &e)| e - s)
            .collect()
    }

    /// True when `stops[i] == starts[i+1]` for all `i` and `starts[0] == 0`.
    /// Tracked by checking the index arrays rather than requiring
    /// pointer-level buffer aliasing.
    pub fn is_compact(&self) -> bool {
        if self.starts.is_empty() {
            return true;
        }
        if self.starts[0] != 0 {
            return false;
        }
        self.stops
            .iter()
            .zip(self.starts.iter().skip(1))
            .all(|(&stop, &next_start)| stop == next_start)
    }

    pub fn offsets(&self) -> Result<Vec<i64>> {
        if !self.is_compact() {
            return Err(CoreError::UnsupportedConversion {
                reason: "starts and stops are not compatible with a single offsets array"
                    .to_string(),
            });
        }
        let mut offsets = self.starts.clone();
        offsets.push(*self.stops.last().unwrap_or(&0));
        Ok(offsets)
    }

    /// A new, logically equal jagged node whose content has no gaps.
    pub fn compact(&self) -> Result<JaggedNode> {
        if self.is_compact() {
            return Ok(self.clone());
        }
        let mut new_starts = Vec::with_capacity(self.len());
        let mut new_stops = Vec::with_capacity(self.len());
        let mut indices: Vec<usize> = Vec::new();
        let mut cursor: i64 = 0;
        for (&s, &e) in self.starts.iter().zip(self.stops.iter()) {
            new_starts.push(cursor);
            for i in s..e {
                indices.push(i as usize);
            }
            cursor += e - s;
            new_stops.push(cursor);
        }
        let new_content = crate::node::take_node(&self.content, &indices)?;
        JaggedNode::new(new_starts, new_stops, new_content)
    }

    /// `parents[i]` is the owning outer row of content position `i`, or
    /// `-1` for positions in a gap.
    pub fn parents(&self) -> Vec<i64> {
        let mut out = vec![-1i64; self.content.len()];
        for (row, (&s, &e)) in self.starts.iter().zip(self.stops.iter()).enumerate() {
            for i in s..e {
                if (i as usize) < out.len() {
                    out[i as usize] = row as i64;
                }
            }
        }
        out
    }

    pub fn row(&self, i: usize) -> Result<NodeRef> {
        if i >= self.len() {
            return Err(CoreError::OutOfBounds {
                index: i as i64,
                len: self.len(),
            });
        }
        crate::node::slice_node(&self.content, self.starts[i] as usize, self.stops[i] as usize)
    }

    pub fn get(&self, i: usize) -> Result<Value> {
        let row = self.row(i)?;
        Ok(Value::List(row.to_list()?))
    }

    pub fn node_type(&self) -> LogicalType {
        LogicalType::array(ArrayLength::Unbounded, self.content.node_type())
    }
}

fn check_starts_stops(starts: &[i64], stops: &[i64]) -> Result<()> {
    if starts.len() > stops.len() {
        return Err(CoreError::LengthMismatch {
            context: "JaggedArray.starts",
            expected: stops.len(),
            found: starts.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Buffer;
    use crate::node::{leaf::LeafNode, Node};
    use std::sync::Arc;

    fn content() -> NodeRef {
        Arc::new(Node::Leaf(LeafNode::new(Buffer::from_f64_vec(vec![
            1.1, 2.2, 3.3, 4.4, 5.5, 6.6, 7.7, 8.8, 9.9,
        ]))))
    }

    #[test]
    fn from_offsets_builds_expected_counts() {
        let j = JaggedNode::from_offsets(vec![0, 3, 3, 5, 6, 9], content()).unwrap();
        assert_eq!(j.counts(), vec![3, 0, 2, 1, 3]);
    }

    #[test]
    fn row_length_matches_counts() {
        let j = JaggedNode::from_offsets(vec![0, 3, 3, 5, 6, 9], content()).unwrap();
        for i in 0..j.len() {
            assert_eq!(j.row(i).unwrap().len(), j.counts()[i] as usize);
        }
    }

    #[test]
    fn compact_offsets_start_at_zero_and_are_monotone() {
        let j = JaggedNode::from_offsets(vec![0, 3, 3, 5, 6, 9], content()).unwrap();
        let offsets = j.compact().unwrap().offsets().unwrap();
        assert_eq!(offsets[0], 0);
        assert!(offsets.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn parents_maps_content_back_to_row() {
        let j = JaggedNode::from_offsets(vec![0, 3, 3, 5, 6, 9], content()).unwrap();
        let parents = j.parents();
        assert_eq!(&parents[0..3], &[0, 0, 0]);
        assert_eq!(&parents[3..5], &[2, 2]);
        assert_eq!(&parents[5..6], &[3]);
        assert_eq!(&parents[6..9], &[4, 4, 4]);
    }
}
