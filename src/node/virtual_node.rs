//! Virtual node: a deferred computation that produces a node on first
//! access and is looked up, never inserted, from a weak-reference cache
//! keyed by (producer identity, argument).

use crate::error::{CoreError, Result};
use crate::node::NodeRef;
use crate::types::LogicalType;
use std::sync::{Arc, Mutex, Weak};

/// A producer is identified by name for cache-key and error-reporting
/// purposes; the closure itself can't be compared or hashed.
pub type Producer = Arc<dyn Fn() -> Result<NodeRef> + Send + Sync>;

#[derive(Clone)]
pub struct VirtualNode {
    producer: Producer,
    producer_name: String,
    cache_key: String,
    length_hint: usize,
    type_hint: LogicalType,
    cache: Arc<Mutex<Weak<Node>>>,
}

use crate::node::Node;

impl std::fmt::Debug for VirtualNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualNode")
            .field("producer_name", &self.producer_name)
            .field("cache_key", &self.cache_key)
            .field("length_hint", &self.length_hint)
            .finish()
    }
}

impl VirtualNode {
    pub fn new(
        producer_name: impl Into<String>,
        cache_key: impl Into<String>,
        length_hint: usize,
        type_hint: LogicalType,
        producer: Producer,
    ) -> VirtualNode {
        VirtualNode {
            producer,
            producer_name: producer_name.into(),
            cache_key: cache_key.into(),
            length_hint,
            type_hint,
            cache: Arc::new(Mutex::new(Weak::new())),
        }
    }

    pub fn len(&self) -> usize {
        self.length_hint
    }

    pub fn is_empty(&self) -> bool {
        self.length_hint == 0
    }

    pub fn node_type(&self) -> LogicalType {
        self.type_hint.clone()
    }

    /// The (producer, argument) identity this node's cache entry is keyed
    /// by.
    pub fn identity(&self) -> (String, String) {
        (self.producer_name.clone(), self.cache_key.clone())
    }

    /// Runs the producer if the cache is empty or its weak handle has been
    /// dropped. A failed production is never cached.
    pub fn materialize(&self) -> Result<NodeRef> {
        if let Some(hit) = self.cache.lock().unwrap().upgrade() {
            return Ok(hit);
        }
        let produced = (self.producer)().map_err(|e| CoreError::ProducerFailure {
            source: Box::new(e),
        })?;
        *self.cache.lock().unwrap() = Arc::downgrade(&produced);
        Ok(produced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Buffer;
    use crate::dtype::DType;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn materialize_invokes_producer_and_caches_while_referenced() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let producer: Producer = Arc::new(move || {
            calls2.fetch_add(1, Ordering::SeqCst);
            Ok(Node::leaf(Buffer::from_i64_vec(vec![1, 2, 3])))
        });
        let v = VirtualNode::new(
            "demo::producer",
            "key-1",
            3,
            LogicalType::Primitive(DType::Int64),
            producer,
        );
        let first = v.materialize().unwrap();
        let second = v.materialize().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn materialize_does_not_cache_failures() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let producer: Producer = Arc::new(move || {
            calls2.fetch_add(1, Ordering::SeqCst);
            Err(CoreError::NotImplemented {
                what: "always fails".to_string(),
            })
        });
        let v = VirtualNode::new(
            "demo::failing",
            "key-2",
            0,
            LogicalType::Primitive(DType::Int64),
            producer,
        );
        assert!(v.materialize().is_err());
        assert!(v.materialize().is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
