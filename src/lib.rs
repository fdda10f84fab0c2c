//! A columnar array core for nested, variable-shape, heterogeneous data: a
//! closed family of array node variants (`Node`) composed through a single
//! indexing algebra, a structural broadcasting/reduction layer, a logical
//! type algebra, and a whitelisted persistence format, with bridges out to
//! an external columnar array format and construction from ordinary
//! heterogeneous iterables.

pub mod arrow_bridge;
pub mod broadcast;
pub mod buffer;
pub mod dtype;
pub mod error;
pub mod from_iter;
pub mod index;
pub mod node;
pub mod persist;
pub mod types;
pub mod value;

pub use broadcast::{binary, binary_scalar, reduce_sum_innermost};
pub use buffer::{BinOp, Buffer, Scalar};
pub use dtype::DType;
pub use error::{CoreError, Result};
pub use from_iter::from_values;
pub use index::{select, Selected, Selector};
pub use node::{Node, NodeRef};
pub use persist::{deserialize, serialize, MemoryStore, PersistConfig, Sink, Source};
pub use types::{ArrayLength, LogicalType};
pub use value::Value;
