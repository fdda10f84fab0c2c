//! The single error type through which every fallible core operation reports
//! failure. Each variant carries the offending value or index needed to
//! diagnose it; no caller-silent recovery is performed anywhere in this
//! crate.

use thiserror::Error;

/// Where, structurally, a buffer sits in its parent node. Used both for
/// error messages and for persistence compression-rule matching.
pub type Context = &'static str;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid shape for {context}: expected 1-dimensional, got {ndim} dimensions")]
    InvalidShape { context: Context, ndim: usize },

    #[error("invalid dtype for {context}: expected an integer dtype, got {found}")]
    InvalidDType { context: Context, found: String },

    #[error("length mismatch in {context}: expected {expected}, found {found}")]
    LengthMismatch {
        context: Context,
        expected: usize,
        found: usize,
    },

    #[error("index {index} out of bounds for length {len}")]
    OutOfBounds { index: i64, len: usize },

    #[error("inner list at row {row} has only {len} elements, cannot select index {index}")]
    OutOfBoundsInner { row: usize, len: usize, index: i64 },

    #[error("incompatible jagged shapes: {left_len} starts/stops on the left, {right_len} on the right")]
    IncompatibleJagged { left_len: usize, right_len: usize },

    #[error("jagged shape mismatch: starts/stops differ between operands at row {row}")]
    JaggedShapeMismatch { row: usize },

    #[error("unsupported conversion: {reason}")]
    UnsupportedConversion { reason: String },

    #[error("unknown variant encountered: {what}")]
    UnknownVariant { what: String },

    #[error("not implemented: {what}")]
    NotImplemented { what: String },

    #[error("node is read-only: {context}")]
    ReadOnly { context: Context },

    #[error("constructor '{path}' is not in the deserialization whitelist")]
    ForbiddenConstructor { path: String },

    #[error("virtual node producer failed: {source}")]
    ProducerFailure {
        #[source]
        source: Box<CoreError>,
    },

    #[error("field '{name}' not found in table")]
    NoSuchField { name: String },

    #[error("dtype promotion failure: cannot combine {left} with {right}")]
    IncompatibleDType { left: String, right: String },

    #[error("malformed persistence schema: {reason}")]
    MalformedSchema { reason: String },

    #[error("blob store error reading key '{key}': {reason}")]
    Store { key: String, reason: String },
}

pub type Result<T> = std::result::Result<T, CoreError>;
