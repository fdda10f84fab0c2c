//! The element dtypes a leaf buffer can carry, and the promotion rule the
//! broadcasting kernels use to combine two of them: the primitive library's
//! own promotion rules, modeled directly here since no single dynamic-dtype
//! tensor crate covers this promotion lattice on its own.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
}

impl DType {
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            DType::Int8
                | DType::Int16
                | DType::Int32
                | DType::Int64
                | DType::UInt8
                | DType::UInt16
                | DType::UInt32
                | DType::UInt64
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, DType::Float32 | DType::Float64)
    }

    /// Rank used by [`promote`]; higher rank wins a promotion.
    fn rank(self) -> u8 {
        match self {
            DType::Bool => 0,
            DType::Int8 | DType::UInt8 => 1,
            DType::Int16 | DType::UInt16 => 2,
            DType::Int32 | DType::UInt32 => 3,
            DType::Int64 | DType::UInt64 => 4,
            DType::Float32 => 5,
            DType::Float64 => 6,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DType::Bool => "bool",
            DType::Int8 => "int8",
            DType::Int16 => "int16",
            DType::Int32 => "int32",
            DType::Int64 => "int64",
            DType::UInt8 => "uint8",
            DType::UInt16 => "uint16",
            DType::UInt32 => "uint32",
            DType::UInt64 => "uint64",
            DType::Float32 => "float32",
            DType::Float64 => "float64",
        };
        write!(f, "{}", s)
    }
}

/// Type promotion for a binary elementwise kernel: the wider of the two
/// dtypes wins; mixing an integer with a float always promotes to float.
pub fn promote(a: DType, b: DType) -> DType {
    if a == b {
        return a;
    }
    if a.is_float() || b.is_float() {
        return if a.rank() >= b.rank() {
            if a.is_float() {
                a
            } else {
                DType::Float64
            }
        } else if b.is_float() {
            b
        } else {
            DType::Float64
        };
    }
    if a.rank() >= b.rank() {
        a
    } else {
        b
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn promote_same_is_identity() {
        assert_eq!(promote(DType::Int64, DType::Int64), DType::Int64);
    }

    #[test]
    fn promote_int_and_float_goes_float() {
        assert_eq!(promote(DType::Int64, DType::Float64), DType::Float64);
        assert_eq!(promote(DType::Float32, DType::Int8), DType::Float32);
    }

    #[test]
    fn promote_widens_integers() {
        assert_eq!(promote(DType::Int8, DType::Int64), DType::Int64);
    }
}
