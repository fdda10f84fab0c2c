//! The rectangular leaf buffer: an external primitive library providing
//! typed contiguous buffers, elementwise arithmetic, reductions,
//! gather/scatter, boolean masking, bit packing/unpacking and type
//! promotion, here played by [`ndarray`]. The node family never
//! reimplements arithmetic on it; it only slices, reshapes, casts and
//! delegates to it.

use crate::dtype::{promote, DType};
use crate::error::{CoreError, Result};
use crate::value::Value;
use ndarray::{Array1, ArrayD, IxDyn};

/// A dynamically-typed, owned, rectangular buffer. Only the first axis is
/// treated as the node's logical length; remaining axes are opaque payload
/// (e.g. a fixed-width vector element type).
#[derive(Debug, Clone, PartialEq)]
pub enum Buffer {
    Bool(ArrayD<bool>),
    Int8(ArrayD<i8>),
    Int16(ArrayD<i16>),
    Int32(ArrayD<i32>),
    Int64(ArrayD<i64>),
    UInt8(ArrayD<u8>),
    UInt16(ArrayD<u16>),
    UInt32(ArrayD<u32>),
    UInt64(ArrayD<u64>),
    Float32(ArrayD<f32>),
    Float64(ArrayD<f64>),
}

/// A single value pulled out of, or broadcast into, a [`Buffer`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
}

impl Scalar {
    pub fn dtype(self) -> DType {
        match self {
            Scalar::Bool(_) => DType::Bool,
            Scalar::Int(_) => DType::Int64,
            Scalar::UInt(_) => DType::UInt64,
            Scalar::Float(_) => DType::Float64,
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Scalar::Bool(b) => {
                if b {
                    1.0
                } else {
                    0.0
                }
            }
            Scalar::Int(i) => i as f64,
            Scalar::UInt(u) => u as f64,
            Scalar::Float(f) => f,
        }
    }
}

/// The kernels the broadcasting machinery knows how to push down to a leaf
/// buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
}

impl BinOp {
    fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Gt | BinOp::Ge | BinOp::Lt | BinOp::Le | BinOp::Eq
        )
    }
}

impl Buffer {
    pub fn dtype(&self) -> DType {
        match self {
            Buffer::Bool(_) => DType::Bool,
            Buffer::Int8(_) => DType::Int8,
            Buffer::Int16(_) => DType::Int16,
            Buffer::Int32(_) => DType::Int32,
            Buffer::Int64(_) => DType::Int64,
            Buffer::UInt8(_) => DType::UInt8,
            Buffer::UInt16(_) => DType::UInt16,
            Buffer::UInt32(_) => DType::UInt32,
            Buffer::UInt64(_) => DType::UInt64,
            Buffer::Float32(_) => DType::Float32,
            Buffer::Float64(_) => DType::Float64,
        }
    }

    pub fn shape(&self) -> Vec<usize> {
        match self {
            Buffer::Bool(a) => a.shape().to_vec(),
            Buffer::Int8(a) => a.shape().to_vec(),
            Buffer::Int16(a) => a.shape().to_vec(),
            Buffer::Int32(a) => a.shape().to_vec(),
            Buffer::Int64(a) => a.shape().to_vec(),
            Buffer::UInt8(a) => a.shape().to_vec(),
            Buffer::UInt16(a) => a.shape().to_vec(),
            Buffer::UInt32(a) => a.shape().to_vec(),
            Buffer::UInt64(a) => a.shape().to_vec(),
            Buffer::Float32(a) => a.shape().to_vec(),
            Buffer::Float64(a) => a.shape().to_vec(),
        }
    }

    /// `shape[0]`, the node's logical length (invariant: `shape[0] ==
    /// len`).
    pub fn len(&self) -> usize {
        self.shape().first().copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn from_f64_vec(v: Vec<f64>) -> Buffer {
        Buffer::Float64(Array1::from_vec(v).into_dyn())
    }

    pub fn from_i64_vec(v: Vec<i64>) -> Buffer {
        Buffer::Int64(Array1::from_vec(v).into_dyn())
    }

    pub fn from_bool_vec(v: Vec<bool>) -> Buffer {
        Buffer::Bool(Array1::from_vec(v).into_dyn())
    }

    /// Element `i` of axis 0, boxed as an owned scalar [`Value`]. Used only
    /// by `to_list`/debug materialization, never on a hot path.
    pub fn value_at(&self, i: usize) -> Value {
        match self {
            Buffer::Bool(a) => Value::Bool(a[IxDyn(&[i])]),
            Buffer::Int8(a) => Value::Int(a[IxDyn(&[i])] as i64),
            Buffer::Int16(a) => Value::Int(a[IxDyn(&[i])] as i64),
            Buffer::Int32(a) => Value::Int(a[IxDyn(&[i])] as i64),
            Buffer::Int64(a) => Value::Int(a[IxDyn(&[i])]),
            Buffer::UInt8(a) => Value::UInt(a[IxDyn(&[i])] as u64),
            Buffer::UInt16(a) => Value::UInt(a[IxDyn(&[i])] as u64),
            Buffer::UInt32(a) => Value::UInt(a[IxDyn(&[i])] as u64),
            Buffer::UInt64(a) => Value::UInt(a[IxDyn(&[i])]),
            Buffer::Float32(a) => Value::Float(a[IxDyn(&[i])] as f64),
            Buffer::Float64(a) => Value::Float(a[IxDyn(&[i])]),
        }
    }

    /// Gather a new buffer `out[j] = self[index[j]]`, the building block
    /// behind the integer-array selector and structural gather/scatter.
    pub fn take(&self, index: &[usize]) -> Result<Buffer> {
        match self {
            Buffer::Bool(a) => {
                let mut out = Vec::with_capacity(index.len());
                for &i in index {
                    if i >= a.len() {
                        return Err(CoreError::OutOfBounds { index: i as i64, len: a.len() });
                    }
                    out.push(a[IxDyn(&[i])]);
                }
                Ok(Buffer::Bool(Array1::from_vec(out).into_dyn()))
            }
            Buffer::Int8(a) => take_numeric(a, index, Buffer::Int8),
            Buffer::Int16(a) => take_numeric(a, index, Buffer::Int16),
            Buffer::Int32(a) => take_numeric(a, index, Buffer::Int32),
            Buffer::Int64(a) => take_numeric(a, index, Buffer::Int64),
            Buffer::UInt8(a) => take_numeric(a, index, Buffer::UInt8),
            Buffer::UInt16(a) => take_numeric(a, index, Buffer::UInt16),
            Buffer::UInt32(a) => take_numeric(a, index, Buffer::UInt32),
            Buffer::UInt64(a) => take_numeric(a, index, Buffer::UInt64),
            Buffer::Float32(a) => take_numeric(a, index, Buffer::Float32),
            Buffer::Float64(a) => take_numeric(a, index, Buffer::Float64),
        }
    }

    /// A contiguous `[start, stop)` slice along axis 0, sharing no data
    /// copy semantics with the caller beyond this owned clone (ndarray's
    /// `slice` gives a view; we own the result so nodes can be values).
    pub fn slice(&self, start: usize, stop: usize) -> Result<Buffer> {
        let len = self.len();
        if start > stop || stop > len {
            return Err(CoreError::OutOfBounds {
                index: stop as i64,
                len,
            });
        }
        let idx: Vec<usize> = (start..stop).collect();
        self.take(&idx)
    }

    fn as_f64_vec(&self) -> Vec<f64> {
        match self {
            Buffer::Bool(a) => a.iter().map(|&b| if b { 1.0 } else { 0.0 }).collect(),
            Buffer::Int8(a) => a.iter().map(|&v| v as f64).collect(),
            Buffer::Int16(a) => a.iter().map(|&v| v as f64).collect(),
            Buffer::Int32(a) => a.iter().map(|&v| v as f64).collect(),
            Buffer::Int64(a) => a.iter().map(|&v| v as f64).collect(),
            Buffer::UInt8(a) => a.iter().map(|&v| v as f64).collect(),
            Buffer::UInt16(a) => a.iter().map(|&v| v as f64).collect(),
            Buffer::UInt32(a) => a.iter().map(|&v| v as f64).collect(),
            Buffer::UInt64(a) => a.iter().map(|&v| v as f64).collect(),
            Buffer::Float32(a) => a.iter().map(|&v| v as f64).collect(),
            Buffer::Float64(a) => a.iter().cloned().collect(),
        }
    }

    fn as_i64_vec(&self) -> Vec<i64> {
        match self {
            Buffer::Bool(a) => a.iter().map(|&b| b as i64).collect(),
            Buffer::Int8(a) => a.iter().map(|&v| v as i64).collect(),
            Buffer::Int16(a) => a.iter().map(|&v| v as i64).collect(),
            Buffer::Int32(a) => a.iter().map(|&v| v as i64).collect(),
            Buffer::Int64(a) => a.iter().cloned().collect(),
            Buffer::UInt8(a) => a.iter().map(|&v| v as i64).collect(),
            Buffer::UInt16(a) => a.iter().map(|&v| v as i64).collect(),
            Buffer::UInt32(a) => a.iter().map(|&v| v as i64).collect(),
            Buffer::UInt64(a) => a.iter().map(|&v| v as i64).collect(),
            Buffer::Float32(a) => a.iter().map(|&v| v as i64).collect(),
            Buffer::Float64(a) => a.iter().map(|&v| v as i64).collect(),
        }
    }

    /// Cast every element to `target`, following the primitive library's
    /// promotion rules.
    pub fn cast(&self, target: DType) -> Buffer {
        if self.dtype() == target {
            return self.clone();
        }
        match target {
            DType::Bool => {
                Buffer::Bool(self.as_f64_vec().into_iter().map(|v| v != 0.0).collect::<Array1<_>>().into_dyn())
            }
            DType::Int8 => int_cast(self, |v| v as i8, Buffer::Int8),
            DType::Int16 => int_cast(self, |v| v as i16, Buffer::Int16),
            DType::Int32 => int_cast(self, |v| v as i32, Buffer::Int32),
            DType::Int64 => Buffer::Int64(Array1::from_vec(self.as_i64_vec()).into_dyn()),
            DType::UInt8 => int_cast(self, |v| v as u8, Buffer::UInt8),
            DType::UInt16 => int_cast(self, |v| v as u16, Buffer::UInt16),
            DType::UInt32 => int_cast(self, |v| v as u32, Buffer::UInt32),
            DType::UInt64 => int_cast(self, |v| v as u64, Buffer::UInt64),
            DType::Float32 => {
                Buffer::Float32(self.as_f64_vec().into_iter().map(|v| v as f32).collect::<Array1<_>>().into_dyn())
            }
            DType::Float64 => Buffer::Float64(Array1::from_vec(self.as_f64_vec()).into_dyn()),
        }
    }

    /// Elementwise binary kernel against another buffer of equal length,
    /// after promoting both operands to a shared dtype.
    pub fn binary(&self, op: BinOp, other: &Buffer) -> Result<Buffer> {
        if self.len() != other.len() {
            return Err(CoreError::LengthMismatch {
                context: "Buffer.binary",
                expected: self.len(),
                found: other.len(),
            });
        }
        let promoted = promote(self.dtype(), other.dtype());
        let a = self.cast(promoted);
        let b = other.cast(promoted);
        apply_same_dtype(op, &a, &b)
    }

    /// Elementwise binary kernel against a broadcast scalar: the scalar
    /// operand broadcasts by repetition.
    pub fn binary_scalar(&self, op: BinOp, scalar: Scalar) -> Result<Buffer> {
        let promoted = promote(self.dtype(), scalar.dtype());
        let a = self.cast(promoted);
        let b_vals = vec![scalar.as_f64(); self.len()];
        let b = Buffer::from_f64_vec(b_vals).cast(promoted);
        apply_same_dtype(op, &a, &b)
    }
}

fn take_numeric<T: Copy>(
    a: &ArrayD<T>,
    index: &[usize],
    wrap: impl Fn(ArrayD<T>) -> Buffer,
) -> Result<Buffer> {
    let mut out = Vec::with_capacity(index.len());
    for &i in index {
        if i >= a.len() {
            return Err(CoreError::OutOfBounds {
                index: i as i64,
                len: a.len(),
            });
        }
        out.push(a[IxDyn(&[i])]);
    }
    Ok(wrap(Array1::from_vec(out).into_dyn()))
}

fn int_cast<T: Copy>(buf: &Buffer, f: impl Fn(i64) -> T, wrap: impl Fn(ArrayD<T>) -> Buffer) -> Buffer {
    wrap(Array1::from_vec(buf.as_i64_vec().into_iter().map(f).collect()).into_dyn())
}

fn apply_same_dtype(op: BinOp, a: &Buffer, b: &Buffer) -> Result<Buffer> {
    macro_rules! numeric_arm {
        ($variant:ident, $a:expr, $b:expr) => {{
            let av = $a.iter().copied();
            let bv = $b.iter().copied();
            if op.is_comparison() {
                let out: Vec<bool> = av
                    .zip(bv)
                    .map(|(x, y)| compare(op, x, y))
                    .collect();
                Ok(Buffer::Bool(Array1::from_vec(out).into_dyn()))
            } else {
                let out: Vec<_> = av
                    .zip(bv)
                    .map(|(x, y)| arithmetic(op, x, y))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Buffer::$variant(Array1::from_vec(out).into_dyn()))
            }
        }};
    }
    match (a, b) {
        (Buffer::Bool(x), Buffer::Bool(y)) => {
            if op.is_comparison() {
                let out: Vec<bool> = x
                    .iter()
                    .zip(y.iter())
                    .map(|(&p, &q)| compare(op, p as i64, q as i64))
                    .collect();
                Ok(Buffer::Bool(Array1::from_vec(out).into_dyn()))
            } else {
                Err(CoreError::IncompatibleDType {
                    left: "bool".into(),
                    right: "bool".into(),
                })
            }
        }
        (Buffer::Int8(x), Buffer::Int8(y)) => numeric_arm!(Int8, x, y),
        (Buffer::Int16(x), Buffer::Int16(y)) => numeric_arm!(Int16, x, y),
        (Buffer::Int32(x), Buffer::Int32(y)) => numeric_arm!(Int32, x, y),
        (Buffer::Int64(x), Buffer::Int64(y)) => numeric_arm!(Int64, x, y),
        (Buffer::UInt8(x), Buffer::UInt8(y)) => numeric_arm!(UInt8, x, y),
        (Buffer::UInt16(x), Buffer::UInt16(y)) => numeric_arm!(UInt16, x, y),
        (Buffer::UInt32(x), Buffer::UInt32(y)) => numeric_arm!(UInt32, x, y),
        (Buffer::UInt64(x), Buffer::UInt64(y)) => numeric_arm!(UInt64, x, y),
        (Buffer::Float32(x), Buffer::Float32(y)) => numeric_arm!(Float32, x, y),
        (Buffer::Float64(x), Buffer::Float64(y)) => numeric_arm!(Float64, x, y),
        (left, right) => Err(CoreError::IncompatibleDType {
            left: left.dtype().to_string(),
            right: right.dtype().to_string(),
        }),
    }
}

fn compare<T: PartialOrd>(op: BinOp, a: T, b: T) -> bool {
    match op {
        BinOp::Gt => a > b,
        BinOp::Ge => a >= b,
        BinOp::Lt => a < b,
        BinOp::Le => a <= b,
        BinOp::Eq => a == b,
        _ => unreachable!("arithmetic op passed to compare"),
    }
}

fn arithmetic<T>(op: BinOp, a: T, b: T) -> Result<T>
where
    T: std::ops::Add<Output = T> + std::ops::Sub<Output = T> + std::ops::Mul<Output = T>,
{
    Ok(match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        _ => unreachable!("comparison op passed to arithmetic"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_scalar_preserves_length() {
        let buf = Buffer::from_f64_vec(vec![1.1, 2.2, 3.3]);
        let out = buf.binary_scalar(BinOp::Add, Scalar::Float(100.0)).unwrap();
        assert_eq!(out.len(), 3);
        match out {
            Buffer::Float64(a) => {
                assert!((a[IxDyn(&[0])] - 101.1).abs() < 1e-9);
                assert!((a[IxDyn(&[2])] - 103.3).abs() < 1e-9);
            }
            _ => panic!("expected float64"),
        }
    }

    #[test]
    fn gt_scalar_on_ints_promotes_to_bool() {
        let buf = Buffer::from_i64_vec(vec![1, 2, 3]);
        let out = buf.binary_scalar(BinOp::Gt, Scalar::Int(1)).unwrap();
        assert_eq!(out, Buffer::from_bool_vec(vec![false, true, true]));
    }

    #[test]
    fn binary_promotes_int_plus_float() {
        let x = Buffer::from_i64_vec(vec![1, 2]);
        let y = Buffer::from_f64_vec(vec![1.1, 2.2]);
        let out = x.binary(BinOp::Add, &y).unwrap();
        assert_eq!(out.dtype(), DType::Float64);
    }

    #[test]
    fn take_gathers_by_index() {
        let buf = Buffer::from_i64_vec(vec![10, 20, 30]);
        let out = buf.take(&[2, 0]).unwrap();
        assert_eq!(out, Buffer::from_i64_vec(vec![30, 10]));
    }

    #[test]
    fn take_out_of_range_errors() {
        let buf = Buffer::from_i64_vec(vec![10, 20, 30]);
        assert!(buf.take(&[5]).is_err());
    }
}
