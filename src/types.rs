//! The logical type algebra: primitives, `option(T)`, `array(n, T)`,
//! `product` (`&`, record concatenation) and `sum` (`|`, tagged union),
//! with structural equality modulo field/alternative reordering.

use crate::dtype::DType;
use std::fmt;

/// `array`'s length: a concrete bound or "unbounded" (jagged sublists).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayLength {
    Exact(usize),
    Unbounded,
}

#[derive(Debug, Clone)]
pub enum LogicalType {
    Primitive(DType),
    Utf8,
    Bytes,
    Option(Box<LogicalType>),
    Array(ArrayLength, Box<LogicalType>),
    /// Record concatenation `A & B`. Fields carry their first-seen order;
    /// equality compares as sets (commutative up to field order).
    Product(Vec<(String, LogicalType)>),
    /// Tagged union `T1 | T2 | ...`, deduplicated by structural equality,
    /// alternatives carrying first-seen order; equality compares as sets.
    Sum(Vec<LogicalType>),
}

impl LogicalType {
    pub fn option(inner: LogicalType) -> LogicalType {
        if let LogicalType::Option(_) = &inner {
            inner
        } else {
            LogicalType::Option(Box::new(inner))
        }
    }

    pub fn array(len: ArrayLength, inner: LogicalType) -> LogicalType {
        LogicalType::Array(len, Box::new(inner))
    }

    /// `A & B`: concatenate products (a bare non-product operand is treated
    /// as a single-field product under a synthetic name, matching how a
    /// table with one named column already looks).
    pub fn product(self, other: LogicalType) -> LogicalType {
        let mut fields = into_fields(self);
        fields.extend(into_fields(other));
        LogicalType::Product(fields)
    }

    /// `A | B`, deduplicating structurally-equal alternatives and
    /// flattening nested sums, preserving first-seen order.
    pub fn sum(self, other: LogicalType) -> LogicalType {
        let mut alts = Vec::new();
        push_flattened(&mut alts, self);
        push_flattened(&mut alts, other);
        LogicalType::Sum(alts)
    }
}

fn into_fields(t: LogicalType) -> Vec<(String, LogicalType)> {
    match t {
        LogicalType::Product(fields) => fields,
        other => vec![("_".to_string(), other)],
    }
}

fn push_flattened(alts: &mut Vec<LogicalType>, t: LogicalType) {
    match t {
        LogicalType::Sum(inner) => {
            for a in inner {
                push_flattened(alts, a);
            }
        }
        other => {
            if !alts.iter().any(|existing| existing == &other) {
                alts.push(other);
            }
        }
    }
}

/// Structural equality: products compare as field-name-keyed sets, sums as
/// sets without duplicates (structural modulo field reordering in products
/// and alternative reordering in sums).
impl PartialEq for LogicalType {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (LogicalType::Primitive(a), LogicalType::Primitive(b)) => a == b,
            (LogicalType::Utf8, LogicalType::Utf8) => true,
            (LogicalType::Bytes, LogicalType::Bytes) => true,
            (LogicalType::Option(a), LogicalType::Option(b)) => a == b,
            (LogicalType::Array(la, a), LogicalType::Array(lb, b)) => la == lb && a == b,
            (LogicalType::Product(a), LogicalType::Product(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(name, t)| {
                        b.iter().any(|(n2, t2)| n2 == name && t2 == t)
                    })
            }
            (LogicalType::Sum(a), LogicalType::Sum(b)) => {
                a.len() == b.len() && a.iter().all(|t| b.iter().any(|t2| t2 == t))
            }
            _ => false,
        }
    }
}

impl Eq for LogicalType {}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalType::Primitive(d) => write!(f, "{}", d),
            LogicalType::Utf8 => write!(f, "string"),
            LogicalType::Bytes => write!(f, "bytes"),
            LogicalType::Option(inner) => write!(f, "option({})", inner),
            LogicalType::Array(ArrayLength::Exact(n), inner) => write!(f, "array({}, {})", n, inner),
            LogicalType::Array(ArrayLength::Unbounded, inner) => write!(f, "array(*, {})", inner),
            LogicalType::Product(fields) => {
                write!(f, "(")?;
                for (i, (name, t)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, " & ")?;
                    }
                    write!(f, "{}: {}", name, t)?;
                }
                write!(f, ")")
            }
            LogicalType::Sum(alts) => {
                write!(f, "(")?;
                for (i, t) in alts.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{}", t)?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_dedups_structurally_equal_alternatives() {
        let a = LogicalType::Primitive(DType::Int64);
        let b = LogicalType::Primitive(DType::Int64);
        let c = LogicalType::Utf8;
        let t = a.sum(b).sum(c);
        match t {
            LogicalType::Sum(alts) => assert_eq!(alts.len(), 2),
            _ => panic!("expected Sum"),
        }
    }

    #[test]
    fn option_of_option_collapses() {
        let t = LogicalType::option(LogicalType::option(LogicalType::Utf8));
        assert_eq!(t, LogicalType::Option(Box::new(LogicalType::Utf8)));
    }

    #[test]
    fn product_equality_ignores_field_order() {
        let a = LogicalType::Product(vec![
            ("x".into(), LogicalType::Primitive(DType::Int64)),
            ("y".into(), LogicalType::Primitive(DType::Float64)),
        ]);
        let b = LogicalType::Product(vec![
            ("y".into(), LogicalType::Primitive(DType::Float64)),
            ("x".into(), LogicalType::Primitive(DType::Int64)),
        ]);
        assert_eq!(a, b);
    }

    #[test]
    fn sum_equality_ignores_alternative_order() {
        let a = LogicalType::Sum(vec![LogicalType::Utf8, LogicalType::Primitive(DType::Int64)]);
        let b = LogicalType::Sum(vec![LogicalType::Primitive(DType::Int64), LogicalType::Utf8]);
        assert_eq!(a, b);
    }
}
