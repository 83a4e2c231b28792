//! The value model the engine samples and orders.
//!
//! A [`Datum`] is an opaque typed value; the engine only needs a total
//! order under the session comparator, equality over the canonical byte
//! encoding, and deep copies. [`EvalContext`] carries the session state
//! (collation) that comparison and encoding depend on.

use std::cmp::Ordering;

use crate::error::{CompareSnafu, EncodeSnafu, Result};

const TAG_NULL: u8 = 0x00;
const TAG_INT: u8 = 0x01;
const TAG_FLOAT: u8 = 0x02;
const TAG_BYTES: u8 = 0x03;
const TAG_STR: u8 = 0x04;

const SIGN_FLIP: u64 = 0x8000_0000_0000_0000;

#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Null,
    Int(i64),
    Float(f64),
    Bytes(Vec<u8>),
    Str(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatumKind {
    Null,
    Int,
    Float,
    Bytes,
    Str,
}

impl Datum {
    pub fn kind(&self) -> DatumKind {
        match self {
            Datum::Null => DatumKind::Null,
            Datum::Int(_) => DatumKind::Int,
            Datum::Float(_) => DatumKind::Float,
            Datum::Bytes(_) => DatumKind::Bytes,
            Datum::Str(_) => DatumKind::Str,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }
}

/// String comparison rules supplied by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Collation {
    #[default]
    Binary,
    CaseInsensitive,
}

impl Collation {
    /// Sort key for a string under this collation. Two strings are equal
    /// exactly when their keys are byte-equal.
    pub fn key(&self, s: &str) -> Vec<u8> {
        match self {
            Collation::Binary => s.as_bytes().to_vec(),
            Collation::CaseInsensitive => s.to_lowercase().into_bytes(),
        }
    }
}

/// Session-scoped comparison and encoding environment.
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    pub collation: Collation,
}

impl EvalContext {
    /// Total order over datums. Nulls sort first; ints and floats compare
    /// numerically against each other; strings compare by collation key.
    /// Any other cross-kind comparison is a session error.
    pub fn compare(&self, left: &Datum, right: &Datum) -> Result<Ordering> {
        let ord = match (left, right) {
            (Datum::Null, Datum::Null) => Ordering::Equal,
            (Datum::Null, _) => Ordering::Less,
            (_, Datum::Null) => Ordering::Greater,
            (Datum::Int(a), Datum::Int(b)) => a.cmp(b),
            (Datum::Float(a), Datum::Float(b)) => a.total_cmp(b),
            (Datum::Int(a), Datum::Float(b)) => (*a as f64).total_cmp(b),
            (Datum::Float(a), Datum::Int(b)) => a.total_cmp(&(*b as f64)),
            (Datum::Str(a), Datum::Str(b)) => self.collation.key(a).cmp(&self.collation.key(b)),
            (Datum::Bytes(a), Datum::Bytes(b)) => a.cmp(b),
            (Datum::Str(a), Datum::Bytes(b)) => self.collation.key(a).as_slice().cmp(b),
            (Datum::Bytes(a), Datum::Str(b)) => a.as_slice().cmp(&self.collation.key(b)),
            _ => {
                return CompareSnafu {
                    left: left.kind(),
                    right: right.kind(),
                }
                .fail()
            }
        };
        Ok(ord)
    }

    /// Canonical tagged encoding, used for equality, sketch hashing, and
    /// size accounting. The first byte is the kind tag.
    pub fn encode_value(&self, datum: &Datum) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(9);
        match datum {
            Datum::Null => buf.push(TAG_NULL),
            Datum::Int(v) => {
                buf.push(TAG_INT);
                buf.extend_from_slice(&v.to_le_bytes());
            }
            Datum::Float(v) => {
                buf.push(TAG_FLOAT);
                buf.extend_from_slice(&v.to_bits().to_le_bytes());
            }
            Datum::Bytes(b) => {
                buf.push(TAG_BYTES);
                buf.extend_from_slice(b);
            }
            Datum::Str(s) => {
                buf.push(TAG_STR);
                buf.extend_from_slice(&self.collation.key(s));
            }
        }
        Ok(buf)
    }

    /// Order-preserving encoding: for datums of the same kind, byte order
    /// of the keys matches [`EvalContext::compare`].
    pub fn encode_key(&self, datum: &Datum) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(9);
        match datum {
            Datum::Null => buf.push(TAG_NULL),
            Datum::Int(v) => {
                buf.push(TAG_INT);
                buf.extend_from_slice(&(*v as u64 ^ SIGN_FLIP).to_be_bytes());
            }
            Datum::Float(v) => {
                if v.is_nan() {
                    return EncodeSnafu {
                        kind: DatumKind::Float,
                        reason: "NaN has no position in the key order".to_string(),
                    }
                    .fail();
                }
                buf.push(TAG_FLOAT);
                let bits = v.to_bits();
                let ordered = if bits & SIGN_FLIP == 0 {
                    bits | SIGN_FLIP
                } else {
                    !bits
                };
                buf.extend_from_slice(&ordered.to_be_bytes());
            }
            Datum::Bytes(b) => {
                buf.push(TAG_BYTES);
                buf.extend_from_slice(b);
            }
            Datum::Str(s) => {
                buf.push(TAG_STR);
                buf.extend_from_slice(&self.collation.key(s));
            }
        }
        Ok(buf)
    }

    /// Replaces a string datum with its collation key so that everything
    /// downstream (sorting, equality, sketches) observes collation. Asking
    /// for a collation key of a non-string datum is a session error.
    pub fn collation_key_datum(&self, collation: Collation, datum: &Datum) -> Result<Datum> {
        match datum {
            Datum::Str(s) => Ok(Datum::Bytes(collation.key(s))),
            other => EncodeSnafu {
                kind: other.kind(),
                reason: "collator applied to a non-string column".to_string(),
            }
            .fail(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> EvalContext {
        EvalContext::default()
    }

    #[test]
    fn null_sorts_first() {
        let c = ctx();
        assert_eq!(
            c.compare(&Datum::Null, &Datum::Int(i64::MIN)).unwrap(),
            Ordering::Less
        );
        assert_eq!(c.compare(&Datum::Null, &Datum::Null).unwrap(), Ordering::Equal);
    }

    #[test]
    fn numeric_widening() {
        let c = ctx();
        assert_eq!(
            c.compare(&Datum::Int(2), &Datum::Float(2.5)).unwrap(),
            Ordering::Less
        );
        assert_eq!(
            c.compare(&Datum::Float(3.0), &Datum::Int(3)).unwrap(),
            Ordering::Equal
        );
    }

    #[test]
    fn cross_kind_comparison_fails() {
        let c = ctx();
        assert!(c.compare(&Datum::Int(1), &Datum::Str("1".into())).is_err());
    }

    #[test]
    fn case_insensitive_collation() {
        let c = EvalContext {
            collation: Collation::CaseInsensitive,
        };
        assert_eq!(
            c.compare(&Datum::Str("ABC".into()), &Datum::Str("abc".into()))
                .unwrap(),
            Ordering::Equal
        );
        assert_eq!(
            c.encode_value(&Datum::Str("ABC".into())).unwrap(),
            c.encode_value(&Datum::Str("abc".into())).unwrap()
        );
    }

    #[test]
    fn key_order_matches_comparator_for_ints() {
        let c = ctx();
        let values = [i64::MIN, -100, -1, 0, 1, 42, i64::MAX];
        for w in values.windows(2) {
            let a = c.encode_key(&Datum::Int(w[0])).unwrap();
            let b = c.encode_key(&Datum::Int(w[1])).unwrap();
            assert!(a < b, "{} should key-sort before {}", w[0], w[1]);
        }
    }

    #[test]
    fn key_order_matches_comparator_for_floats() {
        let c = ctx();
        let values = [f64::NEG_INFINITY, -10.5, -0.25, 0.0, 0.25, 3.5, f64::INFINITY];
        for w in values.windows(2) {
            let a = c.encode_key(&Datum::Float(w[0])).unwrap();
            let b = c.encode_key(&Datum::Float(w[1])).unwrap();
            assert!(a < b, "{} should key-sort before {}", w[0], w[1]);
        }
    }

    #[test]
    fn nan_key_is_rejected() {
        assert!(ctx().encode_key(&Datum::Float(f64::NAN)).is_err());
    }

    #[test]
    fn value_encoding_starts_with_tag_byte() {
        let c = ctx();
        let encoded = c.encode_value(&Datum::Int(7)).unwrap();
        assert_eq!(encoded.len(), 9);
        let encoded = c.encode_value(&Datum::Bytes(vec![1, 2, 3])).unwrap();
        assert_eq!(encoded.len(), 4);
    }

    #[test]
    fn collation_key_datum_rejects_non_strings() {
        let c = ctx();
        assert!(c
            .collation_key_datum(Collation::Binary, &Datum::Int(3))
            .is_err());
        let keyed = c
            .collation_key_datum(Collation::CaseInsensitive, &Datum::Str("MiXeD".into()))
            .unwrap();
        assert_eq!(keyed, Datum::Bytes(b"mixed".to_vec()));
    }
}
