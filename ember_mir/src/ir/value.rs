//! Constant payloads and opaque heap handles.
//!
//! Constants follow JS number semantics: integral doubles other than `-0`
//! are stored as `Int32`, so `ConstValue::number(3.0)` and
//! `ConstValue::Int32(3)` are the same constant.

use super::types::MirType;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Interned property or variable name.
pub type Atom = Arc<str>;

/// Opaque handle to a GC thing owned by the runtime (shape, class, template
/// object, script, function). The MIR core only compares these.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeapRef(pub u64);

/// Magic sentinel kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MagicKind {
    ElementsHole,
    OptimizedOut,
    ArgumentsObject,
}

/// Payload of a `Constant` instruction.
#[derive(Clone, Debug)]
pub enum ConstValue {
    Undefined,
    Null,
    Boolean(bool),
    Int32(i32),
    Double(f64),
    String(Atom),
    Object(HeapRef),
    Magic(MagicKind),
}

impl ConstValue {
    /// Normalize a number: integral, in-range, non-negative-zero doubles
    /// become `Int32`.
    pub fn number(d: f64) -> Self {
        let i = d as i32;
        if i as f64 == d && !(d == 0.0 && d.is_sign_negative()) {
            ConstValue::Int32(i)
        } else {
            ConstValue::Double(d)
        }
    }

    /// The MIR type a constant of this value produces.
    pub fn mir_type(&self) -> MirType {
        match self {
            ConstValue::Undefined => MirType::Undefined,
            ConstValue::Null => MirType::Null,
            ConstValue::Boolean(_) => MirType::Boolean,
            ConstValue::Int32(_) => MirType::Int32,
            ConstValue::Double(_) => MirType::Double,
            ConstValue::String(_) => MirType::String,
            ConstValue::Object(_) => MirType::Object,
            ConstValue::Magic(_) => MirType::Magic,
        }
    }

    #[inline]
    pub fn is_number(&self) -> bool {
        matches!(self, ConstValue::Int32(_) | ConstValue::Double(_))
    }

    /// Numeric value, for `Int32` and `Double` only.
    pub fn to_number(&self) -> Option<f64> {
        match *self {
            ConstValue::Int32(i) => Some(i as f64),
            ConstValue::Double(d) => Some(d),
            _ => None,
        }
    }

    /// JS `ToInt32` of a numeric constant.
    pub fn to_int32(&self) -> Option<i32> {
        match *self {
            ConstValue::Int32(i) => Some(i),
            ConstValue::Double(d) => Some(js_to_int32(d)),
            _ => None,
        }
    }

    #[inline]
    pub fn as_int32(&self) -> Option<i32> {
        match *self {
            ConstValue::Int32(i) => Some(i),
            _ => None,
        }
    }

    /// JS truthiness. Objects are always truthy; magic values have none.
    pub fn to_boolean(&self) -> Option<bool> {
        Some(match self {
            ConstValue::Undefined | ConstValue::Null => false,
            ConstValue::Boolean(b) => *b,
            ConstValue::Int32(i) => *i != 0,
            ConstValue::Double(d) => !(*d == 0.0 || d.is_nan()),
            ConstValue::String(s) => !s.is_empty(),
            ConstValue::Object(_) => true,
            ConstValue::Magic(_) => return None,
        })
    }
}

/// JS `ToInt32`: truncate toward zero and wrap modulo 2^32.
pub fn js_to_int32(d: f64) -> i32 {
    if !d.is_finite() {
        return 0;
    }
    let wrapped = d.trunc().rem_euclid(4_294_967_296.0);
    wrapped as u64 as u32 as i32
}

impl PartialEq for ConstValue {
    /// Bitwise identity: `-0` differs from `+0` and `NaN` equals itself.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ConstValue::Undefined, ConstValue::Undefined) => true,
            (ConstValue::Null, ConstValue::Null) => true,
            (ConstValue::Boolean(a), ConstValue::Boolean(b)) => a == b,
            (ConstValue::Int32(a), ConstValue::Int32(b)) => a == b,
            (ConstValue::Double(a), ConstValue::Double(b)) => a.to_bits() == b.to_bits(),
            (ConstValue::String(a), ConstValue::String(b)) => a == b,
            (ConstValue::Object(a), ConstValue::Object(b)) => a == b,
            (ConstValue::Magic(a), ConstValue::Magic(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ConstValue {}

impl Hash for ConstValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            ConstValue::Undefined | ConstValue::Null => {}
            ConstValue::Boolean(b) => b.hash(state),
            ConstValue::Int32(i) => i.hash(state),
            ConstValue::Double(d) => d.to_bits().hash(state),
            ConstValue::String(s) => s.hash(state),
            ConstValue::Object(o) => o.hash(state),
            ConstValue::Magic(m) => m.hash(state),
        }
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Undefined => f.write_str("undefined"),
            ConstValue::Null => f.write_str("null"),
            ConstValue::Boolean(b) => write!(f, "{}", b),
            ConstValue::Int32(i) => write!(f, "{}", i),
            ConstValue::Double(d) => write!(f, "{:?}", d),
            ConstValue::String(s) => write!(f, "{:?}", s),
            ConstValue::Object(o) => write!(f, "object {:#x}", o.0),
            ConstValue::Magic(m) => write!(f, "magic {:?}", m),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_normalizes_integral_doubles() {
        assert_eq!(ConstValue::number(4.0), ConstValue::Int32(4));
        assert_eq!(ConstValue::number(0.5), ConstValue::Double(0.5));
        assert_eq!(ConstValue::number(-0.0).mir_type(), MirType::Double);
        assert_eq!(ConstValue::number(4_294_967_295.0).mir_type(), MirType::Double);
    }

    #[test]
    fn test_negative_zero_is_distinct() {
        assert_ne!(ConstValue::Double(-0.0), ConstValue::Double(0.0));
        assert_eq!(ConstValue::Double(f64::NAN), ConstValue::Double(f64::NAN));
    }

    #[test]
    fn test_js_to_int32_wraps() {
        assert_eq!(js_to_int32(4_294_967_297.0), 1);
        assert_eq!(js_to_int32(2_147_483_648.0), i32::MIN);
        assert_eq!(js_to_int32(-1.9), -1);
        assert_eq!(js_to_int32(f64::NAN), 0);
        assert_eq!(js_to_int32(f64::INFINITY), 0);
    }

    #[test]
    fn test_truthiness() {
        assert_eq!(ConstValue::Double(f64::NAN).to_boolean(), Some(false));
        assert_eq!(ConstValue::String("".into()).to_boolean(), Some(false));
        assert_eq!(ConstValue::Object(HeapRef(1)).to_boolean(), Some(true));
        assert_eq!(ConstValue::Magic(MagicKind::ElementsHole).to_boolean(), None);
    }
}
