//! Result types of MIR definitions.
//!
//! The order of the variants is significant: every kind up to and
//! including `Value` is something the interpreter can observe, everything
//! after `None` is an internal pointer representation that never escapes
//! compiled code.

use std::fmt;

/// Representation kind of an SSA value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum MirType {
    Undefined,
    Null,
    Boolean,
    Int32,
    Double,
    String,
    Object,
    /// Optimized-out or hole sentinel.
    Magic,
    /// A boxed value of any of the above.
    Value,
    /// No result.
    None,
    /// Raw pointer to an object's dynamic slots.
    Slots,
    /// Raw pointer to an object's element vector.
    Elements,
    /// Raw pointer to the slots of an enclosing function's frame.
    UpvarSlots,
    /// An interpreter frame, produced only by the OSR entry.
    StackFrame,
}

impl MirType {
    /// Printable name.
    pub const fn name(self) -> &'static str {
        match self {
            MirType::Undefined => "Undefined",
            MirType::Null => "Null",
            MirType::Boolean => "Bool",
            MirType::Int32 => "Int32",
            MirType::Double => "Double",
            MirType::String => "String",
            MirType::Object => "Object",
            MirType::Magic => "Magic",
            MirType::Value => "Value",
            MirType::None => "None",
            MirType::Slots => "Slots",
            MirType::Elements => "Elements",
            MirType::UpvarSlots => "UpvarSlots",
            MirType::StackFrame => "StackFrame",
        }
    }

    /// Int32 or Double.
    #[inline]
    pub const fn is_number(self) -> bool {
        matches!(self, MirType::Int32 | MirType::Double)
    }

    /// A concrete, unboxed interpreter type.
    #[inline]
    pub const fn is_primitive_or_object(self) -> bool {
        (self as u8) <= (MirType::Magic as u8)
    }

    /// Types that never reach the interpreter.
    #[inline]
    pub const fn is_internal(self) -> bool {
        (self as u8) > (MirType::None as u8)
    }

    /// Whether a value of this type can be boxed into a `Value`.
    #[inline]
    pub const fn is_boxable(self) -> bool {
        self.is_primitive_or_object()
    }

    /// The result of `typeof` for a value statically known to be of this
    /// type, when that is decidable.
    pub const fn type_of_name(self) -> Option<&'static str> {
        match self {
            MirType::Undefined => Some("undefined"),
            MirType::Null => Some("object"),
            MirType::Boolean => Some("boolean"),
            MirType::Int32 | MirType::Double => Some("number"),
            MirType::String => Some("string"),
            // Objects may be callable.
            _ => None,
        }
    }
}

impl fmt::Display for MirType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_kinds_follow_none() {
        assert!(MirType::Slots.is_internal());
        assert!(MirType::StackFrame.is_internal());
        assert!(!MirType::Value.is_internal());
        assert!(!MirType::None.is_internal());
    }

    #[test]
    fn test_boxable() {
        assert!(MirType::Int32.is_boxable());
        assert!(MirType::Object.is_boxable());
        assert!(!MirType::Value.is_boxable());
        assert!(!MirType::Elements.is_boxable());
    }

    #[test]
    fn test_type_of_name() {
        assert_eq!(MirType::Double.type_of_name(), Some("number"));
        assert_eq!(MirType::Null.type_of_name(), Some("object"));
        assert_eq!(MirType::Object.type_of_name(), None);
    }
}
