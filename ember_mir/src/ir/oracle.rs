//! Interface to the type-inference collaborator.
//!
//! The oracle reports, per bytecode site, which primitive types and
//! objects have been observed. `infer` hooks consult these summaries to
//! pick a specialization; the answer is advisory and every specialization
//! is re-checked at runtime by a guard or a fallible conversion.

use super::types::MirType;

bitflags::bitflags! {
    /// Observed-type bits.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct TypeFlags: u16 {
        const UNDEFINED = 1 << 0;
        const NULL = 1 << 1;
        const BOOLEAN = 1 << 2;
        const INT32 = 1 << 3;
        const DOUBLE = 1 << 4;
        const STRING = 1 << 5;
        const OBJECT = 1 << 6;
        const MAGIC = 1 << 7;
        /// Anything at all; absorbs every other bit.
        const UNKNOWN = 1 << 15;
    }
}

/// Summary of the types observed at one site.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct TypeSet {
    flags: TypeFlags,
}

impl TypeSet {
    /// Nothing observed yet.
    pub const fn empty() -> Self {
        TypeSet {
            flags: TypeFlags::empty(),
        }
    }

    /// No information; any type is possible.
    pub const fn unknown() -> Self {
        TypeSet {
            flags: TypeFlags::UNKNOWN,
        }
    }

    /// A set holding exactly `ty`.
    pub fn of(ty: MirType) -> Self {
        Self::empty().with(ty)
    }

    /// Add `ty` to the set. `Value` makes the set unknown.
    pub fn with(mut self, ty: MirType) -> Self {
        self.flags |= match ty {
            MirType::Undefined => TypeFlags::UNDEFINED,
            MirType::Null => TypeFlags::NULL,
            MirType::Boolean => TypeFlags::BOOLEAN,
            MirType::Int32 => TypeFlags::INT32,
            MirType::Double => TypeFlags::DOUBLE,
            MirType::String => TypeFlags::STRING,
            MirType::Object => TypeFlags::OBJECT,
            MirType::Magic => TypeFlags::MAGIC,
            _ => TypeFlags::UNKNOWN,
        };
        self
    }

    #[inline]
    pub fn flags(self) -> TypeFlags {
        self.flags
    }

    #[inline]
    pub fn is_unknown(self) -> bool {
        self.flags.contains(TypeFlags::UNKNOWN)
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.flags.is_empty()
    }

    /// Whether a value of type `ty` may appear.
    pub fn may_be(self, ty: MirType) -> bool {
        self.is_unknown() || Self::of(ty).flags.intersects(self.flags)
    }

    #[inline]
    pub fn maybe_object(self) -> bool {
        self.may_be(MirType::Object)
    }

    /// Every observed type is a primitive other than string.
    pub fn known_non_string_primitive(self) -> bool {
        !self.is_unknown()
            && !self.is_empty()
            && !self
                .flags
                .intersects(TypeFlags::STRING | TypeFlags::OBJECT | TypeFlags::MAGIC)
    }

    /// The single type observed, if there is one. Int32 together with
    /// Double reads as Double.
    pub fn known_type(self) -> MirType {
        if self.is_unknown() {
            return MirType::Value;
        }
        let numbers = TypeFlags::INT32 | TypeFlags::DOUBLE;
        if self.flags == numbers {
            return MirType::Double;
        }
        match self.flags {
            f if f == TypeFlags::UNDEFINED => MirType::Undefined,
            f if f == TypeFlags::NULL => MirType::Null,
            f if f == TypeFlags::BOOLEAN => MirType::Boolean,
            f if f == TypeFlags::INT32 => MirType::Int32,
            f if f == TypeFlags::DOUBLE => MirType::Double,
            f if f == TypeFlags::STRING => MirType::String,
            f if f == TypeFlags::OBJECT => MirType::Object,
            f if f == TypeFlags::MAGIC => MirType::Magic,
            f if f.is_empty() => MirType::None,
            _ => MirType::Value,
        }
    }
}

/// Observed types at a unary site.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnaryTypes {
    pub input: TypeSet,
    pub output: TypeSet,
}

/// Observed types at a binary site. `rhs` is absent when the right operand
/// was never observed (e.g. a constant).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BinaryTypes {
    pub lhs: TypeSet,
    pub rhs: Option<TypeSet>,
    pub output: TypeSet,
}

impl BinaryTypes {
    pub fn new(lhs: TypeSet, rhs: TypeSet, output: TypeSet) -> Self {
        BinaryTypes {
            lhs,
            rhs: Some(rhs),
            output,
        }
    }
}

/// Type information supplied by the type-inference subsystem.
pub trait TypeOracle {
    fn unary_types(&self, pc: u32) -> UnaryTypes;
    fn binary_types(&self, pc: u32) -> BinaryTypes;
    fn parameter_types(&self, index: i32) -> TypeSet;
    fn return_types(&self, pc: u32) -> TypeSet;
}

/// Oracle with no information: every site may produce anything.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnknownOracle;

impl TypeOracle for UnknownOracle {
    fn unary_types(&self, _pc: u32) -> UnaryTypes {
        UnaryTypes {
            input: TypeSet::unknown(),
            output: TypeSet::unknown(),
        }
    }

    fn binary_types(&self, _pc: u32) -> BinaryTypes {
        BinaryTypes::new(TypeSet::unknown(), TypeSet::unknown(), TypeSet::unknown())
    }

    fn parameter_types(&self, _index: i32) -> TypeSet {
        TypeSet::unknown()
    }

    fn return_types(&self, _pc: u32) -> TypeSet {
        TypeSet::unknown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_type_single() {
        assert_eq!(TypeSet::of(MirType::Int32).known_type(), MirType::Int32);
        assert_eq!(TypeSet::empty().known_type(), MirType::None);
        assert_eq!(TypeSet::unknown().known_type(), MirType::Value);
    }

    #[test]
    fn test_int_and_double_read_as_double() {
        let set = TypeSet::of(MirType::Int32).with(MirType::Double);
        assert_eq!(set.known_type(), MirType::Double);
        assert!(set.known_non_string_primitive());
    }

    #[test]
    fn test_mixed_types_are_value() {
        let set = TypeSet::of(MirType::Int32).with(MirType::String);
        assert_eq!(set.known_type(), MirType::Value);
        assert!(!set.known_non_string_primitive());
        assert!(set.may_be(MirType::String));
        assert!(!set.maybe_object());
    }

    #[test]
    fn test_unknown_may_be_anything() {
        let set = TypeSet::unknown();
        assert!(set.maybe_object());
        assert!(!set.known_non_string_primitive());
        assert_eq!(UnknownOracle.parameter_types(-1), set);
    }
}
