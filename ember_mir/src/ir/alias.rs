//! Memory-effect classification of instructions.
//!
//! An [`AliasSet`] is a bitmask over four disjoint memory categories plus a
//! store direction bit:
//!
//! ```text
//!   bit 0   object fields (shape, slots pointer, elements header)
//!   bit 1   dense element
//!   bit 2   fixed or dynamic slot
//!   bit 3   typed array element
//!   bit 31  store
//! ```
//!
//! Two sets interfere when their category bits intersect. `None` touches no
//! memory, so the instruction may be reordered or removed freely. Anything
//! that does not say otherwise is `Store(Any)`.

use std::fmt;
use std::ops::{BitAnd, BitOr};

bitflags::bitflags! {
    /// Raw alias bits.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct AliasFlags: u32 {
        const OBJECT_FIELDS = 1 << 0;
        const ELEMENT = 1 << 1;
        const SLOT = 1 << 2;
        const TYPED_ARRAY_ELEMENT = 1 << 3;
        const ANY = Self::OBJECT_FIELDS.bits()
            | Self::ELEMENT.bits()
            | Self::SLOT.bits()
            | Self::TYPED_ARRAY_ELEMENT.bits();
        const STORE = 1 << 31;
    }
}

/// Number of distinct memory categories.
pub const NUM_CATEGORIES: usize = 4;

/// Memory footprint of an instruction.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct AliasSet(AliasFlags);

impl AliasSet {
    /// No memory interaction.
    #[inline]
    pub const fn none() -> Self {
        AliasSet(AliasFlags::empty())
    }

    /// Reads from `flags`.
    #[inline]
    pub fn load(flags: AliasFlags) -> Self {
        debug_assert!(!flags.is_empty(), "load of an empty category set");
        debug_assert!(!flags.contains(AliasFlags::STORE), "load carries the store bit");
        AliasSet(flags)
    }

    /// Writes to `flags`.
    #[inline]
    pub fn store(flags: AliasFlags) -> Self {
        debug_assert!(!flags.is_empty(), "store to an empty category set");
        debug_assert!(!flags.contains(AliasFlags::STORE), "store bit passed twice");
        AliasSet(flags | AliasFlags::STORE)
    }

    /// Raw bits are all clear.
    #[inline]
    pub fn is_none(self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn is_store(self) -> bool {
        self.0.contains(AliasFlags::STORE)
    }

    #[inline]
    pub fn is_load(self) -> bool {
        !self.is_none() && !self.is_store()
    }

    /// Category bits without the direction bit.
    #[inline]
    pub fn flags(self) -> AliasFlags {
        self.0 & AliasFlags::ANY
    }

    /// Whether a store in one set may change what a load in the other reads.
    #[inline]
    pub fn intersects(self, other: AliasSet) -> bool {
        !(self.flags() & other.flags()).is_empty()
    }

    /// Category indices (0..NUM_CATEGORIES) present in this set.
    pub fn categories(self) -> impl Iterator<Item = usize> {
        let bits = self.flags().bits();
        (0..NUM_CATEGORIES).filter(move |i| bits & (1 << i) != 0)
    }
}

impl Default for AliasSet {
    /// Instructions are effectful unless they declare otherwise.
    fn default() -> Self {
        AliasSet::store(AliasFlags::ANY)
    }
}

impl BitOr for AliasSet {
    type Output = AliasSet;

    fn bitor(self, rhs: AliasSet) -> AliasSet {
        AliasSet(self.0 | rhs.0)
    }
}

impl BitAnd for AliasSet {
    type Output = AliasSet;

    fn bitand(self, rhs: AliasSet) -> AliasSet {
        AliasSet(self.0 & rhs.0)
    }
}

impl fmt::Debug for AliasSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            return f.write_str("None");
        }
        let dir = if self.is_store() { "Store" } else { "Load" };
        write!(f, "{}({:?})", dir, self.flags())
    }
}
