//! Fixed-width bit sets over the `u8` id spaces.
//!
//! Iteration always yields ids in ascending order. Several resolver steps
//! rely on that (consumer visiting, emission order, target tie-breaks).

use crate::pipeline::id::{FeatureId, MetadataId, NodeId, PathId, TypeId, MAX_IDS};
use std::fmt;
use std::marker::PhantomData;

/// An id that maps onto a bit position. Ids at or past [`MAX_IDS`] have no
/// bit and are never members of a set.
pub trait BitIndex: Copy {
    fn bit(self) -> u32;
    fn from_bit(bit: u32) -> Self;
}

macro_rules! bit_index {
    ($($ty:ident),*) => {
        $(impl BitIndex for $ty {
            #[inline]
            fn bit(self) -> u32 {
                self.0 as u32
            }

            #[inline]
            fn from_bit(bit: u32) -> Self {
                $ty(bit as u8)
            }
        })*
    };
}

bit_index!(NodeId, TypeId, FeatureId, MetadataId, PathId);

/// Set of ids backed by a single `u64`.
pub struct IdSet<T> {
    bits: u64,
    _marker: PhantomData<T>,
}

pub type NodeSet = IdSet<NodeId>;
pub type FeatureSet = IdSet<FeatureId>;
pub type PathSet = IdSet<PathId>;
pub type MetadataSet = IdSet<MetadataId>;

impl<T: BitIndex> IdSet<T> {
    pub const fn new() -> Self {
        Self {
            bits: 0,
            _marker: PhantomData,
        }
    }

    #[inline]
    fn mask(id: T) -> u64 {
        if id.bit() < MAX_IDS as u32 {
            1u64 << id.bit()
        } else {
            0
        }
    }

    /// Add `id`; returns true if it was not present. Out-of-range ids are
    /// refused.
    #[inline]
    pub fn insert(&mut self, id: T) -> bool {
        let mask = Self::mask(id);
        if mask == 0 {
            return false;
        }
        let fresh = self.bits & mask == 0;
        self.bits |= mask;
        fresh
    }

    /// Remove `id`; returns true if it was present.
    #[inline]
    pub fn remove(&mut self, id: T) -> bool {
        let mask = Self::mask(id);
        let present = self.bits & mask != 0;
        self.bits &= !mask;
        present
    }

    #[inline]
    pub fn contains(&self, id: T) -> bool {
        self.bits & Self::mask(id) != 0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// Population count.
    #[inline]
    pub fn len(&self) -> usize {
        self.bits.count_ones() as usize
    }

    #[inline]
    pub fn union_with(&mut self, other: &Self) {
        self.bits |= other.bits;
    }

    #[inline]
    pub fn intersects(&self, other: &Self) -> bool {
        self.bits & other.bits != 0
    }

    pub fn clear(&mut self) {
        self.bits = 0;
    }

    /// Ids in ascending order.
    pub fn iter(&self) -> IdSetIter<T> {
        IdSetIter {
            bits: self.bits,
            _marker: PhantomData,
        }
    }
}

// Manual impls: derives would put bounds on `T`.
impl<T> Clone for IdSet<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for IdSet<T> {}

impl<T> PartialEq for IdSet<T> {
    fn eq(&self, other: &Self) -> bool {
        self.bits == other.bits
    }
}

impl<T> Eq for IdSet<T> {}

impl<T: BitIndex> Default for IdSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: BitIndex> FromIterator<T> for IdSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::new();
        for id in iter {
            set.insert(id);
        }
        set
    }
}

impl<T: BitIndex> Extend<T> for IdSet<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for id in iter {
            self.insert(id);
        }
    }
}

impl<'a, T: BitIndex> IntoIterator for &'a IdSet<T> {
    type Item = T;
    type IntoIter = IdSetIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: BitIndex + fmt::Display> fmt::Debug for IdSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, id) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", id)?;
        }
        f.write_str("}")
    }
}

/// Ascending iterator over an [`IdSet`].
pub struct IdSetIter<T> {
    bits: u64,
    _marker: PhantomData<T>,
}

impl<T: BitIndex> Iterator for IdSetIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.bits == 0 {
            return None;
        }
        let bit = self.bits.trailing_zeros();
        self.bits &= self.bits - 1;
        Some(T::from_bit(bit))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.bits.count_ones() as usize;
        (n, Some(n))
    }
}
