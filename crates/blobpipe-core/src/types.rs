use std::ops::{BitAnd, BitOr, BitOrAssign, Not};

use crate::error::BlobPipeError;

pub type Result<T> = std::result::Result<T, BlobPipeError>;

/// Bitset of entity categories a consumer wants decoded.
///
/// The mask is carried to the block decoder with every payload so that it can
/// skip records the consumer is not interested in. A mask that selects nothing
/// short-circuits the whole data phase: the stream walker stops after the
/// first block and only the end-of-stream marker is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityMask(u8);

impl EntityMask {
    pub const NOTHING: Self = Self(0);
    pub const NODES: Self = Self(1 << 0);
    pub const WAYS: Self = Self(1 << 1);
    pub const RELATIONS: Self = Self(1 << 2);
    pub const CHANGESETS: Self = Self(1 << 3);
    pub const ALL: Self = Self(0b1111);

    /// Returns true when no entity category is selected.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns true when every category in `other` is selected in `self`.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn bits(self) -> u8 {
        self.0
    }
}

impl BitOr for EntityMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for EntityMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for EntityMask {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl Not for EntityMask {
    type Output = Self;

    fn not(self) -> Self {
        Self(!self.0 & Self::ALL.0)
    }
}
