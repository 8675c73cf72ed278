//! Generic per-edge access flags.
//!
//! Tag parsing and flag encoding (the OSM `*FlagEncoder` layer) is out of scope here;
//! this is just the compact bitset representation that `flags(e)` is carried in, and
//! that an [`crate::EdgeFilter`] tests against.

use enumset::{EnumSet, EnumSetType};

/// A travel mode an edge may or may not be traversable by.
///
/// Deliberately small and generic — real access semantics (oneway handling, vehicle
/// class restrictions, surface types, ...) live in the tag-parsing layer this crate
/// doesn't implement.
#[derive(EnumSetType, Debug)]
pub enum Access {
    Car,
    Bike,
    Foot,
}

/// The flag bitset carried by an edge and copied verbatim onto any virtual edge
/// spliced from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EdgeFlags(pub EnumSet<Access>);

impl EdgeFlags {
    #[must_use]
    pub fn contains(self, access: Access) -> bool {
        self.0.contains(access)
    }

    #[must_use]
    pub fn all(modes: impl IntoIterator<Item = Access>) -> Self {
        Self(modes.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_round_trip_through_enumset() {
        let flags = EdgeFlags::all([Access::Car, Access::Bike]);
        assert!(flags.contains(Access::Car));
        assert!(flags.contains(Access::Bike));
        assert!(!flags.contains(Access::Foot));
    }
}
