//! Clip planes and the set type used to combine them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// One clip plane of the viewing frustum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClipKind {
    Near,
    Far,
    Left,
    Right,
    Up,
    Down,
}

impl ClipKind {
    /// Planes in the order they are applied to a polygon boundary.
    pub const CLIP_ORDER: [ClipKind; 6] = [
        ClipKind::Near,
        ClipKind::Left,
        ClipKind::Right,
        ClipKind::Up,
        ClipKind::Down,
        ClipKind::Far,
    ];

    const fn bit(self) -> u8 {
        match self {
            ClipKind::Near => 1,
            ClipKind::Far => 2,
            ClipKind::Left => 4,
            ClipKind::Right => 8,
            ClipKind::Up => 16,
            ClipKind::Down => 32,
        }
    }

    /// Index of the matching frustum normal, for side planes.
    pub fn fov_side(self) -> Option<usize> {
        match self {
            ClipKind::Left => Some(0),
            ClipKind::Right => Some(1),
            ClipKind::Up => Some(2),
            ClipKind::Down => Some(3),
            ClipKind::Near | ClipKind::Far => None,
        }
    }
}

/// Set of clip planes.
///
/// Used both as the configured clipping of a polygon and as the tag of a
/// clipped boundary point (which planes produced it).
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<ClipKind>", into = "Vec<ClipKind>")]
pub struct ClippingFlags(u8);

impl ClippingFlags {
    pub const NONE: ClippingFlags = ClippingFlags(0);
    pub const NEAR: ClippingFlags = ClippingFlags(1);
    pub const FAR: ClippingFlags = ClippingFlags(2);
    pub const LEFT: ClippingFlags = ClippingFlags(4);
    pub const RIGHT: ClippingFlags = ClippingFlags(8);
    pub const UP: ClippingFlags = ClippingFlags(16);
    pub const DOWN: ClippingFlags = ClippingFlags(32);
    /// All four side planes.
    pub const FOV: ClippingFlags = ClippingFlags(4 | 8 | 16 | 32);
    pub const ALL: ClippingFlags = ClippingFlags(63);

    pub fn contains(self, kind: ClipKind) -> bool {
        self.0 & kind.bit() != 0
    }

    pub fn insert(&mut self, kind: ClipKind) {
        self.0 |= kind.bit();
    }

    pub fn remove(&mut self, kind: ClipKind) {
        self.0 &= !kind.bit();
    }

    pub fn with(mut self, kind: ClipKind) -> Self {
        self.insert(kind);
        self
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn intersects(self, other: ClippingFlags) -> bool {
        self.0 & other.0 != 0
    }

    pub fn intersection(self, other: ClippingFlags) -> ClippingFlags {
        ClippingFlags(self.0 & other.0)
    }

    /// True when any side plane is configured.
    pub fn has_fov(self) -> bool {
        self.intersects(Self::FOV)
    }

    /// Near clipping is requested explicitly or implied by an opposite pair
    /// of side planes (left with right, up with down).
    pub fn near_active(self) -> bool {
        self.contains(ClipKind::Near)
            || (self.contains(ClipKind::Left) && self.contains(ClipKind::Right))
            || (self.contains(ClipKind::Up) && self.contains(ClipKind::Down))
    }

    pub fn iter(self) -> impl Iterator<Item = ClipKind> {
        ClipKind::CLIP_ORDER
            .into_iter()
            .filter(move |k| self.contains(*k))
    }
}

impl From<ClipKind> for ClippingFlags {
    fn from(kind: ClipKind) -> Self {
        ClippingFlags(kind.bit())
    }
}

impl From<Vec<ClipKind>> for ClippingFlags {
    fn from(kinds: Vec<ClipKind>) -> Self {
        kinds.into_iter().collect()
    }
}

impl From<ClippingFlags> for Vec<ClipKind> {
    fn from(flags: ClippingFlags) -> Self {
        flags.iter().collect()
    }
}

impl FromIterator<ClipKind> for ClippingFlags {
    fn from_iter<I: IntoIterator<Item = ClipKind>>(iter: I) -> Self {
        let mut flags = ClippingFlags::NONE;
        for k in iter {
            flags.insert(k);
        }
        flags
    }
}

impl BitOr for ClippingFlags {
    type Output = ClippingFlags;

    fn bitor(self, rhs: ClippingFlags) -> ClippingFlags {
        ClippingFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for ClippingFlags {
    fn bitor_assign(&mut self, rhs: ClippingFlags) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for ClippingFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fov_is_the_union_of_the_side_planes() {
        let sides: ClippingFlags = [ClipKind::Left, ClipKind::Right, ClipKind::Up, ClipKind::Down]
            .into_iter()
            .collect();
        assert_eq!(sides, ClippingFlags::FOV);
        assert!(!ClippingFlags::FOV.contains(ClipKind::Near));
        assert!(ClippingFlags::FOV.has_fov());
    }

    #[test]
    fn near_is_implied_by_opposite_side_pairs() {
        assert!(ClippingFlags::NEAR.near_active());
        assert!((ClippingFlags::LEFT | ClippingFlags::RIGHT).near_active());
        assert!((ClippingFlags::UP | ClippingFlags::DOWN).near_active());
        assert!(!(ClippingFlags::LEFT | ClippingFlags::UP).near_active());
        assert!(!ClippingFlags::FAR.near_active());
    }

    #[test]
    fn serializes_as_a_list_of_kinds() {
        let flags = ClippingFlags::NEAR | ClippingFlags::FAR;
        let json = serde_json::to_string(&flags).unwrap();
        assert_eq!(json, r#"["near","far"]"#);
        let back: ClippingFlags = serde_json::from_str(&json).unwrap();
        assert_eq!(back, flags);
    }
}
