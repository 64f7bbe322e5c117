//! Sets of tiles and their derived edge geometry.

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

use crate::{TilePos, TileRect};

/// An unordered set of tiles.
///
/// Serialises as a sorted list so saved levels diff cleanly.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<TilePos>", into = "Vec<TilePos>")]
pub struct TileSet {
    tiles: HashSet<TilePos>,
}

impl TileSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            tiles: HashSet::with_capacity(capacity),
        }
    }

    /// All tiles of a rectangle.
    #[must_use]
    pub fn from_rect(rect: &TileRect) -> Self {
        rect.tiles().collect()
    }

    /// Add a tile. Returns `true` if it was not already present.
    pub fn insert(&mut self, pos: TilePos) -> bool {
        self.tiles.insert(pos)
    }

    /// Remove a tile. Returns `true` if it was present.
    pub fn remove(&mut self, pos: TilePos) -> bool {
        self.tiles.remove(&pos)
    }

    #[must_use]
    pub fn contains(&self, pos: TilePos) -> bool {
        self.tiles.contains(&pos)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn clear(&mut self) {
        self.tiles.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = TilePos> + '_ {
        self.tiles.iter().copied()
    }

    /// Tiles in ascending `(x, y)` order.
    #[must_use]
    pub fn sorted(&self) -> Vec<TilePos> {
        let mut out: Vec<_> = self.iter().collect();
        out.sort_unstable();
        out
    }

    /// Smallest member in `(x, y)` order.
    #[must_use]
    pub fn min_tile(&self) -> Option<TilePos> {
        self.iter().min()
    }

    /// Tight bounding rectangle, or `None` for an empty set.
    #[must_use]
    pub fn bounds(&self) -> Option<TileRect> {
        let mut iter = self.iter();
        let first = iter.next()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in iter {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(TileRect::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1))
    }

    /// A member tile with at least one orthogonal neighbour outside the set.
    #[must_use]
    pub fn is_edge(&self, pos: TilePos) -> bool {
        self.contains(pos) && pos.neighbors().iter().any(|n| !self.contains(*n))
    }

    /// Every edge tile. Derived on demand, never stored.
    #[must_use]
    pub fn edge_tiles(&self) -> TileSet {
        self.iter().filter(|p| self.is_edge(*p)).collect()
    }

    /// Add every tile of `rect`. Returns `true` if anything was added.
    pub fn add_rect(&mut self, rect: &TileRect) -> bool {
        let mut changed = false;
        for pos in rect.tiles() {
            changed |= self.tiles.insert(pos);
        }
        changed
    }

    /// Remove every tile of `rect`. Returns `true` if anything was removed.
    pub fn remove_rect(&mut self, rect: &TileRect) -> bool {
        if self.is_empty() {
            return false;
        }
        // Walk whichever side is smaller.
        if rect.area() > self.len() as u64 {
            let before = self.len();
            self.tiles.retain(|p| !rect.contains(*p));
            return self.len() != before;
        }
        let mut changed = false;
        for pos in rect.tiles() {
            changed |= self.tiles.remove(&pos);
        }
        changed
    }

    /// Whether the two sets overlap or have a pair of orthogonally adjacent tiles.
    #[must_use]
    pub fn touches(&self, other: &Self) -> bool {
        let (Some(a), Some(b)) = (self.bounds(), other.bounds()) else {
            return false;
        };
        if !a.inflate(1).intersects(&b) {
            return false;
        }
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        small
            .iter()
            .any(|p| large.contains(p) || p.neighbors().iter().any(|n| large.contains(*n)))
    }

    /// Add every tile of `other`.
    pub fn extend_from(&mut self, other: &Self) {
        self.tiles.extend(other.tiles.iter().copied());
    }

    /// Tiles in `self` but not in `other`.
    #[must_use]
    pub fn difference(&self, other: &Self) -> TileSet {
        self.tiles.difference(&other.tiles).copied().collect()
    }

    /// Members that fall inside `rect`.
    #[must_use]
    pub fn within(&self, rect: &TileRect) -> TileSet {
        self.iter().filter(|p| rect.contains(*p)).collect()
    }
}

impl FromIterator<TilePos> for TileSet {
    fn from_iter<I: IntoIterator<Item = TilePos>>(iter: I) -> Self {
        Self {
            tiles: iter.into_iter().collect(),
        }
    }
}

impl Extend<TilePos> for TileSet {
    fn extend<I: IntoIterator<Item = TilePos>>(&mut self, iter: I) {
        self.tiles.extend(iter);
    }
}

impl From<Vec<TilePos>> for TileSet {
    fn from(tiles: Vec<TilePos>) -> Self {
        tiles.into_iter().collect()
    }
}

impl From<TileSet> for Vec<TilePos> {
    fn from(set: TileSet) -> Self {
        set.sorted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(tiles: &[(i32, i32)]) -> TileSet {
        tiles.iter().copied().map(TilePos::from).collect()
    }

    #[test]
    fn test_single_tile_is_its_own_edge() {
        let tiles = set(&[(1, 1)]);
        assert_eq!(tiles.edge_tiles(), set(&[(1, 1)]));
    }

    #[test]
    fn test_solid_block_edges_exclude_center() {
        let mut tiles = set(&[(1, 1)]);
        assert!(tiles.add_rect(&TileRect::new(0, 0, 3, 3)));

        let edges = tiles.edge_tiles();
        assert_eq!(edges.len(), 8);
        assert!(!edges.contains(TilePos::new(1, 1)));
        assert!(edges.contains(TilePos::new(0, 0)));
        assert!(edges.contains(TilePos::new(2, 1)));
    }

    #[test]
    fn test_add_rect_reports_change() {
        let mut tiles = TileSet::from_rect(&TileRect::new(0, 0, 2, 2));
        assert!(!tiles.add_rect(&TileRect::new(0, 0, 2, 2)));
        assert!(tiles.add_rect(&TileRect::new(1, 1, 2, 2)));
        assert_eq!(tiles.len(), 7);
    }

    #[test]
    fn test_remove_rect_both_strategies() {
        let mut small = TileSet::from_rect(&TileRect::new(0, 0, 2, 2));
        assert!(small.remove_rect(&TileRect::new(-50, -50, 51, 51)));
        assert_eq!(small.len(), 3);

        let mut large = TileSet::from_rect(&TileRect::new(0, 0, 10, 10));
        assert!(large.remove_rect(&TileRect::new(0, 0, 1, 1)));
        assert!(!large.remove_rect(&TileRect::new(20, 20, 1, 1)));
        assert_eq!(large.len(), 99);
    }

    #[test]
    fn test_bounds() {
        assert_eq!(TileSet::new().bounds(), None);
        let tiles = set(&[(0, 0), (0, 1), (5, 5)]);
        assert_eq!(tiles.bounds(), Some(TileRect::new(0, 0, 6, 6)));
    }

    #[test]
    fn test_touches_adjacent_not_diagonal() {
        let a = set(&[(0, 0), (0, 1)]);
        let adjacent = set(&[(0, 2), (0, 3)]);
        let diagonal = set(&[(1, 2)]);
        let overlapping = set(&[(0, 1), (9, 9)]);

        assert!(a.touches(&adjacent));
        assert!(!a.touches(&diagonal));
        assert!(a.touches(&overlapping));
        assert!(!a.touches(&TileSet::new()));
    }

    #[test]
    fn test_serializes_sorted() {
        let tiles = set(&[(2, 0), (0, 1), (0, 0)]);
        let json = serde_json::to_string(&tiles).unwrap();
        assert_eq!(json, r#"[{"x":0,"y":0},{"x":0,"y":1},{"x":2,"y":0}]"#);
        let back: TileSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tiles);
    }
}
