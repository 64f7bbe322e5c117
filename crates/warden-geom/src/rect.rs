//! Axis-aligned tile rectangles.

use serde::{Deserialize, Serialize};

use crate::TilePos;

/// A rectangle of tiles: `x..x + width` by `y..y + height`.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct TileRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl TileRect {
    #[must_use]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Smallest rectangle containing both corners (inclusive).
    #[must_use]
    pub fn from_corners(a: TilePos, b: TilePos) -> Self {
        let min_x = a.x.min(b.x);
        let min_y = a.y.min(b.y);
        Self {
            x: min_x,
            y: min_y,
            width: a.x.max(b.x) - min_x + 1,
            height: a.y.max(b.y) - min_y + 1,
        }
    }

    /// Square of side `2 * radius + 1` centred on a tile.
    #[must_use]
    pub const fn around(center: TilePos, radius: i32) -> Self {
        Self {
            x: center.x - radius,
            y: center.y - radius,
            width: radius * 2 + 1,
            height: radius * 2 + 1,
        }
    }

    /// A rectangle with no tiles in it.
    #[must_use]
    pub const fn is_degenerate(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Number of tiles covered.
    #[must_use]
    pub const fn area(&self) -> u64 {
        if self.is_degenerate() {
            return 0;
        }
        self.width as u64 * self.height as u64
    }

    #[must_use]
    pub const fn max_x(&self) -> i32 {
        self.x + self.width - 1
    }

    #[must_use]
    pub const fn max_y(&self) -> i32 {
        self.y + self.height - 1
    }

    #[must_use]
    pub const fn contains(&self, pos: TilePos) -> bool {
        pos.x >= self.x && pos.x <= self.max_x() && pos.y >= self.y && pos.y <= self.max_y()
    }

    #[must_use]
    pub const fn intersects(&self, other: &Self) -> bool {
        !self.is_degenerate()
            && !other.is_degenerate()
            && self.x <= other.max_x()
            && other.x <= self.max_x()
            && self.y <= other.max_y()
            && other.y <= self.max_y()
    }

    /// Grow by `by` tiles on every side.
    #[must_use]
    pub const fn inflate(&self, by: i32) -> Self {
        Self {
            x: self.x - by,
            y: self.y - by,
            width: self.width + by * 2,
            height: self.height + by * 2,
        }
    }

    /// Smallest rectangle containing both.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let min_x = self.x.min(other.x);
        let min_y = self.y.min(other.y);
        Self {
            x: min_x,
            y: min_y,
            width: self.max_x().max(other.max_x()) - min_x + 1,
            height: self.max_y().max(other.max_y()) - min_y + 1,
        }
    }

    /// Every tile in the rectangle, row by row.
    pub fn tiles(&self) -> impl Iterator<Item = TilePos> + use<> {
        let Self {
            x,
            y,
            width,
            height,
        } = *self;
        (y..y + height.max(0)).flat_map(move |ty| (x..x + width.max(0)).map(move |tx| TilePos::new(tx, ty)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degenerate_has_no_tiles() {
        let rect = TileRect::new(0, 0, 0, 5);
        assert!(rect.is_degenerate());
        assert_eq!(rect.area(), 0);
        assert_eq!(rect.tiles().count(), 0);
    }

    #[test]
    fn test_from_corners_is_inclusive() {
        let rect = TileRect::from_corners(TilePos::new(2, 5), TilePos::new(0, 3));
        assert_eq!(rect, TileRect::new(0, 3, 3, 3));
        assert_eq!(rect.area(), 9);
        assert!(rect.contains(TilePos::new(2, 5)));
        assert!(!rect.contains(TilePos::new(3, 5)));
    }

    #[test]
    fn test_intersects_touching_vs_separate() {
        let a = TileRect::new(0, 0, 2, 2);
        let b = TileRect::new(2, 0, 2, 2);
        assert!(!a.intersects(&b));
        assert!(a.inflate(1).intersects(&b));
    }

    #[test]
    fn test_around_covers_radius() {
        let rect = TileRect::around(TilePos::new(10, 10), 2);
        assert_eq!(rect.area(), 25);
        assert!(rect.contains(TilePos::new(8, 12)));
        assert!(!rect.contains(TilePos::new(7, 10)));
    }
}
