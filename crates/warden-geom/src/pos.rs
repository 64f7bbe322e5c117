//! Tile coordinates.

use serde::{Deserialize, Serialize};

/// World units (pixels) per tile edge.
pub const TILE_PIXELS: f32 = 32.0;

/// Integer tile coordinate on a level.
///
/// Ordering is `x` first, then `y`. Everything that iterates tiles in a stable order sorts
/// by this.
#[derive(
    Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Serialize, Deserialize,
)]
pub struct TilePos {
    pub x: i32,
    pub y: i32,
}

impl TilePos {
    /// Orthogonal neighbour offsets: up, right, down, left.
    pub const ORTHOGONAL: [(i32, i32); 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];

    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// The four orthogonal neighbours.
    #[must_use]
    pub const fn neighbors(self) -> [Self; 4] {
        [
            self.offset(0, -1),
            self.offset(1, 0),
            self.offset(0, 1),
            self.offset(-1, 0),
        ]
    }

    /// Manhattan distance between two tiles.
    #[must_use]
    pub const fn manhattan(self, other: Self) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// Squared Euclidean distance, exact in `i64`.
    #[must_use]
    pub const fn distance_sq(self, other: Self) -> i64 {
        let dx = (self.x as i64) - (other.x as i64);
        let dy = (self.y as i64) - (other.y as i64);
        dx * dx + dy * dy
    }

    /// Tile containing a world-space position.
    #[must_use]
    pub fn from_world(x: f32, y: f32) -> Self {
        Self {
            x: (x / TILE_PIXELS).floor() as i32,
            y: (y / TILE_PIXELS).floor() as i32,
        }
    }

    /// World-space centre of this tile.
    #[must_use]
    pub fn world_center(self) -> (f32, f32) {
        (
            self.x as f32 * TILE_PIXELS + TILE_PIXELS / 2.0,
            self.y as f32 * TILE_PIXELS + TILE_PIXELS / 2.0,
        )
    }
}

impl core::fmt::Display for TilePos {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl From<(i32, i32)> for TilePos {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_world_floors_negative() {
        assert_eq!(TilePos::from_world(0.0, 0.0), TilePos::new(0, 0));
        assert_eq!(TilePos::from_world(31.9, 32.0), TilePos::new(0, 1));
        assert_eq!(TilePos::from_world(-0.5, -32.0), TilePos::new(-1, -1));
        assert_eq!(TilePos::from_world(-32.1, 0.0), TilePos::new(-2, 0));
    }

    #[test]
    fn test_world_center_round_trip() {
        let tile = TilePos::new(-3, 7);
        let (x, y) = tile.world_center();
        assert_eq!(TilePos::from_world(x, y), tile);
    }

    #[test]
    fn test_neighbors_are_orthogonal() {
        let center = TilePos::new(5, 5);
        for n in center.neighbors() {
            assert_eq!(center.manhattan(n), 1);
        }
    }
}
