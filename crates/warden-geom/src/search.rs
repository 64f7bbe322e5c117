//! Relocation search: the closest tile just outside a set.

use smallvec::SmallVec;

use crate::{TilePos, TileSet};

/// Nearest tile to `from` that is not in `tiles`.
///
/// Searches square rings of growing radius up to `max_radius`, closest candidate by
/// Euclidean distance with ties by tile order. Once a candidate is found, rings keep
/// being scanned only while they can still hold a closer tile. If nothing turns up inside
/// the radius, walks straight out in the four orthogonal directions and returns the
/// nearest exit. `from` itself is returned when it is already outside.
#[must_use]
pub fn nearest_outside(tiles: &TileSet, from: TilePos, max_radius: u32) -> TilePos {
    if !tiles.contains(from) {
        return from;
    }

    let max_radius = max_radius.min(i32::MAX as u32) as i32;
    let mut best: Option<TilePos> = None;
    for r in 1..=max_radius {
        // Every tile on ring `r` is at least `r` away.
        if best.is_some_and(|b| i64::from(r) * i64::from(r) > from.distance_sq(b)) {
            break;
        }
        let mut ring: SmallVec<[TilePos; 32]> = SmallVec::new();
        for dx in -r..=r {
            for dy in -r..=r {
                if dx.abs() != r && dy.abs() != r {
                    continue;
                }
                let candidate = from.offset(dx, dy);
                if !tiles.contains(candidate) {
                    ring.push(candidate);
                }
            }
        }
        best = ring
            .into_iter()
            .chain(best)
            .min_by(|a, b| closer(from, *a, *b));
    }

    best.unwrap_or_else(|| ray_exit(tiles, from))
}

fn closer(from: TilePos, a: TilePos, b: TilePos) -> core::cmp::Ordering {
    from.distance_sq(a).cmp(&from.distance_sq(b)).then(a.cmp(&b))
}

/// Closest of the four orthogonal ray exits.
fn ray_exit(tiles: &TileSet, from: TilePos) -> TilePos {
    TilePos::ORTHOGONAL
        .iter()
        .map(|&(dx, dy)| {
            let mut cur = from;
            // A finite set always ends; the bound only guards pathological sizes.
            for _ in 0..=tiles.len() {
                if !tiles.contains(cur) {
                    break;
                }
                cur = cur.offset(dx, dy);
            }
            cur
        })
        .min_by(|a, b| closer(from, *a, *b))
        .unwrap_or(from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TileRect;

    #[test]
    fn test_outside_returns_self() {
        let tiles = TileSet::from_rect(&TileRect::new(0, 0, 3, 3));
        assert_eq!(nearest_outside(&tiles, TilePos::new(7, 7), 4), TilePos::new(7, 7));
    }

    #[test]
    fn test_edge_steps_out_orthogonally() {
        let tiles = TileSet::from_rect(&TileRect::new(0, 0, 5, 5));
        assert_eq!(nearest_outside(&tiles, TilePos::new(0, 2), 4), TilePos::new(-1, 2));
    }

    #[test]
    fn test_center_of_block() {
        let tiles = TileSet::from_rect(&TileRect::new(0, 0, 5, 5));
        let out = nearest_outside(&tiles, TilePos::new(2, 2), 8);
        assert!(!tiles.contains(out));
        assert_eq!(TilePos::new(2, 2).distance_sq(out), 9);
    }

    #[test]
    fn test_later_ring_can_hold_closer_tile() {
        // Ring 3 only frees its corner (3, 3) at distance 4.24; ring 4 frees (4, 0) at 4.
        let mut tiles = TileSet::from_rect(&TileRect::new(-4, -4, 9, 9));
        tiles.remove(TilePos::new(3, 3));
        tiles.remove(TilePos::new(4, 0));

        assert_eq!(nearest_outside(&tiles, TilePos::new(0, 0), 8), TilePos::new(4, 0));
        // Without room for ring 4 the corner is the answer.
        assert_eq!(nearest_outside(&tiles, TilePos::new(0, 0), 3), TilePos::new(3, 3));
    }

    #[test]
    fn test_falls_back_to_ray_beyond_radius() {
        let tiles = TileSet::from_rect(&TileRect::new(0, 0, 41, 3));
        let out = nearest_outside(&tiles, TilePos::new(20, 1), 1);
        assert!(!tiles.contains(out));
        assert_eq!(out.x, 20);
    }
}
