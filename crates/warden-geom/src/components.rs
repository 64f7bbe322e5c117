//! 4-connected component labelling.

use std::collections::VecDeque;

use hashbrown::HashSet;

use crate::{TilePos, TileSet};

/// Split a set into its 4-connected components.
///
/// Components come back largest first. Equal sizes are ordered by their smallest tile, so
/// the result does not depend on hash iteration order.
#[must_use]
pub fn connected_components(tiles: &TileSet) -> Vec<TileSet> {
    let mut unvisited: HashSet<TilePos> = tiles.iter().collect();
    let mut components = Vec::new();
    let mut queue = VecDeque::new();

    // Seed from sorted tiles so labelling is reproducible.
    for start in tiles.sorted() {
        if !unvisited.remove(&start) {
            continue;
        }
        let mut component = TileSet::new();
        queue.push_back(start);
        while let Some(cur) = queue.pop_front() {
            component.insert(cur);
            for n in cur.neighbors() {
                if unvisited.remove(&n) {
                    queue.push_back(n);
                }
            }
        }
        components.push((start, component));
    }

    // `start` is each component's minimum since seeds are visited in order.
    components.sort_by(|(a_min, a), (b_min, b)| b.len().cmp(&a.len()).then(a_min.cmp(b_min)));
    components.into_iter().map(|(_, c)| c).collect()
}
