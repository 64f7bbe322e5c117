//! Tile geometry for zone maps.
//!
//! A zone is a set of integer tile coordinates. This crate provides the set type and the
//! derived geometry every other layer depends on:
//!
//! - [`TileSet`]: membership, bounds, rectangle union/subtraction
//! - **Edge tiles**: members with at least one orthogonal neighbour outside the set
//! - **Components**: 4-connected pieces of a set, largest first
//!
//! Edges and components both use orthogonal (4-neighbour) adjacency, so a tile that is
//! an edge is always one step away from leaving its component.
//!
//! ```text
//!   . . . . .        . . . . .
//!   . # # # .        . E E E .
//!   . # # # .  ==>   . E # E .      E = edge tile
//!   . # # # .        . E E E .
//!   . . . . .        . . . . .
//! ```

mod components;
mod pos;
mod rect;
mod search;
mod tile_set;

pub use components::connected_components;
pub use pos::{TILE_PIXELS, TilePos};
pub use rect::TileRect;
pub use search::nearest_outside;
pub use tile_set::TileSet;
