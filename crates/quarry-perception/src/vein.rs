//! Vein-following neighbourhood.
//!
//! After a block is mined its neighbours are probed for the same block type
//! so contiguous veins are followed before the next full sweep.  The
//! neighbourhood is the six faces, the four horizontal diagonals, and the
//! four upward edge diagonals.  Pure corners are not probed.

use quarry_types::BlockPos;

pub const VEIN_OFFSETS: [BlockPos; 14] = [
    // faces
    BlockPos::new(1, 0, 0),
    BlockPos::new(-1, 0, 0),
    BlockPos::new(0, 1, 0),
    BlockPos::new(0, -1, 0),
    BlockPos::new(0, 0, 1),
    BlockPos::new(0, 0, -1),
    // horizontal diagonals
    BlockPos::new(1, 0, 1),
    BlockPos::new(1, 0, -1),
    BlockPos::new(-1, 0, 1),
    BlockPos::new(-1, 0, -1),
    // upward edges
    BlockPos::new(1, 1, 0),
    BlockPos::new(-1, 1, 0),
    BlockPos::new(0, 1, 1),
    BlockPos::new(0, 1, -1),
];

/// Positions probed around a mined block at `origin`.
pub fn vein_neighbours(origin: BlockPos) -> impl Iterator<Item = BlockPos> {
    VEIN_OFFSETS.into_iter().map(move |off| origin + off)
}
