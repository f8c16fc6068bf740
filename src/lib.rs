//! Minesweeper core where the mines stay undecided until play forces them.
//!
//! Every unrevealed tile is a boolean variable. The board keeps at least one
//! full mine layout consistent with the total mine count and every revealed
//! clue, resamples that layout whenever a reveal pins a tile down, and locks
//! tiles once the clues leave them only one possible value. A [`Niceness`]
//! policy decides which way ambiguous reveals break: for or against the
//! player.
//!
//! The crate is a pure game core: no rendering, no input handling, no
//! persistence format. Front-ends drive it through [`Board`] and read state
//! back through the query surface ([`Board::tiles`], [`Board::tile`],
//! [`Board::state`]). All types serialize with serde so hosts can snapshot
//! and restore a running game.

pub use board::*;
pub use error::*;
pub use tile::*;
pub use types::*;

mod board;
mod constraints;
mod error;
mod solver;
mod tile;
mod types;

use serde::{Deserialize, Serialize};

/// Board construction parameters.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoardConfig {
    pub width: Coord,
    pub height: Coord,
    pub mines: CellCount,
    pub adjacency: Adjacency,
    pub niceness: Niceness,
}

impl BoardConfig {
    pub const fn new(
        width: Coord,
        height: Coord,
        mines: CellCount,
        adjacency: Adjacency,
        niceness: Niceness,
    ) -> Self {
        Self {
            width,
            height,
            mines,
            adjacency,
            niceness,
        }
    }

    pub const fn total_tiles(&self) -> CellCount {
        mult(self.width, self.height)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(GameError::InvalidSize);
        }
        if self.mines >= self.total_tiles() {
            return Err(GameError::TooManyMines);
        }
        Ok(())
    }
}

impl Default for BoardConfig {
    /// 30x20 with a fifth of the tiles mined, on the classic adjacency and
    /// the punishing placement policy.
    fn default() -> Self {
        Self::new(30, 20, 120, Adjacency::Standard, Niceness::Cruel)
    }
}
