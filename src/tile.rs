use serde::{Deserialize, Serialize};

/// Per-cell state owned by the board.
///
/// The `mine` flag is only binding once `determined` is set (or the game has
/// ended); until then it is a sample from the currently active layout and may
/// be replaced wholesale. `adjacent_mines` is filled in exactly once, at the
/// moment the tile is revealed.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub(crate) mine: bool,
    pub(crate) revealed: bool,
    pub(crate) marked: bool,
    pub(crate) determined: bool,
    pub(crate) adjacent_mines: Option<u8>,
}

impl Tile {
    pub const fn mine(self) -> bool {
        self.mine
    }

    pub const fn revealed(self) -> bool {
        self.revealed
    }

    pub const fn marked(self) -> bool {
        self.marked
    }

    /// Whether the mine flag is locked in and will survive layout resampling.
    pub const fn determined(self) -> bool {
        self.determined
    }

    pub const fn undetermined(self) -> bool {
        !self.determined
    }

    /// Number of neighboring mines, present on revealed non-mine tiles.
    pub const fn adjacent_mines(self) -> Option<u8> {
        self.adjacent_mines
    }
}

/// Predicate set for [`Board::tiles`](crate::Board::tiles); unset fields
/// match every tile.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct TileQuery {
    pub revealed: Option<bool>,
    pub determined: Option<bool>,
    pub mine: Option<bool>,
    pub on_boundary: Option<bool>,
}

impl TileQuery {
    pub const fn new() -> Self {
        Self {
            revealed: None,
            determined: None,
            mine: None,
            on_boundary: None,
        }
    }

    pub fn revealed(mut self, want: bool) -> Self {
        self.revealed = Some(want);
        self
    }

    pub fn determined(mut self, want: bool) -> Self {
        self.determined = Some(want);
        self
    }

    pub fn mine(mut self, want: bool) -> Self {
        self.mine = Some(want);
        self
    }

    /// Tiles with at least one neighbor whose revealed flag differs.
    pub fn on_boundary(mut self, want: bool) -> Self {
        self.on_boundary = Some(want);
        self
    }
}
