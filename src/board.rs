use std::collections::VecDeque;
use std::ops::BitOr;

use chrono::{DateTime, TimeDelta, Utc};
use ndarray::Array2;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::BoardConfig;
use crate::error::{GameError, Result};
use crate::solver::PlacementSolver;
use crate::tile::{Tile, TileQuery};
use crate::types::{CellCount, Coord, NeighborIter, Position, ToNdIndex};

/// Placement policy applied when the player reveals a tile whose mine-ness
/// is still open.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Niceness {
    /// Any reveal that could be safe is safe.
    Nice,
    /// Guesses are only guaranteed safe when no safe move exists.
    Fair,
    /// The sampled layout is left alone.
    Normal,
    /// Avoidable guesses hit a mine; forced guesses fall back to Fair.
    Cruel,
}

/// Valid transitions:
/// - NotStarted -> InProgress
/// - InProgress -> Won
/// - InProgress -> Lost
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GameState {
    /// Initial state
    NotStarted,
    /// Game started
    InProgress,
    /// Game ended and player won
    Won,
    /// Game ended and player lost
    Lost,
}

impl GameState {
    /// Indicates the game has not started yet
    pub const fn is_initial(self) -> bool {
        matches!(self, Self::NotStarted)
    }

    /// Indicates the game has ended and no moves can be made anymore
    pub const fn is_final(self) -> bool {
        matches!(self, Self::Won | Self::Lost)
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::NotStarted
    }
}

/// Outcome of a reveal
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum RevealOutcome {
    NoChange,
    Revealed,
    HitMine,
    Won,
}

impl RevealOutcome {
    /// Whether this outcome could have caused an update to the game
    pub const fn has_update(self) -> bool {
        !matches!(self, Self::NoChange)
    }
}

/// Used to merge outcomes when multi-revealing
impl BitOr for RevealOutcome {
    type Output = RevealOutcome;

    fn bitor(self, rhs: Self) -> Self::Output {
        use RevealOutcome::*;
        match (self, rhs) {
            // a hit mine has priority
            (HitMine, _) => HitMine,
            (_, HitMine) => HitMine,
            // then win
            (Won, _) => Won,
            (_, Won) => Won,
            // then a plain reveal
            (Revealed, _) => Revealed,
            (_, Revealed) => Revealed,
            // and no-change only with both
            (NoChange, NoChange) => NoChange,
        }
    }
}

/// Outcome of a mark toggle
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum MarkOutcome {
    NoChange,
    Changed,
}

impl MarkOutcome {
    /// Whether this outcome could have caused an update to the game
    pub const fn has_update(self) -> bool {
        matches!(self, Self::Changed)
    }
}

impl BitOr for MarkOutcome {
    type Output = MarkOutcome;

    fn bitor(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            (Self::NoChange, Self::NoChange) => Self::NoChange,
            _ => Self::Changed,
        }
    }
}

fn os_seeded_rng() -> SmallRng {
    SmallRng::from_os_rng()
}

/// A minesweeper board whose mine layout stays undecided until play forces
/// it.
///
/// Tiles start blank: no mines are placed at construction in any mode. The
/// first reveal pins the clicked tile safe and samples an initial layout
/// around it; from then on every reveal either accepts the sampled flag or,
/// per the niceness policy, overrides it and resamples the rest of the board
/// so that the revealed clues and the total mine count stay satisfiable.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Board {
    config: BoardConfig,
    pub(crate) grid: Array2<Tile>,
    state: GameState,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    moves: u32,
    cursor: Position,
    #[serde(skip, default = "os_seeded_rng")]
    pub(crate) rng: SmallRng,
}

impl PartialEq for Board {
    fn eq(&self, other: &Self) -> bool {
        self.config == other.config
            && self.grid == other.grid
            && self.state == other.state
            && self.started_at == other.started_at
            && self.ended_at == other.ended_at
            && self.moves == other.moves
            && self.cursor == other.cursor
    }
}

impl Board {
    pub fn new(config: BoardConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            grid: Array2::default((config.width, config.height).to_nd_index()),
            config,
            state: GameState::default(),
            started_at: None,
            ended_at: None,
            moves: 0,
            cursor: (0, 0),
            rng: os_seeded_rng(),
        })
    }

    /// Start over on the same configuration: every tile blank and
    /// undetermined, clocks cleared. Counts as a move.
    pub fn reset(&mut self) {
        self.grid = Array2::default(self.size().to_nd_index());
        self.state = GameState::NotStarted;
        self.started_at = None;
        self.ended_at = None;
        self.moves += 1;
        log::debug!("board reset to {:?}", self.config);
    }

    pub fn config(&self) -> BoardConfig {
        self.config
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn size(&self) -> Position {
        (self.config.width, self.config.height)
    }

    pub fn width(&self) -> Coord {
        self.config.width
    }

    pub fn height(&self) -> Coord {
        self.config.height
    }

    pub fn total_mines(&self) -> CellCount {
        self.config.mines
    }

    pub fn moves(&self) -> u32 {
        self.moves
    }

    pub fn cursor(&self) -> Position {
        self.cursor
    }

    pub fn set_cursor(&mut self, pos: Position) -> Result<()> {
        self.cursor = self.validate_coords(pos)?;
        Ok(())
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Time played so far, frozen at the end stamp once the game is over and
    /// zero before the first reveal.
    pub fn play_duration(&self) -> TimeDelta {
        match (self.started_at, self.ended_at) {
            (None, _) => TimeDelta::zero(),
            (Some(start), Some(end)) => end - start,
            (Some(start), None) => Utc::now() - start,
        }
    }

    pub fn validate_coords(&self, coords: Position) -> Result<Position> {
        if coords.0 < self.config.width && coords.1 < self.config.height {
            Ok(coords)
        } else {
            Err(GameError::InvalidCoords)
        }
    }

    pub fn tile(&self, pos: Position) -> Option<Tile> {
        self.validate_coords(pos)
            .ok()
            .map(|pos| self.grid[pos.to_nd_index()])
    }

    pub fn neighbors(&self, pos: Position) -> NeighborIter {
        NeighborIter::new(pos, self.size(), self.config.adjacency)
    }

    pub fn positions(&self) -> impl Iterator<Item = Position> {
        let (width, height) = self.size();
        (0..width).flat_map(move |x| (0..height).map(move |y| (x, y)))
    }

    pub fn iter_tiles(&self) -> impl Iterator<Item = (Position, Tile)> + '_ {
        self.positions()
            .map(move |pos| (pos, self.grid[pos.to_nd_index()]))
    }

    /// Tiles passing every predicate set on `query`.
    pub fn tiles(&self, query: TileQuery) -> impl Iterator<Item = (Position, Tile)> + '_ {
        self.positions().filter_map(move |pos| {
            let tile = self.grid[pos.to_nd_index()];
            if query.revealed.is_some_and(|want| tile.revealed() != want) {
                return None;
            }
            if query.determined.is_some_and(|want| tile.determined() != want) {
                return None;
            }
            if query.mine.is_some_and(|want| tile.mine() != want) {
                return None;
            }
            if query
                .on_boundary
                .is_some_and(|want| self.is_on_boundary(pos) != want)
            {
                return None;
            }
            Some((pos, tile))
        })
    }

    /// Whether some neighbor of `pos` has the opposite revealed flag.
    pub fn is_on_boundary(&self, pos: Position) -> bool {
        let revealed = self.grid[pos.to_nd_index()].revealed();
        self.neighbors(pos)
            .any(|neighbor| self.grid[neighbor.to_nd_index()].revealed() != revealed)
    }

    pub fn num_determined_mines(&self) -> CellCount {
        self.tiles(TileQuery::new().determined(true).mine(true)).count() as CellCount
    }

    /// Mines not yet pinned to a determined tile.
    pub fn num_undetermined_mines(&self) -> CellCount {
        self.config.mines.saturating_sub(self.num_determined_mines())
    }

    /// Total mines minus the number of marked tiles; negative when the
    /// player has over-flagged.
    pub fn unmarked_mines(&self) -> isize {
        let marked = self.iter_tiles().filter(|&(_, tile)| tile.marked()).count();
        self.config.mines as isize - marked as isize
    }

    pub fn is_won(&self) -> bool {
        self.iter_tiles().all(|(_, tile)| tile.mine() || tile.revealed())
    }

    pub fn is_lost(&self) -> bool {
        self.iter_tiles().any(|(_, tile)| tile.mine() && tile.revealed())
    }

    pub fn is_over(&self) -> bool {
        self.state.is_final()
    }

    /// Reveal `pos`. No-op on marked or already-revealed tiles and after the
    /// game has ended.
    pub fn reveal(&mut self, pos: Position) -> Result<RevealOutcome> {
        let pos = self.validate_coords(pos)?;
        self.reveal_tile(pos)
    }

    /// Reveal `pos` and then every unmarked neighbor (the chord move). Each
    /// neighbor goes through the full reveal path, niceness included.
    pub fn reveal_all(&mut self, pos: Position) -> Result<RevealOutcome> {
        let pos = self.validate_coords(pos)?;
        let mut outcome = self.reveal_tile(pos)?;
        let neighbors: SmallVec<[Position; 8]> = self.neighbors(pos).collect();
        for neighbor in neighbors {
            if self.grid[neighbor.to_nd_index()].marked() {
                continue;
            }
            outcome = outcome | self.reveal_tile(neighbor)?;
        }
        Ok(outcome)
    }

    /// Toggle the flag on an unrevealed tile while the game is running.
    pub fn mark(&mut self, pos: Position) -> Result<MarkOutcome> {
        let pos = self.validate_coords(pos)?;
        if self.state != GameState::InProgress {
            return Ok(MarkOutcome::NoChange);
        }
        let tile = &mut self.grid[pos.to_nd_index()];
        if tile.revealed {
            return Ok(MarkOutcome::NoChange);
        }
        tile.marked = !tile.marked;
        self.moves += 1;
        Ok(MarkOutcome::Changed)
    }

    /// Flag every unrevealed, unflagged neighbor of `pos`.
    pub fn mark_all(&mut self, pos: Position) -> Result<MarkOutcome> {
        let pos = self.validate_coords(pos)?;
        let neighbors: SmallVec<[Position; 8]> = self.neighbors(pos).collect();
        let mut outcome = MarkOutcome::NoChange;
        for neighbor in neighbors {
            let tile = self.grid[neighbor.to_nd_index()];
            if !tile.revealed() && !tile.marked() {
                outcome = outcome | self.mark(neighbor)?;
            }
        }
        Ok(outcome)
    }

    fn reveal_tile(&mut self, pos: Position) -> Result<RevealOutcome> {
        if self.state.is_final() {
            return Ok(RevealOutcome::NoChange);
        }
        let tile = self.grid[pos.to_nd_index()];
        if tile.marked() || tile.revealed() {
            return Ok(RevealOutcome::NoChange);
        }
        self.moves += 1;

        let mut changed = false;
        if self.state.is_initial() {
            // Opening move: the clicked tile is safe no matter the mode, and
            // the first full layout gets sampled around it.
            self.state = GameState::InProgress;
            self.started_at = Some(Utc::now());
            self.grid[pos.to_nd_index()].mine = false;
            changed = true;
            log::debug!("opening move at {:?}", pos);
        } else if tile.undetermined() {
            changed = self.apply_niceness(pos);
        }
        self.grid[pos.to_nd_index()].determined = true;

        if changed {
            self.replace_mines()?;
        }

        self.grid[pos.to_nd_index()].revealed = true;

        if self.grid[pos.to_nd_index()].mine {
            log::debug!("mine hit at {:?}", pos);
            self.end_game(GameState::Lost);
            return Ok(RevealOutcome::HitMine);
        }

        let adjacent = self.count_mine_neighbors(pos);
        self.grid[pos.to_nd_index()].adjacent_mines = Some(adjacent);
        log::debug!("revealed {:?}, adjacent mines: {}", pos, adjacent);

        if adjacent == 0 {
            self.flood_reveal(pos);
        }
        self.recalc()?;
        if self.is_won() {
            self.end_game(GameState::Won);
        }

        Ok(match self.state {
            GameState::Lost => RevealOutcome::HitMine,
            GameState::Won => RevealOutcome::Won,
            _ => RevealOutcome::Revealed,
        })
    }

    /// Decide whether the sampled mine flag at `pos` gets overridden before
    /// an open-ended reveal. Returns whether the flag flipped.
    fn apply_niceness(&mut self, pos: Position) -> bool {
        let was_mine = self.grid[pos.to_nd_index()].mine;
        let force_safe = match self.config.niceness {
            Niceness::Normal => return false,
            Niceness::Nice => true,
            Niceness::Fair => !self.has_safe_moves() && self.is_forced_guess(pos),
            Niceness::Cruel => {
                if self.has_safe_moves() {
                    self.grid[pos.to_nd_index()].mine = true;
                    return !was_mine;
                }
                self.is_forced_guess(pos)
            }
        };
        if force_safe {
            self.grid[pos.to_nd_index()].mine = false;
            was_mine
        } else {
            false
        }
    }

    /// Some determined-safe tile is still unrevealed.
    fn has_safe_moves(&self) -> bool {
        self.tiles(
            TileQuery::new()
                .determined(true)
                .mine(false)
                .revealed(false),
        )
        .next()
        .is_some()
    }

    /// A guess is forced when `pos` is a boundary move or no boundary move
    /// exists at all. Boundary moves are the unrevealed boundary tiles not
    /// already locked in as mines.
    fn is_forced_guess(&self, pos: Position) -> bool {
        let mut found_any = false;
        for (candidate, tile) in self.tiles(TileQuery::new().revealed(false).on_boundary(true)) {
            if tile.determined() && tile.mine() {
                continue;
            }
            if candidate == pos {
                return true;
            }
            found_any = true;
        }
        !found_any
    }

    /// Open every reachable tile around a zero clue. Flooded tiles bypass
    /// the niceness policy; marked tiles stay closed.
    fn flood_reveal(&mut self, origin: Position) {
        let mut to_visit: VecDeque<Position> = self.neighbors(origin).collect();
        log::trace!("flood from {:?}, frontier {:?}", origin, to_visit);

        while let Some(visit) = to_visit.pop_front() {
            let tile = self.grid[visit.to_nd_index()];
            if tile.marked() || tile.revealed() {
                continue;
            }
            self.moves += 1;
            self.grid[visit.to_nd_index()].determined = true;
            self.grid[visit.to_nd_index()].revealed = true;

            let adjacent = self.count_mine_neighbors(visit);
            self.grid[visit.to_nd_index()].adjacent_mines = Some(adjacent);
            log::trace!("flood opened {:?}, adjacent mines: {}", visit, adjacent);

            if adjacent == 0 {
                let next: SmallVec<[Position; 8]> = self.neighbors(visit).collect();
                to_visit.extend(next);
            }
        }
    }

    /// Sample a fresh mine layout for every undetermined tile, consistent
    /// with the revealed clues and the remaining mine budget.
    fn replace_mines(&mut self) -> Result<()> {
        let system = self.build_constraints()?;
        let mut solver = PlacementSolver::new(&system);
        let mines = solver.sample()?;
        for (id, &pos) in system.variables.iter().enumerate() {
            self.grid[pos.to_nd_index()].mine = mines[id];
        }
        Ok(())
    }

    /// Lock every undetermined tile whose mine-ness the clues now force.
    ///
    /// When the remaining mine budget is zero, or covers every undetermined
    /// tile, the whole remainder is forced at once; otherwise each tile is
    /// checked for a satisfying layout with and without a mine on it.
    fn recalc(&mut self) -> Result<()> {
        let undetermined: Vec<Position> = self
            .tiles(TileQuery::new().determined(false))
            .map(|(pos, _)| pos)
            .collect();
        if undetermined.is_empty() {
            return Ok(());
        }

        let remaining = i32::from(self.total_mines()) - i32::from(self.num_determined_mines());
        if remaining < 0 || remaining > undetermined.len() as i32 {
            log::error!(
                "{} mines left for {} open tiles",
                remaining,
                undetermined.len()
            );
            return Err(GameError::Unsatisfiable);
        }
        if remaining == 0 || remaining == undetermined.len() as i32 {
            let mine = remaining != 0;
            for pos in undetermined {
                let tile = &mut self.grid[pos.to_nd_index()];
                tile.mine = mine;
                tile.determined = true;
            }
            return Ok(());
        }

        let system = self.build_constraints()?;
        let mut solver = PlacementSolver::new(&system);
        for (id, &pos) in system.variables.iter().enumerate() {
            let can_mine = solver.check_with(id, true)?;
            let can_safe = solver.check_with(id, false)?;
            match (can_mine, can_safe) {
                (true, true) => {}
                (false, false) => {
                    log::error!("contradictory clues around {:?}", pos);
                    return Err(GameError::Unsatisfiable);
                }
                _ => {
                    log::debug!("locked {:?} as {}", pos, if can_mine { "mine" } else { "safe" });
                    self.grid[pos.to_nd_index()].determined = true;
                }
            }
        }
        Ok(())
    }

    fn count_mine_neighbors(&self, pos: Position) -> u8 {
        self.neighbors(pos)
            .filter(|&neighbor| self.grid[neighbor.to_nd_index()].mine())
            .count()
            .try_into()
            .unwrap()
    }

    fn end_game(&mut self, state: GameState) {
        if self.state.is_final() {
            return;
        }
        self.state = state;
        self.ended_at = Some(Utc::now());
        log::debug!("game over: {:?}", state);
    }
}
