use hashbrown::HashMap;
use rand::seq::SliceRandom;
use smallvec::SmallVec;

use crate::board::Board;
use crate::error::{GameError, Result};
use crate::tile::TileQuery;
use crate::types::{CellCount, Position, ToNdIndex};

/// Where a counting constraint came from.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum ConstraintKind {
    /// A revealed clue: its undetermined neighbors must hold the target
    /// number of mines.
    AdjacentCount { clue: Position },
    /// All undetermined tiles together must hold the remaining mine budget.
    TotalCount,
}

/// `sum(variables) = mines`, where every variable is 0 or 1.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct CountConstraint {
    pub kind: ConstraintKind,
    pub variables: Vec<usize>,
    pub mines: CellCount,
}

/// Pseudo-boolean view of the current board: one boolean variable per
/// undetermined tile, plus the counting constraints those variables must
/// satisfy. Variable and clue order is reshuffled on every build, which is
/// what steers the solver toward different layouts across calls.
#[derive(Clone, Debug)]
pub(crate) struct MineConstraints {
    pub variables: Vec<Position>,
    pub constraints: Vec<CountConstraint>,
}

impl MineConstraints {
    pub(crate) fn variable_count(&self) -> usize {
        self.variables.len()
    }
}

impl Board {
    /// Translate the current tile store into a fresh constraint system.
    ///
    /// Clues whose neighbors are all determined contribute nothing; the
    /// total-count constraint is dropped once every mine is pinned down.
    pub(crate) fn build_constraints(&mut self) -> Result<MineConstraints> {
        let mut variables: Vec<Position> = self
            .tiles(TileQuery::new().determined(false))
            .map(|(pos, _)| pos)
            .collect();
        let mut clues: Vec<Position> = self
            .tiles(TileQuery::new().revealed(true).on_boundary(true))
            .map(|(pos, _)| pos)
            .collect();
        variables.shuffle(&mut self.rng);
        clues.shuffle(&mut self.rng);

        let variable_ids: HashMap<Position, usize> = variables
            .iter()
            .enumerate()
            .map(|(id, &pos)| (pos, id))
            .collect();

        let mut constraints = Vec::with_capacity(clues.len() + 1);

        let remaining =
            i32::from(self.total_mines()) - i32::from(self.num_determined_mines());
        if remaining != 0 {
            push_validated(
                &mut constraints,
                ConstraintKind::TotalCount,
                (0..variables.len()).collect(),
                remaining,
            )?;
        }

        for clue in clues {
            let mut vars: SmallVec<[usize; 8]> = SmallVec::new();
            let mut known_mines: i32 = 0;
            for neighbor in self.neighbors(clue) {
                let tile = self.grid[neighbor.to_nd_index()];
                if tile.determined() {
                    if tile.mine() {
                        known_mines += 1;
                    }
                } else {
                    vars.push(variable_ids[&neighbor]);
                }
            }
            if vars.is_empty() {
                continue;
            }
            let clue_mines = i32::from(
                self.grid[clue.to_nd_index()]
                    .adjacent_mines()
                    .unwrap_or(0),
            );
            push_validated(
                &mut constraints,
                ConstraintKind::AdjacentCount { clue },
                vars.into_vec(),
                clue_mines - known_mines,
            )?;
        }

        log::debug!(
            "built {} counting constraints over {} open tiles",
            constraints.len(),
            variables.len()
        );
        Ok(MineConstraints {
            variables,
            constraints,
        })
    }
}

fn push_validated(
    constraints: &mut Vec<CountConstraint>,
    kind: ConstraintKind,
    variables: Vec<usize>,
    mines: i32,
) -> Result<()> {
    if mines < 0 || mines as usize > variables.len() {
        log::error!(
            "infeasible {:?}: {} mines over {} tiles",
            kind,
            mines,
            variables.len()
        );
        return Err(GameError::Unsatisfiable);
    }
    constraints.push(CountConstraint {
        kind,
        variables,
        mines: mines as CellCount,
    });
    Ok(())
}
