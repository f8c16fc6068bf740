use varisat::{ExtendFormula, Lit, Solver};

use crate::constraints::MineConstraints;
use crate::error::{GameError, Result};

/// SAT view of a [`MineConstraints`] system.
///
/// Tile variables map to DIMACS ids `1..=n` in variable order; auxiliary
/// variables introduced by the cardinality encoding start at `n + 1`. The
/// base clauses stay loaded across queries, so entailment checks go through
/// assumption literals rather than re-encoding.
pub(crate) struct PlacementSolver<'a> {
    solver: Solver<'a>,
    tile_vars: usize,
}

impl<'a> PlacementSolver<'a> {
    pub(crate) fn new(system: &MineConstraints) -> Self {
        let tile_vars = system.variable_count();
        let mut clauses = Vec::new();
        let mut next_var = tile_vars as isize + 1;
        for constraint in &system.constraints {
            log::trace!(
                "encoding {:?}: {} mines over {} tiles",
                constraint.kind,
                constraint.mines,
                constraint.variables.len()
            );
            let inputs: Vec<isize> = constraint
                .variables
                .iter()
                .map(|&id| id as isize + 1)
                .collect();
            encode_exactly(&mut clauses, &mut next_var, &inputs, constraint.mines as usize);
        }

        let mut solver = Solver::new();
        for clause in &clauses {
            let lits: Vec<Lit> = clause.iter().map(|&lit| Lit::from_dimacs(lit)).collect();
            solver.add_clause(&lits);
        }
        log::trace!(
            "loaded {} clauses over {} SAT variables",
            clauses.len(),
            next_var - 1
        );
        Self { solver, tile_vars }
    }

    /// Is the base system satisfiable?
    pub(crate) fn check(&mut self) -> Result<bool> {
        self.solver.assume(&[]);
        self.solve()
    }

    /// Is the base system satisfiable with tile variable `id` pinned to
    /// `mine`?
    pub(crate) fn check_with(&mut self, id: usize, mine: bool) -> Result<bool> {
        let dimacs = id as isize + 1;
        let lit = Lit::from_dimacs(if mine { dimacs } else { -dimacs });
        self.solver.assume(&[lit]);
        self.solve()
    }

    /// Extract a satisfying assignment for the tile variables. Tile
    /// variables absent from the model are reported safe.
    pub(crate) fn sample(&mut self) -> Result<Vec<bool>> {
        if !self.check()? {
            log::error!("mine placement constraints are unsatisfiable");
            return Err(GameError::Unsatisfiable);
        }
        let model = self.solver.model().ok_or(GameError::SolverFailure)?;
        let mut mines = vec![false; self.tile_vars];
        for lit in model {
            if lit.is_positive() {
                let var = lit.var().to_dimacs();
                if var >= 1 && (var as usize) <= self.tile_vars {
                    mines[var as usize - 1] = true;
                }
            }
        }
        Ok(mines)
    }

    fn solve(&mut self) -> Result<bool> {
        self.solver.solve().map_err(|err| {
            log::error!("SAT backend failed: {err}");
            GameError::SolverFailure
        })
    }
}

/// Lower an exactly-`k` counting constraint to CNF with the sequential
/// counter encoding (Sinz 2005). Auxiliary variable `s(i, j)` holds when at
/// least `j + 1` of the first `i + 1` inputs are true, which keeps the
/// clause count polynomial in `k` and the input width.
fn encode_exactly(
    clauses: &mut Vec<Vec<isize>>,
    next_var: &mut isize,
    inputs: &[isize],
    k: usize,
) {
    let n = inputs.len();
    if k > n {
        clauses.push(Vec::new());
        return;
    }
    if n == 0 {
        return;
    }
    if k == 0 {
        for &input in inputs {
            clauses.push(vec![-input]);
        }
        return;
    }

    let width = k + 1;
    let mut counters = vec![0isize; n * width];
    for slot in counters.iter_mut() {
        *slot = *next_var;
        *next_var += 1;
    }
    let s = |i: usize, j: usize| counters[i * width + j];

    // s(0, 0) <=> inputs[0]; higher counts are impossible with one input.
    clauses.push(vec![-inputs[0], s(0, 0)]);
    clauses.push(vec![inputs[0], -s(0, 0)]);
    for j in 1..width {
        clauses.push(vec![-s(0, j)]);
    }

    for i in 1..n {
        // s(i, 0) <=> s(i - 1, 0) or inputs[i]
        clauses.push(vec![-s(i - 1, 0), s(i, 0)]);
        clauses.push(vec![-inputs[i], s(i, 0)]);
        clauses.push(vec![s(i - 1, 0), inputs[i], -s(i, 0)]);
        // s(i, j) <=> s(i - 1, j) or (inputs[i] and s(i - 1, j - 1))
        for j in 1..width {
            clauses.push(vec![-s(i - 1, j), s(i, j)]);
            clauses.push(vec![-inputs[i], -s(i - 1, j - 1), s(i, j)]);
            clauses.push(vec![s(i - 1, j), inputs[i], -s(i, j)]);
            clauses.push(vec![s(i - 1, j), s(i - 1, j - 1), -s(i, j)]);
        }
    }

    // The full sum reaches k and never k + 1.
    clauses.push(vec![s(n - 1, k - 1)]);
    if k < n {
        clauses.push(vec![-s(n - 1, k)]);
    }
}
