use thiserror::Error;

#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("Invalid coordinates")]
    InvalidCoords,
    #[error("Board dimensions must be at least 1x1")]
    InvalidSize,
    #[error("Too many mines for the board size")]
    TooManyMines,
    #[error("No mine layout satisfies the revealed clues")]
    Unsatisfiable,
    #[error("SAT backend failure")]
    SolverFailure,
}

pub type Result<T> = core::result::Result<T, GameError>;
