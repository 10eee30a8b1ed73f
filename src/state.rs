use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Number of starting arms of the intersection
pub const NUM_ARMS: usize = 3;

/// Number of progress cells per arm, the last one being the arm's terminal marker
pub const NUM_PROGRESS: usize = 4;

/// Highest progress index
pub const MAX_PROGRESS: usize = NUM_PROGRESS - 1;

/// A discretized approach position: the arm the vehicle started on and how far along it has travelled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct State {
    pub arm: usize,
    pub progress: usize,
}

impl State {
    pub const fn new(arm: usize, progress: usize) -> Self {
        Self { arm, progress }
    }

    /// The state every episode on `arm` begins in
    pub const fn start(arm: usize) -> Self {
        Self::new(arm, 0)
    }
}

impl From<(usize, usize)> for State {
    fn from((arm, progress): (usize, usize)) -> Self {
        Self { arm, progress }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.arm, self.progress)
    }
}

/// A discrete event reported by the driving loop describing which branch of the approach was detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tag {
    /// Primary tag, the vehicle went straight through
    Forward,
    /// Second branch, the vehicle turned right
    Right,
    /// Third branch, the vehicle turned left
    Left,
    /// Any other tag id, treated as a reset signal
    Unrecognized(u32),
}

impl Tag {
    /// Map a raw tag id as reported by the detector
    pub fn from_id(id: u32) -> Self {
        match id {
            0 => Self::Forward,
            1 => Self::Right,
            2 => Self::Left,
            other => Self::Unrecognized(other),
        }
    }

    pub fn id(self) -> u32 {
        match self {
            Self::Forward => 0,
            Self::Right => 1,
            Self::Left => 2,
            Self::Unrecognized(id) => id,
        }
    }

    /// How many progress cells this tag advances, `None` for a reset
    pub fn advance(self) -> Option<usize> {
        match self {
            Self::Forward => Some(1),
            Self::Right => Some(2),
            Self::Left => Some(3),
            Self::Unrecognized(_) => None,
        }
    }
}

/// Map a detected tag and the current state to the next state
///
/// Progress only ever increases and is clamped at [`MAX_PROGRESS`]. An unrecognized tag
/// sends the state back to `(0, 0)`.
pub fn classify(tag: Tag, state: State) -> State {
    match tag.advance() {
        Some(step) => State::new(state.arm, (state.progress + step).min(MAX_PROGRESS)),
        None => State::default(),
    }
}

/// Terminal reward tags for every cell of the approach grid
///
/// A cell holds `0` (non-terminal), `1` (correct exit) or `-1` (incorrect exit).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardGrid {
    cells: [[i8; NUM_PROGRESS]; NUM_ARMS],
}

impl Default for RewardGrid {
    /// Each arm's correct exit sits at progress `arm + 1`, every other exit is a failure
    fn default() -> Self {
        Self {
            cells: [[0, 1, -1, -1], [0, -1, 1, -1], [0, -1, -1, 1]],
        }
    }
}

impl RewardGrid {
    /// Build a grid from explicit reward tags
    ///
    /// Every row must start non-terminal, hold only `-1`, `0` or `1`, and mark exactly one
    /// correct exit.
    pub fn new(cells: [[i8; NUM_PROGRESS]; NUM_ARMS]) -> Result<Self> {
        for (arm, row) in cells.iter().enumerate() {
            if let Some(v) = row.iter().find(|v| !(-1..=1).contains(*v)) {
                return Err(Error::InvalidGrid(format!("arm {arm} holds reward tag {v}")));
            }
            if row[0] != 0 {
                return Err(Error::InvalidGrid(format!("arm {arm} starts on a terminal cell")));
            }
            let exits = row.iter().filter(|&&v| v == 1).count();
            if exits != 1 {
                return Err(Error::InvalidGrid(format!(
                    "arm {arm} has {exits} correct exits, expected exactly one"
                )));
            }
        }
        Ok(Self { cells })
    }

    /// Terminal reward tag of `state`
    ///
    /// **Panics** if `state` lies outside the grid
    pub fn reward(&self, state: State) -> i8 {
        self.cells[state.arm][state.progress]
    }

    /// Terminal reward tag of `state`, `None` if it lies outside the grid
    pub fn get(&self, state: State) -> Option<i8> {
        self.cells.get(state.arm)?.get(state.progress).copied()
    }

    /// Whether `state` is a terminal cell, `false` for cells outside the grid
    pub fn is_terminal(&self, state: State) -> bool {
        self.get(state).is_some_and(|reward| reward != 0)
    }

    /// Every cell of the grid in row-major order
    pub fn states() -> impl Iterator<Item = State> {
        (0..NUM_ARMS).flat_map(|arm| (0..NUM_PROGRESS).map(move |p| State::new(arm, p)))
    }
}
