use std::collections::{hash_map::Entry, HashMap};

use serde::{Deserialize, Serialize};

use crate::state::{RewardGrid, State};

use super::ActionValues;

/// One persisted row of a [`QTable`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TableEntry {
    pub state: State,
    pub values: ActionValues,
}

/// Value table mapping each state to its per-action value estimates
///
/// Rows are created zeroed the first time a state is written, and never removed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QTable {
    rows: HashMap<State, ActionValues>,
}

impl QTable {
    /// A table holding a zeroed row for every cell of the approach grid
    pub fn new() -> Self {
        Self {
            rows: RewardGrid::states().map(|s| (s, ActionValues::default())).collect(),
        }
    }

    /// Action values of `state`, zeros if it has never been seen
    pub fn row(&self, state: State) -> ActionValues {
        self.rows.get(&state).copied().unwrap_or_default()
    }

    /// Mutable action values of `state`, inserting a zeroed row on first access
    pub fn row_mut(&mut self, state: State) -> &mut ActionValues {
        match self.rows.entry(state) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => e.insert(ActionValues::default()),
        }
    }

    pub fn get(&self, state: State, action: usize) -> f32 {
        self.row(state)[action]
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains(&self, state: State) -> bool {
        self.rows.contains_key(&state)
    }

    /// All rows ordered by state
    pub fn entries(&self) -> Vec<TableEntry> {
        let mut entries = self
            .rows
            .iter()
            .map(|(&state, &values)| TableEntry { state, values })
            .collect::<Vec<_>>();
        entries.sort_by_key(|e| e.state);
        entries
    }
}

impl FromIterator<TableEntry> for QTable {
    fn from_iter<I: IntoIterator<Item = TableEntry>>(iter: I) -> Self {
        Self {
            rows: iter.into_iter().map(|e| (e.state, e.values)).collect(),
        }
    }
}
