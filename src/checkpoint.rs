use std::{
    collections::HashSet,
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::{
    algo::tabular::{q_table::TableEntry, SignalAgent},
    error::{Error, Result},
    exploration::Policy,
};

/// A saved agent: its value table plus the episode bookkeeping needed to resume training
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub episode: u32,
    pub alpha: f32,
    pub gamma: f32,
    /// Exploration parameter at save time, informational only
    pub exploration: f32,
    pub q_table: Vec<TableEntry>,
}

impl Checkpoint {
    pub fn from_agent<P: Policy>(agent: &SignalAgent<P>) -> Self {
        Self {
            episode: agent.episode(),
            alpha: agent.alpha(),
            gamma: agent.gamma(),
            exploration: agent.exploration(),
            q_table: agent.q_table().entries(),
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    /// Read and validate a checkpoint
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let checkpoint: Self = serde_json::from_reader(reader)?;
        checkpoint.validate()?;
        Ok(checkpoint)
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [("alpha", self.alpha), ("gamma", self.gamma)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::InvalidCheckpoint(format!(
                    "`{name}` is {value}, must be in the interval [0, 1]"
                )));
            }
        }

        let mut seen = HashSet::with_capacity(self.q_table.len());
        for entry in &self.q_table {
            if !seen.insert(entry.state) {
                return Err(Error::InvalidCheckpoint(format!(
                    "state {} appears twice",
                    entry.state
                )));
            }
            if entry.values.iter().any(|v| !v.is_finite()) {
                return Err(Error::InvalidCheckpoint(format!(
                    "state {} holds a non-finite value",
                    entry.state
                )));
            }
        }
        Ok(())
    }
}
