use std::{
    fs::OpenOptions,
    path::{Path, PathBuf},
    time::Duration,
};

use strum::{Display, EnumString};

use crate::{
    algo::tabular::{EpisodeSummary, QTable},
    error::Result,
    state::State,
};

/// Column names of a [`TrialLog`]
pub const HEADER: [&str; 8] = [
    "Trial Number",
    "Total Time",
    "Time from Signal to Termination",
    "Action Taken",
    "Type of Action",
    "Termination Location",
    "Termination Reward",
    "Q Table",
];

/// Who picked the signal shown in a trial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ActionSource {
    Agent,
    Manual,
}

/// One row of a [`TrialLog`]
#[derive(Debug, Clone, PartialEq)]
pub struct TrialRecord {
    pub trial: u32,
    pub total_time: Duration,
    pub signal_to_termination: Duration,
    pub action: usize,
    pub source: ActionSource,
    pub location: State,
    pub reward: f32,
    /// The value table as JSON
    pub q_table: String,
}

impl TrialRecord {
    /// Build a row from a finished episode and the table it left behind
    pub fn from_summary(
        trial: u32,
        total_time: Duration,
        summary: &EpisodeSummary,
        source: ActionSource,
        q_table: &QTable,
    ) -> Result<Self> {
        Ok(Self {
            trial,
            total_time,
            signal_to_termination: summary.elapsed,
            action: summary.action,
            source,
            location: summary.end,
            reward: summary.reward,
            q_table: serde_json::to_string(&q_table.entries())?,
        })
    }

    fn fields(&self) -> [String; 8] {
        [
            self.trial.to_string(),
            format!("{:.3}", self.total_time.as_secs_f64()),
            format!("{:.3}", self.signal_to_termination.as_secs_f64()),
            self.action.to_string(),
            self.source.to_string(),
            self.location.to_string(),
            self.reward.to_string(),
            self.q_table.clone(),
        ]
    }
}

/// Append-only CSV log with one row per trial
///
/// The header is written when the file is first created.
#[derive(Debug, Clone)]
pub struct TrialLog {
    path: PathBuf,
}

impl TrialLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append exactly one row, preceded by the header if the file does not exist yet
    pub fn append(&self, record: &TrialRecord) -> Result<()> {
        let is_new = !self.path.try_exists()?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if is_new {
            writer.write_record(HEADER)?;
        }
        writer.write_record(record.fields())?;
        writer.flush()?;
        Ok(())
    }
}
