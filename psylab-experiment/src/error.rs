use std::path::PathBuf;

use psylab_core::{CoreError, DisplayError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("Cannot create a folder for storing data {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot open data file {path} for appending: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot write to data file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Cannot flush data file {path}: {source}")]
    Flush {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Data file {0} is already closed")]
    Closed(PathBuf),
}

#[derive(Error, Debug)]
pub enum RunError {
    /// The abort key was pressed. Not a crash: the controller turns this into
    /// an orderly teardown.
    #[error("Premature exit requested by user")]
    Aborted,

    #[error(transparent)]
    Storage(#[from] RecorderError),

    #[error(transparent)]
    Display(#[from] DisplayError),

    #[error(transparent)]
    State(#[from] CoreError),

    #[error("Autorun speed must be positive, got {0}")]
    InvalidSpeed(f64),

    #[error("Experiment has no events in its trial")]
    NoEvents,

    #[error("Experiment has no trials")]
    NoTrials,

    #[error("Cannot write run summary: {0}")]
    Summary(String),
}

impl RunError {
    pub fn is_abort(&self) -> bool {
        matches!(self, RunError::Aborted)
    }
}
