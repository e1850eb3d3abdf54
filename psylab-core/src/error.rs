//! Error types shared by every psylab crate

use std::path::PathBuf;

use thiserror::Error;

use crate::phase::ExperimentState;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: ExperimentState,
        to: ExperimentState,
    },

    #[error("Cannot read configuration {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

/// Failures reported by a display backend
#[derive(Error, Debug)]
pub enum DisplayError {
    #[error("Display is closed")]
    Closed,

    #[error("Render failed: {0}")]
    Render(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
