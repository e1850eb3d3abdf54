use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Raw key name -> coded response value
pub type ResponseMap = IndexMap<String, i64>;

/// Whether the machine running the experiment has a known profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recognition {
    Recognized,
    Unrecognized,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorGeometry {
    pub name: String,
    /// Viewing distance in cm
    pub distance_cm: f64,
    /// Physical screen width in cm
    pub width_cm: f64,
    pub screen: usize,
    pub view_scale: [f64; 2],
}

impl Default for MonitorGeometry {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            distance_cm: 80.0,
            width_cm: 37.5,
            screen: 0,
            view_scale: [1.0, 1.0],
        }
    }
}

/// Computer profile. Built once before a run and never mutated during it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub recognized: bool,
    /// Where data and log directories are created
    pub root: PathBuf,
    pub trigger: String,
    pub abort_key: String,
    pub default_keys: Vec<String>,
    pub valid_responses: ResponseMap,
    pub monitor: MonitorGeometry,
    pub font_path: Option<PathBuf>,
}

impl Default for Configuration {
    fn default() -> Self {
        let trigger = "space".to_string();
        let abort_key = "escape".to_string();
        let mut valid_responses = ResponseMap::new();
        valid_responses.insert("0".to_string(), 0);
        valid_responses.insert("1".to_string(), 1);

        Self {
            recognized: false,
            root: PathBuf::from("."),
            default_keys: vec![abort_key.clone(), trigger.clone()],
            trigger,
            abort_key,
            valid_responses,
            monitor: MonitorGeometry::default(),
            font_path: None,
        }
    }
}

impl Configuration {
    pub fn from_json(text: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let text = std::fs::read_to_string(path).map_err(|source| CoreError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Reports whether this profile describes a known machine. Callers decide
    /// whether an unrecognized machine may run.
    pub fn check(&self) -> Recognition {
        if self.recognized {
            Recognition::Recognized
        } else {
            tracing::warn!(monitor = %self.monitor.name, "this computer is not recognized");
            Recognition::Unrecognized
        }
    }

    pub fn is_valid_response(&self, key: &str) -> bool {
        self.valid_responses.contains_key(key)
    }

    pub fn response_keys(&self) -> Vec<String> {
        self.valid_responses.keys().cloned().collect()
    }
}
