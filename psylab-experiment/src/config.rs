use indexmap::IndexMap;
use psylab_core::{Value, fields};
use serde::{Deserialize, Serialize};

/// How trial types are ordered across repetitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    Sequential,
    /// Independent shuffle of the trial types within each repetition
    #[default]
    Random,
    /// One shuffle over all repetitions together
    FullRandom,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunParams {
    /// Skip the data file entirely
    pub no_output: bool,
    /// Windowed display with a visible cursor and verbose logging
    pub debug: bool,
    /// Autorun speed multiplier; 0 means a live run
    pub autorun: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Instructions {
    pub text: String,
    /// Seconds to wait after the trigger before the first trial
    pub wait: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub name: String,
    pub version: String,
    /// Written in front of every data row, in this order
    pub extra_info: IndexMap<String, Value>,
    pub run_params: RunParams,
    pub n_reps: usize,
    pub method: Method,
    pub instructions: Instructions,
    /// Overrides the sum of event durations
    pub trial_dur: Option<f64>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        let mut extra_info = IndexMap::new();
        extra_info.insert(fields::SUBJ_ID.to_string(), Value::from("subj"));
        Self {
            name: String::new(),
            version: "0.1".to_string(),
            extra_info,
            run_params: RunParams::default(),
            n_reps: 1,
            method: Method::Random,
            instructions: Instructions::default(),
            trial_dur: None,
        }
    }
}

impl ExperimentConfig {
    pub fn subject_id(&self) -> String {
        self.extra_info
            .get(fields::SUBJ_ID)
            .map(|v| v.to_string())
            .unwrap_or_else(|| "subj".to_string())
    }

    pub fn set_subject_id(&mut self, id: &str) {
        self.extra_info
            .insert(fields::SUBJ_ID.to_string(), Value::from(id));
    }

    pub fn is_autorun(&self) -> bool {
        self.run_params.autorun > 0.0
    }
}
