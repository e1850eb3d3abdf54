pub mod autorun;
pub mod config;
pub mod controller;
pub mod error;
pub mod event;
pub mod input;
pub mod paths;
pub mod recorder;
pub mod scoring;
pub mod sequencer;

pub use autorun::{AutorunSimulator, DEFAULT_SPEED};
pub use config::{ExperimentConfig, Instructions, Method, RunParams};
pub use controller::{ExperimentController, Outcome, Protocol, RunSummary};
pub use error::{RecorderError, RunError};
pub use event::{EventContext, EventHandler, EventSpec, FIXATION, Feedback, Idle, WaitResponse};
pub use input::{InputCollector, InputSource, KeyEvent, KeyPress, NoInput, ScriptedInput};
pub use paths::{Paths, guess_participant, guess_run_no};
pub use recorder::DataRecorder;
pub use scoring::{Accuracy, ResponseScorer};
pub use sequencer::{TrialSequence, TrialSequencer, total_duration};
