pub mod config;
pub mod error;
pub mod phase;
pub mod record;
pub mod seed;
pub mod stimulus;

pub use config::{Configuration, MonitorGeometry, Recognition, ResponseMap};
pub use error::{CoreError, DisplayError};
pub use phase::ExperimentState;
pub use record::{fields, TrialRecord, Value, NO_RESPONSE};
pub use seed::Seed;
pub use stimulus::{Color, Display, Drawable, StimGroup};
