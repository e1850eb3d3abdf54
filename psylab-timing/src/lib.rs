pub mod clock;
pub mod controller;
pub mod timer;

pub use clock::Clock;
pub use controller::{FrameStats, TimingController};
pub use timer::{HighPrecisionTimer, SimulatedTimer, Timer};
