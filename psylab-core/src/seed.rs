use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

/// Entropy source for every randomized decision of one experiment instance.
/// Re-supplying the same value reproduces trial order and synthesized responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Seed(u64);

impl Seed {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Seed taken from the wall clock at run start
    pub fn from_time() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(1);
        Self(nanos)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// Independent generator for a named consumer, so that e.g. drawing
    /// synthesized responses never perturbs the trial order.
    pub fn stream(&self, stream: u64) -> StdRng {
        StdRng::seed_from_u64(self.0 ^ stream.wrapping_mul(0x9E37_79B9_7F4A_7C15))
    }
}

impl From<u64> for Seed {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

impl fmt::Display for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
