//! Balanced condition orderings and weighted sampling.

pub mod latin;
pub mod sample;

pub use latin::{REST, latin_square, make_para};
pub use sample::weighted_sample;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DesignError {
    #[error("Latin square size must be even, got {0}")]
    OddLatinSquare(usize),

    #[error("Latin square size must be positive")]
    EmptyDesign,

    #[error("Probabilities must add up to one, got {0}")]
    ProbabilitiesDoNotSumToOne(f64),

    #[error("Probability at index {index} is invalid: {value}")]
    InvalidProbability { index: usize, value: f64 },
}
