use rand::Rng;

use crate::DesignError;

const SUM_TOLERANCE: f64 = 1e-6;

/// Draws an index with probability `probs[i]`. The probabilities must be
/// non-negative and sum to one; anything else fails instead of being
/// renormalised.
pub fn weighted_sample<R: Rng + ?Sized>(probs: &[f64], rng: &mut R) -> Result<usize, DesignError> {
    if let Some((index, &value)) = probs
        .iter()
        .enumerate()
        .find(|(_, p)| !p.is_finite() || **p < 0.0)
    {
        tracing::warn!(index, value, "invalid probability");
        return Err(DesignError::InvalidProbability { index, value });
    }
    let total: f64 = probs.iter().sum();
    if (total - 1.0).abs() > SUM_TOLERANCE {
        tracing::warn!(total, "probabilities do not sum to one");
        return Err(DesignError::ProbabilitiesDoNotSumToOne(total));
    }

    let which: f64 = rng.random();
    let mut acc = 0.0;
    for (i, p) in probs.iter().enumerate() {
        acc += p;
        if which < acc {
            return Ok(i);
        }
    }
    // rounding left `which` just above the cumulative sum
    Ok(probs.iter().rposition(|&p| p > 0.0).unwrap_or(0))
}
