use psylab_core::{Seed, TrialRecord, fields};
use rand::seq::SliceRandom;
use serde::Serialize;

use crate::config::Method;

/// Stream id used to derive the ordering generator from the run seed
const ORDER_STREAM: u64 = 1;

/// Trials in run order, ready for the trial loop
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialSequence {
    pub records: Vec<TrialRecord>,
    pub n_reps: usize,
    pub method: Method,
    /// Total duration budget of one trial, in seconds
    pub trial_dur: f64,
}

impl TrialSequence {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Trial duration: the explicit override, or the sum of event durations
pub fn total_duration(event_durs: impl IntoIterator<Item = f64>, overridden: Option<f64>) -> f64 {
    overridden.unwrap_or_else(|| event_durs.into_iter().sum())
}

/// Expands trial types into a repeatable run order. All randomness comes from
/// the seed, so equal seeds give identical sequences.
#[derive(Debug, Clone)]
pub struct TrialSequencer {
    trial_types: Vec<TrialRecord>,
    n_reps: usize,
    method: Method,
    seed: Seed,
}

impl TrialSequencer {
    pub fn new(trial_types: Vec<TrialRecord>, n_reps: usize, method: Method, seed: Seed) -> Self {
        Self {
            trial_types,
            n_reps,
            method,
            seed,
        }
    }

    /// One trial type per design entry, built by `template` from the condition id
    pub fn from_design(
        design: &[u32],
        template: impl FnMut(u32) -> TrialRecord,
        n_reps: usize,
        method: Method,
        seed: Seed,
    ) -> Self {
        let trial_types = design.iter().copied().map(template).collect();
        Self::new(trial_types, n_reps, method, seed)
    }

    pub fn trial_types(&self) -> &[TrialRecord] {
        &self.trial_types
    }

    pub fn len(&self) -> usize {
        self.n_reps * self.trial_types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Trial-type index of every trial, in run order
    pub fn indices(&self) -> Vec<usize> {
        let k = self.trial_types.len();
        let mut rng = self.seed.stream(ORDER_STREAM);
        match self.method {
            Method::Sequential => (0..self.n_reps).flat_map(|_| 0..k).collect(),
            Method::Random => {
                let mut out = Vec::with_capacity(self.len());
                for _ in 0..self.n_reps {
                    let mut rep: Vec<usize> = (0..k).collect();
                    rep.shuffle(&mut rng);
                    out.extend(rep);
                }
                out
            }
            Method::FullRandom => {
                let mut out: Vec<usize> = (0..self.n_reps).flat_map(|_| 0..k).collect();
                out.shuffle(&mut rng);
                out
            }
        }
    }

    /// Lazily yields fresh copies of the trial records; recreate the iterator
    /// to restart from the first trial.
    pub fn iter(&self) -> impl Iterator<Item = TrialRecord> + '_ {
        self.indices()
            .into_iter()
            .map(|i| self.trial_types[i].clone())
    }

    /// Run order with every record carrying the trial duration
    pub fn sequence(&self, trial_dur: f64) -> TrialSequence {
        let records = self
            .iter()
            .map(|mut record| {
                record.set(fields::DUR, trial_dur);
                record
            })
            .collect();
        TrialSequence {
            records,
            n_reps: self.n_reps,
            method: self.method,
            trial_dur,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use psylab_core::{Value, fields};

    fn template(cond: u32) -> TrialRecord {
        TrialRecord::new()
            .with(fields::COND, cond)
            .with(fields::ONSET, Value::Empty)
            .with(fields::CORR_RESP, (cond % 2) as i64)
    }

    fn conds(seq: &TrialSequence) -> Vec<i64> {
        seq.records
            .iter()
            .map(|r| match r.get(fields::COND) {
                Some(Value::Int(c)) => *c,
                other => panic!("unexpected cond {other:?}"),
            })
            .collect()
    }

    #[test]
    fn length_is_reps_times_types() {
        for method in [Method::Sequential, Method::Random, Method::FullRandom] {
            let seq = TrialSequencer::from_design(&[1, 2, 3, 4], template, 3, method, Seed::new(1));
            assert_eq!(seq.len(), 12);
            assert_eq!(seq.sequence(1.0).len(), 12);
        }
    }

    #[test]
    fn sequential_repeats_design_order() {
        let seq = TrialSequencer::from_design(&[2, 1], template, 2, Method::Sequential, Seed::new(9));
        assert_eq!(conds(&seq.sequence(1.0)), vec![2, 1, 2, 1]);
    }

    #[test]
    fn same_seed_same_order() {
        let design = [1, 2, 3, 4, 5, 6];
        for method in [Method::Random, Method::FullRandom] {
            let a = TrialSequencer::from_design(&design, template, 4, method, Seed::new(2024));
            let b = TrialSequencer::from_design(&design, template, 4, method, Seed::new(2024));
            assert_eq!(a.sequence(2.0), b.sequence(2.0));
        }
    }

    #[test]
    fn different_seeds_usually_differ() {
        let design: Vec<u32> = (1..=8).collect();
        let a = TrialSequencer::from_design(&design, template, 2, Method::Random, Seed::new(1));
        let b = TrialSequencer::from_design(&design, template, 2, Method::Random, Seed::new(2));
        assert_ne!(a.indices(), b.indices());
    }

    #[test]
    fn random_keeps_every_type_once_per_repetition() {
        let design: Vec<u32> = (1..=5).collect();
        let seq = TrialSequencer::from_design(&design, template, 3, Method::Random, Seed::new(5));
        for rep in seq.indices().chunks(5) {
            let mut sorted = rep.to_vec();
            sorted.sort();
            assert_eq!(sorted, vec![0, 1, 2, 3, 4]);
        }
    }

    #[test]
    fn iterator_restarts_by_recreation() {
        let seq = TrialSequencer::from_design(&[1, 2, 3], template, 2, Method::Random, Seed::new(3));
        let first: Vec<_> = seq.iter().collect();
        let second: Vec<_> = seq.iter().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn every_record_carries_the_trial_duration() {
        let seq = TrialSequencer::from_design(&[1, 2], template, 2, Method::Random, Seed::new(4));
        for record in seq.sequence(1.5).records {
            assert_eq!(record.get(fields::DUR), Some(&Value::Float(1.5)));
            // appended after the template fields
            assert_eq!(record.keys().last(), Some(fields::DUR));
        }
    }

    #[test]
    fn trial_duration_defaults_to_event_sum() {
        assert!((total_duration([0.3, 0.5, 0.2], None) - 1.0).abs() < 1e-12);
        assert_eq!(total_duration([0.3, 0.5], Some(2.5)), 2.5);
    }
}
