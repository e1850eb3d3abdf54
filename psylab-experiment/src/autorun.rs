use psylab_core::{Display, ResponseMap, Seed, TrialRecord, Value, fields};
use rand::Rng;
use rand::seq::IndexedRandom;
use rand_distr::StandardNormal;

use crate::error::RunError;
use crate::event::EventSpec;
use crate::input::KeyPress;
use crate::sequencer::TrialSequence;

/// Speed used when autorun is requested without one
pub const DEFAULT_SPEED: f64 = 100.0;

/// Stream id used to derive the response generator from the run seed
const RESPONSE_STREAM: u64 = 2;

const RT_MEAN: f64 = 0.5;
const RT_SD: f64 = 0.2;

/// Runs an experiment without a participant: every duration is compressed by
/// `speed` and each trial gets a synthesized response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutorunSimulator {
    speed: f64,
}

impl AutorunSimulator {
    pub fn new(speed: f64) -> Result<Self, RunError> {
        if !speed.is_finite() || speed <= 0.0 {
            return Err(RunError::InvalidSpeed(speed));
        }
        Ok(Self { speed })
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn compress(&self, secs: f64) -> f64 {
        secs / self.speed
    }

    /// Compresses event and trial durations and plants `auto_resp`/`auto_rt`
    /// in every trial. Responses are drawn uniformly from the response keys
    /// ordered by their coded value.
    pub fn apply<D: Display>(
        &self,
        seq: &mut TrialSequence,
        events: &mut [EventSpec<D>],
        valid: &ResponseMap,
        seed: Seed,
    ) {
        for event in events.iter_mut() {
            event.dur = self.compress(event.dur);
        }
        seq.trial_dur = self.compress(seq.trial_dur);
        let first_dur = events.first().map(|e| e.dur).unwrap_or(0.0);

        let mut keys: Vec<(&String, i64)> = valid.iter().map(|(k, v)| (k, *v)).collect();
        keys.sort_by_key(|(_, code)| *code);
        let keys: Vec<&String> = keys.into_iter().map(|(k, _)| k).collect();

        let mut rng = seed.stream(RESPONSE_STREAM);
        for record in seq.records.iter_mut() {
            match keys.choose(&mut rng) {
                Some(key) => record.set(fields::AUTO_RESP, key.as_str()),
                None => record.set(fields::AUTO_RESP, Value::Empty),
            }
            let z: f64 = rng.sample(StandardNormal);
            let rt = first_dur + (RT_MEAN + RT_SD * z) / self.speed;
            record.set(fields::AUTO_RT, rt.max(first_dur));
        }

        tracing::info!(
            speed = self.speed,
            trials = seq.len(),
            trial_dur = seq.trial_dur,
            "autorun: durations compressed, responses synthesized"
        );
    }

    /// Scales the timing fields of a finished trial back to normal speed
    pub fn rescale(&self, record: &mut TrialRecord) {
        for key in [fields::AUTO_RT, fields::RT, fields::ONSET] {
            record.scale(key, self.speed);
        }
    }

    /// The synthesized response planted by [`Self::apply`], if any
    pub fn planned_response(record: &TrialRecord) -> Option<KeyPress> {
        let key = record.get(fields::AUTO_RESP)?.as_str()?;
        let time = record.get_f64(fields::AUTO_RT)?;
        Some(KeyPress::new(key, time))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Method;
    use psylab_core::{DisplayError, StimGroup};

    #[derive(Debug, Default)]
    struct NullDisplay(());

    impl Display for NullDisplay {
        type Surface = ();

        fn surface(&mut self) -> &mut () {
            &mut self.0
        }
        fn flip(&mut self) -> Result<(), DisplayError> {
            Ok(())
        }
        fn show_message(&mut self, _text: &str) -> Result<(), DisplayError> {
            Ok(())
        }
        fn close(&mut self) {}
    }

    fn events() -> Vec<EventSpec<NullDisplay>> {
        vec![
            EventSpec::idle("fixation", 0.3, StimGroup::new("fixation")),
            EventSpec::wait_response("stim", 1.2, StimGroup::new("stim")),
        ]
    }

    fn sequence(n: usize) -> TrialSequence {
        let records = (0..n)
            .map(|i| TrialRecord::new().with(fields::COND, i as u32))
            .collect();
        TrialSequence {
            records,
            n_reps: 1,
            method: Method::Sequential,
            trial_dur: 1.5,
        }
    }

    fn responses() -> ResponseMap {
        let mut map = ResponseMap::new();
        map.insert("1".to_string(), 1);
        map.insert("0".to_string(), 0);
        map
    }

    #[test]
    fn speed_must_be_positive() {
        assert!(matches!(AutorunSimulator::new(0.0), Err(RunError::InvalidSpeed(_))));
        assert!(AutorunSimulator::new(-2.0).is_err());
        assert!(AutorunSimulator::new(f64::NAN).is_err());
        assert_eq!(AutorunSimulator::new(4.0).unwrap().compress(2.0), 0.5);
    }

    #[test]
    fn durations_are_divided_by_speed() {
        let sim = AutorunSimulator::new(2.0).unwrap();
        let mut seq = sequence(4);
        let mut evs = events();
        sim.apply(&mut seq, &mut evs, &responses(), Seed::new(1));
        assert_eq!(evs[0].dur, 0.15);
        assert_eq!(evs[1].dur, 0.6);
        assert_eq!(seq.trial_dur, 0.75);
    }

    #[test]
    fn synthesized_responses_are_valid_and_floored() {
        let sim = AutorunSimulator::new(10.0).unwrap();
        let mut seq = sequence(200);
        let mut evs = events();
        sim.apply(&mut seq, &mut evs, &responses(), Seed::new(9));
        let floor = evs[0].dur;

        let mut seen = std::collections::HashSet::new();
        for rec in &seq.records {
            let planned = AutorunSimulator::planned_response(rec).unwrap();
            assert!(planned.key == "0" || planned.key == "1");
            assert!(planned.time >= floor);
            seen.insert(planned.key);
        }
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn same_seed_same_responses() {
        let sim = AutorunSimulator::new(5.0).unwrap();
        let run = |seed| {
            let mut seq = sequence(20);
            sim.apply(&mut seq, &mut events(), &responses(), Seed::new(seed));
            seq.records
        };
        assert_eq!(run(3), run(3));
        assert_ne!(run(3), run(4));
    }

    #[test]
    fn rescale_restores_normal_speed_times() {
        let sim = AutorunSimulator::new(50.0).unwrap();
        let mut rec = TrialRecord::new()
            .with(fields::ONSET, 0.1)
            .with(fields::RT, 0.02)
            .with(fields::AUTO_RT, 0.02)
            .with(fields::SUBJ_RESP, 1i64);
        sim.rescale(&mut rec);
        assert!((rec.get_f64(fields::ONSET).unwrap() - 5.0).abs() < 1e-9);
        assert!((rec.get_f64(fields::RT).unwrap() - 1.0).abs() < 1e-9);
        assert!((rec.get_f64(fields::AUTO_RT).unwrap() - 1.0).abs() < 1e-9);
        assert_eq!(rec.get(fields::SUBJ_RESP), Some(&Value::Int(1)));
    }

    #[test]
    fn no_response_keys_means_no_plan() {
        let sim = AutorunSimulator::new(1.0).unwrap();
        let mut seq = sequence(2);
        sim.apply(&mut seq, &mut events(), &ResponseMap::new(), Seed::new(1));
        assert!(AutorunSimulator::planned_response(&seq.records[0]).is_none());
    }
}
