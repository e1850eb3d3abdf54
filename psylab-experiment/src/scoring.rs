use std::fmt;

use psylab_core::{NO_RESPONSE, ResponseMap, TrialRecord, Value, fields};
use serde::{Deserialize, Serialize};

use crate::input::KeyPress;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Accuracy {
    Correct,
    Incorrect,
}

impl Accuracy {
    pub fn from_match(correct: bool) -> Self {
        if correct {
            Accuracy::Correct
        } else {
            Accuracy::Incorrect
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Accuracy::Correct => "Correct",
            Accuracy::Incorrect => "Incorrect",
        }
    }
}

impl fmt::Display for Accuracy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Maps raw keys to coded responses and fills in the scored fields of a trial
#[derive(Debug, Clone)]
pub struct ResponseScorer {
    valid_responses: ResponseMap,
}

impl ResponseScorer {
    pub fn new(valid_responses: ResponseMap) -> Self {
        Self { valid_responses }
    }

    pub fn code(&self, key: &str) -> Option<i64> {
        self.valid_responses.get(key).copied()
    }

    /// Accuracy of `key` against the trial's expected response, if the key
    /// is recognized
    pub fn accuracy(&self, trial: &TrialRecord, key: &str) -> Option<Accuracy> {
        let coded = self.code(key)?;
        let expected = trial.get(fields::CORR_RESP).unwrap_or(&Value::Empty);
        Some(Accuracy::from_match(matches_expected(expected, coded)))
    }

    /// Scores the trial from its collected keys. The last key wins; with no
    /// usable key the response, accuracy and RT are all set to the
    /// no-response marker.
    pub fn score(&self, trial: &mut TrialRecord, keys: &[KeyPress]) -> Option<Accuracy> {
        let scored = keys.last().and_then(|last| match self.code(&last.key) {
            Some(coded) => Some((last, coded)),
            None => {
                tracing::warn!(key = %last.key, "last key is not a recognized response");
                None
            }
        });

        match scored {
            Some((last, coded)) => {
                let expected = trial.get(fields::CORR_RESP).unwrap_or(&Value::Empty);
                let acc = Accuracy::from_match(matches_expected(expected, coded));
                trial.set(fields::SUBJ_RESP, coded);
                trial.set(fields::ACCURACY, acc.label());
                trial.set(fields::RT, last.time);
                Some(acc)
            }
            None => {
                trial.set(fields::SUBJ_RESP, NO_RESPONSE);
                trial.set(fields::ACCURACY, NO_RESPONSE);
                trial.set(fields::RT, NO_RESPONSE);
                None
            }
        }
    }
}

fn matches_expected(expected: &Value, coded: i64) -> bool {
    match expected {
        Value::Int(v) => *v == coded,
        Value::Float(v) => *v == coded as f64,
        Value::Text(s) => s.trim().parse::<i64>().is_ok_and(|v| v == coded),
        Value::Empty => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use psylab_core::Configuration;

    fn scorer() -> ResponseScorer {
        ResponseScorer::new(Configuration::default().valid_responses)
    }

    fn trial(corr: i64) -> TrialRecord {
        TrialRecord::new()
            .with(fields::COND, 1u32)
            .with(fields::CORR_RESP, corr)
            .with(fields::SUBJ_RESP, Value::Empty)
            .with(fields::ACCURACY, Value::Empty)
            .with(fields::RT, Value::Empty)
    }

    #[test]
    fn wrong_key_is_incorrect_with_its_rt() {
        let mut t = trial(1);
        let acc = scorer().score(&mut t, &[KeyPress::new("0", 0.3)]);
        assert_eq!(acc, Some(Accuracy::Incorrect));
        assert_eq!(t.get(fields::SUBJ_RESP), Some(&Value::Int(0)));
        assert_eq!(t.get(fields::ACCURACY), Some(&Value::from("Incorrect")));
        assert_eq!(t.get_f64(fields::RT), Some(0.3));
    }

    #[test]
    fn no_keys_means_no_response_everywhere() {
        let mut t = trial(1);
        assert_eq!(scorer().score(&mut t, &[]), None);
        for field in [fields::SUBJ_RESP, fields::ACCURACY, fields::RT] {
            assert_eq!(t.get(field), Some(&NO_RESPONSE));
        }
    }

    #[test]
    fn later_responses_override_earlier_ones() {
        let mut t = trial(1);
        let keys = [KeyPress::new("0", 0.3), KeyPress::new("1", 0.45)];
        assert_eq!(scorer().score(&mut t, &keys), Some(Accuracy::Correct));
        assert_eq!(t.get_f64(fields::RT), Some(0.45));
    }

    #[test]
    fn scoring_keeps_field_order() {
        let mut t = trial(0);
        scorer().score(&mut t, &[KeyPress::new("0", 0.2)]);
        assert_eq!(
            t.keys().collect::<Vec<_>>(),
            vec!["cond", "corr_resp", "subj_resp", "accuracy", "rt"]
        );
    }

    #[test]
    fn unrecognized_last_key_counts_as_no_response() {
        let mut t = trial(1);
        assert_eq!(scorer().score(&mut t, &[KeyPress::new("q", 0.2)]), None);
        assert_eq!(t.get(fields::RT), Some(&NO_RESPONSE));
    }

    #[test]
    fn expected_response_may_be_text_or_float() {
        let s = scorer();
        let text = TrialRecord::new().with(fields::CORR_RESP, "1");
        let float = TrialRecord::new().with(fields::CORR_RESP, 0.0);
        assert_eq!(s.accuracy(&text, "1"), Some(Accuracy::Correct));
        assert_eq!(s.accuracy(&float, "0"), Some(Accuracy::Correct));
        assert_eq!(s.accuracy(&float, "z"), None);
    }
}
