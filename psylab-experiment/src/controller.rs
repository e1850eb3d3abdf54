use std::path::{Path, PathBuf};
use std::sync::Arc;

use psylab_core::{
    Configuration, CoreError, Display, DisplayError, Drawable, ExperimentState, Seed, StimGroup, TrialRecord,
    Value, fields,
};
use psylab_timing::{TimingController, Timer};
use serde::Serialize;

use crate::autorun::{AutorunSimulator, DEFAULT_SPEED};
use crate::config::ExperimentConfig;
use crate::error::RunError;
use crate::event::{EventContext, EventSpec};
use crate::input::{InputCollector, InputSource, KeyPress};
use crate::paths::Paths;
use crate::recorder::DataRecorder;
use crate::scoring::ResponseScorer;
use crate::sequencer::{TrialSequencer, total_duration};

/// What an experiment supplies to the controller: the events of one trial and
/// the trial types to repeat.
pub trait Protocol<D: Display> {
    fn name(&self) -> &str;

    /// Events of a single trial, in presentation order
    fn events(&mut self, config: &Configuration) -> Vec<EventSpec<D>>;

    /// Distinct trial types; the controller repeats and orders them
    fn trial_types(&mut self, config: &Configuration) -> Vec<TrialRecord>;

    /// Shown after the instructions for their `wait` period
    fn wait_stimulus(&mut self) -> Option<StimGroup<D::Surface>> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Finished,
    Aborted,
}

/// Result of one run, written next to the data file by the binaries
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub name: String,
    pub outcome: Outcome,
    pub seed: Seed,
    pub autorun_speed: Option<f64>,
    pub trials_planned: usize,
    pub trials_completed: usize,
    pub data_file: Option<PathBuf>,
    pub records: Vec<TrialRecord>,
}

impl RunSummary {
    pub fn write_json(&self, path: &Path) -> Result<(), RunError> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| RunError::Summary(e.to_string()))?;
        }
        let text =
            serde_json::to_string_pretty(self).map_err(|e| RunError::Summary(e.to_string()))?;
        std::fs::write(path, text).map_err(|e| RunError::Summary(e.to_string()))
    }
}

/// Per-run bookkeeping, dropped when `run` returns
struct RunState {
    timing: TimingController,
    trial_no: usize,
    planned: usize,
    completed: Vec<TrialRecord>,
}

/// Drives one experiment instance from setup to teardown. Owns the display,
/// the input device and the data file for the length of the run.
pub struct ExperimentController<D: Display> {
    config: Configuration,
    settings: ExperimentConfig,
    paths: Paths,
    seed: Seed,
    state: ExperimentState,
    timer: Arc<dyn Timer>,
    display: Option<D>,
    input: InputCollector,
    scorer: ResponseScorer,
    name: String,
    events: Vec<EventSpec<D>>,
    sequencer: Option<TrialSequencer>,
    wait_stim: Option<StimGroup<D::Surface>>,
}

impl<D: Display> ExperimentController<D> {
    pub fn new(
        config: Configuration,
        settings: ExperimentConfig,
        display: D,
        input: Box<dyn InputSource>,
        timer: Arc<dyn Timer>,
        seed: Seed,
    ) -> Self {
        let input = InputCollector::new(input, &config);
        let scorer = ResponseScorer::new(config.valid_responses.clone());
        Self {
            paths: Paths::new(config.root.clone()),
            name: settings.name.clone(),
            config,
            settings,
            seed,
            state: ExperimentState::Created,
            timer,
            display: Some(display),
            input,
            scorer,
            events: Vec::new(),
            sequencer: None,
            wait_stim: None,
        }
    }

    pub fn state(&self) -> ExperimentState {
        self.state
    }

    pub fn seed(&self) -> Seed {
        self.seed
    }

    pub fn settings(&self) -> &ExperimentConfig {
        &self.settings
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    pub fn data_file(&self) -> Option<PathBuf> {
        if self.settings.run_params.no_output {
            None
        } else {
            Some(self.paths.data_file(&self.settings.subject_id()))
        }
    }

    /// Takes the events and trial types from `protocol`
    pub fn setup<P: Protocol<D>>(&mut self, protocol: &mut P) -> Result<(), RunError> {
        let events = protocol.events(&self.config);
        if events.is_empty() {
            return Err(RunError::NoEvents);
        }
        let trial_types = protocol.trial_types(&self.config);
        let sequencer = TrialSequencer::new(
            trial_types,
            self.settings.n_reps,
            self.settings.method,
            self.seed,
        );
        if sequencer.is_empty() {
            return Err(RunError::NoTrials);
        }
        self.state.transition(ExperimentState::Configured)?;

        if !protocol.name().is_empty() {
            self.name = protocol.name().to_string();
        }
        tracing::info!(
            experiment = %self.name,
            events = events.len(),
            trial_types = sequencer.trial_types().len(),
            trials = sequencer.len(),
            method = ?self.settings.method,
            seed = %self.seed,
            "experiment configured"
        );
        self.events = events;
        self.sequencer = Some(sequencer);
        self.wait_stim = protocol.wait_stimulus();
        Ok(())
    }

    /// Runs with simulated responses at `speed` (default 100x)
    pub fn autorun(&mut self, speed: Option<f64>) -> Result<RunSummary, RunError> {
        let sim = AutorunSimulator::new(speed.unwrap_or(DEFAULT_SPEED))?;
        self.settings.run_params.autorun = sim.speed();
        self.run()
    }

    /// Instructions, then every trial, then teardown. The abort key ends the
    /// run early with [`Outcome::Aborted`]; rows written so far are kept.
    pub fn run(&mut self) -> Result<RunSummary, RunError> {
        if self.state != ExperimentState::Configured {
            return Err(CoreError::InvalidTransition {
                from: self.state,
                to: ExperimentState::Presenting,
            }
            .into());
        }
        let sim = if self.settings.is_autorun() {
            Some(AutorunSimulator::new(self.settings.run_params.autorun)?)
        } else {
            None
        };

        let mut run = RunState {
            timing: TimingController::new(self.timer.clone()),
            trial_no: 0,
            planned: 0,
            completed: Vec::new(),
        };

        let data_file = self.data_file();
        let mut recorder = match data_file.as_deref().map(DataRecorder::open).transpose() {
            Ok(recorder) => recorder,
            Err(e) => {
                tracing::error!("{}", e);
                self.state.transition(ExperimentState::Aborted)?;
                self.teardown(None, &run.timing)?;
                return Err(e.into());
            }
        };
        if recorder.is_none() {
            tracing::warn!("no-output mode: trial data will not be saved");
        }

        tracing::info!(
            experiment = %self.name,
            version = %self.settings.version,
            subject = %self.settings.subject_id(),
            seed = %self.seed,
            autorun = ?sim.map(|s| s.speed()),
            debug = self.settings.run_params.debug,
            "run started"
        );

        let result = self.execute(&mut run, recorder.as_mut(), sim.as_ref());
        let outcome = match result {
            Ok(()) => {
                self.state.transition(ExperimentState::Finished)?;
                Outcome::Finished
            }
            Err(RunError::Aborted) => {
                tracing::warn!(
                    completed = run.completed.len(),
                    planned = run.planned,
                    "run aborted by user"
                );
                self.state.transition(ExperimentState::Aborted)?;
                Outcome::Aborted
            }
            Err(e) => {
                tracing::error!(trial = run.trial_no + 1, "run failed: {}", e);
                if !self.state.is_terminal() {
                    self.state.transition(ExperimentState::Aborted)?;
                }
                if let Err(close_err) = self.teardown(recorder.as_mut(), &run.timing) {
                    tracing::error!("{}", close_err);
                }
                return Err(e);
            }
        };
        self.teardown(recorder.as_mut(), &run.timing)?;

        tracing::info!(
            outcome = ?outcome,
            completed = run.completed.len(),
            planned = run.planned,
            "run ended"
        );
        Ok(RunSummary {
            name: self.name.clone(),
            outcome,
            seed: self.seed,
            autorun_speed: sim.map(|s| s.speed()),
            trials_planned: run.planned,
            trials_completed: run.completed.len(),
            data_file,
            records: run.completed,
        })
    }

    fn execute(
        &mut self,
        run: &mut RunState,
        mut recorder: Option<&mut DataRecorder>,
        sim: Option<&AutorunSimulator>,
    ) -> Result<(), RunError> {
        let sequencer = self.sequencer.as_ref().ok_or(RunError::NoTrials)?;
        let trial_dur = total_duration(self.events.iter().map(|e| e.dur), self.settings.trial_dur);
        let mut seq = sequencer.sequence(trial_dur);
        if let Some(sim) = sim {
            sim.apply(&mut seq, &mut self.events, &self.config.valid_responses, self.seed);
        }
        run.planned = seq.len();

        self.state.transition(ExperimentState::Presenting)?;
        self.show_instructions(&run.timing, sim)?;

        self.state.transition(ExperimentState::Looping)?;
        let header: Vec<String> = self.settings.extra_info.keys().cloned().collect();
        let extra: Vec<Value> = self.settings.extra_info.values().cloned().collect();
        let display = self.display.as_mut().ok_or(DisplayError::Closed)?;

        run.timing.start_run();
        for (trial_no, mut record) in seq.records.into_iter().enumerate() {
            run.trial_no = trial_no;
            let onset = run.timing.start_trial();
            record.set(fields::ONSET, onset);
            tracing::info!(trial = trial_no + 1, of = run.planned, onset, "trial");

            let planned: Option<KeyPress> =
                sim.and_then(|_| AutorunSimulator::planned_response(&record));
            let mut all_keys: Vec<KeyPress> = Vec::new();
            for (index, event) in self.events.iter_mut().enumerate() {
                run.timing.start_event();
                let EventSpec {
                    name,
                    dur,
                    stimuli,
                    handler,
                } = event;
                let keys = {
                    let mut ctx = EventContext {
                        timing: &mut run.timing,
                        input: &mut self.input,
                        display: &mut *display,
                        stimuli,
                        scorer: &self.scorer,
                        trial: &record,
                        all_keys: &all_keys,
                        planned: planned.as_ref(),
                        dur: *dur,
                        trial_dur: seq.trial_dur,
                        index,
                    };
                    handler.run(&mut ctx)?
                };
                tracing::debug!(
                    event = %name,
                    elapsed = run.timing.event.elapsed(),
                    keys = keys.len(),
                    "event done"
                );
                all_keys.extend(keys);
                // keys nobody asked for during the event
                all_keys.extend(self.input.collect_responses(&run.timing.trial));
            }

            self.scorer.score(&mut record, &all_keys);
            if let Some(sim) = sim {
                sim.rescale(&mut record);
            }
            if let Some(recorder) = recorder.as_deref_mut() {
                let fields: Vec<String> = header
                    .iter()
                    .cloned()
                    .chain(record.keys().map(str::to_string))
                    .collect();
                let row: Vec<Value> = extra
                    .iter()
                    .cloned()
                    .chain(record.values().cloned())
                    .collect();
                recorder.append(&fields, &row)?;
            }
            run.completed.push(record);
        }
        Ok(())
    }

    fn show_instructions(
        &mut self,
        timing: &TimingController,
        sim: Option<&AutorunSimulator>,
    ) -> Result<(), RunError> {
        let display = self.display.as_mut().ok_or(DisplayError::Closed)?;
        let text = &self.settings.instructions.text;
        if !text.is_empty() {
            display.show_message(text)?;
            display.flip()?;
        }

        if sim.is_some() {
            // the trigger is simulated; only the abort key still counts
            self.input.check_abort()?;
        } else {
            let trigger = vec![self.config.trigger.clone()];
            tracing::info!(trigger = %self.config.trigger, "waiting for trigger");
            while self.input.last_keypress_in(&trigger)?.is_none() {
                std::hint::spin_loop();
            }
        }
        display.flip()?;

        if let Some(stim) = &self.wait_stim {
            stim.draw(display.surface());
            display.flip()?;
        }
        let wait = match sim {
            Some(sim) => sim.compress(self.settings.instructions.wait),
            None => self.settings.instructions.wait,
        };
        let input = &mut self.input;
        timing.spin_for(wait, || input.check_abort())
    }

    /// Closes the data file and releases the display. The display is taken
    /// out of the controller so it can only be closed once.
    fn teardown(
        &mut self,
        recorder: Option<&mut DataRecorder>,
        timing: &TimingController,
    ) -> Result<(), RunError> {
        timing.log_frame_stats();
        let closed = match recorder {
            Some(recorder) => recorder.close(),
            None => Ok(()),
        };
        if let Some(mut display) = self.display.take() {
            display.close();
            tracing::debug!("display released");
        }
        closed.map_err(RunError::from)
    }
}
