use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, bail};
use psylab_core::{Color, Configuration, Display, Recognition, Seed};
use psylab_experiment::{
    ExperimentConfig, ExperimentController, InputSource, Instructions, Method, NoInput, Paths,
    RunParams, RunSummary, guess_participant,
};
use psylab_render::{Canvas, HeadlessDisplay, load_font};
use psylab_timing::{HighPrecisionTimer, Timer};
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

mod cli;
mod task;

use cli::{Args, USAGE};
use task::TwoChoice;

const DEFAULT_REPS: usize = 2;
const HEADLESS_SIZE: (u32, u32) = (1280, 720);

fn main() -> Result<()> {
    let args = Args::parse(std::env::args().skip(1))?;
    if args.help {
        println!("{USAGE}");
        return Ok(());
    }

    let config = match &args.computer {
        Some(path) => Configuration::load(path)
            .with_context(|| format!("Cannot load computer profile {}", path.display()))?,
        None => Configuration::default(),
    };
    let paths = Paths::new(config.root.clone());
    let subject = args
        .subject
        .clone()
        .unwrap_or_else(|| guess_participant(&paths.data, "01"));

    let settings = settings(&args, &subject);

    let log_file = (!args.no_output).then(|| paths.log_file(&subject));
    init_logging(log_file.as_deref(), default_level(&settings))?;

    let seed = args.seed.map(Seed::new).unwrap_or_else(Seed::from_time);
    info!(
        seed = seed.value(),
        subject = %subject,
        os = std::env::consts::OS,
        arch = std::env::consts::ARCH,
        "starting {}",
        task::NAME
    );

    if config.check() == Recognition::Unrecognized && args.require_recognized {
        bail!("This computer is not recognized, refusing to run");
    }

    let timer: Arc<dyn Timer> = Arc::new(HighPrecisionTimer::new());
    let font = config
        .font_path
        .as_deref()
        .map(load_font)
        .transpose()
        .context("Cannot load the message font")?;

    let summary = match args.autorun {
        Some(speed) => {
            let mut display = HeadlessDisplay::new(HEADLESS_SIZE.0, HEADLESS_SIZE.1)?;
            if let Some(font) = font {
                display = display.with_font(font);
            }
            run(config, settings, display, Box::new(NoInput), timer, seed, Some(speed))?
        }
        None => {
            let (display, keys) = psylab_app::open_window(
                task::NAME,
                timer.clone(),
                &config.abort_key,
                Color::BLACK,
                font,
                settings.run_params.debug,
            )?;
            if let Some(hz) = display.refresh_rate() {
                info!(refresh_rate = hz, "window opened");
            }
            run(config, settings, display, Box::new(keys), timer, seed, None)?
        }
    };

    if !args.no_output {
        let path = paths.summary_file(&subject);
        summary.write_json(&path)?;
        info!(path = %path.display(), "summary written");
    }
    info!(
        outcome = ?summary.outcome,
        completed = summary.trials_completed,
        planned = summary.trials_planned,
        "run ended"
    );
    Ok(())
}

/// Debug runs log everything the crates report
fn default_level(settings: &ExperimentConfig) -> &'static str {
    if settings.run_params.debug { "debug" } else { "info" }
}

/// Logs go to stderr and, unless output is disabled, to the subject's log file.
/// `RUST_LOG` overrides `level`.
fn init_logging(log_file: Option<&Path>, level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_layer = match log_file {
        Some(path) => {
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir)
                    .with_context(|| format!("Cannot create log directory {}", dir.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Cannot open log file {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    Ok(())
}

fn settings(args: &Args, subject: &str) -> ExperimentConfig {
    let mut settings = ExperimentConfig {
        name: task::NAME.to_string(),
        n_reps: args.reps.unwrap_or(DEFAULT_REPS),
        method: Method::Random,
        run_params: RunParams {
            no_output: args.no_output,
            debug: args.debug,
            ..RunParams::default()
        },
        instructions: Instructions {
            text: task::INSTRUCTIONS.to_string(),
            wait: 1.0,
        },
        ..ExperimentConfig::default()
    };
    settings.set_subject_id(subject);
    settings
}

fn run<D: Display<Surface = Canvas>>(
    config: Configuration,
    settings: ExperimentConfig,
    display: D,
    input: Box<dyn InputSource>,
    timer: Arc<dyn Timer>,
    seed: Seed,
    autorun: Option<f64>,
) -> Result<RunSummary> {
    let mut task = TwoChoice::new()?;
    let mut controller = ExperimentController::new(config, settings, display, input, timer, seed);
    controller.setup(&mut task)?;
    let summary = match autorun {
        Some(speed) => controller.autorun(Some(speed))?,
        None => controller.run()?,
    };
    Ok(summary)
}
