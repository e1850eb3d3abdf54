use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use psylab_experiment::DEFAULT_SPEED;

pub const USAGE: &str = "\
Usage: psylab [OPTIONS]

Options:
  --autorun [SPEED]        Run headless with synthesized responses (default speed 100)
  --no-output              Do not write data, summary or log files
  --subject ID             Participant id (default: next free id in the data directory)
  --seed N                 Seed for trial order and synthesized responses
  --computer FILE          JSON profile of this computer
  --reps N                 Repetitions of the trial list (default 2)
  --require-recognized     Refuse to run on a computer without a known profile
  --debug                  Windowed display with a visible cursor and debug logging
  -h, --help               Print this help";

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Args {
    /// Speed multiplier when running headless
    pub autorun: Option<f64>,
    pub no_output: bool,
    pub subject: Option<String>,
    pub seed: Option<u64>,
    pub computer: Option<PathBuf>,
    pub reps: Option<usize>,
    pub require_recognized: bool,
    pub debug: bool,
    pub help: bool,
}

impl Args {
    pub fn parse<I: IntoIterator<Item = String>>(args: I) -> Result<Self> {
        let mut parsed = Args::default();
        let mut args = args.into_iter().peekable();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--autorun" => {
                    let speed = match args.next_if(|next| !next.starts_with('-')) {
                        Some(value) => value
                            .parse()
                            .with_context(|| format!("Invalid autorun speed: {value}"))?,
                        None => DEFAULT_SPEED,
                    };
                    parsed.autorun = Some(speed);
                }
                "--no-output" => parsed.no_output = true,
                "--require-recognized" => parsed.require_recognized = true,
                "--debug" => parsed.debug = true,
                "--subject" => parsed.subject = Some(value(&mut args, &arg)?),
                "--computer" => parsed.computer = Some(PathBuf::from(value(&mut args, &arg)?)),
                "--seed" => {
                    let v = value(&mut args, &arg)?;
                    parsed.seed = Some(v.parse().with_context(|| format!("Invalid seed: {v}"))?);
                }
                "--reps" => {
                    let v = value(&mut args, &arg)?;
                    parsed.reps = Some(
                        v.parse()
                            .with_context(|| format!("Invalid repetition count: {v}"))?,
                    );
                }
                "-h" | "--help" => parsed.help = true,
                other => bail!("Unknown argument: {other}\n\n{USAGE}"),
            }
        }
        Ok(parsed)
    }
}

fn value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String> {
    args.next().with_context(|| format!("{flag} needs a value"))
}
