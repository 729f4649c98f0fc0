//! Contains functionality of a `cargo bench` harness

use self::reporting::{ConsoleReporter, JsonReporter, VerboseReporter};
use crate::{BenchmarkCase, Error, MeasurementSettings, Reporter, Runner};
use anyhow::Context;
use clap::Parser;
use colorz::mode::{self, Mode};
use core::fmt;
use env_logger::Env;
use glob_match::glob_match;
use log::{debug, error, info};
use std::{
    env::args_os, ffi::OsString, fmt::Display, num::NonZeroUsize, process::ExitCode, str::FromStr,
    time::Duration,
};

pub type Result<T> = anyhow::Result<T>;
pub type StdResult<T, E> = std::result::Result<T, E>;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Opts {
    #[command(flatten)]
    bench_flags: CargoBenchFlags,

    /// run only cases with names matching a given glob pattern
    #[arg(short = 'f', long = "filter")]
    filter: Option<String>,

    /// number of samples taken for each case
    #[arg(short = 'r', long = "repetitions")]
    repetitions: Option<NonZeroUsize>,

    /// minimum measured time of a single sample (in seconds)
    #[arg(short = 't', long = "min-time")]
    min_time: Option<f64>,

    /// seed for the dataset and needle generators
    #[arg(long = "seed")]
    seed: Option<u64>,

    /// enable outlier detection
    #[arg(short = 'o', long = "filter-outliers")]
    filter_outliers: bool,

    #[arg(long = "format", default_value = "console")]
    format: OutputFormat,

    /// list names of the cases and exit
    #[arg(long = "list", default_value_t = false)]
    list: bool,

    #[arg(long = "color", default_value = "detect")]
    coloring_mode: String,
}

/// Definition of the flags required to comply with `cargo bench` calling conventions.
#[derive(Parser, Debug, Clone)]
struct CargoBenchFlags {
    #[arg(long = "bench", default_value_t = true)]
    bench: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Console,
    Verbose,
    Json,
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> StdResult<Self, Self::Err> {
        match s {
            "console" => Ok(OutputFormat::Console),
            "verbose" => Ok(OutputFormat::Verbose),
            "json" => Ok(OutputFormat::Json),
            _ => Err(Error::UnknownFormat(s.to_string())),
        }
    }
}

/// Initializes `env_logger` (controlled by `RUST_LOG`, warnings and errors by default)
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or("warn")).try_init();
}

/// Runs given cases using command line arguments of the process
pub fn run(settings: MeasurementSettings, cases: Vec<Box<dyn BenchmarkCase>>) -> Result<ExitCode> {
    run_with_args(args_os(), settings, cases)
}

pub fn run_with_args<I, T>(
    args: I,
    settings: MeasurementSettings,
    mut cases: Vec<Box<dyn BenchmarkCase>>,
) -> Result<ExitCode>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    init_logging();

    let opts = match Opts::try_parse_from(args) {
        Ok(opts) => opts,
        Err(e) => {
            let code = e.exit_code();
            e.print().context("Unable to print usage")?;
            return Ok(ExitCode::from(code as u8));
        }
    };

    match Mode::from_str(&opts.coloring_mode) {
        Ok(coloring_mode) => mode::set_coloring_mode(coloring_mode),
        Err(_) => eprintln!("[WARN] Invalid coloring mode: {}", opts.coloring_mode),
    }

    let filter = opts.filter.as_deref().unwrap_or("");

    if opts.list {
        for case in cases.iter().filter(|c| matches(filter, c.name())) {
            println!("{}", case.name());
        }
        return Ok(ExitCode::SUCCESS);
    }

    let settings = apply_opts(settings, &opts)?;
    let mut reporter: Box<dyn Reporter> = match opts.format {
        OutputFormat::Console => Box::<ConsoleReporter>::default(),
        OutputFormat::Verbose => Box::<VerboseReporter>::default(),
        OutputFormat::Json => Box::<JsonReporter>::default(),
    };

    let outcome = execute(&Runner::new(settings), &mut cases, filter, reporter.as_mut());
    reporter
        .on_finish()
        .context("Unable to write benchmark report")?;

    info!(
        "{} cases completed, {} failed",
        outcome.completed, outcome.failed
    );
    if outcome.failed > 0 {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn apply_opts(mut settings: MeasurementSettings, opts: &Opts) -> Result<MeasurementSettings> {
    if let Some(repetitions) = opts.repetitions {
        settings.repetitions = repetitions.into();
    }
    if let Some(min_time) = opts.min_time {
        settings.min_time = Duration::try_from_secs_f64(min_time)
            .with_context(|| format!("Invalid minimum time: {}", min_time))?;
    }
    if let Some(seed) = opts.seed {
        settings.seed = seed;
    }
    settings.filter_outliers |= opts.filter_outliers;
    Ok(settings)
}

fn matches(filter: &str, name: &str) -> bool {
    filter.is_empty() || glob_match(filter, name)
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Outcome {
    completed: usize,
    failed: usize,
}

/// Runs all the cases matching the filter one after another
///
/// A failure of a case is reported and does not prevent other cases from running.
fn execute(
    runner: &Runner,
    cases: &mut [Box<dyn BenchmarkCase>],
    filter: &str,
    reporter: &mut dyn Reporter,
) -> Outcome {
    let mut outcome = Outcome::default();
    for case in cases.iter_mut() {
        if !matches(filter, case.name()) {
            debug!("Skipping {}", case.name());
            continue;
        }

        match runner.run_case(case.as_mut()) {
            Ok(result) => {
                reporter.on_complete(&result);
                outcome.completed += 1;
            }
            Err(e) => {
                error!("Case {} failed: {}", case.name(), e);
                outcome.failed += 1;
            }
        }
    }
    outcome
}

pub mod reporting {
    use crate::cli::{colorize, HumanTime};
    use crate::{Error, Reporter, RunResult};
    use colorz::{mode::Stream, Colorize};
    use serde::Serialize;
    use std::io::{self, Write};

    /// Relative standard deviation above which results are highlighted as noisy
    const NOISE_THRESHOLD: f64 = 0.05;

    fn is_noisy(results: &RunResult) -> bool {
        let summary = &results.summary;
        summary.mean > 0. && summary.variance.sqrt() / summary.mean > NOISE_THRESHOLD
    }

    #[derive(Default)]
    pub(super) struct VerboseReporter;

    impl Reporter for VerboseReporter {
        fn on_complete(&mut self, results: &RunResult) {
            let summary = results.summary;
            let noisy = is_noisy(results);

            println!(
                "{}  (n: {}, iterations: {}, outliers: {})",
                results.name.bold().stream(Stream::Stdout),
                summary.n,
                results.iterations,
                results.outliers
            );

            println!("    {:12} ╭────────────────", "");
            println!("    {:12} │ {:>15}", "mean", HumanTime(summary.mean));
            println!("    {:12} │ {:>15}", "median", HumanTime(results.median));
            println!("    {:12} │ {:>15}", "min", HumanTime(summary.min));
            println!("    {:12} │ {:>15}", "max", HumanTime(summary.max));
            println!(
                "    {:12} │ {:>15}{}",
                "std. dev.",
                colorize(HumanTime(summary.variance.sqrt()), noisy),
                if noisy { " !" } else { "" },
            );
            println!();
        }
    }

    #[derive(Default)]
    pub(super) struct ConsoleReporter;

    impl Reporter for ConsoleReporter {
        fn on_complete(&mut self, results: &RunResult) {
            let summary = results.summary;
            let noisy = is_noisy(results);

            println!(
                "{:50} [ {:>10} ... {:>10} ]  {:>12} iterations",
                results.name,
                colorize(HumanTime(summary.mean), noisy),
                HumanTime(results.median),
                results.iterations,
            )
        }
    }

    #[derive(Serialize)]
    struct Record {
        name: String,
        iterations: usize,
        samples: usize,
        outliers: usize,
        mean_ns: f64,
        median_ns: f64,
        min_ns: f64,
        max_ns: f64,
        stddev_ns: f64,
    }

    impl From<&RunResult> for Record {
        fn from(results: &RunResult) -> Self {
            let summary = results.summary;
            Self {
                name: results.name.clone(),
                iterations: results.iterations,
                samples: summary.n,
                outliers: results.outliers,
                mean_ns: summary.mean,
                median_ns: results.median,
                min_ns: summary.min,
                max_ns: summary.max,
                stddev_ns: summary.variance.sqrt(),
            }
        }
    }

    #[derive(Serialize)]
    struct Report<'a> {
        schema_version: u32,
        sdk_version: &'a str,
        results: &'a [Record],
    }

    /// Collects all the results and writes a single JSON document to stdout
    #[derive(Default)]
    pub(super) struct JsonReporter {
        records: Vec<Record>,
    }

    impl JsonReporter {
        fn write_to(&self, mut out: impl Write) -> Result<(), Error> {
            let report = Report {
                schema_version: 1,
                sdk_version: env!("CARGO_PKG_VERSION"),
                results: &self.records,
            };
            serde_json::to_writer_pretty(&mut out, &report)?;
            writeln!(out)?;
            Ok(())
        }
    }

    impl Reporter for JsonReporter {
        fn on_complete(&mut self, results: &RunResult) {
            self.records.push(results.into());
        }

        fn on_finish(&mut self) -> Result<(), Error> {
            self.write_to(io::stdout().lock())
        }
    }

}

fn colorize<T: Display>(value: T, do_paint: bool) -> impl Display {
    use colorz::{ansi, mode::Stream::Stdout, Colorize, Style};

    const RED: Style = Style::new().fg(ansi::Red).const_into_runtime_style();
    const DEFAULT: Style = Style::new().const_into_runtime_style();

    if do_paint {
        value.into_style_with(RED).stream(Stdout)
    } else {
        value.into_style_with(DEFAULT).stream(Stdout)
    }
}

struct HumanTime(f64);

impl fmt::Display for HumanTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const USEC: f64 = 1_000.;
        const MSEC: f64 = USEC * 1_000.;
        const SEC: f64 = MSEC * 1_000.;

        if self.0.abs() > SEC {
            f.pad(&format!("{:.1} s", self.0 / SEC))
        } else if self.0.abs() > MSEC {
            f.pad(&format!("{:.1} ms", self.0 / MSEC))
        } else if self.0.abs() > USEC {
            f.pad(&format!("{:.1} us", self.0 / USEC))
        } else if self.0 == 0. {
            f.pad("0 ns")
        } else {
            f.pad(&format!("{:.1} ns", self.0))
        }
    }
}
