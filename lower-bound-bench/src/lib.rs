use log::trace;
use std::{io, ops::RangeInclusive, time::Duration};
use thiserror::Error;
use timer::{ActiveTimer, Timer};

pub mod batch;
pub mod cli;
pub mod containers;
pub mod generators;
pub mod input;
pub mod lower_bound;
pub mod registry;
pub mod replay;
pub mod values;

pub use batch::{BatchPolicy, BatchSize};
pub use containers::{ContainerKind, ContainerTag, SetContainer, SortedContainer, VectorContainer};
pub use values::{Order, ValueTag, ValueType};

pub const NS_TO_MS: u64 = 1_000_000;

#[derive(Debug, Error)]
pub enum Error {
    #[error("No measurements given")]
    NoMeasurements,

    #[error("Unable to sample needles from an empty dataset")]
    EmptyDataset,

    #[error("Quantity should be positive")]
    ZeroQuantity,

    #[error("Benchmark case registered twice: {0}")]
    DuplicateCase(String),

    #[error("Unknown output format: {0}")]
    UnknownFormat(String),

    #[error("IO Error")]
    IOError(#[from] io::Error),

    #[error("Unable to serialize report")]
    Json(#[from] serde_json::Error),
}

pub trait Named {
    /// The name of the benchmark case
    fn name(&self) -> &str;
}

/// A single registered benchmark
///
/// [`BenchmarkCase::run()`] is called several times by the [`Runner`]: first to estimate the number of iterations
/// achievable within [`MeasurementSettings::min_time`], then once per repetition. Each call gets a fresh [`State`]
/// and should keep calling [`State::keep_running_batch()`] until it returns `false`.
pub trait BenchmarkCase: Named {
    /// Runs the measured loop driven by the given timing state
    fn run(&mut self, state: &mut State) -> Result<(), Error>;

    /// Resets internal state (generators, random number generators, cached inputs) using given seed
    ///
    /// Called once before the case is measured, so that all the cases of a run observe the same input data.
    fn prepare_state(&mut self, _seed: u64) {}
}

/// Timing state of a single measurement
///
/// Accumulates the time between [`State::resume_timing()`] and [`State::pause_timing()`] calls. The timer is started
/// implicitly by the first call to [`State::keep_running_batch()`] and stopped by the last one.
pub struct State {
    max_iterations: usize,
    completed: usize,
    elapsed: u64,
    running: Option<<ActiveTimer as Timer>::Start>,
}

impl State {
    pub fn new(max_iterations: usize) -> Self {
        assert!(max_iterations > 0, "At least one iteration should be requested");
        Self {
            max_iterations,
            completed: 0,
            elapsed: 0,
            running: None,
        }
    }

    /// Returns `true` while more iterations should be performed
    ///
    /// Each call that returns `true` accounts for `batch` logical iterations.
    #[inline]
    pub fn keep_running_batch(&mut self, batch: usize) -> bool {
        assert!(batch > 0, "Batch should contain at least one iteration");
        if self.completed < self.max_iterations {
            if self.completed == 0 && self.running.is_none() {
                self.resume_timing();
            }
            self.completed += batch;
            true
        } else {
            if let Some(start) = self.running.take() {
                self.elapsed += ActiveTimer::stop(start);
            }
            false
        }
    }

    #[inline]
    pub fn keep_running(&mut self) -> bool {
        self.keep_running_batch(1)
    }

    #[inline]
    pub fn pause_timing(&mut self) {
        match self.running.take() {
            Some(start) => self.elapsed += ActiveTimer::stop(start),
            None => panic!("pause_timing() called while timer is paused"),
        }
    }

    #[inline]
    pub fn resume_timing(&mut self) {
        assert!(
            self.running.is_none(),
            "resume_timing() called while timer is running"
        );
        self.running = Some(ActiveTimer::start());
    }

    /// The number of logical iterations performed so far
    pub fn iterations(&self) -> usize {
        self.completed
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Time accumulated while the timer was running (in nanoseconds)
    pub fn elapsed_ns(&self) -> u64 {
        self.elapsed
    }

    pub fn is_timing(&self) -> bool {
        self.running.is_some()
    }
}

pub trait Reporter {
    fn on_complete(&mut self, _results: &RunResult) {}

    /// Called once after all the cases have been executed
    fn on_finish(&mut self) -> Result<(), Error> {
        Ok(())
    }
}

/// Describes basic settings for the benchmarking process
///
/// This structure is passed to [`cli::run()`].
///
/// Should be created only with overriding needed properties, like so:
/// ```rust
/// use lower_bound_bench::MeasurementSettings;
///
/// let settings = MeasurementSettings {
///     repetitions: 10,
///     ..Default::default()
/// };
/// ```
#[derive(Clone, Copy, Debug)]
pub struct MeasurementSettings {
    /// Minimum time a single sample should take (only timed regions are counted)
    pub min_time: Duration,

    /// The number of samples taken for each case
    pub repetitions: usize,

    /// Upper limit for the number of iterations in a sample
    pub max_iterations: usize,

    pub filter_outliers: bool,

    /// Seed passed to [`BenchmarkCase::prepare_state()`]
    pub seed: u64,
}

impl Default for MeasurementSettings {
    fn default() -> Self {
        Self {
            min_time: Duration::from_millis(100),
            repetitions: 5,
            max_iterations: 1_000_000_000,
            filter_outliers: false,
            seed: 42,
        }
    }
}

/// Single measurement of a benchmark case
#[derive(Clone, Copy, Debug)]
pub struct Sample {
    pub iterations: usize,
    pub elapsed_ns: u64,
}

impl Sample {
    pub fn per_iteration_ns(&self) -> f64 {
        self.elapsed_ns as f64 / self.iterations as f64
    }
}

/// Drives benchmark cases and aggregates their measurements
pub struct Runner {
    settings: MeasurementSettings,
}

impl Runner {
    /// Upper bound on how fast the number of iterations grows between estimation rounds
    const MAX_GROWTH: f64 = 10.;

    /// Margin applied when predicting the number of iterations needed to reach `min_time`
    const PREDICTION_MARGIN: f64 = 1.4;

    pub fn new(settings: MeasurementSettings) -> Self {
        assert!(settings.repetitions > 0);
        assert!(settings.max_iterations > 0);
        Self { settings }
    }

    /// Runs the case once with a given iteration target
    ///
    /// A case returning before the target is reached yields no measurement.
    pub fn measure(case: &mut dyn BenchmarkCase, iterations: usize) -> Result<Sample, Error> {
        let mut state = State::new(iterations);
        case.run(&mut state)?;
        if state.iterations() < state.max_iterations() {
            return Err(Error::NoMeasurements);
        }
        Ok(Sample {
            iterations: state.iterations(),
            elapsed_ns: state.elapsed_ns(),
        })
    }

    /// Estimates the number of iterations required for a single sample to take at least `min_time`
    pub fn estimate_iterations(&self, case: &mut dyn BenchmarkCase) -> Result<usize, Error> {
        let min_time = self.settings.min_time.as_nanos() as f64;
        let max_iterations = self.settings.max_iterations;

        let mut iterations = 1;
        loop {
            let sample = Self::measure(case, iterations)?;
            trace!(
                "{}: {} iterations took {} ns",
                case.name(),
                sample.iterations,
                sample.elapsed_ns
            );
            if sample.elapsed_ns as f64 >= min_time || iterations >= max_iterations {
                return Ok(iterations);
            }

            let multiplier = if sample.elapsed_ns == 0 {
                Self::MAX_GROWTH
            } else {
                (min_time * Self::PREDICTION_MARGIN / sample.elapsed_ns as f64).min(Self::MAX_GROWTH)
            };
            let predicted = (sample.iterations as f64 * multiplier).ceil() as usize;
            iterations = predicted.max(iterations + 1).min(max_iterations);
        }
    }

    pub fn run_case(&self, case: &mut dyn BenchmarkCase) -> Result<RunResult, Error> {
        case.prepare_state(self.settings.seed);

        let target = self.estimate_iterations(case)?;
        let samples = (0..self.settings.repetitions)
            .map(|_| Self::measure(case, target))
            .collect::<Result<Vec<_>, _>>()?;

        // cases run whole batches, so a sample may overshoot the target
        let iterations = samples.last().map_or(target, |s| s.iterations);
        calculate_run_result(
            case.name(),
            samples.iter().map(Sample::per_iteration_ns).collect(),
            iterations,
            self.settings.filter_outliers,
        )
    }
}

pub fn calculate_run_result<N: Into<String>>(
    name: N,
    mut samples: Vec<f64>,
    iterations: usize,
    filter_outliers: bool,
) -> Result<RunResult, Error> {
    let n = samples.len();

    // Calculating measurements range. All measurements outside this interval concidered outliers
    let range = if filter_outliers {
        iqr_variance_thresholds(samples.clone())
    } else {
        None
    };

    if let Some(range) = range {
        samples.retain(|v| range.contains(v));
    }

    let summary = Summary::from(&samples).ok_or(Error::NoMeasurements)?;
    let median = median(samples).ok_or(Error::NoMeasurements)?;

    Ok(RunResult {
        name: name.into(),
        iterations,
        summary,
        median,
        outliers: n - summary.n,
    })
}

/// Describes the results of a single benchmark case
#[derive(Clone, Debug)]
pub struct RunResult {
    /// name of a case
    pub name: String,

    /// number of iterations executed in each sample
    pub iterations: usize,

    /// statistical summary of per-iteration time (in nanoseconds)
    pub summary: Summary,

    pub median: f64,

    /// Numbers of detected and filtered outliers
    pub outliers: usize,
}

/// Statistical summary of per-iteration times
///
/// Mean and variance are updated incrementally with each observation (Welford's method, see Art of Computer
/// Programming, Vol 2, page 232).
#[derive(Clone, Copy, Debug)]
pub struct Summary {
    pub n: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub variance: f64,
    sum_of_squares: f64,
}

impl Summary {
    pub fn from(values: &[f64]) -> Option<Self> {
        let (first, rest) = values.split_first()?;
        let mut summary = Self::new(*first);
        for value in rest {
            summary.push(*value);
        }
        Some(summary)
    }

    fn new(value: f64) -> Self {
        Self {
            n: 1,
            min: value,
            max: value,
            mean: value,
            variance: 0.,
            sum_of_squares: 0.,
        }
    }

    pub fn push(&mut self, value: f64) {
        self.n += 1;
        self.min = self.min.min(value);
        self.max = self.max.max(value);

        let delta = value - self.mean;
        self.mean += delta / self.n as f64;
        self.sum_of_squares += delta * (value - self.mean);
        self.variance = self.sum_of_squares / (self.n - 1) as f64;
    }
}

/// Outlier detection algorithm based on interquartile range
///
/// Outliers are observations are 5 IQR away from the corresponding quartile.
pub fn iqr_variance_thresholds(mut input: Vec<f64>) -> Option<RangeInclusive<f64>> {
    const FACTOR: f64 = 5.;

    input.sort_by(f64::total_cmp);
    let (q1, q3) = (input.len() / 4, input.len() * 3 / 4);
    if q1 >= q3 || q3 >= input.len() || input[q1] >= input[q3] {
        return None;
    }
    let iqr = input[q3] - input[q1];

    Some((input[q1] - iqr * FACTOR)..=(input[q3] + iqr * FACTOR))
}

fn median(mut measures: Vec<f64>) -> Option<f64> {
    measures.sort_by(f64::total_cmp);

    let n = measures.len();
    if n == 0 {
        None
    } else if n % 2 == 0 {
        Some((measures[n / 2 - 1] + measures[n / 2]) / 2.)
    } else {
        Some(measures[n / 2])
    }
}

mod timer {
    use std::time::Instant;

    #[cfg(all(feature = "hw_timer", target_arch = "x86_64"))]
    pub(super) type ActiveTimer = x86::RdtscpTimer;

    #[cfg(not(all(feature = "hw_timer", target_arch = "x86_64")))]
    pub(super) type ActiveTimer = PlatformTimer;

    pub(super) trait Timer {
        type Start: Copy;

        fn start() -> Self::Start;
        fn stop(start_time: Self::Start) -> u64;
    }

    pub(super) struct PlatformTimer;

    impl Timer for PlatformTimer {
        type Start = Instant;

        #[inline]
        fn start() -> Instant {
            Instant::now()
        }

        #[inline]
        fn stop(start_time: Instant) -> u64 {
            start_time.elapsed().as_nanos() as u64
        }
    }

    #[cfg(all(feature = "hw_timer", target_arch = "x86_64"))]
    pub(super) mod x86 {
        use super::Timer;
        use std::arch::x86_64::{__rdtscp, _mm_mfence};

        pub struct RdtscpTimer;

        impl Timer for RdtscpTimer {
            type Start = u64;

            #[inline]
            fn start() -> u64 {
                unsafe {
                    _mm_mfence();
                    __rdtscp(&mut 0)
                }
            }

            #[inline]
            fn stop(start: u64) -> u64 {
                unsafe {
                    let end = __rdtscp(&mut 0);
                    _mm_mfence();
                    end - start
                }
            }
        }
    }
}
