//! Runtime metrics and instrumentation.
//!
//! Re-evaluation runs inside the host's frame, so the engine keeps cheap
//! lock-free counters for every decision it makes, plus a small ring of
//! recent evaluation timings. Both can be queried at runtime or exported
//! as Prometheus text.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::Mutex;

// ---------------------------------------------------------------------------
// Counters (lock-free)
// ---------------------------------------------------------------------------

/// Atomic counters incremented on the hot path.
pub struct MorphCounters {
    /// Re-evaluations attempted.
    pub evaluations: AtomicU64,
    /// Re-evaluations that found no rule set or no model data.
    pub sessions_skipped: AtomicU64,
    /// Channel commits staged (offsets and targets).
    pub commits: AtomicU64,
    /// Pushes whose change exceeded the refresh threshold.
    pub refresh_requests: AtomicU64,
    /// Rule sets built from disk.
    pub rulesets_loaded: AtomicU64,
    /// Rule-script entries or files that failed to load.
    pub load_errors: AtomicU64,
    /// Keyword morph scripts decoded.
    pub keyword_scripts_parsed: AtomicU64,
}

impl MorphCounters {
    /// Zeroed counters.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            evaluations: AtomicU64::new(0),
            sessions_skipped: AtomicU64::new(0),
            commits: AtomicU64::new(0),
            refresh_requests: AtomicU64::new(0),
            rulesets_loaded: AtomicU64::new(0),
            load_errors: AtomicU64::new(0),
            keyword_scripts_parsed: AtomicU64::new(0),
        }
    }

    /// Add `n` to a counter.
    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Snapshot all counters for export.
    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            evaluations: self.evaluations.load(Ordering::Relaxed),
            sessions_skipped: self.sessions_skipped.load(Ordering::Relaxed),
            commits: self.commits.load(Ordering::Relaxed),
            refresh_requests: self.refresh_requests.load(Ordering::Relaxed),
            rulesets_loaded: self.rulesets_loaded.load(Ordering::Relaxed),
            load_errors: self.load_errors.load(Ordering::Relaxed),
            keyword_scripts_parsed: self.keyword_scripts_parsed.load(Ordering::Relaxed),
        }
    }
}

impl Default for MorphCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// Counter values at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterSnapshot {
    /// Re-evaluations attempted.
    pub evaluations: u64,
    /// Re-evaluations skipped.
    pub sessions_skipped: u64,
    /// Channel commits staged.
    pub commits: u64,
    /// Visual refreshes requested.
    pub refresh_requests: u64,
    /// Rule sets loaded.
    pub rulesets_loaded: u64,
    /// Load failures.
    pub load_errors: u64,
    /// Keyword scripts decoded.
    pub keyword_scripts_parsed: u64,
}

impl CounterSnapshot {
    /// Format as Prometheus-compatible text.
    #[must_use]
    pub fn to_prometheus(&self) -> String {
        let rows = [
            ("evaluations", "Morph re-evaluations attempted", self.evaluations),
            ("sessions_skipped", "Re-evaluations without rule set or model data", self.sessions_skipped),
            ("commits", "Channel commits staged", self.commits),
            ("refresh_requests", "Visual refreshes requested", self.refresh_requests),
            ("rulesets_loaded", "Rule sets loaded from disk", self.rulesets_loaded),
            ("load_errors", "Rule script load failures", self.load_errors),
            ("keyword_scripts_parsed", "Keyword morph scripts decoded", self.keyword_scripts_parsed),
        ];
        let mut out = String::new();
        for (name, help, value) in rows {
            out.push_str(&format!(
                "# HELP dynmorph_{name}_total {help}\n\
                 # TYPE dynmorph_{name}_total counter\n\
                 dynmorph_{name}_total {value}\n"
            ));
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Evaluation Timing
// ---------------------------------------------------------------------------

const TIMING_WINDOW: usize = 128;

/// Ring buffer of recent re-evaluation timings.
pub struct EvaluationTimer {
    history: Mutex<TimingHistory>,
}

struct TimingHistory {
    timings: Vec<f64>,
    write_idx: usize,
    count: u64,
}

impl EvaluationTimer {
    /// Empty timer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            history: Mutex::new(TimingHistory {
                timings: vec![0.0; TIMING_WINDOW],
                write_idx: 0,
                count: 0,
            }),
        }
    }

    /// Start timing; the guard records on drop.
    pub fn start(&self) -> TimingGuard<'_> {
        TimingGuard {
            timer: self,
            start: Instant::now(),
        }
    }

    /// Record one timing in milliseconds.
    pub fn record(&self, ms: f64) {
        let mut h = self.history.lock();
        let idx = h.write_idx;
        h.timings[idx] = ms;
        h.write_idx = (idx + 1) % TIMING_WINDOW;
        h.count += 1;
    }

    /// Number of timings recorded since creation.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.history.lock().count
    }

    /// Mean and maximum over the retained window, in milliseconds.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn summary(&self) -> (f64, f64) {
        let h = self.history.lock();
        let n = (h.count as usize).min(TIMING_WINDOW);
        if n == 0 {
            return (0.0, 0.0);
        }
        let window = &h.timings[..n];
        let mean = window.iter().sum::<f64>() / n as f64;
        let max = window.iter().copied().fold(0.0, f64::max);
        (mean, max)
    }
}

impl Default for EvaluationTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Records elapsed time into its [`EvaluationTimer`] when dropped.
pub struct TimingGuard<'a> {
    timer: &'a EvaluationTimer,
    start: Instant,
}

impl Drop for TimingGuard<'_> {
    fn drop(&mut self) {
        self.timer.record(self.start.elapsed().as_secs_f64() * 1000.0);
    }
}

// ---------------------------------------------------------------------------
// Tracing Span Names
// ---------------------------------------------------------------------------

/// Span names used with `tracing::span!`.
pub mod spans {
    /// One character re-evaluation.
    pub const REEVALUATE: &str = "dynmorph::reevaluate";
    /// Rule-set directory load.
    pub const LOAD_RULESET: &str = "dynmorph::ruleset::load";
    /// Full rule-set scan.
    pub const LOAD_ALL: &str = "dynmorph::ruleset::load_all";
    /// Keyword morph pass.
    pub const KEYWORD_MORPHS: &str = "dynmorph::keywords";
    /// Scheduler tick.
    pub const SCHEDULER_TICK: &str = "dynmorph::scheduler::tick";
}
