//! Expertise: a station-local productivity curve.
//!
//! A station gets faster as it accumulates completed runs (or producing
//! time). The curve itself is a pluggable [`ExpertiseSchedule`]; the
//! [`ExpertiseCalculator`] owns the accumulated stats and is mutated only by
//! its station at run start and completion.

/// Cumulative production history for one station.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ExpertiseStats {
    pub runs: u64,
    pub seconds_producing: f64,
}

/// Maps accumulated stats to a production-time reduction.
pub trait ExpertiseSchedule: Send + Sync {
    /// How far along the expertise ramp the station is, in `[0, 1]`.
    fn progress(&self, stats: &ExpertiseStats) -> f64;

    /// Fraction of base production time saved, in `[0, max_time_reduction]`.
    fn time_reduction(&self, stats: &ExpertiseStats) -> f64;
}

/// Linear ramp over completed runs, capped at `max_time_reduction`.
#[derive(Debug, Clone, Copy)]
pub struct ByRunsSchedule {
    pub runs_until_expert: u64,
    pub max_time_reduction: f64,
}

impl ExpertiseSchedule for ByRunsSchedule {
    fn progress(&self, stats: &ExpertiseStats) -> f64 {
        if self.runs_until_expert == 0 {
            return 1.0;
        }
        (stats.runs as f64 / self.runs_until_expert as f64).min(1.0)
    }

    fn time_reduction(&self, stats: &ExpertiseStats) -> f64 {
        self.progress(stats) * self.max_time_reduction
    }
}

/// Linear ramp over cumulative producing time, capped at `max_time_reduction`.
#[derive(Debug, Clone, Copy)]
pub struct ByTimeSchedule {
    pub seconds_until_expert: f64,
    pub max_time_reduction: f64,
}

impl ExpertiseSchedule for ByTimeSchedule {
    fn progress(&self, stats: &ExpertiseStats) -> f64 {
        if self.seconds_until_expert <= 0.0 {
            return 1.0;
        }
        (stats.seconds_producing / self.seconds_until_expert).min(1.0)
    }

    fn time_reduction(&self, stats: &ExpertiseStats) -> f64 {
        self.progress(stats) * self.max_time_reduction
    }
}

/// Tracks one station's expertise stats against a schedule.
pub struct ExpertiseCalculator {
    schedule: Box<dyn ExpertiseSchedule>,
    stats: ExpertiseStats,
}

impl std::fmt::Debug for ExpertiseCalculator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpertiseCalculator")
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl ExpertiseCalculator {
    pub fn new(schedule: Box<dyn ExpertiseSchedule>) -> Self {
        Self {
            schedule,
            stats: ExpertiseStats::default(),
        }
    }

    /// Default ramp: half the production time saved after ten runs.
    pub fn default_by_runs() -> Self {
        Self::new(Box::new(ByRunsSchedule {
            runs_until_expert: 10,
            max_time_reduction: 0.5,
        }))
    }

    pub fn record_run(&mut self) {
        self.stats.runs += 1;
    }

    pub fn record_seconds_producing(&mut self, seconds: f64) {
        self.stats.seconds_producing += seconds;
    }

    pub fn stats(&self) -> ExpertiseStats {
        self.stats
    }

    pub fn progress(&self) -> f64 {
        self.schedule.progress(&self.stats)
    }

    pub fn time_reduction(&self) -> f64 {
        self.schedule.time_reduction(&self.stats)
    }
}

/// Declarative schedule description, usable in templates and manifests
/// where the boxed calculator cannot be cloned or deserialized.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpertiseSpec {
    ByRuns {
        runs_until_expert: u64,
        max_time_reduction: f64,
    },
    ByTime {
        seconds_until_expert: f64,
        max_time_reduction: f64,
    },
}

impl Default for ExpertiseSpec {
    fn default() -> Self {
        ExpertiseSpec::ByRuns {
            runs_until_expert: 10,
            max_time_reduction: 0.5,
        }
    }
}

impl ExpertiseSpec {
    pub fn build(&self) -> ExpertiseCalculator {
        match *self {
            ExpertiseSpec::ByRuns {
                runs_until_expert,
                max_time_reduction,
            } => ExpertiseCalculator::new(Box::new(ByRunsSchedule {
                runs_until_expert,
                max_time_reduction,
            })),
            ExpertiseSpec::ByTime {
                seconds_until_expert,
                max_time_reduction,
            } => ExpertiseCalculator::new(Box::new(ByTimeSchedule {
                seconds_until_expert,
                max_time_reduction,
            })),
        }
    }
}
