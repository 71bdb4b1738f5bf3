//! Monte Carlo execution of both mechanic variants.
//!
//! Every run owns its state; the random source is the only thing threaded
//! through, so a fixed seed reproduces the same traces.
use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ancestors::AdvancedModel;
use crate::attempt::{AttemptOutcome, AttemptParams, AttemptPhase, AttemptRecord, AttemptState, transition};
use crate::constants::{MAX_TRIES_PER_RUN, MAX_TURNS_PER_RUN};
use crate::error::{EngineError, InputError};
use crate::expected::{expected_reward_per_turn, turns_for_target};
use crate::grades::Grade;
use crate::model::ProbabilityModel;
use crate::modifiers::ModifierChoice;
use crate::numbers::{u64_to_f64, usize_to_f64};
use crate::rng::RandomSource;
use crate::turns::{Track, TrackChoices, TurnOutcomeResolver};

/// What a summary's counts measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountKind {
    /// Failed attempts before success (single-track).
    FailedAttempts,
    /// Turns needed to reach the reward target (dual-track).
    Turns,
}

/// Empirical distribution of per-run counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSummary {
    pub kind: CountKind,
    pub iterations: usize,
    pub mean: f64,
    pub min: u32,
    pub max: u32,
    pub p50: u32,
    pub p90: u32,
    pub p99: u32,
    /// Runs that ended through the energy guarantee (single-track only).
    pub guaranteed_runs: u64,
    pub histogram: BTreeMap<u32, u64>,
}

impl SimulationSummary {
    /// Mean attempts including the successful one, for single-track runs.
    #[must_use]
    pub fn mean_attempts(&self) -> f64 {
        match self.kind {
            CountKind::FailedAttempts => self.mean + 1.0,
            CountKind::Turns => self.mean,
        }
    }

    #[must_use]
    pub fn guaranteed_rate(&self) -> f64 {
        if self.iterations == 0 {
            return 0.0;
        }
        u64_to_f64(self.guaranteed_runs) / usize_to_f64(self.iterations)
    }

    /// `(mean - reference) / reference`.
    #[must_use]
    pub fn relative_deviation(&self, reference: f64) -> f64 {
        if reference == 0.0 {
            return if self.mean == 0.0 { 0.0 } else { f64::INFINITY };
        }
        (self.mean - reference) / reference
    }
}

/// Incremental accumulator so long runs can be executed in chunks.
#[derive(Debug, Clone)]
pub struct SummaryBuilder {
    kind: CountKind,
    counts: Vec<u32>,
    total: u64,
    guaranteed_runs: u64,
}

impl SummaryBuilder {
    #[must_use]
    pub fn new(kind: CountKind, capacity: usize) -> Self {
        Self {
            kind,
            counts: Vec::with_capacity(capacity),
            total: 0,
            guaranteed_runs: 0,
        }
    }

    pub fn push(&mut self, count: u32, guaranteed: bool) {
        self.counts.push(count);
        self.total = self.total.saturating_add(u64::from(count));
        if guaranteed {
            self.guaranteed_runs = self.guaranteed_runs.saturating_add(1);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// # Errors
    ///
    /// Returns [`InputError::ZeroIterations`] when nothing was recorded.
    pub fn finish(mut self) -> Result<SimulationSummary, InputError> {
        if self.counts.is_empty() {
            return Err(InputError::ZeroIterations);
        }
        self.counts.sort_unstable();
        let mut histogram = BTreeMap::new();
        for &count in &self.counts {
            *histogram.entry(count).or_insert(0_u64) += 1;
        }
        let iterations = self.counts.len();
        Ok(SimulationSummary {
            kind: self.kind,
            iterations,
            mean: u64_to_f64(self.total) / usize_to_f64(iterations),
            min: self.counts[0],
            max: self.counts[iterations - 1],
            p50: nearest_rank(&self.counts, 0.50),
            p90: nearest_rank(&self.counts, 0.90),
            p99: nearest_rank(&self.counts, 0.99),
            guaranteed_runs: self.guaranteed_runs,
            histogram,
        })
    }
}

fn nearest_rank(sorted: &[u32], quantile: f64) -> u32 {
    let n = sorted.len();
    let rank = num_traits::cast::<f64, usize>((quantile * usize_to_f64(n)).ceil())
        .unwrap_or(n)
        .clamp(1, n);
    sorted[rank - 1]
}

/// Run one single-track sequence to success; returns failed attempts and the
/// final outcome.
///
/// Hand-built parameters that never reach the guarantee stop after
/// [`MAX_TRIES_PER_RUN`] failures and report [`AttemptOutcome::Failure`].
pub fn run_single_track<R: RandomSource + ?Sized>(
    params: &AttemptParams,
    rng: &mut R,
) -> (u32, AttemptOutcome) {
    let mut state = AttemptState::new(params);
    loop {
        let step = transition(state, params, rng.next_unit());
        if step.phase == AttemptPhase::Succeeded {
            return (step.state.try_count, step.record.outcome);
        }
        if step.state.try_count >= MAX_TRIES_PER_RUN {
            warn!("single-track run stopped after {MAX_TRIES_PER_RUN} failures");
            return (step.state.try_count, AttemptOutcome::Failure);
        }
        state = step.state;
    }
}

/// Run one single-track sequence and keep every attempt for visualization.
pub fn simulate_with_trace<R: RandomSource + ?Sized>(
    params: &AttemptParams,
    rng: &mut R,
) -> Vec<AttemptRecord> {
    let mut state = AttemptState::new(params);
    let mut records = Vec::new();
    loop {
        let step = transition(state, params, rng.next_unit());
        trace!(
            "attempt {}: p={:.5} energy={:.5} {:?}",
            step.record.try_index,
            step.record.final_probability,
            step.record.energy_before,
            step.record.outcome
        );
        records.push(step.record);
        if step.phase == AttemptPhase::Succeeded || step.state.try_count >= MAX_TRIES_PER_RUN {
            return records;
        }
        state = step.state;
    }
}

/// Mean failed attempts before success over `iterations` independent runs.
///
/// # Errors
///
/// Returns a config error for unknown levels and [`InputError::ZeroIterations`]
/// when `iterations` is zero.
pub fn simulate<R: RandomSource + ?Sized>(
    model: &ProbabilityModel,
    level: u32,
    choice: &ModifierChoice,
    iterations: usize,
    rng: &mut R,
) -> Result<SimulationSummary, EngineError> {
    let params = AttemptParams::resolve(model, level, choice)?;
    let summary = simulate_params(&params, iterations, rng)?;
    debug!(
        "level {level}: {} runs, mean tries {:.4}, guaranteed {:.2}%",
        summary.iterations,
        summary.mean,
        summary.guaranteed_rate() * 100.0
    );
    Ok(summary)
}

/// [`simulate`] for already-resolved parameters.
///
/// # Errors
///
/// Returns [`InputError::ZeroIterations`] when `iterations` is zero and
/// [`InputError::UnboundedAttempts`] when the parameters never reach the
/// energy guarantee.
pub fn simulate_params<R: RandomSource + ?Sized>(
    params: &AttemptParams,
    iterations: usize,
    rng: &mut R,
) -> Result<SimulationSummary, InputError> {
    if iterations == 0 {
        return Err(InputError::ZeroIterations);
    }
    if params.failure_horizon().is_none() {
        return Err(InputError::UnboundedAttempts {
            limit: MAX_TRIES_PER_RUN,
        });
    }
    let mut builder = SummaryBuilder::new(CountKind::FailedAttempts, iterations);
    for _ in 0..iterations {
        let (tries, outcome) = run_single_track(params, rng);
        builder.push(tries, outcome == AttemptOutcome::Guaranteed);
    }
    builder.finish()
}

/// One row of a dual-track trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    /// Zero-based turn index.
    pub turn_index: u32,
    pub track: Track,
    pub grade: Grade,
    pub ancestor: Option<String>,
    pub reward: f64,
    /// Accumulated reward after this turn.
    pub progress: f64,
}

/// Turns needed to reach `reward_target`, sampling each turn individually.
pub fn run_dual_track<R: RandomSource + ?Sized>(
    resolver: &TurnOutcomeResolver<'_>,
    choices: &TrackChoices,
    reward_target: f64,
    rng: &mut R,
) -> u32 {
    let mut progress = 0.0;
    let mut turns = 0_u32;
    while progress < reward_target {
        if turns >= MAX_TURNS_PER_RUN {
            warn!(
                "stage {}: run stopped after {MAX_TURNS_PER_RUN} turns at progress {progress}",
                resolver.stage()
            );
            break;
        }
        progress += resolver.sample_turn(choices, rng).reward;
        turns += 1;
    }
    turns
}

/// [`run_dual_track`] keeping every turn for visualization.
pub fn trace_dual_track<R: RandomSource + ?Sized>(
    resolver: &TurnOutcomeResolver<'_>,
    choices: &TrackChoices,
    reward_target: f64,
    rng: &mut R,
) -> Vec<TurnRecord> {
    let mut progress = 0.0;
    let mut records = Vec::new();
    let mut turn_index = 0_u32;
    while progress < reward_target && turn_index < MAX_TURNS_PER_RUN {
        let sample = resolver.sample_turn(choices, rng);
        progress += sample.reward;
        trace!(
            "turn {turn_index}: {:?} {:?} {:?} +{} -> {progress}",
            sample.track,
            sample.grade,
            sample.ancestor,
            sample.reward
        );
        records.push(TurnRecord {
            turn_index,
            track: sample.track,
            grade: sample.grade,
            ancestor: sample.ancestor,
            reward: sample.reward,
            progress,
        });
        turn_index += 1;
    }
    records
}

/// Mean turns to clear `stage` over `iterations` independent runs.
///
/// # Errors
///
/// Returns a config error for unknown stages or a missing enhanced table, a
/// division error when the per-turn expectation is not positive (the loop
/// would never finish), and [`InputError::ZeroIterations`] for zero runs.
pub fn simulate_turns<R: RandomSource + ?Sized>(
    model: &AdvancedModel,
    stage: u32,
    enhanced: bool,
    choices: &TrackChoices,
    iterations: usize,
    rng: &mut R,
) -> Result<SimulationSummary, EngineError> {
    if iterations == 0 {
        return Err(InputError::ZeroIterations.into());
    }
    let resolver = TurnOutcomeResolver::new(model, stage, enhanced)?;
    let reward_target = model.reward_target(stage)?;
    let per_turn = expected_reward_per_turn(resolver.expected_rewards(choices), model.turn_rates());
    turns_for_target(per_turn, reward_target)?;

    let mut builder = SummaryBuilder::new(CountKind::Turns, iterations);
    for _ in 0..iterations {
        builder.push(run_dual_track(&resolver, choices, reward_target, rng), false);
    }
    let summary = builder.finish()?;
    debug!(
        "stage {stage} (enhanced {enhanced}): {} runs, mean turns {:.4}",
        summary.iterations, summary.mean
    );
    Ok(summary)
}
