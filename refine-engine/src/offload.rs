//! Running long simulations without blocking an async caller.
//!
//! Available with the `async` feature.
use std::sync::Arc;

use thiserror::Error;

use crate::ancestors::AdvancedModel;
use crate::attempt::{AttemptOutcome, AttemptParams};
use crate::constants::MAX_TRIES_PER_RUN;
use crate::error::{EngineError, InputError};
use crate::mechanic::{Evaluation, EvaluationMode, Mechanic, evaluate};
use crate::model::ProbabilityModel;
use crate::rng::{RandomSource, seeded_stream};
use crate::simulation::{CountKind, SimulationSummary, SummaryBuilder, run_single_track};

#[derive(Debug, Error)]
pub enum OffloadError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("background simulation worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Evaluate on tokio's blocking pool with a stream derived from `seed`.
///
/// # Errors
///
/// Returns [`OffloadError::Engine`] for evaluation errors and
/// [`OffloadError::Worker`] if the worker panicked or was cancelled.
pub async fn evaluate_in_background(
    basic: Arc<ProbabilityModel>,
    advanced: Arc<AdvancedModel>,
    mechanic: Mechanic,
    mode: EvaluationMode,
    seed: u64,
) -> Result<Evaluation, OffloadError> {
    let evaluation = tokio::task::spawn_blocking(move || {
        let mut rng = seeded_stream(seed, mechanic.stream_tag().as_bytes());
        evaluate(&basic, &advanced, &mechanic, mode, &mut rng)
    })
    .await??;
    Ok(evaluation)
}

/// Single-track Monte Carlo in chunks of `chunk_size`, yielding to the
/// scheduler between chunks.
///
/// # Errors
///
/// Returns [`InputError::ZeroIterations`] when `iterations` is zero and
/// [`InputError::UnboundedAttempts`] when the parameters never reach the
/// energy guarantee.
pub async fn simulate_cooperatively<R: RandomSource + ?Sized>(
    params: &AttemptParams,
    iterations: usize,
    chunk_size: usize,
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
    let chunk_size = chunk_size.max(1);
    let mut builder = SummaryBuilder::new(CountKind::FailedAttempts, iterations);
    while builder.len() < iterations {
        let remaining = iterations - builder.len();
        for _ in 0..remaining.min(chunk_size) {
            let (tries, outcome) = run_single_track(params, rng);
            builder.push(tries, outcome == AttemptOutcome::Guaranteed);
        }
        tokio::task::yield_now().await;
    }
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modifiers::ModifierChoice;
    use crate::simulation::simulate_params;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    #[test]
    fn background_evaluation_matches_inline_run() {
        let basic = Arc::new(ProbabilityModel::embedded().unwrap());
        let advanced = Arc::new(AdvancedModel::embedded().unwrap());
        let mechanic = Mechanic::single(15, ModifierChoice::NONE);
        let mode = EvaluationMode::Both { iterations: 300 };

        let background = tokio_test::block_on(evaluate_in_background(
            Arc::clone(&basic),
            Arc::clone(&advanced),
            mechanic,
            mode,
            99,
        ))
        .unwrap();

        let mut rng = seeded_stream(99, mechanic.stream_tag().as_bytes());
        let inline = evaluate(&basic, &advanced, &mechanic, mode, &mut rng).unwrap();
        assert_eq!(background, inline);
    }

    #[test]
    fn chunked_run_equals_single_pass() {
        let model = ProbabilityModel::embedded().unwrap();
        let params = AttemptParams::resolve(&model, 12, &ModifierChoice::NONE).unwrap();
        let chunked = tokio_test::block_on(simulate_cooperatively(
            &params,
            1_000,
            64,
            &mut SmallRng::seed_from_u64(4),
        ))
        .unwrap();
        let single = simulate_params(&params, 1_000, &mut SmallRng::seed_from_u64(4)).unwrap();
        assert_eq!(chunked, single);
    }

    #[test]
    fn errors_surface_through_the_worker() {
        let basic = Arc::new(ProbabilityModel::embedded().unwrap());
        let advanced = Arc::new(AdvancedModel::embedded().unwrap());
        let result = tokio_test::block_on(evaluate_in_background(
            basic,
            advanced,
            Mechanic::single(99, ModifierChoice::NONE),
            EvaluationMode::ClosedForm,
            1,
        ));
        assert!(matches!(result, Err(OffloadError::Engine(EngineError::Config(_)))));
    }
}
