//! Closed-form expectations for both mechanic variants.
//!
//! Nothing here draws random numbers; identical inputs always give identical
//! answers.
use log::warn;
use serde::{Deserialize, Serialize};

use crate::ancestors::{AdvancedModel, TurnRateConfig};
use crate::attempt::{AttemptParams, AttemptState};
use crate::constants::MAX_TRIES_PER_RUN;
use crate::error::{ConfigError, DivisionError, EngineError};
use crate::model::ProbabilityModel;
use crate::modifiers::ModifierChoice;
use crate::turns::{TrackChoices, TurnOutcomeResolver, TurnRewards};

/// Closed-form result for one dual-track stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DualTrackExpectation {
    pub stage: u32,
    pub enhanced: bool,
    pub rewards: TurnRewards,
    pub turn_rates: TurnRateConfig,
    pub expected_reward_per_turn: f64,
    pub reward_target: f64,
    pub expected_turns: f64,
}

/// `ordinary × ordinaryRate + bonus × bonusRate`.
#[must_use]
pub fn expected_reward_per_turn(rewards: TurnRewards, rates: TurnRateConfig) -> f64 {
    rewards.ordinary * rates.ordinary + rewards.bonus * rates.bonus
}

/// Divide the reward target by the per-turn expectation.
///
/// # Errors
///
/// Returns [`DivisionError::NonPositiveReward`] when the expectation is not
/// strictly positive, instead of yielding infinity or NaN.
pub fn turns_for_target(reward_per_turn: f64, reward_target: f64) -> Result<f64, DivisionError> {
    if reward_per_turn.is_nan() || reward_per_turn <= 0.0 {
        return Err(DivisionError::NonPositiveReward {
            expected_reward_per_turn: reward_per_turn,
        });
    }
    Ok(reward_target / reward_per_turn)
}

/// Expected turns to clear `stage` with the given per-track modifiers.
///
/// # Errors
///
/// Returns a config error for unknown stages or a missing enhanced table, and
/// a division error for a degenerate per-turn expectation.
pub fn expected_turns(
    model: &AdvancedModel,
    stage: u32,
    enhanced: bool,
    choices: &TrackChoices,
) -> Result<DualTrackExpectation, EngineError> {
    let resolver = TurnOutcomeResolver::new(model, stage, enhanced)?;
    let rewards = resolver.expected_rewards(choices);
    let turn_rates = model.turn_rates();
    let reward_target = model.reward_target(stage)?;
    let per_turn = expected_reward_per_turn(rewards, turn_rates);
    let turns = turns_for_target(per_turn, reward_target)?;
    Ok(DualTrackExpectation {
        stage,
        enhanced,
        rewards,
        turn_rates,
        expected_reward_per_turn: per_turn,
        reward_target,
        expected_turns: turns,
    })
}

/// Exact closed-form result for the single-track mechanic at one level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleTrackExpectation {
    pub level: u32,
    pub params: AttemptParams,
    /// Expected failed attempts before success.
    pub expected_tries: f64,
    /// Failed attempts after which success is guaranteed.
    pub max_tries: u32,
    /// Probability that success came from the energy guarantee.
    pub guaranteed_share: f64,
    /// `distribution[k]` is the probability of succeeding after exactly `k` failures.
    pub distribution: Vec<f64>,
}

impl SingleTrackExpectation {
    /// Expected attempts including the successful one.
    #[must_use]
    pub fn expected_attempts(&self) -> f64 {
        self.expected_tries + 1.0
    }
}

/// Exact expectation for `level` under `choice`.
///
/// # Errors
///
/// Returns [`ConfigError::UnknownLevel`] when the level is not tabulated.
pub fn expected_tries(
    model: &ProbabilityModel,
    level: u32,
    choice: &ModifierChoice,
) -> Result<SingleTrackExpectation, ConfigError> {
    let params = AttemptParams::resolve(model, level, choice)?;
    Ok(expected_tries_for(level, params))
}

/// Walk the deterministic escalation schedule, carrying the probability of
/// still being unsuccessful, until the energy guarantee absorbs what remains.
///
/// Schedules longer than [`MAX_TRIES_PER_RUN`] are truncated there, with the
/// remaining mass counted at the bound.
#[must_use]
pub fn expected_tries_for(level: u32, params: AttemptParams) -> SingleTrackExpectation {
    let mut state = AttemptState::new(&params);
    let mut survival = 1.0_f64;
    let mut expected = 0.0_f64;
    let mut guaranteed_share = 0.0_f64;
    let mut distribution = Vec::new();

    loop {
        let tries = f64::from(state.try_count);
        if state.try_count >= MAX_TRIES_PER_RUN {
            warn!("level {level}: closed form truncated after {MAX_TRIES_PER_RUN} failures");
        }
        if state.is_guaranteed() || state.try_count >= MAX_TRIES_PER_RUN {
            expected += survival * tries;
            guaranteed_share = survival;
            distribution.push(survival);
            break;
        }
        let final_probability = state.final_probability(&params);
        let mass = survival * final_probability;
        expected += mass * tries;
        distribution.push(mass);
        survival *= 1.0 - final_probability;
        if survival <= 0.0 {
            break;
        }
        state = state.after_failure(&params, final_probability);
    }

    SingleTrackExpectation {
        level,
        params,
        expected_tries: expected,
        max_tries: state.try_count,
        guaranteed_share,
        distribution,
    }
}
