//! Expected consumable usage. Counts only; pricing belongs to the caller.
use serde::{Deserialize, Serialize};

use crate::ancestors::TurnRateConfig;
use crate::error::ConfigError;
use crate::model::ProbabilityModel;
use crate::modifiers::{ModifierChoice, resolve_breakdown};
use crate::turns::TrackChoices;

/// Expected consumables spent until a mechanic completes.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ConsumptionEstimate {
    /// Attempts (single-track) or turns (dual-track), success included.
    pub attempts: f64,
    pub catalyst_stacks: f64,
    pub bonus_items: f64,
}

/// Single-track usage: every attempt spends the effective catalyst stacks and
/// one bonus item when enabled.
///
/// Stacks beyond the bucket cap are not counted since they change nothing.
///
/// # Errors
///
/// Returns [`ConfigError::UnknownLevel`] when the level is not tabulated.
pub fn single_track(
    model: &ProbabilityModel,
    level: u32,
    choice: &ModifierChoice,
    expected_attempts: f64,
) -> Result<ConsumptionEstimate, ConfigError> {
    let breakdown = resolve_breakdown(model, level, choice)?;
    let bonus_per_attempt = if choice.use_bonus_item && breakdown.bonus_item > 0.0 {
        1.0
    } else {
        0.0
    };
    Ok(ConsumptionEstimate {
        attempts: expected_attempts,
        catalyst_stacks: expected_attempts * f64::from(breakdown.effective_stacks),
        bonus_items: expected_attempts * bonus_per_attempt,
    })
}

/// Dual-track usage: each turn spends one of each consumable enabled on the
/// track it lands on.
#[must_use]
pub fn dual_track(
    rates: TurnRateConfig,
    choices: &TrackChoices,
    expected_turns: f64,
) -> ConsumptionEstimate {
    let share = |ordinary: bool, bonus: bool| {
        f64::from(u8::from(ordinary)) * rates.ordinary + f64::from(u8::from(bonus)) * rates.bonus
    };
    ConsumptionEstimate {
        attempts: expected_turns,
        catalyst_stacks: expected_turns
            * share(choices.ordinary.use_catalyst, choices.bonus.use_catalyst),
        bonus_items: expected_turns
            * share(choices.ordinary.use_bonus_item, choices.bonus.use_bonus_item),
    }
}
