//! Single-track attempt state machine.
//!
//! Each call to [`transition`] consumes the current [`AttemptState`] and one
//! uniform draw and hands back the next state. Nothing is held between calls,
//! so concurrent runs never share counters.
use serde::{Deserialize, Serialize};

use crate::constants::{ENERGY_GUARANTEE_THRESHOLD, MAX_TRIES_PER_RUN};
use crate::error::ConfigError;
use crate::model::ProbabilityModel;
use crate::modifiers::{ModifierChoice, resolve};
use crate::numbers::clamp_probability;

/// Fixed inputs for every attempt at one level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttemptParams {
    pub base_probability: f64,
    pub modifier_bonus: f64,
    pub energy_divisor: f64,
    pub escalation_step: f64,
    pub escalation_cap: f64,
}

impl AttemptParams {
    /// Resolve the tier base and modifier bonus for `level` from the model.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownLevel`] when the level is not tabulated.
    pub fn resolve(
        model: &ProbabilityModel,
        level: u32,
        choice: &ModifierChoice,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            base_probability: model.base_probability(level)?,
            modifier_bonus: resolve(model, level, choice)?,
            energy_divisor: model.energy_divisor(),
            escalation_step: model.escalation_step(),
            escalation_cap: model.escalation_cap(),
        })
    }

    /// Highest value the escalated base may reach.
    #[must_use]
    pub fn base_ceiling(&self) -> f64 {
        self.base_probability * self.escalation_cap
    }

    /// Failures after which success is certain on the deterministic schedule.
    ///
    /// `None` when the schedule runs past [`MAX_TRIES_PER_RUN`], which happens
    /// when each failure adds too little energy to ever reach the guarantee.
    #[must_use]
    pub fn failure_horizon(&self) -> Option<u32> {
        let mut state = AttemptState::new(self);
        while !state.is_guaranteed() {
            let final_probability = state.final_probability(self);
            if final_probability >= 1.0 {
                break;
            }
            if state.try_count >= MAX_TRIES_PER_RUN {
                return None;
            }
            state = state.after_failure(self, final_probability);
        }
        Some(state.try_count)
    }
}

/// Mutable progress of one attempt sequence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttemptState {
    pub current_base_probability: f64,
    pub accumulated_energy: f64,
    /// Failed attempts so far.
    pub try_count: u32,
}

impl AttemptState {
    #[must_use]
    pub const fn new(params: &AttemptParams) -> Self {
        Self {
            current_base_probability: params.base_probability,
            accumulated_energy: 0.0,
            try_count: 0,
        }
    }

    /// Whether the next attempt succeeds regardless of the draw.
    #[must_use]
    pub fn is_guaranteed(&self) -> bool {
        self.accumulated_energy >= ENERGY_GUARANTEE_THRESHOLD
    }

    /// Success chance of the next attempt, excluding the energy guarantee.
    #[must_use]
    pub fn final_probability(&self, params: &AttemptParams) -> f64 {
        clamp_probability(self.current_base_probability + params.modifier_bonus)
    }

    /// State after failing an attempt rolled at `final_probability`.
    ///
    /// Only the base component escalates; modifier bonuses are re-added on
    /// every attempt.
    #[must_use]
    pub fn after_failure(self, params: &AttemptParams, final_probability: f64) -> Self {
        let escalated = (self.current_base_probability
            + params.base_probability * params.escalation_step)
            .min(params.base_ceiling());
        Self {
            current_base_probability: escalated,
            accumulated_energy: self.accumulated_energy + final_probability / params.energy_divisor,
            try_count: self.try_count.saturating_add(1),
        }
    }
}

/// Where an attempt sequence stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptPhase {
    Pending,
    Succeeded,
    FailedContinuing,
}

/// How a single roll resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Failure,
    Success,
    /// Energy reached the threshold, so the draw was ignored.
    Guaranteed,
}

impl AttemptOutcome {
    #[must_use]
    pub const fn is_success(self) -> bool {
        !matches!(self, Self::Failure)
    }
}

/// One row of a per-attempt trace.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// Zero-based index of the attempt within its sequence.
    pub try_index: u32,
    pub final_probability: f64,
    pub energy_before: f64,
    pub outcome: AttemptOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub phase: AttemptPhase,
    pub state: AttemptState,
    pub record: AttemptRecord,
}

/// Advance one attempt with uniform draw `draw` in `[0, 1)`.
#[must_use]
pub fn transition(state: AttemptState, params: &AttemptParams, draw: f64) -> Transition {
    let try_index = state.try_count;
    let energy_before = state.accumulated_energy;

    if state.is_guaranteed() {
        return Transition {
            phase: AttemptPhase::Succeeded,
            state,
            record: AttemptRecord {
                try_index,
                final_probability: 1.0,
                energy_before,
                outcome: AttemptOutcome::Guaranteed,
            },
        };
    }

    let final_probability = state.final_probability(params);
    if draw < final_probability {
        return Transition {
            phase: AttemptPhase::Succeeded,
            state,
            record: AttemptRecord {
                try_index,
                final_probability,
                energy_before,
                outcome: AttemptOutcome::Success,
            },
        };
    }

    Transition {
        phase: AttemptPhase::FailedContinuing,
        state: state.after_failure(params, final_probability),
        record: AttemptRecord {
            try_index,
            final_probability,
            energy_before,
            outcome: AttemptOutcome::Failure,
        },
    }
}
