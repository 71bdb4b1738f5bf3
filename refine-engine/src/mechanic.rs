//! Variant selection: the single-track and dual-track mechanics share the
//! modifier and grade primitives but are evaluated by different machinery.
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ancestors::AdvancedModel;
use crate::error::{EngineError, InputError};
use crate::expected::{expected_tries, expected_turns};
use crate::model::ProbabilityModel;
use crate::modifiers::ModifierChoice;
use crate::rng::RandomSource;
use crate::simulation::{SimulationSummary, simulate, simulate_turns};
use crate::turns::TrackChoices;

/// Which mechanic to evaluate and with which inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mechanic {
    /// Basic mechanic: attempts at one level until success.
    SingleTrack { level: u32, choice: ModifierChoice },
    /// Advanced mechanic: turns in one stage until the reward target is met.
    DualTrack {
        stage: u32,
        #[serde(default)]
        enhanced: bool,
        #[serde(default)]
        choices: TrackChoices,
    },
}

impl Mechanic {
    #[must_use]
    pub const fn single(level: u32, choice: ModifierChoice) -> Self {
        Self::SingleTrack { level, choice }
    }

    #[must_use]
    pub const fn dual(stage: u32, enhanced: bool, choices: TrackChoices) -> Self {
        Self::DualTrack {
            stage,
            enhanced,
            choices,
        }
    }

    /// Domain tag used to derive an independent random stream per mechanic.
    #[must_use]
    pub fn stream_tag(&self) -> String {
        match self {
            Self::SingleTrack { level, choice } => format!(
                "basic:{level}:{}:{}",
                choice.combo().label(),
                choice.catalyst_stacks
            ),
            Self::DualTrack {
                stage,
                enhanced,
                choices,
            } => format!(
                "advanced:{stage}:{}:{}:{}",
                if *enhanced { "enhanced" } else { "standard" },
                choices.ordinary.combo().label(),
                choices.bonus.combo().label()
            ),
        }
    }
}

impl fmt::Display for Mechanic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SingleTrack { level, choice } => {
                write!(f, "level {level} [{}]", choice.combo())
            }
            Self::DualTrack {
                stage,
                enhanced,
                choices,
            } => {
                write!(
                    f,
                    "stage {stage}{} [ordinary {}, bonus {}]",
                    if *enhanced { " enhanced" } else { "" },
                    choices.ordinary.combo(),
                    choices.bonus.combo()
                )
            }
        }
    }
}

/// How an evaluation should be computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum EvaluationMode {
    ClosedForm,
    MonteCarlo { iterations: usize },
    Both { iterations: usize },
}

impl EvaluationMode {
    #[must_use]
    pub const fn iterations(self) -> Option<usize> {
        match self {
            Self::ClosedForm => None,
            Self::MonteCarlo { iterations } | Self::Both { iterations } => Some(iterations),
        }
    }

    #[must_use]
    pub const fn wants_closed_form(self) -> bool {
        matches!(self, Self::ClosedForm | Self::Both { .. })
    }
}

/// Result of evaluating one mechanic.
///
/// `closed_form` and `simulated` measure the same quantity: failed attempts
/// for the single-track mechanic, turns for the dual-track mechanic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub mechanic: Mechanic,
    pub closed_form: Option<f64>,
    pub simulated: Option<SimulationSummary>,
    /// `(simulated mean - closed form) / closed form` when both were computed.
    pub relative_deviation: Option<f64>,
}

impl Evaluation {
    /// Best available expectation, preferring the exact value.
    #[must_use]
    pub fn expected(&self) -> Option<f64> {
        self.closed_form
            .or_else(|| self.simulated.as_ref().map(|summary| summary.mean))
    }
}

/// Evaluate `mechanic` under `mode`, drawing any randomness from `rng`.
///
/// # Errors
///
/// Returns an [`EngineError`] for unknown levels or stages, zero iterations,
/// or a degenerate dual-track configuration.
pub fn evaluate<R: RandomSource + ?Sized>(
    basic: &ProbabilityModel,
    advanced: &AdvancedModel,
    mechanic: &Mechanic,
    mode: EvaluationMode,
    rng: &mut R,
) -> Result<Evaluation, EngineError> {
    if mode.iterations() == Some(0) {
        return Err(InputError::ZeroIterations.into());
    }

    let closed_form = if mode.wants_closed_form() {
        Some(match *mechanic {
            Mechanic::SingleTrack { level, choice } => {
                expected_tries(basic, level, &choice)?.expected_tries
            }
            Mechanic::DualTrack {
                stage,
                enhanced,
                choices,
            } => expected_turns(advanced, stage, enhanced, &choices)?.expected_turns,
        })
    } else {
        None
    };

    let simulated = match mode.iterations() {
        Some(iterations) => Some(match *mechanic {
            Mechanic::SingleTrack { level, choice } => {
                simulate(basic, level, &choice, iterations, rng)?
            }
            Mechanic::DualTrack {
                stage,
                enhanced,
                choices,
            } => simulate_turns(advanced, stage, enhanced, &choices, iterations, rng)?,
        }),
        None => None,
    };

    let relative_deviation = match (closed_form, simulated.as_ref()) {
        (Some(exact), Some(summary)) => Some(summary.relative_deviation(exact)),
        _ => None,
    };
    if let Some(deviation) = relative_deviation {
        debug!("{mechanic}: simulated mean deviates {:+.3}% from closed form", deviation * 100.0);
    }

    Ok(Evaluation {
        mechanic: *mechanic,
        closed_form,
        simulated,
        relative_deviation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::modifiers::ModifierCombo;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn models() -> (ProbabilityModel, AdvancedModel) {
        (
            ProbabilityModel::embedded().unwrap(),
            AdvancedModel::embedded().unwrap(),
        )
    }

    #[test]
    fn closed_form_mode_consumes_no_randomness() {
        let (basic, advanced) = models();
        let mut rng = crate::rng::seeded_stream(7, b"closed");
        let evaluation = evaluate(
            &basic,
            &advanced,
            &Mechanic::single(11, ModifierChoice::NONE),
            EvaluationMode::ClosedForm,
            &mut rng,
        )
        .unwrap();
        assert_eq!(rng.draws(), 0);
        assert!(evaluation.simulated.is_none());
        assert!((evaluation.expected().unwrap() - 5.638).abs() < 1e-3);
    }

    #[test]
    fn both_mode_reports_deviation() {
        let (basic, advanced) = models();
        let choice = ModifierChoice::saturated(&basic, 13, ModifierCombo::Both).unwrap();
        let evaluation = evaluate(
            &basic,
            &advanced,
            &Mechanic::single(13, choice),
            EvaluationMode::Both { iterations: 5_000 },
            &mut SmallRng::seed_from_u64(21),
        )
        .unwrap();
        let deviation = evaluation.relative_deviation.unwrap();
        assert!(deviation.abs() < 0.05, "deviation {deviation}");
        assert_eq!(evaluation.simulated.unwrap().iterations, 5_000);
    }

    #[test]
    fn dual_track_closed_form_matches_calculator() {
        let (basic, advanced) = models();
        let evaluation = evaluate(
            &basic,
            &advanced,
            &Mechanic::dual(1, false, TrackChoices::default()),
            EvaluationMode::ClosedForm,
            &mut SmallRng::seed_from_u64(0),
        )
        .unwrap();
        assert!((evaluation.closed_form.unwrap() - 1000.0 / 16.890_625).abs() < 1e-9);
    }

    #[test]
    fn invalid_requests_are_reported() {
        let (basic, advanced) = models();
        let mut rng = SmallRng::seed_from_u64(0);
        assert_eq!(
            evaluate(
                &basic,
                &advanced,
                &Mechanic::single(11, ModifierChoice::NONE),
                EvaluationMode::MonteCarlo { iterations: 0 },
                &mut rng,
            ),
            Err(EngineError::Input(InputError::ZeroIterations))
        );
        assert_eq!(
            evaluate(
                &basic,
                &advanced,
                &Mechanic::dual(3, false, TrackChoices::default()),
                EvaluationMode::ClosedForm,
                &mut rng,
            ),
            Err(EngineError::Config(ConfigError::UnknownStage { stage: 3 }))
        );
    }

    #[test]
    fn stream_tags_separate_inputs() {
        let none = Mechanic::single(11, ModifierChoice::NONE).stream_tag();
        let both = Mechanic::single(11, ModifierChoice::new(true, 20, true)).stream_tag();
        assert_ne!(none, both);
        assert_eq!(none, "basic:11:none:0");
        let dual = Mechanic::dual(2, true, TrackChoices::default()).to_string();
        assert_eq!(dual, "stage 2 enhanced [ordinary none, bonus none]");
    }
}
