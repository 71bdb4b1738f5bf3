//! Refine Engine
//!
//! Platform-agnostic probability core for progressive item refining: the
//! single-track attempt mechanic with escalation and mastery energy, and the
//! dual-track turn mechanic with graded rewards and ancestor outcomes.
//! The engine emits counts and probabilities only.

pub mod ancestors;
pub mod attempt;
pub mod constants;
pub mod consumption;
pub mod error;
pub mod expected;
pub mod grades;
pub mod mechanic;
pub mod model;
pub mod modifiers;
pub mod numbers;
#[cfg(feature = "async")]
pub mod offload;
pub mod rng;
pub mod simulation;
pub mod turns;

// Re-export commonly used types
pub use ancestors::{
    AdvancedModel, AdvancedModelData, AncestorEffect, AncestorOutcome, AncestorOverlay,
    AncestorTable, StageBand, StageConfig, TurnRateConfig,
};
pub use attempt::{
    AttemptOutcome, AttemptParams, AttemptPhase, AttemptRecord, AttemptState, Transition,
    transition,
};
pub use consumption::ConsumptionEstimate;
pub use error::{ConfigError, DivisionError, EngineError, InputError};
pub use expected::{DualTrackExpectation, SingleTrackExpectation, expected_tries, expected_turns};
pub use grades::{Grade, GradeDistribution, GradeRewards, SuccessGradeTable};
pub use mechanic::{Evaluation, EvaluationMode, Mechanic, evaluate};
pub use model::{ProbabilityModel, ProbabilityModelData, ReferenceAverages, TierConfig};
pub use modifiers::{ModifierBreakdown, ModifierChoice, ModifierCombo};
pub use rng::{CountingRng, RandomSource, ScriptedDraws, SimulationRng, seeded_stream};
pub use simulation::{CountKind, SimulationSummary, TurnRecord};
pub use turns::{Track, TrackChoices, TurnOutcomeResolver, TurnRewards};

/// Trait for abstracting where model tables come from.
/// Platform-specific implementations should provide this
pub trait DataLoader {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the single-track probability tables.
    ///
    /// # Errors
    ///
    /// Returns an error if the tables cannot be read, parsed, or validated.
    fn load_probability_model(&self) -> Result<ProbabilityModel, Self::Error>;

    /// Load the dual-track stage, grade, and ancestor tables.
    ///
    /// # Errors
    ///
    /// Returns an error if the tables cannot be read, parsed, or validated.
    fn load_advanced_model(&self) -> Result<AdvancedModel, Self::Error>;
}

/// Loader serving the tables compiled into the crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedData;

impl DataLoader for EmbeddedData {
    type Error = ConfigError;

    fn load_probability_model(&self) -> Result<ProbabilityModel, Self::Error> {
        ProbabilityModel::embedded()
    }

    fn load_advanced_model(&self) -> Result<AdvancedModel, Self::Error> {
        AdvancedModel::embedded()
    }
}

/// Engine facade owning both validated models.
pub struct RefineEngine<L: DataLoader> {
    data_loader: L,
    basic: ProbabilityModel,
    advanced: AdvancedModel,
}

impl RefineEngine<EmbeddedData> {
    /// Engine over the embedded tables.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedded tables fail validation.
    pub fn embedded() -> Result<Self, ConfigError> {
        Self::new(EmbeddedData)
    }
}

impl<L: DataLoader> RefineEngine<L> {
    /// Load and validate both models through `data_loader`.
    ///
    /// # Errors
    ///
    /// Returns the loader's error if either model cannot be loaded.
    pub fn new(data_loader: L) -> Result<Self, L::Error> {
        let basic = data_loader.load_probability_model()?;
        let advanced = data_loader.load_advanced_model()?;
        Ok(Self {
            data_loader,
            basic,
            advanced,
        })
    }

    /// Re-read both models; the current ones stay in place on failure.
    ///
    /// # Errors
    ///
    /// Returns the loader's error if either model cannot be loaded.
    pub fn reload(&mut self) -> Result<(), L::Error> {
        let basic = self.data_loader.load_probability_model()?;
        let advanced = self.data_loader.load_advanced_model()?;
        self.basic = basic;
        self.advanced = advanced;
        Ok(())
    }

    pub const fn probability_model(&self) -> &ProbabilityModel {
        &self.basic
    }

    pub const fn advanced_model(&self) -> &AdvancedModel {
        &self.advanced
    }

    /// Evaluate with a random stream derived from `seed` and the mechanic.
    ///
    /// # Errors
    ///
    /// See [`mechanic::evaluate`].
    pub fn evaluate(
        &self,
        mechanic: &Mechanic,
        mode: EvaluationMode,
        seed: u64,
    ) -> Result<Evaluation, EngineError> {
        let mut rng = seeded_stream(seed, mechanic.stream_tag().as_bytes());
        self.evaluate_with(mechanic, mode, &mut rng)
    }

    /// Evaluate drawing from a caller-supplied source.
    ///
    /// # Errors
    ///
    /// See [`mechanic::evaluate`].
    pub fn evaluate_with<R: RandomSource + ?Sized>(
        &self,
        mechanic: &Mechanic,
        mode: EvaluationMode,
        rng: &mut R,
    ) -> Result<Evaluation, EngineError> {
        evaluate(&self.basic, &self.advanced, mechanic, mode, rng)
    }

    /// One seeded single-track sequence for animated display.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownLevel`] when the level is not tabulated.
    pub fn trace_attempts(
        &self,
        level: u32,
        choice: &ModifierChoice,
        seed: u64,
    ) -> Result<Vec<AttemptRecord>, ConfigError> {
        let params = AttemptParams::resolve(&self.basic, level, choice)?;
        let tag = Mechanic::single(level, *choice).stream_tag();
        let mut rng = seeded_stream(seed, format!("trace:{tag}").as_bytes());
        Ok(simulation::simulate_with_trace(&params, &mut rng))
    }

    /// One seeded dual-track run for animated display.
    ///
    /// # Errors
    ///
    /// Returns a config error for unknown stages or a missing enhanced table.
    pub fn trace_turns(
        &self,
        stage: u32,
        enhanced: bool,
        choices: &TrackChoices,
        seed: u64,
    ) -> Result<Vec<TurnRecord>, EngineError> {
        let resolver = TurnOutcomeResolver::new(&self.advanced, stage, enhanced)?;
        let target = self.advanced.reward_target(stage)?;
        let rewards = resolver.expected_rewards(choices);
        expected::turns_for_target(
            expected::expected_reward_per_turn(rewards, self.advanced.turn_rates()),
            target,
        )?;
        let tag = Mechanic::dual(stage, enhanced, *choices).stream_tag();
        let mut rng = seeded_stream(seed, format!("trace:{tag}").as_bytes());
        Ok(simulation::trace_dual_track(&resolver, choices, target, &mut rng))
    }

    /// Expected consumables for an evaluation, from its best expectation.
    ///
    /// Returns `Ok(None)` when the evaluation carries no expectation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownLevel`] when the level is not tabulated.
    pub fn consumption(
        &self,
        evaluation: &Evaluation,
    ) -> Result<Option<ConsumptionEstimate>, ConfigError> {
        let Some(expected) = evaluation.expected() else {
            return Ok(None);
        };
        match evaluation.mechanic {
            Mechanic::SingleTrack { level, choice } => {
                consumption::single_track(&self.basic, level, &choice, expected + 1.0).map(Some)
            }
            Mechanic::DualTrack { choices, .. } => Ok(Some(consumption::dual_track(
                self.advanced.turn_rates(),
                &choices,
                expected,
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenAdvanced;

    impl DataLoader for BrokenAdvanced {
        type Error = ConfigError;

        fn load_probability_model(&self) -> Result<ProbabilityModel, Self::Error> {
            ProbabilityModel::embedded()
        }

        fn load_advanced_model(&self) -> Result<AdvancedModel, Self::Error> {
            AdvancedModel::from_json_str("{\"version\": 1")
        }
    }

    #[test]
    fn embedded_engine_evaluates_both_mechanics() {
        let engine = RefineEngine::embedded().unwrap();
        let single = engine
            .evaluate(
                &Mechanic::single(25, ModifierChoice::NONE),
                EvaluationMode::ClosedForm,
                1337,
            )
            .unwrap();
        assert!((single.closed_form.unwrap() - 90.3209).abs() < 1e-3);

        let dual = engine
            .evaluate(
                &Mechanic::dual(1, false, TrackChoices::default()),
                EvaluationMode::MonteCarlo { iterations: 200 },
                1337,
            )
            .unwrap();
        assert!(dual.closed_form.is_none());
        assert_eq!(dual.simulated.unwrap().kind, CountKind::Turns);
    }

    #[test]
    fn seeded_evaluations_and_traces_repeat() {
        let engine = RefineEngine::embedded().unwrap();
        let mechanic = Mechanic::single(18, ModifierChoice::NONE);
        let mode = EvaluationMode::MonteCarlo { iterations: 250 };
        assert_eq!(
            engine.evaluate(&mechanic, mode, 5).unwrap(),
            engine.evaluate(&mechanic, mode, 5).unwrap()
        );
        assert_eq!(
            engine.trace_attempts(18, &ModifierChoice::NONE, 5).unwrap(),
            engine.trace_attempts(18, &ModifierChoice::NONE, 5).unwrap()
        );
        let turns = engine
            .trace_turns(2, true, &TrackChoices::default(), 5)
            .unwrap();
        assert!(turns.last().unwrap().progress >= 1000.0);
    }

    #[test]
    fn loader_errors_propagate() {
        assert!(matches!(
            RefineEngine::new(BrokenAdvanced),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn consumption_follows_evaluation_mechanic() {
        let engine = RefineEngine::embedded().unwrap();
        let evaluation = engine
            .evaluate(
                &Mechanic::single(11, ModifierChoice::new(true, 20, false)),
                EvaluationMode::ClosedForm,
                0,
            )
            .unwrap();
        let estimate = engine.consumption(&evaluation).unwrap().unwrap();
        let attempts = evaluation.closed_form.unwrap() + 1.0;
        assert!((estimate.attempts - attempts).abs() < 1e-12);
        assert!((estimate.catalyst_stacks - attempts * 20.0).abs() < 1e-9);
        assert!(estimate.bonus_items.abs() < f64::EPSILON);
    }
}
