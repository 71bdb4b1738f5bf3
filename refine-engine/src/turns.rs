//! Dual-track turn resolution: ordinary and bonus turn rewards.
use serde::{Deserialize, Serialize};

use crate::ancestors::{AdvancedModel, AncestorTable};
use crate::error::ConfigError;
use crate::grades::Grade;
use crate::modifiers::ModifierChoice;
use crate::rng::RandomSource;

/// Modifier selections for each track; the two are chosen independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrackChoices {
    #[serde(default)]
    pub ordinary: ModifierChoice,
    #[serde(default)]
    pub bonus: ModifierChoice,
}

impl TrackChoices {
    #[must_use]
    pub const fn new(ordinary: ModifierChoice, bonus: ModifierChoice) -> Self {
        Self { ordinary, bonus }
    }

    /// Same selection on both tracks.
    #[must_use]
    pub const fn uniform(choice: ModifierChoice) -> Self {
        Self {
            ordinary: choice,
            bonus: choice,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Track {
    Ordinary,
    Bonus,
}

/// Expected reward of one turn on each track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TurnRewards {
    pub ordinary: f64,
    pub bonus: f64,
}

/// One sampled turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnSample {
    pub track: Track,
    pub grade: Grade,
    /// Ancestor that resolved a bonus turn.
    pub ancestor: Option<String>,
    pub reward: f64,
}

/// Resolves turn rewards for one stage and ancestor table variant.
#[derive(Debug, Clone, Copy)]
pub struct TurnOutcomeResolver<'a> {
    model: &'a AdvancedModel,
    table: &'a AncestorTable,
    stage: u32,
}

impl<'a> TurnOutcomeResolver<'a> {
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownStage`] for stages outside the tables and
    /// [`ConfigError::EnhancedUnavailable`] when the enhanced variant is missing.
    pub fn new(model: &'a AdvancedModel, stage: u32, enhanced: bool) -> Result<Self, ConfigError> {
        let table = model.ancestor_table(stage, enhanced)?;
        Ok(Self {
            model,
            table,
            stage,
        })
    }

    #[must_use]
    pub const fn stage(&self) -> u32 {
        self.stage
    }

    #[must_use]
    pub const fn table(&self) -> &'a AncestorTable {
        self.table
    }

    #[must_use]
    pub fn ordinary_expected_reward(&self, choice: &ModifierChoice) -> f64 {
        self.model.grades().expected_reward(choice.combo())
    }

    /// Base reward for the bonus track's own modifiers, transformed by every
    /// ancestor and weighted.
    #[must_use]
    pub fn bonus_expected_reward(&self, choice: &ModifierChoice) -> f64 {
        let base = self.model.grades().expected_reward(choice.combo());
        self.table.expected_reward(base)
    }

    #[must_use]
    pub fn expected_rewards(&self, choices: &TrackChoices) -> TurnRewards {
        TurnRewards {
            ordinary: self.ordinary_expected_reward(&choices.ordinary),
            bonus: self.bonus_expected_reward(&choices.bonus),
        }
    }

    /// Sample one turn: track first, then grade, then (bonus only) ancestor.
    pub fn sample_turn<R: RandomSource + ?Sized>(
        &self,
        choices: &TrackChoices,
        rng: &mut R,
    ) -> TurnSample {
        let grades = self.model.grades();
        if rng.next_unit() < self.model.turn_rates().bonus {
            let grade = grades.sample(choices.bonus.combo(), rng);
            let ancestor = self.table.sample(rng);
            TurnSample {
                track: Track::Bonus,
                grade,
                ancestor: Some(ancestor.id.clone()),
                reward: ancestor.effect.apply(grades.reward(grade)),
            }
        } else {
            let grade = grades.sample(choices.ordinary.combo(), rng);
            TurnSample {
                track: Track::Ordinary,
                grade,
                ancestor: None,
                reward: grades.reward(grade),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::ScriptedDraws;

    fn model() -> AdvancedModel {
        AdvancedModel::embedded().unwrap()
    }

    #[test]
    fn ordinary_reward_follows_grade_table() {
        let model = model();
        let resolver = TurnOutcomeResolver::new(&model, 1, false).unwrap();
        assert!((resolver.ordinary_expected_reward(&ModifierChoice::NONE) - 13.0).abs() < 1e-9);
        let both = ModifierChoice::new(true, 0, true);
        assert!((resolver.ordinary_expected_reward(&both) - 28.0).abs() < 1e-9);
    }

    #[test]
    fn early_bonus_reward_weights_each_ancestor_transform() {
        let model = model();
        let resolver = TurnOutcomeResolver::new(&model, 1, false).unwrap();
        // 0.15*65 + 0.35*39 + 0.15*43 + 0.35*23
        let expected = 37.9;
        assert!((resolver.bonus_expected_reward(&ModifierChoice::NONE) - expected).abs() < 1e-9);
    }

    #[test]
    fn later_band_mixes_multiply_add_and_instant_entities() {
        let model = model();
        let resolver = TurnOutcomeResolver::new(&model, 2, false).unwrap();
        // base 13: 8.125 + 9.75 + 5.375 + 5.75 + 1.625 + 12.5
        let none = resolver.bonus_expected_reward(&ModifierChoice::NONE);
        assert!((none - 43.125).abs() < 1e-9);
        // base 28: the instant share stays at 12.5
        let both = resolver.bonus_expected_reward(&ModifierChoice::new(true, 0, true));
        assert!((both - 71.25).abs() < 1e-9);
    }

    #[test]
    fn tracks_use_their_own_modifiers() {
        let model = model();
        let resolver = TurnOutcomeResolver::new(&model, 1, false).unwrap();
        let choices = TrackChoices::new(ModifierChoice::new(true, 0, true), ModifierChoice::NONE);
        let rewards = resolver.expected_rewards(&choices);
        assert!((rewards.ordinary - 28.0).abs() < 1e-9);
        assert!((rewards.bonus - 37.9).abs() < 1e-9);
    }

    #[test]
    fn enhanced_table_raises_bonus_reward() {
        let model = model();
        let standard = TurnOutcomeResolver::new(&model, 2, false).unwrap();
        let enhanced = TurnOutcomeResolver::new(&model, 2, true).unwrap();
        assert!(
            enhanced.bonus_expected_reward(&ModifierChoice::NONE)
                > standard.bonus_expected_reward(&ModifierChoice::NONE)
        );
        assert!(TurnOutcomeResolver::new(&model, 9, false).is_err());
    }

    #[test]
    fn sampled_turns_pick_track_grade_and_ancestor() {
        let model = model();
        let resolver = TurnOutcomeResolver::new(&model, 1, false).unwrap();
        let choices = TrackChoices::default();
        // bonus turn: track 0.1 < 0.15625, grade 0.9 -> great, ancestor 0.05 -> galatur
        // ordinary turn: track 0.5, grade 0.99 -> super
        let mut draws = ScriptedDraws::new(vec![0.1, 0.9, 0.05, 0.5, 0.99]);
        let bonus = resolver.sample_turn(&choices, &mut draws);
        assert_eq!(bonus.track, Track::Bonus);
        assert_eq!(bonus.grade, Grade::Great);
        assert_eq!(bonus.ancestor.as_deref(), Some("galatur"));
        assert!((bonus.reward - 100.0).abs() < 1e-9);

        let ordinary = resolver.sample_turn(&choices, &mut draws);
        assert_eq!(ordinary.track, Track::Ordinary);
        assert_eq!(ordinary.grade, Grade::Super);
        assert!(ordinary.ancestor.is_none());
        assert!((ordinary.reward - 40.0).abs() < 1e-9);
    }
}
