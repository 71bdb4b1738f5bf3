//! Outcome grades and their per-modifier distributions.
use serde::{Deserialize, Serialize};

use crate::constants::WEIGHT_SUM_TOLERANCE;
use crate::error::ConfigError;
use crate::modifiers::ModifierCombo;
use crate::rng::RandomSource;

/// Qualitative result of a dual-track turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grade {
    Success,
    Great,
    Super,
}

impl Grade {
    pub const ALL: [Self; 3] = [Self::Success, Self::Great, Self::Super];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Great => "great",
            Self::Super => "super",
        }
    }
}

/// Reward magnitude per grade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradeRewards {
    pub success: f64,
    pub great: f64,
    #[serde(rename = "super")]
    pub super_success: f64,
}

impl GradeRewards {
    #[must_use]
    pub const fn get(&self, grade: Grade) -> f64 {
        match grade {
            Grade::Success => self.success,
            Grade::Great => self.great,
            Grade::Super => self.super_success,
        }
    }
}

/// Probability of each grade under one modifier combination.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradeDistribution {
    pub success: f64,
    pub great: f64,
    #[serde(rename = "super")]
    pub super_success: f64,
}

impl GradeDistribution {
    #[must_use]
    pub const fn get(&self, grade: Grade) -> f64 {
        match grade {
            Grade::Success => self.success,
            Grade::Great => self.great,
            Grade::Super => self.super_success,
        }
    }

    #[must_use]
    pub fn sum(&self) -> f64 {
        self.success + self.great + self.super_success
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradeDistributions {
    pub none: GradeDistribution,
    pub catalyst: GradeDistribution,
    pub bonus_item: GradeDistribution,
    pub both: GradeDistribution,
}

impl GradeDistributions {
    #[must_use]
    pub const fn get(&self, combo: ModifierCombo) -> &GradeDistribution {
        match combo {
            ModifierCombo::None => &self.none,
            ModifierCombo::Catalyst => &self.catalyst,
            ModifierCombo::BonusItem => &self.bonus_item,
            ModifierCombo::Both => &self.both,
        }
    }
}

/// Grade rewards plus the distribution used by each modifier combination.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SuccessGradeTable {
    pub rewards: GradeRewards,
    pub distributions: GradeDistributions,
}

impl SuccessGradeTable {
    /// # Errors
    ///
    /// Returns an error when a reward is negative or non-finite, or when a
    /// distribution does not sum to one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for grade in Grade::ALL {
            let reward = self.rewards.get(grade);
            if !reward.is_finite() || reward < 0.0 {
                return Err(ConfigError::RangeViolation {
                    field: "grades.rewards",
                    min: 0.0,
                    max: f64::MAX,
                    value: reward,
                });
            }
        }
        for combo in ModifierCombo::ALL {
            let distribution = self.distributions.get(combo);
            for grade in Grade::ALL {
                let p = distribution.get(grade);
                if !(0.0..=1.0).contains(&p) {
                    return Err(ConfigError::RangeViolation {
                        field: "grades.distributions",
                        min: 0.0,
                        max: 1.0,
                        value: p,
                    });
                }
            }
            let sum = distribution.sum();
            if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
                return Err(ConfigError::WeightSum {
                    table: format!("grades.{}", combo.label()),
                    sum,
                });
            }
        }
        Ok(())
    }

    #[must_use]
    pub const fn reward(&self, grade: Grade) -> f64 {
        self.rewards.get(grade)
    }

    /// Probability-weighted reward of one turn under `combo`.
    #[must_use]
    pub fn expected_reward(&self, combo: ModifierCombo) -> f64 {
        let distribution = self.distributions.get(combo);
        Grade::ALL
            .iter()
            .map(|&grade| self.rewards.get(grade) * distribution.get(grade))
            .sum()
    }

    /// Draw one grade under `combo`.
    pub fn sample<R: RandomSource + ?Sized>(&self, combo: ModifierCombo, rng: &mut R) -> Grade {
        let distribution = self.distributions.get(combo);
        let roll = rng.next_unit();
        let mut cumulative = 0.0;
        let mut fallback = Grade::Success;
        for grade in Grade::ALL {
            let p = distribution.get(grade);
            if p <= 0.0 {
                continue;
            }
            fallback = grade;
            cumulative += p;
            if roll < cumulative {
                return grade;
            }
        }
        fallback
    }
}
