//! Dual-track configuration: ancestor outcome tables, stage bands, turn rates.
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::constants::{DEFAULT_REWARD_TARGET, SUPPORTED_DATA_VERSION, WEIGHT_SUM_TOLERANCE};
use crate::error::ConfigError;
use crate::grades::SuccessGradeTable;
use crate::rng::RandomSource;

const DEFAULT_ADVANCED_DATA: &str = include_str!("../data/advanced_model.json");
const SOURCE_NAME: &str = "advanced model";

/// How an ancestor transforms the base reward of a bonus turn.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AncestorEffect {
    /// reward × factor
    Multiply(f64),
    /// reward + constant
    Add(f64),
    /// constant, ignoring the base reward
    Instant(f64),
}

impl AncestorEffect {
    #[must_use]
    pub fn apply(self, base_reward: f64) -> f64 {
        match self {
            Self::Multiply(factor) => base_reward * factor,
            Self::Add(constant) => base_reward + constant,
            Self::Instant(constant) => constant,
        }
    }

    const fn value(self) -> f64 {
        match self {
            Self::Multiply(value) | Self::Add(value) | Self::Instant(value) => value,
        }
    }
}

/// One weighted entity of a bonus-turn table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AncestorOutcome {
    pub id: String,
    pub weight: f64,
    pub effect: AncestorEffect,
}

/// Partial override applied atop a standard table to build its enhanced variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AncestorOverlay {
    pub id: String,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub effect: Option<AncestorEffect>,
}

/// Validated weight table for one band.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AncestorTable {
    label: String,
    outcomes: Vec<AncestorOutcome>,
}

impl AncestorTable {
    /// # Errors
    ///
    /// Returns an error when a weight or effect value is out of range, or when
    /// the weights do not sum to one.
    pub fn new(label: impl Into<String>, outcomes: Vec<AncestorOutcome>) -> Result<Self, ConfigError> {
        let label = label.into();
        for outcome in &outcomes {
            if !(0.0..=1.0).contains(&outcome.weight) {
                return Err(ConfigError::RangeViolation {
                    field: "ancestor.weight",
                    min: 0.0,
                    max: 1.0,
                    value: outcome.weight,
                });
            }
            if !outcome.effect.value().is_finite() {
                return Err(ConfigError::RangeViolation {
                    field: "ancestor.effect",
                    min: f64::MIN,
                    max: f64::MAX,
                    value: outcome.effect.value(),
                });
            }
        }
        let sum: f64 = outcomes.iter().map(|outcome| outcome.weight).sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ConfigError::WeightSum { table: label, sum });
        }
        Ok(Self { label, outcomes })
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn outcomes(&self) -> &[AncestorOutcome] {
        &self.outcomes
    }

    #[must_use]
    pub fn weight_sum(&self) -> f64 {
        self.outcomes.iter().map(|outcome| outcome.weight).sum()
    }

    /// Weighted sum of every entity's transform of `base_reward`.
    #[must_use]
    pub fn expected_reward(&self, base_reward: f64) -> f64 {
        self.outcomes
            .iter()
            .map(|outcome| outcome.weight * outcome.effect.apply(base_reward))
            .sum()
    }

    /// Pick one entity proportionally to its weight. Zero weights are never chosen.
    pub fn sample<R: RandomSource + ?Sized>(&self, rng: &mut R) -> &AncestorOutcome {
        let total = self.weight_sum();
        let roll = rng.next_unit() * total;
        let mut cumulative = 0.0;
        let mut fallback = &self.outcomes[0];
        for outcome in &self.outcomes {
            if outcome.weight <= 0.0 {
                continue;
            }
            fallback = outcome;
            cumulative += outcome.weight;
            if roll < cumulative {
                return outcome;
            }
        }
        fallback
    }

    fn with_overlays(&self, label: String, overlays: &[AncestorOverlay]) -> Result<Self, ConfigError> {
        let mut outcomes = self.outcomes.clone();
        for overlay in overlays {
            let target = outcomes
                .iter_mut()
                .find(|outcome| outcome.id == overlay.id)
                .ok_or_else(|| ConfigError::UnknownAncestor {
                    id: overlay.id.clone(),
                })?;
            if let Some(weight) = overlay.weight {
                target.weight = weight;
            }
            if let Some(effect) = overlay.effect {
                target.effect = effect;
            }
        }
        Self::new(label, outcomes)
    }
}

/// Stage band selecting which ancestor table applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageBand {
    Early,
    Later,
}

impl StageBand {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Early => "early",
            Self::Later => "later",
        }
    }
}

impl fmt::Display for StageBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    pub stage: u32,
    pub band: StageBand,
    #[serde(default)]
    pub label: Option<String>,
    /// Overrides the model-wide reward target for this stage.
    #[serde(default)]
    pub reward_target: Option<f64>,
}

/// Share of ordinary versus bonus turns.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TurnRateConfig {
    pub ordinary: f64,
    pub bonus: f64,
}

impl TurnRateConfig {
    /// Rates must be probabilities that sum to exactly one.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::TurnRates`] otherwise.
    #[allow(clippy::float_cmp)]
    pub fn validate(&self) -> Result<(), ConfigError> {
        let in_range = (0.0..=1.0).contains(&self.ordinary) && (0.0..=1.0).contains(&self.bonus);
        if !in_range || self.ordinary + self.bonus != 1.0 {
            return Err(ConfigError::TurnRates {
                ordinary: self.ordinary,
                bonus: self.bonus,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandData {
    pub standard: Vec<AncestorOutcome>,
    #[serde(default)]
    pub enhanced: Vec<AncestorOverlay>,
}

/// Serialized shape of the dual-track tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvancedModelData {
    pub version: u32,
    #[serde(default = "AdvancedModelData::default_reward_target")]
    pub reward_target: f64,
    pub turn_rates: TurnRateConfig,
    pub grades: SuccessGradeTable,
    pub stages: Vec<StageConfig>,
    pub bands: HashMap<StageBand, BandData>,
}

impl AdvancedModelData {
    const fn default_reward_target() -> f64 {
        DEFAULT_REWARD_TARGET
    }
}

#[derive(Debug, Clone, PartialEq)]
struct BandTables {
    standard: AncestorTable,
    enhanced: Option<AncestorTable>,
}

/// Validated, read-only dual-track configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AdvancedModel {
    reward_target: f64,
    turn_rates: TurnRateConfig,
    grades: SuccessGradeTable,
    stages: BTreeMap<u32, StageConfig>,
    bands: HashMap<StageBand, BandTables>,
}

impl AdvancedModel {
    /// Load the tables embedded in the crate.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedded tables fail to parse or validate.
    pub fn embedded() -> Result<Self, ConfigError> {
        Self::from_json_str(DEFAULT_ADVANCED_DATA)
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON and any validation
    /// error raised by [`AdvancedModel::from_data`].
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let data: AdvancedModelData =
            serde_json::from_str(json).map_err(|err| ConfigError::Parse {
                source_name: SOURCE_NAME,
                message: err.to_string(),
            })?;
        Self::from_data(data)
    }

    /// Validate raw tables, resolve enhanced overlays, and index stages.
    ///
    /// # Errors
    ///
    /// Returns an error when turn rates, grade distributions, or ancestor
    /// weights are invalid, when a stage references a missing band, or when
    /// an overlay names an unknown ancestor.
    pub fn from_data(data: AdvancedModelData) -> Result<Self, ConfigError> {
        if data.version > SUPPORTED_DATA_VERSION {
            return Err(ConfigError::UnsupportedVersion {
                source_name: SOURCE_NAME,
                found: data.version,
                supported: SUPPORTED_DATA_VERSION,
            });
        }
        if !data.reward_target.is_finite() || data.reward_target <= 0.0 {
            return Err(ConfigError::RangeViolation {
                field: "reward_target",
                min: f64::MIN_POSITIVE,
                max: f64::MAX,
                value: data.reward_target,
            });
        }
        data.turn_rates.validate()?;
        data.grades.validate()?;

        let mut bands = HashMap::new();
        for (band, band_data) in data.bands {
            let standard = AncestorTable::new(format!("{band}.standard"), band_data.standard)?;
            let enhanced = if band_data.enhanced.is_empty() {
                None
            } else {
                Some(standard.with_overlays(format!("{band}.enhanced"), &band_data.enhanced)?)
            };
            bands.insert(band, BandTables { standard, enhanced });
        }

        let mut stages = BTreeMap::new();
        for stage in data.stages {
            if !bands.contains_key(&stage.band) {
                return Err(ConfigError::MissingBand {
                    band: stage.band.to_string(),
                });
            }
            if let Some(target) = stage.reward_target
                && (!target.is_finite() || target <= 0.0)
            {
                return Err(ConfigError::RangeViolation {
                    field: "stage.reward_target",
                    min: f64::MIN_POSITIVE,
                    max: f64::MAX,
                    value: target,
                });
            }
            let index = stage.stage;
            if stages.insert(index, stage).is_some() {
                return Err(ConfigError::DuplicateLevel {
                    table: "stages",
                    level: index,
                });
            }
        }

        debug!(
            "validated advanced model: {} stages, {} bands, bonus rate {}",
            stages.len(),
            bands.len(),
            data.turn_rates.bonus
        );

        Ok(Self {
            reward_target: data.reward_target,
            turn_rates: data.turn_rates,
            grades: data.grades,
            stages,
            bands,
        })
    }

    #[must_use]
    pub const fn turn_rates(&self) -> TurnRateConfig {
        self.turn_rates
    }

    #[must_use]
    pub const fn grades(&self) -> &SuccessGradeTable {
        &self.grades
    }

    /// Configured stage indices in ascending order.
    pub fn stages(&self) -> impl Iterator<Item = u32> + '_ {
        self.stages.keys().copied()
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownStage`] for stages outside the tables.
    pub fn stage(&self, stage: u32) -> Result<&StageConfig, ConfigError> {
        self.stages
            .get(&stage)
            .ok_or(ConfigError::UnknownStage { stage })
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownStage`] for stages outside the tables.
    pub fn reward_target(&self, stage: u32) -> Result<f64, ConfigError> {
        Ok(self.stage(stage)?.reward_target.unwrap_or(self.reward_target))
    }

    /// Whether `stage` offers an enhanced ancestor table.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownStage`] for stages outside the tables.
    pub fn has_enhanced(&self, stage: u32) -> Result<bool, ConfigError> {
        let band = self.stage(stage)?.band;
        Ok(self
            .bands
            .get(&band)
            .is_some_and(|tables| tables.enhanced.is_some()))
    }

    /// Ancestor table for `stage`, optionally the enhanced variant.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownStage`] for stages outside the tables and
    /// [`ConfigError::EnhancedUnavailable`] when no enhanced variant exists.
    pub fn ancestor_table(&self, stage: u32, enhanced: bool) -> Result<&AncestorTable, ConfigError> {
        let band = self.stage(stage)?.band;
        let tables = self.bands.get(&band).ok_or_else(|| ConfigError::MissingBand {
            band: band.to_string(),
        })?;
        if enhanced {
            tables
                .enhanced
                .as_ref()
                .ok_or(ConfigError::EnhancedUnavailable { stage })
        } else {
            Ok(&tables.standard)
        }
    }
}
