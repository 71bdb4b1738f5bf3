//! Single-track probability model: tier base rates and modifier tables.
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::attempt::AttemptParams;
use crate::constants::{
    BUCKET_MATCH_TOLERANCE, DEFAULT_ENERGY_DIVISOR, DEFAULT_ESCALATION_CAP,
    DEFAULT_ESCALATION_STEP, MAX_TRIES_PER_RUN, SUPPORTED_DATA_VERSION,
};
use crate::error::ConfigError;
use crate::modifiers::ModifierCombo;

const DEFAULT_MODEL_DATA: &str = include_str!("../data/refine_model.json");
const SOURCE_NAME: &str = "refine model";

/// Nominal success chance for one refine level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierConfig {
    pub level: u32,
    pub base_probability: f64,
}

/// Catalyst behaviour for every tier sharing a base probability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CatalystEffectEntry {
    pub base_probability: f64,
    pub max_stacks: u32,
    pub per_stack_increment: f64,
}

impl CatalystEffectEntry {
    /// Largest contribution catalysts can make in this bucket.
    #[must_use]
    pub fn cap(&self) -> f64 {
        f64::from(self.max_stacks) * self.per_stack_increment
    }

    fn matches(&self, base_probability: f64) -> bool {
        (self.base_probability - base_probability).abs() <= BUCKET_MATCH_TOLERANCE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BonusItemLevel {
    pub level: u32,
    pub bonus: f64,
}

/// Bonus item additive bonus per level. Levels above `cutoff_level` must be zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BonusItemTable {
    pub cutoff_level: u32,
    #[serde(default)]
    pub levels: Vec<BonusItemLevel>,
}

/// Expected failed attempts before success, per modifier combination.
///
/// Catalyst columns assume the bucket's full stack count.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferenceAverages {
    pub level: u32,
    pub none: f64,
    pub catalyst: f64,
    pub bonus_item: f64,
    pub both: f64,
}

impl ReferenceAverages {
    #[must_use]
    pub const fn for_combo(&self, combo: ModifierCombo) -> f64 {
        match combo {
            ModifierCombo::None => self.none,
            ModifierCombo::Catalyst => self.catalyst,
            ModifierCombo::BonusItem => self.bonus_item,
            ModifierCombo::Both => self.both,
        }
    }
}

/// Serialized shape of the single-track tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityModelData {
    pub version: u32,
    #[serde(default = "ProbabilityModelData::default_energy_divisor")]
    pub energy_divisor: f64,
    #[serde(default = "ProbabilityModelData::default_escalation_step")]
    pub escalation_step: f64,
    #[serde(default = "ProbabilityModelData::default_escalation_cap")]
    pub escalation_cap: f64,
    pub tiers: Vec<TierConfig>,
    #[serde(default)]
    pub catalyst_buckets: Vec<CatalystEffectEntry>,
    pub bonus_item: BonusItemTable,
    #[serde(default)]
    pub reference: Vec<ReferenceAverages>,
}

impl ProbabilityModelData {
    const fn default_energy_divisor() -> f64 {
        DEFAULT_ENERGY_DIVISOR
    }

    const fn default_escalation_step() -> f64 {
        DEFAULT_ESCALATION_STEP
    }

    const fn default_escalation_cap() -> f64 {
        DEFAULT_ESCALATION_CAP
    }
}

/// Validated, read-only single-track configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityModel {
    energy_divisor: f64,
    escalation_step: f64,
    escalation_cap: f64,
    tiers: BTreeMap<u32, TierConfig>,
    catalyst_buckets: Vec<CatalystEffectEntry>,
    bonus_items: BTreeMap<u32, f64>,
    bonus_cutoff: u32,
    reference: BTreeMap<u32, ReferenceAverages>,
}

impl ProbabilityModel {
    /// Load the tables embedded in the crate.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedded tables fail to parse or validate.
    pub fn embedded() -> Result<Self, ConfigError> {
        Self::from_json_str(DEFAULT_MODEL_DATA)
    }

    /// Parse and validate tables from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON and any validation
    /// error raised by [`ProbabilityModel::from_data`].
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let data: ProbabilityModelData =
            serde_json::from_str(json).map_err(|err| ConfigError::Parse {
                source_name: SOURCE_NAME,
                message: err.to_string(),
            })?;
        Self::from_data(data)
    }

    /// Validate raw tables and build the lookup structure.
    ///
    /// # Errors
    ///
    /// Returns an error when any table entry is out of range, duplicated,
    /// missing for a configured tier, or when a bonus item entry above the
    /// cutoff is non-zero.
    pub fn from_data(data: ProbabilityModelData) -> Result<Self, ConfigError> {
        if data.version > SUPPORTED_DATA_VERSION {
            return Err(ConfigError::UnsupportedVersion {
                source_name: SOURCE_NAME,
                found: data.version,
                supported: SUPPORTED_DATA_VERSION,
            });
        }
        ensure_range("energy_divisor", data.energy_divisor, f64::MIN_POSITIVE, f64::MAX)?;
        ensure_range("escalation_step", data.escalation_step, 0.0, f64::MAX)?;
        ensure_range("escalation_cap", data.escalation_cap, 1.0, f64::MAX)?;

        let mut tiers = BTreeMap::new();
        for tier in data.tiers {
            ensure_range("tier.base_probability", tier.base_probability, f64::MIN_POSITIVE, 1.0)?;
            if tiers.insert(tier.level, tier).is_some() {
                return Err(ConfigError::DuplicateLevel {
                    table: "tiers",
                    level: tier.level,
                });
            }
        }

        for bucket in &data.catalyst_buckets {
            ensure_range(
                "catalyst.base_probability",
                bucket.base_probability,
                f64::MIN_POSITIVE,
                1.0,
            )?;
            ensure_range("catalyst.per_stack_increment", bucket.per_stack_increment, 0.0, 1.0)?;
        }
        for (index, bucket) in data.catalyst_buckets.iter().enumerate() {
            if data.catalyst_buckets[..index]
                .iter()
                .any(|earlier| earlier.matches(bucket.base_probability))
            {
                return Err(ConfigError::DuplicateBucket {
                    base_probability: bucket.base_probability,
                });
            }
        }

        let cutoff = data.bonus_item.cutoff_level;
        let mut bonus_items = BTreeMap::new();
        for entry in data.bonus_item.levels {
            ensure_range("bonus_item.bonus", entry.bonus, 0.0, 1.0)?;
            if entry.level > cutoff && entry.bonus != 0.0 {
                return Err(ConfigError::BonusAboveCutoff {
                    level: entry.level,
                    cutoff,
                    bonus: entry.bonus,
                });
            }
            if bonus_items.insert(entry.level, entry.bonus).is_some() {
                return Err(ConfigError::DuplicateLevel {
                    table: "bonus_item",
                    level: entry.level,
                });
            }
        }
        if let Some(&level) = tiers.keys().find(|level| !bonus_items.contains_key(*level)) {
            return Err(ConfigError::MissingBonusItem { level });
        }

        let mut reference = BTreeMap::new();
        for row in data.reference {
            if reference.insert(row.level, row).is_some() {
                return Err(ConfigError::DuplicateLevel {
                    table: "reference",
                    level: row.level,
                });
            }
        }
        if !reference.is_empty()
            && let Some(&level) = tiers.keys().find(|level| !reference.contains_key(*level))
        {
            return Err(ConfigError::MissingReference { level });
        }

        // Modifiers only add probability, so the unmodified schedule is the longest.
        for tier in tiers.values() {
            let params = AttemptParams {
                base_probability: tier.base_probability,
                modifier_bonus: 0.0,
                energy_divisor: data.energy_divisor,
                escalation_step: data.escalation_step,
                escalation_cap: data.escalation_cap,
            };
            if params.failure_horizon().is_none() {
                return Err(ConfigError::UnboundedAttempts {
                    level: tier.level,
                    limit: MAX_TRIES_PER_RUN,
                });
            }
        }

        debug!(
            "validated refine model: {} tiers, {} catalyst buckets, bonus cutoff {}",
            tiers.len(),
            data.catalyst_buckets.len(),
            cutoff
        );

        Ok(Self {
            energy_divisor: data.energy_divisor,
            escalation_step: data.escalation_step,
            escalation_cap: data.escalation_cap,
            tiers,
            catalyst_buckets: data.catalyst_buckets,
            bonus_items,
            bonus_cutoff: cutoff,
            reference,
        })
    }

    #[must_use]
    pub const fn energy_divisor(&self) -> f64 {
        self.energy_divisor
    }

    #[must_use]
    pub const fn escalation_step(&self) -> f64 {
        self.escalation_step
    }

    #[must_use]
    pub const fn escalation_cap(&self) -> f64 {
        self.escalation_cap
    }

    #[must_use]
    pub const fn bonus_item_cutoff(&self) -> u32 {
        self.bonus_cutoff
    }

    /// Configured levels in ascending order.
    pub fn levels(&self) -> impl Iterator<Item = u32> + '_ {
        self.tiers.keys().copied()
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownLevel`] when the level is not tabulated.
    pub fn tier(&self, level: u32) -> Result<TierConfig, ConfigError> {
        self.tiers
            .get(&level)
            .copied()
            .ok_or(ConfigError::UnknownLevel { level })
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownLevel`] when the level is not tabulated.
    pub fn base_probability(&self, level: u32) -> Result<f64, ConfigError> {
        self.tier(level).map(|tier| tier.base_probability)
    }

    /// Catalyst bucket matching the level's base probability, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownLevel`] when the level is not tabulated.
    pub fn catalyst_effect(&self, level: u32) -> Result<Option<CatalystEffectEntry>, ConfigError> {
        let base = self.base_probability(level)?;
        Ok(self
            .catalyst_buckets
            .iter()
            .find(|bucket| bucket.matches(base))
            .copied())
    }

    /// Additive bonus item contribution; zero above the cutoff.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownLevel`] when the level is not tabulated.
    pub fn bonus_item_effect(&self, level: u32) -> Result<f64, ConfigError> {
        self.tier(level)?;
        self.bonus_items
            .get(&level)
            .copied()
            .ok_or(ConfigError::MissingBonusItem { level })
    }

    /// Reference averages for a level, when the model carries them.
    #[must_use]
    pub fn reference(&self, level: u32) -> Option<&ReferenceAverages> {
        self.reference.get(&level)
    }
}

fn ensure_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(ConfigError::RangeViolation {
            field,
            min,
            max,
            value,
        })
    }
}
