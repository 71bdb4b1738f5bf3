//! Modifier selection and additive probability resolution.
use log::debug;
use num_traits::cast::cast;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ConfigError, InputError};
use crate::model::ProbabilityModel;

/// Which consumables are active on a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModifierCombo {
    None,
    Catalyst,
    BonusItem,
    Both,
}

impl ModifierCombo {
    pub const ALL: [Self; 4] = [Self::None, Self::Catalyst, Self::BonusItem, Self::Both];

    #[must_use]
    pub const fn from_flags(use_catalyst: bool, use_bonus_item: bool) -> Self {
        match (use_catalyst, use_bonus_item) {
            (false, false) => Self::None,
            (true, false) => Self::Catalyst,
            (false, true) => Self::BonusItem,
            (true, true) => Self::Both,
        }
    }

    #[must_use]
    pub const fn uses_catalyst(self) -> bool {
        matches!(self, Self::Catalyst | Self::Both)
    }

    #[must_use]
    pub const fn uses_bonus_item(self) -> bool {
        matches!(self, Self::BonusItem | Self::Both)
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Catalyst => "catalyst",
            Self::BonusItem => "bonus_item",
            Self::Both => "both",
        }
    }
}

impl fmt::Display for ModifierCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Caller's modifier selection for one track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModifierChoice {
    #[serde(default)]
    pub use_catalyst: bool,
    #[serde(default)]
    pub catalyst_stacks: u32,
    #[serde(default)]
    pub use_bonus_item: bool,
}

impl ModifierChoice {
    pub const NONE: Self = Self {
        use_catalyst: false,
        catalyst_stacks: 0,
        use_bonus_item: false,
    };

    #[must_use]
    pub const fn new(use_catalyst: bool, catalyst_stacks: u32, use_bonus_item: bool) -> Self {
        Self {
            use_catalyst,
            catalyst_stacks,
            use_bonus_item,
        }
    }

    /// Build a choice from an unchecked stack count, as delivered by UI or JSON.
    ///
    /// # Errors
    ///
    /// Returns an [`InputError`] when the stack count is negative, fractional,
    /// or not representable.
    pub fn from_raw(
        use_catalyst: bool,
        catalyst_stacks: f64,
        use_bonus_item: bool,
    ) -> Result<Self, InputError> {
        let stacks = parse_stack_count(catalyst_stacks)?;
        Ok(Self::new(use_catalyst, stacks, use_bonus_item))
    }

    /// Choice for `combo` with catalysts stacked to the level's bucket maximum.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownLevel`] when the level is not tabulated.
    pub fn saturated(
        model: &ProbabilityModel,
        level: u32,
        combo: ModifierCombo,
    ) -> Result<Self, ConfigError> {
        let stacks = if combo.uses_catalyst() {
            model
                .catalyst_effect(level)?
                .map_or(0, |bucket| bucket.max_stacks)
        } else {
            0
        };
        Ok(Self::new(
            combo.uses_catalyst(),
            stacks,
            combo.uses_bonus_item(),
        ))
    }

    /// Dual-track choices only care whether each consumable is on.
    #[must_use]
    pub const fn combo(&self) -> ModifierCombo {
        ModifierCombo::from_flags(self.use_catalyst, self.use_bonus_item)
    }
}

/// Validate a raw stack count at the call boundary.
///
/// # Errors
///
/// Returns an [`InputError`] for negative, non-integer, or oversized values.
pub fn parse_stack_count(value: f64) -> Result<u32, InputError> {
    if value.is_nan() || value.fract() != 0.0 {
        return Err(InputError::NonIntegerStacks { value });
    }
    if value < 0.0 {
        return Err(InputError::NegativeStacks { value });
    }
    cast::<f64, u32>(value).ok_or(InputError::StacksOutOfRange { value })
}

/// Additive probability contributed by each consumable.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ModifierBreakdown {
    pub catalyst: f64,
    pub bonus_item: f64,
    /// Stacks that actually counted after capping at the bucket maximum.
    pub effective_stacks: u32,
}

impl ModifierBreakdown {
    #[must_use]
    pub fn total(&self) -> f64 {
        self.catalyst + self.bonus_item
    }
}

/// Resolve the additive bonus for `choice` at `level`.
///
/// # Errors
///
/// Returns [`ConfigError::UnknownLevel`] when the level is not tabulated.
pub fn resolve(
    model: &ProbabilityModel,
    level: u32,
    choice: &ModifierChoice,
) -> Result<f64, ConfigError> {
    resolve_breakdown(model, level, choice).map(|breakdown| breakdown.total())
}

/// Resolve the per-consumable contributions for `choice` at `level`.
///
/// Stacks beyond the bucket maximum have no further effect.
///
/// # Errors
///
/// Returns [`ConfigError::UnknownLevel`] when the level is not tabulated.
pub fn resolve_breakdown(
    model: &ProbabilityModel,
    level: u32,
    choice: &ModifierChoice,
) -> Result<ModifierBreakdown, ConfigError> {
    let mut breakdown = ModifierBreakdown::default();
    if choice.use_catalyst
        && let Some(bucket) = model.catalyst_effect(level)?
    {
        let stacks = choice.catalyst_stacks.min(bucket.max_stacks);
        if stacks < choice.catalyst_stacks {
            debug!(
                "level {level}: catalyst stacks capped at {} (requested {})",
                bucket.max_stacks, choice.catalyst_stacks
            );
        }
        breakdown.effective_stacks = stacks;
        breakdown.catalyst = f64::from(stacks) * bucket.per_stack_increment;
    }
    if choice.use_bonus_item {
        breakdown.bonus_item = model.bonus_item_effect(level)?;
    } else {
        model.tier(level)?;
    }
    Ok(breakdown)
}
