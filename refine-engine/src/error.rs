//! Error kinds reported by the refine engine.
use thiserror::Error;

/// Raised when configuration tables are missing entries or violate invariants.
///
/// Validation runs eagerly when a model is constructed, so a simulation never
/// discovers bad tables mid-run.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("failed to parse {source_name}: {message}")]
    Parse {
        source_name: &'static str,
        message: String,
    },
    #[error("{source_name} data version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        source_name: &'static str,
        found: u32,
        supported: u32,
    },
    #[error("no tier configured for level {level}")]
    UnknownLevel { level: u32 },
    #[error("level {level} is configured more than once in {table}")]
    DuplicateLevel { table: &'static str, level: u32 },
    #[error("no stage configured for stage index {stage}")]
    UnknownStage { stage: u32 },
    #[error("stage {stage} has no enhanced ancestor table")]
    EnhancedUnavailable { stage: u32 },
    #[error("no {band} ancestor table configured")]
    MissingBand { band: String },
    #[error("level {level} has no bonus item entry")]
    MissingBonusItem { level: u32 },
    #[error("level {level} has no reference averages")]
    MissingReference { level: u32 },
    #[error(
        "level {level} is above the bonus item cutoff {cutoff} but carries bonus {bonus:.4}"
    )]
    BonusAboveCutoff { level: u32, cutoff: u32, bonus: f64 },
    #[error("{field} must be between {min} and {max} (got {value})")]
    RangeViolation {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },
    #[error("catalyst bucket for base probability {base_probability} is configured more than once")]
    DuplicateBucket { base_probability: f64 },
    #[error("level {level} needs more than {limit} failures before the energy guarantee applies")]
    UnboundedAttempts { level: u32, limit: u32 },
    #[error("{table} weights sum to {sum:.8}, expected 1")]
    WeightSum { table: String, sum: f64 },
    #[error("turn rates must sum to exactly 1 (ordinary {ordinary}, bonus {bonus})")]
    TurnRates { ordinary: f64, bonus: f64 },
    #[error("enhanced overlay references unknown ancestor '{id}'")]
    UnknownAncestor { id: String },
}

/// Raised when caller-supplied arguments are outside their valid range.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InputError {
    #[error("catalyst stack count must not be negative (got {value})")]
    NegativeStacks { value: f64 },
    #[error("catalyst stack count must be a whole number (got {value})")]
    NonIntegerStacks { value: f64 },
    #[error("catalyst stack count {value} exceeds the representable maximum")]
    StacksOutOfRange { value: f64 },
    #[error("attempt parameters need more than {limit} failures before the energy guarantee applies")]
    UnboundedAttempts { limit: u32 },
    #[error("iteration count must be at least 1")]
    ZeroIterations,
}

/// Raised when a configuration degenerates to a non-positive expected reward.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DivisionError {
    #[error("expected reward per turn is {expected_reward_per_turn}, cannot divide the reward target")]
    NonPositiveReward { expected_reward_per_turn: f64 },
}

/// Umbrella error for engine entry points that can fail in more than one way.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Division(#[from] DivisionError),
}
