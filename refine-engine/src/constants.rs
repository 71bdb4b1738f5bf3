//! Centralized tuning constants for refine engine math.
//!
//! Table data (tiers, buckets, ancestor weights) lives in the versioned JSON
//! assets under `data/`. The values here are the fallbacks and tolerances the
//! engine itself relies on.

// Single-track mechanic ------------------------------------------------------
/// Divisor applied to the final probability of a failed attempt before it is
/// added to the accumulated energy.
pub const DEFAULT_ENERGY_DIVISOR: f64 = 2.15;
/// Fraction of the tier base probability added to the escalated base after a failure.
pub const DEFAULT_ESCALATION_STEP: f64 = 0.1;
/// Ceiling for the escalated base, expressed as a multiple of the tier base.
pub const DEFAULT_ESCALATION_CAP: f64 = 2.0;
/// Energy level at which the next attempt is forced to succeed.
pub const ENERGY_GUARANTEE_THRESHOLD: f64 = 1.0;

// Dual-track mechanic --------------------------------------------------------
/// Progress required to clear one stage of the dual-track mechanic.
pub const DEFAULT_REWARD_TARGET: f64 = 1000.0;

// Validation -----------------------------------------------------------------
/// Tolerance for weight and distribution tables that must sum to one.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;
/// Tolerance used when matching a tier base probability to a catalyst bucket.
pub const BUCKET_MATCH_TOLERANCE: f64 = 1e-9;
/// Highest data version the loaders understand.
pub const SUPPORTED_DATA_VERSION: u32 = 1;

// Simulation -----------------------------------------------------------------
/// Iteration count used by acceptance sweeps.
pub const ACCEPTANCE_ITERATIONS: usize = 10_000;
/// Relative tolerance between Monte Carlo means and reference averages.
pub const ACCEPTANCE_TOLERANCE: f64 = 0.05;
/// Longest failure streak a tier may need before the energy guarantee applies.
pub const MAX_TRIES_PER_RUN: u32 = 100_000;
/// Safety bound on dual-track turns per run; a valid model finishes far sooner.
pub(crate) const MAX_TURNS_PER_RUN: u32 = 1_000_000;
