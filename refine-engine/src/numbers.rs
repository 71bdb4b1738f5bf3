//! Numeric conversion helpers centralizing lossy casts.

use num_traits::cast::cast;

/// Convert a usize count to f64, allowing precision loss in a single location.
#[must_use]
pub fn usize_to_f64(value: usize) -> f64 {
    cast::<usize, f64>(value).unwrap_or(0.0)
}

/// Convert a u64 count to f64, allowing precision loss in a single location.
#[must_use]
pub fn u64_to_f64(value: u64) -> f64 {
    cast::<u64, f64>(value).unwrap_or(0.0)
}

/// Clamp a probability into `[0, 1]`, mapping NaN to 0.
#[must_use]
pub fn clamp_probability(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

/// Map a raw 64-bit draw onto `[0, 1)` using the top 53 bits.
#[must_use]
pub fn unit_from_u64(bits: u64) -> f64 {
    let mantissa = bits >> 11;
    u64_to_f64(mantissa) / u64_to_f64(1_u64 << 53)
}

/// Inverse of [`unit_from_u64`]: place a `[0, 1)` draw's 53 mantissa bits in
/// the high bits of a u64. Out-of-range and NaN draws saturate.
#[must_use]
pub fn unit_to_u64(draw: f64) -> u64 {
    let scaled = (draw * u64_to_f64(1_u64 << 53)).floor();
    let mantissa = cast::<f64, u64>(scaled).map_or(0, |value| value.min((1_u64 << 53) - 1));
    mantissa << 11
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_handles_out_of_range_and_nan() {
        assert!((clamp_probability(1.7) - 1.0).abs() < f64::EPSILON);
        assert!(clamp_probability(-0.2).abs() < f64::EPSILON);
        assert!(clamp_probability(f64::NAN).abs() < f64::EPSILON);
        assert!((clamp_probability(0.25) - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn unit_draws_stay_below_one() {
        assert!(unit_from_u64(0).abs() < f64::EPSILON);
        assert!(unit_from_u64(u64::MAX) < 1.0);
        assert!((unit_from_u64(1_u64 << 63) - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn unit_draws_invert_their_bit_mapping() {
        for draw in [0.0, 0.25, 0.5, 0.999_999] {
            assert!((unit_from_u64(unit_to_u64(draw)) - draw).abs() < 1e-15);
        }
        assert_eq!(unit_to_u64(-0.5), 0);
        assert_eq!(unit_to_u64(f64::NAN), 0);
        assert!(unit_from_u64(unit_to_u64(2.0)) < 1.0);
    }

    #[test]
    fn counts_convert_exactly_for_small_values() {
        assert!((usize_to_f64(10_000) - 10_000.0).abs() < f64::EPSILON);
        assert!((u64_to_f64(42) - 42.0).abs() < f64::EPSILON);
    }
}
