//! Automatic-cycle duration lookup.
//!
//! The flip period of AUTOMATIC_CYCLE is derived from the temperature
//! difference between the outdoor (external) and indoor (internal) NTC
//! probes, in centidegrees:
//!
//! ```text
//!   secs
//!   200 ┤            ●
//!   150 ┤        ●         ●
//!    80 ┤    ●                  ●
//!    50 ┤                            ●
//!    35 ┼●                                ●
//!       └┴───┴───┴───────┴────┴────┴────┴── delta (°C)
//!       -10  -6  -3      3    10   15   20  25
//! ```
//!
//! Between two knots the value is linearly interpolated with the fraction
//! rounded toward +∞.  Below the first knot and from the last knot on, the
//! end value (35 s) applies.

/// `(delta centidegrees, seconds)` knots, ascending by delta.
pub const DURATION_TABLE: [(i16, u16); 8] = [
    (-1000, 35),
    (-600, 80),
    (-300, 150),
    (300, 200),
    (1000, 150),
    (1500, 80),
    (2000, 50),
    (2500, 35),
];

/// Integer division rounding toward +∞ for a positive divisor.
fn ceiling_fraction(numerator: i32, denominator: i32) -> i32 {
    if numerator >= 0 {
        (numerator + denominator - 1) / denominator
    } else {
        numerator / denominator
    }
}

/// Flip period (seconds) for the given NTC readings (centidegrees).
pub fn automatic_cycle_duration(internal: i16, external: i16) -> u16 {
    let delta = i32::from(external) - i32::from(internal);
    let (first_t, first_v) = DURATION_TABLE[0];
    if delta < i32::from(first_t) {
        return first_v;
    }

    for pair in DURATION_TABLE.windows(2) {
        let (t0, v0) = (i32::from(pair[0].0), i32::from(pair[0].1));
        let (t1, v1) = (i32::from(pair[1].0), i32::from(pair[1].1));
        if delta < t1 {
            let step = ceiling_fraction((delta - t0) * (v1 - v0), t1 - t0);
            return (step + v0) as u16;
        }
    }

    DURATION_TABLE[DURATION_TABLE.len() - 1].1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_knots() {
        for &(t, v) in &DURATION_TABLE {
            assert_eq!(automatic_cycle_duration(0, t), v, "knot at delta {t}");
        }
    }

    #[test]
    fn clamps_outside_domain() {
        assert_eq!(automatic_cycle_duration(0, -1001), 35);
        assert_eq!(automatic_cycle_duration(3000, -3000), 35);
        assert_eq!(automatic_cycle_duration(0, 2500), 35);
        assert_eq!(automatic_cycle_duration(-5000, 5000), 35);
    }

    #[test]
    fn delta_is_external_minus_internal() {
        // 10 °C inside, 25 °C outside
        assert_eq!(automatic_cycle_duration(1000, 2500), 80);
        // reversed gives the cold-side clamp
        assert_eq!(automatic_cycle_duration(2500, 1000), 35);
    }

    #[test]
    fn rising_segment_rounds_up() {
        // -1000..-600 maps 35..80: 45/400 s per centidegree
        assert_eq!(automatic_cycle_duration(0, -999), 36);
        assert_eq!(automatic_cycle_duration(0, -800), 58);
    }

    #[test]
    fn falling_segment_truncates_toward_zero() {
        // 300..1000 maps 200..150: -10000/700 = -14.28 -> -14
        assert_eq!(automatic_cycle_duration(0, 500), 186);
        // 2000..2500 maps 50..35: -15*499/500 -> -14
        assert_eq!(automatic_cycle_duration(0, 2499), 36);
    }

    #[test]
    fn high_end_dip() {
        let peak = automatic_cycle_duration(0, 300);
        assert_eq!(peak, 200);
        assert!(automatic_cycle_duration(0, 1500) < peak);
        assert!(automatic_cycle_duration(0, 2000) < automatic_cycle_duration(0, 1500));
    }

    #[test]
    fn extreme_inputs_do_not_overflow() {
        assert_eq!(automatic_cycle_duration(i16::MIN, i16::MAX), 35);
        assert_eq!(automatic_cycle_duration(i16::MAX, i16::MIN), 35);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn always_within_table_range(internal in any::<i16>(), external in any::<i16>()) {
            let d = automatic_cycle_duration(internal, external);
            prop_assert!((35..=200).contains(&d));
        }

        #[test]
        fn deterministic(internal in -4000i16..4000, external in -4000i16..4000) {
            prop_assert_eq!(
                automatic_cycle_duration(internal, external),
                automatic_cycle_duration(internal, external)
            );
        }

        #[test]
        fn non_decreasing_up_to_peak(a in -1000i32..300, b in -1000i32..300) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(
                automatic_cycle_duration(0, lo as i16) <= automatic_cycle_duration(0, hi as i16)
            );
        }

        #[test]
        fn non_increasing_after_peak(a in 300i32..2500, b in 300i32..2500) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(
                automatic_cycle_duration(0, lo as i16) >= automatic_cycle_duration(0, hi as i16)
            );
        }
    }
}
