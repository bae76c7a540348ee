//! Light-speed bounds derived from round-trip latency.

/// Speed of light in vacuum, km/s.
pub const C_KM_PER_S: f64 = 299_792.458;

/// Typical propagation speed in fibre and copper, as a fraction of `c`.
pub const CABLE_VELOCITY_FRACTION: f64 = 2.0 / 3.0;

/// Upper bound on the one-way cable distance a round trip of `ms` could have
/// covered at `fraction` of light speed, truncated to whole kilometres.
pub fn distance_km(ms: f64, fraction: f64) -> u64 {
    let km = C_KM_PER_S * (ms / 1000.0) * fraction / 2.0;
    if km.is_finite() && km > 0.0 {
        km.trunc() as u64
    } else {
        0
    }
}

/// Percentage of light speed needed to cover `km` one way in a round trip of
/// `ms`, rounded to one decimal place.
pub fn lightspeed_percent(ms: f64, km: f64) -> Option<f64> {
    if ms <= 0.0 || !ms.is_finite() || !km.is_finite() {
        return None;
    }
    let fraction = km * 2.0 / (C_KM_PER_S * (ms / 1000.0));
    Some((fraction * 1000.0).round() / 10.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_matches_formula() {
        let expected = (C_KM_PER_S * (10.0 / 1000.0) * (2.0 / 3.0) / 2.0).trunc() as u64;
        assert_eq!(distance_km(10.0, CABLE_VELOCITY_FRACTION), expected);
        assert_eq!(expected, 999);
    }

    #[test]
    fn test_distance_is_monotonic_in_latency() {
        let mut previous = 0;
        for ms in (0..2000).map(|v| v as f64 * 0.5) {
            let km = distance_km(ms, CABLE_VELOCITY_FRACTION);
            assert!(km >= previous, "distance shrank at {ms} ms");
            previous = km;
        }
    }

    #[test]
    fn test_zero_latency_is_zero_distance() {
        assert_eq!(distance_km(0.0, CABLE_VELOCITY_FRACTION), 0);
    }

    #[test]
    fn test_percent_inverts_distance() {
        for ms in [1.0, 12.5, 48.0, 230.0] {
            let km = C_KM_PER_S * (ms / 1000.0) * CABLE_VELOCITY_FRACTION / 2.0;
            let percent = lightspeed_percent(ms, km).unwrap();
            assert!((percent - 66.7).abs() < 0.05, "{ms} ms gave {percent}%");
        }
    }

    #[test]
    fn test_percent_rejects_zero_latency() {
        assert_eq!(lightspeed_percent(0.0, 500.0), None);
        assert_eq!(lightspeed_percent(-1.0, 500.0), None);
    }

    #[test]
    fn test_percent_rounds_to_one_decimal() {
        // Dublin to New York is roughly 5100 km; 80 ms round trip.
        let percent = lightspeed_percent(80.0, 5100.0).unwrap();
        assert_eq!(percent, 42.5);
    }
}
