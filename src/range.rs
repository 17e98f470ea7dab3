use crate::capabilities::Capabilities;

/// Clamp a raw temperature into the bounds the unit advertises for `mode_code`.
/// Modes without bounds pass the value through untouched.
pub fn clamp(caps: &Capabilities, mode_code: &str, temperature: f64) -> f64 {
    match caps.range(mode_code) {
        Some(range) if temperature < range.min => range.min,
        Some(range) if temperature > range.max => range.max,
        _ => temperature,
    }
}

/// Round to the 0.1 °C resolution the API works in.
pub fn round_tenth(t: f64) -> f64 {
    (t * 10.0).round() / 10.0
}

/// Display temperature to wire temperature.
pub fn strip_offset(display: f64, offset: f64) -> f64 {
    round_tenth(display - offset)
}

/// Wire temperature to display temperature.
pub fn apply_offset(raw: f64, offset: f64) -> f64 {
    round_tenth(raw + offset)
}

/// Render a temperature the way the API expects it: `22`, `21.5`.
pub fn format_temperature(t: f64) -> String {
    format!("{}", round_tenth(t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::TemperatureRange;

    fn caps() -> Capabilities {
        let mut c = Capabilities::default();
        c.max.insert("1".into(), TemperatureRange { min: 17.0, max: 28.0 });
        c.max.insert("3".into(), TemperatureRange { min: 19.0, max: 30.0 });
        c
    }

    #[test]
    fn clamps_to_bounds() {
        let c = caps();
        assert_eq!(clamp(&c, "1", 29.0), 28.0);
        assert_eq!(clamp(&c, "1", 10.0), 17.0);
        assert_eq!(clamp(&c, "1", 21.5), 21.5);
        assert_eq!(clamp(&c, "3", 29.0), 29.0);
    }

    #[test]
    fn mode_without_bounds_passes_through() {
        let c = caps();
        assert_eq!(clamp(&c, "7", 45.0), 45.0);
        assert_eq!(clamp(&c, "", -3.0), -3.0);
    }

    #[test]
    fn idempotent_and_monotonic() {
        let c = caps();
        let mut last = f64::MIN;
        let mut v = 5.0;
        while v <= 40.0 {
            let once = clamp(&c, "1", v);
            assert_eq!(clamp(&c, "1", once), once);
            assert!(once >= last);
            last = once;
            v += 0.5;
        }
    }

    #[test]
    fn offset_round_trip() {
        assert_eq!(strip_offset(22.3, 1.0), 21.3);
        assert_eq!(apply_offset(21.3, 1.0), 22.3);
        assert_eq!(strip_offset(20.0, -1.5), 21.5);
    }

    #[test]
    fn formats_without_trailing_zero() {
        assert_eq!(format_temperature(22.0), "22");
        assert_eq!(format_temperature(21.5), "21.5");
        assert_eq!(format_temperature(21.299999999), "21.3");
    }
}
