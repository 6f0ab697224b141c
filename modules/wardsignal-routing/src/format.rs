/// Human-readable distance: `"850 m"` below a kilometre, `"1.2 km"` above.
pub fn format_distance(meters: f64) -> String {
    let meters = non_negative(meters).round();
    if meters < 1000.0 {
        format!("{} m", meters as u64)
    } else {
        format!("{:.1} km", meters / 1000.0)
    }
}

/// Human-readable duration: `"45 sec"`, `"12 min"`, `"1 h 5 min"`.
pub fn format_duration(seconds: f64) -> String {
    let total = non_negative(seconds).round() as u64;
    if total < 60 {
        return format!("{total} sec");
    }

    let minutes = (total + 30) / 60;
    if minutes < 60 {
        return format!("{minutes} min");
    }

    match (minutes / 60, minutes % 60) {
        (hours, 0) => format!("{hours} h"),
        (hours, rest) => format!("{hours} h {rest} min"),
    }
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_under_a_kilometre() {
        assert_eq!(format_distance(0.0), "0 m");
        assert_eq!(format_distance(849.6), "850 m");
    }

    #[test]
    fn distance_in_kilometres() {
        assert_eq!(format_distance(1000.0), "1.0 km");
        assert_eq!(format_distance(999.7), "1.0 km");
        assert_eq!(format_distance(12_345.0), "12.3 km");
    }

    #[test]
    fn bad_inputs_clamp_to_zero() {
        assert_eq!(format_distance(-5.0), "0 m");
        assert_eq!(format_distance(f64::NAN), "0 m");
        assert_eq!(format_duration(f64::INFINITY), "0 sec");
    }

    #[test]
    fn duration_seconds_and_minutes() {
        assert_eq!(format_duration(45.0), "45 sec");
        assert_eq!(format_duration(90.0), "2 min");
        assert_eq!(format_duration(720.0), "12 min");
    }

    #[test]
    fn duration_hours() {
        assert_eq!(format_duration(3599.0), "1 h");
        assert_eq!(format_duration(3600.0), "1 h");
        assert_eq!(format_duration(3900.0), "1 h 5 min");
        assert_eq!(format_duration(2.0 * 3600.0 + 60.0), "2 h 1 min");
    }
}
