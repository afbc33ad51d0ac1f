use chrono::{NaiveTime, Timelike};

pub fn format_duration(seconds: i64) -> String {
    let sign = if seconds < 0 { "-" } else { "" };
    let seconds = seconds.abs();
    let days = seconds / 86400;
    let hours = (seconds % 86400) / 3600;
    let mins = (seconds % 3600) / 60;
    let secs = seconds % 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{}d", days));
    }
    if hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if mins > 0 {
        parts.push(format!("{}m", mins));
    }
    if secs > 0 || (days == 0 && hours == 0 && mins == 0) {
        parts.push(format!("{}s", secs));
    }

    format!("{}{}", sign, parts.join(" "))
}

/// Rounds halves towards positive infinity, so -2.5 becomes -2 and 2.5 becomes 3.
pub fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

/// Label for an hour-of-day slot, e.g. `7:00 AM`, `12:00 PM`.
pub fn format_slot_label(hour: u32) -> String {
    let (display, period) = twelve_hour(hour);
    format!("{}:00 {}", display, period)
}

/// `h:mm AM` rendering of a wall-clock time.
pub fn format_clock(time: NaiveTime) -> String {
    let (display, period) = twelve_hour(time.hour());
    format!("{}:{:02} {}", display, time.minute(), period)
}

fn twelve_hour(hour: u32) -> (u32, &'static str) {
    let period = if hour < 12 { "AM" } else { "PM" };
    let display = match hour % 12 {
        0 => 12,
        h => h,
    };
    (display, period)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(59), "59s");
        assert_eq!(format_duration(60), "1m");
        assert_eq!(format_duration(3661), "1h 1m 1s");
        assert_eq!(format_duration(86400 + 3600 + 60 + 1), "1d 1h 1m 1s");
        assert_eq!(format_duration(-5400), "-1h 30m");
    }

    #[test]
    fn test_round_half_up() {
        assert_eq!(round_half_up(2.5), 3.0);
        assert_eq!(round_half_up(2.49), 2.0);
        assert_eq!(round_half_up(-2.5), -2.0);
        assert_eq!(round_half_up(-2.51), -3.0);
    }

    #[test]
    fn test_slot_labels() {
        assert_eq!(format_slot_label(7), "7:00 AM");
        assert_eq!(format_slot_label(12), "12:00 PM");
        assert_eq!(format_slot_label(21), "9:00 PM");
        assert_eq!(format_slot_label(0), "12:00 AM");
    }

    #[test]
    fn test_format_clock() {
        let t = NaiveTime::from_hms_opt(13, 5, 0).unwrap();
        assert_eq!(format_clock(t), "1:05 PM");
    }
}
