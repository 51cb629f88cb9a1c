use chrono::{DateTime, Local, Utc};

/// Short age of a timestamp: "just now", "5m ago", "3h ago", "2d ago", or a calendar date after a week.
pub fn format_relative(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff_ms = (now - created_at).num_milliseconds();
    let diff_mins = diff_ms.div_euclid(60_000);
    let diff_hours = diff_ms.div_euclid(3_600_000);
    let diff_days = diff_ms.div_euclid(86_400_000);

    if diff_mins < 1 {
        "just now".to_string()
    } else if diff_mins < 60 {
        format!("{diff_mins}m ago")
    } else if diff_hours < 24 {
        format!("{diff_hours}h ago")
    } else if diff_days < 7 {
        format!("{diff_days}d ago")
    } else {
        created_at
            .with_timezone(&Local)
            .format("%-m/%-d/%Y")
            .to_string()
    }
}
