use time::macros::format_description;
use time::OffsetDateTime;

/// Seconds since the unix epoch, now
pub fn unix_now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

/// A compact relative age like "45s", "3m", "2h", "5d" or "1y"
pub fn date_ago(then: i64, now: i64) -> String {
    let seconds = now.saturating_sub(then).max(0);
    let minutes: f32 = seconds as f32 / 60.0;
    let hours: f32 = minutes / 60.0;
    let days: f32 = hours / 24.0;
    let years: f32 = days / 365.0;

    if seconds < 45 {
        format!("{}s", seconds)
    } else if seconds < 90 {
        "1m".to_string()
    } else if minutes < 45.0 {
        format!("{}m", minutes as i64)
    } else if minutes < 90.0 {
        "1h".to_string()
    } else if hours < 24.0 {
        format!("{}h", hours as i64)
    } else if hours < 42.0 {
        "1d".to_string()
    } else if days < 30.0 {
        format!("{}d", days as i64)
    } else if days < 45.0 {
        "1mo".to_string()
    } else if days < 365.0 {
        format!("{}mo", (days / 30.0) as i64)
    } else if years < 1.5 {
        "1y".to_string()
    } else {
        format!("{}y", years as i64)
    }
}

/// Absolute UTC date for a post, as `YYYY-MM-DD HH:MM`.
///
/// Returns an empty string for timestamps `time` cannot represent.
pub fn format_date(unixtime: f64) -> String {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]");
    match OffsetDateTime::from_unix_timestamp(unixtime.floor() as i64) {
        Ok(dt) => dt.format(&format).unwrap_or_default(),
        Err(_) => String::new(),
    }
}
