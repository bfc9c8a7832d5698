//! Display helpers for catalog listings

use chrono::{DateTime, Local, Utc};

/// Format a duration in milliseconds as `MM:SS`, minutes wrapping at an hour
pub fn format_duration(millis: u64) -> String {
    if millis == 0 {
        return "00:00".to_string();
    }
    let total_seconds = millis / 1000;
    format!("{:02}:{:02}", (total_seconds / 60) % 60, total_seconds % 60)
}

/// Format a timestamp as `dd/MM/yyyy HH:mm` in local time
pub fn format_date(date: &DateTime<Utc>) -> String {
    date.with_timezone(&Local)
        .format("%d/%m/%Y %H:%M")
        .to_string()
}
