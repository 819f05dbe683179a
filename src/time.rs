use chrono::{Datelike, Utc};

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Start of the current UTC day in epoch millis. Used by the appointments
/// "today" filter and the dashboard counters.
pub fn today_start_ms() -> i64 {
    let now = Utc::now();
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc().timestamp_millis())
        .unwrap_or_else(|| now.timestamp_millis())
}

/// Start of the current UTC month in epoch millis.
pub fn month_start_ms() -> i64 {
    let now = Utc::now();
    now.date_naive()
        .with_day(1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().timestamp_millis())
        .unwrap_or_else(|| now.timestamp_millis())
}
