use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// Every Friday in `start..=end`.
pub fn fridays_between(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut out = Vec::new();
    let Some(mut date) = next_weekday_on_or_after(start, Weekday::Fri) else {
        return out;
    };

    while date <= end {
        out.push(date);
        match date.checked_add_signed(Duration::days(7)) {
            Some(next) => date = next,
            None => break,
        }
    }
    out
}

/// Weekly trading dates for a backtest: Fridays from `start + rsi_window` days
/// through `end`, leaving the first window for the indicator to warm up.
pub fn backtest_calendar(start: NaiveDate, end: NaiveDate, rsi_window: usize) -> Vec<NaiveDate> {
    let first = i64::try_from(rsi_window)
        .ok()
        .and_then(Duration::try_days)
        .and_then(|warmup| start.checked_add_signed(warmup));
    match first {
        Some(first) => fridays_between(first, end),
        None => Vec::new(),
    }
}

fn next_weekday_on_or_after(date: NaiveDate, weekday: Weekday) -> Option<NaiveDate> {
    let ahead = (7 + weekday.num_days_from_monday() - date.weekday().num_days_from_monday()) % 7;
    date.checked_add_signed(Duration::days(i64::from(ahead)))
}
