use chrono::{Local, NaiveDate};

/// Source of "today" for every is-today / is-upcoming decision.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Wall clock in the process's local timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalClock;

impl Clock for LocalClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// Parse `YYYY-MM-DD` by splitting into year/month/day. The result is a calendar
/// day with no timezone attached, so the same text always names the same day.
pub fn parse_local_date(text: &str) -> Option<NaiveDate> {
    let mut parts = text.trim().splitn(3, '-');
    let year = parts.next()?.trim().parse::<i32>().ok()?;
    let month = parts.next()?.trim().parse::<u32>().ok()?;
    let day = parts.next()?.trim().parse::<u32>().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

pub fn is_today(date: Option<&str>, today: NaiveDate) -> bool {
    date.and_then(parse_local_date)
        .is_some_and(|day| day == today)
}

/// Today counts as upcoming.
pub fn is_upcoming(date: Option<&str>, today: NaiveDate) -> bool {
    date.and_then(parse_local_date)
        .is_some_and(|day| day >= today)
}
