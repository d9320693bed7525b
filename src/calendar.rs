use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Datelike, Days, NaiveDate, TimeZone};

use crate::campus::CampusEvent;

/// Date-range presets on the admin dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RangeFilter {
    #[default]
    All,
    ThisWeek,
    NextWeek,
    NextMonth,
}

impl RangeFilter {
    /// Compares on the event's local start date. Weeks start on Sunday.
    pub fn matches<Tz: TimeZone>(&self, event: &CampusEvent, now: &DateTime<Tz>) -> bool {
        let today = now.date_naive();
        let (from, to) = match self {
            RangeFilter::All => return true,
            RangeFilter::ThisWeek => {
                let from = week_start(today);
                (from, from + Days::new(7))
            }
            RangeFilter::NextWeek => {
                let from = week_start(today) + Days::new(7);
                (from, from + Days::new(7))
            }
            RangeFilter::NextMonth => {
                let (y, m) = shift_month(today.year(), today.month(), 1);
                let (y2, m2) = shift_month(y, m, 1);
                (first_of(y, m), first_of(y2, m2))
            }
        };

        let Some(start) = event.starts_at() else {
            return false;
        };
        let day = start.with_timezone(&now.timezone()).date_naive();
        day >= from && day < to
    }

    pub fn apply<'a, I, Tz>(&self, events: I, now: &DateTime<Tz>) -> Vec<&'a CampusEvent>
    where
        I: IntoIterator<Item = &'a CampusEvent>,
        Tz: TimeZone,
    {
        events.into_iter().filter(|e| self.matches(e, now)).collect()
    }
}

fn week_start(day: NaiveDate) -> NaiveDate {
    day - Days::new(day.weekday().num_days_from_sunday() as u64)
}

fn first_of(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN)
}

/// `(year, month)` moved by `delta` months.
pub fn shift_month(year: i32, month: u32, delta: i32) -> (i32, u32) {
    let index = year * 12 + month as i32 - 1 + delta;
    (index.div_euclid(12), index.rem_euclid(12) as u32 + 1)
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = shift_month(year, month, 1);
    first_of(next_year, next_month)
        .signed_duration_since(first_of(year, month))
        .num_days() as u32
}

/// Same day in the month `delta` months away, clamped to that month's length.
pub fn move_by_months(date: NaiveDate, delta: i32) -> NaiveDate {
    let (year, month) = shift_month(date.year(), date.month(), delta);
    let day = date.day().min(days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(date)
}

/// Scheduled events keyed by their local start date.
pub fn group_by_date<'a, I, Tz>(events: I, tz: &Tz) -> BTreeMap<NaiveDate, Vec<&'a CampusEvent>>
where
    I: IntoIterator<Item = &'a CampusEvent>,
    Tz: TimeZone,
{
    let mut by_date: BTreeMap<NaiveDate, Vec<&CampusEvent>> = BTreeMap::new();
    for event in events {
        if let Some(start) = event.starts_at() {
            by_date
                .entry(start.with_timezone(tz).date_naive())
                .or_default()
                .push(event);
        }
    }
    by_date
}

/// Days of `year`/`month` that have at least one event starting.
pub fn days_with_events<'a, I, Tz>(events: I, year: i32, month: u32, tz: &Tz) -> HashSet<u32>
where
    I: IntoIterator<Item = &'a CampusEvent>,
    Tz: TimeZone,
{
    group_by_date(events, tz)
        .into_keys()
        .filter(|d| d.year() == year && d.month() == month)
        .map(|d| d.day())
        .collect()
}
