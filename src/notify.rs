//! Time-window selection over already-visible events, and the notifications
//! built from it.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};

use crate::campus::{CampusEvent, EventReview};

pub const URGENT_HOURS: i64 = 48;
pub const DASHBOARD_DAYS: i64 = 7;
pub const DASHBOARD_LIMIT: usize = 6;
pub const BELL_LIMIT: usize = 5;

/// Author names the server uses when it does not know who commented.
const ANONYMOUS_NAMES: [&str; 2] = ["Unknown User", "Anonymous"];

fn starts_within(event: &CampusEvent, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
    event
        .starts_at()
        .is_some_and(|start| start >= from && start <= to)
}

/// Starts within `[now, now + 48h]`. Unscheduled events are never urgent.
pub fn is_urgent(event: &CampusEvent, now: DateTime<Utc>) -> bool {
    starts_within(event, now, now + Duration::hours(URGENT_HOURS))
}

fn by_start(events: &mut [&CampusEvent]) {
    events.sort_by_key(|e| e.starts_at());
}

/// Splits scheduled events into `(urgent, rest)`, each ascending by start.
pub fn partition_urgent<'a, I>(events: I, now: DateTime<Utc>) -> (Vec<&'a CampusEvent>, Vec<&'a CampusEvent>)
where
    I: IntoIterator<Item = &'a CampusEvent>,
{
    let (mut urgent, mut rest): (Vec<_>, Vec<_>) = events
        .into_iter()
        .filter(|e| e.starts_at().is_some())
        .partition(|e| is_urgent(e, now));
    by_start(&mut urgent);
    by_start(&mut rest);
    (urgent, rest)
}

/// Urgent events first, then everything else; both ascending by start.
pub fn urgent_first<'a, I>(events: I, now: DateTime<Utc>) -> Vec<&'a CampusEvent>
where
    I: IntoIterator<Item = &'a CampusEvent>,
{
    let (mut urgent, rest) = partition_urgent(events, now);
    urgent.extend(rest);
    urgent
}

/// The notifications page: events not yet started, urgent ones first.
pub fn upcoming_notifications<'a, I>(events: I, now: DateTime<Utc>) -> Vec<&'a CampusEvent>
where
    I: IntoIterator<Item = &'a CampusEvent>,
{
    urgent_first(
        events
            .into_iter()
            .filter(|e| e.starts_at().is_some_and(|start| start >= now)),
        now,
    )
}

/// The dashboard overview: the first six events starting within a week.
pub fn dashboard_upcoming<'a, I>(events: I, now: DateTime<Utc>) -> Vec<&'a CampusEvent>
where
    I: IntoIterator<Item = &'a CampusEvent>,
{
    let horizon = now + Duration::days(DASHBOARD_DAYS);
    let mut upcoming: Vec<_> = events
        .into_iter()
        .filter(|e| starts_within(e, now, horizon))
        .collect();
    by_start(&mut upcoming);
    upcoming.truncate(DASHBOARD_LIMIT);
    upcoming
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Event,
    Comment,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub event_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
}

/// Bell entries for a student: the five soonest urgent events.
pub fn event_notifications<'a, I>(events: I, now: DateTime<Utc>) -> Vec<Notification>
where
    I: IntoIterator<Item = &'a CampusEvent>,
{
    let (urgent, _) = partition_urgent(events, now);

    urgent
        .into_iter()
        .take(BELL_LIMIT)
        .filter_map(|event| {
            let start = event.starts_at()?;
            Some(Notification {
                id: format!("event-{}", event.id),
                kind: NotificationKind::Event,
                title: event.title.clone(),
                message: starts_message(start, now),
                event_id: Some(event.id.clone()),
                timestamp: start,
                read: false,
            })
        })
        .collect()
}

fn starts_message(start: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let hours_until = (start - now).num_minutes() as f64 / 60.0;
    if hours_until < 24.0 {
        format!("Starts in {} hours", hours_until.round() as i64)
    } else {
        "Starts soon".to_string()
    }
}

/// Bell entries for an admin: the five newest comments by named authors.
pub fn comment_notifications(reviews: &[EventReview], events: &[CampusEvent]) -> Vec<Notification> {
    let mut notifications: Vec<Notification> = reviews
        .iter()
        .flat_map(|review| {
            let event_title = events
                .iter()
                .find(|e| e.id == review.event_id)
                .map(|e| e.title.as_str())
                .unwrap_or("Unknown Event");

            review
                .comments
                .iter()
                .filter(|c| {
                    let name = c.user_name.trim();
                    !name.is_empty() && !ANONYMOUS_NAMES.contains(&c.user_name.as_str())
                })
                .map(move |c| Notification {
                    id: format!("comment-{}", c.id),
                    kind: NotificationKind::Comment,
                    title: format!("{} commented", c.user_name),
                    message: format!("on {event_title}"),
                    event_id: Some(review.event_id.clone()),
                    timestamp: c.created_at,
                    read: false,
                })
        })
        .collect();

    notifications.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    notifications.truncate(BELL_LIMIT);
    notifications
}

/// Notification list with unread tracking.
#[derive(Debug, Clone, Default)]
pub struct Bell {
    items: Vec<Notification>,
    unread: usize,
}

impl Bell {
    pub fn items(&self) -> &[Notification] {
        &self.items
    }

    pub fn unread(&self) -> usize {
        self.unread
    }

    /// Swaps in a fresh poll result. Returns the notifications not seen before.
    pub fn replace(&mut self, items: Vec<Notification>) -> Vec<Notification> {
        let fresh = {
            let seen: HashSet<&str> = self.items.iter().map(|n| n.id.as_str()).collect();
            items
                .iter()
                .filter(|n| !seen.contains(n.id.as_str()))
                .cloned()
                .collect()
        };
        self.unread = items.len();
        self.items = items;
        fresh
    }

    pub fn mark_read(&mut self, id: &str) {
        if let Some(n) = self.items.iter_mut().find(|n| n.id == id && !n.read) {
            n.read = true;
            self.unread = self.unread.saturating_sub(1);
        }
    }
}
