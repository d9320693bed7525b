use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Department code that broadcasts an event to every institute.
pub const BROADCAST_INSTITUTE: &str = "ALL";

pub const INSTITUTES: [&str; 4] = ["FCDSET", "FBGM", "FNAHS", "FALS"];

pub fn is_known_institute(code: &str) -> bool {
    INSTITUTES.contains(&code)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    #[default]
    Draft,
    Pending,
    Approved,
    Rejected,
    Canceled,
    Completed,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Draft => "draft",
            EventStatus::Pending => "pending",
            EventStatus::Approved => "approved",
            EventStatus::Rejected => "rejected",
            EventStatus::Canceled => "canceled",
            EventStatus::Completed => "completed",
        }
    }
}

impl FromStr for EventStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(EventStatus::Draft),
            "pending" => Ok(EventStatus::Pending),
            "approved" => Ok(EventStatus::Approved),
            "rejected" => Ok(EventStatus::Rejected),
            "canceled" => Ok(EventStatus::Canceled),
            "completed" => Ok(EventStatus::Completed),
            other => Err(format!("unknown event status {other:?}")),
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub start: DateTime<Utc>,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub timezone: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CampusEvent {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Institute the event was posted to, or [`BROADCAST_INSTITUTE`].
    pub department: String,
    pub category: String,
    pub location: String,
    pub status: EventStatus,
    pub tags: Vec<String>,
    pub capacity: u32,
    pub reserved: u32,
    pub schedules: Vec<Schedule>,
    pub background_image: Option<String>,
}

impl CampusEvent {
    /// Start of the first schedule entry. `None` means unscheduled.
    pub fn starts_at(&self) -> Option<DateTime<Utc>> {
        self.schedules.first().map(|s| s.start)
    }

    pub fn is_broadcast(&self) -> bool {
        self.department == BROADCAST_INSTITUTE
    }
}

// ── Wire types ──

/// An event as the API returns it. Most fields sit under `data`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub data: Option<EventData>,
    #[serde(default)]
    pub rsvps: Vec<Rsvp>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventData {
    pub title: Option<String>,
    pub description: Option<String>,
    pub department_id: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub capacity: Option<u32>,
    #[serde(default)]
    pub schedules: Vec<Schedule>,
    pub background_image: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Rsvp {
    #[serde(default)]
    pub status: String,
}

impl From<EventRecord> for CampusEvent {
    fn from(record: EventRecord) -> Self {
        let data = record.data.unwrap_or_default();
        let reserved = record.rsvps.iter().filter(|r| r.status == "going").count() as u32;
        let status = record
            .status
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();

        CampusEvent {
            id: record.id,
            title: non_empty(data.title)
                .or_else(|| non_empty(record.title))
                .unwrap_or_default(),
            description: non_empty(data.description)
                .or_else(|| non_empty(record.description))
                .unwrap_or_default(),
            department: non_empty(data.department_id).unwrap_or_else(|| "Unknown".to_string()),
            category: non_empty(data.category).unwrap_or_else(|| "General".to_string()),
            location: non_empty(data.location).unwrap_or_else(|| "TBD".to_string()),
            status,
            tags: data.tags,
            capacity: data.capacity.unwrap_or(0),
            reserved,
            schedules: data.schedules,
            background_image: non_empty(data.background_image),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

/// Body for `POST /events` and `PUT /events/:id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDraft {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub department_id: String,
    pub category: String,
    pub location: String,
    pub organizer_id: String,
    pub schedules: Vec<Schedule>,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_image: Option<String>,
}

/// Accepts RFC 3339, or a bare `YYYY-MM-DDTHH:MM[:SS]` read as UTC.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).ok_or_else(|| serde::de::Error::custom(format!("bad timestamp {raw:?}")))
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}
