use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::campus::event::{is_known_institute, BROADCAST_INSTITUTE};
use crate::campus::user::{PasswordChange, Registration, Role};
use crate::campus::{CampusEvent, EventDraft, Schedule};

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MIN_NEW_PASSWORD_LEN: usize = 6;

static RE_PHONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[\d\s\-()]+$").expect("phone pattern"));

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    Required(&'static str),

    #[error("Minute must be between 0 and 59")]
    Minute,

    #[error("Invalid hour value")]
    Hour,

    #[error("Invalid {0} date/time combination")]
    DateTime(&'static str),

    #[error("End date/time must be after start date/time")]
    EndNotAfterStart,

    #[error("Unknown institute {0:?}")]
    Institute(String),

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Password must be at least {0} characters")]
    PasswordTooShort(usize),

    #[error("Please enter a valid phone number")]
    Phone,

    #[error("Comment cannot be empty")]
    EmptyComment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Meridiem {
    #[default]
    Am,
    Pm,
}

/// A 12-hour clock reading as typed: hour `"1"`..`"12"`, minute `""`..`"59"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockInput {
    pub hour: String,
    pub minute: String,
    pub meridiem: Meridiem,
}

impl ClockInput {
    pub fn new(hour: &str, minute: &str, meridiem: Meridiem) -> Self {
        Self {
            hour: hour.to_string(),
            minute: minute.to_string(),
            meridiem,
        }
    }

    fn from_time(time: NaiveTime) -> Self {
        let hour = match time.hour() % 12 {
            0 => 12,
            h => h,
        };
        Self {
            hour: format!("{hour:02}"),
            minute: format!("{:02}", time.minute()),
            meridiem: if time.hour() >= 12 { Meridiem::Pm } else { Meridiem::Am },
        }
    }

    /// Blank minutes read as `00`.
    pub fn to_time(&self) -> Result<NaiveTime, ValidationError> {
        let minute = match self.minute.trim() {
            "" => 0,
            m => m
                .parse::<u32>()
                .ok()
                .filter(|m| *m <= 59)
                .ok_or(ValidationError::Minute)?,
        };
        let hour = self
            .hour
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|h| (1..=12).contains(h))
            .ok_or(ValidationError::Hour)?;

        let hour24 = match (self.meridiem, hour) {
            (Meridiem::Am, 12) => 0,
            (Meridiem::Am, h) => h,
            (Meridiem::Pm, 12) => 12,
            (Meridiem::Pm, h) => h + 12,
        };
        NaiveTime::from_hms_opt(hour24, minute, 0).ok_or(ValidationError::Hour)
    }
}

/// Fields of the create/edit event form.
#[derive(Debug, Clone)]
pub struct EventFormState {
    pub title: String,
    pub description: String,
    pub department: String,
    pub category: String,
    pub location: String,
    pub start_date: String,
    pub end_date: String,
    pub start: ClockInput,
    pub end: ClockInput,
    pub tags: Vec<String>,
    pub background_image: Option<String>,
}

impl EventFormState {
    pub fn new(date: NaiveDate) -> Self {
        let date = date.format("%Y-%m-%d").to_string();
        Self {
            title: String::new(),
            description: String::new(),
            department: String::new(),
            category: String::new(),
            location: String::new(),
            start_date: date.clone(),
            end_date: date,
            start: ClockInput::new("12", "00", Meridiem::Am),
            end: ClockInput::new("12", "00", Meridiem::Pm),
            tags: Vec::new(),
            background_image: None,
        }
    }

    /// Prefills the form for editing, with times shown in `tz`.
    pub fn from_event<Tz: TimeZone>(event: &CampusEvent, tz: &Tz) -> Self {
        let today = Utc::now().with_timezone(tz).date_naive();
        let mut form = Self::new(today);
        form.title = event.title.clone();
        form.description = event.description.clone();
        form.department = event.department.clone();
        form.category = event.category.clone();
        form.location = event.location.clone();
        form.tags = event.tags.clone();
        form.background_image = event.background_image.clone();

        if let Some(schedule) = event.schedules.first() {
            let start = schedule.start.with_timezone(tz);
            let end = schedule.end.with_timezone(tz);
            form.start_date = start.date_naive().format("%Y-%m-%d").to_string();
            form.end_date = end.date_naive().format("%Y-%m-%d").to_string();
            form.start = ClockInput::from_time(start.time());
            form.end = ClockInput::from_time(end.time());
        }
        form
    }

    pub fn parsed_start_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(self.start_date.trim(), "%Y-%m-%d").ok()
    }

    pub fn parsed_end_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(self.end_date.trim(), "%Y-%m-%d").ok()
    }

    /// Validates the form and builds the request body. Dates and times are
    /// read in `tz`; `timezone_label` is what the server stores alongside.
    pub fn to_draft<Tz: TimeZone>(
        &self,
        tz: &Tz,
        timezone_label: &str,
        organizer_id: &str,
    ) -> Result<EventDraft, ValidationError> {
        let title = required(&self.title, "Event title")?;
        let department = required(&self.department, "Institute")?;
        let category = required(&self.category, "Category")?;
        let location = required(&self.location, "Location")?;
        required(&self.start_date, "Start date")?;
        required(&self.end_date, "End date")?;

        if department != BROADCAST_INSTITUTE && !is_known_institute(department) {
            return Err(ValidationError::Institute(department.to_string()));
        }

        let start_time = self.start.to_time()?;
        let end_time = self.end.to_time()?;
        let start = combine(self.parsed_start_date(), start_time, tz)
            .ok_or(ValidationError::DateTime("start"))?;
        let end = combine(self.parsed_end_date(), end_time, tz)
            .ok_or(ValidationError::DateTime("end"))?;
        if end <= start {
            return Err(ValidationError::EndNotAfterStart);
        }

        let description = self.description.trim();
        Ok(EventDraft {
            title: title.to_string(),
            description: (!description.is_empty()).then(|| description.to_string()),
            department_id: department.to_string(),
            category: category.to_string(),
            location: location.to_string(),
            organizer_id: organizer_id.to_string(),
            schedules: vec![Schedule {
                start,
                end,
                timezone: timezone_label.to_string(),
            }],
            tags: self.tags.clone(),
            background_image: self.background_image.clone().filter(|s| !s.is_empty()),
        })
    }

    pub fn is_valid<Tz: TimeZone>(&self, tz: &Tz) -> bool {
        self.to_draft(tz, "", "").is_ok()
    }
}

fn required<'a>(value: &'a str, field: &'static str) -> Result<&'a str, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        Err(ValidationError::Required(field))
    } else {
        Ok(value)
    }
}

fn combine<Tz: TimeZone>(date: Option<NaiveDate>, time: NaiveTime, tz: &Tz) -> Option<DateTime<Utc>> {
    let local = date?.and_time(time);
    tz.from_local_datetime(&local)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

#[derive(Debug, Clone, Default)]
pub struct RegistrationForm {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub first_name: String,
    pub last_name: String,
    pub institute: String,
    pub phone_number: String,
}

impl RegistrationForm {
    /// Self-registration always creates a student.
    pub fn validate(&self) -> Result<Registration, ValidationError> {
        let email = required(&self.email, "Email")?;
        let first_name = required(&self.first_name, "First name")?;
        let last_name = required(&self.last_name, "Last name")?;

        if self.password != self.confirm_password {
            return Err(ValidationError::PasswordMismatch);
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ValidationError::PasswordTooShort(MIN_PASSWORD_LEN));
        }

        let phone = self.phone_number.trim();
        if !phone.is_empty() && !RE_PHONE.is_match(phone) {
            return Err(ValidationError::Phone);
        }

        let institute = required(&self.institute, "Institute")?;
        if !is_known_institute(institute) {
            return Err(ValidationError::Institute(institute.to_string()));
        }

        Ok(Registration {
            email: email.to_string(),
            password: self.password.clone(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            role: Role::Student,
            institute: Some(institute.to_string()),
            phone_number: (!phone.is_empty()).then(|| phone.to_string()),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct PasswordChangeForm {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

impl PasswordChangeForm {
    pub fn validate(&self) -> Result<PasswordChange, ValidationError> {
        if self.new_password != self.confirm_password {
            return Err(ValidationError::PasswordMismatch);
        }
        if self.new_password.chars().count() < MIN_NEW_PASSWORD_LEN {
            return Err(ValidationError::PasswordTooShort(MIN_NEW_PASSWORD_LEN));
        }
        Ok(PasswordChange {
            current_password: self.current_password.clone(),
            new_password: self.new_password.clone(),
        })
    }
}
