//! Which events a user may see.
//!
//! Events are posted either to one institute or to
//! [`BROADCAST_INSTITUTE`](crate::campus::BROADCAST_INSTITUTE).
//! Students see their own institute's events plus broadcasts; admins see
//! everything; nobody signed in sees nothing.

use crate::campus::{CampusEvent, EventStatus, User};

pub fn is_visible_to(event: &CampusEvent, user: &User) -> bool {
    if user.is_admin() {
        return true;
    }
    event.is_broadcast()
        || user.institute.as_deref() == Some(event.department.as_str())
}

/// Keeps the events visible to `user`, in their original order.
pub fn filter_events_by_institute<'a, I>(events: I, user: Option<&User>) -> Vec<&'a CampusEvent>
where
    I: IntoIterator<Item = &'a CampusEvent>,
{
    let Some(user) = user else {
        return Vec::new();
    };
    events
        .into_iter()
        .filter(|event| is_visible_to(event, user))
        .collect()
}

/// Approved events visible to `user`: what every student-facing list starts from.
pub fn approved_for<'a, I>(events: I, user: Option<&User>) -> Vec<&'a CampusEvent>
where
    I: IntoIterator<Item = &'a CampusEvent>,
{
    filter_events_by_institute(
        events
            .into_iter()
            .filter(|event| event.status == EventStatus::Approved),
        user,
    )
}

/// Calendar listing: students get approved events only, admins every status.
pub fn calendar_for<'a, I>(events: I, user: Option<&User>) -> Vec<&'a CampusEvent>
where
    I: IntoIterator<Item = &'a CampusEvent>,
{
    match user {
        Some(u) if u.is_student() => approved_for(events, user),
        _ => filter_events_by_institute(events, user),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campus::Role;

    fn event(id: &str, department: &str, status: EventStatus) -> CampusEvent {
        CampusEvent {
            id: id.into(),
            title: format!("Event {id}"),
            description: String::new(),
            department: department.into(),
            category: "General".into(),
            location: "TBD".into(),
            status,
            tags: vec![],
            capacity: 0,
            reserved: 0,
            schedules: vec![],
            background_image: None,
        }
    }

    fn user(role: Role, institute: Option<&str>) -> User {
        User {
            id: "u1".into(),
            email: "u1@campus.edu".into(),
            role,
            name: "U One".into(),
            institute: institute.map(str::to_string),
            phone_number: None,
        }
    }

    fn ids(events: &[&CampusEvent]) -> Vec<String> {
        events.iter().map(|e| e.id.clone()).collect()
    }

    #[test]
    fn student_sees_own_institute_and_broadcasts() {
        let events = vec![
            event("1", "FCDSET", EventStatus::Approved),
            event("2", "FBGM", EventStatus::Approved),
            event("3", "ALL", EventStatus::Approved),
        ];
        let student = user(Role::Student, Some("FCDSET"));

        let visible = filter_events_by_institute(&events, Some(&student));
        assert_eq!(ids(&visible), ["1", "3"]);
    }

    #[test]
    fn admin_sees_everything_unchanged() {
        let events = vec![
            event("1", "FNAHS", EventStatus::Draft),
            event("2", "Unknown", EventStatus::Rejected),
            event("3", "ALL", EventStatus::Approved),
        ];
        let admin = user(Role::Admin, None);

        let visible = filter_events_by_institute(&events, Some(&admin));
        assert_eq!(ids(&visible), ["1", "2", "3"]);
    }

    #[test]
    fn nobody_signed_in_sees_nothing() {
        let events = vec![event("1", "ALL", EventStatus::Approved)];
        assert!(filter_events_by_institute(&events, None).is_empty());
    }

    #[test]
    fn institute_match_is_case_sensitive() {
        let events = vec![event("1", "fcdset", EventStatus::Approved)];
        let student = user(Role::Student, Some("FCDSET"));
        assert!(filter_events_by_institute(&events, Some(&student)).is_empty());
    }

    #[test]
    fn student_without_institute_only_sees_broadcasts() {
        let events = vec![
            event("1", "FALS", EventStatus::Approved),
            event("2", "ALL", EventStatus::Approved),
        ];
        let student = user(Role::Student, None);
        assert_eq!(ids(&filter_events_by_institute(&events, Some(&student))), ["2"]);
    }

    #[test]
    fn filtering_twice_gives_the_same_result() {
        let events = vec![
            event("1", "FBGM", EventStatus::Approved),
            event("2", "FCDSET", EventStatus::Approved),
            event("3", "ALL", EventStatus::Approved),
        ];
        let student = user(Role::Student, Some("FBGM"));

        let once = filter_events_by_institute(&events, Some(&student));
        let twice = filter_events_by_institute(once.iter().copied(), Some(&student));
        assert_eq!(once, twice);
        assert_eq!(once, filter_events_by_institute(&events, Some(&student)));
    }

    #[test]
    fn calendar_hides_unapproved_events_from_students_only() {
        let events = vec![
            event("1", "FBGM", EventStatus::Pending),
            event("2", "FBGM", EventStatus::Approved),
        ];
        let student = user(Role::Student, Some("FBGM"));
        let admin = user(Role::Admin, None);

        assert_eq!(ids(&calendar_for(&events, Some(&student))), ["2"]);
        assert_eq!(ids(&calendar_for(&events, Some(&admin))), ["1", "2"]);
    }
}
