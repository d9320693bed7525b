use std::collections::HashSet;

use chrono::{DateTime, Datelike, Duration, FixedOffset, Local, NaiveDate, Offset, Utc};
use tracing::{error, info};

use crate::calendar::{self, RangeFilter};
use crate::campus::review::rank_by_activity;
use crate::campus::{CampusApi, CampusEvent, Comment, EventStatus, ReviewedEvent, User};
use crate::error::{Error, Result};
use crate::form::{EventFormState, PasswordChangeForm};
use crate::notify::{self, Bell, Notification};
use crate::reaction::ReviewView;
use crate::session::Session;
use crate::visibility;

/// Everything one signed-in user looks at: the fetched events, the calendar
/// selection and the notification bell.
///
/// Refreshes that fail are logged and keep whatever was loaded before.
pub struct App<A> {
    api: A,
    pub session: Session,
    pub events: Vec<CampusEvent>,
    pub selected_date: NaiveDate,
    pub today: NaiveDate,
    pub days_with_events: HashSet<u32>,
    pub range: RangeFilter,
    pub bell: Bell,
    offset: FixedOffset,
    timezone_label: String,
}

impl<A: CampusApi> App<A> {
    pub fn new(api: A, session: Session, timezone_label: impl Into<String>) -> Self {
        let offset = Local::now().offset().fix();
        Self::with_offset(api, session, timezone_label, offset)
    }

    /// Like [`App::new`] but with calendar dates computed at a fixed offset.
    pub fn with_offset(
        api: A,
        session: Session,
        timezone_label: impl Into<String>,
        offset: FixedOffset,
    ) -> Self {
        let today = Utc::now().with_timezone(&offset).date_naive();
        Self {
            api,
            session,
            events: Vec::new(),
            selected_date: today,
            today,
            days_with_events: HashSet::new(),
            range: RangeFilter::default(),
            bell: Bell::default(),
            offset,
            timezone_label: timezone_label.into(),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn user(&self) -> Option<&User> {
        self.session.user()
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Verifies the stored token. Returns whether someone is signed in.
    pub async fn restore(&mut self) -> Result<bool> {
        let user = self.session.refresh(&self.api).await?;
        Ok(user.is_some())
    }

    pub async fn sign_in(&mut self, email: &str, password: &str) -> Result<()> {
        self.session.login(&self.api, email, password).await?;
        Ok(())
    }

    pub fn sign_out(&mut self) -> Result<()> {
        self.session.clear()?;
        self.events.clear();
        self.days_with_events.clear();
        self.bell = Bell::default();
        info!("Signed out");
        Ok(())
    }

    /// Re-fetches every event. Returns false, keeping the old list, on failure.
    pub async fn refresh_events(&mut self) -> bool {
        let Some(bearer) = self.session.bearer() else {
            return false;
        };
        match self.api.events(&bearer).await {
            Ok(events) => {
                info!("Loaded {} events", events.len());
                self.events = events;
                self.recount_days();
                true
            }
            Err(e) => {
                error!("Failed to refresh events: {e}");
                false
            }
        }
    }

    /// Re-reads one event. An event the server no longer has is dropped locally.
    pub async fn reload_event(&mut self, event_id: &str) -> Result<&CampusEvent> {
        let (bearer, _) = self.session.require()?;
        let fetched = match self.api.event(&bearer, event_id).await {
            Ok(event) => event,
            Err(Error::NotFound) => {
                self.events.retain(|e| e.id != event_id);
                self.recount_days();
                return Err(Error::NotFound);
            }
            Err(e) => return Err(e),
        };

        let index = match self.events.iter().position(|e| e.id == event_id) {
            Some(i) => {
                self.events[i] = fetched;
                i
            }
            None => {
                self.events.push(fetched);
                self.events.len() - 1
            }
        };
        self.recount_days();
        Ok(&self.events[index])
    }

    /// Approved events the user may see.
    pub fn visible_events(&self) -> Vec<&CampusEvent> {
        visibility::approved_for(&self.events, self.user())
    }

    /// Calendar events: approved only for students, every status for admins.
    pub fn calendar_events(&self) -> Vec<&CampusEvent> {
        visibility::calendar_for(&self.events, self.user())
    }

    pub fn day_events(&self) -> Vec<&CampusEvent> {
        calendar::group_by_date(self.calendar_events(), &self.offset)
            .remove(&self.selected_date)
            .unwrap_or_default()
    }

    /// The notifications page.
    pub fn upcoming(&self, now: DateTime<Utc>) -> Vec<&CampusEvent> {
        notify::upcoming_notifications(self.visible_events(), now)
    }

    /// Dashboard list: the week ahead for students, the range filter for admins.
    pub fn dashboard(&self, now: DateTime<Utc>) -> Vec<&CampusEvent> {
        match self.user() {
            Some(user) if user.is_admin() => {
                let mut events = self.range.apply(&self.events, &now.with_timezone(&self.offset));
                events.sort_by_key(|e| e.starts_at());
                events
            }
            _ => notify::dashboard_upcoming(self.visible_events(), now),
        }
    }

    /// Rebuilds the bell. Students are told about urgent events, admins about
    /// new comments. Returns the notifications not seen on the previous call.
    pub async fn refresh_notifications(&mut self, now: DateTime<Utc>) -> Vec<Notification> {
        let Ok((bearer, user)) = self.session.require() else {
            return Vec::new();
        };

        let items = if user.is_admin() {
            match self.api.reviews(&bearer).await {
                Ok(reviews) => notify::comment_notifications(&reviews, &self.events),
                Err(e) => {
                    error!("Failed to load reviews: {e}");
                    return Vec::new();
                }
            }
        } else {
            notify::event_notifications(self.visible_events(), now)
        };
        self.bell.replace(items)
    }

    pub fn mark_read(&mut self, notification_id: &str) {
        self.bell.mark_read(notification_id);
    }

    pub async fn create_event(&mut self, form: &EventFormState) -> Result<CampusEvent> {
        let (bearer, user) = self.session.require()?;
        let draft = form.to_draft(&self.offset, &self.timezone_label, &user.id)?;

        let created = self.api.create_event(&bearer, &draft).await?;
        info!("Created event {} ({})", created.title, created.id);
        self.events.push(created.clone());
        self.recount_days();
        Ok(created)
    }

    /// Saves the edit, then re-reads the event so the list shows the server's copy.
    pub async fn update_event(&mut self, event_id: &str, form: &EventFormState) -> Result<()> {
        let (bearer, user) = self.session.require()?;
        let draft = form.to_draft(&self.offset, &self.timezone_label, &user.id)?;

        self.api.update_event(&bearer, event_id, &draft).await?;
        info!("Updated event {event_id}");
        if let Err(e) = self.reload_event(event_id).await {
            error!("Failed to reload event {event_id}: {e}");
        }
        Ok(())
    }

    pub async fn delete_event(&mut self, event_id: &str) -> Result<()> {
        let (bearer, _) = self.session.require()?;
        self.api.delete_event(&bearer, event_id).await?;
        info!("Deleted event {event_id}");
        self.events.retain(|e| e.id != event_id);
        self.recount_days();
        Ok(())
    }

    pub async fn set_status(&mut self, event_id: &str, status: EventStatus) -> Result<()> {
        let (bearer, _) = self.session.require()?;
        self.api.set_event_status(&bearer, event_id, status).await?;
        info!("Event {event_id} is now {status}");
        if let Some(event) = self.events.iter_mut().find(|e| e.id == event_id) {
            event.status = status;
        }
        self.recount_days();
        Ok(())
    }

    /// Form prefilled from a loaded event, in this app's timezone.
    pub fn edit_form(&self, event_id: &str) -> Result<EventFormState> {
        self.events
            .iter()
            .find(|e| e.id == event_id)
            .map(|e| EventFormState::from_event(e, &self.offset))
            .ok_or(Error::NotFound)
    }

    pub fn new_event_form(&self) -> EventFormState {
        EventFormState::new(self.selected_date)
    }

    pub async fn open_review(&self, event_id: &str) -> Result<ReviewView> {
        let (bearer, user) = self.session.require()?;
        Ok(ReviewView::load(&self.api, &bearer, event_id, &user.id).await)
    }

    pub async fn toggle_like(&self, view: &mut ReviewView) -> Result<()> {
        let (bearer, user) = self.session.require()?;
        view.toggle_like(&self.api, &bearer, &user.id).await
    }

    pub async fn toggle_dislike(&self, view: &mut ReviewView) -> Result<()> {
        let (bearer, user) = self.session.require()?;
        view.toggle_dislike(&self.api, &bearer, &user.id).await
    }

    pub async fn refresh_comments(&self, view: &mut ReviewView) -> Result<()> {
        let (bearer, _) = self.session.require()?;
        view.refresh_comments(&self.api, &bearer).await
    }

    pub async fn comment(&self, view: &mut ReviewView, text: &str) -> Result<Comment> {
        let (bearer, user) = self.session.require()?;
        view.submit_comment(&self.api, &bearer, &user.id, &user.name, text)
            .await
    }

    /// Events with their reviews, most discussed first.
    pub async fn review_analytics(&self) -> Result<Vec<ReviewedEvent>> {
        let (bearer, _) = self.session.require()?;
        let reviews = self.api.reviews(&bearer).await?;
        Ok(rank_by_activity(self.events.clone(), &reviews))
    }

    pub async fn change_password(&self, form: &PasswordChangeForm) -> Result<()> {
        self.session.change_password(&self.api, form).await
    }

    pub fn next_day(&mut self) {
        self.selected_date = self.selected_date.succ_opt().unwrap_or(self.selected_date);
        self.on_date_changed();
    }

    pub fn prev_day(&mut self) {
        self.selected_date = self.selected_date.pred_opt().unwrap_or(self.selected_date);
        self.on_date_changed();
    }

    pub fn next_week(&mut self) {
        self.selected_date += Duration::weeks(1);
        self.on_date_changed();
    }

    pub fn prev_week(&mut self) {
        self.selected_date -= Duration::weeks(1);
        self.on_date_changed();
    }

    pub fn next_month(&mut self) {
        self.selected_date = calendar::move_by_months(self.selected_date, 1);
        self.on_date_changed();
    }

    pub fn prev_month(&mut self) {
        self.selected_date = calendar::move_by_months(self.selected_date, -1);
        self.on_date_changed();
    }

    pub fn go_to_today(&mut self) {
        self.today = Utc::now().with_timezone(&self.offset).date_naive();
        self.selected_date = self.today;
        self.on_date_changed();
    }

    pub fn select_date(&mut self, date: NaiveDate) {
        self.selected_date = date;
        self.on_date_changed();
    }

    fn on_date_changed(&mut self) {
        self.recount_days();
    }

    fn recount_days(&mut self) {
        let (year, month) = (self.selected_date.year(), self.selected_date.month());
        self.days_with_events =
            calendar::days_with_events(self.calendar_events(), year, month, &self.offset);
    }
}
