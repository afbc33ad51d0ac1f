//! Activity intake form.
//!
//! Holds one draft, checks the required fields, composes the insert row and
//! submits it once. Other views are not touched; callers re-query after a
//! successful submit.

use crate::backend::{ActivityStore, StoreError};
use crate::models::{Category, Level, NewActivity, User};
use crate::notify::Notifier;
use crate::session::{Session, SessionContext};
use crate::utils::round_half_up;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use std::fmt::Display;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Category,
    Date,
    StartTime,
    EndTime,
    Description,
    Energy,
    Focus,
}

impl Field {
    pub const ALL: [Field; 8] = [
        Field::Title,
        Field::Category,
        Field::Date,
        Field::StartTime,
        Field::EndTime,
        Field::Description,
        Field::Energy,
        Field::Focus,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Field::Title => "Activity Title",
            Field::Category => "Category",
            Field::Date => "Date",
            Field::StartTime => "Start Time",
            Field::EndTime => "End Time",
            Field::Description => "Description",
            Field::Energy => "Energy Level",
            Field::Focus => "Focus Level",
        }
    }

    fn offset(&self, by: isize) -> Field {
        let len = Self::ALL.len() as isize;
        let idx = Self::ALL.iter().position(|f| f == self).unwrap_or(0) as isize;
        Self::ALL[((idx + by).rem_euclid(len)) as usize]
    }

    /// Fields edited by cycling through a closed set rather than typing.
    pub fn is_choice(&self) -> bool {
        matches!(self, Field::Category | Field::Energy | Field::Focus)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum FormError {
    #[error("Please fill in: {}", .0.iter().map(|f| f.label()).collect::<Vec<_>>().join(", "))]
    Missing(Vec<Field>),

    #[error("Invalid date '{0}' (expected YYYY-MM-DD)")]
    InvalidDate(String),

    #[error("Invalid time '{0}' (expected HH:MM)")]
    InvalidTime(String),

    #[error("{0} does not exist in the local time zone")]
    NonexistentLocalTime(NaiveDateTime),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Inserted; the caller should re-fetch.
    Submitted,
    /// Draft did not pass validation; nothing was sent.
    Invalid,
    /// The backend refused or could not be reached; the form stays open.
    Failed,
    /// An earlier submit of this draft has not come back yet.
    Pending,
}

#[derive(Debug, Clone)]
pub struct ActivityForm {
    pub title: String,
    pub category: Category,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub description: String,
    pub energy: Level,
    pub focus: Level,
    open: bool,
    submitting: bool,
    focused: Field,
}

impl ActivityForm {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            title: String::new(),
            category: Category::default(),
            date: today.format("%Y-%m-%d").to_string(),
            start_time: String::new(),
            end_time: String::new(),
            description: String::new(),
            energy: Level::default(),
            focus: Level::default(),
            open: false,
            submitting: false,
            focused: Field::Title,
        }
    }

    /// Opens with a fresh draft dated `today`.
    pub fn open(&mut self, today: NaiveDate) {
        *self = Self::new(today);
        self.open = true;
    }

    pub fn close(&mut self) {
        self.open = false;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn focused(&self) -> Field {
        self.focused
    }

    pub fn focus_next(&mut self) {
        self.focused = self.focused.offset(1);
    }

    pub fn focus_prev(&mut self) {
        self.focused = self.focused.offset(-1);
    }

    pub fn value(&self, field: Field) -> String {
        match field {
            Field::Title => self.title.clone(),
            Field::Category => self.category.label().to_string(),
            Field::Date => self.date.clone(),
            Field::StartTime => self.start_time.clone(),
            Field::EndTime => self.end_time.clone(),
            Field::Description => self.description.clone(),
            Field::Energy => self.energy.to_string(),
            Field::Focus => self.focus.to_string(),
        }
    }

    fn text_mut(&mut self, field: Field) -> Option<&mut String> {
        match field {
            Field::Title => Some(&mut self.title),
            Field::Date => Some(&mut self.date),
            Field::StartTime => Some(&mut self.start_time),
            Field::EndTime => Some(&mut self.end_time),
            Field::Description => Some(&mut self.description),
            Field::Category | Field::Energy | Field::Focus => None,
        }
    }

    pub fn input_char(&mut self, c: char) {
        let field = self.focused;
        if field.is_choice() {
            if c == ' ' {
                self.cycle();
            }
            return;
        }
        if let Some(text) = self.text_mut(field) {
            text.push(c);
        }
    }

    pub fn backspace(&mut self) {
        let field = self.focused;
        if let Some(text) = self.text_mut(field) {
            text.pop();
        }
    }

    /// Advances the focused choice field to its next value.
    pub fn cycle(&mut self) {
        match self.focused {
            Field::Category => self.category = self.category.next(),
            Field::Energy => self.energy = self.energy.next(),
            Field::Focus => self.focus = self.focus.next(),
            _ => {}
        }
    }

    /// Required fields that are still empty.
    pub fn validate(&self) -> Vec<Field> {
        let mut missing = Vec::new();
        if self.title.trim().is_empty() {
            missing.push(Field::Title);
        }
        if self.date.trim().is_empty() {
            missing.push(Field::Date);
        }
        if self.start_time.trim().is_empty() {
            missing.push(Field::StartTime);
        }
        if self.end_time.trim().is_empty() {
            missing.push(Field::EndTime);
        }
        missing
    }

    pub fn compose<Tz>(&self, user: &User, tz: &Tz) -> Result<NewActivity, FormError>
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        let missing = self.validate();
        if !missing.is_empty() {
            return Err(FormError::Missing(missing));
        }

        let date = NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d")
            .map_err(|_| FormError::InvalidDate(self.date.clone()))?;
        let start = local_at(tz, date, &self.start_time)?;
        let end = local_at(tz, date, &self.end_time)?;

        let duration_minutes = duration_minutes(&start, &end);
        if duration_minutes < 0 {
            // Accepted as entered; the row carries a negative duration.
            warn!(
                start = %self.start_time,
                end = %self.end_time,
                duration_minutes,
                "activity ends before it starts"
            );
        }

        Ok(NewActivity {
            user_id: user.id.clone(),
            title: self.title.clone(),
            category: self.category,
            start_time: start.to_rfc3339(),
            end_time: end.to_rfc3339(),
            description: self.description.clone(),
            energy_level: self.energy,
            focus_level: self.focus,
            duration_minutes,
        })
    }

    /// Validates the draft and marks the form as submitting. Returns the row to
    /// insert, or the outcome when nothing should be sent.
    pub fn prepare<Tz>(
        &mut self,
        context: &SessionContext,
        tz: &Tz,
        notifier: &mut Notifier,
    ) -> Result<(Session, NewActivity), SubmitOutcome>
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        if self.submitting {
            return Err(SubmitOutcome::Pending);
        }
        let session = match context.current() {
            Ok(session) => session.clone(),
            Err(err) => {
                notifier.error(err.to_string());
                return Err(SubmitOutcome::Failed);
            }
        };

        let row = match self.compose(&session.user, tz) {
            Ok(row) => row,
            Err(err) => {
                notifier.error(err.to_string());
                return Err(SubmitOutcome::Invalid);
            }
        };

        self.submitting = true;
        Ok((session, row))
    }

    /// Applies the insert result. The form closes only if this draft is still
    /// the one being submitted.
    pub fn finish(
        &mut self,
        row: &NewActivity,
        result: Result<(), StoreError>,
        notifier: &mut Notifier,
    ) -> SubmitOutcome {
        let pending = std::mem::replace(&mut self.submitting, false);
        match result {
            Ok(()) => {
                info!(title = %row.title, category = %row.category, "activity added");
                notifier.success("Activity added successfully!");
                if pending {
                    self.close();
                }
                SubmitOutcome::Submitted
            }
            Err(err) => {
                error!(error = %err, "error adding activity");
                notifier.error("Failed to add activity. Please try again.");
                SubmitOutcome::Failed
            }
        }
    }

    /// Prepares, inserts and finishes in one blocking step.
    pub fn submit<Tz>(
        &mut self,
        store: &dyn ActivityStore,
        context: &SessionContext,
        tz: &Tz,
        notifier: &mut Notifier,
    ) -> SubmitOutcome
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        match self.prepare(context, tz, notifier) {
            Ok((session, row)) => {
                let result = store.insert(&session, &row);
                self.finish(&row, result, notifier)
            }
            Err(outcome) => outcome,
        }
    }
}

pub fn parse_time(value: &str) -> Result<NaiveTime, FormError> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| FormError::InvalidTime(value.to_string()))
}

fn local_at<Tz: TimeZone>(tz: &Tz, date: NaiveDate, time: &str) -> Result<DateTime<Tz>, FormError> {
    let naive = date.and_time(parse_time(time)?);
    tz.from_local_datetime(&naive)
        .earliest()
        .ok_or(FormError::NonexistentLocalTime(naive))
}

/// `round((end - start) / 60000ms)`; negative when `end` precedes `start`.
pub fn duration_minutes<Tz: TimeZone>(start: &DateTime<Tz>, end: &DateTime<Tz>) -> i64 {
    let millis = end.clone().signed_duration_since(start.clone()).num_milliseconds();
    round_half_up(millis as f64 / 60_000.0) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryStore;
    use crate::notify::NoticeLevel;
    use crate::stats::tests::session;
    use chrono::{FixedOffset, Utc};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
    }

    fn filled() -> ActivityForm {
        let mut form = ActivityForm::new(today());
        form.open(today());
        form.title = "Deep work session".into();
        form.start_time = "09:00".into();
        form.end_time = "10:30".into();
        form
    }

    fn user() -> User {
        User {
            id: "u1".into(),
            email: None,
            name: None,
        }
    }

    #[test]
    fn test_defaults() {
        let form = ActivityForm::new(today());
        assert_eq!(form.category, Category::Work);
        assert_eq!(form.energy, Level::Medium);
        assert_eq!(form.focus, Level::Medium);
        assert_eq!(form.date, "2024-03-04");
        assert!(!form.is_open());
    }

    #[test]
    fn test_duration_from_times() {
        let row = filled().compose(&user(), &Utc).unwrap();
        assert_eq!(row.duration_minutes, 90);
        assert_eq!(row.user_id, "u1");
        assert_eq!(row.start_time, "2024-03-04T09:00:00+00:00");
        assert_eq!(row.end_time, "2024-03-04T10:30:00+00:00");
    }

    #[test]
    fn test_times_carry_local_offset() {
        let tz = FixedOffset::east_opt(5 * 3600 + 1800).unwrap();
        let row = filled().compose(&user(), &tz).unwrap();
        assert_eq!(row.start_time, "2024-03-04T09:00:00+05:30");
        assert_eq!(row.duration_minutes, 90);
    }

    #[test]
    fn test_end_before_start_gives_negative_duration() {
        // End before start is not rejected.
        let mut form = filled();
        form.start_time = "10:30".into();
        form.end_time = "09:00".into();
        let row = form.compose(&user(), &Utc).unwrap();
        assert_eq!(row.duration_minutes, -90);
    }

    #[test]
    fn test_missing_fields_are_listed() {
        let mut form = ActivityForm::new(today());
        form.title = "   ".into();
        form.start_time = "09:00".into();
        assert_eq!(form.validate(), vec![Field::Title, Field::EndTime]);
        assert!(matches!(
            form.compose(&user(), &Utc),
            Err(FormError::Missing(_))
        ));
    }

    #[test]
    fn test_bad_time_is_rejected() {
        let mut form = filled();
        form.start_time = "9am".into();
        assert_eq!(
            form.compose(&user(), &Utc),
            Err(FormError::InvalidTime("9am".into()))
        );
        assert!(parse_time("09:15:30").is_ok());
    }

    #[test]
    fn test_editing_and_cycling() {
        let mut form = ActivityForm::new(today());
        form.input_char('H');
        form.input_char('i');
        form.backspace();
        assert_eq!(form.title, "H");

        form.focus_next();
        assert_eq!(form.focused(), Field::Category);
        form.input_char(' ');
        assert_eq!(form.category, Category::Meeting);

        form.focus_prev();
        form.focus_prev();
        assert_eq!(form.focused(), Field::Focus);
        form.cycle();
        assert_eq!(form.focus, Level::High);
    }

    #[test]
    fn test_submit_success_closes_form() {
        let store = MemoryStore::default();
        let mut notifier = Notifier::default();
        let mut form = filled();

        let outcome = form.submit(&store, &session(), &Utc, &mut notifier);

        assert_eq!(outcome, SubmitOutcome::Submitted);
        assert!(!form.is_open());
        assert_eq!(store.inserted.lock().unwrap().len(), 1);
        assert_eq!(notifier.latest().unwrap().level, NoticeLevel::Success);
    }

    #[test]
    fn test_submit_failure_keeps_form_open() {
        let store = MemoryStore::default();
        store.set_failing(true);
        let mut notifier = Notifier::default();
        let mut form = filled();

        let outcome = form.submit(&store, &session(), &Utc, &mut notifier);

        assert_eq!(outcome, SubmitOutcome::Failed);
        assert!(form.is_open());
        assert!(!form.is_submitting());
        assert_eq!(form.title, "Deep work session");
        assert_eq!(
            notifier.latest().unwrap().message,
            "Failed to add activity. Please try again."
        );
    }

    #[test]
    fn test_invalid_draft_is_not_sent() {
        let store = MemoryStore::default();
        let mut notifier = Notifier::default();
        let mut form = ActivityForm::new(today());
        form.open(today());

        let outcome = form.submit(&store, &session(), &Utc, &mut notifier);

        assert_eq!(outcome, SubmitOutcome::Invalid);
        assert!(store.inserted.lock().unwrap().is_empty());
        assert!(form.is_open());
    }

    #[test]
    fn test_second_submit_while_pending_is_refused() {
        let mut notifier = Notifier::default();
        let mut form = filled();

        let (_, row) = form.prepare(&session(), &Utc, &mut notifier).unwrap();
        assert!(form.is_submitting());
        assert_eq!(
            form.prepare(&session(), &Utc, &mut notifier).unwrap_err(),
            SubmitOutcome::Pending
        );

        assert_eq!(form.finish(&row, Ok(()), &mut notifier), SubmitOutcome::Submitted);
        assert!(!form.is_submitting());
        assert!(!form.is_open());
    }

    #[test]
    fn test_late_result_does_not_close_reopened_form() {
        let mut notifier = Notifier::default();
        let mut form = filled();
        let (_, row) = form.prepare(&session(), &Utc, &mut notifier).unwrap();

        form.open(today());
        form.finish(&row, Ok(()), &mut notifier);

        assert!(form.is_open());
        assert_eq!(notifier.latest().unwrap().level, NoticeLevel::Success);
    }
}
