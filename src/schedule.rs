use crate::backend::{ActivityStore, Order, StoreError};
use crate::models::Activity;
use crate::notify::Notifier;
use crate::sequencing::{RequestTracker, Ticket};
use crate::session::{Session, SessionContext};
use crate::utils::format_slot_label;
use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use tracing::{debug, warn};

pub const FIRST_HOUR: u32 = 7;
pub const LAST_HOUR: u32 = 21;
/// Smallest rendered block, so short activities stay visible.
pub const MIN_BLOCK_HEIGHT: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Day,
    Week,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Prev,
    Next,
}

#[derive(Debug)]
pub struct Slot<'a> {
    pub hour: u32,
    pub label: String,
    pub activities: Vec<&'a Activity>,
}

/// `[00:00:00.000, 23:59:59.999]` of `date` in `tz`, as UTC instants.
pub fn day_bounds<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = date.and_time(NaiveTime::MIN);
    let end = date.and_time(NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN));
    (resolve_local(tz, start), resolve_local(tz, end))
}

fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(&naive).earliest() {
        Some(at) => at.with_timezone(&Utc),
        // Skipped by a DST transition; use the wall clock as UTC.
        None => Utc.from_utc_datetime(&naive),
    }
}

/// Buckets activities into the fifteen hourly slots by local start hour.
/// Activities starting before 7 AM or after 9 PM appear in no slot.
pub fn slots<'a, Tz: TimeZone>(activities: &'a [Activity], tz: &Tz) -> Vec<Slot<'a>> {
    (FIRST_HOUR..=LAST_HOUR)
        .map(|hour| Slot {
            hour,
            label: format_slot_label(hour),
            activities: activities
                .iter()
                .filter(|a| a.start_time.with_timezone(tz).hour() == hour)
                .collect(),
        })
        .collect()
}

/// Display height: one unit per minute of the start/end span, floored at `MIN_BLOCK_HEIGHT`.
pub fn block_height(activity: &Activity) -> f64 {
    let hours = (activity.end_time - activity.start_time).num_milliseconds() as f64 / 3_600_000.0;
    (hours * 60.0).max(MIN_BLOCK_HEIGHT)
}

pub fn step_date(date: NaiveDate, mode: ViewMode, step: Step) -> NaiveDate {
    let days = Days::new(match mode {
        ViewMode::Day => 1,
        ViewMode::Week => 7,
    });
    let moved = match step {
        Step::Prev => date.checked_sub_days(days),
        Step::Next => date.checked_add_days(days),
    };
    moved.unwrap_or(date)
}

/// e.g. `Monday, March 4`.
pub fn heading(date: NaiveDate) -> String {
    date.format("%A, %B %-d").to_string()
}

pub fn fetch_day<Tz: TimeZone>(
    store: &dyn ActivityStore,
    session: &Session,
    date: NaiveDate,
    tz: &Tz,
) -> Result<Vec<Activity>, StoreError> {
    let (from, to) = day_bounds(date, tz);
    store.activities_between(session, from, to, Order::Ascending)
}

pub struct ScheduleView {
    date: NaiveDate,
    mode: ViewMode,
    activities: Vec<Activity>,
    tracker: RequestTracker,
}

impl ScheduleView {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            date: today,
            mode: ViewMode::Day,
            activities: Vec::new(),
            tracker: RequestTracker::default(),
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ViewMode) {
        self.mode = mode;
    }

    pub fn activities(&self) -> &[Activity] {
        &self.activities
    }

    pub fn is_loading(&self) -> bool {
        self.tracker.is_loading()
    }

    /// Moves the selected date; the caller re-fetches for the new date.
    pub fn navigate(&mut self, step: Step) -> NaiveDate {
        self.date = step_date(self.date, self.mode, step);
        self.date
    }

    pub fn begin_refresh(&mut self) -> (Ticket, NaiveDate) {
        (self.tracker.issue(), self.date)
    }

    pub fn complete(
        &mut self,
        ticket: Ticket,
        result: Result<Vec<Activity>, StoreError>,
        notifier: &mut Notifier,
    ) {
        match result {
            Ok(activities) => {
                if self.tracker.accept(ticket) {
                    debug!(date = %self.date, count = activities.len(), "schedule loaded");
                    self.activities = activities;
                }
            }
            Err(err) => {
                warn!(error = %err, "error fetching activities");
                if self.tracker.fail(ticket) {
                    notifier.error("Failed to load activities");
                }
            }
        }
    }

    pub fn refresh<Tz: TimeZone>(
        &mut self,
        store: &dyn ActivityStore,
        context: &SessionContext,
        tz: &Tz,
        notifier: &mut Notifier,
    ) {
        let session = match context.current() {
            Ok(session) => session,
            Err(err) => {
                notifier.error(err.to_string());
                return;
            }
        };
        let (ticket, date) = self.begin_refresh();
        let result = fetch_day(store, session, date, tz);
        self.complete(ticket, result, notifier);
    }
}
