use crate::backend::{ActivityStore, Order, StoreError};
use crate::models::{Activity, Category, Level};
use crate::notify::Notifier;
use crate::sequencing::{RequestTracker, Ticket};
use crate::session::{Session, SessionContext};
use crate::utils::round_half_up;
use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use tracing::{info, warn};

pub const WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

#[derive(Default, Clone, Copy, Debug, PartialEq)]
pub struct DayScore {
    pub total: u32,
    pub count: u32,
}

impl DayScore {
    fn average(&self) -> Option<f64> {
        (self.count > 0).then(|| self.total as f64 / self.count as f64)
    }
}

/// Share of logged minutes per category, in the order categories were first seen.
#[derive(Default, Clone, Debug, PartialEq)]
pub struct TimeAllocation {
    pub categories: Vec<Category>,
    pub percentages: Vec<i64>,
}

impl TimeAllocation {
    pub fn entries(&self) -> impl Iterator<Item = (Category, i64)> + '_ {
        self.categories
            .iter()
            .copied()
            .zip(self.percentages.iter().copied())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct WeeklyProductivity {
    pub labels: [&'static str; 7],
    pub scores: [i64; 7],
}

impl Default for WeeklyProductivity {
    fn default() -> Self {
        Self {
            labels: WEEKDAYS,
            scores: [0; 7],
        }
    }
}

#[derive(Default, Clone, Debug, PartialEq)]
pub struct DashboardStats {
    pub productivity_score: i64,
    pub deep_work_hours: f64,
    pub distraction_events: u32,
    pub time_allocation: TimeAllocation,
    pub weekly_productivity: WeeklyProductivity,
}

/// The trailing seven days ending at `now`.
pub fn stats_window(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    (now - Duration::days(7), now)
}

pub fn calculate_stats<Tz: TimeZone>(activities: &[Activity], tz: &Tz) -> DashboardStats {
    let mut category_minutes: Vec<(Category, i64)> = Vec::new();
    let mut daily: [DayScore; 7] = [DayScore::default(); 7];
    let mut deep_work_minutes: i64 = 0;
    let mut distractions: u32 = 0;

    for activity in activities {
        let minutes = activity.duration_minutes;
        match category_minutes
            .iter_mut()
            .find(|(c, _)| *c == activity.category)
        {
            Some((_, total)) => *total += minutes,
            None => category_minutes.push((activity.category, minutes)),
        }

        if activity.category == Category::Work && activity.focus_level == Level::High {
            deep_work_minutes += minutes;
        }

        if activity.focus_level == Level::Low {
            distractions += 1;
        }

        let weekday = activity
            .start_time
            .with_timezone(tz)
            .weekday()
            .num_days_from_sunday() as usize;
        daily[weekday].total += activity.focus_level.productivity_score();
        daily[weekday].count += 1;
    }

    // Days without activities are left out of the mean rather than counted as zero.
    let day_averages: Vec<f64> = daily.iter().filter_map(DayScore::average).collect();
    let productivity_score = if day_averages.is_empty() {
        0
    } else {
        round_half_up(day_averages.iter().sum::<f64>() / day_averages.len() as f64) as i64
    };

    let total_minutes: i64 = category_minutes.iter().map(|(_, m)| m).sum();
    let time_allocation = TimeAllocation {
        categories: category_minutes.iter().map(|(c, _)| *c).collect(),
        percentages: category_minutes
            .iter()
            .map(|(_, m)| {
                if total_minutes == 0 {
                    0
                } else {
                    round_half_up(*m as f64 / total_minutes as f64 * 100.0) as i64
                }
            })
            .collect(),
    };

    let mut scores = [0i64; 7];
    for (slot, day) in scores.iter_mut().zip(daily.iter()) {
        *slot = day.average().map(|a| round_half_up(a) as i64).unwrap_or(0);
    }

    DashboardStats {
        productivity_score,
        deep_work_hours: round_half_up(deep_work_minutes as f64 / 60.0 * 10.0) / 10.0,
        distraction_events: distractions,
        time_allocation,
        weekly_productivity: WeeklyProductivity {
            labels: WEEKDAYS,
            scores,
        },
    }
}

/// One unordered fetch of the trailing window.
pub fn fetch_window(
    store: &dyn ActivityStore,
    session: &Session,
    now: DateTime<Utc>,
) -> Result<Vec<Activity>, StoreError> {
    let (from, to) = stats_window(now);
    store.activities_between(session, from, to, Order::Unordered)
}

/// Dashboard statistics as currently displayed.
///
/// A failed refresh keeps the previous numbers on screen.
#[derive(Default)]
pub struct StatsView {
    stats: DashboardStats,
    tracker: RequestTracker,
}

impl StatsView {
    pub fn stats(&self) -> &DashboardStats {
        &self.stats
    }

    pub fn is_loading(&self) -> bool {
        self.tracker.is_loading()
    }

    pub fn begin_refresh(&mut self) -> Ticket {
        self.tracker.issue()
    }

    pub fn complete<Tz: TimeZone>(
        &mut self,
        ticket: Ticket,
        result: Result<Vec<Activity>, StoreError>,
        tz: &Tz,
        notifier: &mut Notifier,
    ) {
        match result {
            Ok(activities) => {
                if self.tracker.accept(ticket) {
                    self.stats = calculate_stats(&activities, tz);
                    info!(
                        activities = activities.len(),
                        score = self.stats.productivity_score,
                        "dashboard statistics refreshed"
                    );
                }
            }
            Err(err) => {
                warn!(error = %err, "error fetching stats");
                if self.tracker.fail(ticket) {
                    notifier.error("Failed to load dashboard statistics");
                }
            }
        }
    }

    /// Fetches and applies in one step.
    pub fn refresh<Tz: TimeZone>(
        &mut self,
        store: &dyn ActivityStore,
        context: &SessionContext,
        now: DateTime<Utc>,
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
        let ticket = self.begin_refresh();
        let result = fetch_window(store, session, now);
        self.complete(ticket, result, tz, notifier);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::backend::memory::MemoryStore;
    use crate::models::User;

    pub fn activity(
        start: DateTime<Utc>,
        minutes: i64,
        category: Category,
        focus: Level,
    ) -> Activity {
        Activity {
            id: format!("a-{}", start.timestamp()),
            user_id: "u1".into(),
            title: "Logged".into(),
            category,
            start_time: start,
            end_time: start + Duration::minutes(minutes),
            description: None,
            energy_level: Level::Medium,
            focus_level: focus,
            duration_minutes: minutes,
        }
    }

    pub fn session() -> SessionContext {
        SessionContext::acquire(Session {
            access_token: "t".into(),
            refresh_token: None,
            user: User {
                id: "u1".into(),
                email: None,
                name: None,
            },
        })
    }

    // 2024-03-04 is a Monday.
    fn monday(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_calculate_stats_empty() {
        let stats = calculate_stats(&[], &Utc);
        assert_eq!(stats.productivity_score, 0);
        assert_eq!(stats.deep_work_hours, 0.0);
        assert_eq!(stats.distraction_events, 0);
        assert!(stats.time_allocation.categories.is_empty());
        assert_eq!(stats.weekly_productivity.scores, [0; 7]);
    }

    #[test]
    fn test_time_allocation_percentages() {
        let activities = vec![
            activity(monday(9), 120, Category::Work, Level::High),
            activity(monday(11), 60, Category::Meeting, Level::Medium),
            activity(monday(12), 60, Category::Break, Level::Low),
        ];
        let stats = calculate_stats(&activities, &Utc);
        let entries: Vec<_> = stats.time_allocation.entries().collect();
        assert_eq!(
            entries,
            vec![
                (Category::Work, 50),
                (Category::Meeting, 25),
                (Category::Break, 25)
            ]
        );
    }

    #[test]
    fn test_percentages_are_rounded_independently() {
        let activities = vec![
            activity(monday(9), 1, Category::Work, Level::High),
            activity(monday(10), 1, Category::Email, Level::High),
            activity(monday(11), 1, Category::Learning, Level::High),
        ];
        let stats = calculate_stats(&activities, &Utc);
        // 33 + 33 + 33: no normalization to 100.
        assert_eq!(stats.time_allocation.percentages, vec![33, 33, 33]);
    }

    #[test]
    fn test_score_averages_only_days_with_activity() {
        let tuesday = monday(9) + Duration::days(1);
        let activities = vec![
            activity(monday(9), 30, Category::Work, Level::High),
            activity(monday(10), 30, Category::Work, Level::Low),
            activity(tuesday, 30, Category::Work, Level::Medium),
        ];
        let stats = calculate_stats(&activities, &Utc);

        // Monday averages 70, Tuesday 70; mean over two days, not seven.
        assert_eq!(stats.productivity_score, 70);
        assert_eq!(stats.weekly_productivity.scores, [0, 70, 70, 0, 0, 0, 0]);
    }

    #[test]
    fn test_score_is_mean_of_day_averages_not_of_activities() {
        let tuesday = monday(9) + Duration::days(1);
        let activities = vec![
            activity(monday(9), 30, Category::Work, Level::High),
            activity(monday(10), 30, Category::Work, Level::High),
            activity(monday(11), 30, Category::Work, Level::High),
            activity(tuesday, 30, Category::Work, Level::Low),
        ];
        let stats = calculate_stats(&activities, &Utc);
        // (100 + 40) / 2 = 70, whereas the per-activity mean would be 85.
        assert_eq!(stats.productivity_score, 70);
    }

    #[test]
    fn test_deep_work_and_distractions() {
        let activities = vec![
            activity(monday(9), 100, Category::Work, Level::High),
            activity(monday(11), 45, Category::Learning, Level::High),
            activity(monday(12), 20, Category::Social, Level::Low),
            activity(monday(13), 10, Category::Email, Level::Low),
        ];
        let stats = calculate_stats(&activities, &Utc);
        assert_eq!(stats.deep_work_hours, 1.7);
        assert_eq!(stats.distraction_events, 2);
    }

    #[test]
    fn test_weekday_follows_local_time() {
        // 23:30 UTC on Monday is already Tuesday at UTC+2.
        let late = Utc.with_ymd_and_hms(2024, 3, 4, 23, 30, 0).unwrap();
        let activities = vec![activity(late, 30, Category::Work, Level::High)];
        let tz = chrono::FixedOffset::east_opt(2 * 3600).unwrap();
        let stats = calculate_stats(&activities, &tz);
        assert_eq!(stats.weekly_productivity.scores[2], 100);
        assert_eq!(stats.weekly_productivity.scores[1], 0);
    }

    #[test]
    fn test_stats_window() {
        let now = monday(12);
        let (from, to) = stats_window(now);
        assert_eq!(to, now);
        assert_eq!(from, now - Duration::days(7));
    }

    #[test]
    fn test_failed_refresh_keeps_previous_stats() {
        let store = MemoryStore::with_rows(vec![
            activity(monday(9), 120, Category::Work, Level::High),
        ]);
        let ctx = session();
        let mut notifier = Notifier::default();
        let mut view = StatsView::default();

        view.refresh(&store, &ctx, monday(18), &Utc, &mut notifier);
        let before = view.stats().clone();
        assert_eq!(before.deep_work_hours, 2.0);

        store.set_failing(true);
        view.refresh(&store, &ctx, monday(19), &Utc, &mut notifier);

        assert_eq!(view.stats(), &before);
        assert!(!view.is_loading());
        assert_eq!(
            notifier.latest().unwrap().message,
            "Failed to load dashboard statistics"
        );
    }

    #[test]
    fn test_stale_stats_response_is_ignored() {
        let mut notifier = Notifier::default();
        let mut view = StatsView::default();
        let older = view.begin_refresh();
        let newer = view.begin_refresh();

        let fresh = vec![activity(monday(9), 60, Category::Work, Level::High)];
        view.complete(newer, Ok(fresh), &Utc, &mut notifier);
        view.complete(older, Ok(Vec::new()), &Utc, &mut notifier);

        assert_eq!(view.stats().deep_work_hours, 1.0);
    }

    #[test]
    fn test_signed_out_refresh_notifies() {
        let store = MemoryStore::default();
        let mut notifier = Notifier::default();
        let mut view = StatsView::default();
        view.refresh(&store, &SessionContext::default(), monday(9), &Utc, &mut notifier);
        assert!(notifier.latest().unwrap().message.contains("Not signed in"));
    }

    #[test]
    fn test_stale_failure_is_not_reported() {
        let mut notifier = Notifier::default();
        let mut view = StatsView::default();
        let older = view.begin_refresh();
        let newer = view.begin_refresh();

        let fresh = vec![activity(monday(9), 60, Category::Work, Level::High)];
        view.complete(newer, Ok(fresh), &Utc, &mut notifier);
        view.complete(
            older,
            Err(StoreError::Network("timed out".into())),
            &Utc,
            &mut notifier,
        );

        assert_eq!(view.stats().deep_work_hours, 1.0);
        assert!(notifier.all().is_empty());
    }
}
