//! Dashboard shell: tab selection, the add-activity modal, and the fetches that feed
//! the overview and schedule.
//!
//! Fetches run on worker threads and report back over a channel. Each result carries
//! the ticket it was issued with, so a slow response cannot overwrite a newer one.

use crate::backend::{ActivityStore, StoreError};
use crate::intake::{ActivityForm, SubmitOutcome};
use crate::models::{Activity, NewActivity};
use crate::notify::Notifier;
use crate::schedule::{fetch_day, ScheduleView, Step, ViewMode};
use crate::sequencing::Ticket;
use crate::session::SessionContext;
use crate::stats::{fetch_window, StatsView};
use crate::theme::Theme;
use crate::tips::TipsView;
use chrono::{NaiveDate, TimeZone, Utc};
use std::fmt::Display;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Overview,
    Schedule,
    Reports,
    Tips,
}

impl Tab {
    pub const ALL: [Tab; 4] = [Tab::Overview, Tab::Schedule, Tab::Reports, Tab::Tips];

    pub fn title(&self) -> &'static str {
        match self {
            Tab::Overview => "Overview",
            Tab::Schedule => "Schedule",
            Tab::Reports => "Reports",
            Tab::Tips => "Tips & Insights",
        }
    }

    pub fn index(&self) -> usize {
        Self::ALL.iter().position(|t| t == self).unwrap_or(0)
    }

    pub fn next(&self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn prev(&self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardEvent {
    NextTab,
    PrevTab,
    SelectTab(Tab),
    OpenForm,
    CloseForm,
    FormChar(char),
    FormBackspace,
    FormNextField,
    FormPrevField,
    FormCycle,
    Submit,
    Navigate(Step),
    SetViewMode(ViewMode),
    TipCursor { down: bool },
    TipToggle,
    TipFilter,
    Refresh,
    ToggleTheme,
    SignOut,
    Quit,
}

/// What the caller must do after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    ThemeChanged(Theme),
    SignOut,
    Quit,
}

enum Fetched {
    Stats(Ticket, Result<Vec<Activity>, StoreError>),
    Schedule(Ticket, Result<Vec<Activity>, StoreError>),
    Inserted(NewActivity, Result<(), StoreError>),
}

pub struct Dashboard<Tz: TimeZone> {
    store: Arc<dyn ActivityStore>,
    context: SessionContext,
    tz: Tz,
    tab: Tab,
    theme: Theme,
    pub stats: StatsView,
    pub schedule: ScheduleView,
    pub form: ActivityForm,
    pub tips: TipsView,
    pub notifier: Notifier,
    tx: Sender<Fetched>,
    rx: Receiver<Fetched>,
}

impl<Tz> Dashboard<Tz>
where
    Tz: TimeZone + Send + 'static,
    Tz::Offset: Display,
{
    pub fn new(
        store: Arc<dyn ActivityStore>,
        context: SessionContext,
        tz: Tz,
        theme: Theme,
        notifier: Notifier,
    ) -> Self {
        let today = Utc::now().with_timezone(&tz).date_naive();
        let (tx, rx) = mpsc::channel();
        Self {
            store,
            context,
            tz,
            tab: Tab::Overview,
            theme,
            stats: StatsView::default(),
            schedule: ScheduleView::new(today),
            form: ActivityForm::new(today),
            tips: TipsView::default(),
            notifier,
            tx,
            rx,
        }
    }

    pub fn tab(&self) -> Tab {
        self.tab
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn tz(&self) -> &Tz {
        &self.tz
    }

    pub fn greeting(&self) -> String {
        let name = self
            .context
            .user()
            .map(|u| u.display_name().to_string())
            .unwrap_or_else(|_| "User".to_string());
        format!("Welcome back, {}", name)
    }

    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.tz).date_naive()
    }

    /// Initial loads on mount.
    pub fn start(&mut self) {
        self.request_stats();
        self.request_schedule();
    }

    pub fn request_stats(&mut self) {
        let session = match self.context.current() {
            Ok(session) => session.clone(),
            Err(err) => {
                self.notifier.error(err.to_string());
                return;
            }
        };
        let ticket = self.stats.begin_refresh();
        let store = Arc::clone(&self.store);
        let tx = self.tx.clone();
        debug!(?ticket, "requesting stats");
        thread::spawn(move || {
            let result = fetch_window(store.as_ref(), &session, Utc::now());
            // The dashboard may already be gone; nothing to deliver to then.
            let _ = tx.send(Fetched::Stats(ticket, result));
        });
    }

    pub fn request_schedule(&mut self) {
        let session = match self.context.current() {
            Ok(session) => session.clone(),
            Err(err) => {
                self.notifier.error(err.to_string());
                return;
            }
        };
        let (ticket, date) = self.schedule.begin_refresh();
        let store = Arc::clone(&self.store);
        let tx = self.tx.clone();
        let tz = self.tz.clone();
        debug!(?ticket, %date, "requesting schedule");
        thread::spawn(move || {
            let result = fetch_day(store.as_ref(), &session, date, &tz);
            let _ = tx.send(Fetched::Schedule(ticket, result));
        });
    }

    /// Sends the drafted activity from a worker thread; the modal shows it as
    /// submitting until `drain` applies the result.
    pub fn request_insert(&mut self) {
        let (session, row) = match self.form.prepare(&self.context, &self.tz, &mut self.notifier) {
            Ok(prepared) => prepared,
            Err(outcome) => {
                debug!(?outcome, "activity not sent");
                return;
            }
        };
        let store = Arc::clone(&self.store);
        let tx = self.tx.clone();
        debug!(title = %row.title, "inserting activity");
        thread::spawn(move || {
            let result = store.insert(&session, &row);
            let _ = tx.send(Fetched::Inserted(row, result));
        });
    }

    /// Applies every fetch result that has arrived so far.
    pub fn drain(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(fetched) = self.rx.try_recv() {
            self.apply(fetched);
            applied += 1;
        }
        applied
    }

    fn apply(&mut self, fetched: Fetched) {
        match fetched {
            Fetched::Stats(ticket, result) => {
                self.stats
                    .complete(ticket, result, &self.tz, &mut self.notifier)
            }
            Fetched::Schedule(ticket, result) => {
                self.schedule.complete(ticket, result, &mut self.notifier)
            }
            Fetched::Inserted(row, result) => {
                if self.form.finish(&row, result, &mut self.notifier) == SubmitOutcome::Submitted {
                    self.request_stats();
                    self.request_schedule();
                }
            }
        }
    }

    pub fn is_loading(&self) -> bool {
        match self.tab {
            Tab::Overview | Tab::Reports => self.stats.is_loading(),
            Tab::Schedule => self.schedule.is_loading(),
            Tab::Tips => false,
        }
    }

    pub fn handle(&mut self, event: DashboardEvent) -> Control {
        match event {
            DashboardEvent::NextTab => self.tab = self.tab.next(),
            DashboardEvent::PrevTab => self.tab = self.tab.prev(),
            DashboardEvent::SelectTab(tab) => self.tab = tab,
            DashboardEvent::OpenForm => {
                let today = self.today();
                self.form.open(today);
            }
            DashboardEvent::CloseForm => self.form.close(),
            DashboardEvent::FormChar(c) => self.form.input_char(c),
            DashboardEvent::FormBackspace => self.form.backspace(),
            DashboardEvent::FormNextField => self.form.focus_next(),
            DashboardEvent::FormPrevField => self.form.focus_prev(),
            DashboardEvent::FormCycle => self.form.cycle(),
            DashboardEvent::Submit => self.request_insert(),
            DashboardEvent::Navigate(step) => {
                self.schedule.navigate(step);
                self.request_schedule();
            }
            DashboardEvent::SetViewMode(mode) => self.schedule.set_mode(mode),
            DashboardEvent::TipCursor { down } => self.tips.move_cursor(down),
            DashboardEvent::TipToggle => self.tips.toggle(),
            DashboardEvent::TipFilter => self.tips.cycle_filter(),
            DashboardEvent::Refresh => match self.tab {
                Tab::Schedule => self.request_schedule(),
                _ => self.request_stats(),
            },
            DashboardEvent::ToggleTheme => {
                self.theme = self.theme.toggle();
                info!(theme = %self.theme, "theme changed");
                return Control::ThemeChanged(self.theme);
            }
            DashboardEvent::SignOut => return Control::SignOut,
            DashboardEvent::Quit => return Control::Quit,
        }
        Control::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryStore;
    use crate::backend::Order;
    use crate::models::{Category, Level};
    use crate::session::Session;
    use chrono::DateTime;
    use std::sync::mpsc::SyncSender;
    use std::sync::Mutex;
    use crate::stats::tests::{activity, session};
    use std::time::Duration as StdDuration;

    fn dashboard(store: Arc<MemoryStore>) -> Dashboard<Utc> {
        Dashboard::new(store, session(), Utc, Theme::Dark, Notifier::default())
    }

    fn wait_for(dash: &mut Dashboard<Utc>, expected: usize) {
        for _ in 0..expected {
            let fetched = dash
                .rx
                .recv_timeout(StdDuration::from_secs(5))
                .expect("fetch result");
            dash.apply(fetched);
        }
    }

    #[test]
    fn test_tabs_cycle() {
        assert_eq!(Tab::Overview.next(), Tab::Schedule);
        assert_eq!(Tab::Tips.next(), Tab::Overview);
        assert_eq!(Tab::Overview.prev(), Tab::Tips);
    }

    #[test]
    fn test_start_loads_stats_and_schedule() {
        let now = Utc::now();
        let store = Arc::new(MemoryStore::with_rows(vec![activity(
            now - chrono::Duration::minutes(90),
            60,
            Category::Work,
            Level::High,
        )]));
        let mut dash = dashboard(store);

        dash.start();
        assert!(dash.is_loading());
        wait_for(&mut dash, 2);

        assert!(!dash.is_loading());
        assert_eq!(dash.stats.stats().deep_work_hours, 1.0);
        assert_eq!(dash.stats.stats().productivity_score, 100);
    }

    #[test]
    fn test_submit_triggers_refetch() {
        let store = Arc::new(MemoryStore::default());
        let mut dash = dashboard(Arc::clone(&store));

        dash.handle(DashboardEvent::OpenForm);
        assert!(dash.form.is_open());
        for c in "Review".chars() {
            dash.handle(DashboardEvent::FormChar(c));
        }
        dash.form.start_time = "09:00".into();
        dash.form.end_time = "09:30".into();

        assert_eq!(dash.handle(DashboardEvent::Submit), Control::Continue);
        wait_for(&mut dash, 1);
        assert!(!dash.form.is_open());
        assert_eq!(store.inserted.lock().unwrap().len(), 1);

        // One stats and one schedule fetch were issued.
        wait_for(&mut dash, 2);
        assert!(!dash.stats.is_loading());
        assert!(!dash.schedule.is_loading());
    }

    #[test]
    fn test_theme_toggle_reports_change() {
        let mut dash = dashboard(Arc::new(MemoryStore::default()));
        assert_eq!(
            dash.handle(DashboardEvent::ToggleTheme),
            Control::ThemeChanged(Theme::Light)
        );
        assert_eq!(dash.theme(), Theme::Light);
    }

    #[test]
    fn test_signed_out_dashboard_does_not_fetch() {
        let store: Arc<dyn ActivityStore> = Arc::new(MemoryStore::default());
        let mut dash = Dashboard::new(
            store,
            SessionContext::default(),
            Utc,
            Theme::Dark,
            Notifier::default(),
        );
        dash.start();
        assert!(!dash.stats.is_loading());
        assert_eq!(dash.greeting(), "Welcome back, User");
        assert!(dash.notifier.latest().unwrap().message.contains("Not signed in"));
    }

    #[test]
    fn test_navigate_requests_new_day() {
        let mut dash = dashboard(Arc::new(MemoryStore::default()));
        let before = dash.schedule.date();
        dash.handle(DashboardEvent::Navigate(Step::Next));
        assert_eq!(dash.schedule.date(), before.succ_opt().unwrap());
        assert!(dash.schedule.is_loading());
        wait_for(&mut dash, 1);
        assert!(!dash.schedule.is_loading());
    }

    /// Holds every insert until the test releases it.
    struct GatedStore {
        inner: MemoryStore,
        gate: Mutex<Receiver<()>>,
    }

    impl GatedStore {
        fn new() -> (Self, SyncSender<()>) {
            let (release, gate) = mpsc::sync_channel(1);
            let store = Self {
                inner: MemoryStore::default(),
                gate: Mutex::new(gate),
            };
            (store, release)
        }
    }

    impl ActivityStore for GatedStore {
        fn insert(&self, session: &Session, activity: &NewActivity) -> Result<(), StoreError> {
            let _ = self.gate.lock().unwrap().recv_timeout(StdDuration::from_secs(5));
            self.inner.insert(session, activity)
        }

        fn activities_between(
            &self,
            session: &Session,
            from: DateTime<Utc>,
            to: DateTime<Utc>,
            order: Order,
        ) -> Result<Vec<Activity>, StoreError> {
            self.inner.activities_between(session, from, to, order)
        }
    }

    #[test]
    fn test_submit_does_not_block_event_handling() {
        let (store, release) = GatedStore::new();
        let store = Arc::new(store);
        let mut dash = Dashboard::new(
            Arc::clone(&store) as Arc<dyn ActivityStore>,
            session(),
            Utc,
            Theme::Dark,
            Notifier::default(),
        );
        dash.handle(DashboardEvent::OpenForm);
        dash.form.title = "Planning".into();
        dash.form.start_time = "08:00".into();
        dash.form.end_time = "08:45".into();

        assert_eq!(dash.handle(DashboardEvent::Submit), Control::Continue);
        assert!(dash.form.is_submitting());
        assert!(dash.form.is_open());
        assert!(store.inner.inserted.lock().unwrap().is_empty());

        // Other events keep being handled while the insert is outstanding.
        assert_eq!(dash.handle(DashboardEvent::NextTab), Control::Continue);
        assert_eq!(dash.tab(), Tab::Schedule);
        assert_eq!(dash.drain(), 0);

        release.send(()).unwrap();
        wait_for(&mut dash, 1);
        assert!(!dash.form.is_submitting());
        assert!(!dash.form.is_open());
        assert_eq!(store.inner.inserted.lock().unwrap().len(), 1);
        assert!(dash.stats.is_loading());
        assert!(dash.schedule.is_loading());
    }

    #[test]
    fn test_failed_insert_keeps_modal_open() {
        let store = Arc::new(MemoryStore::default());
        store.set_failing(true);
        let mut dash = dashboard(Arc::clone(&store));
        dash.handle(DashboardEvent::OpenForm);
        dash.form.title = "Email triage".into();
        dash.form.start_time = "10:00".into();
        dash.form.end_time = "10:20".into();

        dash.handle(DashboardEvent::Submit);
        wait_for(&mut dash, 1);

        assert!(dash.form.is_open());
        assert!(!dash.form.is_submitting());
        assert!(!dash.stats.is_loading());
        assert_eq!(
            dash.notifier.latest().unwrap().message,
            "Failed to add activity. Please try again."
        );
    }
}
