use crate::backend::ActivityStore;
use crate::notify::Notifier;
use crate::schedule::{heading, slots, ScheduleView};
use crate::session::SessionContext;
use crate::stats::{DashboardStats, StatsView};
use crate::utils::{format_clock, format_duration};
use anyhow::{bail, Result};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::fmt::Write;

/// Prints the overview and schedule views for non-interactive use.
pub struct Reporter<'a> {
    store: &'a dyn ActivityStore,
    context: &'a SessionContext,
}

impl<'a> Reporter<'a> {
    pub fn new(store: &'a dyn ActivityStore, context: &'a SessionContext) -> Self {
        Self { store, context }
    }

    pub fn report<Tz: TimeZone>(&self, now: DateTime<Utc>, tz: &Tz) -> Result<()> {
        let mut notifier = Notifier::default();
        let mut view = StatsView::default();
        view.refresh(self.store, self.context, now, tz, &mut notifier);
        if let Some(notice) = notifier.latest() {
            bail!("{}", notice.message);
        }

        let stats = view.stats();
        if stats.time_allocation.categories.is_empty() {
            println!("No activities logged in the last 7 days.");
            return Ok(());
        }
        print!("{}", render_stats(self.context.user()?.display_name(), stats));
        Ok(())
    }

    pub fn schedule<Tz: TimeZone>(&self, date: NaiveDate, tz: &Tz) -> Result<()> {
        let mut notifier = Notifier::default();
        let mut view = ScheduleView::new(date);
        view.refresh(self.store, self.context, tz, &mut notifier);
        if let Some(notice) = notifier.latest() {
            bail!("{}", notice.message);
        }
        print!("{}", render_schedule(date, view.activities(), tz));
        Ok(())
    }
}

pub fn render_stats(name: &str, stats: &DashboardStats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Sahayak Report for {}", name);
    let _ = writeln!(out, "====================");
    let _ = writeln!(out, "Productivity Score:  {}", stats.productivity_score);
    let _ = writeln!(out, "Deep Work Hours:     {:.1}", stats.deep_work_hours);
    let _ = writeln!(out, "Distraction Events:  {}", stats.distraction_events);

    let _ = writeln!(out, "\nTime Allocation");
    let _ = writeln!(out, "---------------");
    for (category, pct) in stats.time_allocation.entries() {
        let bar = "#".repeat((pct.clamp(0, 100) / 5) as usize);
        let _ = writeln!(out, "  {:<22} {:>3}% {}", category.label(), pct, bar);
    }

    let _ = writeln!(out, "\nWeekly Productivity");
    let _ = writeln!(out, "-------------------");
    let weekly = &stats.weekly_productivity;
    for (label, score) in weekly.labels.iter().zip(weekly.scores.iter()) {
        let _ = writeln!(out, "  {}  {:>3}", label, score);
    }
    out
}

pub fn render_schedule<Tz: TimeZone>(
    date: NaiveDate,
    activities: &[crate::models::Activity],
    tz: &Tz,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", heading(date));
    for slot in slots(activities, tz) {
        if slot.activities.is_empty() {
            let _ = writeln!(out, "{:>9} |", slot.label);
            continue;
        }
        for (i, activity) in slot.activities.iter().enumerate() {
            let label = if i == 0 { slot.label.as_str() } else { "" };
            let start = activity.start_time.with_timezone(tz).time();
            let end = activity.end_time.with_timezone(tz).time();
            let _ = writeln!(
                out,
                "{:>9} | {} - {}  {} [{}] ({})",
                label,
                format_clock(start),
                format_clock(end),
                activity.title,
                activity.category.label(),
                format_duration(activity.duration_minutes * 60),
            );
            if let Some(description) = activity.description.as_deref().filter(|d| !d.is_empty()) {
                let _ = writeln!(out, "{:>9} |     {}", "", description);
            }
        }
    }
    out
}
