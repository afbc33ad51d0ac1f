use crate::dashboard::{Control, Dashboard, DashboardEvent, Tab};
use crate::intake::Field;
use crate::notify::NoticeLevel;
use crate::schedule::{block_height, heading, slots, Step, ViewMode, MIN_BLOCK_HEIGHT};
use crate::storage::Storage;
use crate::theme::Palette;
use crate::tips::APPLY_STEPS;
use crate::utils::format_clock;
use anyhow::Result;
use chrono::{Local, Utc};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{BarChart, Block, Borders, Clear, Paragraph, Tabs, Wrap},
    Frame, Terminal,
};
use std::io;
use std::time::Duration as StdDuration;
use tracing::warn;

/// Why the dashboard loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Quit,
    SignOut,
}

pub fn run_tui(dashboard: &mut Dashboard<Local>, storage: &Storage) -> Result<Exit> {
    // setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    dashboard.start();
    let res = run_loop(&mut terminal, dashboard, storage);

    // restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    dashboard: &mut Dashboard<Local>,
    storage: &Storage,
) -> Result<Exit> {
    loop {
        dashboard.drain();
        terminal.draw(|f| draw(f, dashboard))?;

        if !event::poll(StdDuration::from_millis(100))? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        let Some(event) = event_for_key(dashboard, key) else {
            continue;
        };

        match dashboard.handle(event) {
            Control::Continue => {}
            Control::ThemeChanged(theme) => {
                if let Err(err) = storage.update(|s| s.theme = Some(theme)) {
                    warn!(error = %err, "could not save theme preference");
                }
            }
            Control::SignOut => return Ok(Exit::SignOut),
            Control::Quit => return Ok(Exit::Quit),
        }
    }
}

fn event_for_key(dashboard: &Dashboard<Local>, key: KeyEvent) -> Option<DashboardEvent> {
    if dashboard.form.is_open() {
        return match key.code {
            KeyCode::Esc => Some(DashboardEvent::CloseForm),
            KeyCode::Enter => Some(DashboardEvent::Submit),
            KeyCode::Tab | KeyCode::Down => Some(DashboardEvent::FormNextField),
            KeyCode::BackTab | KeyCode::Up => Some(DashboardEvent::FormPrevField),
            KeyCode::Left | KeyCode::Right => Some(DashboardEvent::FormCycle),
            KeyCode::Backspace => Some(DashboardEvent::FormBackspace),
            KeyCode::Char(c) => Some(DashboardEvent::FormChar(c)),
            _ => None,
        };
    }

    let global = match key.code {
        KeyCode::Char('q') => Some(DashboardEvent::Quit),
        KeyCode::Tab | KeyCode::Right => Some(DashboardEvent::NextTab),
        KeyCode::BackTab | KeyCode::Left => Some(DashboardEvent::PrevTab),
        KeyCode::Char(c @ '1'..='4') => {
            let idx = c.to_digit(10).unwrap_or(1) as usize - 1;
            Some(DashboardEvent::SelectTab(Tab::ALL[idx]))
        }
        KeyCode::Char('a') => Some(DashboardEvent::OpenForm),
        KeyCode::Char('r') => Some(DashboardEvent::Refresh),
        KeyCode::Char('t') => Some(DashboardEvent::ToggleTheme),
        KeyCode::Char('o') => Some(DashboardEvent::SignOut),
        _ => None,
    };
    if global.is_some() {
        return global;
    }

    match (dashboard.tab(), key.code) {
        (Tab::Schedule, KeyCode::Char('h') | KeyCode::Char('[')) => {
            Some(DashboardEvent::Navigate(Step::Prev))
        }
        (Tab::Schedule, KeyCode::Char('l') | KeyCode::Char(']')) => {
            Some(DashboardEvent::Navigate(Step::Next))
        }
        (Tab::Schedule, KeyCode::Char('d')) => Some(DashboardEvent::SetViewMode(ViewMode::Day)),
        (Tab::Schedule, KeyCode::Char('w')) => Some(DashboardEvent::SetViewMode(ViewMode::Week)),
        (Tab::Tips, KeyCode::Down | KeyCode::Char('j')) => {
            Some(DashboardEvent::TipCursor { down: true })
        }
        (Tab::Tips, KeyCode::Up | KeyCode::Char('k')) => {
            Some(DashboardEvent::TipCursor { down: false })
        }
        (Tab::Tips, KeyCode::Enter | KeyCode::Char(' ')) => Some(DashboardEvent::TipToggle),
        (Tab::Tips, KeyCode::Char('f')) => Some(DashboardEvent::TipFilter),
        _ => None,
    }
}

pub fn draw(frame: &mut Frame, dashboard: &mut Dashboard<Local>) {
    let palette = dashboard.theme().palette();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Length(3), // Tabs
            Constraint::Min(0),    // Body
            Constraint::Length(3), // Notices / help
        ])
        .split(frame.size());

    draw_header(frame, chunks[0], dashboard, palette);
    draw_tabs(frame, chunks[1], dashboard, palette);

    if dashboard.is_loading() {
        let loading = Paragraph::new("Loading...")
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(loading, chunks[2]);
    } else {
        match dashboard.tab() {
            Tab::Overview => draw_overview(frame, chunks[2], dashboard, palette),
            Tab::Schedule => draw_schedule(frame, chunks[2], dashboard, palette),
            Tab::Reports => draw_reports(frame, chunks[2], dashboard, palette),
            Tab::Tips => draw_tips(frame, chunks[2], dashboard, palette),
        }
    }

    draw_footer(frame, chunks[3], dashboard, palette);

    if dashboard.form.is_open() {
        draw_form(frame, dashboard, palette);
    }
}

fn draw_header(frame: &mut Frame, area: Rect, dashboard: &Dashboard<Local>, palette: Palette) {
    let now_local = Local::now();
    let header_content = Line::from(vec![
        Span::styled(
            " Sahayak ",
            Style::default()
                .fg(palette.accent)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" | "),
        Span::styled(dashboard.greeting(), Style::default().fg(palette.text)),
        Span::raw(" | "),
        Span::styled(
            now_local.format("%Y-%m-%d %H:%M").to_string(),
            Style::default().fg(palette.muted),
        ),
    ]);

    let header = Paragraph::new(header_content).block(Block::default().borders(Borders::ALL));
    frame.render_widget(header, area);
}

fn draw_tabs(frame: &mut Frame, area: Rect, dashboard: &Dashboard<Local>, palette: Palette) {
    let titles: Vec<Line> = Tab::ALL.iter().map(|t| Line::from(t.title())).collect();
    let tabs = Tabs::new(titles)
        .select(dashboard.tab().index())
        .block(Block::default().borders(Borders::ALL))
        .style(Style::default().fg(palette.muted))
        .highlight_style(
            Style::default()
                .fg(palette.highlight)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        );
    frame.render_widget(tabs, area);
}

fn draw_overview(frame: &mut Frame, area: Rect, dashboard: &Dashboard<Local>, palette: Palette) {
    let stats = dashboard.stats.stats();
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(0)])
        .split(area);

    let cards = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(33),
            Constraint::Percentage(33),
            Constraint::Percentage(34),
        ])
        .split(rows[0]);

    let card = |title: &'static str, value: String, color: Color| {
        Paragraph::new(Line::from(Span::styled(
            value,
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )))
        .alignment(Alignment::Center)
        .block(Block::default().title(title).borders(Borders::ALL))
    };
    frame.render_widget(
        card(" Productivity Score ", format!("{}", stats.productivity_score), Color::Green),
        cards[0],
    );
    frame.render_widget(
        card(" Deep Work Hours ", format!("{:.1}h", stats.deep_work_hours), palette.accent),
        cards[1],
    );
    frame.render_widget(
        card(" Distraction Events ", format!("{}", stats.distraction_events), Color::Yellow),
        cards[2],
    );

    let charts = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(rows[1]);

    let weekly = &stats.weekly_productivity;
    let data: Vec<(&str, u64)> = weekly
        .labels
        .iter()
        .zip(weekly.scores.iter())
        .map(|(label, score)| (*label, (*score).max(0) as u64))
        .collect();
    let chart = BarChart::default()
        .block(
            Block::default()
                .title(" Weekly Productivity ")
                .borders(Borders::ALL),
        )
        .data(data.as_slice())
        .max(100)
        .bar_width(5)
        .bar_gap(2)
        .bar_style(Style::default().fg(palette.highlight))
        .value_style(Style::default().fg(palette.text).add_modifier(Modifier::BOLD));
    frame.render_widget(chart, charts[0]);

    frame.render_widget(allocation(dashboard, palette, " Time Allocation "), charts[1]);
}

fn allocation<'a>(dashboard: &Dashboard<Local>, palette: Palette, title: &'a str) -> Paragraph<'a> {
    let stats = dashboard.stats.stats();
    let mut lines = Vec::new();
    if stats.time_allocation.categories.is_empty() {
        lines.push(Line::styled(
            "  No activities in the last 7 days",
            Style::default().fg(palette.muted),
        ));
    }
    for (category, pct) in stats.time_allocation.entries() {
        let width = (pct.clamp(0, 100) / 4) as usize;
        lines.push(Line::from(vec![
            Span::raw(format!("  {:<22}", category.label())),
            Span::styled(
                format!("{:>3}% ", pct),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::styled("█".repeat(width), Style::default().fg(palette.highlight)),
        ]));
    }
    Paragraph::new(lines).block(Block::default().title(title).borders(Borders::ALL))
}

fn draw_schedule(frame: &mut Frame, area: Rect, dashboard: &Dashboard<Local>, palette: Palette) {
    let view = &dashboard.schedule;
    let mode = match view.mode() {
        ViewMode::Day => "Day",
        ViewMode::Week => "Week",
    };
    let block = Block::default()
        .title(format!(" {} ({}) ", heading(view.date()), mode))
        .borders(Borders::ALL);

    if view.mode() == ViewMode::Week {
        let placeholder = Paragraph::new("Weekly view will be implemented in a future update.")
            .alignment(Alignment::Center)
            .style(Style::default().fg(palette.muted))
            .block(block);
        frame.render_widget(placeholder, area);
        return;
    }

    let tz = dashboard.tz();
    let mut lines = Vec::new();
    for slot in slots(view.activities(), tz) {
        if slot.activities.is_empty() {
            lines.push(Line::from(vec![
                Span::styled(format!("{:>9} ", slot.label), Style::default().fg(palette.muted)),
                Span::styled("│  + add activity (a)", Style::default().fg(palette.muted)),
            ]));
            continue;
        }
        for (i, activity) in slot.activities.iter().enumerate() {
            let label = if i == 0 { slot.label.clone() } else { String::new() };
            let start = activity.start_time.with_timezone(tz).time();
            let end = activity.end_time.with_timezone(tz).time();
            lines.push(Line::from(vec![
                Span::styled(format!("{:>9} ", label), Style::default().fg(palette.muted)),
                Span::styled(
                    format!("│▌ {}", activity.title),
                    Style::default()
                        .fg(category_color(activity.category))
                        .add_modifier(Modifier::BOLD),
                ),
                Span::raw(format!(
                    "  {} - {}",
                    format_clock(start),
                    format_clock(end)
                )),
            ]));
            // One extra row per hour beyond the first.
            let rows = (block_height(activity) / MIN_BLOCK_HEIGHT).round() as usize;
            for row in 1..rows.max(1) {
                let text = match (row, activity.description.as_deref()) {
                    (1, Some(d)) if !d.is_empty() => format!("│▌ {}", d),
                    _ => "│▌".to_string(),
                };
                lines.push(Line::from(vec![
                    Span::raw(format!("{:>9} ", "")),
                    Span::styled(text, Style::default().fg(category_color(activity.category))),
                ]));
            }
        }
    }

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn category_color(category: crate::models::Category) -> Color {
    use crate::models::Category::*;
    match category {
        Work => Color::Blue,
        Meeting => Color::Green,
        Email => Color::LightRed,
        Learning => Color::Magenta,
        Break => Color::Yellow,
        Social => Color::LightMagenta,
        Personal => Color::Cyan,
    }
}

fn draw_reports(frame: &mut Frame, area: Rect, dashboard: &Dashboard<Local>, palette: Palette) {
    let stats = dashboard.stats.stats();
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(5)])
        .split(area);

    frame.render_widget(
        allocation(dashboard, palette, " Time Allocation (last 7 days) "),
        rows[0],
    );

    let summary = Paragraph::new(vec![
        Line::raw(format!("  Productivity score:  {}", stats.productivity_score)),
        Line::raw(format!("  Deep work:           {:.1}h", stats.deep_work_hours)),
        Line::raw(format!("  Distraction events:  {}", stats.distraction_events)),
    ])
    .block(Block::default().title(" Summary ").borders(Borders::ALL));
    frame.render_widget(summary, rows[1]);
}

fn draw_tips(frame: &mut Frame, area: Rect, dashboard: &Dashboard<Local>, palette: Palette) {
    let tips = &dashboard.tips;
    let mut lines = vec![
        Line::from(vec![
            Span::raw("  Filter: "),
            Span::styled(
                tips.filter().to_string(),
                Style::default()
                    .fg(palette.accent)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled("  (f to change)", Style::default().fg(palette.muted)),
        ]),
        Line::raw(""),
    ];

    for (i, tip) in tips.visible().into_iter().enumerate() {
        let selected = i == tips.cursor();
        let marker = if selected { "▶ " } else { "  " };
        let title_style = if selected {
            Style::default()
                .fg(palette.highlight)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(palette.text)
        };
        lines.push(Line::from(vec![
            Span::raw(marker),
            Span::styled(tip.title, title_style),
            Span::styled(
                format!("  [{}]", tip.category.label()),
                Style::default().fg(palette.muted),
            ),
        ]));
        lines.push(Line::raw(format!("    {}", tip.description)));
        if tips.is_expanded(tip) {
            lines.push(Line::styled("    How to apply:", Style::default().add_modifier(Modifier::BOLD)));
            for step in APPLY_STEPS {
                lines.push(Line::raw(format!("      • {}", step)));
            }
        }
        lines.push(Line::raw(""));
    }

    let para = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .title(" Productivity Tips & Insights ")
                .borders(Borders::ALL),
        );
    frame.render_widget(para, area);
}

fn draw_form(frame: &mut Frame, dashboard: &Dashboard<Local>, palette: Palette) {
    let area = centered(frame.size(), 60, 20);
    frame.render_widget(Clear, area);

    let form = &dashboard.form;
    let mut lines = Vec::new();
    for field in Field::ALL {
        let focused = field == form.focused();
        let label_style = if focused {
            Style::default()
                .fg(palette.highlight)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(palette.muted)
        };
        let mut value = form.value(field);
        if focused && !field.is_choice() {
            value.push('_');
        }
        if field.is_choice() {
            value = format!("◀ {} ▶", value);
        }
        lines.push(Line::from(vec![
            Span::styled(format!(" {:<15}", field.label()), label_style),
            Span::styled(value, Style::default().fg(palette.text)),
        ]));
        lines.push(Line::raw(""));
    }
    let status = if form.is_submitting() {
        "Adding..."
    } else {
        "Enter: add activity | Tab: next field | ←/→: change choice | Esc: cancel"
    };
    lines.push(Line::styled(status, Style::default().fg(palette.muted)));

    let para = Paragraph::new(lines).block(
        Block::default()
            .title(" Add New Activity ")
            .borders(Borders::ALL),
    );
    frame.render_widget(para, area);
}

fn draw_footer(frame: &mut Frame, area: Rect, dashboard: &mut Dashboard<Local>, palette: Palette) {
    dashboard.notifier.expire(Utc::now());
    let notice = dashboard.notifier.latest().cloned();
    let para = match notice {
        Some(notice) => {
            let color = match notice.level {
                NoticeLevel::Success => Color::Green,
                NoticeLevel::Error => Color::Red,
            };
            Paragraph::new(Span::styled(
                notice.message,
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            ))
        }
        None => Paragraph::new(
            "q quit | Tab switch | a add | r refresh | t theme | o sign out | h/l day | d/w view | j/k/f tips",
        )
        .style(Style::default().fg(palette.muted)),
    };
    frame.render_widget(
        para.alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL)),
        area,
    );
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centered_fits_small_area() {
        let area = Rect::new(0, 0, 40, 10);
        let rect = centered(area, 60, 20);
        assert_eq!(rect, Rect::new(0, 0, 40, 10));

        let rect = centered(Rect::new(0, 0, 100, 40), 60, 20);
        assert_eq!(rect, Rect::new(20, 10, 60, 20));
    }
}
