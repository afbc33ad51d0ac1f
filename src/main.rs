mod backend;
mod config;
mod dashboard;
mod intake;
mod logging;
mod models;
mod notify;
mod report;
mod schedule;
mod sequencing;
mod session;
mod stats;
mod storage;
mod theme;
mod tips;
mod tui;
mod utils;

use anyhow::Result;
use backend::RestBackend;
use chrono::{Local, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use dashboard::Dashboard;
use intake::{ActivityForm, SubmitOutcome};
use models::{Category, Level};
use notify::{NoticeLevel, Notifier};
use report::Reporter;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use storage::Storage;
use theme::Theme;
use tips::{TipFilter, TipsView, APPLY_STEPS};

#[derive(Parser)]
#[command(name = "sahayak")]
#[command(about = "Log your day and see where your time and focus go", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive dashboard (default)
    Dashboard,
    /// Sign in with email and password
    Login {
        #[arg(short, long)]
        email: String,
        /// Read from stdin when omitted
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Create an account
    Signup {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Sign out and forget the saved session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Log a new activity
    Add {
        #[arg(short, long)]
        title: String,
        #[arg(short, long, default_value = "work")]
        category: Category,
        /// Date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,
        /// Start time (HH:MM)
        #[arg(long)]
        start: String,
        /// End time (HH:MM)
        #[arg(long)]
        end: String,
        #[arg(short, long, default_value = "")]
        description: String,
        #[arg(long, default_value = "medium")]
        energy: Level,
        #[arg(long, default_value = "medium")]
        focus: Level,
    },
    /// Print the hourly schedule for a day
    Schedule {
        /// Date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Print statistics for the last 7 days
    Report,
    /// List productivity tips
    Tips {
        /// all, focus, efficiency, planning or wellbeing
        #[arg(short, long, default_value = "all")]
        category: TipFilter,
        /// Include how-to-apply steps
        #[arg(long)]
        expand: bool,
    },
    /// Show or set the colour theme (light, dark or toggle)
    Theme { value: Option<String> },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&Storage::get_base_dir()?)?;
    let config = config::load_config()?;
    let storage = Storage::new()?;

    match cli.command.unwrap_or(Commands::Dashboard) {
        Commands::Dashboard => {
            let context = session::require_session(&storage)?;
            let backend = Arc::new(RestBackend::new(&config)?);
            let theme = Theme::resolve(storage.load()?.theme);
            let notifier = Notifier::new(config.notice_ttl()?);
            let mut dashboard = Dashboard::new(backend.clone(), context, Local, theme, notifier);

            if tui::run_tui(&mut dashboard, &storage)? == tui::Exit::SignOut {
                let mut context = session::require_session(&storage)?;
                session::sign_out(backend.as_ref(), &storage, &mut context)?;
                println!("Signed out.");
            }
        }
        Commands::Login { email, password } => {
            let backend = RestBackend::new(&config)?;
            let password = password_or_prompt(password)?;
            let context = session::sign_in(&backend, &storage, &email, &password)?;
            println!("Signed in as {}.", context.user()?.display_name());
        }
        Commands::Signup {
            email,
            name,
            password,
        } => {
            let backend = RestBackend::new(&config)?;
            let password = password_or_prompt(password)?;
            let context =
                session::sign_up(&backend, &storage, &email, &password, name.as_deref())?;
            println!("Welcome, {}!", context.user()?.display_name());
        }
        Commands::Logout => {
            let backend = RestBackend::new(&config)?;
            let mut context = session::require_session(&storage)?;
            session::sign_out(&backend, &storage, &mut context)?;
            println!("Signed out.");
        }
        Commands::Whoami => {
            let context = session::require_session(&storage)?;
            let user = context.user()?;
            println!(
                "{} ({})",
                user.display_name(),
                user.email.as_deref().unwrap_or(&user.id)
            );
        }
        Commands::Add {
            title,
            category,
            date,
            start,
            end,
            description,
            energy,
            focus,
        } => {
            let context = session::require_session(&storage)?;
            let backend = RestBackend::new(&config)?;
            let today = Local::now().date_naive();

            let mut form = ActivityForm::new(today);
            form.open(today);
            form.title = title;
            form.category = category;
            if let Some(date) = date {
                form.date = date;
            }
            form.start_time = start;
            form.end_time = end;
            form.description = description;
            form.energy = energy;
            form.focus = focus;

            let mut notifier = Notifier::new(config.notice_ttl()?);
            let outcome = form.submit(&backend, &context, &Local, &mut notifier);
            print_notices(&notifier);
            if outcome != SubmitOutcome::Submitted {
                std::process::exit(1);
            }
        }
        Commands::Schedule { date } => {
            let context = session::require_session(&storage)?;
            let backend = RestBackend::new(&config)?;
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            Reporter::new(&backend, &context).schedule(date, &Local)?;
        }
        Commands::Report => {
            let context = session::require_session(&storage)?;
            let backend = RestBackend::new(&config)?;
            Reporter::new(&backend, &context).report(Utc::now(), &Local)?;
        }
        Commands::Tips { category, expand } => {
            let mut view = TipsView::default();
            view.set_filter(category);
            println!("Productivity Tips & Insights ({})\n", view.filter());
            for tip in view.visible() {
                println!("{} [{}]", tip.title, tip.category.label());
                println!("  {}", tip.description);
                if expand {
                    for step in APPLY_STEPS {
                        println!("    - {}", step);
                    }
                }
                println!();
            }
        }
        Commands::Theme { value } => {
            let saved = storage.load()?.theme;
            let theme = match value.as_deref() {
                None => Theme::resolve(saved),
                Some("toggle") => Theme::resolve(saved).toggle(),
                Some(other) => other.parse()?,
            };
            if value.is_some() {
                storage.update(|s| s.theme = Some(theme))?;
            }
            println!("Theme: {}", theme);
        }
    }

    Ok(())
}

fn password_or_prompt(password: Option<String>) -> Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }
    print!("Password: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn print_notices(notifier: &Notifier) {
    for notice in notifier.all() {
        match notice.level {
            NoticeLevel::Error => eprintln!("{}", notice.message),
            _ => println!("{}", notice.message),
        }
    }
}
