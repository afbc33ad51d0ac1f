use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    Work,
    Meeting,
    Email,
    Learning,
    Break,
    Social,
    Personal,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Work,
        Category::Meeting,
        Category::Email,
        Category::Learning,
        Category::Break,
        Category::Social,
        Category::Personal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Work => "work",
            Category::Meeting => "meeting",
            Category::Email => "email",
            Category::Learning => "learning",
            Category::Break => "break",
            Category::Social => "social",
            Category::Personal => "personal",
        }
    }

    /// Label shown in the intake form.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Work => "Deep Work",
            Category::Meeting => "Meeting",
            Category::Email => "Email & Communication",
            Category::Learning => "Learning",
            Category::Break => "Break",
            Category::Social => "Social Media",
            Category::Personal => "Personal",
        }
    }

    pub fn next(&self) -> Self {
        let idx = Self::ALL.iter().position(|c| c == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s.trim().to_ascii_lowercase())
            .ok_or_else(|| anyhow::anyhow!("Unknown category '{}'", s))
    }
}

/// Energy or focus level attached to an activity.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Low,
    #[default]
    Medium,
    High,
}

impl Level {
    pub const ALL: [Level; 3] = [Level::Low, Level::Medium, Level::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Low => "low",
            Level::Medium => "medium",
            Level::High => "high",
        }
    }

    /// Per-activity productivity score keyed off the focus level.
    pub fn productivity_score(&self) -> u32 {
        match self {
            Level::High => 100,
            Level::Medium => 70,
            Level::Low => 40,
        }
    }

    pub fn next(&self) -> Self {
        match self {
            Level::Low => Level::Medium,
            Level::Medium => Level::High,
            Level::High => Level::Low,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|l| l.as_str() == s.trim().to_ascii_lowercase())
            .ok_or_else(|| anyhow::anyhow!("Unknown level '{}' (expected low, medium or high)", s))
    }
}

/// One logged activity as stored by the backend.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Activity {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub category: Category,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub description: Option<String>,
    pub energy_level: Level,
    pub focus_level: Level,
    pub duration_minutes: i64,
}

/// Insert payload; `start_time`/`end_time` are RFC 3339 strings composed from local date and time.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NewActivity {
    pub user_id: String,
    pub title: String,
    pub category: Category,
    pub start_time: String,
    pub end_time: String,
    pub description: String,
    pub energy_level: Level,
    pub focus_level: Level,
    pub duration_minutes: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl User {
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or("User")
    }
}
