use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TipCategory {
    Focus,
    Efficiency,
    Planning,
    Wellbeing,
}

impl TipCategory {
    pub fn label(&self) -> &'static str {
        match self {
            TipCategory::Focus => "Focus",
            TipCategory::Efficiency => "Efficiency",
            TipCategory::Planning => "Planning",
            TipCategory::Wellbeing => "Wellbeing",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TipFilter {
    #[default]
    All,
    Only(TipCategory),
}

impl TipFilter {
    pub const ALL: [TipFilter; 5] = [
        TipFilter::All,
        TipFilter::Only(TipCategory::Focus),
        TipFilter::Only(TipCategory::Efficiency),
        TipFilter::Only(TipCategory::Planning),
        TipFilter::Only(TipCategory::Wellbeing),
    ];

    pub fn next(&self) -> Self {
        let idx = Self::ALL.iter().position(|f| f == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }

    fn matches(&self, tip: &Tip) -> bool {
        match self {
            TipFilter::All => true,
            TipFilter::Only(category) => tip.category == *category,
        }
    }
}

impl fmt::Display for TipFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TipFilter::All => f.write_str("All Tips"),
            TipFilter::Only(category) => f.write_str(category.label()),
        }
    }
}

impl std::str::FromStr for TipFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|f| match f {
                TipFilter::All => s.eq_ignore_ascii_case("all"),
                TipFilter::Only(c) => s.eq_ignore_ascii_case(c.label()),
            })
            .ok_or_else(|| anyhow::anyhow!("Unknown tip category '{}'", s))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tip {
    pub id: u32,
    pub title: &'static str,
    pub description: &'static str,
    pub category: TipCategory,
}

pub const APPLY_STEPS: [&str; 4] = [
    "Start small by applying this technique to one task or part of your day.",
    "Track your results and adjust as needed based on what works for you.",
    "Combine with other productivity techniques for optimal results.",
    "Schedule this as a recurring practice in your daily routine.",
];

pub static TIPS: [Tip; 8] = [
    Tip {
        id: 1,
        title: "Implement the Pomodoro Technique",
        description: "Work in focused 25-minute blocks followed by 5-minute breaks. After 4 cycles, take a longer 15-30 minute break.",
        category: TipCategory::Focus,
    },
    Tip {
        id: 2,
        title: "Use the 2-Minute Rule",
        description: "If a task takes less than 2 minutes to complete, do it immediately instead of scheduling it for later.",
        category: TipCategory::Efficiency,
    },
    Tip {
        id: 3,
        title: "Time-Block Your Day",
        description: "Allocate specific time blocks for different types of work. Reserve your peak energy hours for deep, focused work.",
        category: TipCategory::Planning,
    },
    Tip {
        id: 4,
        title: "Practice Mindfulness",
        description: "Take a few minutes throughout the day to practice mindfulness. This helps reset your mental state and improve focus.",
        category: TipCategory::Wellbeing,
    },
    Tip {
        id: 5,
        title: "Batch Similar Tasks",
        description: "Group similar tasks together and complete them in one session to reduce context switching and mental load.",
        category: TipCategory::Efficiency,
    },
    Tip {
        id: 6,
        title: "Follow the 90/20 Rule",
        description: "Work intensely for 90 minutes, then take a 20-minute break. This aligns with your body's natural ultradian rhythm.",
        category: TipCategory::Focus,
    },
    Tip {
        id: 7,
        title: "Implement Inbox Zero",
        description: "Process your email inbox to empty each day. Either respond, delegate, defer, or delete each message.",
        category: TipCategory::Efficiency,
    },
    Tip {
        id: 8,
        title: "Schedule Energy, Not Just Time",
        description: "Match your most demanding tasks to your high-energy periods. Save low-energy tasks for when your focus naturally dips.",
        category: TipCategory::Planning,
    },
];

/// Tips tab state: category filter, cursor, and at most one expanded tip.
#[derive(Debug, Default)]
pub struct TipsView {
    filter: TipFilter,
    cursor: usize,
    expanded: Option<u32>,
}

impl TipsView {
    pub fn filter(&self) -> TipFilter {
        self.filter
    }

    pub fn set_filter(&mut self, filter: TipFilter) {
        self.filter = filter;
        self.cursor = 0;
    }

    pub fn cycle_filter(&mut self) {
        self.set_filter(self.filter.next());
    }

    pub fn visible(&self) -> Vec<&'static Tip> {
        TIPS.iter().filter(|t| self.filter.matches(t)).collect()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn move_cursor(&mut self, down: bool) {
        let len = self.visible().len();
        if len == 0 {
            return;
        }
        self.cursor = if down {
            (self.cursor + 1) % len
        } else {
            (self.cursor + len - 1) % len
        };
    }

    /// Expands the tip under the cursor, or collapses it if it was already expanded.
    pub fn toggle(&mut self) {
        let Some(tip) = self.visible().get(self.cursor).copied() else {
            return;
        };
        self.expanded = if self.expanded == Some(tip.id) {
            None
        } else {
            Some(tip.id)
        };
    }

    pub fn is_expanded(&self, tip: &Tip) -> bool {
        self.expanded == Some(tip.id)
    }
}
