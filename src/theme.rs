use ratatui::style::Color;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    /// Saved preference, or dark when nothing was saved.
    pub fn resolve(saved: Option<Theme>) -> Self {
        saved.unwrap_or(Theme::Dark)
    }

    pub fn toggle(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    pub fn palette(self) -> Palette {
        match self {
            Theme::Dark => Palette {
                text: Color::White,
                muted: Color::Gray,
                accent: Color::Cyan,
                highlight: Color::LightBlue,
            },
            Theme::Light => Palette {
                text: Color::Black,
                muted: Color::DarkGray,
                accent: Color::Blue,
                highlight: Color::Blue,
            },
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Theme::Light => f.write_str("light"),
            Theme::Dark => f.write_str("dark"),
        }
    }
}

impl FromStr for Theme {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => anyhow::bail!("Unknown theme '{}' (expected light or dark)", other),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub text: Color,
    pub muted: Color,
    pub accent: Color,
    pub highlight: Color,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_and_default() {
        assert_eq!(Theme::resolve(None), Theme::Dark);
        assert_eq!(Theme::resolve(Some(Theme::Light)), Theme::Light);
        assert_eq!(Theme::Dark.toggle(), Theme::Light);
        assert_eq!("LIGHT".parse::<Theme>().unwrap(), Theme::Light);
    }
}
