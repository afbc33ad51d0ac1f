use crate::session::Session;
use crate::theme::Theme;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Everything the app keeps on the local machine.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct LocalState {
    #[serde(default)]
    pub session: Option<Session>,
    #[serde(default)]
    pub theme: Option<Theme>,
}

#[derive(Clone)]
pub struct Storage {
    path: PathBuf,
}

impl Storage {
    pub fn get_base_dir() -> Result<PathBuf> {
        let mut path =
            dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Could not find home directory"))?;
        path.push(".sahayak");
        if !path.exists() {
            fs::create_dir_all(&path)?;
        }
        Ok(path)
    }

    pub fn new() -> Result<Self> {
        let path = Self::get_base_dir()?;
        Ok(Self::from_path(path.join("state.json")))
    }

    pub fn from_path(path: PathBuf) -> Self {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                let _ = fs::create_dir_all(parent);
            }
        }
        Self { path }
    }

    pub fn load(&self) -> Result<LocalState> {
        if !self.path.exists() {
            return Ok(LocalState::default());
        }
        let data = fs::read_to_string(&self.path)?;
        let state = serde_json::from_str(&data)?;
        Ok(state)
    }

    pub fn save(&self, state: &LocalState) -> Result<()> {
        let data = serde_json::to_string_pretty(state)?;
        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, &data)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    pub fn update(&self, f: impl FnOnce(&mut LocalState)) -> Result<LocalState> {
        let mut state = self.load()?;
        f(&mut state);
        self.save(&state)?;
        Ok(state)
    }
}
