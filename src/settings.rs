use crate::error::AppError;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// How restore paces application launches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenMode {
    AllAtOnce,
    OneByOne,
}

/// Runtime configuration, loaded once at startup and passed explicitly to the
/// tracker and the restore sequencer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub open_mode: OpenMode,
    pub icon_path: String,
    /// Seconds between reconciliation ticks.
    pub poll_interval_secs: u64,
    /// How long a closed window stays recorded before it is evicted.
    pub closure_grace_secs: i64,
    /// Wait after launching an application before looking for its window.
    pub settle_delay_secs: u64,
    /// Extra pause between launches in one_by_one mode.
    pub paced_delay_secs: u64,
    /// App name (lowercase) to launch command, used when the process table
    /// cannot resolve an executable and when relaunching at restore.
    pub known_executables: HashMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            open_mode: OpenMode::AllAtOnce,
            icon_path: "default_icon.ico".to_string(),
            poll_interval_secs: 5,
            closure_grace_secs: 120,
            settle_delay_secs: 1,
            paced_delay_secs: 2,
            known_executables: default_known_executables(),
        }
    }
}

fn default_known_executables() -> HashMap<String, String> {
    [
        ("chrome", "google-chrome"),
        ("chromium", "chromium"),
        ("firefox", "firefox"),
        ("code", "code"),
    ]
    .iter()
    .map(|(name, cmd)| (name.to_string(), cmd.to_string()))
    .collect()
}

impl Settings {
    /// Load settings from `path`, falling back to defaults when the file is
    /// missing or malformed. Configuration problems never block startup.
    pub fn load(path: &Path) -> Self {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(_) => return Self::default(),
        };

        match serde_json::from_str(&raw) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("malformed settings file {}: {}, using defaults", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), AppError> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| AppError::Settings(e.to_string()))?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Look up a launch command for an app name: exact (lowercased) match
    /// first, then any known name contained in it.
    pub fn known_executable(&self, app_name: &str) -> Option<String> {
        let needle = app_name.to_lowercase();
        if let Some(cmd) = self.known_executables.get(&needle) {
            return Some(cmd.clone());
        }
        self.known_executables
            .iter()
            .find(|(name, _)| needle.contains(name.as_str()))
            .map(|(_, cmd)| cmd.clone())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }

    pub fn paced_delay(&self) -> Duration {
        Duration::from_secs(self.paced_delay_secs)
    }
}
