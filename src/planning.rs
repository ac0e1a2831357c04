//! Caller-supplied planning configuration

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Maximum number of schedule entries in a single planning (one week).
pub const MAX_ENTRIES: usize = 7;

/// A planning render request.
///
/// Deserializes from the same camelCase shape the desktop front-end sends:
///
/// ```
/// let cfg: streamplan::PlanningConfig = serde_json::from_str(r#"{
///     "destFile": "/tmp/out.jpg",
///     "entries": [{ "day": "Monday", "time": "20:00", "label": "Just Chatting" }]
/// }"#).unwrap();
/// assert_eq!(cfg.entries.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanningConfig {
    /// Where the final image is written
    #[serde(default)]
    pub dest_file: Option<PathBuf>,
    /// Heading of the planning
    #[serde(default)]
    pub title: Option<String>,
    /// Secondary heading, usually the week range
    #[serde(default)]
    pub subtitle: Option<String>,
    /// Ordered schedule entries
    #[serde(default)]
    pub entries: Vec<ScheduleEntry>,
}

/// One day of the planning
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    pub day: String,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    /// Day without a stream
    #[serde(default)]
    pub off: bool,
}

impl ScheduleEntry {
    /// A streamed day
    pub fn on(day: &str, time: &str, label: &str) -> Self {
        Self {
            day: day.to_string(),
            time: Some(time.to_string()),
            label: Some(label.to_string()),
            off: false,
        }
    }

    /// A day off
    pub fn off(day: &str) -> Self {
        Self {
            day: day.to_string(),
            off: true,
            ..Default::default()
        }
    }
}

impl PlanningConfig {
    /// Destination path, rejecting a missing or blank one.
    pub fn destination(&self) -> Result<&PathBuf> {
        match &self.dest_file {
            Some(p) if !p.as_os_str().is_empty() => Ok(p),
            _ => Err(Error::ConfigurationError("missing destFile".into())),
        }
    }

    /// Check the planning is renderable, returning its destination.
    pub fn validate(&self) -> Result<&Path> {
        let dest = self.destination()?;

        if self.entries.is_empty() {
            return Err(Error::ConfigurationError("planning has no entries".into()));
        }
        if self.entries.len() > MAX_ENTRIES {
            return Err(Error::ConfigurationError(format!(
                "planning has {} entries, at most {} allowed",
                self.entries.len(),
                MAX_ENTRIES
            )));
        }

        for (i, entry) in self.entries.iter().enumerate() {
            if entry.day.trim().is_empty() {
                return Err(Error::ConfigurationError(format!("entry {} has no day", i)));
            }
            let has_time = entry.time.as_deref().is_some_and(|t| !t.trim().is_empty());
            if !entry.off && !has_time {
                return Err(Error::ConfigurationError(format!(
                    "entry {} ({}) is not a day off but has no time",
                    i, entry.day
                )));
            }
        }
        Ok(dest.as_path())
    }
}
