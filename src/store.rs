use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;
use uuid::Uuid;

use crate::models::Student;

/// Read/write boundary for the persisted roster.
pub trait RosterStore {
    async fn load_roster(&self) -> anyhow::Result<Vec<Student>>;

    /// Stores `students` with replace-by-PIN semantics; students not mentioned are kept.
    async fn save_roster(&self, students: &[Student]) -> anyhow::Result<()>;
}

/// Last write wins: an incoming student replaces the existing one with the same PIN,
/// otherwise it is appended.
pub fn merge_roster(existing: Vec<Student>, incoming: Vec<Student>) -> Vec<Student> {
    let mut merged = existing;
    for student in incoming {
        match merged.iter_mut().find(|current| current.pin == student.pin) {
            Some(current) => *current = student,
            None => merged.push(student),
        }
    }
    merged
}

pub struct JsonRosterStore {
    path: PathBuf,
}

impl JsonRosterStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RosterStore for JsonRosterStore {
    async fn load_roster(&self) -> anyhow::Result<Vec<Student>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "roster file missing, starting empty");
                return Ok(Vec::new());
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read roster {}", self.path.display()))
            }
        };

        serde_json::from_str(&raw)
            .with_context(|| format!("roster {} is not valid JSON", self.path.display()))
    }

    async fn save_roster(&self, students: &[Student]) -> anyhow::Result<()> {
        let existing = self.load_roster().await?;
        let merged = merge_roster(existing, students.to_vec());
        let payload = serde_json::to_string_pretty(&merged)?;

        let file_name = format!(".roster-{}.tmp", Uuid::new_v4());
        let tmp = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.join(file_name),
            _ => PathBuf::from(file_name),
        };

        tokio::fs::write(&tmp, payload)
            .await
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("failed to replace roster {}", self.path.display()))?;

        debug!(students = merged.len(), path = %self.path.display(), "roster saved");
        Ok(())
    }
}
