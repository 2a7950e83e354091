use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::workspace::WorkspacePaths;

use super::plot::Plot;

const MANIFEST_FILE: &str = "project.json";
const MANIFEST_VERSION: &str = "1.0.0";
const HISTORY_DIR: &str = "history";
const ACTIVITY_LOG_FILE: &str = "activity.jsonl";

/// A chapter of the manuscript. `draft_text` is the live working text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub draft_text: String,
}

impl Chapter {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            summary: String::new(),
            draft_text: String::new(),
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_draft(mut self, draft: impl Into<String>) -> Self {
        self.draft_text = draft.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub description: String,
}

impl Character {
    pub fn new(name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            role: role.into(),
            description: String::new(),
        }
    }
}

/// Stable manifest describing a fiction project.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(default = "default_manifest_version")]
    pub version: String,
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub synopsis: Option<String>,
    #[serde(default)]
    pub characters: Vec<Character>,
    #[serde(default)]
    pub plot: Plot,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Creates a new manifest with baseline fields filled in.
    pub fn new(title: impl Into<String>) -> Self {
        let timestamp = Utc::now();
        Self {
            version: default_manifest_version(),
            id: Uuid::new_v4(),
            title: title.into(),
            description: None,
            synopsis: None,
            characters: Vec::new(),
            plot: Plot::default(),
            chapters: Vec::new(),
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    pub fn chapter(&self, chapter_id: Uuid) -> Option<&Chapter> {
        self.chapters.iter().find(|c| c.id == chapter_id)
    }

    pub fn chapter_mut(&mut self, chapter_id: Uuid) -> Option<&mut Chapter> {
        self.chapters.iter_mut().find(|c| c.id == chapter_id)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

fn default_manifest_version() -> String {
    MANIFEST_VERSION.to_string()
}

/// Hex SHA-256 of a draft, used to detect on-disk drift without comparing full text.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Convenience wrapper exposing important paths of a project.
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    pub project_root: PathBuf,
    pub manifest_path: PathBuf,
    pub ai_root: PathBuf,
    pub history_dir: PathBuf,
    pub activity_log_path: PathBuf,
}

impl ProjectPaths {
    pub fn new(paths: &WorkspacePaths, project_id: Uuid) -> Self {
        let id = project_id.to_string();
        let root = paths.project_user_layer(&id);
        let ai_root = paths.project_ai_layer(&id);
        Self {
            project_root: root.clone(),
            manifest_path: root.join(MANIFEST_FILE),
            history_dir: ai_root.join(HISTORY_DIR),
            activity_log_path: ai_root.join(ACTIVITY_LOG_FILE),
            ai_root,
        }
    }

    pub fn timeline_path(&self, chapter_id: Uuid) -> PathBuf {
        self.history_dir.join(format!("{chapter_id}.json"))
    }
}
