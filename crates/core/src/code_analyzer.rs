//! Local Code Analysis
//!
//! Scans a project directory on the local disk and asks the text generator for
//! an architecture map of it. Only the layout and the dependency names are
//! sent; file contents are never read.

use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{debug, info, instrument};

use crate::{
    llm_client::{GenerationError, TextGenerator},
    prompts::Prompts,
};

/// Directories nested deeper than this are listed without their contents.
pub const MAX_SCAN_DEPTH: usize = 2;

const MANIFEST: &str = "package.json";

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("{0} must not be blank")]
    Blank(&'static str),
    #[error("{0} is not a directory")]
    NotADirectory(String),
    #[error("directory scan did not finish")]
    ScanAborted,
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Dir,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ProjectEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectAnalysis {
    pub name: String,
    pub structure: Vec<ProjectEntry>,
    pub dependencies: Vec<String>,
    pub architecture: String,
}

fn is_skipped(name: &str) -> bool {
    name.starts_with('.') || name == "node_modules"
}

/// Lists `dir` and its subdirectories down to [`MAX_SCAN_DEPTH`], sorted by
/// name. Dotfiles and `node_modules` are skipped; unreadable directories are
/// listed as empty.
pub fn scan_directory(dir: &Path) -> Vec<ProjectEntry> {
    scan_level(dir, 0)
}

fn scan_level(dir: &Path, depth: usize) -> Vec<ProjectEntry> {
    if depth > MAX_SCAN_DEPTH {
        return Vec::new();
    }
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(path = %dir.display(), error = %e, "Skipping unreadable directory");
            return Vec::new();
        }
    };

    let mut items: Vec<ProjectEntry> = entries
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().to_string();
            if is_skipped(&name) {
                return None;
            }
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            Some(if is_dir {
                ProjectEntry {
                    children: scan_level(&entry.path(), depth + 1),
                    name,
                    kind: EntryKind::Dir,
                }
            } else {
                ProjectEntry {
                    name,
                    kind: EntryKind::File,
                    children: Vec::new(),
                }
            })
        })
        .collect();
    items.sort_by(|a, b| a.name.cmp(&b.name));
    items
}

/// Dependency names from the project's `package.json`, sorted. A missing or
/// unparseable manifest yields no dependencies.
pub fn read_dependencies(dir: &Path) -> Vec<String> {
    let Ok(raw) = fs::read_to_string(dir.join(MANIFEST)) else {
        return Vec::new();
    };
    let manifest: serde_json::Value = match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            debug!(error = %e, "Ignoring unparseable manifest");
            return Vec::new();
        }
    };
    let mut names: Vec<String> = manifest
        .get("dependencies")
        .and_then(|deps| deps.as_object())
        .map(|deps| deps.keys().cloned().collect())
        .unwrap_or_default();
    names.sort();
    names
}

pub struct CodeAnalyzer {
    llm: Arc<dyn TextGenerator>,
    prompts: Arc<Prompts>,
}

impl CodeAnalyzer {
    pub fn new(llm: Arc<dyn TextGenerator>, prompts: Arc<Prompts>) -> Self {
        Self { llm, prompts }
    }

    /// Scans `path` and generates the architecture map of project `name`.
    #[instrument(skip(self))]
    pub async fn analyze(&self, path: &str, name: &str) -> Result<ProjectAnalysis, AnalysisError> {
        let path = path.trim();
        let name = name.trim();
        if path.is_empty() {
            return Err(AnalysisError::Blank("path"));
        }
        if name.is_empty() {
            return Err(AnalysisError::Blank("name"));
        }
        let root = PathBuf::from(path);
        if !root.is_dir() {
            return Err(AnalysisError::NotADirectory(path.to_string()));
        }

        let (structure, dependencies) = tokio::task::spawn_blocking(move || {
            (scan_directory(&root), read_dependencies(&root))
        })
        .await
        .map_err(|_| AnalysisError::ScanAborted)?;
        info!(entries = structure.len(), dependencies = dependencies.len(), "Project scanned");

        let layout = serde_json::to_string_pretty(&structure).unwrap_or_default();
        let mut prompt = format!("Project: {name}\nPath: {path}\nDirectory structure: {layout}\n");
        if !dependencies.is_empty() {
            prompt.push_str(&format!("Dependencies: {}\n", dependencies.join(", ")));
        }
        prompt.push_str(
            "\nFor this project give:\n\
             1. An architecture map (ASCII art, including data flow)\n\
             2. Its core responsibility (one sentence)\n\
             3. Three to five concepts to learn, level 1 being the most basic",
        );
        let architecture = self.llm.generate(&prompt, &self.prompts.analyzer).await?;

        Ok(ProjectAnalysis {
            name: name.to_string(),
            structure,
            dependencies,
            architecture,
        })
    }
}
