//! Prompt Book
//!
//! System instructions for every role the text generator plays. Built-in texts
//! are compiled in; a prompts directory can override any of them by file stem.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("failed to read prompts from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// The instruction text for each role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompts {
    pub abstractor: String,
    pub socratic: String,
    pub curator: String,
    pub implementor: String,
    pub tutor: String,
    pub quiz: String,
    pub curriculum: String,
    pub curriculum_code: String,
    pub verifier: String,
    pub analyzer: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            abstractor: include_str!("../../../prompts/abstractor.md").to_string(),
            socratic: include_str!("../../../prompts/socratic.md").to_string(),
            curator: include_str!("../../../prompts/curator.md").to_string(),
            implementor: include_str!("../../../prompts/implementor.md").to_string(),
            tutor: include_str!("../../../prompts/tutor.md").to_string(),
            quiz: include_str!("../../../prompts/quiz.md").to_string(),
            curriculum: include_str!("../../../prompts/curriculum.md").to_string(),
            curriculum_code: include_str!("../../../prompts/curriculum_code.md").to_string(),
            verifier: include_str!("../../../prompts/verifier.md").to_string(),
            analyzer: include_str!("../../../prompts/analyzer.md").to_string(),
        }
    }
}

impl Prompts {
    /// Applies overrides keyed by prompt name. Unknown keys are ignored.
    pub fn with_overrides(mut self, overrides: HashMap<String, String>) -> Self {
        for (key, content) in overrides {
            let slot = match key.as_str() {
                "abstractor" => &mut self.abstractor,
                "socratic" => &mut self.socratic,
                "curator" => &mut self.curator,
                "implementor" => &mut self.implementor,
                "tutor" => &mut self.tutor,
                "quiz" => &mut self.quiz,
                "curriculum" => &mut self.curriculum,
                "curriculum_code" => &mut self.curriculum_code,
                "verifier" => &mut self.verifier,
                "analyzer" => &mut self.analyzer,
                _ => {
                    warn!(prompt = %key, "Ignoring unknown prompt file");
                    continue;
                }
            };
            debug!(prompt = %key, "Prompt overridden");
            *slot = content;
        }
        self
    }

    /// Loads the built-in prompts, overridden by every `*.md` file in `dir`.
    ///
    /// A missing directory is not an error; the built-ins are used as-is.
    pub fn load(dir: &Path) -> Result<Self, PromptError> {
        if !dir.is_dir() {
            debug!(path = %dir.display(), "No prompts directory, using built-in prompts");
            return Ok(Self::default());
        }
        let io_err = |source| PromptError::Io {
            path: dir.display().to_string(),
            source,
        };

        let mut overrides = HashMap::new();
        for entry in fs::read_dir(dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    let content = fs::read_to_string(&path).map_err(io_err)?;
                    overrides.insert(stem.to_string(), content);
                }
            }
        }
        Ok(Self::default().with_overrides(overrides))
    }
}
