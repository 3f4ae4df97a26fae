//! Locating the engine executable.
//!
//! Candidates are tried in order and the first hit wins:
//! an explicitly configured path, the platform binary in the working
//! directory (`lune.exe`, then `lune`), then the ambient `PATH`.

use std::path::{Path, PathBuf};
use which::which;

use crate::errors::ExecutorError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineLocation {
    /// Used as-is when it exists.
    Explicit(PathBuf),
    /// A file name looked up in the working directory.
    WorkingDir(String),
    /// A program name resolved through `PATH`.
    SearchPath(String),
}

impl EngineLocation {
    fn resolve(&self, working_dir: &Path) -> Option<PathBuf> {
        match self {
            EngineLocation::Explicit(path) => path.is_file().then(|| path.clone()),
            EngineLocation::WorkingDir(name) => {
                let candidate = working_dir.join(name);
                candidate
                    .is_file()
                    .then(|| std::path::absolute(&candidate).unwrap_or(candidate))
            }
            EngineLocation::SearchPath(name) => which(name).ok(),
        }
    }

    fn describe(&self) -> String {
        match self {
            EngineLocation::Explicit(path) => path.display().to_string(),
            EngineLocation::WorkingDir(name) => format!("./{}", name),
            EngineLocation::SearchPath(name) => format!("{} on PATH", name),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineLocator {
    working_dir: PathBuf,
    candidates: Vec<EngineLocation>,
}

impl EngineLocator {
    /// The standard search order for an engine called `binary_name`.
    pub fn new(binary_name: &str, working_dir: impl Into<PathBuf>) -> Self {
        let candidates = vec![
            EngineLocation::WorkingDir(format!("{}.exe", binary_name)),
            EngineLocation::WorkingDir(binary_name.to_string()),
            EngineLocation::SearchPath(binary_name.to_string()),
        ];
        Self {
            working_dir: working_dir.into(),
            candidates,
        }
    }

    /// Puts a configured path ahead of every other candidate.
    pub fn with_explicit_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.candidates
            .insert(0, EngineLocation::Explicit(path.into()));
        self
    }

    pub fn from_candidates(working_dir: impl Into<PathBuf>, candidates: Vec<EngineLocation>) -> Self {
        Self {
            working_dir: working_dir.into(),
            candidates,
        }
    }

    pub fn candidates(&self) -> &[EngineLocation] {
        &self.candidates
    }

    pub fn locate(&self) -> Result<PathBuf, ExecutorError> {
        for candidate in &self.candidates {
            if let Some(path) = candidate.resolve(&self.working_dir) {
                log::debug!("Script engine resolved via {:?}: {}", candidate, path.display());
                return Ok(path);
            }
        }
        Err(ExecutorError::EngineNotFound {
            searched: self.candidates.iter().map(EngineLocation::describe).collect(),
        })
    }
}
