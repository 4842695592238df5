//! Prompt files: one YAML document per task naming the model and the prompt.
//!
//! ```yaml
//! model: fal-ai/nano-banana-pro/edit
//! prompt: |
//!   Dress the [AVATAR_DESCRIPTION] in the [CLOTH_TYPE] ...
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::http::ApiError;

pub const AVATAR_DESCRIPTION: &str = "[AVATAR_DESCRIPTION]";
pub const CLOTH_TYPE: &str = "[CLOTH_TYPE]";

pub const VALIDATE_IMAGE: &str = "validate-image.yaml";
pub const WEAR_MODEL: &str = "wear-model.yaml";

/// Prompt file for photoshoot shot 1..=3.
pub fn photoshoot_prompt(shot: u8) -> Option<&'static str> {
    match shot {
        1 => Some("photoshoot-1-studio-front.yaml"),
        2 => Some("photoshoot-2-angled-lookbook.yaml"),
        3 => Some("photoshoot-3-editorial-pose.yaml"),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PromptConfig {
    pub model: String,
    pub prompt: String,
}

impl PromptConfig {
    /// Substitute every occurrence of each placeholder.
    pub fn render(&self, substitutions: &[(&str, &str)]) -> String {
        substitutions
            .iter()
            .fold(self.prompt.clone(), |acc, (placeholder, value)| {
                acc.replace(placeholder, value)
            })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("Failed to read prompt config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid prompt config: {}", path.display())]
    Invalid { path: PathBuf },
}

impl From<PromptError> for ApiError {
    fn from(err: PromptError) -> Self {
        ApiError::internal(err.to_string())
    }
}

/// Reads prompt files from a directory on each call so edits apply without
/// a restart.
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    dir: PathBuf,
}

impl PromptLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn load(&self, filename: &str) -> Result<PromptConfig, PromptError> {
        let path = self.dir.join(filename);
        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| PromptError::Io {
                path: path.clone(),
                source,
            })?;

        serde_yaml::from_str(&raw).map_err(|_| PromptError::Invalid { path })
    }
}
