use serde::{Deserialize, Serialize};

use crate::config::{BandList, default_bands};

pub mod manager;

pub use manager::Manager;

/// A named band list as stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Preset {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub bands: BandList,
}

impl Default for Preset {
    fn default() -> Self {
        Self::new("Default", default_bands())
    }
}

impl Preset {
    pub fn new(name: impl Into<String>, bands: BandList) -> Self {
        Self {
            name: name.into(),
            description: None,
            author: None,
            bands,
        }
    }

    pub fn with_description(self, description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..self
        }
    }

    pub fn with_author(self, author: impl Into<String>) -> Self {
        Self {
            author: Some(author.into()),
            ..self
        }
    }

    /// Bands that actually shape the signal.
    pub fn active_bands(&self) -> usize {
        self.bands.iter().filter(|band| !band.bypass).count()
    }

    /// One line for listings: name, band counts and the description if any.
    pub fn summary(&self) -> String {
        let mut line = format!(
            "{} ({}/{} bands active)",
            self.name,
            self.active_bands(),
            self.bands.len()
        );
        if let Some(description) = &self.description {
            line.push_str(" - ");
            line.push_str(description);
        }
        line
    }
}
