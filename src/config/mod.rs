// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Configuration system for onair.
//!
//! Two documents:
//! - `ShowFile` (YAML): the studio and the rundown to play, down to the
//!   timeline objects nested in each piece
//! - `Settings` (TOML): engine settings for logging, ingest and playout

pub mod watcher;

pub use watcher::{validate_show, ShowEvent, ShowWatcher};

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::rundown::{Rundown, Segment};
use crate::studio::Studio;
use crate::timeline::TimelineObject;

/// Root of a show document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShowFile {
    /// Studio layers and lookahead policy
    pub studio: Studio,
    /// The rundown to play
    pub rundown: RundownConfig,
}

impl ShowFile {
    /// Load a show from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read show file: {:?}", path.as_ref()))?;
        Self::from_yaml(&contents)
    }

    /// Parse a show from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse show YAML")
    }

    /// Serialize to a YAML string
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize show to YAML")
    }

    /// Save the show to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = self.to_yaml()?;
        fs::write(path.as_ref(), yaml)
            .with_context(|| format!("Failed to write show file: {:?}", path.as_ref()))
    }

    /// Build an inactive rundown from the document
    pub fn to_rundown(&self) -> Rundown {
        let config = &self.rundown;
        let mut rundown = Rundown::new(&config.id, &config.name);
        if let Some(variant) = &config.show_style_variant {
            rundown = rundown.with_show_style_variant(variant);
        }
        for object in &config.baseline {
            rundown = rundown.with_baseline_object(object.clone());
        }
        for segment in self.segments() {
            rundown = rundown.with_segment(segment);
        }
        rundown
    }

    /// Segments with ownership ids filled in, as a live rundown holds them
    pub fn segments(&self) -> Vec<Segment> {
        Rundown::new(&self.rundown.id, "")
            .with_segments(self.rundown.segments.iter().cloned())
            .segments()
            .to_vec()
    }
}

/// Rundown section of a show document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RundownConfig {
    /// Rundown identifier
    pub id: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Show style variant
    #[serde(default)]
    pub show_style_variant: Option<String>,
    /// Always-on studio objects
    #[serde(default)]
    pub baseline: Vec<TimelineObject>,
    /// Segments with their parts and pieces
    #[serde(default)]
    pub segments: Vec<Segment>,
}

/// Engine settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Settings {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub playout: PlayoutConfig,
}

impl Settings {
    /// Load settings from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read settings file: {:?}", path.as_ref()))?;
        Self::from_toml(&contents)
    }

    /// Parse settings from a TOML string
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("Failed to parse settings TOML")
    }

    /// Serialize to a TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string(self).context("Failed to serialize settings to TOML")
    }
}

/// Log output settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. "onair=debug"
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

/// Show file ingest settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestConfig {
    /// Debounce for file change events in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Watch the show file and apply edits live
    #[serde(default)]
    pub watch: bool,
}

fn default_debounce_ms() -> u64 {
    500
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            watch: false,
        }
    }
}

/// Playout settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PlayoutConfig {
    /// Start in rehearsal instead of on air
    #[serde(default)]
    pub rehearsal: bool,
    /// Takes to perform after activation
    #[serde(default)]
    pub takes: u32,
}
