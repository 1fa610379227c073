//! Portfolio content: projects, certificates, stat counters and the viewer
//! settings shared by the front ends.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod catalog;
pub mod counter;

pub use catalog::{
    load_certificates, load_projects, CatalogError, Certificate, DetailSection, Project,
    ProjectCard, ProjectDetail, SectionBody, CERTIFICATES_MISSING_MESSAGE,
    PROJECTS_MISSING_MESSAGE,
};
pub use counter::{CounterAnimation, RevealTrigger};

pub const DEFAULT_VIEWER_SCALE: f32 = 1.5;
pub const DEFAULT_PREVIEW_SCALE: f32 = 0.5;
pub const DEFAULT_COUNTER_SPEED: u32 = 200;
pub const DEFAULT_COUNTER_TICK_MS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Zoom used by the certificate viewer.
    pub viewer_scale: f32,
    /// Zoom used for certificate card previews.
    pub preview_scale: f32,
    pub counter_speed: u32,
    pub counter_tick_ms: u64,
    /// Directory that certificate files and data files are resolved against.
    pub content_root: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            viewer_scale: DEFAULT_VIEWER_SCALE,
            preview_scale: DEFAULT_PREVIEW_SCALE,
            counter_speed: DEFAULT_COUNTER_SPEED,
            counter_tick_ms: DEFAULT_COUNTER_TICK_MS,
            content_root: PathBuf::from("."),
        }
    }
}

impl Settings {
    pub fn certificates_dir(&self) -> PathBuf {
        self.content_root.join("certificates")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.content_root.join("data")
    }
}
