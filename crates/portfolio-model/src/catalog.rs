//! Project and certificate catalogs loaded from the site's JSON data files.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_PROJECT_ICON: &str = "fas fa-code";

pub const DEFAULT_PROJECT_IMPACT: &str =
    "Demonstrated practical application of security principles and tools.";

pub const PROJECTS_MISSING_MESSAGE: &str =
    "Projects data not found. Please add projects.json file.";

pub const CERTIFICATES_MISSING_MESSAGE: &str =
    "Certificates data not found. Please add certificates.json file.";

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid catalog {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub title: String,
    pub short_description: String,
    #[serde(default)]
    pub full_description: String,
    pub technologies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub achievements: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub name: String,
    pub issuer: String,
    pub date: String,
    /// File name relative to the certificates directory.
    pub file: String,
}

impl Certificate {
    pub fn document_path(&self, certificates_dir: &Path) -> PathBuf {
        certificates_dir.join(&self.file)
    }

    /// Name of the PNG written for this certificate's card preview.
    pub fn preview_file_name(&self) -> String {
        let stem = Path::new(&self.file)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .filter(|stem| !stem.is_empty())
            .unwrap_or("certificate");

        format!("{stem}.png")
    }
}

pub fn load_projects(path: &Path) -> Result<Vec<Project>, CatalogError> {
    load_json(path)
}

pub fn load_certificates(path: &Path) -> Result<Vec<Certificate>, CatalogError> {
    load_json(path)
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, CatalogError> {
    let bytes =
        fs::read(path).map_err(|source| CatalogError::Io { path: path.to_path_buf(), source })?;

    serde_json::from_slice(&bytes)
        .map_err(|source| CatalogError::Json { path: path.to_path_buf(), source })
}

/// Summary shown in the projects grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectCard {
    pub title: String,
    pub icon: String,
    pub description: String,
    pub technologies: Vec<String>,
}

impl From<&Project> for ProjectCard {
    fn from(project: &Project) -> Self {
        Self {
            title: project.title.clone(),
            icon: project.icon.clone().unwrap_or_else(|| DEFAULT_PROJECT_ICON.to_owned()),
            description: project.short_description.clone(),
            technologies: project.technologies.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "content", rename_all = "snake_case")]
pub enum SectionBody {
    Paragraph(String),
    List(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetailSection {
    pub heading: &'static str,
    pub body: SectionBody,
}

/// Expanded project view opened from a card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectDetail {
    pub title: String,
    pub technologies: Vec<String>,
    pub sections: Vec<DetailSection>,
}

impl From<&Project> for ProjectDetail {
    fn from(project: &Project) -> Self {
        let mut sections = vec![DetailSection {
            heading: "Overview",
            body: SectionBody::Paragraph(project.full_description.clone()),
        }];

        if !project.features.is_empty() {
            sections.push(DetailSection {
                heading: "Key Features",
                body: SectionBody::List(project.features.clone()),
            });
        }

        if !project.achievements.is_empty() {
            sections.push(DetailSection {
                heading: "Achievements",
                body: SectionBody::List(project.achievements.clone()),
            });
        }

        sections.push(DetailSection {
            heading: "Impact",
            body: SectionBody::Paragraph(
                project.impact.clone().unwrap_or_else(|| DEFAULT_PROJECT_IMPACT.to_owned()),
            ),
        });

        Self { title: project.title.clone(), technologies: project.technologies.clone(), sections }
    }
}

impl fmt::Display for ProjectDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title)?;
        writeln!(f, "[{}]", self.technologies.join(", "))?;

        for section in &self.sections {
            writeln!(f)?;
            writeln!(f, "{}", section.heading)?;
            match &section.body {
                SectionBody::Paragraph(text) => writeln!(f, "{text}")?,
                SectionBody::List(items) => {
                    for item in items {
                        writeln!(f, "- {item}")?;
                    }
                }
            }
        }

        Ok(())
    }
}
