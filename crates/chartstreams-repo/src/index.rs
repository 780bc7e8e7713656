//! Public chart catalog
//!
//! The catalog is the sorted list of every known (name, version), rendered
//! as a Helm-compatible `index.yaml` document.

use chartstreams_core::{ChartMetadata, Maintainer};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;
use crate::git::CommitRef;

/// Digest published in the catalog
///
/// Archives are only built on request, so their real digest is not known
/// when the catalog is generated.
pub const DIGEST_PLACEHOLDER: &str = "deadbeef";

/// One chart version as published in the index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub name: String,

    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub maintainers: Vec<Maintainer>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deprecated: bool,

    /// Download paths; the first one is served by this repository
    pub urls: Vec<String>,

    pub digest: String,

    /// Timestamp of the commit that introduced this version
    pub created: DateTime<Utc>,
}

impl CatalogEntry {
    /// Build the entry for a chart introduced by `commit`
    pub fn from_chart(metadata: &ChartMetadata, commit: &CommitRef, url_prefix: &str) -> Self {
        Self {
            name: metadata.name.clone(),
            version: metadata.version.clone(),
            api_version: metadata.api_version.clone(),
            app_version: metadata.app_version.clone(),
            description: metadata.description.clone(),
            home: metadata.home.clone(),
            icon: metadata.icon.clone(),
            sources: metadata.sources.clone(),
            keywords: metadata.keywords.clone(),
            maintainers: metadata.maintainers.clone(),
            annotations: metadata.annotations.clone(),
            r#type: metadata.r#type.clone(),
            deprecated: metadata.deprecated,
            urls: vec![download_path(url_prefix, &metadata.name, &metadata.version)],
            digest: DIGEST_PLACEHOLDER.to_string(),
            created: commit.timestamp,
        }
    }

    /// Path a client requests to download this version
    pub fn download_path(&self) -> &str {
        self.urls.first().map(String::as_str).unwrap_or_default()
    }
}

/// `{prefix}/{name}/{version}`, tolerating a trailing slash on the prefix
pub fn download_path(prefix: &str, name: &str, version: &str) -> String {
    format!("{}/{}/{}", prefix.trim_end_matches('/'), name, version)
}

/// Immutable, sorted catalog of every indexed chart version
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    /// Create a catalog, ordering entries by name then version (byte-wise)
    pub fn new(mut entries: Vec<CatalogEntry>) -> Self {
        entries.sort_by(|a, b| (&a.name, &a.version).cmp(&(&b.name, &b.version)));
        Self { entries }
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up one version
    pub fn get(&self, name: &str, version: &str) -> Option<&CatalogEntry> {
        self.entries
            .binary_search_by(|e| (e.name.as_str(), e.version.as_str()).cmp(&(name, version)))
            .ok()
            .map(|i| &self.entries[i])
    }

    /// Distinct chart names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.iter().map(|e| e.name.as_str()).collect();
        names.dedup();
        names
    }

    /// Newest commit timestamp among the entries, epoch for an empty catalog
    pub fn generated(&self) -> DateTime<Utc> {
        self.entries
            .iter()
            .map(|e| e.created)
            .max()
            .unwrap_or_default()
    }

    /// Render as a Helm `index.yaml` document
    pub fn to_index_file(&self) -> IndexFile {
        let mut entries: BTreeMap<String, Vec<CatalogEntry>> = BTreeMap::new();
        for entry in &self.entries {
            entries
                .entry(entry.name.clone())
                .or_default()
                .push(entry.clone());
        }

        IndexFile {
            api_version: "v1".to_string(),
            generated: self.generated(),
            entries,
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.to_index_file())?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_index_file())?)
    }
}

/// Helm repository index document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexFile {
    pub api_version: String,
    pub generated: DateTime<Utc>,
    #[serde(default)]
    pub entries: BTreeMap<String, Vec<CatalogEntry>>,
}

impl IndexFile {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Get a specific version of a chart
    pub fn get_version(&self, name: &str, version: &str) -> Option<&CatalogEntry> {
        self.entries
            .get(name)?
            .iter()
            .find(|e| e.version == version)
    }
}
