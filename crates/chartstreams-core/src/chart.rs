//! Chart metadata and chart directory detection

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{CoreError, Result};
use crate::tree::WorkTree;

/// Metadata file expected directly beneath every chart directory
pub const CHART_FILE: &str = "Chart.yaml";

/// Chart metadata as declared in `Chart.yaml`
///
/// Only `name` and `version` are required. Unknown keys are ignored so that
/// charts written for any Helm API version can be indexed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMetadata {
    /// Chart API version (v1 or v2)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    /// Chart name (required)
    #[serde(default, deserialize_with = "scalar_string")]
    pub name: String,

    /// Chart version (required, compared byte-wise)
    #[serde(default, deserialize_with = "scalar_string")]
    pub version: String,

    /// Version of the packaged application
    #[serde(
        default,
        deserialize_with = "optional_scalar",
        skip_serializing_if = "Option::is_none"
    )]
    pub app_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Kubernetes version constraint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kube_version: Option<String>,

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

    /// Chart type (application or library)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deprecated: bool,
}

/// Maintainer information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Maintainer {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ChartMetadata {
    /// Parse and validate `Chart.yaml` content
    ///
    /// `origin` only appears in error messages.
    pub fn from_slice(bytes: &[u8], origin: &str) -> Result<Self> {
        let invalid = |message: String| CoreError::InvalidChart {
            path: origin.to_string(),
            message,
        };

        let metadata: ChartMetadata =
            serde_yaml::from_slice(bytes).map_err(|e| invalid(e.to_string()))?;

        if metadata.name.trim().is_empty() {
            return Err(invalid("missing required field: name".to_string()));
        }
        if metadata.version.trim().is_empty() {
            return Err(invalid("missing required field: version".to_string()));
        }
        if !is_path_safe(&metadata.name) {
            return Err(invalid(format!("chart name '{}' is not allowed", metadata.name)));
        }
        if !is_path_safe(&metadata.version) {
            return Err(invalid(format!(
                "chart version '{}' is not allowed",
                metadata.version
            )));
        }

        Ok(metadata)
    }
}

/// Names and versions become URL segments and archive prefixes
fn is_path_safe(value: &str) -> bool {
    value != "." && value != ".." && !value.contains(['/', '\\'])
}

/// Load the metadata of the chart directory at `dir`
///
/// Returns [`CoreError::NotAPackage`] when `dir` is not a directory or has no
/// `Chart.yaml`, and [`CoreError::InvalidChart`] when the file is malformed.
pub fn load_chart_metadata<T: WorkTree + ?Sized>(tree: &T, dir: &Path) -> Result<ChartMetadata> {
    let not_a_package = || CoreError::NotAPackage {
        path: dir.display().to_string(),
    };

    if !tree.is_dir(dir) {
        return Err(not_a_package());
    }

    let chart_file = dir.join(CHART_FILE);
    if !tree.is_file(&chart_file) {
        return Err(not_a_package());
    }

    let bytes = tree.read_file(&chart_file)?;
    ChartMetadata::from_slice(&bytes, &chart_file.display().to_string())
}

/// Accept YAML numbers and booleans where Helm expects a string
fn scalar_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_yaml::Value::deserialize(deserializer)? {
        serde_yaml::Value::String(s) => Ok(s),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        serde_yaml::Value::Null => Ok(String::new()),
        _ => Err(D::Error::custom("expected a string")),
    }
}

fn optional_scalar<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = scalar_string(deserializer)?;
    Ok(if value.is_empty() { None } else { Some(value) })
}
