//! Image manifest model
//!
//! A manifest names an image and lists, in stacking order, the layers it
//! depends on. Its serialized form is stored as the `manifest` entry of the
//! image archive.

use crate::error::{Error, Result};
use crate::hash::Blake3Hash;
use serde::{Deserialize, Serialize};

/// Format discriminator carried in every manifest
pub const IMAGE_MANIFEST_KIND: &str = "ImageManifest";

/// Manifest schema version written by this tool
pub const AC_VERSION: &str = "0.7.4";

/// A key/value pair used to disambiguate images sharing a name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    pub value: String,
}

impl Label {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Returns true if every label in `wanted` is present in `have`.
pub fn labels_match(have: &[Label], wanted: &[Label]) -> bool {
    wanted.iter().all(|w| have.contains(w))
}

/// Reference to a layer: name, content hash and optional labels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    #[serde(rename = "imageName")]
    pub image_name: String,

    /// Content hash of the layer's archive. When absent the layer is
    /// discovered by name and labels.
    #[serde(rename = "imageID", default, skip_serializing_if = "Option::is_none")]
    pub image_id: Option<Blake3Hash>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<Label>,
}

impl Dependency {
    /// Dependency pinned to a specific content hash
    pub fn pinned(image_name: impl Into<String>, image_id: Blake3Hash, labels: Vec<Label>) -> Self {
        Self {
            image_name: image_name.into(),
            image_id: Some(image_id),
            labels,
        }
    }
}

/// Per-image metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(rename = "acKind")]
    pub ac_kind: String,

    #[serde(rename = "acVersion")]
    pub ac_version: String,

    pub name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<Label>,

    /// Direct dependencies; order determines layer stacking at render time
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Dependency>,
}

impl Manifest {
    /// Create a manifest with no labels and no dependencies
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self {
            ac_kind: IMAGE_MANIFEST_KIND.to_string(),
            ac_version: AC_VERSION.to_string(),
            name,
            labels: Vec::new(),
            dependencies: Vec::new(),
        })
    }

    pub fn with_dependencies(mut self, dependencies: Vec<Dependency>) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Decode and validate a manifest
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let manifest: Manifest =
            serde_json::from_slice(bytes).map_err(|e| Error::decode("image manifest", e))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Canonical serialized form
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| Error::decode("image manifest", e))
    }

    pub fn validate(&self) -> Result<()> {
        if self.ac_kind != IMAGE_MANIFEST_KIND {
            return Err(Error::decode(
                "image manifest",
                format!("acKind must be {}, got '{}'", IMAGE_MANIFEST_KIND, self.ac_kind),
            ));
        }
        validate_name(&self.name)?;
        for dep in &self.dependencies {
            validate_name(&dep.image_name)?;
        }
        Ok(())
    }
}

/// Check an image name: lowercase ASCII alphanumerics and `-._~/`,
/// beginning with an alphanumeric.
pub fn validate_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let first_ok = chars
        .next()
        .map(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .unwrap_or(false);
    let rest_ok = chars.all(|c| {
        c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '.' | '_' | '~' | '/')
    });
    if first_ok && rest_ok {
        Ok(())
    } else {
        Err(Error::InvalidName(name.to_string()))
    }
}
