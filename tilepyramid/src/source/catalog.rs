//! Dataset lookup and access control.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tracing::debug;

use super::TileSource;
use crate::metadata::PyramidMetadata;

/// Errors from opening a pyramid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("Pyramid '{0}' not found")]
    NotFound(String),

    #[error("Access to pyramid '{name}' requires '{required}'")]
    AccessDenied { name: String, required: String },
}

/// Roles held by the caller of a request.
///
/// A pyramid with an empty or absent protection level is public. Otherwise
/// the caller needs a role equal to it, compared case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessPolicy {
    roles: Vec<String>,
}

impl AccessPolicy {
    /// A caller with no roles; can only read public pyramids.
    pub fn public() -> Self {
        Self::default()
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    pub fn permits(&self, protection_level: Option<&str>) -> bool {
        match protection_level.map(str::trim) {
            None | Some("") => true,
            Some(level) => self.roles.iter().any(|r| r.trim().eq_ignore_ascii_case(level)),
        }
    }
}

/// An opened dataset: its metadata snapshot and tile source.
#[derive(Clone)]
pub struct Pyramid {
    name: String,
    metadata: Arc<PyramidMetadata>,
    source: Arc<dyn TileSource>,
}

impl Pyramid {
    pub fn new(
        name: impl Into<String>,
        metadata: Arc<PyramidMetadata>,
        source: Arc<dyn TileSource>,
    ) -> Self {
        Self {
            name: name.into(),
            metadata,
            source,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metadata(&self) -> &PyramidMetadata {
        &self.metadata
    }

    pub fn source(&self) -> &dyn TileSource {
        self.source.as_ref()
    }
}

impl fmt::Debug for Pyramid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pyramid")
            .field("name", &self.name)
            .field("max_zoom", &self.metadata.max_zoom_level())
            .finish_non_exhaustive()
    }
}

/// Finds pyramids by name.
pub trait PyramidCatalog: Send + Sync {
    /// Opens a pyramid for reading.
    ///
    /// # Errors
    ///
    /// [`CatalogError::NotFound`] when no such pyramid exists and
    /// [`CatalogError::AccessDenied`] when `access` does not satisfy its
    /// protection level.
    fn open(&self, name: &str, access: &AccessPolicy) -> Result<Pyramid, CatalogError>;
}

/// Catalog of pyramids registered in memory.
#[derive(Default)]
pub struct MemoryCatalog {
    pyramids: DashMap<String, Pyramid>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a pyramid, replacing any with the same name.
    pub fn register(
        &self,
        name: impl Into<String>,
        metadata: PyramidMetadata,
        source: Arc<dyn TileSource>,
    ) {
        let name = name.into();
        let pyramid = Pyramid::new(name.clone(), Arc::new(metadata), source);
        self.pyramids.insert(name, pyramid);
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.pyramids.remove(name).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.pyramids.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

impl PyramidCatalog for MemoryCatalog {
    fn open(&self, name: &str, access: &AccessPolicy) -> Result<Pyramid, CatalogError> {
        let pyramid = self
            .pyramids
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| CatalogError::NotFound(name.to_string()))?;

        let protection = pyramid.metadata().protection_level.as_deref();
        if !access.permits(protection) {
            debug!(pyramid = %name, required = ?protection, "Access denied");
            return Err(CatalogError::AccessDenied {
                name: name.to_string(),
                required: protection.unwrap_or_default().to_string(),
            });
        }
        Ok(pyramid)
    }
}
