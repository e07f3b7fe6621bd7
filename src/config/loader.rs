// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{Manifest, RawManifest};
use crate::errors::Result;

/// Manifest encodings understood by the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Json,
    Toml,
}

impl ManifestFormat {
    /// Pick the encoding from the file extension. Anything that is not
    /// `.toml` is read as JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => ManifestFormat::Toml,
            _ => ManifestFormat::Json,
        }
    }
}

/// Decode a manifest from a string without shape validation.
pub fn parse_manifest(contents: &str, format: ManifestFormat) -> Result<RawManifest> {
    let raw = match format {
        ManifestFormat::Json => serde_json::from_str(contents)?,
        ManifestFormat::Toml => toml::from_str(contents)?,
    };
    Ok(raw)
}

/// Load a manifest file from a given path and return the raw `RawManifest`.
///
/// This only performs deserialization; use [`load_and_validate`] for the
/// shape checks.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawManifest> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    let format = ManifestFormat::from_path(path);
    debug!(path = %path.display(), ?format, "read manifest file");
    parse_manifest(&contents, format)
}

/// Load a manifest from path and run shape validation.
///
/// This is the recommended entry point for the rest of the application.
/// Reference checks (unknown modules, cycles) are done per target by
/// [`build_graph`](crate::dag::build_graph).
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<Manifest> {
    let raw = load_from_path(&path)?;
    let manifest = Manifest::try_from(raw)?;
    Ok(manifest)
}

/// Default manifest location: `depbuild.json` in the current working
/// directory.
pub fn default_manifest_path() -> PathBuf {
    PathBuf::from("depbuild.json")
}
