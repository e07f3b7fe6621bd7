// src/config/mod.rs

//! Manifest loading and validation for depbuild.
//!
//! - [`model`] defines the serde-backed manifest types.
//! - [`loader`] reads a JSON or TOML manifest from disk.
//! - [`validate`] checks the basic shape (unique, non-empty names).
//!
//! Resolving references and rejecting cycles is per target and lives in
//! [`crate::dag::resolve`].

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{ManifestFormat, default_manifest_path, load_and_validate, load_from_path, parse_manifest};
pub use model::{Manifest, ModuleDescriptor, RawManifest};
