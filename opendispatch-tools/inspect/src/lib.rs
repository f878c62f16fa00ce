//! Manifest-driven inspection of open method resolution.
//!
//! Reads a hierarchy manifest (see [`manifest`]), runs the resolution
//! compiler over it and renders the report and dispatch tables.

pub mod manifest;
pub mod render;

use std::path::Path;

use opendispatch::{compile, CompileOptions, CompiledTables, DispatchError};
use thiserror::Error;

pub use manifest::{Manifest, ManifestError};
pub use render::{inspect, render_json, render_text, Inspection};

#[derive(Debug, Error)]
pub enum InspectError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("resolution failed: {0}")]
    Dispatch(#[from] DispatchError),
}

/// Compile the manifest's hierarchy.
///
/// With `strict` off, ambiguous cells are reported instead of failing.
pub fn compile_manifest(manifest: &Manifest, strict: bool) -> Result<CompiledTables, InspectError> {
    let (classes, methods) = manifest.declarations()?;
    let options = CompileOptions {
        trace: manifest.registry.trace,
        strict,
    };
    tracing::debug!(
        classes = classes.len(),
        methods = methods.len(),
        strict,
        "compiling manifest"
    );
    Ok(compile(&classes, &methods, &options)?)
}

/// Load and compile a manifest file.
pub fn compile_file(path: impl AsRef<Path>, strict: bool) -> Result<CompiledTables, InspectError> {
    compile_manifest(&Manifest::from_file(path)?, strict)
}
