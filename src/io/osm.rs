//! OSM file I/O.
//!
//! OSM is the native text format of the OpenStudio SDK. Reading and writing
//! go through [`Model`], which preserves record order and field labels.

use crate::osm::Model;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Writes a model to an OSM file.
///
/// # Example
/// ```no_run
/// use bemstd::osm::{Model, Record};
/// use bemstd::io::write_osm;
/// use std::path::Path;
///
/// let mut model = Model::new();
/// model.add(Record::named("OS:Material", "Brick"));
/// write_osm(Path::new("model.osm"), &model).unwrap();
/// ```
pub fn write_osm(path: &Path, model: &Model) -> Result<()> {
    fs::write(path, model.to_osm_string())
        .with_context(|| format!("Failed to write OSM file: {}", path.display()))?;
    Ok(())
}

/// Reads a model from an OSM file.
pub fn read_osm(path: &Path) -> Result<Model> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to open file: {}", path.display()))?;
    let model = Model::from_osm_str(&text)
        .with_context(|| format!("Failed to parse OSM file: {}", path.display()))?;
    Ok(model)
}
