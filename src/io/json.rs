//! JSON I/O for standards datasets and configuration files.

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Reads any deserializable value from a JSON file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file =
        File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))?;
    let reader = BufReader::new(file);

    let value: T = serde_json::from_reader(reader)
        .with_context(|| format!("Failed to deserialize JSON from: {}", path.display()))?;

    Ok(value)
}

/// Writes a value to a pretty-printed JSON file.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create file: {}", path.display()))?;
    let writer = BufWriter::new(file);

    serde_json::to_writer_pretty(writer, value)
        .with_context(|| format!("Failed to serialize JSON to: {}", path.display()))?;

    Ok(())
}
