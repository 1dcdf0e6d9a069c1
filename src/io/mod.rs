//! File I/O for models and datasets.
//!
//! This module provides functions for reading and writing OpenStudio models
//! and the JSON tables the rules are driven by.

pub mod json;
pub mod osm;

pub use json::{read_json, write_json};
pub use osm::{read_osm, write_osm};
