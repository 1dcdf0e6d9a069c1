//! OpenStudio model text records.
//!
//! This module reads, queries, edits and writes the OSM format saved by the
//! OpenStudio SDK. Records reference each other through braced-UUID handles.

pub mod model;
pub mod parse;
pub mod record;

pub use model::Model;
pub use parse::parse_records;
pub use record::{Field, Record};
