use std::fmt;

use anyhow::{Context, Result};

use super::parse::parse_records;
use super::record::{Field, Record};
use crate::Handle;

/// An OpenStudio model held as its text records.
///
/// Records keep their insertion order so that a model written back to disk
/// diffs cleanly against its source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Model {
    records: Vec<Record>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses OSM text.
    pub fn from_osm_str(text: &str) -> Result<Self> {
        let records = parse_records(text).context("Failed to parse OSM text")?;
        Ok(Self { records })
    }

    pub fn to_osm_string(&self) -> String {
        self.to_string()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut [Record] {
        &mut self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Adds a record and returns its handle.
    ///
    /// Records without a handle in field 0 get a fresh one.
    pub fn add(&mut self, mut record: Record) -> Handle {
        let handle = match record.handle() {
            Some(h) => h,
            None => {
                let h = Handle::new();
                record
                    .fields
                    .insert(0, Field::new(h.as_str(), Some("Handle")));
                h
            }
        };
        self.records.push(record);
        handle
    }

    pub fn get(&self, handle: &Handle) -> Option<&Record> {
        self.records
            .iter()
            .find(|r| r.handle().as_ref() == Some(handle))
    }

    pub fn get_mut(&mut self, handle: &Handle) -> Option<&mut Record> {
        self.records
            .iter_mut()
            .find(|r| r.handle().as_ref() == Some(handle))
    }

    pub fn remove(&mut self, handle: &Handle) -> Option<Record> {
        let pos = self
            .records
            .iter()
            .position(|r| r.handle().as_ref() == Some(handle))?;
        Some(self.records.remove(pos))
    }

    /// Records of one class, in model order.
    pub fn objects_of_class(&self, class: &str) -> Vec<&Record> {
        self.records.iter().filter(|r| r.class == class).collect()
    }

    pub fn find_by_name(&self, class: &str, name: &str) -> Option<&Record> {
        self.records
            .iter()
            .find(|r| r.class == class && r.name() == Some(name))
    }

    pub fn find_by_name_mut(&mut self, class: &str, name: &str) -> Option<&mut Record> {
        self.records
            .iter_mut()
            .find(|r| r.class == class && r.name() == Some(name))
    }

    /// Records that point at `handle` from any field other than their own handle.
    pub fn referencing(&self, handle: &Handle) -> Vec<&Record> {
        self.records
            .iter()
            .filter(|r| r.references_handle(handle))
            .collect()
    }

    /// Records of `class` that point at `handle`.
    pub fn referencing_of_class(&self, handle: &Handle, class: &str) -> Vec<&Record> {
        self.records
            .iter()
            .filter(|r| r.class == class && r.references_handle(handle))
            .collect()
    }

    /// Returns `base` if no record of `class` uses it, otherwise the first
    /// free `"{base} {n}"`.
    pub fn unique_name(&self, class: &str, base: &str) -> String {
        if self.find_by_name(class, base).is_none() {
            return base.to_string();
        }
        let mut n = 1;
        loop {
            let candidate = format!("{base} {n}");
            if self.find_by_name(class, &candidate).is_none() {
                return candidate;
            }
            n += 1;
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        for record in &self.records {
            write!(f, "{record}")?;
            writeln!(f)?;
        }
        Ok(())
    }
}
