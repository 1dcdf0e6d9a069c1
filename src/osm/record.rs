use std::fmt;

use crate::{HasName, Handle};

/// Column where `!-` field labels start when a record is written.
const LABEL_COLUMN: usize = 40;

/// A single field of an OSM record: the value and its optional `!-` label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub value: String,
    pub comment: Option<String>,
}

impl Field {
    pub fn new(value: &str, comment: Option<&str>) -> Self {
        Self {
            value: value.to_string(),
            comment: comment.map(|c| c.to_string()),
        }
    }
}

/// A named, field-value serialization unit of an OpenStudio model
/// (`OS:Material`, `OS:Construction`, ...).
///
/// Field 0 is the record handle. Most classes carry a `Name` in field 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub class: String,
    pub fields: Vec<Field>,
}

impl HasName for Record {
    fn get_name(&self) -> &str {
        self.name().unwrap_or("")
    }
}

impl Record {
    /// Creates an empty record of the given class.
    pub fn new(class: &str) -> Self {
        Self {
            class: class.to_string(),
            fields: Vec::new(),
        }
    }

    /// Creates a record with a fresh handle and a name.
    pub fn named(class: &str, name: &str) -> Self {
        let mut record = Self::new(class);
        record.push(Handle::new().as_str(), "Handle");
        record.push(name, "Name");
        record
    }

    /// Appends a labelled field.
    pub fn push(&mut self, value: &str, label: &str) {
        self.fields.push(Field::new(value, Some(label)));
    }

    /// Builder-style [`Self::push`].
    pub fn with(mut self, value: &str, label: &str) -> Self {
        self.push(value, label);
        self
    }

    pub fn handle(&self) -> Option<Handle> {
        self.fields.first().and_then(|f| Handle::parse(&f.value))
    }

    /// Index of the `Name` field.
    ///
    /// Uses field labels when the record has any, otherwise assumes the
    /// OpenStudio layout where the name follows the handle.
    pub fn name_index(&self) -> Option<usize> {
        if self.fields.iter().any(|f| f.comment.is_some()) {
            return self
                .fields
                .iter()
                .position(|f| f.comment.as_deref() == Some("Name"));
        }
        if self.fields.len() > 1 { Some(1) } else { None }
    }

    pub fn name(&self) -> Option<&str> {
        self.name_index().map(|i| self.fields[i].value.as_str())
    }

    pub fn set_name(&mut self, name: &str) -> bool {
        match self.name_index() {
            Some(i) => {
                self.fields[i].value = name.to_string();
                true
            }
            None => false,
        }
    }

    pub fn value(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(|f| f.value.as_str())
    }

    /// Sets a field value, padding with empty fields if the record is shorter.
    pub fn set_value(&mut self, index: usize, value: &str) {
        while self.fields.len() <= index {
            self.fields.push(Field::new("", None));
        }
        self.fields[index].value = value.to_string();
    }

    fn label_index(&self, label: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.comment.as_deref() == Some(label))
    }

    pub fn value_by_label(&self, label: &str) -> Option<&str> {
        self.label_index(label).map(|i| self.fields[i].value.as_str())
    }

    /// Parses a labelled field as a number. Empty fields read as `None`.
    pub fn number_by_label(&self, label: &str) -> Option<f64> {
        self.value_by_label(label)
            .and_then(|v| v.trim().parse::<f64>().ok())
    }

    /// Sets a labelled field, appending it if the label is not present.
    pub fn set_value_by_label(&mut self, label: &str, value: &str) {
        match self.label_index(label) {
            Some(i) => self.fields[i].value = value.to_string(),
            None => self.push(value, label),
        }
    }

    /// Field values that identify the record by content: everything except
    /// the handle and the name.
    pub fn fingerprint(&self) -> Vec<&str> {
        let name_index = self.name_index();
        let skip_handle = self.handle().is_some();
        self.fields
            .iter()
            .enumerate()
            .filter(|(i, _)| !(skip_handle && *i == 0) && Some(*i) != name_index)
            .map(|(_, f)| f.value.as_str())
            .collect()
    }

    /// Handles of other records this one points at.
    pub fn references(&self) -> Vec<Handle> {
        self.fields
            .iter()
            .skip(1)
            .filter_map(|f| Handle::parse(&f.value))
            .collect()
    }

    pub fn references_handle(&self, handle: &Handle) -> bool {
        self.fields
            .iter()
            .skip(1)
            .any(|f| f.value.trim() == handle.as_str())
    }

    /// Rewrites every non-handle field equal to `from` into `to`.
    pub fn replace_reference(&mut self, from: &Handle, to: &Handle) -> usize {
        let mut count = 0;
        for f in self.fields.iter_mut().skip(1) {
            if f.value.trim() == from.as_str() {
                f.value = to.as_str().to_string();
                count += 1;
            }
        }
        count
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fields.is_empty() {
            return writeln!(f, "{};", self.class);
        }
        writeln!(f, "{},", self.class)?;
        let last = self.fields.len() - 1;
        for (i, field) in self.fields.iter().enumerate() {
            let sep = if i == last { ';' } else { ',' };
            let entry = format!("  {}{}", field.value, sep);
            match &field.comment {
                Some(label) => {
                    let width = LABEL_COLUMN.max(entry.len() + 1);
                    writeln!(f, "{entry:<width$}!- {label}")?;
                }
                None => writeln!(f, "{entry}")?,
            }
        }
        Ok(())
    }
}
