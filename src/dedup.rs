//! Removal of duplicate model objects.
//!
//! Records of a class that only differ by handle and name are grouped. The
//! record with the smallest name is kept, every reference to the others is
//! rewritten to it in the serialized model text, and the rewritten text is
//! loaded back before the duplicates are removed.

use std::collections::HashMap;
use std::fmt;

use anyhow::{Context, Result};
use regex::{Captures, Regex};
use tracing::{debug, info, warn};

use crate::osm::{Model, Record};
use crate::{HasName, Handle, SortByName};

/// Material classes, deduplicated before constructions.
pub const MATERIAL_CLASSES: [&str; 6] = [
    "OS:Material",
    "OS:Material:NoMass",
    "OS:WindowMaterial:SimpleGlazingSystem",
    "OS:WindowMaterial:Glazing",
    "OS:WindowMaterial:Gas",
    "OS:StandardsInformation:Material",
];

/// Construction classes. Constructions made identical by material
/// deduplication collapse here.
pub const CONSTRUCTION_CLASSES: [&str; 5] = [
    "OS:Construction",
    "OS:DefaultSurfaceConstructions",
    "OS:DefaultSubSurfaceConstructions",
    "OS:DefaultConstructionSet",
    "OS:StandardsInformation:Construction",
];

/// Records with identical content. `canonical` is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub class: String,
    pub canonical: (Handle, String),
    pub duplicates: Vec<(Handle, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    pub class: String,
    pub removed: String,
    pub kept: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupReport {
    pub removals: Vec<Removal>,
}

impl DedupReport {
    pub fn len(&self) -> usize {
        self.removals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.removals.is_empty()
    }

    pub fn extend(&mut self, other: DedupReport) {
        self.removals.extend(other.removals);
    }
}

impl fmt::Display for DedupReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for r in &self.removals {
            writeln!(f, "{}: removed '{}', kept '{}'", r.class, r.removed, r.kept)?;
        }
        Ok(())
    }
}

/// Groups records by [`Record::fingerprint`].
///
/// Groups are returned in order of first appearance and only when they have
/// at least two members. Members are sorted by name, so the canonical record
/// is the one with the smallest name.
pub fn group_similar(records: &[&Record]) -> Vec<DuplicateGroup> {
    let mut index: HashMap<Vec<&str>, usize> = HashMap::new();
    let mut groups: Vec<Vec<&Record>> = Vec::new();
    for &record in records {
        if record.handle().is_none() {
            warn!("Skipping {} {} without a handle", record.class, record.get_name());
            continue;
        }
        let slot = *index.entry(record.fingerprint()).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(record);
    }

    groups
        .into_iter()
        .filter(|members| members.len() > 1)
        .filter_map(|mut members| {
            members.sort_by_name();
            let mut entries = members
                .iter()
                .filter_map(|r| Some((r.handle()?, r.get_name().to_string())));
            let canonical = entries.next()?;
            Some(DuplicateGroup {
                class: members[0].class.clone(),
                canonical,
                duplicates: entries.collect(),
            })
        })
        .collect()
}

/// Whether a serialized line carries the record's own handle.
fn is_handle_line(line: &str) -> bool {
    line.split_once("!-")
        .is_some_and(|(_, label)| label.trim() == "Handle")
}

/// Rewrites every reference to a duplicate handle into its canonical handle.
///
/// Lines labelled `Handle` are left untouched so the duplicates keep their
/// identity and can be removed after the text is loaded again.
pub fn replace_duplicate_handles(text: &str, groups: &[DuplicateGroup]) -> Result<String> {
    let mut canonical_of: HashMap<&str, &str> = HashMap::new();
    for group in groups {
        for (dup, _) in &group.duplicates {
            canonical_of.insert(dup.as_str(), group.canonical.0.as_str());
        }
    }
    if canonical_of.is_empty() {
        return Ok(text.to_string());
    }

    let pattern = canonical_of
        .keys()
        .map(|h| regex::escape(h))
        .collect::<Vec<_>>()
        .join("|");
    let re = Regex::new(&pattern).context("Failed to build duplicate handle pattern")?;

    let mut out = String::with_capacity(text.len());
    for line in text.split_inclusive('\n') {
        if is_handle_line(line) {
            out.push_str(line);
            continue;
        }
        let replaced = re.replace_all(line, |caps: &Captures| {
            canonical_of
                .get(&caps[0])
                .map_or_else(|| caps[0].to_string(), |c| c.to_string())
        });
        out.push_str(&replaced);
    }
    Ok(out)
}

/// Removes duplicates of one class and returns the cleaned model.
pub fn eliminate_duplicates(model: &Model, class: &str) -> Result<(Model, DedupReport)> {
    let groups = group_similar(&model.objects_of_class(class));
    if groups.is_empty() {
        debug!("No duplicate {class} objects");
        return Ok((model.clone(), DedupReport::default()));
    }

    let text = labelled_text(model);
    let rewritten = replace_duplicate_handles(&text, &groups)?;
    let mut cleaned = Model::from_osm_str(&rewritten)
        .with_context(|| format!("Failed to reload model after rewriting {class} handles"))?;

    let mut report = DedupReport::default();
    for group in &groups {
        for (handle, name) in &group.duplicates {
            match cleaned.remove(handle) {
                Some(_) => {
                    info!("Removed {class} '{name}', kept '{}'", group.canonical.1);
                    report.removals.push(Removal {
                        class: class.to_string(),
                        removed: name.clone(),
                        kept: group.canonical.1.clone(),
                    });
                }
                None => warn!("{class} '{name}' does not exist in the reloaded model"),
            }
        }
    }
    Ok((cleaned, report))
}

/// Deduplicates materials, then constructions.
pub fn eliminate_material_and_construction_duplicates(model: &Model) -> Result<(Model, DedupReport)> {
    let mut current = model.clone();
    let mut report = DedupReport::default();
    for class in MATERIAL_CLASSES.iter().chain(CONSTRUCTION_CLASSES.iter()) {
        let (next, r) = eliminate_duplicates(&current, class)?;
        current = next;
        report.extend(r);
    }
    info!("Removed {} duplicate materials and constructions", report.len());
    Ok((current, report))
}

/// Model text where every record handle carries its `Handle` label.
///
/// Records without any labels also get their `Name` labelled so they keep
/// their name once labels are present.
fn labelled_text(model: &Model) -> String {
    let mut labelled = model.clone();
    for record in labelled.records_mut() {
        if record.handle().is_none() || record.fields[0].comment.is_some() {
            continue;
        }
        let unlabelled = record.fields.iter().all(|f| f.comment.is_none());
        record.fields[0].comment = Some("Handle".to_string());
        if unlabelled && let Some(name) = record.fields.get_mut(1) {
            name.comment = Some("Name".to_string());
        }
    }
    labelled.to_osm_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn material(name: &str, thickness: &str) -> Record {
        Record::named("OS:Material", name)
            .with("MediumRough", "Roughness")
            .with(thickness, "Thickness {m}")
            .with("0.89", "Conductivity {W/m-K}")
    }

    fn construction(name: &str, layer: &Handle) -> Record {
        Record::named("OS:Construction", name)
            .with("", "Surface Rendering Name")
            .with(layer.as_str(), "Layer 1")
    }

    #[test]
    fn test_group_similar_picks_smallest_name() {
        let a = material("Brick 1", "0.1");
        let b = material("Brick", "0.1");
        let c = material("Concrete", "0.2");
        let groups = group_similar(&[&a, &b, &c]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].canonical.1, "Brick");
        assert_eq!(groups[0].canonical.0, b.handle().unwrap());
        assert_eq!(groups[0].duplicates, vec![(a.handle().unwrap(), "Brick 1".to_string())]);
    }

    #[test]
    fn test_replace_skips_handle_lines() {
        let mut model = Model::new();
        let keep = model.add(material("Brick", "0.1"));
        let dup = model.add(material("Brick 1", "0.1"));
        model.add(construction("Wall", &dup));
        let groups = group_similar(&model.objects_of_class("OS:Material"));

        let text = replace_duplicate_handles(&model.to_osm_string(), &groups).unwrap();
        let reloaded = Model::from_osm_str(&text).unwrap();
        // The duplicate still exists under its own handle...
        assert!(reloaded.get(&dup).is_some());
        // ...but nothing points at it any more.
        assert!(reloaded.referencing(&dup).is_empty());
        assert_eq!(reloaded.referencing(&keep).len(), 1);
    }

    #[test]
    fn test_replace_without_groups_is_identity() {
        let text = "OS:Version,\n  {8adb3faa-8e6a-48e3-bd73-ba6a02154b02}, !- Handle\n  3.5.0;\n";
        assert_eq!(replace_duplicate_handles(text, &[]).unwrap(), text);
    }

    #[test]
    fn test_eliminate_duplicates() {
        let mut model = Model::new();
        let keep = model.add(material("Brick", "0.1"));
        let dup = model.add(material("Brick 1", "0.1"));
        model.add(material("Concrete", "0.2"));
        let wall = model.add(construction("Wall", &dup));

        let (cleaned, report) = eliminate_duplicates(&model, "OS:Material").unwrap();
        assert_eq!(cleaned.objects_of_class("OS:Material").len(), 2);
        assert!(cleaned.get(&dup).is_none());
        assert_eq!(cleaned.get(&wall).unwrap().value_by_label("Layer 1"), Some(keep.as_str()));
        assert_eq!(
            report.removals,
            vec![Removal {
                class: "OS:Material".to_string(),
                removed: "Brick 1".to_string(),
                kept: "Brick".to_string(),
            }]
        );
    }

    #[test]
    fn test_constructions_collapse_after_materials() {
        let mut model = Model::new();
        let m1 = model.add(material("Gypsum", "0.0127"));
        let m2 = model.add(material("Gypsum 1", "0.0127"));
        let c1 = model.add(construction("Interior Wall 1", &m2));
        let c2 = model.add(construction("Interior Wall", &m1));
        let mut set = Record::named("OS:DefaultSurfaceConstructions", "Surfaces");
        set.push(c1.as_str(), "Wall Construction Name");
        let set = model.add(set);

        let (cleaned, report) = eliminate_material_and_construction_duplicates(&model).unwrap();
        assert_eq!(report.len(), 2);
        assert!(cleaned.get(&m2).is_none());
        assert!(cleaned.get(&c1).is_none());
        assert_eq!(
            cleaned.get(&set).unwrap().value_by_label("Wall Construction Name"),
            Some(c2.as_str())
        );
        assert_eq!(cleaned.get(&c2).unwrap().value_by_label("Layer 1"), Some(m1.as_str()));
    }

    #[test]
    fn test_unlabelled_handles_survive() {
        let text = "OS:Material,{11111111-1111-4111-8111-111111111111},Brick,Rough,0.1;\n\
                    OS:Material,{22222222-2222-4222-8222-222222222222},Brick 1,Rough,0.1;\n\
                    OS:Construction,{33333333-3333-4333-8333-333333333333},Wall,,{22222222-2222-4222-8222-222222222222};\n";
        let model = Model::from_osm_str(text).unwrap();
        let (cleaned, report) = eliminate_duplicates(&model, "OS:Material").unwrap();
        assert_eq!(report.len(), 1);
        let kept = Handle::from("{11111111-1111-4111-8111-111111111111}");
        assert_eq!(cleaned.get(&kept).unwrap().name(), Some("Brick"));
        assert_eq!(cleaned.referencing(&kept).len(), 1);
    }

    #[test]
    fn test_report_display() {
        let report = DedupReport {
            removals: vec![Removal {
                class: "OS:Material".to_string(),
                removed: "Brick 1".to_string(),
                kept: "Brick".to_string(),
            }],
        };
        assert_eq!(report.to_string(), "OS:Material: removed 'Brick 1', kept 'Brick'\n");
    }
}
