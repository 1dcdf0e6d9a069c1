//! Reader for the OSM/IDF text format.
//!
//! ```text
//! OS:Material,
//!   {8adb3faa-8e6a-48e3-bd73-ba6a02154b02}, !- Handle
//!   1/2IN Gypsum,                           !- Name
//!   0.0127;                                 !- Thickness {m}
//! ```
//!
//! Records are `Class, field, ..., field;`. A `!` starts a comment that runs
//! to the end of the line. A `!-` comment labels the last field that was
//! terminated on the same line.

use anyhow::{Result, bail};

use super::record::{Field, Record};

/// Where the label of the current line goes.
#[derive(Clone, Copy)]
enum LabelTarget {
    Open(usize),
    Closed(usize, usize),
}

pub fn parse_records(text: &str) -> Result<Vec<Record>> {
    let mut records: Vec<Record> = Vec::new();
    let mut current: Option<Record> = None;
    let mut token = String::new();
    let mut class_line = 0;

    for (line_no, line) in text.lines().enumerate() {
        let (code, comment) = match line.find('!') {
            Some(pos) => (&line[..pos], Some(&line[pos..])),
            None => (line, None),
        };

        let mut target: Option<LabelTarget> = None;
        for c in code.chars() {
            match c {
                ',' | ';' => {
                    let value = token.trim().to_string();
                    token.clear();
                    match current.as_mut() {
                        None => {
                            if value.is_empty() {
                                bail!("Missing class name at line {}", line_no + 1);
                            }
                            class_line = line_no + 1;
                            current = Some(Record::new(&value));
                            target = None;
                        }
                        Some(record) => {
                            record.fields.push(Field::new(&value, None));
                            target = Some(LabelTarget::Open(record.fields.len() - 1));
                        }
                    }
                    if c == ';'
                        && let Some(record) = current.take()
                    {
                        let last = record.fields.len();
                        records.push(record);
                        target = if last > 0 {
                            Some(LabelTarget::Closed(records.len() - 1, last - 1))
                        } else {
                            None
                        };
                    }
                }
                _ => token.push(c),
            }
        }

        if let Some(label) = comment.and_then(|c| c.strip_prefix("!-")) {
            let label = label.trim();
            if !label.is_empty() {
                let field = match target {
                    Some(LabelTarget::Open(i)) => current.as_mut().map(|r| &mut r.fields[i]),
                    Some(LabelTarget::Closed(r, i)) => Some(&mut records[r].fields[i]),
                    None => None,
                };
                if let Some(field) = field {
                    field.comment = Some(label.to_string());
                }
            }
        }
    }

    if let Some(record) = current {
        bail!(
            "Unterminated record {} starting at line {}",
            record.class,
            class_line
        );
    }
    if !token.trim().is_empty() {
        bail!("Trailing text after last record: {}", token.trim());
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GYPSUM: &str = "
OS:Material,
  {8adb3faa-8e6a-48e3-bd73-ba6a02154b02}, !- Handle
  1/2IN Gypsum,                           !- Name
  Smooth,                                 !- Roughness
  0.0127,                                 !- Thickness {m}
  0.16,                                   !- Conductivity {W/m-K}
  784.9,                                  !- Density {kg/m3}
  830.000000000001,                       !- Specific Heat {J/kg-K}
  0.9,                                    !- Thermal Absorptance
  0.4,                                    !- Solar Absorptance
  0.4;                                    !- Visible Absorptance
";

    #[test]
    fn test_parse_material() {
        let records = parse_records(GYPSUM).unwrap();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.class, "OS:Material");
        assert_eq!(r.fields.len(), 10);
        assert_eq!(r.name(), Some("1/2IN Gypsum"));
        assert_eq!(r.value_by_label("Specific Heat {J/kg-K}"), Some("830.000000000001"));
        assert_eq!(r.fields[9].comment.as_deref(), Some("Visible Absorptance"));
    }

    #[test]
    fn test_parse_compact_idf() {
        let text = "! header comment\nVersion,9.6;\n\nMaterial:NoMass,R13,Rough,2.29,0.9,0.75,0.75;";
        let records = parse_records(text).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].class, "Version");
        assert_eq!(records[0].value(0), Some("9.6"));
        assert_eq!(records[1].fields.len(), 6);
        assert!(records[1].fields.iter().all(|f| f.comment.is_none()));
    }

    #[test]
    fn test_parse_empty_fields() {
        let text = "OS:Construction,\n  {8adb3faa-8e6a-48e3-bd73-ba6a02154b02}, !- Handle\n  Wall, !- Name\n  , !- Surface Rendering Name\n  ; !- Layer 1\n";
        let records = parse_records(text).unwrap();
        let r = &records[0];
        assert_eq!(r.fields.len(), 4);
        assert_eq!(r.value(2), Some(""));
        assert_eq!(r.fields[3].comment.as_deref(), Some("Layer 1"));
    }

    #[test]
    fn test_parse_record_without_fields() {
        let records = parse_records("Lead Input;\nSimulation Data;").unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].fields.is_empty());
        assert_eq!(records[1].class, "Simulation Data");
    }

    #[test]
    fn test_unterminated_record_is_error() {
        let err = parse_records("OS:Material,\n  {8adb3faa-8e6a-48e3-bd73-ba6a02154b02},\n  Brick,\n")
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("OS:Material"), "{msg}");
    }

    #[test]
    fn test_roundtrip_through_display() {
        let records = parse_records(GYPSUM).unwrap();
        let text = records[0].to_string();
        let again = parse_records(&text).unwrap();
        assert_eq!(records, again);
    }
}
