use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::lookup::{Row, SearchCriteria, find_object};
use super::space_type::SpaceTypeProperties;
use crate::io::read_json;
use crate::schedule::rule::{DayType, MonthDay, ScheduleRule, Weekdays};
use crate::schedule::{ParamOverrides, ParametricRule, ScheduleDay, ScheduleRuleset, ScheduleTypeLimits};

/// How the values of an hourly schedule row are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValuesKind {
    /// One value for the whole day.
    Constant,
    /// 24 values, one per hour.
    Hourly,
}

/// A row of the hourly schedule table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRow {
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub units: Option<String>,
    #[serde(deserialize_with = "crate::schedule::parametric::day_types_from_text_or_list")]
    pub day_types: Vec<DayType>,
    pub start_date: String,
    pub end_date: String,
    #[serde(rename = "type")]
    pub kind: ValuesKind,
    #[serde(default)]
    pub schedule_type_limits: Option<ScheduleTypeLimits>,
    pub values: Vec<f64>,
}

impl ScheduleRow {
    fn day(&self, day_name: &str) -> Result<ScheduleDay> {
        match self.kind {
            ValuesKind::Constant => match self.values.first() {
                Some(v) => Ok(ScheduleDay::constant(day_name, *v)),
                None => bail!("Constant schedule row {} has no value", self.name),
            },
            ValuesKind::Hourly => {
                let hourly: &[f64; 24] = self.values.as_slice().try_into().with_context(|| {
                    format!(
                        "Hourly schedule row {} needs 24 values, got {}",
                        self.name,
                        self.values.len()
                    )
                })?;
                Ok(ScheduleDay::from_hourly(day_name, hourly))
            }
        }
    }

    fn label(&self) -> String {
        self.day_types
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join("|")
    }
}

/// Builds the ruleset named `name` from hourly table rows.
///
/// Rows are applied in table order and each row with weekdays becomes a rule
/// with higher priority than the rules before it.
pub fn build_hourly_ruleset(rows: &[ScheduleRow], name: &str) -> Result<ScheduleRuleset> {
    let rows: Vec<&ScheduleRow> = rows.iter().filter(|r| r.name == name).collect();
    let Some(first) = rows.first() else {
        bail!("No schedule rows named {name}");
    };
    let limits = first.schedule_type_limits.unwrap_or(ScheduleTypeLimits::Any);
    let mut ruleset = ScheduleRuleset::constant(name, 0.0, limits);

    for row in &rows {
        for day_type in &row.day_types {
            match day_type {
                DayType::Default => ruleset.default_day = row.day(&format!("{name} Default"))?,
                DayType::WinterDesign => {
                    ruleset.winter_design_day = Some(row.day(&format!("{name} Winter Design Day"))?)
                }
                DayType::SummerDesign => {
                    ruleset.summer_design_day = Some(row.day(&format!("{name} Summer Design Day"))?)
                }
                _ => {}
            }
        }

        let weekdays = Weekdays::from_day_types(&row.day_types);
        if weekdays.is_empty() {
            continue;
        }
        let start = MonthDay::parse(&row.start_date)
            .with_context(|| format!("Invalid start date of schedule {name}"))?;
        let end = MonthDay::parse(&row.end_date)
            .with_context(|| format!("Invalid end date of schedule {name}"))?;
        let day = row.day(&format!("{name} {} Day", row.label()))?;
        let rule_name = format!("{name} Rule {}", ruleset.rules.len() + 1);
        ruleset
            .rules
            .insert(0, ScheduleRule::new(&rule_name, day, start, end, weekdays));
    }
    Ok(ruleset)
}

/// The standards tables used by the space type rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StandardsData {
    #[serde(default)]
    pub space_types: Vec<Row>,
    #[serde(default)]
    pub schedules: Vec<ScheduleRow>,
    #[serde(default)]
    pub parametric_schedules: Vec<ParametricRule>,
}

impl StandardsData {
    /// Loads the tables from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        read_json(path).with_context(|| format!("Failed to load standards data from {}", path.display()))
    }

    /// Looks up the properties of a standards space type.
    ///
    /// A miss, or a row that does not deserialize, is logged and yields `None`.
    pub fn space_type_properties(
        &self,
        template: &str,
        building_type: &str,
        space_type: &str,
    ) -> Option<SpaceTypeProperties> {
        let criteria = SearchCriteria::new()
            .with("template", template)
            .with("building_type", building_type)
            .with("space_type", space_type);
        let Some(row) = find_object(&self.space_types, &criteria, None) else {
            warn!("Space type properties lookup failed: {criteria}");
            return None;
        };
        match serde_json::from_value(serde_json::Value::Object(row.clone())) {
            Ok(props) => Some(props),
            Err(e) => {
                warn!("Invalid space type properties for {criteria}: {e}");
                None
            }
        }
    }

    pub fn has_schedule(&self, name: &str) -> bool {
        self.parametric_schedules.iter().any(|r| r.name == name) || self.schedules.iter().any(|r| r.name == name)
    }

    /// Builds the named schedule. Parametric rows take precedence over hourly
    /// rows with the same name. An unknown name is an error.
    pub fn schedule_ruleset(
        &self,
        name: &str,
        timesteps_per_hour: u32,
        clamp_fraction_values: bool,
    ) -> Result<ScheduleRuleset> {
        if self.parametric_schedules.iter().any(|r| r.name == name) {
            debug!("Building {name} from parametric rows");
            return crate::schedule::build_parametric_ruleset(
                &self.parametric_schedules,
                name,
                &ParamOverrides::default(),
                timesteps_per_hour,
                clamp_fraction_values,
            );
        }
        if self.schedules.iter().any(|r| r.name == name) {
            return build_hourly_ruleset(&self.schedules, name);
        }
        bail!("Cannot find data for schedule: {name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn data() -> StandardsData {
        serde_json::from_value(json!({
            "space_types": [
                {"template": "90.1-2013", "building_type": "Office", "space_type": "OpenOffice",
                 "occupancy_per_area": 5.25, "lighting_per_area": 0.98, "rgb": "255_105_180",
                 "occupancy_schedule": "OfficeMedium BLDG_OCC_SCH"},
                {"template": "90.1-2013", "building_type": "Office", "space_type": "Lobby",
                 "lighting_per_area": null}
            ],
            "schedules": [
                {"name": "Always On", "day_types": "Default", "start_date": "2014-01-01T00:00:00+00:00",
                 "end_date": "2014-12-31T00:00:00+00:00", "type": "Constant", "values": [1.0],
                 "schedule_type_limits": "Fraction"},
                {"name": "Office Occ", "day_types": "Default|SmrDsn", "start_date": "01/01",
                 "end_date": "12/31", "type": "Hourly",
                 "values": [0,0,0,0,0,0,0.1,0.2,0.95,0.95,0.95,0.95,0.5,0.95,0.95,0.95,0.95,0.3,0.1,0.1,0.1,0.1,0.05,0.05]},
                {"name": "Office Occ", "day_types": "Sat", "start_date": "01/01",
                 "end_date": "12/31", "type": "Hourly",
                 "values": [0,0,0,0,0,0,0.1,0.1,0.3,0.3,0.3,0.3,0.1,0.1,0.1,0.1,0.1,0.05,0.05,0,0,0,0,0]},
                {"name": "Office Occ", "day_types": "Sun|WntrDsn", "start_date": "01/01",
                 "end_date": "12/31", "type": "Hourly",
                 "values": [0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0]}
            ],
            "parametric_schedules": []
        }))
        .unwrap()
    }

    #[test]
    fn test_space_type_properties() {
        let d = data();
        let props = d.space_type_properties("90.1-2013", "Office", "OpenOffice").unwrap();
        assert!((props.occupancy_per_area - 5.25).abs() < 1e-10);
        assert_eq!(props.rgb.as_deref(), Some("255_105_180"));
        assert_eq!(props.occupancy_schedule.as_deref(), Some("OfficeMedium BLDG_OCC_SCH"));

        let lobby = d.space_type_properties("90.1-2013", "Office", "Lobby").unwrap();
        assert_eq!(lobby.lighting_per_area, 0.0);

        assert!(d.space_type_properties("90.1-2010", "Office", "OpenOffice").is_none());
    }

    #[test]
    fn test_constant_row() {
        let sch = data().schedule_ruleset("Always On", 4, true).unwrap();
        assert_eq!(sch.limits, ScheduleTypeLimits::Fraction);
        assert_eq!(sch.default_day.values(), &[1.0]);
        assert!(sch.rules.is_empty());
    }

    #[test]
    fn test_hourly_rows() {
        let sch = data().schedule_ruleset("Office Occ", 4, true).unwrap();
        assert_eq!(sch.limits, ScheduleTypeLimits::Any);
        assert!((sch.default_day.value_at(9.0 * 60.0) - 0.95).abs() < 1e-10);
        assert!(sch.summer_design_day.is_some());
        assert!(sch.winter_design_day.is_some());
        assert_eq!(sch.rules.len(), 2);
        // The last row has the highest priority.
        assert_eq!(sch.rules[0].name, "Office Occ Rule 2");
        assert_eq!(sch.rules[0].day.name, "Office Occ Sun|WntrDsn Day");

        // 2013-01-05 is a Saturday, 2013-01-06 a Sunday.
        let sat = NaiveDate::from_ymd_opt(2013, 1, 5).unwrap();
        let sun = NaiveDate::from_ymd_opt(2013, 1, 6).unwrap();
        assert!((sch.day_for(sat).value_at(9.5 * 60.0) - 0.3).abs() < 1e-10);
        assert_eq!(sch.day_for(sun).value_at(9.5 * 60.0), 0.0);
    }

    #[test]
    fn test_missing_schedule_is_error() {
        let d = data();
        assert!(!d.has_schedule("Nope"));
        assert!(d.schedule_ruleset("Nope", 4, true).is_err());
    }

    #[test]
    fn test_hourly_row_needs_24_values() {
        let row: ScheduleRow = serde_json::from_value(json!({
            "name": "Short", "day_types": "Default", "start_date": "01/01",
            "end_date": "12/31", "type": "Hourly", "values": [1.0, 2.0]
        }))
        .unwrap();
        assert!(build_hourly_ruleset(&[row], "Short").is_err());
    }
}
