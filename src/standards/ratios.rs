use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

const RATIOS_JSON: &str = include_str!("../../data/space_type_ratios.json");

/// Share of building floor area taken by one space type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpaceTypeRatio {
    pub space_type: String,
    /// Fraction of the building floor area.
    pub ratio: f64,
    /// Whether the space type is generated in the model.
    pub space_type_gen: bool,
    /// The space type used where no other one applies.
    pub default: bool,
    /// Circulation space.
    #[serde(default)]
    pub circ: bool,
    /// ft
    #[serde(default)]
    pub story_height: Option<f64>,
    #[serde(default)]
    pub wwr: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
struct RatioEntry {
    building_types: Vec<String>,
    #[serde(default)]
    building_subtype: Option<String>,
    #[serde(default)]
    templates: Option<Vec<String>>,
    #[serde(default)]
    whole_building: Option<bool>,
    space_types: Vec<SpaceTypeRatio>,
}

impl RatioEntry {
    fn matches(&self, building_type: &str, building_subtype: Option<&str>, template: &str, whole_building: bool) -> bool {
        self.building_types.iter().any(|b| b == building_type)
            && self
                .building_subtype
                .as_deref()
                .is_none_or(|s| Some(s) == building_subtype)
            && self
                .templates
                .as_ref()
                .is_none_or(|t| t.iter().any(|t| t == template))
            && self.whole_building.is_none_or(|w| w == whole_building)
    }
}

fn entries() -> Result<Vec<RatioEntry>> {
    serde_json::from_str(RATIOS_JSON).context("Failed to parse embedded space type ratios")
}

/// Space types of a prototype building and their floor area ratios.
///
/// `building_subtype` picks the large office data center and warehouse
/// bulk/fine variants; other values fall back to the default layout.
/// `whole_building` selects a single whole-building space type for the
/// office prototypes. Unknown building types are an error.
pub fn space_type_ratios(
    building_type: &str,
    building_subtype: Option<&str>,
    template: &str,
    whole_building: bool,
) -> Result<Vec<SpaceTypeRatio>> {
    entries()?
        .into_iter()
        .find(|e| e.matches(building_type, building_subtype, template, whole_building))
        .map(|e| e.space_types)
        .ok_or_else(|| anyhow!("No space type ratios for building type {building_type}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn total(ratios: &[SpaceTypeRatio]) -> f64 {
        ratios.iter().map(|r| r.ratio).sum()
    }

    #[test]
    fn test_table_parses() {
        let all = entries().unwrap();
        assert!(all.len() > 50);
        for e in &all {
            assert!(!e.space_types.is_empty());
        }
    }

    #[test]
    fn test_secondary_school_templates() {
        let old = space_type_ratios("SecondarySchool", None, "DOE Ref Pre-1980", true).unwrap();
        let new = space_type_ratios("SecondarySchool", None, "90.1-2013", true).unwrap();
        assert!(old.iter().any(|r| r.space_type == "Gym - audience"));
        assert!(!new.iter().any(|r| r.space_type == "Gym - audience"));
        assert!(new.iter().any(|r| r.space_type == "ComputerRoom"));
        assert!((total(&old) - 1.0).abs() < 1e-3);
        assert!((total(&new) - 1.0).abs() < 1e-3);

        let gym = old.iter().find(|r| r.space_type == "Gym").unwrap();
        assert_eq!(gym.story_height, Some(26.0));
        let corridor = old.iter().find(|r| r.space_type == "Corridor").unwrap();
        assert!(corridor.circ);
    }

    #[test]
    fn test_office_whole_building() {
        let whole = space_type_ratios("SmallOffice", None, "90.1-2013", true).unwrap();
        assert_eq!(whole.len(), 1);
        assert_eq!(whole[0].space_type, "WholeBuilding - Sm Office");
        assert!(whole[0].default);

        let split = space_type_ratios("MediumOffice", None, "90.1-2013", false).unwrap();
        assert_eq!(split.len(), 11);
        let default: Vec<_> = split.iter().filter(|r| r.default).collect();
        assert_eq!(default.len(), 1);
        assert_eq!(default[0].space_type, "MediumOffice - OpenOffice");
    }

    #[test]
    fn test_subtypes() {
        let bulk = space_type_ratios("Warehouse", Some("warehouse_bulk80"), "90.1-2013", true).unwrap();
        assert!((bulk[0].ratio - 0.8).abs() < 1e-10);
        let office = bulk.iter().find(|r| r.space_type == "Office").unwrap();
        assert_eq!(office.wwr, Some(0.71));

        let default = space_type_ratios("Warehouse", Some("warehouse_default"), "90.1-2013", true).unwrap();
        assert!((default[0].ratio - 0.6628).abs() < 1e-10);
        assert_eq!(
            space_type_ratios("Warehouse", None, "90.1-2013", true).unwrap(),
            default
        );

        let lg = space_type_ratios("LargeOffice", Some("largeoffice_datacenteronly"), "90.1-2013", true).unwrap();
        assert_eq!(lg.len(), 1);
        assert_eq!(lg[0].space_type, "OfficeLarge Data Center");
    }

    #[test]
    fn test_large_hotel_basement_not_generated() {
        let hotel = space_type_ratios("LargeHotel", None, "90.1-2013", true).unwrap();
        let basement = hotel.iter().find(|r| r.space_type == "Basement").unwrap();
        assert!(!basement.space_type_gen);
    }

    #[test]
    fn test_shared_building_types() {
        let a = space_type_ratios("LargeDataCenterHighITE", None, "90.1-2013", true).unwrap();
        let b = space_type_ratios("LargeDataCenterLowITE", None, "90.1-2013", true).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_unknown_building_type() {
        assert!(space_type_ratios("Spaceport", None, "90.1-2013", true).is_err());
    }
}
