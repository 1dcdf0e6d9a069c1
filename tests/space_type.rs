use bemstd::io::{read_osm, write_json, write_osm};
use bemstd::standards::space_type::space_type_record;
use bemstd::standards::{LoadSelection, apply_standards_to_model};
use bemstd::{Handle, Model, Record, RulesConfig, ScheduleRuleset, StandardsData};
use serde_json::json;
use tempfile::tempdir;

fn data_json() -> serde_json::Value {
    let hourly = |peak: f64| -> Vec<f64> {
        (0..24)
            .map(|h| if (8..18).contains(&h) { peak } else { 0.05 })
            .collect()
    };
    json!({
        "space_types": [
            {"template": "90.1-2013", "building_type": "Office", "space_type": "OpenOffice",
             "rgb": "120_230_199",
             "occupancy_per_area": 5.25, "lighting_per_area": 0.98,
             "electric_equipment_per_area": 0.75, "gas_equipment_per_area": null,
             "ventilation_per_area": 0.06, "ventilation_per_person": 5.0,
             "infiltration_per_exterior_area": 0.0446,
             "occupancy_schedule": "Office Occ", "lighting_schedule": "Office Light",
             "electric_equipment_schedule": "Office Occ",
             "infiltration_schedule": "Always On",
             "heating_setpoint_schedule": "Office Htg", "cooling_setpoint_schedule": "Office Clg"},
            {"template": "90.1-2013", "building_type": "Office", "space_type": "Plenum",
             "rgb": "192_192_192"}
        ],
        "schedules": [
            {"name": "Always On", "day_types": "Default", "start_date": "01/01", "end_date": "12/31",
             "type": "Constant", "values": [1.0], "schedule_type_limits": "Fraction"},
            {"name": "Office Light", "day_types": "Default|Wkdy", "start_date": "01/01", "end_date": "12/31",
             "type": "Hourly", "values": hourly(0.9), "schedule_type_limits": "Fraction"},
            {"name": "Office Htg", "day_types": "Default", "start_date": "01/01", "end_date": "12/31",
             "type": "Constant", "values": [21.0], "schedule_type_limits": "Temperature"},
            {"name": "Office Clg", "day_types": "Default", "start_date": "01/01", "end_date": "12/31",
             "type": "Constant", "values": [24.0], "schedule_type_limits": "Temperature"}
        ],
        "parametric_schedules": [
            {"name": "Office Occ", "day_types": "Default|Wkdy", "start_date": "01/01", "end_date": "12/31",
             "type": "Fraction", "st_std": 8, "et_std": 18, "base_std": 0.0, "peak_std": 1.0,
             "control_points": [{"time": "st", "value": "base"}, {"time": "st+1", "value": "peak"},
                                {"time": "et-1", "value": "peak"}, {"time": "et", "value": "base"}]}
        ]
    })
}

fn model() -> (Model, Handle, Handle, Handle) {
    let mut model = Model::new();
    let office = model.add(space_type_record("Office", "90.1-2013", "Office", "OpenOffice"));
    let plenum = model.add(space_type_record("Office Plenum", "90.1-2013", "Office", "Plenum"));
    let bare = model.add(Record::named("OS:SpaceType", "Unlabelled"));
    (model, office, plenum, bare)
}

fn linked<'a>(model: &'a Model, record: &Record, label: &str) -> Option<&'a Record> {
    record
        .value_by_label(label)
        .and_then(Handle::parse)
        .and_then(|h| model.get(&h))
}

#[test]
fn test_apply_from_files() {
    let dir = tempdir().unwrap();
    let data_path = dir.path().join("standards.json");
    let config_path = dir.path().join("rules.json");
    let in_path = dir.path().join("in.osm");
    let out_path = dir.path().join("out.osm");

    write_json(&data_path, &data_json()).unwrap();
    let mut config = RulesConfig::new();
    config.timesteps_per_hour = 6;
    write_json(&config_path, &config).unwrap();
    let (model, office, plenum, _) = model();
    write_osm(&in_path, &model).unwrap();

    let data = StandardsData::load(&data_path).unwrap();
    let config = RulesConfig::load(&config_path).unwrap();
    let mut model = read_osm(&in_path).unwrap();
    let report = apply_standards_to_model(&mut model, &data, &config, None).unwrap();
    assert_eq!(report.applied, vec!["Office".to_string()]);
    assert_eq!(report.plenums, vec!["Office Plenum".to_string()]);
    assert_eq!(report.skipped, vec!["Unlabelled".to_string()]);
    write_osm(&out_path, &model).unwrap();

    let model = read_osm(&out_path).unwrap();
    let office = model.get(&office).unwrap();

    let color = linked(&model, office, "Group Rendering Name").unwrap();
    assert_eq!(color.class, "OS:Rendering:Color");
    let plenum = model.get(&plenum).unwrap();
    assert!(linked(&model, plenum, "Group Rendering Name").is_some());
    assert!(
        model
            .referencing_of_class(&plenum.handle().unwrap(), "OS:Lights")
            .is_empty()
    );

    assert!(linked(&model, office, "Design Specification Outdoor Air Object Name").is_some());
    for class in ["OS:People", "OS:Lights", "OS:ElectricEquipment", "OS:SpaceInfiltration:DesignFlowRate"] {
        assert_eq!(
            model.referencing_of_class(&office.handle().unwrap(), class).len(),
            1,
            "{class}"
        );
    }
    assert!(model.objects_of_class("OS:GasEquipment").is_empty());

    let set = linked(&model, office, "Default Schedule Set Name").unwrap();
    let occ = linked(&model, set, "Number of People Schedule Name").unwrap();
    assert_eq!(occ.name(), Some("Office Occ"));
    let equip = linked(&model, set, "Electric Equipment Schedule Name").unwrap();
    assert_eq!(equip.handle(), occ.handle());
    let infiltration = linked(&model, set, "Infiltration Schedule Name").unwrap();
    let always_on = ScheduleRuleset::from_model(&model, &infiltration.handle().unwrap()).unwrap();
    assert_eq!(always_on.default_day.values(), &[1.0]);

    // The parametric occupancy schedule was smoothed on a 10 minute grid.
    let occ = ScheduleRuleset::from_model(&model, &occ.handle().unwrap()).unwrap();
    assert!(occ.default_day.times().iter().all(|t| t % 10 == 0));
    assert!(occ.default_day.times().len() > 4);

    let thermostat = model
        .find_by_name("OS:ThermostatSetpoint:DualSetpoint", "Office Thermostat")
        .unwrap();
    let htg = linked(&model, thermostat, "Heating Setpoint Temperature Schedule Name").unwrap();
    assert_eq!(htg.name(), Some("Office Htg"));
}

#[test]
fn test_apply_twice_is_stable() {
    let data: StandardsData = serde_json::from_value(data_json()).unwrap();
    let config = RulesConfig::new();
    let (mut model, ..) = model();
    apply_standards_to_model(&mut model, &data, &config, None).unwrap();
    let count = model.len();
    apply_standards_to_model(&mut model, &data, &config, None).unwrap();
    assert_eq!(model.len(), count);
}

#[test]
fn test_load_selection_limits_changes() {
    let data: StandardsData = serde_json::from_value(data_json()).unwrap();
    let mut config = RulesConfig::new();
    config.load_selection = LoadSelection {
        lights: true,
        ..LoadSelection::none()
    };
    let (mut model, office, ..) = model();
    apply_standards_to_model(&mut model, &data, &config, None).unwrap();
    assert_eq!(model.referencing_of_class(&office, "OS:Lights").len(), 1);
    assert!(model.objects_of_class("OS:People").is_empty());
    assert!(model.objects_of_class("OS:ThermostatSetpoint:DualSetpoint").is_empty());
    assert!(model.find_by_name("OS:Schedule:Ruleset", "Office Occ").is_none());
    assert!(model.find_by_name("OS:Schedule:Ruleset", "Office Light").is_some());
}

#[test]
fn test_building_type_fallback() {
    let data: StandardsData = serde_json::from_value(data_json()).unwrap();
    let mut model = Model::new();
    let st = model.add(
        Record::named("OS:SpaceType", "Open Office")
            .with("", "Default Schedule Set Name")
            .with("", "Group Rendering Name")
            .with("OpenOffice", "Standards Space Type"),
    );
    let report = apply_standards_to_model(&mut model, &data, &RulesConfig::new(), Some("Office")).unwrap();
    assert_eq!(report.applied, vec!["Open Office".to_string()]);
    assert_eq!(model.referencing_of_class(&st, "OS:People").len(), 1);
}
