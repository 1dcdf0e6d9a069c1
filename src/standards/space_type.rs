//! Standards rules applied to `OS:SpaceType` records: internal loads,
//! rendering colors and default schedule sets.

use std::fmt;

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info, warn};

use super::data::StandardsData;
use super::units;
use crate::config::RulesConfig;
use crate::osm::{Model, Record};
use crate::schedule::rule::{MonthDay, ScheduleRule, Weekdays};
use crate::schedule::{ScheduleDay, ScheduleRuleset, ScheduleTypeLimits};
use crate::{Handle, SortByName};

pub const SPACE_TYPE: &str = "OS:SpaceType";
const SPACE_OR_SPACE_TYPE: &str = "Space or SpaceType Name";
const VENTILATION_METHOD: &str = "Sum";
const PEOPLE_FRACTION_RADIANT: f64 = 0.3;

fn zero_if_null<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0))
}

/// Standards values of one space type, in IP units as tabulated.
///
/// Missing and `null` numbers read as 0, which means "no information".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpaceTypeProperties {
    pub template: Option<String>,
    pub building_type: Option<String>,
    pub space_type: Option<String>,

    /// people/1000 ft²
    #[serde(deserialize_with = "zero_if_null")]
    pub occupancy_per_area: f64,
    /// W/ft²
    #[serde(deserialize_with = "zero_if_null")]
    pub lighting_per_area: f64,
    /// W/person
    #[serde(deserialize_with = "zero_if_null")]
    pub lighting_per_person: f64,
    /// W/ft²
    #[serde(deserialize_with = "zero_if_null")]
    pub additional_lighting_per_area: f64,
    #[serde(deserialize_with = "zero_if_null")]
    pub lighting_fraction_to_return_air: f64,
    #[serde(deserialize_with = "zero_if_null")]
    pub lighting_fraction_radiant: f64,
    #[serde(deserialize_with = "zero_if_null")]
    pub lighting_fraction_visible: f64,
    #[serde(deserialize_with = "zero_if_null")]
    pub lighting_fraction_replaceable: f64,

    /// W/ft²
    #[serde(deserialize_with = "zero_if_null")]
    pub electric_equipment_per_area: f64,
    #[serde(deserialize_with = "zero_if_null")]
    pub electric_equipment_fraction_latent: f64,
    #[serde(deserialize_with = "zero_if_null")]
    pub electric_equipment_fraction_radiant: f64,
    #[serde(deserialize_with = "zero_if_null")]
    pub electric_equipment_fraction_lost: f64,

    /// Btu/h·ft²
    #[serde(deserialize_with = "zero_if_null")]
    pub gas_equipment_per_area: f64,
    #[serde(deserialize_with = "zero_if_null")]
    pub gas_equipment_fraction_latent: f64,
    #[serde(deserialize_with = "zero_if_null")]
    pub gas_equipment_fraction_radiant: f64,
    #[serde(deserialize_with = "zero_if_null")]
    pub gas_equipment_fraction_lost: f64,

    /// cfm/ft²
    #[serde(deserialize_with = "zero_if_null")]
    pub ventilation_per_area: f64,
    /// cfm/person
    #[serde(deserialize_with = "zero_if_null")]
    pub ventilation_per_person: f64,
    /// 1/h
    #[serde(deserialize_with = "zero_if_null")]
    pub ventilation_air_changes: f64,

    /// cfm/ft² of exterior surface
    #[serde(deserialize_with = "zero_if_null")]
    pub infiltration_per_exterior_area: f64,
    /// cfm/ft² of exterior wall
    #[serde(deserialize_with = "zero_if_null")]
    pub infiltration_per_exterior_wall_area: f64,
    /// 1/h
    #[serde(deserialize_with = "zero_if_null")]
    pub infiltration_air_changes: f64,

    /// `"r_g_b"`
    pub rgb: Option<String>,

    pub occupancy_schedule: Option<String>,
    pub occupancy_activity_schedule: Option<String>,
    pub lighting_schedule: Option<String>,
    pub electric_equipment_schedule: Option<String>,
    pub gas_equipment_schedule: Option<String>,
    pub infiltration_schedule: Option<String>,
    pub heating_setpoint_schedule: Option<String>,
    pub cooling_setpoint_schedule: Option<String>,
}

impl SpaceTypeProperties {
    pub fn people_have_info(&self) -> bool {
        self.occupancy_per_area != 0.0
    }

    pub fn lights_have_info(&self) -> bool {
        self.lighting_per_area != 0.0 || self.lighting_per_person != 0.0
    }

    pub fn electric_equipment_have_info(&self) -> bool {
        self.electric_equipment_per_area != 0.0
    }

    pub fn gas_equipment_have_info(&self) -> bool {
        self.gas_equipment_per_area != 0.0
    }

    pub fn ventilation_have_info(&self) -> bool {
        self.ventilation_per_area != 0.0 || self.ventilation_per_person != 0.0 || self.ventilation_air_changes != 0.0
    }

    pub fn infiltration_have_info(&self) -> bool {
        self.infiltration_per_exterior_area != 0.0
            || self.infiltration_per_exterior_wall_area != 0.0
            || self.infiltration_air_changes != 0.0
    }

    /// Parses `rgb` into its components.
    pub fn color(&self) -> Result<Option<[u8; 3]>> {
        let Some(rgb) = &self.rgb else {
            return Ok(None);
        };
        let parts: Vec<&str> = rgb.split('_').collect();
        if parts.len() != 3 {
            bail!("Invalid rendering color {rgb}, expected r_g_b");
        }
        let mut color = [0u8; 3];
        for (c, p) in color.iter_mut().zip(&parts) {
            *c = p
                .trim()
                .parse()
                .with_context(|| format!("Invalid rendering color {rgb}"))?;
        }
        Ok(Some(color))
    }
}

/// Which load categories the rules may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadSelection {
    pub people: bool,
    pub lights: bool,
    pub electric_equipment: bool,
    pub gas_equipment: bool,
    pub ventilation: bool,
    pub infiltration: bool,
    /// Creates a dual setpoint thermostat from the setpoint schedules.
    pub thermostat: bool,
}

impl LoadSelection {
    pub fn all() -> Self {
        Self {
            people: true,
            lights: true,
            electric_equipment: true,
            gas_equipment: true,
            ventilation: true,
            infiltration: true,
            thermostat: true,
        }
    }

    pub fn none() -> Self {
        Self {
            people: false,
            lights: false,
            electric_equipment: false,
            gas_equipment: false,
            ventilation: false,
            infiltration: false,
            thermostat: false,
        }
    }
}

impl Default for LoadSelection {
    fn default() -> Self {
        Self::all()
    }
}

/// Creates an `OS:SpaceType` record tagged with standards identifiers.
pub fn space_type_record(name: &str, template: &str, building_type: &str, space_type: &str) -> Record {
    Record::named(SPACE_TYPE, name)
        .with("", "Default Construction Set Name")
        .with("", "Default Schedule Set Name")
        .with("", "Group Rendering Name")
        .with("", "Design Specification Outdoor Air Object Name")
        .with(template, "Standards Template")
        .with(building_type, "Standards Building Type")
        .with(space_type, "Standards Space Type")
}

fn space_type<'a>(model: &'a Model, handle: &Handle) -> Result<&'a Record> {
    let record = model
        .get(handle)
        .ok_or_else(|| anyhow!("No space type with handle {handle}"))?;
    if record.class != SPACE_TYPE {
        bail!("Expected {SPACE_TYPE}, got {}", record.class);
    }
    Ok(record)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// `Standards Building Type` and `Standards Space Type` of a space type record.
pub fn standards_ids(record: &Record) -> (Option<&str>, Option<&str>) {
    (
        non_empty(record.value_by_label("Standards Building Type")),
        non_empty(record.value_by_label("Standards Space Type")),
    )
}

/// Plenums take no internal loads.
pub fn is_plenum(record: &Record) -> bool {
    let in_name = record.name().is_some_and(|n| n.to_lowercase().contains("plenum"));
    let in_standards = standards_ids(record)
        .1
        .is_some_and(|s| s.to_lowercase().contains("plenum"));
    in_name || in_standards
}

/// Record shapes of one load category.
struct LoadKind {
    what: &'static str,
    instance_class: &'static str,
    definition_class: Option<&'static str>,
    definition_label: &'static str,
    suffix: &'static str,
}

const PEOPLE: LoadKind = LoadKind {
    what: "people",
    instance_class: "OS:People",
    definition_class: Some("OS:People:Definition"),
    definition_label: "People Definition Name",
    suffix: "People",
};

const LIGHTS: LoadKind = LoadKind {
    what: "lights",
    instance_class: "OS:Lights",
    definition_class: Some("OS:Lights:Definition"),
    definition_label: "Lights Definition Name",
    suffix: "Lights",
};

const ELECTRIC_EQUIPMENT: LoadKind = LoadKind {
    what: "electric equipment",
    instance_class: "OS:ElectricEquipment",
    definition_class: Some("OS:ElectricEquipment:Definition"),
    definition_label: "Electric Equipment Definition Name",
    suffix: "Elec Equip",
};

const GAS_EQUIPMENT: LoadKind = LoadKind {
    what: "gas equipment",
    instance_class: "OS:GasEquipment",
    definition_class: Some("OS:GasEquipment:Definition"),
    definition_label: "Gas Equipment Definition Name",
    suffix: "Gas Equip",
};

const INFILTRATION: LoadKind = LoadKind {
    what: "infiltration objects",
    instance_class: "OS:SpaceInfiltration:DesignFlowRate",
    definition_class: None,
    definition_label: "",
    suffix: "Infiltration",
};

fn new_definition(class: &str, name: &str) -> Record {
    let record = Record::named(class, name);
    match class {
        "OS:People:Definition" => record
            .with("People", "Number of People Calculation Method")
            .with("0", "Number of People")
            .with("", "People per Space Floor Area {person/m2}")
            .with("", "Space Floor Area per Person {m2/person}")
            .with(&PEOPLE_FRACTION_RADIANT.to_string(), "Fraction Radiant"),
        "OS:Lights:Definition" => record
            .with("LightingLevel", "Design Level Calculation Method")
            .with("0", "Lighting Level {W}")
            .with("", "Watts per Space Floor Area {W/m2}")
            .with("", "Watts per Person {W/person}")
            .with("0", "Return Air Fraction")
            .with("0", "Fraction Radiant")
            .with("0", "Fraction Visible"),
        _ => record
            .with("EquipmentLevel", "Design Level Calculation Method")
            .with("0", "Design Level {W}")
            .with("", "Watts per Space Floor Area {W/m2}")
            .with("", "Watts per Person {W/person}")
            .with("0", "Fraction Latent")
            .with("0", "Fraction Radiant")
            .with("0", "Fraction Lost"),
    }
}

fn new_instance(kind: &LoadKind, name: &str, definition: Option<&Handle>, space_type: &Handle) -> Record {
    let mut record = Record::named(kind.instance_class, name);
    if let Some(def) = definition {
        record.push(def.as_str(), kind.definition_label);
    }
    record.push(space_type.as_str(), SPACE_OR_SPACE_TYPE);
    match kind.instance_class {
        "OS:People" => record
            .with("", "Number of People Schedule Name")
            .with("", "Activity Level Schedule Name")
            .with("", "Surface Name/Angle Factor List Name")
            .with("", "Work Efficiency Schedule Name")
            .with("", "Clothing Insulation Schedule Name")
            .with("", "Air Velocity Schedule Name")
            .with("1", "Multiplier"),
        "OS:Lights" => record
            .with("", "Schedule Name")
            .with("1", "Fraction Replaceable")
            .with("1", "Multiplier")
            .with("General", "End-Use Subcategory"),
        "OS:SpaceInfiltration:DesignFlowRate" => record
            .with("", "Schedule Name")
            .with("Flow/Space", "Design Flow Rate Calculation Method")
            .with("", "Design Flow Rate {m3/s}")
            .with("", "Flow per Space Floor Area {m3/s-m2}")
            .with("", "Flow per Exterior Surface Area {m3/s-m2}")
            .with("", "Flow per Exterior Wall Area {m3/s-m2}")
            .with("", "Air Changes per Hour {1/hr}")
            .with("1", "Constant Term Coefficient")
            .with("0", "Temperature Term Coefficient")
            .with("0", "Velocity Term Coefficient")
            .with("0", "Velocity Squared Term Coefficient"),
        _ => record
            .with("", "Schedule Name")
            .with("1", "Multiplier")
            .with("General", "End-Use Subcategory"),
    }
}

/// Leaves exactly one instance of `kind` attached to the space type.
///
/// Creates a definition and instance when there is none and removes all but
/// the first (by name) when there are several. The additional lighting
/// instance is not counted. Returns the instance handle and the handle of
/// its definition.
fn ensure_single_instance(
    model: &mut Model,
    space_type: &Handle,
    space_type_name: &str,
    kind: &LoadKind,
) -> Result<(Handle, Option<Handle>)> {
    let additional = format!("{space_type_name} Additional {}", kind.suffix);
    let mut instances: Vec<&Record> = model
        .objects_of_class(kind.instance_class)
        .into_iter()
        .filter(|r| r.value_by_label(SPACE_OR_SPACE_TYPE).map(str::trim) == Some(space_type.as_str()))
        .filter(|r| r.name() != Some(additional.as_str()))
        .collect();
    instances.sort_by_name();
    let handles: Vec<(Handle, String)> = instances
        .iter()
        .filter_map(|r| Some((r.handle()?, r.name().unwrap_or_default().to_string())))
        .collect();

    let Some((first, _)) = handles.first().cloned() else {
        let definition = kind.definition_class.map(|class| {
            let name = format!("{space_type_name} {} Definition", kind.suffix);
            model.add(new_definition(class, &name))
        });
        let name = format!("{space_type_name} {}", kind.suffix);
        let instance = model.add(new_instance(kind, &name, definition.as_ref(), space_type));
        info!("{space_type_name} had no {}, one has been created.", kind.what);
        return Ok((instance, definition));
    };

    for (handle, name) in handles.iter().skip(1) {
        model.remove(handle);
        info!("Removed {name} from {space_type_name}.");
    }

    let definition = match kind.definition_class {
        None => None,
        Some(class) => {
            let linked = model
                .get(&first)
                .and_then(|r| r.value_by_label(kind.definition_label))
                .and_then(Handle::parse)
                .filter(|h| model.get(h).is_some_and(|d| d.class == class));
            match linked {
                Some(h) => Some(h),
                None => bail!("{} of {space_type_name} has no {class}", kind.suffix),
            }
        }
    };
    Ok((first, definition))
}

/// Sets a design level field and switches the calculation method to it.
/// The competing level fields are cleared.
fn set_design_level(record: &mut Record, method: &str, label: &str, value: f64, levels: &[&str]) {
    for method_label in ["Design Level Calculation Method", "Number of People Calculation Method"] {
        if record.value_by_label(method_label).is_some() {
            record.set_value_by_label(method_label, method);
        }
    }
    for l in levels {
        record.set_value_by_label(l, "");
    }
    record.set_value_by_label(label, &value.to_string());
}

fn record_mut<'a>(model: &'a mut Model, handle: &Handle) -> Result<&'a mut Record> {
    model
        .get_mut(handle)
        .ok_or_else(|| anyhow!("No record with handle {handle}"))
}

fn set_fraction_if_nonzero(record: &mut Record, label: &str, value: f64) {
    if value != 0.0 {
        record.set_value_by_label(label, &value.to_string());
    }
}

/// Returns the handle of the ruleset named `name`, building it with `build`
/// when the model does not have one yet.
fn ensure_ruleset(model: &mut Model, name: &str, build: impl FnOnce() -> Result<ScheduleRuleset>) -> Result<Handle> {
    if let Some(handle) = model
        .find_by_name("OS:Schedule:Ruleset", name)
        .and_then(|r| r.handle())
    {
        debug!("Already added schedule: {name}");
        return Ok(handle);
    }
    build()?.to_records(model)
}

fn comfort_schedules(model: &mut Model) -> Result<[Handle; 3]> {
    let clothing = ensure_ruleset(model, "Clothing Schedule", || {
        let mut sch = ScheduleRuleset::new(
            "Clothing Schedule",
            ScheduleTypeLimits::Any,
            ScheduleDay::constant("Clothing Schedule Default Winter Clothes", 1.0),
        );
        sch.add_rule(ScheduleRule::new(
            "Clothing Schedule Summer Rule",
            ScheduleDay::constant("Clothing Schedule Summer Clothes", 0.5),
            MonthDay::new(5, 1)?,
            MonthDay::new(9, 30)?,
            Weekdays::ALL,
        ));
        Ok(sch)
    })?;
    let air_velocity = ensure_ruleset(model, "Air Velocity Schedule", || {
        Ok(ScheduleRuleset::constant("Air Velocity Schedule", 0.2, ScheduleTypeLimits::Any))
    })?;
    let work_efficiency = ensure_ruleset(model, "Work Efficiency Schedule", || {
        Ok(ScheduleRuleset::constant("Work Efficiency Schedule", 0.0, ScheduleTypeLimits::Any))
    })?;
    Ok([clothing, air_velocity, work_efficiency])
}

fn apply_people(model: &mut Model, st: &Handle, st_name: &str, props: &SpaceTypeProperties) -> Result<()> {
    let (instance, definition) = ensure_single_instance(model, st, st_name, &PEOPLE)?;
    if let Some(def) = &definition {
        let def = record_mut(model, def)?;
        let per_m2 = units::people_per_1000_ft2_to_people_per_m2(props.occupancy_per_area);
        set_design_level(
            def,
            "People/Area",
            "People per Space Floor Area {person/m2}",
            per_m2,
            &["Number of People", "Space Floor Area per Person {m2/person}"],
        );
        info!(
            "{st_name} set occupancy to {} people/1000 ft^2.",
            props.occupancy_per_area
        );
        def.set_value_by_label("Fraction Radiant", &PEOPLE_FRACTION_RADIANT.to_string());
    }

    let [clothing, air_velocity, work_efficiency] = comfort_schedules(model)?;
    let inst = record_mut(model, &instance)?;
    inst.set_value_by_label("Clothing Insulation Schedule Name", clothing.as_str());
    inst.set_value_by_label("Air Velocity Schedule Name", air_velocity.as_str());
    inst.set_value_by_label("Work Efficiency Schedule Name", work_efficiency.as_str());
    Ok(())
}

fn apply_lights(model: &mut Model, st: &Handle, st_name: &str, props: &SpaceTypeProperties) -> Result<()> {
    let (_, definition) = ensure_single_instance(model, st, st_name, &LIGHTS)?;
    let levels = [
        "Lighting Level {W}",
        "Watts per Space Floor Area {W/m2}",
        "Watts per Person {W/person}",
    ];
    if let Some(def) = &definition {
        let def = record_mut(model, def)?;
        if props.lighting_per_area != 0.0 {
            let lpd = units::w_per_ft2_to_w_per_m2(props.lighting_per_area);
            set_design_level(def, "Watts/Area", levels[1], lpd, &levels);
            info!("{st_name} set LPD to {} W/ft^2.", props.lighting_per_area);
        }
        if props.lighting_per_person != 0.0 {
            set_design_level(def, "Watts/Person", levels[2], props.lighting_per_person, &levels);
            info!("{st_name} set lighting to {} W/person.", props.lighting_per_person);
        }
        set_fraction_if_nonzero(def, "Return Air Fraction", props.lighting_fraction_to_return_air);
        set_fraction_if_nonzero(def, "Fraction Radiant", props.lighting_fraction_radiant);
        set_fraction_if_nonzero(def, "Fraction Visible", props.lighting_fraction_visible);
    }

    if props.additional_lighting_per_area != 0.0 {
        let def_name = format!("{st_name} Additional Lights Definition");
        let def = match model
            .find_by_name("OS:Lights:Definition", &def_name)
            .and_then(|r| r.handle())
        {
            Some(h) => h,
            None => model.add(new_definition("OS:Lights:Definition", &def_name)),
        };
        let instance_name = format!("{st_name} Additional Lights");
        if model.find_by_name(LIGHTS.instance_class, &instance_name).is_none() {
            model.add(new_instance(&LIGHTS, &instance_name, Some(&def), st));
        }
        let def = record_mut(model, &def)?;
        let lpd = units::w_per_ft2_to_w_per_m2(props.additional_lighting_per_area);
        set_design_level(def, "Watts/Area", levels[1], lpd, &levels);
        def.set_value_by_label("Return Air Fraction", &props.lighting_fraction_to_return_air.to_string());
        def.set_value_by_label("Fraction Radiant", &props.lighting_fraction_radiant.to_string());
        def.set_value_by_label("Fraction Visible", &props.lighting_fraction_visible.to_string());
        info!(
            "{st_name} added {} W/ft^2 of additional lighting.",
            props.additional_lighting_per_area
        );
    }
    Ok(())
}

fn apply_equipment(
    model: &mut Model,
    st: &Handle,
    st_name: &str,
    kind: &LoadKind,
    epd_w_per_m2: f64,
    fractions: [f64; 3],
) -> Result<()> {
    let (_, definition) = ensure_single_instance(model, st, st_name, kind)?;
    let Some(def) = &definition else {
        return Ok(());
    };
    let def = record_mut(model, def)?;
    let levels = [
        "Design Level {W}",
        "Watts per Space Floor Area {W/m2}",
        "Watts per Person {W/person}",
    ];
    set_design_level(def, "Watts/Area", levels[1], epd_w_per_m2, &levels);
    let [latent, radiant, lost] = fractions;
    set_fraction_if_nonzero(def, "Fraction Latent", latent);
    set_fraction_if_nonzero(def, "Fraction Radiant", radiant);
    set_fraction_if_nonzero(def, "Fraction Lost", lost);
    Ok(())
}

/// Returns the outdoor air specification of the space type, creating
/// `"{space type} Ventilation"` when it has none.
fn ensure_ventilation(model: &mut Model, st: &Handle, st_name: &str) -> Result<Handle> {
    const LABEL: &str = "Design Specification Outdoor Air Object Name";
    let linked = space_type(model, st)?
        .value_by_label(LABEL)
        .and_then(Handle::parse)
        .filter(|h| model.get(h).is_some());
    if let Some(h) = linked {
        return Ok(h);
    }
    let spec = model.add(
        Record::named("OS:DesignSpecification:OutdoorAir", &format!("{st_name} Ventilation"))
            .with(VENTILATION_METHOD, "Outdoor Air Method")
            .with("0", "Outdoor Air Flow per Person {m3/s-person}")
            .with("0", "Outdoor Air Flow per Floor Area {m3/s-m2}")
            .with("0", "Outdoor Air Flow Rate {m3/s}")
            .with("0", "Outdoor Air Flow Air Changes per Hour {1/hr}"),
    );
    record_mut(model, st)?.set_value_by_label(LABEL, spec.as_str());
    info!("{st_name} had no ventilation specification, one has been created.");
    Ok(spec)
}

fn apply_ventilation(model: &mut Model, spec: &Handle, st_name: &str, props: &SpaceTypeProperties) -> Result<()> {
    let spec = record_mut(model, spec)?;
    if !props.ventilation_have_info() {
        spec.set_value_by_label("Outdoor Air Flow per Floor Area {m3/s-m2}", "0");
        spec.set_value_by_label("Outdoor Air Flow per Person {m3/s-person}", "0");
        spec.set_value_by_label("Outdoor Air Flow Air Changes per Hour {1/hr}", "0");
        return Ok(());
    }
    spec.set_value_by_label("Outdoor Air Method", VENTILATION_METHOD);
    if props.ventilation_per_area != 0.0 {
        let v = units::cfm_per_ft2_to_m3_s_per_m2(props.ventilation_per_area);
        spec.set_value_by_label("Outdoor Air Flow per Floor Area {m3/s-m2}", &v.to_string());
        info!(
            "{st_name} set ventilation per area to {} cfm/ft^2.",
            props.ventilation_per_area
        );
    }
    if props.ventilation_per_person != 0.0 {
        let v = units::cfm_to_m3_s(props.ventilation_per_person);
        spec.set_value_by_label("Outdoor Air Flow per Person {m3/s-person}", &v.to_string());
        info!(
            "{st_name} set ventilation per person to {} cfm/person.",
            props.ventilation_per_person
        );
    }
    if props.ventilation_air_changes != 0.0 {
        spec.set_value_by_label(
            "Outdoor Air Flow Air Changes per Hour {1/hr}",
            &props.ventilation_air_changes.to_string(),
        );
        info!("{st_name} set ventilation to {} ACH.", props.ventilation_air_changes);
    }
    Ok(())
}

fn apply_infiltration(model: &mut Model, st: &Handle, st_name: &str, props: &SpaceTypeProperties) -> Result<()> {
    let (instance, _) = ensure_single_instance(model, st, st_name, &INFILTRATION)?;
    let inst = record_mut(model, &instance)?;
    let flows = [
        "Design Flow Rate {m3/s}",
        "Flow per Space Floor Area {m3/s-m2}",
        "Flow per Exterior Surface Area {m3/s-m2}",
        "Flow per Exterior Wall Area {m3/s-m2}",
        "Air Changes per Hour {1/hr}",
    ];
    let mut set = |method: &str, label: &str, value: f64| {
        inst.set_value_by_label("Design Flow Rate Calculation Method", method);
        for l in &flows {
            inst.set_value_by_label(l, "");
        }
        inst.set_value_by_label(label, &value.to_string());
    };
    if props.infiltration_per_exterior_area != 0.0 {
        let v = units::cfm_per_ft2_to_m3_s_per_m2(props.infiltration_per_exterior_area);
        set("Flow/ExteriorArea", flows[2], v);
        info!(
            "{st_name} set infiltration to {} cfm per ft^2 exterior surface area.",
            props.infiltration_per_exterior_area
        );
    }
    if props.infiltration_per_exterior_wall_area != 0.0 {
        let v = units::cfm_per_ft2_to_m3_s_per_m2(props.infiltration_per_exterior_wall_area);
        set("Flow/ExteriorWallArea", flows[3], v);
        info!(
            "{st_name} set infiltration to {} cfm per ft^2 exterior wall area.",
            props.infiltration_per_exterior_wall_area
        );
    }
    if props.infiltration_air_changes != 0.0 {
        set("AirChanges/Hour", flows[4], props.infiltration_air_changes);
        info!("{st_name} set infiltration to {} ACH.", props.infiltration_air_changes);
    }
    Ok(())
}

/// Applies standards internal loads to a space type.
///
/// Plenums are skipped and return `false`. Every selected category that has
/// information ends up with exactly one definition and instance attached to
/// the space type, holding SI values. The outdoor air specification is
/// created even when ventilation is not selected; with ventilation selected
/// but no ventilation information its flows are zeroed.
pub fn apply_internal_loads(
    model: &mut Model,
    space_type_handle: &Handle,
    props: &SpaceTypeProperties,
    selection: &LoadSelection,
) -> Result<bool> {
    let record = space_type(model, space_type_handle)?;
    let name = record.name().unwrap_or_default().to_string();
    if is_plenum(record) {
        debug!("Skipping internal loads of plenum {name}");
        return Ok(false);
    }
    let st = space_type_handle;

    if selection.people && props.people_have_info() {
        apply_people(model, st, &name, props)?;
    }
    if selection.lights && props.lights_have_info() {
        apply_lights(model, st, &name, props)?;
    }
    if selection.electric_equipment && props.electric_equipment_have_info() {
        let epd = units::w_per_ft2_to_w_per_m2(props.electric_equipment_per_area);
        apply_equipment(
            model,
            st,
            &name,
            &ELECTRIC_EQUIPMENT,
            epd,
            [
                props.electric_equipment_fraction_latent,
                props.electric_equipment_fraction_radiant,
                props.electric_equipment_fraction_lost,
            ],
        )?;
        info!("{name} set electric EPD to {} W/ft^2.", props.electric_equipment_per_area);
    }
    if selection.gas_equipment && props.gas_equipment_have_info() {
        let epd = units::btu_h_ft2_to_w_per_m2(props.gas_equipment_per_area);
        apply_equipment(
            model,
            st,
            &name,
            &GAS_EQUIPMENT,
            epd,
            [
                props.gas_equipment_fraction_latent,
                props.gas_equipment_fraction_radiant,
                props.gas_equipment_fraction_lost,
            ],
        )?;
        info!("{name} set gas EPD to {} Btu/hr*ft^2.", props.gas_equipment_per_area);
    }

    let spec = ensure_ventilation(model, st, &name)?;
    if selection.ventilation {
        apply_ventilation(model, &spec, &name, props)?;
    }

    if selection.infiltration && props.infiltration_have_info() {
        apply_infiltration(model, st, &name, props)?;
    }
    Ok(true)
}

const RENDERING_COLOR: &str = "OS:Rendering:Color";

/// Creates an `OS:Rendering:Color` named after the space type and attaches
/// it. A color record the space type already links is updated in place.
///
/// Returns `false` when the properties carry no color.
pub fn apply_rendering_color(model: &mut Model, space_type_handle: &Handle, props: &SpaceTypeProperties) -> Result<bool> {
    let name = space_type(model, space_type_handle)?
        .name()
        .unwrap_or_default()
        .to_string();
    let Some([r, g, b]) = props.color()? else {
        return Ok(false);
    };
    let linked = space_type(model, space_type_handle)?
        .value_by_label("Group Rendering Name")
        .and_then(Handle::parse)
        .filter(|h| model.get(h).is_some_and(|c| c.class == RENDERING_COLOR));
    let values = [
        (r.to_string(), "Rendering Red Value"),
        (g.to_string(), "Rendering Green Value"),
        (b.to_string(), "Rendering Blue Value"),
        ("255".to_string(), "Rendering Alpha Value"),
    ];
    match linked {
        Some(h) => {
            let color = record_mut(model, &h)?;
            for (value, label) in &values {
                color.set_value_by_label(label, value);
            }
        }
        None => {
            let color = values
                .iter()
                .fold(Record::named(RENDERING_COLOR, &name), |rec, (value, label)| rec.with(value, label));
            let color = model.add(color);
            record_mut(model, space_type_handle)?.set_value_by_label("Group Rendering Name", color.as_str());
        }
    }
    debug!("{name} rendering color set to {r}_{g}_{b}");
    Ok(true)
}

/// Options for building schedules from the standards tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleOptions {
    pub timesteps_per_hour: u32,
    pub clamp_fraction_values: bool,
}

fn add_schedule(model: &mut Model, data: &StandardsData, name: &str, options: &ScheduleOptions) -> Result<Handle> {
    ensure_ruleset(model, name, || {
        data.schedule_ruleset(name, options.timesteps_per_hour, options.clamp_fraction_values)
    })
    .with_context(|| format!("Failed to add schedule {name}"))
}

/// Sets the standards schedules of the selected categories on the default
/// schedule set of the space type, creating `"{space type} Schedule Set"`
/// when it has none. Schedules already in the model are reused by name.
///
/// With `selection.thermostat` a `"{space type} Thermostat"` dual setpoint
/// record is created from the setpoint schedules. It is not attached to any
/// zone.
///
/// A schedule name that the tables do not define is an error.
pub fn apply_schedules(
    model: &mut Model,
    space_type_handle: &Handle,
    props: &SpaceTypeProperties,
    data: &StandardsData,
    selection: &LoadSelection,
    options: &ScheduleOptions,
) -> Result<()> {
    const LABEL: &str = "Default Schedule Set Name";
    let record = space_type(model, space_type_handle)?;
    let name = record.name().unwrap_or_default().to_string();
    let linked = record
        .value_by_label(LABEL)
        .and_then(Handle::parse)
        .filter(|h| model.get(h).is_some());
    let set = match linked {
        Some(h) => h,
        None => {
            let h = model.add(
                Record::named("OS:DefaultScheduleSet", &format!("{name} Schedule Set"))
                    .with("", "Hours of Operation Schedule Name")
                    .with("", "Number of People Schedule Name")
                    .with("", "People Activity Level Schedule Name")
                    .with("", "Lighting Schedule Name")
                    .with("", "Electric Equipment Schedule Name")
                    .with("", "Gas Equipment Schedule Name")
                    .with("", "Hot Water Equipment Schedule Name")
                    .with("", "Infiltration Schedule Name")
                    .with("", "Steam Equipment Schedule Name")
                    .with("", "Other Equipment Schedule Name"),
            );
            record_mut(model, space_type_handle)?.set_value_by_label(LABEL, h.as_str());
            h
        }
    };

    let assignments = [
        (selection.people, &props.occupancy_schedule, "Number of People Schedule Name", "occupancy"),
        (
            selection.people,
            &props.occupancy_activity_schedule,
            "People Activity Level Schedule Name",
            "occupant activity",
        ),
        (selection.lights, &props.lighting_schedule, "Lighting Schedule Name", "lighting"),
        (
            selection.electric_equipment,
            &props.electric_equipment_schedule,
            "Electric Equipment Schedule Name",
            "electric equipment",
        ),
        (
            selection.gas_equipment,
            &props.gas_equipment_schedule,
            "Gas Equipment Schedule Name",
            "gas equipment",
        ),
        (
            selection.infiltration,
            &props.infiltration_schedule,
            "Infiltration Schedule Name",
            "infiltration",
        ),
    ];
    for (selected, schedule, label, what) in assignments {
        let Some(schedule) = schedule.as_deref().filter(|_| selected) else {
            continue;
        };
        let h = add_schedule(model, data, schedule, options)?;
        record_mut(model, &set)?.set_value_by_label(label, h.as_str());
        info!("{name} set {what} schedule to {schedule}.");
    }

    if selection.thermostat {
        const THERMOSTAT: &str = "OS:ThermostatSetpoint:DualSetpoint";
        let thermostat_name = format!("{name} Thermostat");
        let heating = match &props.heating_setpoint_schedule {
            Some(s) => Some(add_schedule(model, data, s, options)?),
            None => None,
        };
        let cooling = match &props.cooling_setpoint_schedule {
            Some(s) => Some(add_schedule(model, data, s, options)?),
            None => None,
        };
        if model.find_by_name(THERMOSTAT, &thermostat_name).is_none() {
            model.add(
                Record::named(THERMOSTAT, &thermostat_name)
                    .with("", "Heating Setpoint Temperature Schedule Name")
                    .with("", "Cooling Setpoint Temperature Schedule Name"),
            );
        }
        let thermostat = model
            .find_by_name_mut(THERMOSTAT, &thermostat_name)
            .ok_or_else(|| anyhow!("Failed to add {thermostat_name}"))?;
        if let Some(h) = heating {
            thermostat.set_value_by_label("Heating Setpoint Temperature Schedule Name", h.as_str());
            info!("{name} set heating setpoint schedule.");
        }
        if let Some(h) = cooling {
            thermostat.set_value_by_label("Cooling Setpoint Temperature Schedule Name", h.as_str());
            info!("{name} set cooling setpoint schedule.");
        }
    }
    Ok(())
}

/// What happened to each space type of a model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Space types that received loads and schedules.
    pub applied: Vec<String>,
    /// Plenums, which only get colors and schedules.
    pub plenums: Vec<String>,
    /// Space types without standards identifiers.
    pub skipped: Vec<String>,
}

impl fmt::Display for ApplyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for name in &self.applied {
            writeln!(f, "applied: {name}")?;
        }
        for name in &self.plenums {
            writeln!(f, "plenum: {name}")?;
        }
        for name in &self.skipped {
            writeln!(f, "skipped: {name}")?;
        }
        Ok(())
    }
}

/// Applies rendering colors, internal loads and schedules to every space
/// type of the model.
///
/// The standards building type comes from the record, or from
/// `building_type` when the record has none. Space types without a
/// standards space type are skipped. A failed properties lookup is logged and
/// the rules run with empty properties.
pub fn apply_standards_to_model(
    model: &mut Model,
    data: &StandardsData,
    config: &RulesConfig,
    building_type: Option<&str>,
) -> Result<ApplyReport> {
    let mut report = ApplyReport::default();
    let targets: Vec<(Handle, String, Option<String>, Option<String>)> = model
        .objects_of_class(SPACE_TYPE)
        .into_iter()
        .filter_map(|r| {
            let (bt, st) = standards_ids(r);
            Some((
                r.handle()?,
                r.name().unwrap_or_default().to_string(),
                bt.or(building_type).map(str::to_string),
                st.map(str::to_string),
            ))
        })
        .collect();

    for (handle, name, bt, st) in targets {
        let (Some(bt), Some(st)) = (bt, st) else {
            warn!("{name} has no standards building type or space type, skipping.");
            report.skipped.push(name);
            continue;
        };
        let props = data
            .space_type_properties(&config.template, &bt, &st)
            .unwrap_or_default();
        apply_rendering_color(model, &handle, &props)?;
        let loads = apply_internal_loads(model, &handle, &props, &config.load_selection)?;
        apply_schedules(
            model,
            &handle,
            &props,
            data,
            &config.load_selection,
            &config.schedule_options(),
        )
        .with_context(|| format!("Failed to apply schedules to {name}"))?;
        if loads {
            report.applied.push(name);
        } else {
            report.plenums.push(name);
        }
    }
    info!(
        "Applied standards to {} space types ({} plenums, {} skipped)",
        report.applied.len(),
        report.plenums.len(),
        report.skipped.len()
    );
    Ok(report)
}
