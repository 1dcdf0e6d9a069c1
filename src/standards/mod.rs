//! Standards tables and the rules that apply them to a model.

pub mod climate;
pub mod data;
pub mod lookup;
pub mod ratios;
pub mod space_type;
pub mod units;

pub use climate::weather_file_for;
pub use data::{ScheduleRow, StandardsData, ValuesKind, build_hourly_ruleset};
pub use lookup::{Row, SearchCriteria, find_object, find_objects};
pub use ratios::{SpaceTypeRatio, space_type_ratios};
pub use space_type::{
    ApplyReport, LoadSelection, ScheduleOptions, SpaceTypeProperties, apply_internal_loads,
    apply_rendering_color, apply_schedules, apply_standards_to_model,
};
