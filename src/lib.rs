pub mod config;
pub mod dedup;
mod handle;
pub mod io;
mod name;
pub mod osm;
pub mod schedule;
pub mod standards;

// Prelude
pub use config::RulesConfig;
pub use dedup::{DedupReport, eliminate_duplicates, eliminate_material_and_construction_duplicates};
pub use handle::Handle;
pub use name::{HasName, SortByName};
pub use osm::{Model, Record};
pub use schedule::{ScheduleDay, ScheduleRuleset, ScheduleTypeLimits};
pub use standards::StandardsData;
