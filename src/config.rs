use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::io::read_json;
use crate::schedule::check_timesteps_per_hour;
use crate::standards::space_type::{LoadSelection, ScheduleOptions};

/// Configuration of the standards rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Standards template used for lookups, e.g. `"90.1-2013"`.
    pub template: String,
    /// Schedule resolution. Must divide 60.
    pub timesteps_per_hour: u32,
    /// Calendar year used for annual schedule values.
    pub year: i32,
    /// Limits smoothed values of fractional schedules to `[0, 1]`.
    pub clamp_fraction_values: bool,
    /// Load categories the space type rules may set.
    pub load_selection: LoadSelection,
}

impl RulesConfig {
    pub fn new() -> Self {
        Self {
            template: "90.1-2013".to_string(),
            timesteps_per_hour: 4,
            year: 2009,
            clamp_fraction_values: true,
            load_selection: LoadSelection::all(),
        }
    }

    /// Reads and validates a JSON configuration file. Missing keys take
    /// their default values.
    pub fn load(path: &Path) -> Result<Self> {
        let config: Self = read_json(path)?;
        config
            .validate()
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        check_timesteps_per_hour(self.timesteps_per_hour)?;
        if self.template.trim().is_empty() {
            bail!("template must not be empty");
        }
        Ok(())
    }

    pub fn schedule_options(&self) -> ScheduleOptions {
        ScheduleOptions {
            timesteps_per_hour: self.timesteps_per_hour,
            clamp_fraction_values: self.clamp_fraction_values,
        }
    }
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self::new()
    }
}
