use std::fmt;
use std::str::FromStr;

use anyhow::{Error, bail};
use serde::{Deserialize, Serialize};

use crate::Handle;
use crate::osm::Record;

/// Standard schedule type limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ScheduleTypeLimits {
    #[default]
    Fraction,
    OnOff,
    Temperature,
    ActivityLevel,
    HumidityRatio,
    Dimensionless,
    /// No limits record is attached.
    Any,
}

impl ScheduleTypeLimits {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Fraction => "Fraction",
            Self::OnOff => "OnOff",
            Self::Temperature => "Temperature",
            Self::ActivityLevel => "Activity",
            Self::HumidityRatio => "Humidity Ratio",
            Self::Dimensionless => "Dimensionless",
            Self::Any => "Any",
        }
    }

    /// `(lower, upper)` limit values.
    pub fn bounds(&self) -> (Option<f64>, Option<f64>) {
        match self {
            Self::Fraction | Self::OnOff => (Some(0.0), Some(1.0)),
            Self::ActivityLevel => (Some(0.0), None),
            _ => (None, None),
        }
    }

    pub fn numeric_type(&self) -> &'static str {
        match self {
            Self::OnOff => "Discrete",
            _ => "Continuous",
        }
    }

    pub fn unit_type(&self) -> &'static str {
        match self {
            Self::OnOff => "Availability",
            Self::Temperature => "Temperature",
            Self::ActivityLevel => "ActivityLevel",
            _ => "Dimensionless",
        }
    }

    /// Whether values must lie in `[0, 1]`.
    pub fn is_fractional(&self) -> bool {
        matches!(self, Self::Fraction | Self::OnOff)
    }

    /// `OS:ScheduleTypeLimits` record, or `None` for [`Self::Any`].
    pub fn to_record(&self, handle: &Handle) -> Option<Record> {
        if *self == Self::Any {
            return None;
        }
        let (lower, upper) = self.bounds();
        let limit = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_default();
        Some(
            Record::new("OS:ScheduleTypeLimits")
                .with(handle.as_str(), "Handle")
                .with(self.name(), "Name")
                .with(&limit(lower), "Lower Limit Value")
                .with(&limit(upper), "Upper Limit Value")
                .with(self.numeric_type(), "Numeric Type")
                .with(self.unit_type(), "Unit Type"),
        )
    }
}

impl TryFrom<String> for ScheduleTypeLimits {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ScheduleTypeLimits> for String {
    fn from(value: ScheduleTypeLimits) -> Self {
        value.name().to_string()
    }
}

impl fmt::Display for ScheduleTypeLimits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScheduleTypeLimits {
    type Err = Error;

    /// Accepts the type names used in schedule datasets.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        Ok(match key.as_str() {
            "fraction" | "fractional" => Self::Fraction,
            "onoff" | "availability" => Self::OnOff,
            "temperature" => Self::Temperature,
            "activity" | "activitylevel" => Self::ActivityLevel,
            "humidityratio" => Self::HumidityRatio,
            "dimensionless" => Self::Dimensionless,
            "" | "any" => Self::Any,
            _ => bail!("Unknown schedule type: {s}"),
        })
    }
}
