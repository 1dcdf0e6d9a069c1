use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};

use super::smooth::{TimeValue, reduce_consecutive_duplicates};
use crate::osm::Record;
use crate::{HasName, Handle};

pub const MINUTES_PER_DAY: u32 = 1440;

/// One day of a schedule as a step function.
///
/// Uses "value until time" semantics: `values[i]` holds from `times[i - 1]`
/// (or midnight) up to `times[i]`. Times are minutes from midnight, strictly
/// increasing, and the last one is always 24:00.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleDay {
    pub name: String,
    times: Vec<u32>,
    values: Vec<f64>,
}

impl HasName for ScheduleDay {
    fn get_name(&self) -> &str {
        &self.name
    }
}

impl ScheduleDay {
    pub fn constant(name: &str, value: f64) -> Self {
        Self {
            name: name.to_string(),
            times: vec![MINUTES_PER_DAY],
            values: vec![value],
        }
    }

    /// Builds a day from 24 hourly values, merging equal neighbours.
    pub fn from_hourly(name: &str, values: &[f64; 24]) -> Self {
        let samples: Vec<TimeValue> = values
            .iter()
            .enumerate()
            .map(|(h, &v)| TimeValue::new((h + 1) as f64, v))
            .collect();
        let mut day = Self::constant(name, values[23]);
        for s in reduce_consecutive_duplicates(&samples) {
            day.insert(hours_to_minute(s.time), s.value);
        }
        day
    }

    /// Builds a day from time/value samples.
    ///
    /// A sample `(t, v)` means `v` holds until `t`. Runs of equal values are
    /// collapsed to their last sample, samples at midnight are dropped, and the
    /// last remaining sample is stretched to 24:00.
    pub fn from_time_values(name: &str, samples: &[TimeValue]) -> Result<Self> {
        let last = samples
            .last()
            .ok_or_else(|| anyhow!("Cannot build day schedule {name} from no samples"))?;

        let mut pairs: Vec<(u32, f64)> = Vec::new();
        for s in reduce_consecutive_duplicates(samples) {
            if !(0.0..=24.0 + 1e-9).contains(&s.time) {
                bail!("Sample time {} of day schedule {name} is outside 0-24 h", s.time);
            }
            let minute = hours_to_minute(s.time);
            if minute == 0 {
                continue;
            }
            match pairs.last_mut() {
                Some((t, v)) if *t == minute => *v = s.value,
                _ => pairs.push((minute, s.value)),
            }
        }
        if pairs.is_empty() {
            return Ok(Self::constant(name, last.value));
        }
        if let Some(end) = pairs.last_mut() {
            end.0 = MINUTES_PER_DAY;
        }

        let (times, values) = pairs.into_iter().unzip();
        Ok(Self {
            name: name.to_string(),
            times,
            values,
        })
    }

    /// Sets the value that holds until `until_minute`.
    ///
    /// An existing entry at the same time is replaced.
    pub fn add_value(&mut self, until_minute: u32, value: f64) -> Result<()> {
        if until_minute == 0 || until_minute > MINUTES_PER_DAY {
            bail!(
                "Time {until_minute} min is outside of day schedule {}",
                self.name
            );
        }
        self.insert(until_minute, value);
        Ok(())
    }

    fn insert(&mut self, minute: u32, value: f64) {
        match self.times.binary_search(&minute) {
            Ok(i) => self.values[i] = value,
            Err(i) => {
                self.times.insert(i, minute);
                self.values.insert(i, value);
            }
        }
    }

    pub fn times(&self) -> &[u32] {
        &self.times
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Value in effect at a minute of the day.
    pub fn value_at(&self, minute: f64) -> f64 {
        let i = self
            .times
            .iter()
            .position(|&t| (t as f64) > minute)
            .unwrap_or(self.times.len().saturating_sub(1));
        self.values.get(i).copied().unwrap_or(0.0)
    }

    /// Time-weighted mean over `[start, end)` minutes.
    pub fn average(&self, start: f64, end: f64) -> f64 {
        if end <= start {
            return self.value_at(start);
        }
        let mut sum = 0.0;
        let mut prev: f64 = 0.0;
        for (&t, &v) in self.times.iter().zip(&self.values) {
            let t = t as f64;
            let lo = prev.max(start);
            let hi = t.min(end);
            if hi > lo {
                sum += (hi - lo) * v;
            }
            prev = t;
        }
        sum / (end - start)
    }

    /// Mean value of each hour.
    pub fn hourly_averages(&self) -> [f64; 24] {
        let mut out = [0.0; 24];
        for (h, v) in out.iter_mut().enumerate() {
            *v = self.average(h as f64 * 60.0, (h + 1) as f64 * 60.0);
        }
        out
    }

    pub fn min_max(&self) -> (f64, f64) {
        self.values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            })
    }

    /// Whether two days describe the same step function, regardless of name.
    pub fn same_profile(&self, other: &ScheduleDay) -> bool {
        self.times == other.times
            && self
                .values
                .iter()
                .zip(&other.values)
                .all(|(a, b)| (a - b).abs() < 1e-9)
    }

    /// `OS:Schedule:Day` record with the given handle.
    pub fn to_record(&self, handle: &Handle, limits: Option<&Handle>) -> Record {
        let mut r = Record::new("OS:Schedule:Day")
            .with(handle.as_str(), "Handle")
            .with(&self.name, "Name")
            .with(limits.map(|h| h.as_str()).unwrap_or(""), "Schedule Type Limits Name")
            .with("No", "Interpolate to Timestep");
        for (i, (&t, &v)) in self.times.iter().zip(&self.values).enumerate() {
            let n = i + 1;
            r.push(&(t / 60).to_string(), &format!("Hour {n}"));
            r.push(&(t % 60).to_string(), &format!("Minute {n}"));
            r.push(&v.to_string(), &format!("Value Until Time {n}"));
        }
        r
    }

    /// Reads an `OS:Schedule:Day` record. Time/value triples start at field 4.
    pub fn from_record(record: &Record) -> Result<Self> {
        if record.class != "OS:Schedule:Day" {
            bail!("Expected OS:Schedule:Day, got {}", record.class);
        }
        let name = record.name().unwrap_or_default();
        let mut day = Self {
            name: name.to_string(),
            times: Vec::new(),
            values: Vec::new(),
        };
        for chunk in record.fields.get(4..).unwrap_or_default().chunks(3) {
            let [hour, minute, value] = chunk else {
                bail!("Incomplete time/value entry in day schedule {name}");
            };
            let hour: u32 = hour
                .value
                .trim()
                .parse()
                .with_context(|| format!("Invalid hour in day schedule {name}"))?;
            let minute: u32 = minute
                .value
                .trim()
                .parse()
                .with_context(|| format!("Invalid minute in day schedule {name}"))?;
            let value: f64 = value
                .value
                .trim()
                .parse()
                .with_context(|| format!("Invalid value in day schedule {name}"))?;
            day.add_value(hour * 60 + minute, value)?;
        }
        if day.times.last() != Some(&MINUTES_PER_DAY) {
            bail!("Day schedule {name} does not end at 24:00");
        }
        Ok(day)
    }
}

fn hours_to_minute(hours: f64) -> u32 {
    (hours * 60.0).round().max(0.0) as u32
}
