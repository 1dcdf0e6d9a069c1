use anyhow::{Context, Result, anyhow, bail};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::day::{MINUTES_PER_DAY, ScheduleDay};
use super::limits::ScheduleTypeLimits;
use super::rule::ScheduleRule;
use crate::osm::{Model, Record};
use crate::{HasName, Handle};

/// A year-long schedule: a default day overridden by prioritized rules.
///
/// `rules[0]` has the highest priority. Design days are only used for sizing
/// and never show up in annual values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRuleset {
    pub name: String,
    pub limits: ScheduleTypeLimits,
    pub default_day: ScheduleDay,
    pub summer_design_day: Option<ScheduleDay>,
    pub winter_design_day: Option<ScheduleDay>,
    pub rules: Vec<ScheduleRule>,
}

/// Occupied period of the most common day of a schedule, in minutes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StartEndTimes {
    pub start: Option<u32>,
    pub end: Option<u32>,
}

impl HasName for ScheduleRuleset {
    fn get_name(&self) -> &str {
        &self.name
    }
}

impl ScheduleRuleset {
    pub fn new(name: &str, limits: ScheduleTypeLimits, default_day: ScheduleDay) -> Self {
        Self {
            name: name.to_string(),
            limits,
            default_day,
            summer_design_day: None,
            winter_design_day: None,
            rules: Vec::new(),
        }
    }

    pub fn constant(name: &str, value: f64, limits: ScheduleTypeLimits) -> Self {
        let day = ScheduleDay::constant(&format!("{name} Default"), value);
        Self::new(name, limits, day)
    }

    pub fn from_hourly(name: &str, values: &[f64; 24], limits: ScheduleTypeLimits) -> Self {
        let day = ScheduleDay::from_hourly(&format!("{name} Default"), values);
        Self::new(name, limits, day)
    }

    /// Appends a rule with the lowest priority.
    pub fn add_rule(&mut self, rule: ScheduleRule) {
        self.rules.push(rule);
    }

    fn rule_index_for(&self, date: NaiveDate) -> Option<usize> {
        self.rules.iter().position(|r| r.applies_to(date))
    }

    /// Day schedule in effect on a date.
    pub fn day_for(&self, date: NaiveDate) -> &ScheduleDay {
        match self.rule_index_for(date) {
            Some(i) => &self.rules[i].day,
            None => &self.default_day,
        }
    }

    /// Index of the applied rule for every day of `year`, `None` meaning the
    /// default day.
    pub fn active_rule_indices(&self, year: i32) -> Result<Vec<Option<usize>>> {
        Ok(days_of_year(year)?
            .map(|d| self.rule_index_for(d))
            .collect())
    }

    /// Hourly mean values for `year`: 8760 values, or 8784 in a leap year.
    pub fn hourly_values(&self, year: i32) -> Result<Vec<f64>> {
        self.timeseries(year, 60)
    }

    /// Mean value over each `interval_minutes` of `year`.
    pub fn timeseries(&self, year: i32, interval_minutes: u32) -> Result<Vec<f64>> {
        if interval_minutes == 0 || MINUTES_PER_DAY % interval_minutes != 0 {
            bail!("Interval of {interval_minutes} min does not divide a day");
        }
        let steps = MINUTES_PER_DAY / interval_minutes;
        let mut values = Vec::new();
        for date in days_of_year(year)? {
            let day = self.day_for(date);
            for k in 0..steps {
                let start = (k * interval_minutes) as f64;
                values.push(day.average(start, start + interval_minutes as f64));
            }
        }
        Ok(values)
    }

    /// Smallest and largest values of the default day and the rule days.
    pub fn min_max(&self) -> (f64, f64) {
        std::iter::once(&self.default_day)
            .chain(self.rules.iter().map(|r| &r.day))
            .map(|d| d.min_max())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (a, b)| {
                (lo.min(a), hi.max(b))
            })
    }

    /// Sum of hourly values over `year`.
    pub fn equivalent_full_load_hours(&self, year: i32) -> Result<f64> {
        Ok(self.hourly_values(year)?.iter().sum())
    }

    /// When the most common day first rises above its opening value and when
    /// it first falls back to its closing value.
    ///
    /// A day that stays high until midnight ends at 24:00. Ties between
    /// equally common days go to the default day, then to the higher
    /// priority rule.
    pub fn start_and_end_times(&self, year: i32) -> Result<StartEndTimes> {
        let indices = self.active_rule_indices(year)?;
        let mut counts = vec![0usize; self.rules.len() + 1];
        for i in &indices {
            counts[i.map_or(0, |i| i + 1)] += 1;
        }
        let mut best = 0;
        for (slot, &n) in counts.iter().enumerate() {
            if n > counts[best] {
                best = slot;
            }
        }
        let day = match best {
            0 => &self.default_day,
            slot => &self.rules[slot - 1].day,
        };

        let times = day.times();
        let values = day.values();
        let (Some(&first), Some(&last)) = (values.first(), values.last()) else {
            return Ok(StartEndTimes::default());
        };

        let start = values
            .windows(2)
            .position(|w| w[0] == first && w[1] > first)
            .map(|i| times[i]);
        let end = values
            .windows(2)
            .position(|w| w[0] > last && w[1] == last)
            .map(|i| times[i])
            .or_else(|| (last > first).then_some(MINUTES_PER_DAY));

        Ok(StartEndTimes { start, end })
    }

    /// Writes the ruleset, its day schedules, rules and type limits into a
    /// model and returns the ruleset handle.
    ///
    /// A type limits record with the same name already in the model is reused.
    pub fn to_records(&self, model: &mut Model) -> Result<Handle> {
        let limits = match self.limits.to_record(&Handle::new()) {
            None => None,
            Some(record) => {
                let existing = model
                    .find_by_name("OS:ScheduleTypeLimits", self.limits.name())
                    .and_then(|r| r.handle());
                Some(existing.unwrap_or_else(|| model.add(record)))
            }
        };

        let ruleset = Handle::new();
        let default = Handle::new();
        let summer = self.summer_design_day.as_ref().map(|_| Handle::new());
        let winter = self.winter_design_day.as_ref().map(|_| Handle::new());
        let opt = |h: &Option<Handle>| h.as_ref().map(|h| h.as_str().to_string()).unwrap_or_default();

        model.add(
            Record::new("OS:Schedule:Ruleset")
                .with(ruleset.as_str(), "Handle")
                .with(&self.name, "Name")
                .with(&opt(&limits), "Schedule Type Limits Name")
                .with(default.as_str(), "Default Day Schedule Name")
                .with(&opt(&summer), "Summer Design Day Schedule Name")
                .with(&opt(&winter), "Winter Design Day Schedule Name"),
        );
        model.add(self.default_day.to_record(&default, limits.as_ref()));
        if let (Some(day), Some(h)) = (&self.summer_design_day, &summer) {
            model.add(day.to_record(h, limits.as_ref()));
        }
        if let (Some(day), Some(h)) = (&self.winter_design_day, &winter) {
            model.add(day.to_record(h, limits.as_ref()));
        }
        for (order, rule) in self.rules.iter().enumerate() {
            let day = Handle::new();
            model.add(rule.to_record(&Handle::new(), &ruleset, order, &day));
            model.add(rule.day.to_record(&day, limits.as_ref()));
        }

        debug!(
            "Added schedule ruleset {} with {} rules",
            self.name,
            self.rules.len()
        );
        Ok(ruleset)
    }

    /// Reads a ruleset and everything it references back from a model.
    pub fn from_model(model: &Model, handle: &Handle) -> Result<Self> {
        let record = model
            .get(handle)
            .ok_or_else(|| anyhow!("No record with handle {handle}"))?;
        if record.class != "OS:Schedule:Ruleset" {
            bail!("Expected OS:Schedule:Ruleset, got {}", record.class);
        }
        let name = record.name().unwrap_or_default();

        let day = |label: &str| -> Result<Option<ScheduleDay>> {
            linked(model, record, label)
                .map(ScheduleDay::from_record)
                .transpose()
        };

        let limits = linked(model, record, "Schedule Type Limits Name")
            .and_then(|r| r.name())
            .and_then(|n| n.parse().ok())
            .unwrap_or(ScheduleTypeLimits::Any);
        let default_day = day("Default Day Schedule Name")?
            .ok_or_else(|| anyhow!("Schedule ruleset {name} has no default day"))?;

        let mut rule_records = model.referencing_of_class(handle, "OS:Schedule:Rule");
        rule_records.sort_by_key(|r| r.number_by_label("Rule Order").map_or(i64::MAX, |o| o as i64));
        let mut rules = Vec::with_capacity(rule_records.len());
        for r in rule_records {
            let day_record = linked(model, r, "Day Schedule Name")
                .ok_or_else(|| anyhow!("Schedule rule {} has no day schedule", r.get_name()))?;
            let day = ScheduleDay::from_record(day_record)?;
            rules.push(
                ScheduleRule::from_record(r, day)
                    .with_context(|| format!("Failed to read rules of schedule {name}"))?,
            );
        }

        Ok(Self {
            name: name.to_string(),
            limits,
            default_day,
            summer_design_day: day("Summer Design Day Schedule Name")?,
            winter_design_day: day("Winter Design Day Schedule Name")?,
            rules,
        })
    }
}

/// Record referenced by handle from a labelled field.
fn linked<'a>(model: &'a Model, record: &Record, label: &str) -> Option<&'a Record> {
    record
        .value_by_label(label)
        .and_then(Handle::parse)
        .and_then(|h| model.get(&h))
}

fn days_of_year(year: i32) -> Result<impl Iterator<Item = NaiveDate>> {
    let first = NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(|| anyhow!("Invalid year {year}"))?;
    Ok(first.iter_days().take_while(move |d| d.year() == year))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::rule::{MonthDay, Weekdays};

    fn office_hours() -> [f64; 24] {
        let mut hours = [0.05; 24];
        for h in hours.iter_mut().take(18).skip(8) {
            *h = 0.9;
        }
        hours
    }

    fn office_ruleset() -> ScheduleRuleset {
        let mut sch = ScheduleRuleset::from_hourly("Office Occ", &office_hours(), ScheduleTypeLimits::Fraction);
        sch.add_rule(ScheduleRule::new(
            "Office Occ Weekend",
            ScheduleDay::constant("Office Occ Weekend Day", 0.05),
            MonthDay::JAN_1,
            MonthDay::DEC_31,
            Weekdays::WEEKEND,
        ));
        sch
    }

    #[test]
    fn test_day_for_and_indices() {
        let sch = office_ruleset();
        // 2009-01-03 is a Saturday.
        let sat = NaiveDate::from_ymd_opt(2009, 1, 3).unwrap();
        let mon = NaiveDate::from_ymd_opt(2009, 1, 5).unwrap();
        assert_eq!(sch.day_for(sat).name, "Office Occ Weekend Day");
        assert_eq!(sch.day_for(mon).name, "Office Occ Default");

        let indices = sch.active_rule_indices(2009).unwrap();
        assert_eq!(indices.len(), 365);
        assert_eq!(indices.iter().filter(|i| i.is_some()).count(), 104);
    }

    #[test]
    fn test_hourly_values_length() {
        let sch = ScheduleRuleset::constant("On", 1.0, ScheduleTypeLimits::OnOff);
        assert_eq!(sch.hourly_values(2009).unwrap().len(), 8760);
        assert_eq!(sch.hourly_values(2024).unwrap().len(), 8784);
        assert!((sch.equivalent_full_load_hours(2009).unwrap() - 8760.0).abs() < 1e-10);
    }

    #[test]
    fn test_equivalent_full_load_hours() {
        let sch = office_ruleset();
        let weekdays = 261.0;
        let expected = weekdays * (10.0 * 0.9 + 14.0 * 0.05) + (365.0 - weekdays) * 24.0 * 0.05;
        let eflh = sch.equivalent_full_load_hours(2009).unwrap();
        assert!((eflh - expected).abs() < 1e-6, "{eflh} vs {expected}");
    }

    #[test]
    fn test_timeseries_interval() {
        let sch = office_ruleset();
        assert_eq!(sch.timeseries(2009, 30).unwrap().len(), 365 * 48);
        assert!(sch.timeseries(2009, 7).is_err());
        assert!(sch.timeseries(2009, 0).is_err());
    }

    #[test]
    fn test_min_max_ignores_design_days() {
        let mut sch = office_ruleset();
        sch.summer_design_day = Some(ScheduleDay::constant("Summer", 1.0));
        sch.winter_design_day = Some(ScheduleDay::constant("Winter", 0.0));
        let (lo, hi) = sch.min_max();
        assert!((lo - 0.05).abs() < 1e-10);
        assert!((hi - 0.9).abs() < 1e-10);
    }

    #[test]
    fn test_start_and_end_times() {
        let times = office_ruleset().start_and_end_times(2009).unwrap();
        assert_eq!(times.start, Some(8 * 60));
        assert_eq!(times.end, Some(18 * 60));
    }

    #[test]
    fn test_start_and_end_times_until_midnight() {
        let mut hours = [0.1; 24];
        for h in hours.iter_mut().skip(6) {
            *h = 1.0;
        }
        let sch = ScheduleRuleset::from_hourly("Late", &hours, ScheduleTypeLimits::Fraction);
        let times = sch.start_and_end_times(2009).unwrap();
        assert_eq!(times.start, Some(6 * 60));
        assert_eq!(times.end, Some(24 * 60));
    }

    #[test]
    fn test_model_round_trip() {
        let mut sch = office_ruleset();
        sch.summer_design_day = Some(ScheduleDay::constant("Office Occ Summer Design Day", 1.0));
        let mut model = Model::new();
        let handle = sch.to_records(&mut model).unwrap();
        assert_eq!(model.objects_of_class("OS:Schedule:Day").len(), 3);
        assert_eq!(model.objects_of_class("OS:Schedule:Rule").len(), 1);
        assert_eq!(model.objects_of_class("OS:ScheduleTypeLimits").len(), 1);

        let text = model.to_osm_string();
        let reloaded = Model::from_osm_str(&text).unwrap();
        let back = ScheduleRuleset::from_model(&reloaded, &handle).unwrap();
        assert_eq!(back.name, "Office Occ");
        assert_eq!(back.limits, ScheduleTypeLimits::Fraction);
        assert!(back.default_day.same_profile(&sch.default_day));
        assert!(back.winter_design_day.is_none());
        assert_eq!(back.rules.len(), 1);
        assert_eq!(back.rules[0].weekdays, Weekdays::WEEKEND);
        assert_eq!(back.hourly_values(2009).unwrap(), sch.hourly_values(2009).unwrap());
    }

    #[test]
    fn test_to_records_reuses_type_limits() {
        let mut model = Model::new();
        office_ruleset().to_records(&mut model).unwrap();
        ScheduleRuleset::constant("Always On", 1.0, ScheduleTypeLimits::Fraction)
            .to_records(&mut model)
            .unwrap();
        assert_eq!(model.objects_of_class("OS:ScheduleTypeLimits").len(), 1);
        assert_eq!(model.objects_of_class("OS:Schedule:Ruleset").len(), 2);
    }
}
