use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Error, Result, anyhow, bail};
use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use super::day::ScheduleDay;
use crate::osm::Record;
use crate::{HasName, Handle};

/// Calendar day without a year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MonthDay {
    pub month: u32,
    pub day: u32,
}

impl MonthDay {
    pub const JAN_1: MonthDay = MonthDay { month: 1, day: 1 };
    pub const DEC_31: MonthDay = MonthDay { month: 12, day: 31 };

    pub fn new(month: u32, day: u32) -> Result<Self> {
        // 2000 is a leap year, so Feb 29 is accepted.
        if NaiveDate::from_ymd_opt(2000, month, day).is_none() {
            bail!("Invalid date {month}/{day}");
        }
        Ok(Self { month, day })
    }

    /// Parses `mm/dd`, `mm/dd/yyyy` or an ISO date (`2014-01-01T00:00:00+00:00`).
    /// The year is ignored.
    pub fn parse(s: &str) -> Result<Self> {
        if let Some(iso) = s.trim().get(..10)
            && iso.as_bytes().get(4) == Some(&b'-')
        {
            let date = NaiveDate::parse_from_str(iso, "%Y-%m-%d")
                .with_context(|| format!("Invalid date {s}"))?;
            return Ok(Self::of(date));
        }
        let mut parts = s.trim().split('/');
        let mut next = |what: &str| -> Result<u32> {
            parts
                .next()
                .ok_or_else(|| anyhow!("Missing {what} in date {s}"))?
                .trim()
                .parse()
                .with_context(|| format!("Invalid {what} in date {s}"))
        };
        let month = next("month")?;
        let day = next("day")?;
        Self::new(month, day)
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            month: date.month(),
            day: date.day(),
        }
    }
}

impl fmt::Display for MonthDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}/{:02}", self.month, self.day)
    }
}

/// Day type labels used by schedule datasets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DayType {
    Default,
    WinterDesign,
    SummerDesign,
    Weekday,
    Weekend,
    Day(Weekday),
}

impl DayType {
    /// Days of the week covered by this day type.
    pub fn weekdays(&self) -> Weekdays {
        match self {
            Self::Weekday => Weekdays::WEEKDAYS,
            Self::Weekend => Weekdays::WEEKEND,
            Self::Day(d) => Weekdays::only(*d),
            _ => Weekdays::NONE,
        }
    }

    /// Parses a list like `"Wkdy|Sat"` or `"Sat, Sun"`. Unknown labels are errors.
    pub fn parse_list(s: &str) -> Result<Vec<DayType>> {
        s.split(['|', ',', ';', ' '])
            .filter(|p| !p.trim().is_empty())
            .map(str::parse)
            .collect()
    }
}

impl FromStr for DayType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "Default" => Self::Default,
            "WntrDsn" => Self::WinterDesign,
            "SmrDsn" => Self::SummerDesign,
            "Wkdy" => Self::Weekday,
            "Wknd" => Self::Weekend,
            "Mon" => Self::Day(Weekday::Mon),
            "Tue" => Self::Day(Weekday::Tue),
            "Wed" => Self::Day(Weekday::Wed),
            "Thu" => Self::Day(Weekday::Thu),
            "Fri" => Self::Day(Weekday::Fri),
            "Sat" => Self::Day(Weekday::Sat),
            "Sun" => Self::Day(Weekday::Sun),
            other => bail!("Unknown day type: {other}"),
        })
    }
}

impl TryFrom<String> for DayType {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DayType> for String {
    fn from(value: DayType) -> Self {
        value.to_string()
    }
}

impl fmt::Display for DayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Default => "Default",
            Self::WinterDesign => "WntrDsn",
            Self::SummerDesign => "SmrDsn",
            Self::Weekday => "Wkdy",
            Self::Weekend => "Wknd",
            Self::Day(d) => return write!(f, "{d}"),
        };
        f.write_str(s)
    }
}

/// Set of days of the week.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Weekdays(u8);

impl Weekdays {
    pub const NONE: Weekdays = Weekdays(0);
    pub const WEEKDAYS: Weekdays = Weekdays(0b0011111);
    pub const WEEKEND: Weekdays = Weekdays(0b1100000);
    pub const ALL: Weekdays = Weekdays(0b1111111);

    pub fn only(day: Weekday) -> Self {
        Self(1 << day.num_days_from_monday())
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & (1 << day.num_days_from_monday()) != 0
    }

    pub fn insert(&mut self, day: Weekday) {
        self.0 |= 1 << day.num_days_from_monday();
    }

    pub fn union(self, other: Weekdays) -> Weekdays {
        Weekdays(self.0 | other.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn intersects(&self, other: Weekdays) -> bool {
        self.0 & other.0 != 0
    }

    pub fn from_day_types(day_types: &[DayType]) -> Self {
        day_types
            .iter()
            .fold(Self::NONE, |acc, d| acc.union(d.weekdays()))
    }
}

/// Days in week order, e.g. `Sat|Sun`.
impl fmt::Display for Weekdays {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let days: Vec<String> = WEEK_FROM_SUNDAY[1..]
            .iter()
            .chain(&WEEK_FROM_SUNDAY[..1])
            .filter(|d| self.contains(**d))
            .map(|d| d.to_string())
            .collect();
        f.write_str(&days.join("|"))
    }
}

const WEEK_FROM_SUNDAY: [Weekday; 7] = [
    Weekday::Sun,
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
];

fn range_covers(start: MonthDay, end: MonthDay, md: MonthDay) -> bool {
    if start <= end {
        start <= md && md <= end
    } else {
        md >= start || md <= end
    }
}

/// A day profile that overrides the default on some weekdays of a date range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRule {
    pub name: String,
    pub day: ScheduleDay,
    pub start: MonthDay,
    pub end: MonthDay,
    pub weekdays: Weekdays,
}

impl HasName for ScheduleRule {
    fn get_name(&self) -> &str {
        &self.name
    }
}

impl ScheduleRule {
    pub fn new(name: &str, day: ScheduleDay, start: MonthDay, end: MonthDay, weekdays: Weekdays) -> Self {
        Self {
            name: name.to_string(),
            day,
            start,
            end,
            weekdays,
        }
    }

    /// Whether the date range covers `md`. A range whose start is after its
    /// end wraps over new year.
    pub fn covers(&self, md: MonthDay) -> bool {
        range_covers(self.start, self.end, md)
    }

    /// Whether the date range shares at least one day with `start..=end`.
    pub fn overlaps(&self, start: MonthDay, end: MonthDay) -> bool {
        self.covers(start) || range_covers(start, end, self.start)
    }

    pub fn applies_to(&self, date: NaiveDate) -> bool {
        self.weekdays.contains(date.weekday()) && self.covers(MonthDay::of(date))
    }

    pub fn to_record(&self, handle: &Handle, ruleset: &Handle, order: usize, day: &Handle) -> Record {
        let mut r = Record::new("OS:Schedule:Rule")
            .with(handle.as_str(), "Handle")
            .with(&self.name, "Name")
            .with(ruleset.as_str(), "Schedule Ruleset Name")
            .with(&order.to_string(), "Rule Order")
            .with(day.as_str(), "Day Schedule Name");
        for d in WEEK_FROM_SUNDAY {
            let flag = if self.weekdays.contains(d) { "Yes" } else { "No" };
            r.push(flag, &format!("Apply {}", weekday_name(d)));
        }
        r.push("DateRange", "Date Specification Type");
        r.push(&self.start.month.to_string(), "Start Month");
        r.push(&self.start.day.to_string(), "Start Day");
        r.push(&self.end.month.to_string(), "End Month");
        r.push(&self.end.day.to_string(), "End Day");
        r
    }

    /// Reads an `OS:Schedule:Rule` record whose day schedule was already resolved.
    pub fn from_record(record: &Record, day: ScheduleDay) -> Result<Self> {
        let name = record.name().unwrap_or_default();
        let mut weekdays = Weekdays::NONE;
        for d in WEEK_FROM_SUNDAY {
            if record.value_by_label(&format!("Apply {}", weekday_name(d))) == Some("Yes") {
                weekdays.insert(d);
            }
        }
        let month_day = |m: &str, d: &str| -> Result<MonthDay> {
            match (record.number_by_label(m), record.number_by_label(d)) {
                (Some(m), Some(d)) => MonthDay::new(m as u32, d as u32),
                _ => bail!("Schedule rule {name} is missing {m}/{d}"),
            }
        };
        Ok(Self {
            name: name.to_string(),
            day,
            start: month_day("Start Month", "Start Day")?,
            end: month_day("End Month", "End Day")?,
            weekdays,
        })
    }
}

fn weekday_name(d: Weekday) -> &'static str {
    match d {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_day_parse() {
        assert_eq!(MonthDay::parse("01/01/2013").unwrap(), MonthDay::JAN_1);
        assert_eq!(MonthDay::parse("12/31").unwrap(), MonthDay::DEC_31);
        assert_eq!(MonthDay::parse("2/29").unwrap(), MonthDay { month: 2, day: 29 });
        assert!(MonthDay::parse("02/30/2013").is_err());
        assert!(MonthDay::parse("13/01").is_err());
        assert!(MonthDay::parse("07").is_err());
        assert_eq!(MonthDay::parse("7/4").unwrap().to_string(), "07/04");
        assert_eq!(
            MonthDay::parse("2014-12-31T00:00:00+00:00").unwrap(),
            MonthDay::DEC_31
        );
    }

    #[test]
    fn test_day_type_list() {
        let types = DayType::parse_list("Wkdy|Sat").unwrap();
        assert_eq!(types, vec![DayType::Weekday, DayType::Day(Weekday::Sat)]);
        let w = Weekdays::from_day_types(&types);
        assert!(w.contains(Weekday::Mon));
        assert!(w.contains(Weekday::Sat));
        assert!(!w.contains(Weekday::Sun));
        assert!(DayType::parse_list("Wkdy|Hol").is_err());
        assert!(Weekdays::from_day_types(&[DayType::Default, DayType::SummerDesign]).is_empty());
    }

    #[test]
    fn test_rule_applies_to() {
        let day = ScheduleDay::constant("Summer Sat", 0.5);
        let rule = ScheduleRule::new(
            "Summer Sat",
            day,
            MonthDay::new(6, 1).unwrap(),
            MonthDay::new(8, 31).unwrap(),
            Weekdays::only(Weekday::Sat),
        );
        // 2009-07-04 is a Saturday, 2009-07-05 a Sunday.
        assert!(rule.applies_to(NaiveDate::from_ymd_opt(2009, 7, 4).unwrap()));
        assert!(!rule.applies_to(NaiveDate::from_ymd_opt(2009, 7, 5).unwrap()));
        assert!(!rule.applies_to(NaiveDate::from_ymd_opt(2009, 9, 5).unwrap()));
    }

    #[test]
    fn test_rule_range_wraps_new_year() {
        let rule = ScheduleRule::new(
            "Winter",
            ScheduleDay::constant("Winter", 1.0),
            MonthDay::new(11, 1).unwrap(),
            MonthDay::new(2, 28).unwrap(),
            Weekdays::ALL,
        );
        assert!(rule.covers(MonthDay::new(12, 15).unwrap()));
        assert!(rule.covers(MonthDay::new(1, 15).unwrap()));
        assert!(!rule.covers(MonthDay::new(6, 1).unwrap()));

        let md = |m, d| MonthDay::new(m, d).unwrap();
        assert!(rule.overlaps(md(2, 1), md(3, 31)));
        assert!(rule.overlaps(md(6, 1), md(12, 1)));
        assert!(!rule.overlaps(md(3, 1), md(10, 31)));
    }

    #[test]
    fn test_weekdays_display_and_intersects() {
        let weekend = Weekdays::WEEKEND;
        assert_eq!(weekend.to_string(), "Sat|Sun");
        assert_eq!(Weekdays::only(Weekday::Mon).union(weekend).to_string(), "Mon|Sat|Sun");
        assert!(weekend.intersects(Weekdays::only(Weekday::Sun)));
        assert!(!weekend.intersects(Weekdays::WEEKDAYS));
    }

    #[test]
    fn test_rule_record_round_trip() {
        let day = ScheduleDay::constant("Weekend", 0.2);
        let rule = ScheduleRule::new("Weekend Rule", day.clone(), MonthDay::JAN_1, MonthDay::DEC_31, Weekdays::WEEKEND);
        let r = rule.to_record(&Handle::new(), &Handle::new(), 0, &Handle::new());
        assert_eq!(r.value_by_label("Apply Sunday"), Some("Yes"));
        assert_eq!(r.value_by_label("Apply Monday"), Some("No"));
        assert_eq!(r.value_by_label("End Month"), Some("12"));
        let back = ScheduleRule::from_record(&r, day).unwrap();
        assert_eq!(back, rule);
    }
}
