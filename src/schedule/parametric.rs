//! Parametric schedules.
//!
//! A parametric schedule is a set of dataset rows that describe day profiles
//! with a few control points relative to four parameters: the occupied
//! period start (`st`) and end (`et`), and the `base` and `peak` values.
//!
//! ```text
//! {"time": "st",        "value": "base"}
//! {"time": "st+1 hour", "value": "peak"}
//! {"time": "et-30min",  "value": "peak*0.5"}
//! {"time": "et",        "value": "base"}
//! ```
//!
//! Changing the parameters moves or rescales the whole profile while the
//! shape between control points stays smooth.

use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Error, Result, anyhow, bail};
use serde::de::Deserializer;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::day::ScheduleDay;
use super::limits::ScheduleTypeLimits;
use super::rule::{DayType, MonthDay, ScheduleRule, Weekdays};
use super::ruleset::ScheduleRuleset;
use super::smooth::{TimeValue, check_timesteps_per_hour, smooth_time_values, wrap_day};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
}

impl Op {
    fn parse(c: char) -> Option<Self> {
        match c {
            '+' => Some(Self::Add),
            '-' => Some(Self::Sub),
            '*' => Some(Self::Mul),
            '/' => Some(Self::Div),
            _ => None,
        }
    }

    fn symbol(&self) -> char {
        match self {
            Self::Add => '+',
            Self::Sub => '-',
            Self::Mul => '*',
            Self::Div => '/',
        }
    }

    fn apply(&self, lhs: f64, rhs: f64) -> f64 {
        match self {
            Self::Add => lhs + rhs,
            Self::Sub => lhs - rhs,
            Self::Mul => lhs * rhs,
            Self::Div => lhs / rhs,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeAnchor {
    Start,
    End,
    /// Midpoint of the occupied period, on the timestep grid.
    Half,
    Hour(f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueAnchor {
    Base,
    Peak,
    Literal(f64),
}

/// Time of a control point, e.g. `st+1 hour`, `et-30min`, `half`, `12`.
///
/// Operands of `+` and `-` are hours unless followed by a minute unit.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeExpr {
    pub anchor: TimeAnchor,
    pub ops: Vec<(Op, f64)>,
}

/// Value of a control point, e.g. `base`, `peak*0.5`, `0.25`.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueExpr {
    pub anchor: ValueAnchor,
    pub ops: Vec<(Op, f64)>,
}

/// Occupied period and value range a parametric schedule is evaluated with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScheduleParams {
    pub start: f64,
    pub end: f64,
    pub base: f64,
    pub peak: f64,
}

/// Caller overrides of the dataset's standard parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamOverrides {
    #[serde(default)]
    pub st: Option<f64>,
    #[serde(default)]
    pub et: Option<f64>,
    #[serde(default)]
    pub base: Option<f64>,
    #[serde(default)]
    pub peak: Option<f64>,
}

impl ParamOverrides {
    pub fn resolve(&self, rule: &ParametricRule) -> ScheduleParams {
        ScheduleParams {
            start: self.st.unwrap_or(rule.st_std),
            end: self.et.unwrap_or(rule.et_std),
            base: self.base.unwrap_or(rule.base_std),
            peak: self.peak.unwrap_or(rule.peak_std),
        }
    }
}

/// Rounds hours to the nearest timestep.
pub fn round_to_timestep(hours: f64, timesteps_per_hour: u32) -> f64 {
    let tph = timesteps_per_hour as f64;
    (hours * tph).round() / tph
}

impl TimeExpr {
    pub fn eval(&self, params: &ScheduleParams, timesteps_per_hour: u32) -> f64 {
        let start = match self.anchor {
            TimeAnchor::Start => params.start,
            TimeAnchor::End => params.end,
            TimeAnchor::Half => {
                round_to_timestep((params.end - params.start) / 2.0, timesteps_per_hour) + params.start
            }
            TimeAnchor::Hour(h) => h,
        };
        self.ops.iter().fold(start, |acc, (op, n)| op.apply(acc, *n))
    }
}

impl ValueExpr {
    pub fn eval(&self, params: &ScheduleParams) -> f64 {
        let start = match self.anchor {
            ValueAnchor::Base => params.base,
            ValueAnchor::Peak => params.peak,
            ValueAnchor::Literal(v) => v,
        };
        self.ops.iter().fold(start, |acc, (op, n)| op.apply(acc, *n))
    }
}

/// Cursor over an expression string.
struct Lexer<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn skip_ws(&mut self) {
        let rest = &self.text[self.pos..];
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_ws();
        self.text[self.pos..].chars().next()
    }

    fn take_while(&mut self, f: impl Fn(char) -> bool) -> &'a str {
        self.skip_ws();
        let text = self.text;
        let rest = &text[self.pos..];
        let len = rest.find(|c: char| !f(c)).unwrap_or(rest.len());
        self.pos += len;
        &rest[..len]
    }

    fn word(&mut self) -> &'a str {
        self.take_while(|c| c.is_ascii_alphabetic() || c == '_')
    }

    fn number(&mut self) -> Result<f64> {
        let digits = self.take_while(|c| c.is_ascii_digit() || c == '.');
        digits
            .parse()
            .map_err(|_| anyhow!("Expected a number at position {} of '{}'", self.pos, self.text))
    }

    fn op(&mut self) -> Result<Option<Op>> {
        match self.peek() {
            None => Ok(None),
            Some(c) => match Op::parse(c) {
                Some(op) => {
                    self.pos += c.len_utf8();
                    Ok(Some(op))
                }
                None => bail!("Unexpected '{c}' at position {} of '{}'", self.pos, self.text),
            },
        }
    }
}

fn check_operand(op: Op, n: f64, text: &str) -> Result<()> {
    if op == Op::Div && n == 0.0 {
        bail!("Division by zero in '{text}'");
    }
    Ok(())
}

impl FromStr for TimeExpr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut lex = Lexer::new(s);
        let anchor = match lex.word() {
            "st" | "start" => TimeAnchor::Start,
            "et" | "end" => TimeAnchor::End,
            "half" | "mid" => TimeAnchor::Half,
            "" => TimeAnchor::Hour(lex.number()?),
            other => bail!("Unknown time anchor '{other}' in '{s}'"),
        };
        let mut ops = Vec::new();
        while let Some(op) = lex.op()? {
            let mut n = lex.number()?;
            match lex.word() {
                "" | "h" | "hr" | "hrs" | "hour" | "hours" => {}
                "m" | "min" | "mins" | "minute" | "minutes" if matches!(op, Op::Add | Op::Sub) => {
                    n /= 60.0;
                }
                unit => bail!("Unexpected unit '{unit}' after {}{n} in '{s}'", op.symbol()),
            }
            check_operand(op, n, s)?;
            ops.push((op, n));
        }
        Ok(Self { anchor, ops })
    }
}

impl FromStr for ValueExpr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut lex = Lexer::new(s);
        let anchor = match lex.word() {
            "base" => ValueAnchor::Base,
            "peak" => ValueAnchor::Peak,
            "" => ValueAnchor::Literal(lex.number()?),
            other => bail!("Unknown value anchor '{other}' in '{s}'"),
        };
        let mut ops = Vec::new();
        while let Some(op) = lex.op()? {
            let n = lex.number()?;
            let unit = lex.word();
            if !unit.is_empty() {
                bail!("Unexpected '{unit}' in value expression '{s}'");
            }
            check_operand(op, n, s)?;
            ops.push((op, n));
        }
        Ok(Self { anchor, ops })
    }
}

fn write_ops(f: &mut fmt::Formatter<'_>, ops: &[(Op, f64)]) -> fmt::Result {
    for (op, n) in ops {
        write!(f, "{}{}", op.symbol(), n)?;
    }
    Ok(())
}

impl fmt::Display for TimeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.anchor {
            TimeAnchor::Start => f.write_str("st")?,
            TimeAnchor::End => f.write_str("et")?,
            TimeAnchor::Half => f.write_str("half")?,
            TimeAnchor::Hour(h) => write!(f, "{h}")?,
        }
        write_ops(f, &self.ops)
    }
}

impl fmt::Display for ValueExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.anchor {
            ValueAnchor::Base => f.write_str("base")?,
            ValueAnchor::Peak => f.write_str("peak")?,
            ValueAnchor::Literal(v) => write!(f, "{v}")?,
        }
        write_ops(f, &self.ops)
    }
}

/// One control point of a day profile.
///
/// Datasets write control points either as `{"time": "st+1", "value": "peak"}`
/// or in list form `["st", {"+": 1}, "peak", {"*": 1}]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawControlPoint", into = "ControlPointText")]
pub struct ControlPoint {
    pub time: TimeExpr,
    pub value: ValueExpr,
}

#[derive(Serialize, Deserialize)]
struct ControlPointText {
    time: String,
    value: String,
}

type OperandMap = serde_json::Map<String, serde_json::Value>;

#[derive(Deserialize)]
#[serde(untagged)]
enum RawControlPoint {
    Text(ControlPointText),
    List(String, OperandMap, String, OperandMap),
}

impl From<ControlPoint> for ControlPointText {
    fn from(value: ControlPoint) -> Self {
        Self {
            time: value.time.to_string(),
            value: value.value.to_string(),
        }
    }
}

fn expr_from_list(anchor: &str, ops: &OperandMap) -> Result<String> {
    let mut text = anchor.to_string();
    for (op, n) in ops {
        let n = n
            .as_f64()
            .ok_or_else(|| anyhow!("Operand of '{op}' after '{anchor}' is not a number"))?;
        text.push_str(&format!("{op}{n}"));
    }
    Ok(text)
}

impl TryFrom<RawControlPoint> for ControlPoint {
    type Error = Error;

    fn try_from(raw: RawControlPoint) -> Result<Self, Self::Error> {
        let (time, value) = match raw {
            RawControlPoint::Text(t) => (t.time, t.value),
            RawControlPoint::List(t, t_ops, v, v_ops) => {
                (expr_from_list(&t, &t_ops)?, expr_from_list(&v, &v_ops)?)
            }
        };
        Ok(Self {
            time: time.parse()?,
            value: value.parse()?,
        })
    }
}

impl ControlPoint {
    pub fn new(time: &str, value: &str) -> Result<Self> {
        Ok(Self {
            time: time.parse()?,
            value: value.parse()?,
        })
    }
}

/// Expands control points into a smoothed day profile.
///
/// Each point's time is rounded to the timestep grid. With `clamp` values are
/// limited to `[0, 1]`. Points past midnight wrap into the day and points that
/// land on the same time are averaged.
pub fn expand_control_points(
    points: &[ControlPoint],
    params: &ScheduleParams,
    timesteps_per_hour: u32,
    clamp: bool,
) -> Result<Vec<TimeValue>> {
    check_timesteps_per_hour(timesteps_per_hour)?;
    let evaluated: Vec<TimeValue> = points
        .iter()
        .map(|p| {
            let time = round_to_timestep(p.time.eval(params, timesteps_per_hour), timesteps_per_hour);
            let value = p.value.eval(params);
            TimeValue::new(time, if clamp { value.clamp(0.0, 1.0) } else { value })
        })
        .collect();
    smooth_time_values(&wrap_day(&evaluated), timesteps_per_hour)
}

pub(crate) fn day_types_from_text_or_list<'de, D>(deserializer: D) -> Result<Vec<DayType>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum DayTypes {
        Text(String),
        List(Vec<DayType>),
    }
    match DayTypes::deserialize(deserializer)? {
        DayTypes::Text(s) => DayType::parse_list(&s).map_err(serde::de::Error::custom),
        DayTypes::List(list) => Ok(list),
    }
}

/// A row of a parametric schedule dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParametricRule {
    pub name: String,
    #[serde(deserialize_with = "day_types_from_text_or_list")]
    pub day_types: Vec<DayType>,
    pub start_date: String,
    pub end_date: String,
    #[serde(rename = "type", default)]
    pub schedule_type: ScheduleTypeLimits,
    pub control_points: Vec<ControlPoint>,
    pub st_std: f64,
    pub et_std: f64,
    pub base_std: f64,
    pub peak_std: f64,
}

impl ParametricRule {
    fn label(&self) -> String {
        self.day_types
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join("|")
    }
}

/// Builds the ruleset named `name` from parametric dataset rows.
///
/// Rows flagged `Default`, `WntrDsn` and `SmrDsn` set the matching day. Rows
/// with weekdays become rules; later rows take priority over earlier ones. A
/// row whose profile and date range match an existing rule extends that
/// rule's weekdays instead of adding a new rule.
pub fn build_parametric_ruleset(
    rules: &[ParametricRule],
    name: &str,
    overrides: &ParamOverrides,
    timesteps_per_hour: u32,
    clamp_fraction_values: bool,
) -> Result<ScheduleRuleset> {
    let rows: Vec<&ParametricRule> = rules.iter().filter(|r| r.name == name).collect();
    let Some(first) = rows.first() else {
        bail!("No parametric schedule rows named {name}");
    };

    let limits = first.schedule_type;
    let clamp = clamp_fraction_values && limits.is_fractional();
    let mut ruleset = ScheduleRuleset::constant(name, 0.0, limits);
    let mut has_default = false;

    for row in &rows {
        let params = overrides.resolve(row);
        let samples = expand_control_points(&row.control_points, &params, timesteps_per_hour, clamp)
            .with_context(|| format!("Failed to expand {} rows of schedule {name}", row.label()))?;

        for day_type in &row.day_types {
            match day_type {
                DayType::Default => {
                    ruleset.default_day = ScheduleDay::from_time_values(&format!("{name} Default"), &samples)?;
                    has_default = true;
                }
                DayType::WinterDesign => {
                    ruleset.winter_design_day = Some(ScheduleDay::from_time_values(
                        &format!("{name} Winter Design Day"),
                        &samples,
                    )?);
                }
                DayType::SummerDesign => {
                    ruleset.summer_design_day = Some(ScheduleDay::from_time_values(
                        &format!("{name} Summer Design Day"),
                        &samples,
                    )?);
                }
                _ => {}
            }
        }

        let weekdays = Weekdays::from_day_types(&row.day_types);
        if weekdays.is_empty() {
            continue;
        }
        let start = MonthDay::parse(&row.start_date)
            .with_context(|| format!("Invalid start date of schedule {name}"))?;
        let end = MonthDay::parse(&row.end_date)
            .with_context(|| format!("Invalid end date of schedule {name}"))?;
        let day = ScheduleDay::from_time_values(&format!("{name} {} Day", row.label()), &samples)?;

        // A row may join an existing rule only when no rule of higher
        // priority than that one shares any of its days.
        let same = ruleset
            .rules
            .iter()
            .position(|r| r.start == start && r.end == end && r.day.same_profile(&day))
            .filter(|&i| {
                !ruleset.rules[..i]
                    .iter()
                    .any(|r| r.weekdays.intersects(weekdays) && r.overlaps(start, end))
            });
        match same {
            Some(i) => {
                let rule = &mut ruleset.rules[i];
                debug!("Merging {} into rule {} of schedule {name}", row.label(), rule.name);
                rule.weekdays = rule.weekdays.union(weekdays);
                rule.day.name = format!("{name} {} Day", rule.weekdays);
            }
            None => {
                let rule_name = format!("{name} Rule {}", ruleset.rules.len() + 1);
                ruleset
                    .rules
                    .insert(0, ScheduleRule::new(&rule_name, day, start, end, weekdays));
            }
        }
    }

    if !has_default {
        warn!("Parametric schedule {name} has no Default row, default day is 0");
    }
    debug!(
        "Built parametric schedule {name} with {} rules",
        ruleset.rules.len()
    );
    Ok(ruleset)
}
