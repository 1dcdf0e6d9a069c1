//! Schedules: smoothed parametric day profiles, day schedules and rulesets.

pub mod day;
pub mod limits;
pub mod parametric;
pub mod rule;
pub mod ruleset;
pub mod smooth;

pub use day::ScheduleDay;
pub use limits::ScheduleTypeLimits;
pub use parametric::{
    ControlPoint, ParamOverrides, ParametricRule, ScheduleParams, TimeExpr, ValueExpr,
    build_parametric_ruleset, expand_control_points,
};
pub use rule::{DayType, MonthDay, ScheduleRule, Weekdays};
pub use ruleset::{ScheduleRuleset, StartEndTimes};
pub use smooth::{
    TimeValue, check_timesteps_per_hour, reduce_consecutive_duplicates, smooth_time_values, smootherstep,
    wrap_day,
};
