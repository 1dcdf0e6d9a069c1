//! Smoothed interpolation of sparse daily time/value points.
//!
//! A few control points (e.g. "occupancy starts at 8:00 with the base value,
//! peaks at 9:00") are expanded into a dense day profile. Between adjacent
//! points the value follows the smootherstep curve
//! `S(t) = 6t^5 - 15t^4 + 10t^3`, which has zero first and second
//! derivatives at both ends.

use anyhow::{Result, anyhow, bail};
use serde::{Deserialize, Serialize};

/// Hours in a day.
pub const DAY_HOURS: f64 = 24.0;

const TIME_EPS: f64 = 1e-9;

/// Checks a schedule resolution: the timestep must be a whole number of
/// minutes, so `timesteps_per_hour` must divide 60.
pub fn check_timesteps_per_hour(timesteps_per_hour: u32) -> Result<()> {
    if timesteps_per_hour == 0 || 60 % timesteps_per_hour != 0 {
        bail!("timesteps_per_hour must divide 60, got {timesteps_per_hour}");
    }
    Ok(())
}

/// A value that applies at a time of day, in hours from midnight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeValue {
    pub time: f64,
    pub value: f64,
}

impl TimeValue {
    pub fn new(time: f64, value: f64) -> Self {
        Self { time, value }
    }
}

/// Evaluates smootherstep for `x` over the domain `[edge0, edge1]`.
///
/// Returns the eased fraction in `[0, 1]`. Inputs outside the domain and
/// empty domains are rejected.
pub fn smootherstep(edge0: f64, edge1: f64, x: f64) -> Result<f64> {
    if edge1 <= edge0 {
        bail!("Cannot apply smootherstep over an empty range [{edge0}, {edge1}]");
    }
    if x < edge0 - TIME_EPS || x > edge1 + TIME_EPS {
        bail!("Cannot apply smootherstep to {x} outside of range [{edge0}, {edge1}]");
    }
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    Ok(t * t * t * (t * (6.0 * t - 15.0) + 10.0))
}

/// Wraps times into one day and merges coincident points.
///
/// Times beyond 24:00 (or before 0:00) are moved into `[0, 24)`; a time of
/// exactly 24:00 is kept as the end of the day. The result is sorted by time,
/// and points sharing a time are replaced by one point with their mean value.
pub fn wrap_day(points: &[TimeValue]) -> Vec<TimeValue> {
    let mut wrapped: Vec<TimeValue> = points
        .iter()
        .map(|p| {
            let time = if (0.0..=DAY_HOURS).contains(&p.time) {
                p.time
            } else {
                p.time.rem_euclid(DAY_HOURS)
            };
            TimeValue::new(time, p.value)
        })
        .collect();
    wrapped.sort_by(|a, b| a.time.total_cmp(&b.time));

    let mut merged: Vec<(TimeValue, usize)> = Vec::with_capacity(wrapped.len());
    for p in wrapped {
        match merged.last_mut() {
            Some((last, n)) if (last.time - p.time).abs() < TIME_EPS => {
                last.value += p.value;
                *n += 1;
            }
            _ => merged.push((p, 1)),
        }
    }
    merged
        .into_iter()
        .map(|(p, n)| TimeValue::new(p.time, p.value / n as f64))
        .collect()
}

/// Expands sparse, time-ordered points into samples every `1 / timesteps_per_hour`
/// hours from 0:00 to 24:00 inclusive.
///
/// If the first point is not at 0:00 a point with the first value is added
/// there; if the last is not at 24:00 one with the last value is appended.
pub fn smooth_time_values(points: &[TimeValue], timesteps_per_hour: u32) -> Result<Vec<TimeValue>> {
    check_timesteps_per_hour(timesteps_per_hour)?;
    let first = *points
        .first()
        .ok_or_else(|| anyhow!("Cannot smooth an empty set of time/value points"))?;
    let last = *points.last().unwrap_or(&first);

    let mut pts: Vec<TimeValue> = Vec::with_capacity(points.len() + 2);
    if first.time.abs() > TIME_EPS {
        pts.push(TimeValue::new(0.0, first.value));
    }
    pts.extend_from_slice(points);
    if (last.time - DAY_HOURS).abs() > TIME_EPS {
        pts.push(TimeValue::new(DAY_HOURS, last.value));
    }

    let tph = timesteps_per_hour as f64;
    let mut samples = Vec::with_capacity((DAY_HOURS * tph) as usize + 1);
    for pair in pts.windows(2) {
        let (p0, p1) = (pair[0], pair[1]);
        if p1.time <= p0.time {
            bail!(
                "Time/value points must be strictly increasing in time: {} then {}",
                p0.time,
                p1.time
            );
        }
        let include_end = (p1.time - DAY_HOURS).abs() < TIME_EPS;
        let k0 = (p0.time * tph - TIME_EPS).ceil() as i64;
        let k1 = (p1.time * tph + TIME_EPS).floor() as i64;
        for k in k0..=k1 {
            let time = k as f64 / tph;
            if !include_end && time >= p1.time - TIME_EPS {
                break;
            }
            let frac = smootherstep(p0.time, p1.time, time)?;
            samples.push(TimeValue::new(time, p0.value + frac * (p1.value - p0.value)));
        }
    }
    Ok(samples)
}

/// Drops every sample whose value equals the next sample's value.
///
/// Under "value until time" semantics this keeps the step function intact:
/// only the last sample of each run of equal values is needed.
pub fn reduce_consecutive_duplicates(samples: &[TimeValue]) -> Vec<TimeValue> {
    samples
        .iter()
        .enumerate()
        .filter(|(i, s)| match samples.get(i + 1) {
            Some(next) => next.value != s.value,
            None => true,
        })
        .map(|(_, s)| *s)
        .collect()
}
