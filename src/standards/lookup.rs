use std::fmt;

use serde_json::{Map, Value};
use tracing::warn;

/// A row of a standards table.
pub type Row = Map<String, Value>;

/// Key/value pairs a table row must match.
///
/// A row matches when every criterion whose key the row has is equal to the
/// row's value, or the row's value is the wildcard `"Any"`. Criteria keys the
/// row lacks are not checked.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchCriteria {
    entries: Vec<(String, Value)>,
}

impl SearchCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.entries.push((key.to_string(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Checks a single row.
    pub fn matches(&self, row: &Row) -> bool {
        self.entries.iter().all(|(key, wanted)| match row.get(key) {
            None => true,
            Some(Value::String(s)) if s == "Any" => true,
            Some(found) => values_equal(found, wanted),
        })
    }
}

impl fmt::Display for SearchCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .entries
            .iter()
            .map(|(k, v)| match v {
                Value::String(s) => format!("{k}={s}"),
                other => format!("{k}={other}"),
            })
            .collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

// Numbers compare by value so that `3` and `3.0` match.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn capacity_limits(row: &Row) -> Option<(f64, f64)> {
    let min = row.get("minimum_capacity")?.as_f64()?;
    let max = row.get("maximum_capacity")?.as_f64()?;
    Some((min, max))
}

fn within_capacity(rows: &[&Row], capacity: f64) -> Vec<usize> {
    rows.iter()
        .enumerate()
        .filter_map(|(i, row)| {
            let (min, max) = capacity_limits(row)?;
            (capacity > min && capacity <= max).then_some(i)
        })
        .collect()
}

/// Returns every row matching `criteria`.
///
/// With a `capacity`, rows are further narrowed to those whose
/// `(minimum_capacity, maximum_capacity]` range contains it. Whole-number
/// capacities are bumped up by 1% first so a value sitting exactly on a
/// boundary selects the upper bracket. When nothing matches the capacity is
/// lowered by 1% and tried once more. Rows without capacity limits never
/// match a capacity search.
pub fn find_objects<'a>(table: &'a [Row], criteria: &SearchCriteria, capacity: Option<f64>) -> Vec<&'a Row> {
    let matching: Vec<&Row> = table.iter().filter(|row| criteria.matches(row)).collect();
    let Some(mut capacity) = capacity else {
        return matching;
    };

    if capacity == capacity.round() {
        capacity += capacity * 0.01;
    }
    let mut found = within_capacity(&matching, capacity);
    if found.is_empty() {
        found = within_capacity(&matching, capacity * 0.99);
    }
    found.into_iter().map(|i| matching[i]).collect()
}

/// Returns the first row matching `criteria`, or `None`.
///
/// Several matches are logged as a warning and the first one wins.
pub fn find_object<'a>(table: &'a [Row], criteria: &SearchCriteria, capacity: Option<f64>) -> Option<&'a Row> {
    let found = find_objects(table, criteria, capacity);
    match found.len() {
        0 => None,
        1 => Some(found[0]),
        n => {
            warn!(
                "Found {n} objects matching {criteria}{}, using the first",
                capacity.map(|c| format!(" at capacity {c}")).unwrap_or_default()
            );
            Some(found[0])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table() -> Vec<Row> {
        let rows = json!([
            {"template": "90.1-2013", "type": "Enclosed", "minimum_capacity": 0.0, "maximum_capacity": 10.0, "id": 1},
            {"template": "90.1-2013", "type": "Enclosed", "minimum_capacity": 10.0, "maximum_capacity": 100.0, "id": 2},
            {"template": "Any", "type": "Open", "id": 3},
            {"template": "90.1-2010", "type": "Enclosed", "minimum_capacity": 0.0, "maximum_capacity": 100.0, "id": 4}
        ]);
        serde_json::from_value(rows).unwrap()
    }

    fn ids(rows: &[&Row]) -> Vec<i64> {
        rows.iter().map(|r| r["id"].as_i64().unwrap()).collect()
    }

    #[test]
    fn test_criteria_and_wildcard() {
        let t = table();
        let c = SearchCriteria::new().with("template", "90.1-2013");
        assert_eq!(ids(&find_objects(&t, &c, None)), vec![1, 2, 3]);

        let c = SearchCriteria::new()
            .with("template", "90.1-2010")
            .with("type", "Open");
        assert_eq!(ids(&find_objects(&t, &c, None)), vec![3]);
    }

    #[test]
    fn test_missing_key_is_not_checked() {
        let t = table();
        let c = SearchCriteria::new().with("type", "Open").with("climate_zone", "4A");
        assert_eq!(ids(&find_objects(&t, &c, None)), vec![3]);
    }

    #[test]
    fn test_capacity_brackets() {
        let t = table();
        let c = SearchCriteria::new().with("template", "90.1-2013").with("type", "Enclosed");
        assert_eq!(ids(&find_objects(&t, &c, Some(5.5))), vec![1]);
        // Whole numbers on a boundary go to the upper bracket.
        assert_eq!(ids(&find_objects(&t, &c, Some(10.0))), vec![2]);
        assert_eq!(ids(&find_objects(&t, &c, Some(10.5))), vec![2]);
        assert!(find_objects(&t, &c, Some(500.0)).is_empty());
    }

    #[test]
    fn test_capacity_retry_rounds_down() {
        let t = table();
        let c = SearchCriteria::new().with("template", "90.1-2013").with("type", "Enclosed");
        // 100 is bumped to 101 which misses; 99.99 then falls back into (10, 100].
        assert_eq!(ids(&find_objects(&t, &c, Some(100.0))), vec![2]);
    }

    #[test]
    fn test_find_object() {
        let t = table();
        let c = SearchCriteria::new().with("template", "90.1-2013");
        assert_eq!(find_object(&t, &c, None).unwrap()["id"], 1);
        let c = SearchCriteria::new().with("template", "NECB2011").with("type", "Enclosed");
        assert!(find_object(&t, &c, None).is_none());
    }

    #[test]
    fn test_numeric_criteria() {
        let t: Vec<Row> = serde_json::from_value(json!([{"poles": 4.0, "id": 7}])).unwrap();
        let c = SearchCriteria::new().with("poles", 4);
        assert_eq!(ids(&find_objects(&t, &c, None)), vec![7]);
        assert_eq!(c.to_string(), "{poles=4}");
    }
}
