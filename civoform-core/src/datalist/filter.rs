use regex::Regex;

use super::{DataListConfig, DataListError, Record, string_values};
use crate::resource::Value;
use crate::schema::AttributeType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchBy {
    #[default]
    Exact,
    Re,
    Substring,
}

impl MatchBy {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "exact" => Some(MatchBy::Exact),
            "re" => Some(MatchBy::Re),
            "substring" => Some(MatchBy::Substring),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            MatchBy::Exact => "exact",
            MatchBy::Re => "re",
            MatchBy::Substring => "substring",
        }
    }
}

/// A `filter` block as written by the user
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSpec {
    pub key: String,
    pub values: Vec<String>,
    pub match_by: MatchBy,
    pub all: bool,
}

/// Read `filter` blocks out of the data source attributes
pub fn expand_filters(value: Option<&Value>) -> Result<Vec<FilterSpec>, DataListError> {
    let Some(value) = value else {
        return Ok(Vec::new());
    };
    let blocks = match value {
        Value::List(items) => items.as_slice(),
        Value::Map(_) => std::slice::from_ref(value),
        _ => {
            return Err(DataListError::InvalidBlock {
                block: "filter".to_string(),
                message: "expected a block".to_string(),
            });
        }
    };

    blocks
        .iter()
        .map(|block| {
            let map = block.as_map().ok_or_else(|| DataListError::InvalidBlock {
                block: "filter".to_string(),
                message: "expected a block".to_string(),
            })?;
            let key = map
                .get("key")
                .and_then(Value::as_str)
                .ok_or_else(|| DataListError::InvalidBlock {
                    block: "filter".to_string(),
                    message: "key is required".to_string(),
                })?
                .to_string();
            let values = string_values(map.get("values"), "filter")?;
            let match_by = match map.get("match_by").and_then(Value::as_str) {
                None => MatchBy::default(),
                Some(s) => MatchBy::parse(crate::schema::enum_variant(s)).ok_or_else(|| {
                    DataListError::InvalidBlock {
                        block: "filter".to_string(),
                        message: format!("unknown match_by '{}'", s),
                    }
                })?,
            };
            let all = map.get("all").and_then(Value::as_bool).unwrap_or(false);
            Ok(FilterSpec {
                key,
                values,
                match_by,
                all,
            })
        })
        .collect()
}

#[derive(Debug)]
enum Matcher {
    Exact(Value),
    Substring(String),
    Regex(Regex),
}

impl Matcher {
    fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (Matcher::Exact(expected), actual) => scalar_eq(expected, actual),
            (Matcher::Substring(needle), Value::String(s)) => s.contains(needle.as_str()),
            (Matcher::Regex(re), Value::String(s)) => re.is_match(s),
            _ => false,
        }
    }
}

fn scalar_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Int(x), Value::Float(y)) | (Value::Float(y), Value::Int(x)) => (*x as f64) == *y,
        _ => a == b,
    }
}

/// A filter with its values converted to the field's type
#[derive(Debug)]
pub struct CompiledFilter {
    key: String,
    list_field: bool,
    all: bool,
    matchers: Vec<Matcher>,
}

impl CompiledFilter {
    fn matches(&self, record: &Record) -> bool {
        let Some(field) = record.get(&self.key) else {
            return false;
        };

        if self.list_field {
            let elements = field.as_list().unwrap_or_default();
            if self.all {
                self.matchers
                    .iter()
                    .all(|m| elements.iter().any(|e| m.matches(e)))
            } else {
                elements
                    .iter()
                    .any(|e| self.matchers.iter().any(|m| m.matches(e)))
            }
        } else {
            self.matchers.iter().any(|m| m.matches(field))
        }
    }
}

/// Check filter keys and convert values to the record field types
pub fn compile_filters(
    config: &DataListConfig,
    filters: &[FilterSpec],
) -> Result<Vec<CompiledFilter>, DataListError> {
    let allowed = config.filterable();
    filters
        .iter()
        .map(|filter| {
            let field_type = config
                .field_type(&filter.key)
                .filter(|_| allowed.contains(&filter.key))
                .ok_or_else(|| DataListError::UnknownFilterKey {
                    key: filter.key.clone(),
                })?;

            let (list_field, element_type) = match field_type {
                AttributeType::List(inner) => (true, inner.as_ref()),
                other => (false, other),
            };

            let matchers = filter
                .values
                .iter()
                .map(|raw| compile_matcher(&filter.key, raw, element_type, filter.match_by))
                .collect::<Result<Vec<_>, _>>()?;

            Ok(CompiledFilter {
                key: filter.key.clone(),
                list_field,
                all: filter.all,
                matchers,
            })
        })
        .collect()
}

fn compile_matcher(
    key: &str,
    raw: &str,
    element_type: &AttributeType,
    match_by: MatchBy,
) -> Result<Matcher, DataListError> {
    let is_string = matches!(
        base_type(element_type),
        AttributeType::String | AttributeType::Enum(_)
    );
    if match_by != MatchBy::Exact && !is_string {
        return Err(DataListError::UnsupportedMatch {
            key: key.to_string(),
            match_by: match_by.as_str().to_string(),
        });
    }

    match match_by {
        MatchBy::Re => Regex::new(raw)
            .map(Matcher::Regex)
            .map_err(|source| DataListError::InvalidRegex {
                key: key.to_string(),
                pattern: raw.to_string(),
                source,
            }),
        MatchBy::Substring => Ok(Matcher::Substring(raw.to_string())),
        MatchBy::Exact => parse_typed(key, raw, element_type).map(Matcher::Exact),
    }
}

fn base_type(t: &AttributeType) -> &AttributeType {
    match t {
        AttributeType::Custom { base, .. } => base_type(base),
        other => other,
    }
}

fn parse_typed(key: &str, raw: &str, t: &AttributeType) -> Result<Value, DataListError> {
    let invalid = |expected: &str| DataListError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
        expected: expected.to_string(),
    };
    match base_type(t) {
        AttributeType::Int => raw.trim().parse::<i64>().map(Value::Int).map_err(|_| invalid("integer")),
        AttributeType::Float => raw
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| invalid("number")),
        AttributeType::Bool => raw
            .trim()
            .parse::<bool>()
            .map(Value::Bool)
            .map_err(|_| invalid("boolean")),
        _ => Ok(Value::String(raw.to_string())),
    }
}

/// Keep the records that satisfy every filter, in their original order
pub fn apply_filters(records: Vec<Record>, filters: &[CompiledFilter]) -> Vec<Record> {
    records
        .into_iter()
        .filter(|record| filters.iter().all(|f| f.matches(record)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::super::tests::{size, size_config};
    use super::*;

    fn spec(key: &str, values: &[&str], match_by: MatchBy, all: bool) -> FilterSpec {
        FilterSpec {
            key: key.to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
            match_by,
            all,
        }
    }

    fn names(records: &[Record]) -> Vec<&str> {
        records
            .iter()
            .map(|r| r["name"].as_str().unwrap())
            .collect()
    }

    fn with_regions(mut record: Record, regions: &[&str]) -> Record {
        record.insert(
            "regions".to_string(),
            Value::List(regions.iter().map(|r| Value::from(*r)).collect()),
        );
        record
    }

    fn run(filters: &[FilterSpec], records: Vec<Record>) -> Result<Vec<Record>, DataListError> {
        let compiled = compile_filters(&size_config(), filters)?;
        Ok(apply_filters(records, &compiled))
    }

    #[test]
    fn scalar_matches_any_value() {
        let records = vec![
            size("g3.xsmall", 1, 1024, true),
            size("g3.small", 1, 2048, true),
            size("g3.medium", 2, 4096, true),
            size("g3.large", 4, 8192, true),
        ];
        let out = run(&[spec("cpu_cores", &["2", "4"], MatchBy::Exact, false)], records).unwrap();
        assert_eq!(names(&out), vec!["g3.medium", "g3.large"]);
    }

    #[test]
    fn filters_narrow_in_sequence() {
        let records = vec![
            size("g3.small", 1, 2048, true),
            size("g3.k3s.small", 1, 2048, true),
            size("g3.medium", 2, 4096, false),
        ];
        let out = run(
            &[
                spec("cpu_cores", &["1", "2"], MatchBy::Exact, false),
                spec("selectable", &["true"], MatchBy::Exact, false),
                spec("name", &["k3s"], MatchBy::Substring, false),
            ],
            records,
        )
        .unwrap();
        assert_eq!(names(&out), vec!["g3.k3s.small"]);
    }

    #[test]
    fn regex_matching() {
        let records = vec![
            size("g3.small", 1, 2048, true),
            size("g4s.kube.small", 1, 2048, true),
        ];
        let out = run(&[spec("name", &["^g4s\\."], MatchBy::Re, false)], records).unwrap();
        assert_eq!(names(&out), vec!["g4s.kube.small"]);
    }

    #[test]
    fn list_field_any_and_all() {
        let records = vec![
            with_regions(size("a", 1, 1, true), &["LON1", "NYC1"]),
            with_regions(size("b", 1, 1, true), &["LON1"]),
            with_regions(size("c", 1, 1, true), &["FRA1"]),
        ];

        let any = run(
            &[spec("regions", &["LON1", "NYC1"], MatchBy::Exact, false)],
            records.clone(),
        )
        .unwrap();
        assert_eq!(names(&any), vec!["a", "b"]);

        let all = run(
            &[spec("regions", &["LON1", "NYC1"], MatchBy::Exact, true)],
            records,
        )
        .unwrap();
        assert_eq!(names(&all), vec!["a"]);
    }

    #[test]
    fn float_values_match_numerically() {
        let records = vec![size("g3.small", 1, 2048, true), size("g3.medium", 2, 4096, true)];
        let out = run(&[spec("price_monthly", &["10"], MatchBy::Exact, false)], records).unwrap();
        assert_eq!(names(&out), vec!["g3.medium"]);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(
            run(&[spec("colour", &["red"], MatchBy::Exact, false)], vec![]),
            Err(DataListError::UnknownFilterKey { .. })
        ));
        assert!(matches!(
            run(&[spec("cpu_cores", &["two"], MatchBy::Exact, false)], vec![]),
            Err(DataListError::InvalidValue { .. })
        ));
        assert!(matches!(
            run(&[spec("cpu_cores", &["1"], MatchBy::Substring, false)], vec![]),
            Err(DataListError::UnsupportedMatch { .. })
        ));
        assert!(matches!(
            run(&[spec("name", &["("], MatchBy::Re, false)], vec![]),
            Err(DataListError::InvalidRegex { .. })
        ));
    }

    #[test]
    fn expand_reads_blocks_with_defaults() {
        let block = Value::Map(
            [
                ("key".to_string(), Value::from("name")),
                (
                    "values".to_string(),
                    Value::List(vec![Value::from("g3.small")]),
                ),
            ]
            .into_iter()
            .collect(),
        );
        let filters = expand_filters(Some(&Value::List(vec![block]))).unwrap();
        assert_eq!(filters, vec![spec("name", &["g3.small"], MatchBy::Exact, false)]);
        assert!(expand_filters(None).unwrap().is_empty());
    }
}
