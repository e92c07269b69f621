use std::cmp::Ordering;

use super::{DataListConfig, DataListError, Record};
use crate::resource::Value;
use crate::schema::enum_variant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// A `sort` block as written by the user
#[derive(Debug, Clone, PartialEq)]
pub struct SortSpec {
    pub key: String,
    pub direction: Direction,
}

/// Read `sort` blocks out of the data source attributes
pub fn expand_sorts(value: Option<&Value>) -> Result<Vec<SortSpec>, DataListError> {
    let invalid = |message: &str| DataListError::InvalidBlock {
        block: "sort".to_string(),
        message: message.to_string(),
    };
    let Some(value) = value else {
        return Ok(Vec::new());
    };
    let blocks = match value {
        Value::List(items) => items.as_slice(),
        Value::Map(_) => std::slice::from_ref(value),
        _ => return Err(invalid("expected a block")),
    };

    blocks
        .iter()
        .map(|block| {
            let map = block.as_map().ok_or_else(|| invalid("expected a block"))?;
            let key = map
                .get("key")
                .and_then(Value::as_str)
                .ok_or_else(|| invalid("key is required"))?
                .to_string();
            let direction = match map.get("direction").and_then(Value::as_str).map(enum_variant) {
                None | Some("asc") => Direction::Asc,
                Some("desc") => Direction::Desc,
                Some(other) => return Err(invalid(&format!("unknown direction '{}'", other))),
            };
            Ok(SortSpec { key, direction })
        })
        .collect()
}

/// Compare two field values of the same type. Missing values sort first.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::String(x)), Some(Value::String(y))) => x.as_bytes().cmp(y.as_bytes()),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Int(x)), Some(Value::Int(y))) => x.cmp(y),
        (Some(x), Some(y)) => match (x.as_float(), y.as_float()) {
            (Some(fx), Some(fy)) => fx.partial_cmp(&fy).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
    }
}

/// Sort records in place; earlier sorts take precedence and ties keep input order
pub fn apply_sorts(
    config: &DataListConfig,
    records: &mut [Record],
    sorts: &[SortSpec],
) -> Result<(), DataListError> {
    let allowed = config.sortable();
    if let Some(bad) = sorts.iter().find(|s| !allowed.contains(&s.key)) {
        return Err(DataListError::UnknownSortKey {
            key: bad.key.clone(),
        });
    }
    if sorts.is_empty() {
        return Ok(());
    }

    records.sort_by(|a, b| {
        for sort in sorts {
            let ordering = compare_values(a.get(&sort.key), b.get(&sort.key));
            let ordering = match sort.direction {
                Direction::Asc => ordering,
                Direction::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::tests::{size, size_config};
    use super::*;

    fn sort(key: &str, direction: Direction) -> SortSpec {
        SortSpec {
            key: key.to_string(),
            direction,
        }
    }

    fn names(records: &[Record]) -> Vec<&str> {
        records
            .iter()
            .map(|r| r["name"].as_str().unwrap())
            .collect()
    }

    #[test]
    fn multi_key_sort_is_lexicographic() {
        let mut records = vec![
            size("b", 2, 4096, true),
            size("a", 2, 2048, true),
            size("c", 1, 2048, true),
            size("d", 4, 2048, true),
        ];
        apply_sorts(
            &size_config(),
            &mut records,
            &[sort("ram_mb", Direction::Asc), sort("cpu_cores", Direction::Desc)],
        )
        .unwrap();
        assert_eq!(names(&records), vec!["d", "a", "c", "b"]);
    }

    #[test]
    fn sort_is_stable_for_ties() {
        let mut records = vec![
            size("z", 1, 1024, true),
            size("y", 1, 1024, true),
            size("x", 1, 1024, true),
        ];
        apply_sorts(&size_config(), &mut records, &[sort("cpu_cores", Direction::Desc)]).unwrap();
        assert_eq!(names(&records), vec!["z", "y", "x"]);
    }

    #[test]
    fn strings_and_bools_sort() {
        let mut records = vec![
            size("g3.medium", 2, 4096, true),
            size("g3.large", 4, 8192, false),
            size("g3.small", 1, 2048, true),
        ];
        apply_sorts(&size_config(), &mut records, &[sort("name", Direction::Asc)]).unwrap();
        assert_eq!(names(&records), vec!["g3.large", "g3.medium", "g3.small"]);

        apply_sorts(&size_config(), &mut records, &[sort("selectable", Direction::Asc)]).unwrap();
        assert_eq!(names(&records)[0], "g3.large");
    }

    #[test]
    fn rejects_unknown_or_list_keys() {
        let mut records = vec![];
        assert!(matches!(
            apply_sorts(&size_config(), &mut records, &[sort("regions", Direction::Asc)]),
            Err(DataListError::UnknownSortKey { .. })
        ));
    }

    #[test]
    fn expand_defaults_to_ascending() {
        let block = Value::Map(
            [("key".to_string(), Value::from("name"))]
                .into_iter()
                .collect(),
        );
        let sorts = expand_sorts(Some(&Value::List(vec![block]))).unwrap();
        assert_eq!(sorts, vec![sort("name", Direction::Asc)]);
    }
}
