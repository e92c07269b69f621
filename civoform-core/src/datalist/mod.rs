//! Datalist - Generic filter/sort helper behind every list data source
//!
//! A list data source declares the shape of its records once. The helper
//! derives the data source schema from it (`filter` and `sort` blocks plus the
//! computed result list) and evaluates those blocks against records fetched
//! from the API.
//!
//! ```text
//! let small = read civo.size {
//!   filter { key = "cpu_cores"  values = ["1", "2"] }
//!   filter { key = "name"  values = ["^g3\\."]  match_by = "re" }
//!   sort   { key = "ram_mb"  direction = "desc" }
//! }
//! ```

mod filter;
mod sort;

use std::collections::HashMap;

use log::debug;

use crate::resource::{Resource, State, Value};
use crate::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

pub use filter::{CompiledFilter, FilterSpec, MatchBy, apply_filters, compile_filters, expand_filters};
pub use sort::{Direction, SortSpec, apply_sorts, expand_sorts};

/// One flattened API object
pub type Record = HashMap<String, Value>;

#[derive(Debug, thiserror::Error)]
pub enum DataListError {
    #[error("'{key}' is not a filterable field")]
    UnknownFilterKey { key: String },

    #[error("'{key}' is not a sortable field")]
    UnknownSortKey { key: String },

    #[error("Filter value '{value}' for '{key}' is not a valid {expected}")]
    InvalidValue {
        key: String,
        value: String,
        expected: String,
    },

    #[error("Invalid regular expression '{pattern}' for '{key}': {source}")]
    InvalidRegex {
        key: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("match_by = \"{match_by}\" is only supported on string fields, '{key}' is not one")]
    UnsupportedMatch { key: String, match_by: String },

    #[error("Invalid {block} block: {message}")]
    InvalidBlock { block: String, message: String },
}

/// Describes one list data source
#[derive(Debug, Clone)]
pub struct DataListConfig {
    /// Fields of a single record
    pub record_schema: Vec<AttributeSchema>,
    /// Computed attribute holding the matching records (`sizes`, `regions`, ...)
    pub result_attribute: String,
    /// Keys allowed in `filter` blocks; empty means every record field
    pub filter_keys: Vec<String>,
    /// Keys allowed in `sort` blocks; empty means every scalar record field
    pub sort_keys: Vec<String>,
}

impl DataListConfig {
    pub fn new(result_attribute: impl Into<String>, record_schema: Vec<AttributeSchema>) -> Self {
        Self {
            record_schema,
            result_attribute: result_attribute.into(),
            filter_keys: Vec::new(),
            sort_keys: Vec::new(),
        }
    }

    pub fn with_filter_keys(mut self, keys: &[&str]) -> Self {
        self.filter_keys = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn with_sort_keys(mut self, keys: &[&str]) -> Self {
        self.sort_keys = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    /// Type of a record field
    pub fn field_type(&self, key: &str) -> Option<&AttributeType> {
        self.record_schema
            .iter()
            .find(|f| f.name == key)
            .map(|f| &f.attr_type)
    }

    fn filterable(&self) -> Vec<String> {
        if self.filter_keys.is_empty() {
            self.record_schema.iter().map(|f| f.name.clone()).collect()
        } else {
            self.filter_keys.clone()
        }
    }

    fn sortable(&self) -> Vec<String> {
        if self.sort_keys.is_empty() {
            self.record_schema
                .iter()
                .filter(|f| !matches!(f.attr_type, AttributeType::List(_) | AttributeType::Map(_)))
                .map(|f| f.name.clone())
                .collect()
        } else {
            self.sort_keys.clone()
        }
    }

    /// Data source schema for `resource_type`
    pub fn schema(&self, resource_type: &str) -> ResourceSchema {
        let filter_block = AttributeType::Block(vec![
            AttributeSchema::new("key", AttributeType::Enum(self.filterable())).required(),
            AttributeSchema::new("values", types::string_list()).required(),
            AttributeSchema::new("match_by", types::one_of(&["exact", "re", "substring"]))
                .with_default(Value::from("exact")),
            AttributeSchema::new("all", AttributeType::Bool).with_default(Value::Bool(false)),
        ]);
        let sort_block = AttributeType::Block(vec![
            AttributeSchema::new("key", AttributeType::Enum(self.sortable())).required(),
            AttributeSchema::new("direction", types::one_of(&["asc", "desc"]))
                .with_default(Value::from("asc")),
        ]);
        let record = AttributeType::Block(
            self.record_schema
                .iter()
                .cloned()
                .map(AttributeSchema::computed)
                .collect(),
        );

        ResourceSchema::data_source(resource_type)
            .attribute(
                AttributeSchema::new("filter", AttributeType::List(Box::new(filter_block)))
                    .with_description("Narrow the results; every filter must match"),
            )
            .attribute(
                AttributeSchema::new("sort", AttributeType::List(Box::new(sort_block)))
                    .with_description("Order the results; the first sort is most significant"),
            )
            .attribute(
                AttributeSchema::new(&self.result_attribute, AttributeType::List(Box::new(record)))
                    .computed(),
            )
            .attribute(AttributeSchema::new("id", AttributeType::String).computed())
    }
}

/// Evaluates a list data source against fetched records
pub struct DataList<'a> {
    config: &'a DataListConfig,
}

impl<'a> DataList<'a> {
    pub fn new(config: &'a DataListConfig) -> Self {
        Self { config }
    }

    /// Filter and sort records using the `filter`/`sort` blocks of `resource`
    pub fn read(&self, resource: &Resource, records: Vec<Record>) -> Result<State, DataListError> {
        let filters = expand_filters(resource.attributes.get("filter"))?;
        let sorts = expand_sorts(resource.attributes.get("sort"))?;

        let compiled = compile_filters(self.config, &filters)?;
        let total = records.len();
        let mut records = apply_filters(records, &compiled);
        apply_sorts(self.config, &mut records, &sorts)?;
        debug!(
            "{}: {} of {} records match",
            resource.id,
            records.len(),
            total
        );

        let id = uuid::Uuid::new_v4().to_string();
        let mut attributes = resource.user_attributes();
        attributes.insert(
            self.config.result_attribute.clone(),
            Value::List(records.into_iter().map(Value::Map).collect()),
        );
        attributes.insert("id".to_string(), Value::String(id.clone()));

        Ok(State::existing(resource.id.clone(), attributes).with_identifier(id))
    }
}

/// Read a string list out of a block attribute
pub(crate) fn string_values(value: Option<&Value>, block: &str) -> Result<Vec<String>, DataListError> {
    let Some(value) = value else {
        return Ok(Vec::new());
    };
    let items = value.as_list().ok_or_else(|| DataListError::InvalidBlock {
        block: block.to_string(),
        message: "values must be a list".to_string(),
    })?;
    items
        .iter()
        .map(|item| match item {
            Value::String(s) => Ok(s.clone()),
            Value::Int(i) => Ok(i.to_string()),
            Value::Float(f) => Ok(f.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            other => Err(DataListError::InvalidBlock {
                block: block.to_string(),
                message: format!("unsupported value {:?}", other),
            }),
        })
        .collect()
}
