//! Workflow-manager request records and their configuration
//!
//! Both arrive as loosely typed data (JSON maps for requests, a key/value text
//! dump for configurations). They are mapped here into typed values by total
//! functions: every field has a defined default, so a missing or mistyped
//! field never aborts processing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A request approved by the workflow manager
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub name: String,
    pub request_type: String,
    pub status: String,
    pub dbs_url: String,
    pub input_dataset: String,
    pub site_whitelist: Vec<String>,
    pub site_blacklist: Vec<String>,
    pub priority: i64,
    pub spec_url: String,
    pub campaign: String,
    /// Request this one resubmits, if any
    pub original_request: String,
}

impl Request {
    /// Build a request from a workflow-manager record.
    ///
    /// `name` is the key the record was listed under; a `RequestName` field
    /// inside the record takes precedence when present.
    pub fn from_record(name: &str, record: &Map<String, Value>) -> Self {
        let field = |key: &str| record.get(key).unwrap_or(&Value::Null);
        let record_name = string_value(field("RequestName"));
        Self {
            name: if record_name.is_empty() {
                name.to_string()
            } else {
                record_name
            },
            request_type: string_value(field("RequestType")),
            status: string_value(field("RequestStatus")),
            dbs_url: string_value(field("DbsUrl")),
            input_dataset: string_value(field("InputDataset")),
            site_whitelist: list_value(field("SiteWhitelist")),
            site_blacklist: list_value(field("SiteBlacklist")),
            priority: int_value(field("RequestPriority")),
            spec_url: string_value(field("RequestWorkflow")),
            campaign: string_value(field("Campaign")),
            original_request: string_value(field("OriginalRequestName")),
        }
    }

    pub fn has_input_dataset(&self) -> bool {
        !self.input_dataset.trim().is_empty()
    }
}

fn string_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

fn list_value(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(string_value)
            .filter(|s| !s.is_empty())
            .collect(),
        Value::String(s) => match ConfigValue::coerce(s) {
            ConfigValue::List(items) => items,
            ConfigValue::Str(s) if !s.is_empty() => vec![s],
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

fn int_value(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Value::String(s) => match ConfigValue::coerce(s) {
            ConfigValue::Int(i) => i,
            _ => 0,
        },
        _ => 0,
    }
}

/// A single coerced configuration value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    List(Vec<String>),
    Str(String),
}

impl ConfigValue {
    /// Coerce raw configuration text into the narrowest matching type
    pub fn coerce(raw: &str) -> Self {
        let value = raw.trim();
        if value.eq_ignore_ascii_case("true") {
            return Self::Bool(true);
        }
        if value.eq_ignore_ascii_case("false") {
            return Self::Bool(false);
        }
        if let Some(inner) = value.strip_prefix('[').and_then(|v| v.strip_suffix(']')) {
            let items = inner
                .split(',')
                .map(|item| unquote(item.trim()).to_string())
                .filter(|item| !item.is_empty())
                .collect();
            return Self::List(items);
        }
        if value.starts_with(|c: char| c.is_ascii_digit()) {
            if let Ok(number) = value.parse::<i64>() {
                return Self::Int(number);
            }
        }
        Self::Str(unquote(value).to_string())
    }

    fn from_json(value: &Value) -> Self {
        match value {
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Str(n.to_string()),
            },
            Value::Array(items) => Self::List(
                items
                    .iter()
                    .map(string_value)
                    .filter(|s| !s.is_empty())
                    .collect(),
            ),
            Value::String(s) => Self::coerce(s),
            Value::Null => Self::Str(String::new()),
            Value::Object(_) => Self::Str(value.to_string()),
        }
    }
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Flattened key/value configuration attached to a request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestConfig {
    values: BTreeMap<String, ConfigValue>,
}

impl RequestConfig {
    /// Parse a configuration dump.
    ///
    /// Accepts either a JSON object (nested objects are flattened into dotted
    /// keys) or one `key = value` / `key: value` pair per line. Lines that are
    /// blank, comments, or carry no separator are skipped.
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.starts_with('{') {
            if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(trimmed) {
                let mut values = BTreeMap::new();
                flatten_json("", &map, &mut values);
                return Self { values };
            }
        }

        let values = trimmed
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| {
                let split_at = [line.find('='), line.find(':')]
                    .into_iter()
                    .flatten()
                    .min()?;
                let key = unquote(line[..split_at].trim());
                if key.is_empty() {
                    return None;
                }
                Some((key.to_string(), ConfigValue::coerce(&line[split_at + 1..])))
            })
            .collect();
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.values.get(key)
    }

    pub fn get_bool(&self, key: &str) -> bool {
        matches!(self.values.get(key), Some(ConfigValue::Bool(true)))
    }

    pub fn get_int(&self, key: &str) -> i64 {
        match self.values.get(key) {
            Some(ConfigValue::Int(i)) => *i,
            _ => 0,
        }
    }

    pub fn get_list(&self, key: &str) -> Vec<String> {
        match self.values.get(key) {
            Some(ConfigValue::List(items)) => items.clone(),
            Some(ConfigValue::Str(s)) if !s.is_empty() => vec![s.clone()],
            _ => Vec::new(),
        }
    }

    pub fn get_str(&self, key: &str) -> String {
        match self.values.get(key) {
            Some(ConfigValue::Str(s)) => s.clone(),
            Some(ConfigValue::Int(i)) => i.to_string(),
            Some(ConfigValue::Bool(b)) => b.to_string(),
            _ => String::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn flatten_json(prefix: &str, map: &Map<String, Value>, out: &mut BTreeMap<String, ConfigValue>) {
    for (key, value) in map {
        let full_key = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match value {
            Value::Object(nested) => flatten_json(&full_key, nested, out),
            other => {
                out.insert(full_key, ConfigValue::from_json(other));
            }
        }
    }
}
