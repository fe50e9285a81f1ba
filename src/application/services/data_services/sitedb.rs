//! Site directory responses: a column header plus positional rows

use serde_json::Value;

use super::{parse_json, DecodeError, Record, ServiceKind};

pub(super) fn decode(data: &[u8]) -> Result<Vec<Record>, DecodeError> {
    let document = parse_json(ServiceKind::SiteDb, data)?;
    let columns: Vec<&str> = document
        .pointer("/desc/columns")
        .and_then(Value::as_array)
        .ok_or_else(|| DecodeError::new(ServiceKind::SiteDb, "missing desc.columns"))?
        .iter()
        .filter_map(Value::as_str)
        .collect();
    let rows = document
        .get("result")
        .and_then(Value::as_array)
        .ok_or_else(|| DecodeError::new(ServiceKind::SiteDb, "missing result rows"))?;

    let mut records = Vec::with_capacity(rows.len());
    for row in rows.iter().filter_map(Value::as_array) {
        let mut record = Record::new();
        for (column, value) in columns.iter().zip(row) {
            if *column == "username" {
                record.insert("name".to_string(), value.clone());
            }
            record.insert(column.to_string(), value.clone());
        }
        records.push(record);
    }
    Ok(records)
}
