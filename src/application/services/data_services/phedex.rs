//! Replica locator responses: one JSON document wrapped in a `phedex` key

use serde_json::Value;

use super::{parse_json, DecodeError, Record, ServiceKind};

pub(super) fn decode(data: &[u8]) -> Result<Vec<Record>, DecodeError> {
    match parse_json(ServiceKind::Phedex, data)? {
        Value::Object(record) => Ok(vec![record]),
        other => Err(DecodeError::new(
            ServiceKind::Phedex,
            format!("expected a document, got {}", other),
        )),
    }
}
