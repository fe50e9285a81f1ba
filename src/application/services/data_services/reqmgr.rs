//! Workflow manager responses: `{"result": [...]}`

use serde_json::Value;

use super::{parse_json, DecodeError, Record, ServiceKind};

pub(super) fn decode(data: &[u8]) -> Result<Vec<Record>, DecodeError> {
    let document = parse_json(ServiceKind::ReqMgr, data)?;
    match document.get("result") {
        Some(Value::Array(rows)) => Ok(rows
            .iter()
            .filter_map(|row| row.as_object().cloned())
            .collect()),
        _ => Err(DecodeError::new(ServiceKind::ReqMgr, "missing result array")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_result_rows() {
        let records = decode(
            br#"{"result": [{"req-1": {"RequestType": "ReReco"}, "req-2": {"RequestType": "MonteCarlo"}}]}"#,
        )
        .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].len(), 2);
    }

    #[test]
    fn test_decode_without_result_fails() {
        assert!(decode(br#"{"error": "nope"}"#).is_err());
    }
}
