//! Dataset catalog responses: a JSON array of flat objects

use serde_json::Value;

use super::{parse_json, DecodeError, Record, ServiceKind};

pub(super) fn decode(data: &[u8]) -> Result<Vec<Record>, DecodeError> {
    match parse_json(ServiceKind::Dbs, data)? {
        Value::Array(rows) => Ok(rows
            .into_iter()
            .filter_map(|row| match row {
                Value::Object(record) => Some(record),
                _ => None,
            })
            .collect()),
        Value::Object(record) => Ok(vec![record]),
        other => Err(DecodeError::new(
            ServiceKind::Dbs,
            format!("expected an array of records, got {}", other),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_block_listing() {
        let records = decode(br#"[{"block_name": "/a/b/c#1"}, {"block_name": "/a/b/c#2"}, 7]"#)
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["block_name"], "/a/b/c#2");
    }

    #[test]
    fn test_decode_rejects_scalars() {
        assert!(decode(b"\"oops\"").is_err());
        assert!(decode(b"not json").is_err());
    }
}
