//! Creation requests
//!
//! [`ItemDraft`] mirrors the loosely typed call payload: every field is
//! optional so that a missing or null value is reported as a validation
//! failure instead of a decode failure. [`ItemDraft::validate`] applies the
//! coercion rules and yields a [`ValidDraft`].

use crate::error::RegistryError;
use crate::types::ItemId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Deepest array/object nesting accepted in `params` and `additionalInfo`
///
/// Stored records wrap the payload in one more object and must stay within
/// the decoder's nesting limit of 128.
pub const MAX_PAYLOAD_DEPTH: usize = 100;

/// Unvalidated request to create an item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDraft {
    /// Unique code; strings, numbers and booleans are accepted
    pub code: Option<Value>,
    /// Classification
    #[serde(rename = "type")]
    pub item_type: Option<Value>,
    /// Contributor identity
    pub added_by: Option<Value>,
    /// Location tag, empty when absent
    pub bench: Option<Value>,
    /// Opaque payload, required
    pub params: Option<Value>,
    /// Sequence of part ids
    pub parts: Option<Value>,
    /// Opaque payload, `{}` when absent
    pub additional_info: Option<Value>,
}

impl ItemDraft {
    /// Draft with the required fields and no parts
    #[must_use]
    pub fn new(
        code: impl Into<String>,
        item_type: impl Into<String>,
        added_by: impl Into<String>,
        bench: impl Into<String>,
        params: Value,
    ) -> Self {
        Self {
            code: Some(Value::String(code.into())),
            item_type: Some(Value::String(item_type.into())),
            added_by: Some(Value::String(added_by.into())),
            bench: Some(Value::String(bench.into())),
            params: Some(params),
            parts: Some(Value::Array(Vec::new())),
            additional_info: None,
        }
    }

    /// With part ids
    #[must_use]
    pub fn with_parts<I>(mut self, parts: I) -> Self
    where
        I: IntoIterator<Item = ItemId>,
    {
        self.parts = Some(Value::Array(
            parts.into_iter().map(|id| Value::from(id.get())).collect(),
        ));
        self
    }

    /// With additional info payload
    #[inline]
    #[must_use]
    pub fn with_additional_info(mut self, info: Value) -> Self {
        self.additional_info = Some(info);
        self
    }

    /// Decode a JSON request body
    ///
    /// Malformed JSON is reported as a validation failure of the request.
    pub fn from_json(body: &str) -> Result<Self, RegistryError> {
        serde_json::from_str(body).map_err(|e| RegistryError::validation("request", e.to_string()))
    }

    /// Apply presence checks and coercions
    pub fn validate(self) -> Result<ValidDraft, RegistryError> {
        let code = required_text("code", self.code)?;
        let item_type = required_text("type", self.item_type)?;
        let added_by = required_text("addedBy", self.added_by)?;
        let params = match self.params {
            Some(Value::Null) | None => {
                return Err(RegistryError::validation("params", "must be defined"));
            }
            Some(params) => params,
        };
        check_depth("params", &params)?;
        let parts = match self.parts {
            Some(Value::Array(entries)) => entries
                .iter()
                .map(coerce_part)
                .collect::<Result<Vec<_>, _>>()?,
            _ => return Err(RegistryError::validation("parts", "must be an array")),
        };
        let bench = optional_text("bench", self.bench)?.unwrap_or_default();
        let additional_info = match self.additional_info {
            Some(Value::Null) | None => Value::Object(Map::new()),
            Some(info) => info,
        };
        check_depth("additionalInfo", &additional_info)?;

        Ok(ValidDraft {
            code,
            item_type,
            added_by,
            bench,
            params,
            parts,
            additional_info,
        })
    }
}

/// Request that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidDraft {
    /// Unique item code
    pub code: String,
    /// Item type tag
    pub item_type: String,
    /// Author of the record
    pub added_by: String,
    /// Bench the item was made on
    pub bench: String,
    /// Parameters object, depth checked
    pub params: Value,
    /// Part ids, in request order
    pub parts: Vec<ItemId>,
    /// Free-form extra data, `{}` when omitted
    pub additional_info: Value,
}

fn required_text(field: &'static str, value: Option<Value>) -> Result<String, RegistryError> {
    optional_text(field, value)?.ok_or_else(|| RegistryError::validation(field, "must be defined"))
}

fn optional_text(field: &'static str, value: Option<Value>) -> Result<Option<String>, RegistryError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(Value::Array(_) | Value::Object(_)) => {
            Err(RegistryError::validation(field, "must be a string"))
        }
    }
}

fn check_depth(field: &'static str, value: &Value) -> Result<(), RegistryError> {
    let depth = nesting_depth(value);
    if depth > MAX_PAYLOAD_DEPTH {
        return Err(RegistryError::validation(
            field,
            format!("nested {depth} levels deep, at most {MAX_PAYLOAD_DEPTH} allowed"),
        ));
    }
    Ok(())
}

/// Array/object nesting of `value`; scalars are 0
fn nesting_depth(value: &Value) -> usize {
    let mut deepest = 0;
    let mut pending = vec![(value, 0)];
    while let Some((value, depth)) = pending.pop() {
        match value {
            Value::Array(items) => {
                deepest = deepest.max(depth + 1);
                pending.extend(items.iter().map(|v| (v, depth + 1)));
            }
            Value::Object(map) => {
                deepest = deepest.max(depth + 1);
                pending.extend(map.values().map(|v| (v, depth + 1)));
            }
            _ => {}
        }
    }
    deepest
}

fn coerce_part(value: &Value) -> Result<ItemId, RegistryError> {
    let invalid = || {
        RegistryError::validation("parts", format!("{value} is not a non-negative integer id"))
    };
    match value {
        Value::Number(n) => {
            if let Some(id) = n.as_u64() {
                return Ok(ItemId(id));
            }
            match n.as_f64() {
                // Integral floats such as `2.0`
                Some(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f < u64::MAX as f64 => {
                    Ok(ItemId(f as u64))
                }
                _ => Err(invalid()),
            }
        }
        Value::String(s) => s.parse::<ItemId>().map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn field_of(err: RegistryError) -> &'static str {
        match err {
            RegistryError::Validation { field, .. } => field,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn builder_validates() {
        let valid = ItemDraft::new("A1", "bolt", "alice", "bench1", json!({}))
            .with_parts([ItemId(0), ItemId(1)])
            .validate()
            .unwrap();
        assert_eq!(valid.code, "A1");
        assert_eq!(valid.parts, vec![ItemId(0), ItemId(1)]);
        assert_eq!(valid.additional_info, json!({}));
    }

    #[test]
    fn missing_required_fields_reported_in_order() {
        let draft = ItemDraft::from_json(r#"{"type":"bolt","addedBy":"a","params":{},"parts":[]}"#).unwrap();
        assert_eq!(field_of(draft.validate().unwrap_err()), "code");

        let draft = ItemDraft::from_json(r#"{"code":"A","addedBy":"a","params":{},"parts":[]}"#).unwrap();
        assert_eq!(field_of(draft.validate().unwrap_err()), "type");

        let draft = ItemDraft::from_json(r#"{"code":"A","type":"t","params":{},"parts":[]}"#).unwrap();
        assert_eq!(field_of(draft.validate().unwrap_err()), "addedBy");

        let draft = ItemDraft::from_json(r#"{"code":"A","type":"t","addedBy":"a","params":null,"parts":[]}"#).unwrap();
        assert_eq!(field_of(draft.validate().unwrap_err()), "params");

        let draft = ItemDraft::from_json(r#"{"code":"A","type":"t","addedBy":"a","params":{}}"#).unwrap();
        assert_eq!(field_of(draft.validate().unwrap_err()), "parts");
    }

    #[test]
    fn numeric_code_is_normalized() {
        let draft = ItemDraft::from_json(r#"{"code":1042,"type":"t","addedBy":"a","params":{},"parts":[]}"#).unwrap();
        assert_eq!(draft.validate().unwrap().code, "1042");
    }

    #[test]
    fn object_code_rejected() {
        let draft = ItemDraft::from_json(r#"{"code":{"x":1},"type":"t","addedBy":"a","params":{},"parts":[]}"#).unwrap();
        assert_eq!(field_of(draft.validate().unwrap_err()), "code");
    }

    #[test]
    fn parts_coercion() {
        let draft = ItemDraft::from_json(
            r#"{"code":"A","type":"t","addedBy":"a","params":{},"parts":[0,"1",2.0," 3 "]}"#,
        )
        .unwrap();
        assert_eq!(
            draft.validate().unwrap().parts,
            vec![ItemId(0), ItemId(1), ItemId(2), ItemId(3)]
        );
    }

    #[test]
    fn bad_parts_rejected() {
        for parts in [r#"[-1]"#, r#"[1.5]"#, r#"["x"]"#, r#"[null]"#, r#"[[0]]"#, r#""0""#, r#"{}"#] {
            let body = format!(r#"{{"code":"A","type":"t","addedBy":"a","params":{{}},"parts":{parts}}}"#);
            let err = ItemDraft::from_json(&body).unwrap().validate().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation, "parts = {parts}");
        }
    }

    #[test]
    fn defaults_for_optional_fields() {
        let draft = ItemDraft::from_json(r#"{"code":"A","type":"t","addedBy":"a","params":[1,2],"parts":[]}"#).unwrap();
        let valid = draft.validate().unwrap();
        assert_eq!(valid.bench, "");
        assert_eq!(valid.additional_info, json!({}));
        assert_eq!(valid.params, json!([1, 2]));
    }

    fn nested(depth: usize) -> Value {
        let mut value = json!(0);
        for _ in 0..depth {
            value = json!([value]);
        }
        value
    }

    #[test]
    fn nesting_depth_counts_containers() {
        assert_eq!(nesting_depth(&json!(1)), 0);
        assert_eq!(nesting_depth(&json!({})), 1);
        assert_eq!(nesting_depth(&json!({"a": [1, {"b": []}], "c": 2})), 3);
        assert_eq!(nesting_depth(&nested(7)), 7);
    }

    #[test]
    fn deep_payloads_rejected() {
        let at_limit = ItemDraft::new("A", "t", "a", "", nested(MAX_PAYLOAD_DEPTH));
        assert!(at_limit.validate().is_ok());

        let too_deep = ItemDraft::new("A", "t", "a", "", nested(MAX_PAYLOAD_DEPTH + 1));
        assert_eq!(field_of(too_deep.validate().unwrap_err()), "params");

        let info = ItemDraft::new("A", "t", "a", "", json!({})).with_additional_info(nested(200));
        assert_eq!(field_of(info.validate().unwrap_err()), "additionalInfo");
    }

    #[test]
    fn part_id_beyond_u64_rejected() {
        let body = r#"{"code":"A","type":"t","addedBy":"a","params":{},"parts":[18446744073709551616]}"#;
        let err = ItemDraft::from_json(body).unwrap().validate().unwrap_err();
        assert_eq!(field_of(err), "parts");

        let body = r#"{"code":"A","type":"t","addedBy":"a","params":{},"parts":[18446744073709551615]}"#;
        let parts = ItemDraft::from_json(body).unwrap().validate().unwrap().parts;
        assert_eq!(parts, vec![ItemId(u64::MAX)]);
    }

    #[test]
    fn malformed_body_is_validation_error() {
        let err = ItemDraft::from_json("{not json").unwrap_err();
        assert_eq!(field_of(err), "request");
    }
}
