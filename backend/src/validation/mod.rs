//! JSON Schema validation for broker schema documents.
//!
//! Layout overrides are plain JSON documents. Before one is deserialized it
//! is checked against the embedded Draft 7 schema
//! `schemas/broker-schema.json`, so that a typo in a field name or a
//! classifier is reported as such instead of being silently defaulted.
//! Semantic checks (zone overlap, anchor placement) follow in
//! [`BrokerSchema::validate`].
//!
//! # Example
//!
//! ```rust,ignore
//! use brokerload::validation::parse_schema_document;
//!
//! let json = std::fs::read_to_string("dhl-2025.json")?;
//! let schema = parse_schema_document(&json)?;
//! println!("{} zones", schema.zones.len());
//! ```

use once_cell::sync::Lazy;
use serde_json::Value;

use crate::error::SchemaError;
use crate::schema::BrokerSchema;

static BROKER_SCHEMA: Lazy<Value> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../schemas/broker-schema.json"))
        .expect("Invalid embedded schema")
});

/// Validate a JSON value against a JSON Schema.
///
/// # Returns
/// * `Ok(())` if valid
/// * `Err(Vec<String>)` with one message per violation
///
/// # Example
/// ```ignore
/// use serde_json::json;
/// use brokerload::validation::validate;
///
/// let schema = json!({
///     "type": "object",
///     "required": ["broker"],
///     "properties": {
///         "broker": { "type": "string" }
///     }
/// });
///
/// assert!(validate(&schema, &json!({ "broker": "dhl" })).is_ok());
/// assert!(validate(&schema, &json!({ "width": 24 })).is_err());
/// ```
pub fn validate(schema: &Value, data: &Value) -> Result<(), Vec<String>> {
    let validator = jsonschema::draft7::new(schema)
        .map_err(|e| vec![format!("Invalid schema: {}", e)])?;

    let errors: Vec<String> = validator
        .iter_errors(data)
        .map(|e| e.to_string())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Simpler variant: just true/false.
pub fn is_valid(schema: &Value, data: &Value) -> bool {
    jsonschema::draft7::is_valid(schema, data)
}

/// Validate a document against the broker schema JSON Schema.
pub fn validate_broker_schema(data: &Value) -> Result<(), Vec<String>> {
    validate(&BROKER_SCHEMA, data)
}

/// Quick check against the broker schema JSON Schema.
pub fn is_valid_broker_schema(data: &Value) -> bool {
    is_valid(&BROKER_SCHEMA, data)
}

/// Parse, structurally validate and semantically validate a schema document.
pub fn parse_schema_document(json: &str) -> Result<BrokerSchema, SchemaError> {
    let value: Value = serde_json::from_str(json)?;
    validate_broker_schema(&value).map_err(|errors| SchemaError::InvalidDocument { errors })?;

    let schema: BrokerSchema = serde_json::from_value(value)?;
    schema.validate()?;
    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Broker;
    use serde_json::json;

    #[test]
    fn test_builtin_layouts_match_document_schema() {
        for broker in Broker::all() {
            let value = serde_json::to_value(broker.builtin_schema()).unwrap();
            if let Err(errors) = validate_broker_schema(&value) {
                panic!("{}: {:?}", broker, errors);
            }
        }
    }

    #[test]
    fn test_unknown_classifier_rejected() {
        let mut value = serde_json::to_value(Broker::Dachser.builtin_schema()).unwrap();
        value["zones"][0]["anchors"][0]["classifier"] = json!("postcode");
        assert!(!is_valid_broker_schema(&value));
    }

    #[test]
    fn test_misspelled_field_rejected() {
        let mut value = serde_json::to_value(Broker::Dachser.builtin_schema()).unwrap();
        value["numeric_colums"] = json!([11]);
        let errors = validate_broker_schema(&value).unwrap_err();
        assert!(!errors.is_empty());
    }

    #[test]
    fn test_parse_document_runs_semantic_checks() {
        let mut value = serde_json::to_value(Broker::Dachser.builtin_schema()).unwrap();
        value["zones"][1]["start"] = json!(4);
        let err = parse_schema_document(&value.to_string()).unwrap_err();
        assert!(matches!(err, SchemaError::OverlappingZones { .. }));
    }

    #[test]
    fn test_parse_document() {
        let json = Broker::Schenker.builtin_schema().to_json().unwrap();
        let schema = parse_schema_document(&json).unwrap();
        assert_eq!(schema, Broker::Schenker.builtin_schema());
        assert!(matches!(
            parse_schema_document("{\"broker\": \"ups\", \"width\": 3, \"zones\": []}"),
            Err(SchemaError::InvalidDocument { .. })
        ));
    }
}
