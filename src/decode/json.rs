//! JSON response decoding for the Table service (§4.5).

use serde_json::Value;

use crate::error::{codes, Error};
use crate::transport::Response;

use super::missing_message;

/// Decodes the uniform error branch for a JSON (Table) body (§4.5). Any
/// parse failure defaults to `InternalErrorWithoutCode` with the
/// synthesized fallback message, same as a body with no recognizable error.
pub fn decode_error(response: &Response) -> Error {
    let parsed: Option<Value> = serde_json::from_str(&response.body).ok();

    let (code, message) = parsed
        .as_ref()
        .and_then(|v| v.get("odata.error"))
        .map(|odata_error| {
            let code = odata_error.get("code").and_then(Value::as_str).map(str::to_string);
            let message = odata_error
                .get("message")
                .and_then(|m| m.get("value").and_then(Value::as_str).or_else(|| m.as_str()))
                .map(str::to_string);
            (code, message)
        })
        .unwrap_or((None, None));

    // Table's fallback code never depends on status, unlike Queue/Blob's
    // (see `decode::missing_code`): a Table error body with no
    // `odata.error.code` is always `InternalErrorWithoutCode`.
    let code = code.unwrap_or_else(|| codes::INTERNAL_ERROR_WITHOUT_CODE.to_string());
    let message = message.unwrap_or_else(|| missing_message(&response.body));

    Error::new(code, message).with_status(response.status).with_payload(response.body.clone())
}

/// Table entity, kept as a generic JSON object since the schema is
/// caller-defined (§3, §4.6).
pub type Entity = serde_json::Map<String, Value>;

/// Extracts `value[].TableName` from a `queryTables` response (§4.5).
pub fn parse_query_tables(body: &str) -> Result<Vec<String>, Error> {
    let parsed: Value = serde_json::from_str(body).map_err(|e| Error::new("InvalidJsonDocument", e.to_string()))?;
    let values = parsed.get("value").and_then(Value::as_array).cloned().unwrap_or_default();
    Ok(values
        .into_iter()
        .filter_map(|v| v.get("TableName").and_then(Value::as_str).map(str::to_string))
        .collect())
}

/// Extracts `value` as the entity list from a `queryEntities` response (§4.5).
pub fn parse_query_entities(body: &str) -> Result<Vec<Entity>, Error> {
    let parsed: Value = serde_json::from_str(body).map_err(|e| Error::new("InvalidJsonDocument", e.to_string()))?;
    let values = parsed.get("value").and_then(Value::as_array).cloned().unwrap_or_default();
    values
        .into_iter()
        .map(|v| v.as_object().cloned().ok_or_else(|| Error::new("InvalidJsonDocument", "entity is not a JSON object")))
        .collect()
}

/// Parses a `getEntity` response body: the single entity object itself.
pub fn parse_entity(body: &str) -> Result<Entity, Error> {
    let parsed: Value = serde_json::from_str(body).map_err(|e| Error::new("InvalidJsonDocument", e.to_string()))?;
    parsed.as_object().cloned().ok_or_else(|| Error::new("InvalidJsonDocument", "entity is not a JSON object"))
}
