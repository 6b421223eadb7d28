//! Parsing of tool catalogs returned by hosts.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::protocol::ToolDescriptor;

/// Parse a tools/list payload into descriptors.
///
/// Accepts `{"tools": [...]}` or a bare array. Entries may be full
/// descriptors or plain names. A missing or null `tools` field is an
/// empty catalog.
pub fn parse_tool_list(value: &Value) -> Result<Vec<ToolDescriptor>> {
    let entries = match value {
        Value::Array(entries) => entries,
        Value::Object(map) => match map.get("tools") {
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(Value::Array(entries)) => entries,
            Some(other) => {
                return Err(Error::Protocol(format!(
                    "tools list: expected an array, got {}",
                    kind(other)
                )));
            }
        },
        Value::Null => return Ok(Vec::new()),
        other => {
            return Err(Error::Protocol(format!(
                "tools list: expected an object, got {}",
                kind(other)
            )));
        }
    };

    entries.iter().map(parse_entry).collect()
}

fn parse_entry(entry: &Value) -> Result<ToolDescriptor> {
    match entry {
        Value::String(name) => Ok(ToolDescriptor::named(name.clone())),
        Value::Object(map) if map.get("name").is_some_and(Value::is_string) => {
            serde_json::from_value(entry.clone())
                .map_err(|e| Error::Protocol(format!("tools list: bad descriptor: {e}")))
        }
        _ => Err(Error::Protocol(format!("tools list: entry without a name: {entry}"))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
