//! Default configuration discovered from the process environment.

use std::env;
use std::fs;
#[cfg(not(target_arch = "wasm32"))]
use std::path::Path;

use serde_json::{Map, Value};

const CONFIG_VARIABLE: &str = "NEXUS_CONFIG";
const DEFAULTS_PATH_VARIABLE: &str = "__NEXUS_DEFAULTS_PATH";

/// Returns the parsed defaults document (`{"config": {...}}`) when available.
fn nexus_defaults() -> Option<Value> {
    let path = env::var(DEFAULTS_PATH_VARIABLE).ok()?;
    let content = fs::read_to_string(path).ok()?;
    serde_json::from_str::<Value>(&content).ok()
}

fn parse_config_source(raw: &str) -> Option<Value> {
    if let Ok(json) = serde_json::from_str::<Value>(raw) {
        if json.is_object() {
            return Some(json);
        }
    }

    if let Some(path) = treat_as_path(raw) {
        if let Ok(contents) = fs::read_to_string(&path) {
            if let Ok(json) = serde_json::from_str::<Value>(&contents) {
                if json.is_object() {
                    return Some(json);
                }
            }
        }
    }

    parse_key_value_config(raw)
}

#[cfg(not(target_arch = "wasm32"))]
fn treat_as_path(raw: &str) -> Option<String> {
    if raw.contains('=') {
        return None;
    }
    let trimmed = raw.trim();
    if Path::new(trimmed).exists() {
        Some(trimmed.to_string())
    } else {
        None
    }
}

#[cfg(target_arch = "wasm32")]
fn treat_as_path(_raw: &str) -> Option<String> {
    None
}

fn parse_key_value_config(raw: &str) -> Option<Value> {
    let mut map = Map::new();
    for entry in raw.split(',') {
        let Some((key, value)) = entry.split_once('=') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());
        if key.is_empty() || value.is_empty() {
            continue;
        }
        map.insert(key.to_string(), Value::String(value.to_string()));
    }
    if map.is_empty() {
        None
    } else {
        Some(Value::Object(map))
    }
}

/// Retrieves the default app configuration as a JSON map when available.
///
/// `NEXUS_CONFIG` wins over the defaults file; it may hold inline JSON, a path to a
/// JSON file, or `key=value` pairs separated by commas.
pub fn default_app_config_json() -> Option<Map<String, Value>> {
    if let Ok(raw) = env::var(CONFIG_VARIABLE) {
        if let Some(value) = parse_config_source(&raw) {
            return value.as_object().cloned();
        }
    }

    nexus_defaults()?
        .get("config")
        .and_then(Value::as_object)
        .cloned()
}
