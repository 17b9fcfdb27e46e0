//! Active generation parameters from the `[ollama]` section.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::fmt;

/// How a parameter value is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParamKind {
    Float,
    Int,
    Bool,
    Text,
    /// `true` / `false` / `auto`; `auto` leaves the key unset.
    TriState,
}

/// Every recognised key, in the order it is reported.
const PARAM_TABLE: &[(&str, ParamKind)] = &[
    ("temperature", ParamKind::Float),
    ("top_k", ParamKind::Int),
    ("top_p", ParamKind::Float),
    ("repeat_penalty", ParamKind::Float),
    ("seed", ParamKind::Int),
    ("num_predict", ParamKind::Int),
    ("num_ctx", ParamKind::Int),
    ("num_batch", ParamKind::Int),
    ("num_gqa", ParamKind::Int),
    ("num_gpu", ParamKind::Int),
    ("main_gpu", ParamKind::Int),
    ("num_thread", ParamKind::Int),
    ("max_image_size", ParamKind::Int),
    ("low_vram", ParamKind::Bool),
    ("f16_kv", ParamKind::Bool),
    ("logits_all", ParamKind::Bool),
    ("vocab_only", ParamKind::Bool),
    ("use_mmap", ParamKind::Bool),
    ("use_mlock", ParamKind::Bool),
    ("stream_response", ParamKind::Bool),
    ("raw_response", ParamKind::Bool),
    ("thinking_format", ParamKind::Text),
    ("reasoning_depth", ParamKind::Text),
    ("image_quality", ParamKind::Text),
    ("image_format", ParamKind::Text),
    ("enable_thinking", ParamKind::TriState),
    ("enable_vision", ParamKind::TriState),
];

/// Keys forwarded to the server as generation options.
const OPTION_KEYS: &[&str] = &[
    "temperature",
    "top_k",
    "top_p",
    "repeat_penalty",
    "seed",
    "num_predict",
    "num_ctx",
    "num_batch",
    "num_gqa",
    "num_gpu",
    "main_gpu",
    "low_vram",
    "f16_kv",
    "logits_all",
    "vocab_only",
    "use_mmap",
    "use_mlock",
    "num_thread",
];

/// Value for the disabled sentinel: the key is left to server defaults.
const DISABLED: &str = "-1";

/// A parsed parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Float(f64),
    Int(i64),
    Bool(bool),
    Text(String),
}

impl ParamValue {
    fn to_json(&self) -> Value {
        match self {
            ParamValue::Float(v) => serde_json::Number::from_f64(*v)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            ParamValue::Int(v) => Value::from(*v),
            ParamValue::Bool(v) => Value::Bool(*v),
            ParamValue::Text(v) => Value::String(v.clone()),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Bool(v) => write!(f, "{}", v),
            ParamValue::Text(v) => f.write_str(v),
        }
    }
}

/// Explicitly configured generation parameters.
///
/// Only keys present in the config with a usable value appear here;
/// malformed values are skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationParams {
    values: IndexMap<String, ParamValue>,
}

impl GenerationParams {
    /// Parse from raw `key = value` pairs of the `[ollama]` section.
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let raw: IndexMap<&str, &str> = pairs.into_iter().collect();
        let mut values = IndexMap::new();

        for (key, kind) in PARAM_TABLE {
            let Some(value) = raw.get(key).map(|v| v.trim()) else {
                continue;
            };
            if let Some(parsed) = parse_value(*kind, value) {
                values.insert(key.to_string(), parsed);
            }
        }

        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.values.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    fn flag(&self, key: &str) -> Option<bool> {
        match self.values.get(key) {
            Some(ParamValue::Bool(v)) => Some(*v),
            _ => None,
        }
    }

    /// Server-side generation options for the request body.
    pub fn request_options(&self) -> Map<String, Value> {
        OPTION_KEYS
            .iter()
            .filter_map(|key| self.values.get(*key).map(|v| (key.to_string(), v.to_json())))
            .collect()
    }

    pub fn stream(&self) -> Option<bool> {
        self.flag("stream_response")
    }

    pub fn raw(&self) -> Option<bool> {
        self.flag("raw_response")
    }

    /// `None` means model-dependent.
    pub fn enable_thinking(&self) -> Option<bool> {
        self.flag("enable_thinking")
    }

    /// `None` means model-dependent.
    pub fn enable_vision(&self) -> Option<bool> {
        self.flag("enable_vision")
    }

    pub fn thinking_format(&self) -> &str {
        match self.values.get("thinking_format") {
            Some(ParamValue::Text(v)) => v,
            _ => "xml",
        }
    }
}

fn parse_value(kind: ParamKind, value: &str) -> Option<ParamValue> {
    match kind {
        ParamKind::Float if value != DISABLED => value.parse().ok().map(ParamValue::Float),
        ParamKind::Int if value != DISABLED => value.parse().ok().map(ParamValue::Int),
        ParamKind::Float | ParamKind::Int => None,
        ParamKind::Bool | ParamKind::TriState => match value.to_lowercase().as_str() {
            "true" => Some(ParamValue::Bool(true)),
            "false" => Some(ParamValue::Bool(false)),
            _ => None,
        },
        ParamKind::Text => {
            if value.is_empty() || value == "auto" {
                None
            } else {
                Some(ParamValue::Text(value.to_string()))
            }
        }
    }
}
