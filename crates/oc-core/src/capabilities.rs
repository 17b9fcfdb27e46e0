//! Model capability detection.
//!
//! Capabilities come from two sources: the server's show-model metadata and
//! keyword tables matched against the model name. Metadata is preferred;
//! name-derived tags are added on top. Both sources produce a
//! [`CapabilitySet`] over a fixed vocabulary, so merging is a set union and
//! "thinking" is folded into "reasoning" at parse time.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Serialize, Serializer};
use serde_json::Value;
use tracing::debug;

/// A capability tag. Declaration order is display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Capability {
    Reasoning,
    Vision,
    Multimodal,
    Moe,
    Plus,
    LongContext,
    Coding,
    Math,
}

impl Capability {
    pub const ALL: [Capability; 8] = [
        Capability::Reasoning,
        Capability::Vision,
        Capability::Multimodal,
        Capability::Moe,
        Capability::Plus,
        Capability::LongContext,
        Capability::Coding,
        Capability::Math,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Capability::Reasoning => "reasoning",
            Capability::Vision => "vision",
            Capability::Multimodal => "multimodal",
            Capability::Moe => "moe",
            Capability::Plus => "plus",
            Capability::LongContext => "long-context",
            Capability::Coding => "coding",
            Capability::Math => "math",
        }
    }

    /// Parse a tag. `thinking` is a synonym for `reasoning`.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_lowercase().as_str() {
            "thinking" => Some(Capability::Reasoning),
            other => Self::ALL.into_iter().find(|c| c.as_str() == other),
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Capability {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A set of capability tags, iterated in display order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CapabilitySet(BTreeSet<Capability>);

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from tag strings; unknown tags are dropped.
    pub fn from_tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            tags.into_iter()
                .filter_map(|t| Capability::parse(t.as_ref()))
                .collect(),
        )
    }

    pub fn insert(&mut self, capability: Capability) {
        self.0.insert(capability);
    }

    pub fn remove(&mut self, capability: Capability) {
        self.0.remove(&capability);
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }

    /// Add every tag of `other` that is not already present.
    pub fn merge(&mut self, other: &CapabilitySet) {
        self.0.extend(other.iter());
    }

    /// Union of two sets; `merged(a, a) == a`.
    pub fn merged(&self, other: &CapabilitySet) -> CapabilitySet {
        let mut out = self.clone();
        out.merge(other);
        out
    }

    /// Accepts image input.
    pub fn supports_vision(&self) -> bool {
        self.contains(Capability::Vision) || self.contains(Capability::Multimodal)
    }

    pub fn supports_reasoning(&self) -> bool {
        self.contains(Capability::Reasoning)
    }

    pub fn tags(&self) -> Vec<&'static str> {
        self.iter().map(Capability::as_str).collect()
    }
}

/// `(reasoning)(vision)`; empty for an empty set.
impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for capability in self.iter() {
            write!(f, "({})", capability)?;
        }
        Ok(())
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Substring tables matched against the lowercased model name.
const NAME_KEYWORDS: &[(Capability, &[&str])] = &[
    (
        Capability::Reasoning,
        &["reasoning", "think", "thought", "o1", "qwq", "deepseek-r1", "phi4-reasoning", "marco-o1"],
    ),
    (
        Capability::Vision,
        &["vision", "visual", "image", "multimodal", "qwen2.5vl", "llava", "bakllava", "moondream", "cogvlm"],
    ),
    (Capability::Multimodal, &["multimodal", "llama4", "gpt-4v", "claude-3"]),
    (
        Capability::Moe,
        &["moe", "mixtral", "switch", "expert", "deepseek-r1:671b", "qwen3:235b", "qwen3:30b", "llama4:"],
    ),
    (Capability::Plus, &["plus"]),
    (
        Capability::LongContext,
        &["long", "context", "longcontext", "128k", "256k", "1m", "2m"],
    ),
    (
        Capability::Coding,
        &["code", "coder", "codellama", "starcoder", "wizard-coder", "deepseek-coder"],
    ),
    (Capability::Math, &["math", "mathematician", "mathstral", "wizard-math"]),
];

/// Short markers that only count as whole name tokens.
const NAME_PATTERNS: &[(Capability, &str)] = &[
    (Capability::Vision, r"(^|[^a-z])vl([^a-z]|$)"),
    (Capability::Vision, r"(^|[^a-z])mm([^a-z]|$)"),
    (Capability::Multimodal, r"(^|[^a-z])mm([^a-z]|$)"),
    (Capability::Moe, r"\d+x\d+(\.\d+)?[bm]"),
];

/// Phrases in a template or system prompt that indicate a reasoning model.
const REASONING_INDICATORS: &[&str] = &[
    "reasoning",
    "think",
    "thought",
    "step by step",
    "chain of thought",
    "analyze",
    "reasoning process",
    "<think>",
    "reasoning steps",
];

/// Server capability strings that every model reports.
const UNINFORMATIVE: &[&str] = &["completion", "chat", "quantized"];

/// Parameter count above which a model is assumed to be Mixture-of-Experts.
const MOE_PARAMETER_THRESHOLD: f64 = 100.0;

fn name_patterns() -> &'static Vec<(Capability, Regex)> {
    static PATTERNS: OnceLock<Vec<(Capability, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        NAME_PATTERNS
            .iter()
            .filter_map(|(cap, pattern)| Regex::new(pattern).ok().map(|re| (*cap, re)))
            .collect()
    })
}

fn expert_pattern() -> &'static Regex {
    static EXPERT: OnceLock<Regex> = OnceLock::new();
    EXPERT.get_or_init(|| Regex::new(r"\d+x\d+(\.\d+)?[bm]").expect("valid expert pattern"))
}

/// Capabilities inferred from the model name alone.
pub fn from_name(model_name: &str) -> CapabilitySet {
    let name = model_name.to_lowercase();
    let mut set = CapabilitySet::new();

    for (capability, keywords) in NAME_KEYWORDS {
        if keywords.iter().any(|k| name.contains(k)) {
            set.insert(*capability);
        }
    }
    for (capability, pattern) in name_patterns() {
        if pattern.is_match(&name) {
            set.insert(*capability);
        }
    }

    collapse_vision(set)
}

/// An explicit multimodal tag replaces the narrower vision tag.
fn collapse_vision(mut set: CapabilitySet) -> CapabilitySet {
    if set.contains(Capability::Multimodal) {
        set.remove(Capability::Vision);
    }
    set
}

/// Capabilities from show-model metadata, augmented by name heuristics.
///
/// Metadata that is not a JSON object yields only the name-derived tags.
pub fn from_metadata(model_name: &str, metadata: &Value) -> CapabilitySet {
    let Some(info) = metadata.as_object() else {
        debug!("Metadata for {} is not an object", model_name);
        return from_name(model_name);
    };

    let mut set = CapabilitySet::new();

    if let Some(declared) = info.get("capabilities").and_then(Value::as_array) {
        for tag in declared.iter().filter_map(Value::as_str) {
            if UNINFORMATIVE.contains(&tag) {
                continue;
            }
            match Capability::parse(tag) {
                Some(capability) => set.insert(capability),
                None => debug!("Ignoring server capability '{}' for {}", tag, model_name),
            }
        }
    }

    let text_field = |key: &str| {
        info.get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_lowercase()
    };
    let template = text_field("template");
    let system = text_field("system");
    if REASONING_INDICATORS
        .iter()
        .any(|i| template.contains(i) || system.contains(i))
    {
        set.insert(Capability::Reasoning);
    }

    let details = info.get("details").and_then(Value::as_object);
    let mut families: Vec<String> = Vec::new();
    if let Some(details) = details {
        if let Some(family) = details.get("family").and_then(Value::as_str) {
            families.push(family.to_lowercase());
        }
        if let Some(list) = details.get("families").and_then(Value::as_array) {
            families.extend(list.iter().filter_map(Value::as_str).map(str::to_lowercase));
        }
    }
    for family in &families {
        if family.contains("llava") || family.contains("vision") {
            set.insert(Capability::Vision);
        }
        if family.contains("reasoning") || family.contains("thinking") {
            set.insert(Capability::Reasoning);
        }
    }

    let parameters = details
        .and_then(|d| d.get("parameter_size"))
        .and_then(Value::as_str)
        .and_then(parse_parameter_size);
    let lower_name = model_name.to_lowercase();
    if parameters.is_some_and(|b| b > MOE_PARAMETER_THRESHOLD) || expert_pattern().is_match(&lower_name) {
        set.insert(Capability::Moe);
    }

    collapse_vision(set.merged(&from_name(model_name)))
}

/// Parse a parameter size such as `8.0B`, `567M` or `1.2T` into billions.
pub fn parse_parameter_size(raw: &str) -> Option<f64> {
    static SIZE: OnceLock<Regex> = OnceLock::new();
    let re = SIZE.get_or_init(|| {
        Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*([bmkt])?").expect("valid parameter size pattern")
    });

    let caps = re.captures(raw)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    let scaled = match caps.get(2).map(|m| m.as_str().to_ascii_lowercase()) {
        Some(s) if s == "t" => value * 1000.0,
        Some(s) if s == "m" => value / 1000.0,
        Some(s) if s == "k" => value / 1_000_000.0,
        _ => value,
    };
    Some(scaled)
}
