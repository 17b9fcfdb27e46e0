//! Preset selection.
//!
//! Strict priority, first match wins: explicit content type, then model
//! capabilities, then keywords in the prompt, then `default`.

use tracing::{debug, info, warn};

use crate::capabilities::{Capability, CapabilitySet};
use crate::config::{ConfigError, ConfigStore};
use crate::content::ContentType;
use crate::session::Session;

pub const DEFAULT_PRESET: &str = "default";
pub const VISION_PRESET: &str = "vision_analysis";
pub const CODING_PRESET: &str = "coding";
pub const TEXT_ANALYSIS_PRESET: &str = "text_analysis";
pub const REASONING_PRESET: &str = "reasoning_mode";
pub const MOE_PRESET: &str = "moe_optimized";
pub const MATH_PRESET: &str = "mathematical";
pub const TRANSLATION_PRESET: &str = "translation";
pub const CREATIVE_PRESET: &str = "creative_writing";
pub const SUMMARY_PRESET: &str = "summarization";

/// Model capability to preset, checked in order.
const CAPABILITY_PRESETS: &[(&[Capability], &str)] = &[
    (&[Capability::Vision, Capability::Multimodal], VISION_PRESET),
    (&[Capability::Reasoning], REASONING_PRESET),
    (&[Capability::Moe], MOE_PRESET),
    (&[Capability::Math], MATH_PRESET),
    (&[Capability::Coding], CODING_PRESET),
];

/// Prompt keywords to preset, checked in order.
const PROMPT_PRESETS: &[(&[&str], &str)] = &[
    (
        &[
            "calculate", "solve", "equation", "formula", "math", "algebra", "geometry",
            "statistics", "probability", "derivative", "integral",
        ],
        MATH_PRESET,
    ),
    (
        &[
            "code", "program", "function", "debug", "error", "bug", "algorithm", "syntax",
            "programming", "script", "refactor",
        ],
        CODING_PRESET,
    ),
    (
        &[
            "translate", "translation", "language", "español", "français", "deutsch",
            "italiano", "português", "中文", "日本語",
        ],
        TRANSLATION_PRESET,
    ),
    (
        &[
            "write", "story", "poem", "creative", "fiction", "novel", "character", "plot",
            "narrative", "dialogue", "screenplay",
        ],
        CREATIVE_PRESET,
    ),
    (
        &[
            "summary", "summarize", "summarise", "brief", "overview", "key points",
            "main ideas", "extract", "condense",
        ],
        SUMMARY_PRESET,
    ),
    (
        &[
            "analyze", "analyse", "analysis", "examine", "evaluate", "assess", "review",
            "interpret", "explain",
        ],
        TEXT_ANALYSIS_PRESET,
    ),
];

/// Pick the best preset for a request.
pub fn select_preset(
    content_type: Option<ContentType>,
    capabilities: &CapabilitySet,
    prompt: Option<&str>,
) -> &'static str {
    if let Some(content_type) = content_type {
        return match content_type {
            ContentType::Image => VISION_PRESET,
            ContentType::Code => CODING_PRESET,
            ContentType::Subtitle => TEXT_ANALYSIS_PRESET,
        };
    }

    for (wanted, preset) in CAPABILITY_PRESETS {
        if wanted.iter().any(|c| capabilities.contains(*c)) {
            return preset;
        }
    }

    if let Some(prompt) = prompt {
        let prompt = prompt.to_lowercase();
        for (keywords, preset) in PROMPT_PRESETS {
            if keywords.iter().any(|k| prompt.contains(k)) {
                return preset;
            }
        }
    }

    DEFAULT_PRESET
}

/// One-line description for the preset menus.
pub fn preset_description(name: &str) -> &'static str {
    match name {
        "creative_writing" => "Optimized for creative and diverse outputs with higher creativity",
        "coding" => "High accuracy and precision for code generation and analysis",
        "text_analysis" => "Optimized for transcript/document analysis with minimal hallucination",
        "vision_analysis" => "Maximum accuracy for visual content analysis and interpretation",
        "reasoning_mode" => "Deep reasoning and problem-solving capabilities",
        "moe_optimized" => "Specialized settings for Mixture of Experts model architectures",
        "conversational" => "Balanced parameters for natural dialogue and chat interactions",
        "mathematical" => "Precise settings for mathematical reasoning and calculations",
        "translation" => "Optimized for accurate language translation tasks",
        "summarization" => "Efficient content summarization and key information extraction",
        "performance" => "Speed and efficiency optimized for limited resource environments",
        "debugging" => "Specialized for code debugging and error analysis tasks",
        _ => "Custom preset",
    }
}

/// Human label used when a preset is auto-applied.
pub fn preset_label(name: &str) -> String {
    let known = match name {
        "vision_analysis" => Some("Vision Analysis"),
        "coding" => Some("Code Analysis"),
        "text_analysis" => Some("Text Analysis"),
        "reasoning_mode" => Some("Deep Reasoning"),
        "moe_optimized" => Some("MoE Optimized"),
        "mathematical" => Some("Mathematical"),
        "translation" => Some("Translation"),
        "creative_writing" => Some("Creative Writing"),
        "summarization" => Some("Summarization"),
        _ => None,
    };
    known.map(str::to_string).unwrap_or_else(|| title_case(name))
}

fn title_case(name: &str) -> String {
    name.split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Outcome of per-request preset resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresetChoice {
    /// The session override is in force; nothing was re-applied.
    Override(String),
    /// Auto-selected and written to the config store.
    Applied(&'static str),
    /// Nothing specific matched, or the selected preset is not configured.
    Unchanged(&'static str),
}

impl PresetChoice {
    pub fn name(&self) -> &str {
        match self {
            PresetChoice::Override(name) => name,
            PresetChoice::Applied(name) | PresetChoice::Unchanged(name) => name,
        }
    }
}

/// Resolve and apply the preset for one request, honouring the override.
pub fn auto_apply(
    store: &ConfigStore,
    session: &mut Session,
    content_type: Option<ContentType>,
    capabilities: &CapabilitySet,
    prompt: Option<&str>,
) -> PresetChoice {
    if let Some(name) = session.preset_override() {
        debug!("Preset override '{}' in force", name);
        return PresetChoice::Override(name.to_string());
    }

    let preset = select_preset(content_type, capabilities, prompt);
    if preset == DEFAULT_PRESET {
        return PresetChoice::Unchanged(preset);
    }

    match store.apply_preset(preset) {
        Ok(()) => {
            info!("Auto-applied '{}' preset", preset_label(preset));
            session.set_active_preset(preset);
            PresetChoice::Applied(preset)
        }
        Err(ConfigError::PresetNotFound(_)) => {
            debug!("Preset '{}' is not configured", preset);
            PresetChoice::Unchanged(preset)
        }
        Err(e) => {
            warn!("Could not apply preset '{}': {}", preset, e);
            PresetChoice::Unchanged(preset)
        }
    }
}

/// Apply a preset by name and record it as the session override.
pub fn set_override(
    store: &ConfigStore,
    session: &mut Session,
    name: &str,
) -> Result<(), ConfigError> {
    store.apply_preset(name)?;
    session.set_preset_override(name);
    info!("Preset override set to '{}'", name);
    Ok(())
}
