//! Model size categories.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::capabilities::parse_parameter_size;

/// Size bucket by parameter count in billions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeCategory {
    Small,
    Medium,
    Large,
    Unknown,
}

impl SizeCategory {
    pub const ALL: [SizeCategory; 4] = [
        SizeCategory::Small,
        SizeCategory::Medium,
        SizeCategory::Large,
        SizeCategory::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SizeCategory::Small => "small",
            SizeCategory::Medium => "medium",
            SizeCategory::Large => "large",
            SizeCategory::Unknown => "unknown",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            SizeCategory::Small => "Small models (≤16B parameters)",
            SizeCategory::Medium => "Medium models (16B-100B parameters)",
            SizeCategory::Large => "Large models (>100B parameters)",
            SizeCategory::Unknown => "Unknown size models",
        }
    }

    /// `(min, max)` in billions, max exclusive; `None` for unbounded.
    pub fn bounds(self) -> Option<(f64, Option<f64>)> {
        match self {
            SizeCategory::Small => Some((0.0, Some(16.0))),
            SizeCategory::Medium => Some((16.0, Some(100.0))),
            SizeCategory::Large => Some((100.0, None)),
            SizeCategory::Unknown => None,
        }
    }

    pub fn from_billions(billions: f64) -> Self {
        [SizeCategory::Small, SizeCategory::Medium, SizeCategory::Large]
            .into_iter()
            .find(|c| match c.bounds() {
                Some((min, Some(max))) => min <= billions && billions < max,
                Some((min, None)) => min <= billions,
                None => false,
            })
            .unwrap_or(SizeCategory::Unknown)
    }
}

impl fmt::Display for SizeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SizeCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SizeCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| {
                format!(
                    "invalid category '{}'; valid categories: small, medium, large, unknown",
                    s
                )
            })
    }
}

/// Category assignment for one model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryInfo {
    pub category: SizeCategory,
    pub description: String,
    pub estimated_params: Option<String>,
}

fn expert_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d+)x(\d+(?:\.\d+)?)\s*[BbMmKk]").expect("valid expert pattern")
    })
}

fn name_size_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+(?:\.\d+)?)\s*[BbMmKk]").expect("valid size pattern"))
}

fn reported_size_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d+(?:\.\d+)?)\s*[BbMmKkTt]").expect("valid reported size pattern")
    })
}

/// Conservative total for a mixture-of-experts model, in billions.
pub fn estimate_moe_parameters(experts: u32, expert_size: f64) -> f64 {
    if experts >= 100 {
        expert_size * 15.0
    } else if experts >= 20 {
        expert_size * 6.0
    } else {
        expert_size * f64::from(experts) * 0.5
    }
}

fn expert_estimate(name: &str) -> Option<f64> {
    let caps = expert_pattern().captures(name)?;
    let experts: u32 = caps.get(1)?.as_str().parse().ok()?;
    let size: f64 = caps.get(2)?.as_str().parse().ok()?;
    Some(estimate_moe_parameters(experts, size))
}

/// Parameter count in billions from a model name.
pub fn billions_from_name(name: &str) -> Option<f64> {
    if let Some(estimate) = expert_estimate(name) {
        return Some(estimate);
    }
    let m = name_size_pattern().find(name)?;
    parse_parameter_size(m.as_str())
}

/// Categorize by the reported `parameter_size`, falling back to the name.
pub fn categorize(name: &str, parameter_size: Option<&str>) -> CategoryInfo {
    let billions = parameter_size
        .and_then(parse_parameter_size)
        .or_else(|| billions_from_name(name));
    let category = billions.map_or(SizeCategory::Unknown, SizeCategory::from_billions);

    let estimated_params = parameter_size
        .and_then(|s| reported_size_pattern().find(s))
        .map(|m| m.as_str().to_uppercase())
        .or_else(|| {
            expert_estimate(name).map(|total| {
                if total >= 1000.0 {
                    format!("{:.1}T", total / 1000.0)
                } else {
                    format!("{:.1}B", total)
                }
            })
        })
        .or_else(|| name_size_pattern().find(name).map(|m| m.as_str().to_uppercase()));

    CategoryInfo {
        category,
        description: category.description().to_string(),
        estimated_params,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundaries() {
        assert_eq!(SizeCategory::from_billions(0.5), SizeCategory::Small);
        assert_eq!(SizeCategory::from_billions(15.9), SizeCategory::Small);
        assert_eq!(SizeCategory::from_billions(16.0), SizeCategory::Medium);
        assert_eq!(SizeCategory::from_billions(99.9), SizeCategory::Medium);
        assert_eq!(SizeCategory::from_billions(100.0), SizeCategory::Large);
    }

    #[test]
    fn test_moe_estimate() {
        assert_eq!(estimate_moe_parameters(8, 7.0), 28.0);
        assert_eq!(estimate_moe_parameters(32, 10.0), 60.0);
        assert_eq!(estimate_moe_parameters(128, 17.0), 255.0);
    }

    #[test]
    fn test_categorize_prefers_reported_size() {
        let info = categorize("llama3:8b", Some("70.6B"));
        assert_eq!(info.category, SizeCategory::Medium);
        assert_eq!(info.estimated_params.as_deref(), Some("70.6B"));

        let info = categorize("tinyllama", Some("1.1b"));
        assert_eq!(info.category, SizeCategory::Small);
        assert_eq!(info.estimated_params.as_deref(), Some("1.1B"));
    }

    #[test]
    fn test_categorize_from_name() {
        let info = categorize("mixtral:8x22b", None);
        assert_eq!(info.category, SizeCategory::Medium);
        assert_eq!(info.estimated_params.as_deref(), Some("88.0B"));

        let info = categorize("qwen2.5-coder:32b", Some(""));
        assert_eq!(info.category, SizeCategory::Medium);
        assert_eq!(info.estimated_params.as_deref(), Some("32B"));

        let info = categorize("smollm:360m", None);
        assert_eq!(info.category, SizeCategory::Small);

        let info = categorize("nomic-embed-text:latest", None);
        assert_eq!(info.category, SizeCategory::Unknown);
        assert_eq!(info.description, "Unknown size models");
        assert_eq!(info.estimated_params, None);
    }

    #[test]
    fn test_parse_category() {
        assert_eq!("Large".parse::<SizeCategory>(), Ok(SizeCategory::Large));
        assert!("huge".parse::<SizeCategory>().is_err());
    }
}
