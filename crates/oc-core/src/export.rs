//! Markdown export of shell interactions.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::{DateTime, Local};
use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::catalog::{Catalog, ModelDescriptor};
use crate::config::GenerationParams;
use crate::content::ContentType;
use crate::dispatch::{Dispatcher, PromptRequest};
use crate::text::{extract_thinking, strip_thinking};

const TITLE_MAX_WORDS: usize = 10;
const TAGS_MAX_WORDS: usize = 15;
const SAMPLE_CHARS: usize = 800;

const TITLE_SYSTEM_PROMPT: &str = "You are a title generator. Create concise, precise titles for user queries.
Rules:
- Maximum 10 words
- Be specific and descriptive
- Focus on the main action and main topic of the content, not the query itself
- Go through the entire content to understand the main topic
- If the action was to create a summary, the title can start as \"Summary of...\"
- Use clear, simple language
- Focus on: topic, domain, technology, concepts, methods
- Use precise, specific terms
- Avoid generic words like \"question\", \"answer\", \"content\"
- No special characters except hyphens
- Respond with ONLY the title, nothing else";

const TAGS_SYSTEM_PROMPT: &str = "You are a content tagger. Generate relevant tags/keywords for content categorization.
Rules:
- Maximum 15 words total across all tags
- Use semicolon (;) to separate tags
- Focus on: topic, domain, technology, concepts, methods
- Use precise, specific terms
- Avoid generic words like \"question\", \"answer\", \"content\"
- Respond with ONLY the tags, nothing else";

const STOPWORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "a", "an", "and", "or", "but", "in", "with", "to", "for",
    "of", "as", "by",
];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// One question and answer to export.
#[derive(Debug, Clone)]
pub struct Interaction<'a> {
    pub prompt: &'a str,
    pub response: &'a str,
    pub model: &'a str,
    pub has_image: bool,
    pub content_type: Option<ContentType>,
    pub system_prompt: Option<&'a str>,
}

/// Everything rendered into the markdown file.
#[derive(Debug, Clone)]
pub struct MarkdownDoc<'a> {
    pub title: String,
    pub tags: String,
    pub timestamp: DateTime<Local>,
    pub interaction: &'a Interaction<'a>,
    pub model_info: Option<ModelDescriptor>,
    pub params: GenerationParams,
}

fn non_title_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w\s-]").expect("valid title filter"))
}

fn non_tag_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w\s;-]").expect("valid tag filter"))
}

fn words() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\w+").expect("valid word pattern"))
}

fn unsafe_filename_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"[<>:"/\\|?*]"#).expect("valid filename filter"))
}

fn strip_quotes(text: &str) -> &str {
    text.trim().trim_matches('"').trim_matches('\'')
}

/// Clean a model-generated title; `None` when nothing usable remains.
pub fn sanitize_title(raw: &str) -> Option<String> {
    let stripped = strip_thinking(raw);
    let title = non_title_chars().replace_all(strip_quotes(&stripped), "");
    let title = title
        .split_whitespace()
        .take(TITLE_MAX_WORDS)
        .collect::<Vec<&str>>()
        .join(" ");
    Some(title).filter(|t| !t.is_empty())
}

/// Clean model-generated tags, keeping whole tags within the word budget.
pub fn sanitize_tags(raw: &str) -> Option<String> {
    let stripped = strip_thinking(raw);
    let tags = non_tag_chars()
        .replace_all(strip_quotes(&stripped), "")
        .trim()
        .to_string();

    if words().find_iter(&tags).count() <= TAGS_MAX_WORDS {
        return Some(tags).filter(|t| !t.is_empty());
    }

    let mut count = 0;
    let mut kept = Vec::new();
    for tag in tags.split(';').map(str::trim) {
        let n = words().find_iter(tag).count();
        if count + n > TAGS_MAX_WORDS {
            break;
        }
        count += n;
        kept.push(tag);
    }
    Some(kept.join("; ")).filter(|t| !t.is_empty())
}

/// First four words of the prompt.
pub fn fallback_title(prompt: &str) -> String {
    let title = prompt.split_whitespace().take(4).collect::<Vec<&str>>().join(" ");
    if title.is_empty() {
        "Untitled Query".to_string()
    } else {
        title
    }
}

/// Up to five prompt keywords longer than three letters.
pub fn fallback_tags(prompt: &str) -> String {
    let lower = prompt.to_lowercase();
    let keywords: Vec<&str> = words()
        .find_iter(&lower)
        .map(|m| m.as_str())
        .filter(|w| w.chars().count() > 3 && !STOPWORDS.contains(w))
        .take(5)
        .collect();
    if keywords.is_empty() {
        "general; query".to_string()
    } else {
        keywords.join("; ")
    }
}

/// File stem: sanitized title plus `_YYYYMMDD_HHMM`.
pub fn file_stem(title: &str, when: &DateTime<Local>) -> String {
    let stamp = when.format("%Y%m%d_%H%M").to_string();
    let name = unsafe_filename_chars().replace_all(title, "-");
    let name = name.split_whitespace().collect::<Vec<&str>>().join("_");
    let mut name = name.trim_matches(|c| c == '_' || c == '-').to_string();

    if name.chars().count() > 100 {
        name = name.chars().take(100).collect();
    }
    if name.chars().count() < 3 {
        return format!("query_{}", stamp);
    }
    format!("{}_{}", name, stamp)
}

/// `dir/stem.md`, or `dir/stem_N.md` for the first free N.
pub fn unique_path(dir: &Path, stem: &str) -> PathBuf {
    let first = dir.join(format!("{}.md", stem));
    if !first.exists() {
        return first;
    }
    (1..)
        .map(|n| dir.join(format!("{}_{}.md", stem, n)))
        .find(|p| !p.exists())
        .unwrap_or(first)
}

fn title_case_key(key: &str) -> String {
    key.split('_')
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Render the markdown document.
pub fn render_markdown(doc: &MarkdownDoc<'_>) -> String {
    let i = doc.interaction;
    let mut md = format!(
        "# {}\n\n**Timestamp: {}**\n\n**Tags: {}**\n\n## User question:\n\n{}\n\n* * *\n\n## Model response:\n\n{}\n\n* * *\n",
        doc.title,
        doc.timestamp.format("%d %B %Y, %I:%M %p"),
        doc.tags,
        i.prompt,
        strip_thinking(i.response),
    );

    if let Some(thinking) = extract_thinking(i.response) {
        md.push_str(&format!("\n## Reasoning Process:\n\n{}\n\n* * *\n", thinking));
    }

    md.push_str(&format!("\n## Session Metadata:\n\n**Model:** {}\n\n", i.model));

    md.push_str("**Model Info:**\n");
    match &doc.model_info {
        Some(info) => {
            let rows = [
                ("size_gb", info.size_gb().to_string()),
                ("parameter_size", info.parameter_size.clone()),
                ("family", info.family.clone()),
                ("format", info.format.clone()),
                ("quantization", info.quantization.clone()),
                ("modified", info.modified_at.clone()),
            ];
            for (key, value) in rows {
                md.push_str(&format!("- {}: {}\n", title_case_key(key), value));
            }
        }
        None => md.push_str("- Info: Metadata unavailable\n"),
    }
    md.push('\n');

    if !doc.params.is_empty() {
        md.push_str("**Parameters Used:**\n");
        for (key, value) in doc.params.iter() {
            md.push_str(&format!("- {}: {}\n", key, value));
        }
        md.push('\n');
    }

    if let Some(content_type) = i.content_type {
        md.push_str(&format!("**Content Type:** {}\n\n", content_type));
    }
    if i.has_image {
        md.push_str("**Image Input:** Yes (Base64 encoded)\n\n");
    }
    if let Some(system) = i.system_prompt.filter(|s| !s.is_empty()) {
        md.push_str(&format!("**System Prompt Used:**\n```\n{}\n```\n\n", system));
    }

    md
}

/// Writes interactions to `answers_dir`, titling them with the same model.
pub struct MarkdownExporter {
    dispatcher: Dispatcher,
    catalog: Catalog,
    answers_dir: PathBuf,
}

impl MarkdownExporter {
    pub fn new(dispatcher: Dispatcher, catalog: Catalog, answers_dir: impl Into<PathBuf>) -> Self {
        Self {
            dispatcher,
            catalog,
            answers_dir: answers_dir.into(),
        }
    }

    fn sample(interaction: &Interaction<'_>) -> String {
        let prompt: String = interaction.prompt.chars().take(SAMPLE_CHARS).collect();
        let response: String = interaction.response.chars().take(SAMPLE_CHARS).collect();
        format!("Query: {}... Response: {}...", prompt, response)
    }

    async fn ask_plain(&self, model: &str, system: &str, prompt: String) -> Option<String> {
        let request = PromptRequest::new(model, prompt)
            .system(Some(system))
            .without_config_params();
        match self.dispatcher.ask(&request).await {
            Ok(text) => Some(text),
            Err(e) => {
                warn!("Metadata generation failed: {}", e.detail());
                None
            }
        }
    }

    pub async fn generate_title(&self, interaction: &Interaction<'_>) -> String {
        let prompt = format!(
            "Create a title for this query and content: {}",
            Self::sample(interaction)
        );
        self.ask_plain(interaction.model, TITLE_SYSTEM_PROMPT, prompt)
            .await
            .and_then(|raw| sanitize_title(&raw))
            .unwrap_or_else(|| fallback_title(interaction.prompt))
    }

    pub async fn generate_tags(&self, interaction: &Interaction<'_>) -> String {
        let prompt = format!("Generate tags for this content: {}", Self::sample(interaction));
        self.ask_plain(interaction.model, TAGS_SYSTEM_PROMPT, prompt)
            .await
            .and_then(|raw| sanitize_tags(&raw))
            .unwrap_or_else(|| fallback_tags(interaction.prompt))
    }

    /// Export one interaction and return the written path.
    pub async fn save(&self, interaction: &Interaction<'_>) -> Result<PathBuf, ExportError> {
        let title = self.generate_title(interaction).await;
        let tags = self.generate_tags(interaction).await;
        let model_info = self.catalog.model_info(interaction.model).await.unwrap_or_else(|e| {
            debug!("Model info unavailable: {}", e);
            None
        });

        let doc = MarkdownDoc {
            title,
            tags,
            timestamp: Local::now(),
            interaction,
            model_info,
            params: self.dispatcher.store().generation_params(),
        };
        let markdown = render_markdown(&doc);

        fs::create_dir_all(&self.answers_dir).map_err(|source| ExportError::Write {
            path: self.answers_dir.clone(),
            source,
        })?;
        let path = unique_path(&self.answers_dir, &file_stem(&doc.title, &doc.timestamp));
        fs::write(&path, markdown).map_err(|source| ExportError::Write {
            path: path.clone(),
            source,
        })?;

        debug!("Saved interaction to {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{entry, store_with, FakeApi};
    use chrono::TimeZone;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn when() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, 7, 14, 5, 0).unwrap()
    }

    #[test]
    fn test_sanitize_title() {
        assert_eq!(
            sanitize_title("<think>hmm</think>\"Rust: Ownership & Borrowing!\"").as_deref(),
            Some("Rust Ownership Borrowing")
        );
        let long = "one two three four five six seven eight nine ten eleven twelve";
        assert_eq!(sanitize_title(long).unwrap().split(' ').count(), 10);
        assert_eq!(sanitize_title("<think>x</think> !!! "), None);
    }

    #[test]
    fn test_sanitize_tags_respects_word_budget() {
        assert_eq!(sanitize_tags("rust; ownership").as_deref(), Some("rust; ownership"));
        let many = "a b c d e; f g h i j; k l m n o; p q r";
        assert_eq!(sanitize_tags(many).as_deref(), Some("a b c d e; f g h i j; k l m n o"));
    }

    #[test]
    fn test_fallbacks() {
        assert_eq!(fallback_title("How do I parse JSON in Rust"), "How do I parse");
        assert_eq!(fallback_title("   "), "Untitled Query");
        assert_eq!(
            fallback_tags("How should the parser handle unicode with rust"),
            "should; parser; handle; unicode; rust"
        );
        assert_eq!(fallback_tags("is it ok"), "general; query");
    }

    #[test]
    fn test_file_stem_and_collisions() {
        assert_eq!(
            file_stem("Rust: ownership / borrowing", &when()),
            "Rust-_ownership_-_borrowing_20250307_1405"
        );
        assert_eq!(file_stem("?", &when()), "query_20250307_1405");

        let dir = tempdir().unwrap();
        let first = unique_path(dir.path(), "stem");
        assert_eq!(first, dir.path().join("stem.md"));
        fs::write(&first, "x").unwrap();
        assert_eq!(unique_path(dir.path(), "stem"), dir.path().join("stem_1.md"));
        fs::write(dir.path().join("stem_1.md"), "x").unwrap();
        assert_eq!(unique_path(dir.path(), "stem"), dir.path().join("stem_2.md"));
    }

    #[test]
    fn test_render_sections() {
        let interaction = Interaction {
            prompt: "Why is the sky blue?",
            response: "<think>Rayleigh</think>Scattering.",
            model: "llama3:8b",
            has_image: true,
            content_type: Some(ContentType::Image),
            system_prompt: Some("Be brief."),
        };
        let doc = MarkdownDoc {
            title: "Sky Color".into(),
            tags: "physics; light".into(),
            timestamp: when(),
            interaction: &interaction,
            model_info: None,
            params: GenerationParams::from_pairs([("temperature", "0.5")]),
        };
        let md = render_markdown(&doc);
        assert!(md.starts_with("# Sky Color\n\n**Timestamp: 07 March 2025, 02:05 PM**"));
        assert!(md.contains("## Model response:\n\nScattering.\n"));
        assert!(md.contains("## Reasoning Process:\n\nRayleigh\n"));
        assert!(md.contains("- temperature: 0.5\n"));
        assert!(md.contains("**Content Type:** image"));
        assert!(md.contains("**Image Input:** Yes"));
        assert!(md.contains("```\nBe brief.\n```"));
        assert!(md.contains(
            "**Model Info:**\n- Info: Metadata unavailable\n\n**Parameters Used:**\n"
        ));

        let info = ModelDescriptor {
            name: "llama3:8b".into(),
            size_bytes: 4_700_000_000,
            parameter_size: "8.0B".into(),
            family: "llama".into(),
            format: "gguf".into(),
            quantization: "Q4_0".into(),
            modified_at: "2025-03-01T10:00:00Z".into(),
        };
        let md = render_markdown(&MarkdownDoc {
            model_info: Some(info),
            ..doc
        });
        assert!(md.contains("**Model Info:**\n- Size Gb: 4.38\n- Parameter Size: 8.0B\n"));
        assert!(md.contains("- Modified: 2025-03-01T10:00:00Z\n\n**Parameters Used:**"));
    }

    #[tokio::test]
    async fn test_save_writes_file_with_generated_title() {
        let api = Arc::new(FakeApi::new());
        api.set_model_entries(vec![entry("llama3:8b", "8.0B")]);
        api.push_generate(Ok("Capital of France".into()));
        api.push_generate(Ok("geography; france".into()));
        let (_cfg, store) = store_with("[ollama]\ntemperature = 0.2\n");
        let dir = tempdir().unwrap();
        let exporter = MarkdownExporter::new(
            Dispatcher::new(api.clone(), store.clone()),
            Catalog::new(api.clone(), store),
            dir.path().join("answers"),
        );

        let interaction = Interaction {
            prompt: "What is the capital of France?",
            response: "Paris.",
            model: "llama3:8b",
            has_image: false,
            content_type: None,
            system_prompt: None,
        };
        let path = exporter.save(&interaction).await.unwrap();
        let name = path.file_name().unwrap().to_str().unwrap().to_string();
        assert!(name.starts_with("Capital_of_France_"));

        let md = fs::read_to_string(&path).unwrap();
        assert!(md.contains("**Tags: geography; france**"));
        assert!(md.contains("- Parameter Size: 8.0B"));

        // title and tag requests do not carry config parameters
        for request in api.generate_requests() {
            assert!(request.options.is_empty());
        }
    }

    #[tokio::test]
    async fn test_save_falls_back_when_generation_fails() {
        let api = Arc::new(FakeApi::new());
        api.push_generate(Err(oc_client::OllamaError::Status {
            status: 500,
            body: String::new(),
        }));
        api.push_generate(Ok("   ".into()));
        let (_cfg, store) = store_with("");
        let dir = tempdir().unwrap();
        let exporter = MarkdownExporter::new(
            Dispatcher::new(api.clone(), store.clone()),
            Catalog::new(api, store),
            dir.path(),
        );

        let interaction = Interaction {
            prompt: "Explain quantum entanglement simply",
            response: "Two particles share a state.",
            model: "m",
            has_image: false,
            content_type: None,
            system_prompt: None,
        };
        let path = exporter.save(&interaction).await.unwrap();
        let md = fs::read_to_string(path).unwrap();
        assert!(md.starts_with("# Explain quantum entanglement simply\n"));
        assert!(md.contains("**Tags: explain; quantum; entanglement; simply**"));
        assert!(md.contains("Metadata unavailable"));
    }
}
