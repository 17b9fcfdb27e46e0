//! Content types, file discovery and `img:` / `text:` input tags.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

/// Kind of attached content; drives system prompt and preset choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    Image,
    Code,
    Subtitle,
}

impl ContentType {
    /// Key in `[system_prompts]`.
    pub fn system_prompt_key(self) -> &'static str {
        match self {
            ContentType::Image => "image_analysis",
            ContentType::Code => "code_analysis",
            ContentType::Subtitle => "srt_analysis",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Image => "image",
            ContentType::Code => "code",
            ContentType::Subtitle => "srt",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const SUBTITLE_EXTENSIONS: &[&str] = &["srt", "vtt", "ass", "ssa", "sub"];

const CODE_EXTENSIONS: &[&str] = &[
    "py", "js", "ts", "java", "c", "cpp", "h", "hpp", "cs", "go", "rb", "php", "html", "htm",
    "css", "scss", "less", "sh", "bat", "ps1", "pl", "lua", "swift", "kt", "dart", "scala", "sql",
    "r", "jl", "m", "vb", "asm", "s", "vue", "jsx", "tsx", "json", "xml", "yaml", "yml", "rs",
    "toml",
];

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp", "tiff", "svg"];

/// Extensions listed by the `texts` command and the text picker.
const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "rst", "csv", "tsv", "log", "out", "dat", "env", "json", "xml", "yaml", "yml",
    "ini", "cfg", "conf", "toml", "properties", "adoc", "org", "lst", "sbv", "dfxp", "ttml",
    "srt", "vtt", "ass", "ssa", "sub", "lrc", "smi", "py", "pyi", "js", "jsx", "ts", "tsx",
    "java", "c", "h", "cpp", "cc", "cxx", "hpp", "hh", "cs", "go", "rb", "php", "html", "htm",
    "css", "scss", "less", "sh", "bash", "zsh", "pl", "pm", "lua", "swift", "kt", "kts", "dart",
    "scala", "sql", "r", "jl", "m", "vb", "asm", "s", "vue", "ex", "exs", "erl", "hs", "ml",
    "clj", "groovy", "ps1", "bat", "cmd", "tex", "bib", "mk", "cmake", "gradle", "rs",
];

const CODE_PATTERNS: &[&str] = &[
    r"def\s+\w+\s*\(",
    r"function\s+\w+\s*\(",
    r"class\s+\w+",
    r"import\s+\w+",
    r"#include\s*<",
    r"<\?xml\s+version",
    r"<!DOCTYPE\s+html",
];

pub const DEFAULT_IMAGE_PROMPT: &str = "Describe this image.";
pub const DEFAULT_TEXT_PROMPT: &str = "Analyze this text.";

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
}

fn srt_pattern() -> &'static Regex {
    static SRT: OnceLock<Regex> = OnceLock::new();
    SRT.get_or_init(|| {
        Regex::new(r"\d{2}:\d{2}:\d{2}[,.]\d{3}\s*-->\s*\d{2}:\d{2}:\d{2}[,.]\d{3}")
            .expect("valid subtitle timestamp pattern")
    })
}

fn code_patterns() -> &'static Vec<Regex> {
    static CODE: OnceLock<Vec<Regex>> = OnceLock::new();
    CODE.get_or_init(|| {
        CODE_PATTERNS
            .iter()
            .filter_map(|p| Regex::new(&format!("(?i){}", p)).ok())
            .collect()
    })
}

/// Classify attached text by file extension, then by content.
///
/// `None` means generic text.
pub fn detect_content_type(path: Option<&Path>, text: Option<&str>) -> Option<ContentType> {
    if let Some(ext) = path.and_then(extension) {
        if SUBTITLE_EXTENSIONS.contains(&ext.as_str()) {
            return Some(ContentType::Subtitle);
        }
        if CODE_EXTENSIONS.contains(&ext.as_str()) {
            return Some(ContentType::Code);
        }
    }

    let text = text?;
    if srt_pattern().is_match(text) {
        return Some(ContentType::Subtitle);
    }
    if code_patterns().iter().any(|re| re.is_match(text)) {
        return Some(ContentType::Code);
    }
    None
}

fn list_with_extensions(dir: &Path, extensions: &[&str]) -> Vec<String> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            warn!("Error reading folder {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| {
            extension(Path::new(name)).is_some_and(|ext| extensions.contains(&ext.as_str()))
        })
        .collect();
    names.sort();
    names
}

/// Image file names in `dir`, sorted.
pub fn list_images(dir: &Path) -> Vec<String> {
    list_with_extensions(dir, IMAGE_EXTENSIONS)
}

/// Text file names in `dir`, sorted.
pub fn list_texts(dir: &Path) -> Vec<String> {
    list_with_extensions(dir, TEXT_EXTENSIONS)
}

/// Errors loading an attachment.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("file not found: {0}")]
    NotFound(PathBuf),
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Base64 image data for the generate request.
///
/// Accepts a file path or an existing `data:image/...` URL / raw base64
/// string.
pub fn prepare_image(path_or_data: &str) -> Result<String, ContentError> {
    let path = Path::new(path_or_data);
    if path.exists() {
        let bytes = fs::read(path).map_err(|source| ContentError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Encoded image {} ({} bytes)", path.display(), bytes.len());
        return Ok(STANDARD.encode(bytes));
    }

    if let Some(rest) = path_or_data.strip_prefix("data:image/") {
        if let Some((_, data)) = rest.split_once(',') {
            return Ok(data.to_string());
        }
    }
    if path_or_data.len() > 100 && STANDARD.decode(path_or_data).is_ok() {
        return Ok(path_or_data.to_string());
    }

    Err(ContentError::NotFound(path.to_path_buf()))
}

/// Which folder an input tag refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Image,
    Text,
}

/// A parsed `img:` / `text:` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecialInput {
    pub kind: AttachmentKind,
    /// `None` when the path was left empty; the caller offers a picker.
    pub path: Option<String>,
    /// `None` when no prompt followed the path.
    pub prompt: Option<String>,
}

impl SpecialInput {
    /// Parse a shell line. Returns `None` for plain prompts.
    pub fn parse(line: &str) -> Option<Self> {
        let (kind, rest) = if let Some(rest) = line.strip_prefix("img:") {
            (AttachmentKind::Image, rest)
        } else if let Some(rest) = line.strip_prefix("text:") {
            (AttachmentKind::Text, rest)
        } else {
            return None;
        };

        let (path, prompt) = match rest.split_once(' ') {
            Some((path, prompt)) => (path, Some(prompt)),
            None => (rest, None),
        };
        let path = Some(path.trim()).filter(|p| !p.is_empty()).map(str::to_string);
        let prompt = prompt
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);

        Some(Self { kind, path, prompt })
    }

    /// The prompt, or the default for this attachment kind.
    pub fn prompt_or_default(&self) -> &str {
        match (&self.prompt, self.kind) {
            (Some(prompt), _) => prompt,
            (None, AttachmentKind::Image) => DEFAULT_IMAGE_PROMPT,
            (None, AttachmentKind::Text) => DEFAULT_TEXT_PROMPT,
        }
    }
}

/// Resolve a bare file name against `folder` when it is not a path that exists.
pub fn resolve_in_folder(raw: &str, folder: &Path) -> PathBuf {
    let candidate = PathBuf::from(raw);
    if candidate.exists() || raw.contains(std::path::MAIN_SEPARATOR) {
        return candidate;
    }
    let in_folder = folder.join(raw);
    if in_folder.exists() {
        in_folder
    } else {
        candidate
    }
}

/// A loaded text attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextAttachment {
    pub path: PathBuf,
    pub content: String,
    pub content_type: Option<ContentType>,
}

pub fn load_text(path: &Path) -> Result<TextAttachment, ContentError> {
    let content = fs::read_to_string(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => ContentError::NotFound(path.to_path_buf()),
        _ => ContentError::Read {
            path: path.to_path_buf(),
            source,
        },
    })?;
    let content_type = detect_content_type(Some(path), Some(&content));
    Ok(TextAttachment {
        path: path.to_path_buf(),
        content,
        content_type,
    })
}

/// Append attached text to the user's prompt.
pub fn prompt_with_text(prompt: &str, text: &str) -> String {
    format!("{}\n\n{}", prompt, text)
}
