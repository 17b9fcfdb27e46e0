//! Batch benchmarking: every selected model answers the same questions.

mod category;
mod report;
mod runner;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use oc_client::OllamaError;
use thiserror::Error;

pub use category::{
    billions_from_name, categorize, estimate_moe_parameters, CategoryInfo, SizeCategory,
};
pub use report::{
    default_log_path, default_output_path, report_base, round3, BenchReport, BenchmarkInfo,
    CategoryBounds, CategoryStats, ModelResult, ModelStat, PerformanceStats, QuestionResult,
    Summary,
};
pub use runner::{BenchRunner, ModelSelection};

/// Questions asked when no custom file is given.
pub const DEFAULT_QUESTIONS: [&str; 10] = [
    "What is the capital of France?",
    "Explain what machine learning is in one sentence.",
    "Write a simple Python function to calculate factorial.",
    "What are the three primary colors?",
    "Solve this math problem: 15 + 27 = ?",
    "Name three planets in our solar system.",
    "What is the chemical symbol for water?",
    "Complete this sentence: The sun rises in the...",
    "What is 8 × 7?",
    "Name one programming language.",
];

#[derive(Debug, Error)]
pub enum BenchError {
    #[error("Ollama service is not running")]
    ServerNotRunning,
    #[error("no models found; install some models first")]
    NoModels,
    #[error("no models found in category '{0}'")]
    EmptyCategory(SizeCategory),
    #[error("failed to list models: {0}")]
    Ollama(#[from] OllamaError),
    #[error("failed to read questions from {path}: {source}")]
    ReadQuestions {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{path} must contain a JSON array of questions: {source}")]
    ParseQuestions {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to serialize results: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub fn default_questions() -> Vec<String> {
    DEFAULT_QUESTIONS.iter().map(|q| q.to_string()).collect()
}

/// Load questions from a JSON array of strings.
pub fn load_questions(path: &Path) -> Result<Vec<String>, BenchError> {
    let raw = fs::read_to_string(path).map_err(|source| BenchError::ReadQuestions {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| BenchError::ParseQuestions {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_questions() {
        let dir = tempdir().unwrap();
        let good = dir.path().join("q.json");
        fs::write(&good, r#"["One?", "Two?"]"#).unwrap();
        assert_eq!(load_questions(&good).unwrap(), vec!["One?", "Two?"]);

        let bad = dir.path().join("bad.json");
        fs::write(&bad, r#"{"q": "One?"}"#).unwrap();
        assert!(matches!(load_questions(&bad), Err(BenchError::ParseQuestions { .. })));

        let missing = dir.path().join("missing.json");
        assert!(matches!(load_questions(&missing), Err(BenchError::ReadQuestions { .. })));
    }

    #[test]
    fn test_default_questions() {
        let questions = default_questions();
        assert_eq!(questions.len(), 10);
        assert_eq!(questions[0], "What is the capital of France?");
    }
}
