//! Benchmark results, statistics and report files.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::info;

use super::category::{CategoryInfo, SizeCategory};
use super::BenchError;
use crate::catalog::ModelDescriptor;

/// Round to millisecond precision.
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// `benchmark/results/benchmark-<timestamp>.json`
pub fn default_output_path(now: &DateTime<Local>) -> PathBuf {
    PathBuf::from("benchmark/results")
        .join(format!("benchmark-{}.json", now.format("%Y-%m-%d-%H.%M.%S")))
}

/// `benchmark-<timestamp>.log`
pub fn default_log_path(now: &DateTime<Local>) -> PathBuf {
    PathBuf::from(format!("benchmark-{}.log", now.format("%Y-%m-%d-%H.%M.%S")))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionResult {
    pub question: String,
    pub answer: String,
    pub inference_time: f64,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelResult {
    pub model_name: String,
    pub model_info: Option<ModelDescriptor>,
    pub model_category: CategoryInfo,
    pub load_time: f64,
    pub total_inference_time: f64,
    pub questions_results: Vec<QuestionResult>,
    pub errors: Vec<String>,
    pub benchmark_timestamp: String,
}

impl ModelResult {
    pub fn succeeded(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn category(&self) -> SizeCategory {
        self.model_category.category
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryBounds {
    pub min: f64,
    /// `null` for unbounded.
    pub max: Option<f64>,
    pub description: &'static str,
}

/// Run metadata repeated at the top of every report file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkInfo {
    pub timestamp: String,
    pub total_models: usize,
    pub total_questions: usize,
    pub questions: Vec<String>,
    pub log_file: Option<String>,
    pub categories: IndexMap<&'static str, CategoryBounds>,
}

impl BenchmarkInfo {
    pub fn new(total_models: usize, questions: &[String], log_file: Option<&Path>) -> Self {
        let categories = SizeCategory::ALL
            .into_iter()
            .filter_map(|c| {
                c.bounds().map(|(min, max)| {
                    (
                        c.as_str(),
                        CategoryBounds {
                            min,
                            max,
                            description: c.description(),
                        },
                    )
                })
            })
            .collect();

        Self {
            timestamp: iso_timestamp(&Local::now()),
            total_models,
            total_questions: questions.len(),
            questions: questions.to_vec(),
            log_file: log_file.map(|p| p.display().to_string()),
            categories,
        }
    }
}

pub(super) fn iso_timestamp(now: &DateTime<Local>) -> String {
    now.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelStat {
    pub name: String,
    pub total_inference_time: f64,
    pub average_per_question: f64,
}

/// Fastest/slowest/average figures over error-free results.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PerformanceStats {
    pub fastest_model: Option<ModelStat>,
    pub slowest_model: Option<ModelStat>,
    pub average_load_time: f64,
    pub average_inference_time: f64,
}

impl PerformanceStats {
    pub fn compute<'a>(
        results: impl IntoIterator<Item = &'a ModelResult>,
        question_count: usize,
    ) -> Self {
        let valid: Vec<&ModelResult> = results.into_iter().filter(|r| r.succeeded()).collect();
        if valid.is_empty() {
            return Self::default();
        }

        let stat = |r: &ModelResult| ModelStat {
            name: r.model_name.clone(),
            total_inference_time: r.total_inference_time,
            average_per_question: if question_count == 0 {
                0.0
            } else {
                round3(r.total_inference_time / question_count as f64)
            },
        };
        // First minimum and first maximum win ties.
        let fastest = valid.iter().copied().fold(valid[0], |best, r| {
            if r.total_inference_time < best.total_inference_time {
                r
            } else {
                best
            }
        });
        let slowest = valid.iter().copied().fold(valid[0], |worst, r| {
            if r.total_inference_time > worst.total_inference_time {
                r
            } else {
                worst
            }
        });

        let n = valid.len() as f64;
        Self {
            fastest_model: Some(stat(fastest)),
            slowest_model: Some(stat(slowest)),
            average_load_time: round3(valid.iter().map(|r| r.load_time).sum::<f64>() / n),
            average_inference_time: round3(
                valid.iter().map(|r| r.total_inference_time).sum::<f64>() / n,
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total_benchmark_time: f64,
    pub successful_models: usize,
    pub failed_models: usize,
    #[serde(flatten)]
    pub stats: PerformanceStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryStats {
    pub total_models: usize,
    pub successful_models: usize,
    pub failed_models: usize,
    pub description: &'static str,
    #[serde(flatten)]
    pub stats: PerformanceStats,
}

#[derive(Serialize)]
struct SummaryFile<'a> {
    benchmark_info: &'a BenchmarkInfo,
    summary: &'a Summary,
    category_summary: &'a IndexMap<&'static str, CategoryStats>,
    total_models_by_category: IndexMap<&'static str, usize>,
}

#[derive(Serialize)]
struct CategoryFile<'a> {
    benchmark_info: &'a BenchmarkInfo,
    category: SizeCategory,
    category_description: &'static str,
    category_stats: &'a CategoryStats,
    models_results: Vec<&'a ModelResult>,
}

/// A finished (or interrupted) run.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchReport {
    pub info: BenchmarkInfo,
    pub results: Vec<ModelResult>,
    pub summary: Summary,
    pub category_summary: IndexMap<&'static str, CategoryStats>,
    pub interrupted: bool,
}

impl BenchReport {
    pub fn new(
        info: BenchmarkInfo,
        results: Vec<ModelResult>,
        total_benchmark_time: f64,
        interrupted: bool,
    ) -> Self {
        let questions = info.total_questions;
        let successful = results.iter().filter(|r| r.succeeded()).count();
        let summary = Summary {
            total_benchmark_time: round3(total_benchmark_time),
            successful_models: successful,
            failed_models: info.total_models.saturating_sub(successful),
            stats: PerformanceStats::compute(&results, questions),
        };

        let category_summary = SizeCategory::ALL
            .into_iter()
            .map(|category| {
                let members: Vec<&ModelResult> =
                    results.iter().filter(|r| r.category() == category).collect();
                let ok = members.iter().filter(|r| r.succeeded()).count();
                let stats = CategoryStats {
                    total_models: members.len(),
                    successful_models: ok,
                    failed_models: members.len() - ok,
                    description: category.description(),
                    stats: PerformanceStats::compute(members.iter().copied(), questions),
                };
                (category.as_str(), stats)
            })
            .collect();

        Self {
            info,
            results,
            summary,
            category_summary,
            interrupted,
        }
    }

    pub fn by_category(&self, category: SizeCategory) -> Vec<&ModelResult> {
        self.results.iter().filter(|r| r.category() == category).collect()
    }

    pub fn category_stats(&self, category: SizeCategory) -> Option<&CategoryStats> {
        self.category_summary.get(category.as_str())
    }

    /// Write `<base>_summary.json` and one `<base>_<category>.json` per
    /// non-empty category; `<base>` is `output` without `.json`.
    pub fn write(&self, output: &Path) -> Result<Vec<PathBuf>, BenchError> {
        let base = report_base(output);
        if let Some(parent) = base.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| BenchError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let mut written = Vec::new();

        let summary = SummaryFile {
            benchmark_info: &self.info,
            summary: &self.summary,
            category_summary: &self.category_summary,
            total_models_by_category: SizeCategory::ALL
                .into_iter()
                .map(|c| (c.as_str(), self.by_category(c).len()))
                .collect(),
        };
        let path = with_suffix(&base, "summary");
        write_json(&path, &summary)?;
        info!("Summary results saved to: {}", path.display());
        written.push(path);

        for category in SizeCategory::ALL {
            let models = self.by_category(category);
            let Some(stats) = self.category_stats(category) else {
                continue;
            };
            if models.is_empty() {
                continue;
            }
            let file = CategoryFile {
                benchmark_info: &self.info,
                category,
                category_description: category.description(),
                category_stats: stats,
                models_results: models,
            };
            let path = with_suffix(&base, category.as_str());
            write_json(&path, &file)?;
            info!("Category '{}' results saved to: {}", category, path.display());
            written.push(path);
        }

        Ok(written)
    }
}

/// `output` with a trailing `.json` removed.
pub fn report_base(output: &Path) -> PathBuf {
    let raw = output.to_string_lossy();
    PathBuf::from(raw.strip_suffix(".json").unwrap_or(&*raw))
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    PathBuf::from(format!("{}_{}.json", base.display(), suffix))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), BenchError> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).map_err(|source| BenchError::Write {
        path: path.to_path_buf(),
        source,
    })
}
