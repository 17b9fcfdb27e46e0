//! Sequential benchmark run.

use std::future::Future;
use std::time::{Duration, Instant};

use chrono::Local;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use super::category::{categorize, SizeCategory};
use super::report::{iso_timestamp, round3, BenchReport, BenchmarkInfo, ModelResult, QuestionResult};
use super::BenchError;
use crate::catalog::Catalog;
use crate::dispatch::PromptRequest;
use crate::lifecycle::ModelManager;
use crate::session::Session;
use crate::text::{clean_benchmark_answer, preview};

/// Which models a run covers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ModelSelection {
    /// Every installed model not on the blacklist.
    #[default]
    All,
    Category(SizeCategory),
    Models(Vec<String>),
}

/// Benchmarks models one at a time through the lifecycle manager.
pub struct BenchRunner {
    manager: ModelManager,
    catalog: Catalog,
    model_delay: Duration,
}

impl BenchRunner {
    pub fn new(manager: ModelManager, catalog: Catalog) -> Self {
        Self {
            manager,
            catalog,
            model_delay: Duration::from_secs(1),
        }
    }

    /// Pause between consecutive models.
    pub fn with_model_delay(mut self, delay: Duration) -> Self {
        self.model_delay = delay;
        self
    }

    pub fn manager(&self) -> &ModelManager {
        &self.manager
    }

    /// Model names for `selection`, sorted.
    pub async fn resolve_models(&self, selection: &ModelSelection) -> Result<Vec<String>, BenchError> {
        let mut names = match selection {
            ModelSelection::Models(names) => {
                info!("Using manually selected models: {}", names.join(", "));
                names.clone()
            }
            ModelSelection::All => {
                let models = self.catalog.list_models(true).await?;
                if models.is_empty() {
                    return Err(BenchError::NoModels);
                }
                models.into_iter().map(|m| m.name).collect()
            }
            ModelSelection::Category(category) => {
                let models = self.catalog.list_models(true).await?;
                if models.is_empty() {
                    return Err(BenchError::NoModels);
                }
                let names: Vec<String> = models
                    .into_iter()
                    .filter(|m| {
                        categorize(&m.name, Some(m.parameter_size.as_str())).category == *category
                    })
                    .map(|m| m.name)
                    .collect();
                if names.is_empty() {
                    return Err(BenchError::EmptyCategory(*category));
                }
                info!("Filtering to {} models: {}", category, names.join(", "));
                names
            }
        };
        names.sort();
        Ok(names)
    }

    /// Run the benchmark until done or until `cancel` resolves; results
    /// gathered before cancellation are kept.
    pub async fn run<F>(
        &self,
        session: &mut Session,
        questions: &[String],
        selection: &ModelSelection,
        log_file: Option<&std::path::Path>,
        cancel: F,
    ) -> Result<BenchReport, BenchError>
    where
        F: Future<Output = ()>,
    {
        if !self.manager.is_server_running().await {
            error!("Ollama service is not running! Start it before running benchmarks.");
            return Err(BenchError::ServerNotRunning);
        }

        let models = self.resolve_models(selection).await?;
        info!(
            "Found {} models to benchmark | {} questions per model",
            models.len(),
            questions.len()
        );

        let bench_info = BenchmarkInfo::new(models.len(), questions, log_file);
        let started = Instant::now();
        let mut results = Vec::with_capacity(models.len());
        let mut interrupted = false;
        tokio::pin!(cancel);

        for (i, model) in models.iter().enumerate() {
            info!("[{}/{}] Testing model: {}", i + 1, models.len(), model);

            tokio::select! {
                biased;
                _ = &mut cancel => {
                    interrupted = true;
                    break;
                }
                result = self.benchmark_model(session, model, questions) => {
                    if result.succeeded() {
                        debug!("Model {} benchmarked successfully", model);
                    } else {
                        warn!("Model {} had {} errors", model, result.errors.len());
                    }
                    results.push(result);
                }
            }

            if i + 1 < models.len() {
                tokio::select! {
                    biased;
                    _ = &mut cancel => {
                        interrupted = true;
                        break;
                    }
                    _ = sleep(self.model_delay) => {}
                }
            }
        }

        if interrupted {
            info!(
                "Benchmark interrupted after {} model(s); saving partial results",
                results.len()
            );
        }

        let total = started.elapsed().as_secs_f64();
        let report = BenchReport::new(bench_info, results, total, interrupted);
        info!(
            "Total benchmark time: {:.3}s | Successful: {}/{}",
            report.summary.total_benchmark_time,
            report.summary.successful_models,
            report.info.total_models
        );
        Ok(report)
    }

    /// Benchmark one model. Failures are recorded in the result, never
    /// returned.
    pub async fn benchmark_model(
        &self,
        session: &mut Session,
        name: &str,
        questions: &[String],
    ) -> ModelResult {
        let model_info = self.catalog.model_info(name).await.unwrap_or_else(|e| {
            debug!("Model info unavailable for {}: {}", name, e);
            None
        });
        let model_category = categorize(
            name,
            model_info.as_ref().map(|m| m.parameter_size.as_str()),
        );
        match &model_category.estimated_params {
            Some(params) => info!(
                "  {} ({}) | {}",
                model_category.category, model_category.description, params
            ),
            None => info!(
                "  {} ({})",
                model_category.category, model_category.description
            ),
        }

        let mut result = ModelResult {
            model_name: name.to_string(),
            model_info,
            model_category,
            load_time: 0.0,
            total_inference_time: 0.0,
            questions_results: Vec::with_capacity(questions.len()),
            errors: Vec::new(),
            benchmark_timestamp: iso_timestamp(&Local::now()),
        };

        let store = self.manager.dispatcher().store();
        let previous = session
            .loaded_model()
            .map(str::to_string)
            .or_else(|| store.current_loaded_model().ok().flatten());
        if let Some(previous) = previous.filter(|p| p != name) {
            debug!("Unloading current model: {}", previous);
            self.manager.unload_model(session, &previous).await;
            sleep(self.manager.settle_delay()).await;
        }

        let load_started = Instant::now();
        let load = self.manager.load_model(session, name).await;
        if !load.success {
            error!("  {}", load.message);
            result.errors.push(load.message);
            return result;
        }
        result.load_time = round3(load_started.elapsed().as_secs_f64());
        info!("  Loaded in {:.3}s", result.load_time);

        let system = store.system_prompt(None);
        let mut total = 0.0;
        for (i, question) in questions.iter().enumerate() {
            let n = i + 1;
            info!("  Q{}/{}: {}", n, questions.len(), preview(question, 50));

            let request = PromptRequest::new(name, question.as_str()).system(Some(system.as_str()));
            let started = Instant::now();
            let response = self.manager.dispatcher().ask(&request).await;
            let inference_time = round3(started.elapsed().as_secs_f64());
            total += inference_time;

            let mut question_result = QuestionResult {
                question: question.clone(),
                answer: String::new(),
                inference_time,
                error: None,
            };
            match response {
                Ok(text) => {
                    debug!("Raw response for question {}: {}", n, preview(&text, 200));
                    question_result.answer = clean_benchmark_answer(&text);
                    info!("     {:.3}s", inference_time);
                }
                Err(e) => {
                    let message = e.to_string();
                    warn!("     Error response for question {}: {}", n, e.detail());
                    result.errors.push(format!("Question {}: {}", n, message));
                    question_result.error = Some(message);
                }
            }
            result.questions_results.push(question_result);
        }

        result.total_inference_time = round3(total);
        if !questions.is_empty() {
            info!(
                "  Total: {:.3}s | Avg: {:.3}s",
                result.total_inference_time,
                result.total_inference_time / questions.len() as f64
            );
        }
        result
    }
}
