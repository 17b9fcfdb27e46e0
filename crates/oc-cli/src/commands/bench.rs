//! Model benchmark command.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use clap::Args;
use miette::miette;
use oc_core::bench::{
    default_log_path, default_output_path, default_questions, load_questions, BenchReport,
    BenchRunner, ModelSelection, SizeCategory,
};
use oc_core::lifecycle::NoPrompt;
use oc_core::Session;

use super::wizard::{self, BenchPlan};
use crate::app::App;
use crate::logging;

#[derive(Args, Debug, Default)]
pub(crate) struct BenchArgs {
    /// Output JSON file (default: benchmark/results/benchmark-<timestamp>.json)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Log file (default: benchmark/logs/benchmark-<timestamp>.log)
    #[arg(short, long)]
    pub log_file: Option<PathBuf>,

    /// Only show warnings and errors on the console
    #[arg(short, long)]
    pub quiet: bool,

    /// JSON file with an array of questions
    #[arg(short, long)]
    pub custom_questions: Option<PathBuf>,

    /// Only benchmark models of this size category
    #[arg(long, value_parser = parse_category)]
    pub category: Option<SizeCategory>,

    /// List size categories and exit
    #[arg(long)]
    pub list_categories: bool,

    /// Guided setup
    #[arg(short, long)]
    pub interactive: bool,
}

fn parse_category(raw: &str) -> Result<SizeCategory, String> {
    raw.parse()
}

impl BenchArgs {
    /// No option given; the wizard takes over.
    fn is_bare(&self) -> bool {
        self.output.is_none()
            && self.log_file.is_none()
            && !self.quiet
            && self.custom_questions.is_none()
            && self.category.is_none()
    }

    fn into_plan(self, log_default: PathBuf) -> BenchPlan {
        BenchPlan {
            selection: self
                .category
                .map_or(ModelSelection::All, ModelSelection::Category),
            questions_file: self.custom_questions,
            output: self.output,
            log_file: Some(self.log_file.unwrap_or(log_default)),
            quiet: self.quiet,
        }
    }
}

pub(crate) async fn run(app: &App, args: BenchArgs, verbose: bool) -> miette::Result<()> {
    if args.list_categories {
        print_categories();
        return Ok(());
    }

    let now = Local::now();
    let plan = if args.interactive || args.is_bare() {
        match wizard::run(app, &now).await? {
            Some(plan) => plan,
            None => {
                println!("Benchmark cancelled.");
                return Ok(());
            }
        }
    } else {
        args.into_plan(default_log_path(&now))
    };

    if let Some(dir) = plan.log_file.as_deref().and_then(Path::parent) {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)
                .map_err(|e| miette!("Failed to create {}: {}", dir.display(), e))?;
        }
    }
    logging::init_bench(verbose, plan.quiet, plan.log_file.as_deref())?;

    let questions = match &plan.questions_file {
        Some(path) => load_questions(path).map_err(|e| miette!("{}", e))?,
        None => default_questions(),
    };

    let runner = BenchRunner::new(app.manager(Arc::new(NoPrompt)), app.catalog());
    let mut session = Session::new();
    let cancel = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    let report = runner
        .run(
            &mut session,
            &questions,
            &plan.selection,
            plan.log_file.as_deref(),
            cancel,
        )
        .await
        .map_err(|e| miette!("{}", e))?;

    let output = plan.output.unwrap_or_else(|| default_output_path(&now));
    let files = report.write(&output).map_err(|e| miette!("{}", e))?;

    print_report(&report, &files);
    Ok(())
}

fn print_categories() {
    println!("Model size categories:");
    for category in SizeCategory::ALL {
        println!("  {:8} {}", category.as_str(), category.description());
    }
}

fn print_report(report: &BenchReport, files: &[PathBuf]) {
    let summary = &report.summary;

    println!("\n{}", "=".repeat(60));
    if report.interrupted {
        println!("BENCHMARK INTERRUPTED - partial results");
    } else {
        println!("BENCHMARK COMPLETE");
    }
    println!("{}", "=".repeat(60));
    println!("Total time:        {:.3}s", summary.total_benchmark_time);
    println!(
        "Models:            {} successful, {} failed",
        summary.successful_models, summary.failed_models
    );
    println!("Average load time: {:.3}s", summary.stats.average_load_time);
    if let Some(fastest) = &summary.stats.fastest_model {
        println!(
            "Fastest model:     {} ({:.3}s/question)",
            fastest.name, fastest.average_per_question
        );
    }
    if let Some(slowest) = &summary.stats.slowest_model {
        println!(
            "Slowest model:     {} ({:.3}s/question)",
            slowest.name, slowest.average_per_question
        );
    }

    for category in SizeCategory::ALL {
        let Some(stats) = report.category_stats(category) else {
            continue;
        };
        if stats.total_models == 0 {
            continue;
        }
        println!(
            "\n{} ({}): {}/{} successful",
            category.as_str().to_uppercase(),
            stats.description,
            stats.successful_models,
            stats.total_models
        );
        if let Some(fastest) = &stats.stats.fastest_model {
            println!("  Fastest: {} ({:.3}s total)", fastest.name, fastest.total_inference_time);
        }
        if let Some(slowest) = &stats.stats.slowest_model {
            println!("  Slowest: {} ({:.3}s total)", slowest.name, slowest.total_inference_time);
        }
    }

    println!("\nFiles written:");
    for file in files {
        println!("  {}", file.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: BenchArgs,
    }

    #[test]
    fn test_flags_build_plan() {
        let harness =
            Harness::try_parse_from(["bench", "--category", "Medium", "-q", "-o", "out.json"])
                .unwrap();
        assert!(!harness.args.is_bare());
        let plan = harness.args.into_plan(PathBuf::from("default.log"));
        assert_eq!(plan.selection, ModelSelection::Category(SizeCategory::Medium));
        assert_eq!(plan.output, Some(PathBuf::from("out.json")));
        assert_eq!(plan.log_file, Some(PathBuf::from("default.log")));
        assert!(plan.quiet);
    }

    #[test]
    fn test_bad_category_rejected() {
        assert!(Harness::try_parse_from(["bench", "--category", "huge"]).is_err());
        assert!(Harness::try_parse_from(["bench"]).unwrap().args.is_bare());
    }
}
