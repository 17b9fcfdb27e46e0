//! Guided benchmark setup.

use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::{DateTime, Local};
use miette::miette;
use oc_core::bench::{
    categorize, default_log_path, default_output_path, load_questions, ModelSelection,
    SizeCategory, DEFAULT_QUESTIONS,
};
use oc_core::ModelDescriptor;

use crate::ansi::{paint, CYAN, GREEN, YELLOW};
use crate::app::App;
use crate::input::LineReader;

/// Everything a benchmark run needs, gathered from flags or the wizard.
#[derive(Debug, Clone, Default)]
pub(crate) struct BenchPlan {
    pub selection: ModelSelection,
    pub questions_file: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    pub quiet: bool,
}

/// Parse `"1 3 5-7"` or `"1-3,5"` into sorted, distinct 1-based indices.
pub(crate) fn parse_selection(input: &str, max: usize) -> Result<Vec<usize>, String> {
    let mut picked = BTreeSet::new();
    for token in input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
    {
        let (start, end) = match token.split_once('-') {
            Some((start, end)) => (parse_index(start, max)?, parse_index(end, max)?),
            None => {
                let n = parse_index(token, max)?;
                (n, n)
            }
        };
        if start > end {
            return Err(format!("Invalid range '{}'", token));
        }
        picked.extend(start..=end);
    }
    if picked.is_empty() {
        return Err("No models selected".to_string());
    }
    Ok(picked.into_iter().collect())
}

fn parse_index(raw: &str, max: usize) -> Result<usize, String> {
    let n: usize = raw
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a number", raw.trim()))?;
    if (1..=max).contains(&n) {
        Ok(n)
    } else {
        Err(format!("{} is out of range (1-{})", n, max))
    }
}

/// Run the wizard. `Ok(None)` when the user cancels.
pub(crate) async fn run(app: &App, now: &DateTime<Local>) -> miette::Result<Option<BenchPlan>> {
    let mut reader = LineReader::new();

    println!("{}", paint("\nOllama Benchmark - Interactive Setup", CYAN));
    println!("{}", "=".repeat(40));

    let models = app
        .catalog()
        .list_models(true)
        .await
        .map_err(|e| miette!("Could not list models: {}", e))?;
    if models.is_empty() {
        return Err(miette!("No models found. Install models with 'ollama pull <model>'."));
    }

    let Some(selection) = choose_models(&mut reader, &models) else {
        return Ok(None);
    };

    let Some(questions_file) = choose_questions(&mut reader) else {
        return Ok(None);
    };

    let default_output = default_output_path(now);
    let Some(output) = reader.read(&format!(
        "\nOutput file (Enter for {}): ",
        default_output.display()
    )) else {
        return Ok(None);
    };
    let output = Some(output.trim())
        .filter(|o| !o.is_empty())
        .map(PathBuf::from);

    let Some(save_logs) = reader.yes_no("Save detailed logs to a file?", true) else {
        return Ok(None);
    };
    let log_file = if save_logs {
        let default_log = default_log_path(now);
        let Some(path) = reader.read(&format!("Log file (Enter for {}): ", default_log.display()))
        else {
            return Ok(None);
        };
        Some(
            Some(path.trim())
                .filter(|p| !p.is_empty())
                .map_or(default_log, PathBuf::from),
        )
    } else {
        None
    };

    let Some(quiet) = reader.yes_no("Quiet mode (only warnings and errors on the console)?", false)
    else {
        return Ok(None);
    };

    let plan = BenchPlan {
        selection,
        questions_file,
        output,
        log_file,
        quiet,
    };

    print_plan(&plan, &default_output);
    match reader.yes_no("Start benchmark?", true) {
        Some(true) => Ok(Some(plan)),
        _ => Ok(None),
    }
}

fn choose_models(reader: &mut LineReader, models: &[ModelDescriptor]) -> Option<ModelSelection> {
    println!("\nModel selection:");
    println!("  1. All models ({})", models.len());
    println!("  2. Models of one size category");
    println!("  3. Pick models by hand");

    loop {
        match reader.choice("Choose", &["1", "2", "3"], "1")?.as_str() {
            "2" => {
                if let Some(selection) = choose_category(reader, models)? {
                    return Some(selection);
                }
            }
            "3" => {
                if let Some(selection) = choose_manual(reader, models)? {
                    return Some(selection);
                }
            }
            _ => return Some(ModelSelection::All),
        }
    }
}

/// `Some(None)` sends the user back to the selection menu.
fn choose_category(
    reader: &mut LineReader,
    models: &[ModelDescriptor],
) -> Option<Option<ModelSelection>> {
    let counts: Vec<(SizeCategory, usize)> = SizeCategory::ALL
        .into_iter()
        .map(|category| {
            let count = models
                .iter()
                .filter(|m| {
                    categorize(&m.name, Some(m.parameter_size.as_str())).category == category
                })
                .count();
            (category, count)
        })
        .collect();

    println!("\nSize categories:");
    for (i, (category, count)) in counts.iter().enumerate() {
        println!(
            "  {}. {} - {} ({} models)",
            i + 1,
            category,
            category.description(),
            count
        );
    }

    let Some(n) = reader.number("Select a category (0 to go back): ", counts.len())? else {
        return Some(None);
    };
    let (category, count) = counts[n - 1];
    if count == 0 {
        println!("{}", paint(&format!("No models in the {} category.", category), YELLOW));
        return Some(None);
    }
    Some(Some(ModelSelection::Category(category)))
}

fn choose_manual(
    reader: &mut LineReader,
    models: &[ModelDescriptor],
) -> Option<Option<ModelSelection>> {
    println!("\nAvailable models:");
    for (i, model) in models.iter().enumerate() {
        let info = categorize(&model.name, Some(model.parameter_size.as_str()));
        println!(
            "  {:2}. {} ({}, {})",
            i + 1,
            model.name,
            model.parameter_size_or_unknown(),
            info.category
        );
    }

    let mode = reader.choice("[a]ll, [s]elect or [e]xclude", &["a", "s", "e"], "s")?;
    if mode == "a" {
        return Some(Some(ModelSelection::Models(
            models.iter().map(|m| m.name.clone()).collect(),
        )));
    }

    loop {
        let line = reader.read("Model numbers (e.g. 1 3 5-7, empty to go back): ")?;
        if line.trim().is_empty() {
            return Some(None);
        }
        let picked = match parse_selection(&line, models.len()) {
            Ok(picked) => picked,
            Err(e) => {
                println!("{}", paint(&e, YELLOW));
                continue;
            }
        };

        let names: Vec<String> = models
            .iter()
            .enumerate()
            .filter(|(i, _)| picked.contains(&(i + 1)) == (mode == "s"))
            .map(|(_, m)| m.name.clone())
            .collect();
        if names.is_empty() {
            println!("{}", paint("That leaves no models to benchmark.", YELLOW));
            continue;
        }

        println!("\nSelected {} model(s):", names.len());
        for name in &names {
            println!("  - {}", name);
        }
        if reader.yes_no("Use this selection?", true)? {
            return Some(Some(ModelSelection::Models(names)));
        }
    }
}

/// `Some(None)` means the built-in questions.
fn choose_questions(reader: &mut LineReader) -> Option<Option<PathBuf>> {
    println!("\nQuestions:");
    println!("  Built-in set of {} questions, e.g.:", DEFAULT_QUESTIONS.len());
    for question in DEFAULT_QUESTIONS.iter().take(3) {
        println!("    - {}", question);
    }

    if !reader.yes_no("Use a custom questions file (JSON array)?", false)? {
        return Some(None);
    }
    loop {
        let line = reader.read("Questions file (empty for built-in): ")?;
        let path = line.trim();
        if path.is_empty() {
            return Some(None);
        }
        let path = PathBuf::from(path);
        match load_questions(&path) {
            Ok(questions) => {
                println!("{}", paint(&format!("Loaded {} questions", questions.len()), GREEN));
                return Some(Some(path));
            }
            Err(e) => println!("{}", paint(&e.to_string(), YELLOW)),
        }
    }
}

fn print_plan(plan: &BenchPlan, default_output: &std::path::Path) {
    let models = match &plan.selection {
        ModelSelection::All => "all models".to_string(),
        ModelSelection::Category(category) => format!("{} models", category),
        ModelSelection::Models(names) => format!("{} selected model(s)", names.len()),
    };
    let questions = plan
        .questions_file
        .as_ref()
        .map_or("built-in".to_string(), |p| p.display().to_string());
    let output = plan.output.as_deref().unwrap_or(default_output);
    let logs = plan
        .log_file
        .as_ref()
        .map_or("disabled".to_string(), |p| p.display().to_string());

    println!("{}", paint("\nBenchmark plan:", CYAN));
    println!("  Models:    {}", models);
    println!("  Questions: {}", questions);
    println!("  Output:    {}", output.display());
    println!("  Log file:  {}", logs);
    println!("  Quiet:     {}", if plan.quiet { "yes" } else { "no" });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_selection_ranges() {
        assert_eq!(parse_selection("1 3 5-7", 10), Ok(vec![1, 3, 5, 6, 7]));
        assert_eq!(parse_selection("1-3,5", 5), Ok(vec![1, 2, 3, 5]));
        assert_eq!(parse_selection(" 2, 2 1 ", 3), Ok(vec![1, 2]));
    }

    #[test]
    fn test_parse_selection_errors() {
        assert!(parse_selection("", 3).is_err());
        assert!(parse_selection("0", 3).is_err());
        assert!(parse_selection("4", 3).is_err());
        assert!(parse_selection("3-1", 3).is_err());
        assert!(parse_selection("two", 3).is_err());
    }
}
