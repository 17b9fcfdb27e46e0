//! Installed model listing.

use crate::ansi::{paint, CYAN};
use crate::app::App;

pub(crate) async fn run(app: &App, all: bool) -> miette::Result<()> {
    let catalog = app.catalog();
    let models = catalog
        .list_annotated(!all)
        .await
        .map_err(|e| miette::miette!("Failed to list models: {}", e))?;

    if models.is_empty() {
        println!("No models installed.");
        println!();
        println!("To install a model, run:");
        println!("  ollama pull llama3");
        return Ok(());
    }

    println!("Installed models:");
    for (i, (model, caps)) in models.iter().enumerate() {
        println!(
            "  {:2}. {} - Parameters: {} | {:.2} GB {}",
            i + 1,
            model.name,
            model.parameter_size_or_unknown(),
            model.size_gb(),
            paint(&caps.to_string(), CYAN),
        );
    }

    if !all {
        let hidden = catalog.blacklist();
        if !hidden.is_empty() {
            println!();
            println!("Blacklisted (hidden): {}", hidden.join(", "));
        }
    }

    Ok(())
}
