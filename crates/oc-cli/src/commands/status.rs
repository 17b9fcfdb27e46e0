//! Server status.

use crate::ansi::{paint, GREEN, RED};
use crate::app::App;

pub(crate) async fn run(app: &App) -> miette::Result<()> {
    println!("Ollama Consumer Status");
    println!("======================");
    println!();
    println!("Server:       {}", app.settings.base_url);

    match app.api.version().await {
        Ok(version) => {
            println!("  Running:    {} (version {})", paint("yes", GREEN), version);
        }
        Err(e) => {
            println!("  Running:    {} ({})", paint("no", RED), e);
            return Ok(());
        }
    }

    let recorded = app
        .store
        .current_loaded_model()
        .map_err(|e| miette::miette!("Failed to read {}: {}", app.store.path().display(), e))?;
    println!("Config:       {}", app.store.path().display());
    println!("  Recorded model: {}", recorded.as_deref().unwrap_or("(none)"));

    let running = app
        .api
        .running_models()
        .await
        .map_err(|e| miette::miette!("Failed to list running models: {}", e))?;
    println!();
    if running.is_empty() {
        println!("No models resident in memory.");
    } else {
        println!("Resident models:");
        for model in running {
            println!("  - {} (VRAM {} bytes)", model.name, model.size_vram);
        }
    }

    Ok(())
}
