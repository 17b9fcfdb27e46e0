//! Preset listing.

use oc_core::presets::preset_description;

use crate::app::App;

pub(crate) fn run(app: &App) -> miette::Result<()> {
    let presets = app.store.presets();
    if presets.is_empty() {
        println!("No presets configured in {}.", app.store.path().display());
        println!("See config.example.ini for the [llm_presets] section.");
        return Ok(());
    }

    println!("Available presets:");
    for (name, params) in &presets {
        println!("  - {}: {}", name, preset_description(name));
        let params = serde_json::to_string(params)
            .map_err(|e| miette::miette!("Failed to render preset '{}': {}", name, e))?;
        println!("      {}", params);
    }

    Ok(())
}
