//! Interactive chat shell.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use oc_core::content::{
    list_images, list_texts, load_text, prepare_image, prompt_with_text, resolve_in_folder,
    AttachmentKind, SpecialInput,
};
use oc_core::export::Interaction;
use oc_core::lifecycle::RecoveryOutcome;
use oc_core::presets::{self, preset_description, preset_label, PresetChoice, DEFAULT_PRESET};
use oc_core::{
    Catalog, CapabilitySet, ContentType, MarkdownExporter, ModelManager, PromptRequest, Session,
};
use tracing::warn;

use crate::ansi::{paint, render_response, CYAN, GREEN, RED, YELLOW};
use crate::app::App;
use crate::input::{LineReader, TerminalPrompt};

/// One line of shell input.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ShellCommand {
    Empty,
    Exit,
    SwitchModel,
    PresetMenu,
    ListPresets,
    Status,
    Help,
    ListImages,
    ListTexts,
    Attach(SpecialInput),
    Prompt(String),
}

impl ShellCommand {
    fn parse(line: &str) -> Self {
        let line = line.trim();
        match line.to_lowercase().as_str() {
            "" => ShellCommand::Empty,
            "exit" | "quit" | "q" => ShellCommand::Exit,
            "s" | "model" => ShellCommand::SwitchModel,
            "preset" => ShellCommand::PresetMenu,
            "presets" => ShellCommand::ListPresets,
            "status" => ShellCommand::Status,
            "help" => ShellCommand::Help,
            "images" => ShellCommand::ListImages,
            "texts" => ShellCommand::ListTexts,
            _ => match SpecialInput::parse(line) {
                Some(input) => ShellCommand::Attach(input),
                None => ShellCommand::Prompt(line.to_string()),
            },
        }
    }
}

fn spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .expect("Invalid progress bar template"),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

struct Shell<'a> {
    app: &'a App,
    manager: ModelManager,
    catalog: Catalog,
    exporter: MarkdownExporter,
    reader: LineReader,
    session: Session,
    model: Option<String>,
    caps: CapabilitySet,
}

/// Run the shell until the user exits.
pub(crate) async fn run(app: &App) -> miette::Result<()> {
    println!("\nOllama Chat Interface:");

    let mut shell = Shell {
        app,
        manager: app.manager(Arc::new(TerminalPrompt)),
        catalog: app.catalog(),
        exporter: app.exporter(),
        reader: LineReader::new(),
        session: Session::new(),
        model: None,
        caps: CapabilitySet::new(),
    };

    if !shell.ensure_server().await {
        return Err(miette::miette!("Ollama service is still not running. Exiting..."));
    }
    shell.manager.reconcile(&mut shell.session).await;

    if !shell.select_model().await {
        println!("No model selected. Exiting...");
        return Ok(());
    }

    shell.run_loop().await;
    shell.reader.save_history();
    Ok(())
}

impl Shell<'_> {
    async fn ensure_server(&self) -> bool {
        if self.manager.is_server_running().await {
            return true;
        }
        println!("{}", paint("Ollama service is not running!", YELLOW));
        println!("Attempting to start Ollama service...");

        let outcome = self.manager.restart_server().await;
        if outcome.is_success() {
            println!("{}", paint("Ollama service is now running!", GREEN));
            true
        } else {
            println!("{}", paint(&outcome.to_result().message, RED));
            false
        }
    }

    /// Pick and load a model. Returns whether a model is active afterwards.
    async fn select_model(&mut self) -> bool {
        loop {
            let models = match self.catalog.list_annotated(true).await {
                Ok(models) => models,
                Err(e) => {
                    println!("{}", paint(&format!("Error retrieving models: {}", e), RED));
                    return self.model.is_some();
                }
            };
            if models.is_empty() {
                println!("No models available. Install one with 'ollama pull <model>'.");
                return self.model.is_some();
            }

            println!("\nAvailable Models:");
            for (i, (model, caps)) in models.iter().enumerate() {
                println!(
                    "{}. {} - Parameters: {} {}",
                    i + 1,
                    model.name,
                    model.parameter_size_or_unknown(),
                    paint(&caps.to_string(), CYAN)
                );
            }
            let blacklist = self.catalog.blacklist();
            if !blacklist.is_empty() {
                println!(
                    "{}",
                    paint(
                        &format!("({} blacklisted model(s) hidden)", blacklist.len()),
                        YELLOW
                    )
                );
            }

            let Some(choice) = self.reader.number("\nSelect a model by number: ", models.len())
            else {
                println!("\nSelection cancelled.");
                return self.model.is_some();
            };
            let Some(n) = choice else {
                if self.model.is_some() {
                    return true;
                }
                continue;
            };

            let (model, caps) = models[n - 1].clone();
            println!("Loading model: {} ...", model.name);
            let report = self.manager.request_load(&mut self.session, &model.name).await;
            if let Some(outcome) = &report.recovery {
                println!("Recovery: {}", outcome.to_result().message);
            }

            if report.success() {
                println!("{}", paint(&format!("Model {} loaded successfully.", model.name), GREEN));
                self.model = Some(model.name);
                self.caps = caps;
                self.show_capabilities();
                return true;
            }

            println!("{}", paint(&format!("Failed to load model: {}", report.result.message), RED));
            if report.recovery == Some(RecoveryOutcome::UserQuit) {
                return self.model.is_some();
            }
            match self.reader.yes_no("Would you like to try another model?", false) {
                Some(true) => continue,
                _ => return self.model.is_some(),
            }
        }
    }

    fn show_capabilities(&self) {
        let Some(model) = &self.model else {
            return;
        };
        println!("Using model: {} {}", model, paint(&self.caps.to_string(), CYAN));
        if self.caps.supports_vision() {
            println!(
                "{}",
                paint(
                    "This model supports image input! Use 'img:path/to/image.jpg your prompt' to include images.",
                    CYAN
                )
            );
        }
        if self.caps.supports_reasoning() {
            println!(
                "{}",
                paint(
                    "This model supports thinking mode! It may show reasoning in <think> tags.",
                    CYAN
                )
            );
        }
        println!("Type 'help' for commands.");
    }

    async fn run_loop(&mut self) {
        loop {
            println!(
                "{}",
                paint("Enter your prompt (or 'exit' to quit, 's' to select new model):", GREEN)
            );
            let Some(line) = self.reader.read_command("> ") else {
                break;
            };

            match ShellCommand::parse(&line) {
                ShellCommand::Empty => {}
                ShellCommand::Exit => break,
                ShellCommand::SwitchModel => {
                    self.select_model().await;
                }
                ShellCommand::PresetMenu => self.preset_menu(),
                ShellCommand::ListPresets => self.list_presets(),
                ShellCommand::Status => self.status().await,
                ShellCommand::Help => print_help(),
                ShellCommand::ListImages => {
                    print_folder("images", &self.app.settings.images_dir(), list_images)
                }
                ShellCommand::ListTexts => {
                    print_folder("texts", &self.app.settings.texts_dir(), list_texts)
                }
                ShellCommand::Attach(input) => self.attach(input).await,
                ShellCommand::Prompt(prompt) => self.ask(prompt, None, None).await,
            }
        }
    }

    fn pick_file(&mut self, folder: &Path, kind: AttachmentKind) -> Option<PathBuf> {
        let (label, files) = match kind {
            AttachmentKind::Image => ("images", list_images(folder)),
            AttachmentKind::Text => ("texts", list_texts(folder)),
        };
        if files.is_empty() {
            println!("{}", paint(&format!("No files found in the '{}' folder.", label), YELLOW));
            return None;
        }

        println!("{}", paint(&format!("\nAvailable files in '{}' folder:", label), CYAN));
        for (i, file) in files.iter().enumerate() {
            println!("{}. {}", i + 1, file);
        }
        println!("0. Cancel");

        let choice = self.reader.number("\nSelect a file by number: ", files.len())??;
        let name = &files[choice - 1];
        println!("{}", paint(&format!("Selected: {}", name), CYAN));
        Some(folder.join(name))
    }

    async fn attach(&mut self, input: SpecialInput) {
        let prompt = input.prompt_or_default().to_string();
        match input.kind {
            AttachmentKind::Image => {
                let folder = self.app.settings.images_dir();
                let path = match &input.path {
                    Some(raw) => resolve_in_folder(raw, &folder),
                    None => match self.pick_file(&folder, AttachmentKind::Image) {
                        Some(path) => path,
                        None => return,
                    },
                };
                let image = match prepare_image(&path.to_string_lossy()) {
                    Ok(image) => image,
                    Err(e) => {
                        println!("{}", paint(&format!("Failed to load image: {}", e), RED));
                        return;
                    }
                };
                println!("{}", paint(&format!("Image loaded: {}", path.display()), CYAN));
                self.ask(prompt, Some(image), Some(ContentType::Image)).await;
            }
            AttachmentKind::Text => {
                let folder = self.app.settings.texts_dir();
                let path = match &input.path {
                    Some(raw) => resolve_in_folder(raw, &folder),
                    None => match self.pick_file(&folder, AttachmentKind::Text) {
                        Some(path) => path,
                        None => return,
                    },
                };
                let attachment = match load_text(&path) {
                    Ok(attachment) => attachment,
                    Err(e) => {
                        println!("{}", paint(&format!("Failed to load text: {}", e), RED));
                        return;
                    }
                };
                let kind = attachment
                    .content_type
                    .map_or("text".to_string(), |t| t.to_string());
                println!(
                    "{}",
                    paint(
                        &format!(
                            "Text loaded: {} ({} chars, {})",
                            path.display(),
                            attachment.content.chars().count(),
                            kind
                        ),
                        CYAN
                    )
                );
                let combined = prompt_with_text(&prompt, &attachment.content);
                self.ask(combined, None, attachment.content_type).await;
            }
        }
    }

    async fn ask(&mut self, prompt: String, image: Option<String>, content_type: Option<ContentType>) {
        let Some(model) = self.model.clone() else {
            return;
        };
        let store = &self.app.store;

        let choice = presets::auto_apply(
            store,
            &mut self.session,
            content_type,
            &self.caps,
            Some(prompt.as_str()),
        );
        match choice {
            PresetChoice::Override(name) => {
                println!("{}", paint(&format!("Using preset override: {}", preset_label(&name)), CYAN))
            }
            PresetChoice::Applied(name) => println!(
                "{}",
                paint(
                    &format!("Auto-selected preset: {} ({})", preset_label(name), preset_description(name)),
                    CYAN
                )
            ),
            PresetChoice::Unchanged(_) => {}
        }

        println!("{}", paint(&format!("User prompt: {}", prompt), GREEN));
        if image.is_some() {
            println!("{}", paint("Image included in request", CYAN));
        }

        let system = store.system_prompt(content_type);
        let request = PromptRequest::new(model.as_str(), prompt.as_str())
            .system(Some(system.as_str()))
            .image(image.clone());

        let pb = spinner(format!("Waiting for {}...", model));
        let response = self.manager.dispatcher().ask(&request).await;
        pb.finish_and_clear();

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                println!("{}", paint(&e.detail(), RED));
                if e.is_server_error() {
                    println!(
                        "{}",
                        paint("The server reported an internal error; use 's' to reload the model.", YELLOW)
                    );
                }
                return;
            }
        };

        println!("\nModel response:");
        println!("{}", render_response(&response));
        println!("\n{}\n", "-".repeat(50));

        let interaction = Interaction {
            prompt: &prompt,
            response: &response,
            model: &model,
            has_image: image.is_some(),
            content_type,
            system_prompt: Some(&system),
        };
        let pb = spinner("Saving response...".to_string());
        let saved = self.exporter.save(&interaction).await;
        pb.finish_and_clear();
        match saved {
            Ok(path) => println!("{}", paint(&format!("Saved to {}", path.display()), CYAN)),
            Err(e) => warn!("Could not save response: {}", e),
        }
    }

    fn list_presets(&self) {
        let presets = self.app.store.presets();
        if presets.is_empty() {
            println!("No presets configured.");
            return;
        }
        let active = self.session.active_preset().unwrap_or(DEFAULT_PRESET);
        println!("{}", paint("\nAvailable presets:", CYAN));
        for name in presets.keys() {
            let marker = if name == active { "✓" } else { " " };
            println!("  {} {} - {}", marker, name, preset_description(name));
        }
    }

    fn preset_menu(&mut self) {
        let names: Vec<String> = self.app.store.presets().keys().cloned().collect();
        let current = self
            .session
            .active_preset()
            .unwrap_or(DEFAULT_PRESET)
            .to_string();

        println!("{}", paint(&format!("\nCurrent preset: {}", current), YELLOW));
        if let Some(name) = self.session.preset_override() {
            println!("Override in force: {}", name);
        }
        println!("Available presets:");
        for (i, name) in names.iter().enumerate() {
            let marker = if *name == current { "✓" } else { " " };
            println!("  {} {}. {} - {}", marker, i + 1, name, preset_description(name));
        }
        println!("  0. Keep current preset (no override)");
        println!("{}", paint("  c. Clear override (return to auto-detection)", CYAN));

        loop {
            let Some(answer) = self
                .reader
                .read(&paint("\nSelect preset (0=keep, c=clear, number=override): ", GREEN))
            else {
                println!("\nKeeping current preset");
                return;
            };
            match answer.trim().to_lowercase().as_str() {
                "" | "0" | "n" | "no" => return,
                "c" | "clear" => {
                    self.session.clear_preset_override();
                    println!("{}", paint("Override cleared; auto-detection resumes", GREEN));
                    return;
                }
                other => match other.parse::<usize>() {
                    Ok(n) if (1..=names.len()).contains(&n) => {
                        let name = &names[n - 1];
                        match presets::set_override(&self.app.store, &mut self.session, name) {
                            Ok(()) => println!(
                                "{}",
                                paint(&format!("Applied '{}' preset with override", name), GREEN)
                            ),
                            Err(e) => {
                                println!("{}", paint(&format!("Failed to apply preset: {}", e), RED))
                            }
                        }
                        return;
                    }
                    Ok(_) => println!(
                        "Please enter a number between 0 and {}, or 'c' to clear",
                        names.len()
                    ),
                    Err(_) => println!(
                        "Please enter a valid number, 'c' to clear, or press Enter to keep current"
                    ),
                },
            }
        }
    }

    async fn status(&self) {
        let resident: Vec<String> = self
            .manager
            .running_models()
            .await
            .into_iter()
            .map(|m| m.name)
            .collect();

        println!("{}", paint("\nSession status:", CYAN));
        println!("  Selected model:  {}", self.model.as_deref().unwrap_or("(none)"));
        println!("  Load state:      {}", self.session.load_state());
        if resident.is_empty() {
            println!("  Resident models: (none)");
        } else {
            println!("  Resident models: {}", resident.join(", "));
        }
        println!(
            "  Active preset:   {}",
            self.session.active_preset().unwrap_or(DEFAULT_PRESET)
        );
        println!(
            "  Override:        {}",
            self.session.preset_override().unwrap_or("(auto-detection)")
        );
        println!("  Capabilities:    {}", self.caps);
    }
}

fn print_folder(label: &str, folder: &Path, list: fn(&Path) -> Vec<String>) {
    let files = list(folder);
    if files.is_empty() {
        println!("{}", paint(&format!("No files found in the '{}' folder.", label), YELLOW));
        return;
    }
    println!("{}", paint(&format!("\nFiles in '{}' ({}):", label, folder.display()), CYAN));
    for file in files {
        println!("  - {}", file);
    }
}

fn print_help() {
    println!("{}", paint("\nCommands:", CYAN));
    println!("  exit, quit, q   Leave the shell");
    println!("  s, model        Select another model");
    println!("  preset          Override the preset (or clear the override)");
    println!("  presets         List configured presets");
    println!("  status          Show loaded model, preset and override");
    println!("  images, texts   List files in the content folders");
    println!("  help            Show this help");

    println!("{}", paint("\nImage Input Options:", CYAN));
    println!("  1. 'img:' - Choose from images folder");
    println!("  2. 'img:filename.jpg your prompt' - Use specific file from images folder");
    println!("  3. 'img:/full/path/to/image.jpg your prompt' - Use full file path");
    println!("  4. Type 'images' to see available images in folder");

    println!("{}", paint("\nText Input Options:", CYAN));
    println!("  1. 'text:' - Choose from texts folder");
    println!("  2. 'text:filename.txt your prompt' - Use specific file from texts folder");
    println!("  3. 'text:/full/path/to/file.txt your prompt' - Use full file path");
    println!("  4. Type 'texts' to see available text files in folder");
    println!("{}", paint("  Automatic System Prompt Selection:", YELLOW));
    println!("    Code files (.py, .js, .java, etc.) -> Code Analysis prompt");
    println!("    Subtitle files (.srt, .vtt, etc.) -> Video Transcript Analysis prompt");
    println!("    Other text files -> Default prompt");
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(ShellCommand::parse("  "), ShellCommand::Empty);
        assert_eq!(ShellCommand::parse("QUIT"), ShellCommand::Exit);
        assert_eq!(ShellCommand::parse("s"), ShellCommand::SwitchModel);
        assert_eq!(ShellCommand::parse("model"), ShellCommand::SwitchModel);
        assert_eq!(ShellCommand::parse("preset"), ShellCommand::PresetMenu);
        assert_eq!(ShellCommand::parse("presets"), ShellCommand::ListPresets);
        assert_eq!(ShellCommand::parse("images"), ShellCommand::ListImages);
    }

    #[test]
    fn test_parse_prompts_and_attachments() {
        assert_eq!(
            ShellCommand::parse(" Why is the Sky blue? "),
            ShellCommand::Prompt("Why is the Sky blue?".into())
        );
        match ShellCommand::parse("img:cat.png What is this?") {
            ShellCommand::Attach(input) => {
                assert_eq!(input.kind, AttachmentKind::Image);
                assert_eq!(input.path.as_deref(), Some("cat.png"));
                assert_eq!(input.prompt.as_deref(), Some("What is this?"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(ShellCommand::parse("text:"), ShellCommand::Attach(_)));
    }
}
