//! One-shot model unload.

use std::sync::Arc;

use oc_core::lifecycle::NoPrompt;
use oc_core::Session;

use crate::app::App;

pub(crate) async fn run(app: &App, model: &str) -> miette::Result<()> {
    let manager = app.manager(Arc::new(NoPrompt));
    let mut session = Session::new();
    let result = manager.unload_model(&mut session, model).await;
    if result.success {
        println!("{}", result.message);
        Ok(())
    } else {
        Err(miette::miette!("Failed to unload {}: {}", model, result.message))
    }
}
