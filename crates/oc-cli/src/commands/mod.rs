//! CLI commands.

pub mod bench;
pub mod chat;
pub mod models;
pub mod presets;
pub mod status;
pub mod unload;
mod wizard;
