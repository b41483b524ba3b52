//! House Customizer
//!
//! Loads a house model, lets the user click parts of it and apply colours,
//! wall patterns, floor tiles and false-ceiling textures with live preview.
//! Committed choices live in a per-mesh override map that is reconciled onto
//! the scene whenever the session changes.

mod app;
mod assets;
mod catalog;
mod color;
mod config;
mod customize;
mod host;
mod render;
mod resource;
mod scene;
mod ui;

use config::{AppConfig, MODEL_ENV_VAR};
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    log::info!("House Customizer {}", env!("CARGO_PKG_VERSION"));
    log::info!("   Left drag orbits, right drag pans, wheel zooms. ESC exits.");

    let arg = std::env::args().nth(1);
    let config = match AppConfig::resolve(arg.as_deref(), std::env::var(MODEL_ENV_VAR).ok()) {
        Ok(config) => config,
        Err(err) => {
            log::error!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    match app::run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
