//! Vault execution bot: configuration, key loading and application
//! wiring around the engine.

pub mod app;
pub mod config;
pub mod error;
pub mod keys;
pub mod logging;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
