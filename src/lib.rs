pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use crate::adapters::storage::LocalStorage;
pub use crate::config::{settings::Settings, CliConfig};
pub use crate::core::{client::ImagenClient, engine::GenerationEngine};
pub use crate::utils::error::{ImagenError, Result};
