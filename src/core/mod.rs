pub mod client;
pub mod engine;

pub use crate::domain::model::{GenerationReport, GenerationRequest};
pub use crate::domain::ports::{ConfigProvider, ImageGenerator, Storage};
pub use crate::utils::error::Result;
