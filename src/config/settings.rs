use crate::config::toml_config::TomlConfig;
use crate::config::GenerationArgs;
use crate::domain::model::{
    AspectRatio, GenerationRequest, ImageSize, PersonGeneration, DEFAULT_MODEL,
};
use crate::domain::ports::ConfigProvider;
use crate::utils::error::{ImagenError, Result};
use crate::utils::validation::{
    non_blank, validate_non_empty_string, validate_path, validate_positive_number,
    validate_range, validate_url, Validate,
};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const API_KEY_ENV_VARS: [&str; 2] = ["GEMINI_API_KEY", "GOOGLE_API_KEY"];

const DEFAULT_OUTPUT_DIR: &str = "./output";
const DEFAULT_PREFIX: &str = "imagenation";
const DEFAULT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_DELAY_SECS: u64 = 2;
const DEFAULT_CONCURRENCY: usize = 2;

/// Effective configuration: CLI flag > config file > environment > default.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_key: Option<String>,
    pub endpoint: String,
    pub timeout: Duration,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
    pub model: String,
    pub number_of_images: u8,
    pub aspect_ratio: AspectRatio,
    pub person_generation: PersonGeneration,
    pub image_size: Option<ImageSize>,
    pub negative_prompt: Option<String>,
    pub output_dir: PathBuf,
    pub prefix: String,
    pub save_metadata: bool,
    pub concurrency: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_delay: Duration::from_secs(DEFAULT_RETRY_DELAY_SECS),
            model: DEFAULT_MODEL.to_string(),
            number_of_images: 1,
            aspect_ratio: AspectRatio::default(),
            person_generation: PersonGeneration::default(),
            image_size: None,
            negative_prompt: None,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            prefix: DEFAULT_PREFIX.to_string(),
            save_metadata: true,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl Settings {
    pub fn resolve(
        file: Option<&TomlConfig>,
        args: &GenerationArgs,
        concurrency: Option<usize>,
    ) -> Self {
        Self::resolve_with_env(file, args, concurrency, |name| std::env::var(name).ok())
    }

    /// Same as [`Settings::resolve`] with an injectable environment lookup.
    pub fn resolve_with_env<F>(
        file: Option<&TomlConfig>,
        args: &GenerationArgs,
        concurrency: Option<usize>,
        env: F,
    ) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Settings::default();
        let empty = TomlConfig::default();
        let file = file.unwrap_or(&empty);

        let api_key = non_blank(args.api_key.as_deref())
            .or_else(|| non_blank(file.api.key.as_deref()))
            .map(str::to_string)
            .or_else(|| {
                API_KEY_ENV_VARS
                    .into_iter()
                    .filter_map(|name| env(name))
                    .find_map(|value| non_blank(Some(value.as_str())).map(str::to_string))
            });

        Self {
            api_key,
            endpoint: args
                .endpoint
                .clone()
                .or_else(|| file.api.endpoint.clone())
                .unwrap_or(defaults.endpoint),
            timeout: args
                .timeout
                .or(file.api.timeout_seconds)
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            retry_attempts: args
                .retries
                .or(file.api.retry_attempts)
                .unwrap_or(defaults.retry_attempts),
            retry_delay: file
                .api
                .retry_delay_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.retry_delay),
            model: args
                .model
                .clone()
                .or_else(|| file.generation.model.clone())
                .unwrap_or(defaults.model),
            number_of_images: args
                .number_of_images
                .or(file.generation.number_of_images)
                .unwrap_or(defaults.number_of_images),
            aspect_ratio: args
                .aspect_ratio
                .or(file.generation.aspect_ratio)
                .unwrap_or(defaults.aspect_ratio),
            person_generation: args
                .person_generation
                .or(file.generation.person_generation)
                .unwrap_or(defaults.person_generation),
            image_size: args.image_size.or(file.generation.image_size),
            negative_prompt: args
                .negative_prompt
                .clone()
                .or_else(|| file.generation.negative_prompt.clone())
                .filter(|prompt| !prompt.trim().is_empty()),
            output_dir: args
                .output_dir
                .clone()
                .or_else(|| file.output.directory.as_ref().map(PathBuf::from))
                .unwrap_or(defaults.output_dir),
            prefix: args
                .prefix
                .clone()
                .or_else(|| file.output.prefix.clone())
                .unwrap_or(defaults.prefix),
            save_metadata: !args.no_metadata
                && file.output.save_metadata.unwrap_or(defaults.save_metadata),
            concurrency: concurrency
                .or(file.batch.concurrent_requests)
                .unwrap_or(defaults.concurrency),
        }
    }

    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or(ImagenError::MissingApiKey)
    }

    pub fn masked_api_key(&self) -> String {
        match &self.api_key {
            Some(key) => {
                let visible: String = key.chars().take(4).collect();
                format!("{}…", visible)
            }
            None => "<none>".to_string(),
        }
    }

    pub fn request_for(&self, prompt: &str) -> GenerationRequest {
        GenerationRequest {
            prompt: prompt.trim().to_string(),
            model: self.model.clone(),
            number_of_images: self.number_of_images,
            aspect_ratio: self.aspect_ratio,
            person_generation: self.person_generation,
            image_size: self.image_size,
            negative_prompt: self.negative_prompt.clone(),
            label: None,
        }
    }
}

impl Validate for Settings {
    fn validate(&self) -> Result<()> {
        validate_url("endpoint", &self.endpoint)?;
        validate_non_empty_string("model", &self.model)?;
        validate_range("number_of_images", self.number_of_images, 1, 4)?;
        validate_path("output_dir", &self.output_dir.to_string_lossy())?;
        validate_non_empty_string("prefix", &self.prefix)?;
        validate_positive_number("timeout", self.timeout.as_secs() as usize, 1)?;
        validate_positive_number("concurrency", self.concurrency, 1)?;
        Ok(())
    }
}

impl ConfigProvider for Settings {
    fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    fn api_endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request_timeout(&self) -> Duration {
        self.timeout
    }

    fn retry_attempts(&self) -> u32 {
        self.retry_attempts
    }

    fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    fn output_prefix(&self) -> &str {
        &self.prefix
    }

    fn save_metadata(&self) -> bool {
        self.save_metadata
    }
}
