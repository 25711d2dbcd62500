use crate::domain::model::{AspectRatio, ImageSize, PersonGeneration};
use crate::utils::error::{ImagenError, Result};
use crate::utils::validation::{
    validate_path, validate_positive_number, validate_range, validate_url, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub batch: BatchConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiConfig {
    pub key: Option<String>,
    pub endpoint: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub retry_attempts: Option<u32>,
    pub retry_delay_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub model: Option<String>,
    pub number_of_images: Option<u8>,
    pub aspect_ratio: Option<AspectRatio>,
    pub person_generation: Option<PersonGeneration>,
    pub image_size: Option<ImageSize>,
    pub negative_prompt: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    pub directory: Option<String>,
    pub prefix: Option<String>,
    pub save_metadata: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchConfig {
    pub concurrent_requests: Option<usize>,
    pub prompts_file: Option<String>,
}

fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("valid env var pattern"))
}

impl TomlConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ImagenError::ConfigError {
            message: format!("Cannot read config file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| ImagenError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the environment value; unknown variables stay
    /// verbatim. Values land inside TOML basic strings, so `\` and `"` are
    /// escaped to come out of the parser unchanged.
    fn substitute_env_vars(content: &str) -> String {
        env_var_pattern()
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                match std::env::var(var_name) {
                    Ok(value) => escape_toml_basic(&value),
                    Err(_) => format!("${{{}}}", var_name),
                }
            })
            .into_owned()
    }
}

fn escape_toml_basic(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        if let Some(endpoint) = &self.api.endpoint {
            validate_url("api.endpoint", endpoint)?;
        }

        if let Some(directory) = &self.output.directory {
            validate_path("output.directory", directory)?;
        }

        if let Some(count) = self.generation.number_of_images {
            validate_range("generation.number_of_images", count, 1, 4)?;
        }

        if let Some(timeout) = self.api.timeout_seconds {
            validate_positive_number("api.timeout_seconds", timeout as usize, 1)?;
        }

        if let Some(prompts_file) = &self.batch.prompts_file {
            validate_path("batch.prompts_file", prompts_file)?;
        }

        if let Some(concurrent) = self.batch.concurrent_requests {
            validate_positive_number("batch.concurrent_requests", concurrent, 1)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config = TomlConfig::from_toml_str(
            r#"
[api]
key = "test-key"
endpoint = "http://localhost:9000/v1beta"
timeout_seconds = 30
retry_attempts = 1

[generation]
model = "imagen-4.0-ultra-generate-001"
number_of_images = 2
aspect_ratio = "16:9"
person_generation = "dont_allow"
image_size = "2K"

[output]
directory = "./renders"
prefix = "poster"
save_metadata = false

[batch]
concurrent_requests = 4
prompts_file = "prompts.txt"
"#,
        )
        .unwrap();

        assert_eq!(config.api.key.as_deref(), Some("test-key"));
        assert_eq!(config.api.retry_attempts, Some(1));
        assert_eq!(config.generation.aspect_ratio, Some(AspectRatio::Wide));
        assert_eq!(
            config.generation.person_generation,
            Some(PersonGeneration::DontAllow)
        );
        assert_eq!(config.generation.image_size, Some(ImageSize::TwoK));
        assert_eq!(config.output.save_metadata, Some(false));
        assert_eq!(config.batch.concurrent_requests, Some(4));
        assert_eq!(config.batch.prompts_file.as_deref(), Some("prompts.txt"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_config_is_valid() {
        let config = TomlConfig::from_toml_str("").unwrap();
        assert!(config.api.key.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("IMAGENATION_TEST_TOML_KEY", "from-env");
        let config = TomlConfig::from_toml_str(
            r#"
[api]
key = "${IMAGENATION_TEST_TOML_KEY}"
endpoint = "${IMAGENATION_TEST_UNSET_VAR}"
"#,
        )
        .unwrap();

        assert_eq!(config.api.key.as_deref(), Some("from-env"));
        assert_eq!(
            config.api.endpoint.as_deref(),
            Some("${IMAGENATION_TEST_UNSET_VAR}")
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_values_keep_backslashes_and_quotes() {
        std::env::set_var("IMAGENATION_TEST_TOML_DIR", r"C:\new\renders");
        std::env::set_var("IMAGENATION_TEST_TOML_QUOTED", r#"say "cheese""#);
        let config = TomlConfig::from_toml_str(
            r#"
[generation]
negative_prompt = "${IMAGENATION_TEST_TOML_QUOTED}"

[output]
directory = "${IMAGENATION_TEST_TOML_DIR}"
"#,
        )
        .unwrap();

        assert_eq!(config.output.directory.as_deref(), Some(r"C:\new\renders"));
        assert_eq!(
            config.generation.negative_prompt.as_deref(),
            Some(r#"say "cheese""#)
        );
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(TomlConfig::from_toml_str("[generation]\naspect_ratio = \"2:1\"\n").is_err());
        assert!(TomlConfig::from_toml_str("[unknown]\nvalue = 1\n").is_err());

        let config = TomlConfig::from_toml_str("[generation]\nnumber_of_images = 9\n").unwrap();
        assert!(config.validate().is_err());

        let config = TomlConfig::from_toml_str("[batch]\nconcurrent_requests = 0\n").unwrap();
        assert!(config.validate().is_err());
    }
}
