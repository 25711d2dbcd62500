use anyhow::Result;
use base64::Engine;
use clap::Parser;
use httpmock::prelude::*;
use imagenation::config::settings::Settings;
use imagenation::config::toml_config::TomlConfig;
use imagenation::config::GenerationArgs;
use imagenation::domain::model::{AspectRatio, ImageSize, PersonGeneration};
use imagenation::utils::validation::Validate;
use imagenation::CliConfig;
use tempfile::TempDir;

#[test]
fn test_settings_from_config_file() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config_path = temp_dir.path().join("imagenation.toml");
    std::fs::write(
        &config_path,
        r#"
[api]
key = "file-key"
timeout_seconds = 45
retry_attempts = 5

[generation]
model = "imagen-4.0-ultra-generate-001"
number_of_images = 3
aspect_ratio = "4:3"
person_generation = "dont_allow"
image_size = "2K"
negative_prompt = "watermark"

[output]
directory = "renders"
prefix = "studio"
save_metadata = false

[batch]
concurrent_requests = 6
"#,
    )?;

    let file = TomlConfig::from_file(&config_path)?;
    file.validate()?;

    let args = GenerationArgs {
        number_of_images: Some(1),
        ..Default::default()
    };
    let settings = Settings::resolve(Some(&file), &args, None);

    assert_eq!(settings.api_key.as_deref(), Some("file-key"));
    assert_eq!(settings.timeout.as_secs(), 45);
    assert_eq!(settings.retry_attempts, 5);
    assert_eq!(settings.model, "imagen-4.0-ultra-generate-001");
    assert_eq!(settings.number_of_images, 1);
    assert_eq!(settings.aspect_ratio, AspectRatio::Landscape);
    assert_eq!(settings.person_generation, PersonGeneration::DontAllow);
    assert_eq!(settings.image_size, Some(ImageSize::TwoK));
    assert_eq!(settings.negative_prompt.as_deref(), Some("watermark"));
    assert_eq!(settings.prefix, "studio");
    assert!(!settings.save_metadata);
    assert_eq!(settings.concurrency, 6);
    settings.validate()?;
    Ok(())
}

#[test]
fn test_missing_config_file_is_reported() {
    let err = TomlConfig::from_file("/nonexistent/imagenation.toml").unwrap_err();
    assert!(err.to_string().contains("Cannot read config file"));
}

#[tokio::test]
async fn test_cli_uses_config_file() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let server = MockServer::start();
    let encoded = base64::engine::general_purpose::STANDARD.encode(b"from-config");

    let api_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/models/imagen-3.0-generate-002:predict")
            .header("x-goog-api-key", "config-key")
            .json_body_partial(
                r#"{"parameters":{"aspectRatio":"3:4","negativePrompt":"blur"}}"#,
            );
        then.status(200).json_body(serde_json::json!({
            "predictions": [{"bytesBase64Encoded": encoded, "mimeType": "image/jpeg"}]
        }));
    });

    let output_dir = temp_dir.path().join("out");
    let config_path = temp_dir.path().join("imagenation.toml");
    std::fs::write(
        &config_path,
        format!(
            r#"
[api]
key = "config-key"
endpoint = "{}"

[generation]
model = "imagen-3.0-generate-002"
aspect_ratio = "3:4"
negative_prompt = "blur"

[output]
directory = "{}"
prefix = "cfg"
"#,
            server.base_url(),
            output_dir.to_str().unwrap().replace('\\', "/")
        ),
    )?;

    let config = CliConfig::try_parse_from([
        "imagenation",
        "--config",
        config_path.to_str().unwrap(),
        "generate",
        "mountain cabin in winter",
    ])?;
    imagenation::cli::run(config).await?;

    api_mock.assert();
    let mut names: Vec<String> = std::fs::read_dir(&output_dir)?
        .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect::<std::io::Result<_>>()?;
    names.sort();
    assert_eq!(names.len(), 2);
    assert!(names[0].starts_with("cfg_"));
    assert!(names[0].ends_with("_mountain-cabin-in-winter_1.jpg"));
    assert!(names[1].ends_with("_mountain-cabin-in-winter_1.json"));
    Ok(())
}

#[tokio::test]
async fn test_batch_reads_prompt_file_from_config() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let prompts_path = temp_dir.path().join("prompts.txt");
    std::fs::write(&prompts_path, "a foggy pier\n")?;

    let config_path = temp_dir.path().join("imagenation.toml");
    std::fs::write(
        &config_path,
        format!(
            "[batch]\nprompts_file = \"{}\"\n",
            prompts_path.to_str().unwrap().replace('\\', "/")
        ),
    )?;

    let config = CliConfig::try_parse_from([
        "imagenation",
        "--config",
        config_path.to_str().unwrap(),
        "batch",
        "--dry-run",
    ])?;
    imagenation::cli::run(config).await?;
    Ok(())
}
