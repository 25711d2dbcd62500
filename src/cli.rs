use crate::adapters::storage::LocalStorage;
use crate::config::settings::Settings;
use crate::config::toml_config::TomlConfig;
use crate::config::{CliConfig, Command};
use crate::core::client::ImagenClient;
use crate::core::engine::{GenerationEngine, OutputOptions};
use crate::domain::model::{known_models, GenerationReport, GenerationRequest};
use crate::utils::error::{ImagenError, Result};
use crate::utils::logger;
use crate::utils::validation::{validate_required_field, Validate};
use clap::Parser;
use serde_json::{json, Value};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

type Engine = GenerationEngine<ImagenClient<Settings>, LocalStorage>;

/// Process entry: reads arguments from the environment and runs the tool.
pub fn main() -> ExitCode {
    main_from(std::env::args_os())
}

pub fn main_from<I, T>(args: I) -> ExitCode
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    ExitCode::from(run_from(args))
}

/// Runs one invocation and returns its exit status.
pub fn run_from<I, T>(args: I) -> u8
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let config = match CliConfig::try_parse_from(args) {
        Ok(config) => config,
        Err(e) => {
            let _ = e.print();
            return e.exit_code().clamp(0, 255) as u8;
        }
    };

    if config.json_logs {
        logger::init_json_logger(config.verbose);
    } else {
        logger::init_cli_logger(config.verbose);
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("❌ Failed to start the async runtime: {}", e);
            return 3;
        }
    };

    match runtime.block_on(run(config)) {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!(
                "❌ imagenation failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());
            e.exit_code()
        }
    }
}

pub async fn run(config: CliConfig) -> Result<()> {
    let file = match &config.config {
        Some(path) => {
            tracing::info!("📁 Loading configuration from: {}", path.display());
            let file = TomlConfig::from_file(path)?;
            file.validate()?;
            Some(file)
        }
        None => None,
    };

    match config.command {
        Command::Models => {
            print_models();
            Ok(())
        }
        Command::Config { options } => {
            let settings = Settings::resolve(file.as_ref(), &options, None);
            display_settings(&settings, config.config.as_deref());
            Ok(())
        }
        Command::Generate { prompt, options } => {
            let settings = Settings::resolve(file.as_ref(), &options, None);
            settings.validate()?;
            let request = settings.request_for(&prompt);
            request.validate()?;

            if config.dry_run {
                let client = ImagenClient::new(settings.clone());
                return print_dry_run(&request_preview(&client, &request));
            }

            settings.require_api_key()?;
            let engine = build_engine(settings);
            let report = engine.run(&request).await?;
            print_report(&report);
            Ok(())
        }
        Command::Batch {
            file: prompts_path,
            concurrency,
            options,
        } => {
            let settings = Settings::resolve(file.as_ref(), &options, concurrency);
            settings.validate()?;
            let prompts_path = prompts_path.or_else(|| {
                file.as_ref()
                    .and_then(|file| file.batch.prompts_file.as_ref())
                    .map(PathBuf::from)
            });
            let prompts_path = validate_required_field("batch.prompts_file", &prompts_path)?;
            let prompts = read_prompts(prompts_path)?;
            let requests = batch_requests(&settings, &prompts);
            for request in &requests {
                request.validate()?;
            }

            if config.dry_run {
                let client = ImagenClient::new(settings.clone());
                let previews = requests
                    .iter()
                    .map(|request| request_preview(&client, request))
                    .collect();
                return print_dry_run(&Value::Array(previews));
            }

            settings.require_api_key()?;
            let concurrency = settings.concurrency;
            let engine = Arc::new(build_engine(settings));
            let results = engine.run_batch(requests, concurrency).await;
            summarize_batch(results)
        }
    }
}

fn build_engine(settings: Settings) -> Engine {
    let storage = LocalStorage::new(settings.output_dir.clone());
    let options = OutputOptions::from_config(&settings);
    GenerationEngine::new(ImagenClient::new(settings), storage, options)
}

/// One prompt per line, paired with its 1-based line number. Blank lines
/// and `#` comments are skipped.
pub fn parse_prompts(content: &str) -> Vec<(usize, String)> {
    content
        .lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(number, line)| (number, line.to_string()))
        .collect()
}

/// Labels every request with the zero-padded line its prompt came from.
fn batch_requests(settings: &Settings, prompts: &[(usize, String)]) -> Vec<GenerationRequest> {
    let width = prompts
        .last()
        .map_or(0, |(line, _)| line.to_string().len())
        .max(3);
    prompts
        .iter()
        .map(|(line, prompt)| {
            let mut request = settings.request_for(prompt);
            request.label = Some(format!("{:0width$}", line, width = width));
            request
        })
        .collect()
}

fn read_prompts(path: &Path) -> Result<Vec<(usize, String)>> {
    let content = std::fs::read_to_string(path).map_err(|e| ImagenError::ConfigError {
        message: format!("Cannot read prompt file '{}': {}", path.display(), e),
    })?;
    let prompts = parse_prompts(&content);
    if prompts.is_empty() {
        return Err(ImagenError::ValidationError {
            message: format!("No prompts found in '{}'", path.display()),
        });
    }
    tracing::info!("📄 Loaded {} prompt(s) from {}", prompts.len(), path.display());
    Ok(prompts)
}

fn request_preview(client: &ImagenClient<Settings>, request: &GenerationRequest) -> Value {
    json!({
        "url": client.predict_url(&request.model),
        "body": ImagenClient::<Settings>::request_body(request),
    })
}

/// Stdout gets exactly one JSON document: an object for `generate`, an
/// array for `batch`.
fn print_dry_run(preview: &Value) -> Result<()> {
    tracing::info!("🔍 DRY RUN MODE - no request will be sent");
    println!("{}", serde_json::to_string_pretty(preview)?);
    Ok(())
}

fn print_report(report: &GenerationReport) {
    for image in &report.saved {
        println!("{}", image.path.display());
    }
    if report.filtered > 0 {
        eprintln!(
            "⚠️ {} image(s) were blocked by the safety filter",
            report.filtered
        );
    }
}

fn summarize_batch(results: Vec<Result<GenerationReport>>) -> Result<()> {
    let total = results.len();
    let mut failed = 0;
    let mut first_error = None;

    for (index, result) in results.into_iter().enumerate() {
        match result {
            Ok(report) => print_report(&report),
            Err(e) => {
                eprintln!("❌ [{}/{}] {}", index + 1, total, e.user_friendly_message());
                failed += 1;
                first_error.get_or_insert(e);
            }
        }
    }

    eprintln!("📊 {} of {} prompt(s) succeeded", total - failed, total);

    match first_error {
        Some(source) => Err(ImagenError::BatchError {
            failed,
            total,
            source: Box::new(source),
        }),
        None => Ok(()),
    }
}

fn print_models() {
    println!("📋 Known Imagen models:");
    for model in known_models() {
        println!(
            "  {:<32} {} (up to {} images{})",
            model.id,
            model.description,
            model.max_images,
            if model.supports_image_size {
                ", 1K/2K"
            } else {
                ""
            }
        );
    }
}

fn display_settings(settings: &Settings, config_path: Option<&Path>) {
    println!("📋 Effective configuration:");
    match config_path {
        Some(path) => println!("  Config file: {}", path.display()),
        None => println!("  Config file: <none>"),
    }
    println!("  API key: {}", settings.masked_api_key());
    println!("  Endpoint: {}", settings.endpoint);
    println!("  Timeout: {}s", settings.timeout.as_secs());
    println!(
        "  Retries: {} (base delay {}s)",
        settings.retry_attempts,
        settings.retry_delay.as_secs()
    );
    println!("  Model: {}", settings.model);
    println!("  Images per prompt: {}", settings.number_of_images);
    println!("  Aspect ratio: {}", settings.aspect_ratio);
    println!("  Person generation: {}", settings.person_generation);
    if let Some(size) = settings.image_size {
        println!("  Image size: {}", size);
    }
    if let Some(negative) = &settings.negative_prompt {
        println!("  Negative prompt: {}", negative);
    }
    println!("  Output directory: {}", settings.output_dir.display());
    println!("  Filename prefix: {}", settings.prefix);
    println!("  Metadata files: {}", settings.save_metadata);
    println!("  Batch concurrency: {}", settings.concurrency);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prompts_skips_comments_and_blanks() {
        let prompts = parse_prompts("# header\n\n a red fox \n#skip\nlighthouse at dusk\n   \n");
        assert_eq!(
            prompts,
            vec![
                (3, "a red fox".to_string()),
                (5, "lighthouse at dusk".to_string())
            ]
        );
    }

    #[test]
    fn test_batch_labels_follow_line_numbers() {
        let settings = Settings::default();
        let prompts = parse_prompts("# c\nfoo\n\nbar\n");
        let requests = batch_requests(&settings, &prompts);

        let labels: Vec<_> = requests
            .iter()
            .map(|request| request.label.as_deref().unwrap())
            .collect();
        assert_eq!(labels, vec!["002", "004"]);
        assert_eq!(requests[1].prompt, "bar");
    }

    #[test]
    fn test_label_width_grows_with_line_count() {
        let content = format!("{}last prompt\n", "\n".repeat(1200));
        let requests = batch_requests(&Settings::default(), &parse_prompts(&content));
        assert_eq!(requests[0].label.as_deref(), Some("1201"));
    }

    #[test]
    fn test_summarize_batch_reports_first_failure() {
        let results = vec![
            Err(ImagenError::RateLimited { attempts: 4 }),
            Err(ImagenError::ContentFiltered {
                reason: "Blocked".to_string(),
            }),
        ];
        match summarize_batch(results) {
            Err(ImagenError::BatchError {
                failed,
                total,
                source,
            }) => {
                assert_eq!(failed, 2);
                assert_eq!(total, 2);
                assert!(matches!(*source, ImagenError::RateLimited { .. }));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_summarize_empty_batch_is_ok() {
        assert!(summarize_batch(vec![]).is_ok());
    }

    #[tokio::test]
    async fn test_dry_run_needs_no_api_key() {
        let config = CliConfig::try_parse_from([
            "imagenation",
            "generate",
            "a quiet harbor",
            "--dry-run",
            "--endpoint",
            "http://127.0.0.1:9/v1beta",
        ])
        .unwrap();
        assert!(run(config).await.is_ok());
    }

    #[tokio::test]
    async fn test_batch_without_prompt_file_is_missing_config() {
        let config = CliConfig::try_parse_from(["imagenation", "batch"]).unwrap();
        match run(config).await {
            Err(ImagenError::MissingConfigError { field }) => {
                assert_eq!(field, "batch.prompts_file")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_prompt_file_is_config_error() {
        let config = CliConfig::try_parse_from([
            "imagenation",
            "batch",
            "/nonexistent/imagenation/prompts.txt",
        ])
        .unwrap();
        assert!(matches!(
            run(config).await,
            Err(ImagenError::ConfigError { .. })
        ));
    }
}
