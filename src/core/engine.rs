use crate::domain::model::{
    find_model, GeneratedImage, GenerationReport, GenerationRequest, ImageMetadata, SavedImage,
};
use crate::domain::ports::{ConfigProvider, ImageGenerator, Storage};
use crate::utils::error::{ImagenError, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::{Arc, OnceLock};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

const SLUG_WORDS: usize = 6;
const SLUG_MAX_LEN: usize = 40;

#[derive(Debug, Clone)]
pub struct OutputOptions {
    pub prefix: String,
    pub save_metadata: bool,
}

impl OutputOptions {
    pub fn from_config<C: ConfigProvider>(config: &C) -> Self {
        Self {
            prefix: config.output_prefix().to_string(),
            save_metadata: config.save_metadata(),
        }
    }
}

/// Turns generation requests into files: asks the generator for images and
/// writes each one (plus its metadata) through the storage backend.
pub struct GenerationEngine<G: ImageGenerator, S: Storage> {
    generator: G,
    storage: S,
    options: OutputOptions,
}

fn non_alnum() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^a-z0-9]+").expect("valid slug pattern"))
}

/// Lowercase, dash-separated summary of the first words of a prompt.
pub fn prompt_slug(prompt: &str) -> String {
    let words = prompt
        .split_whitespace()
        .take(SLUG_WORDS)
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    let slug = non_alnum().replace_all(&words, "-");
    // ASCII only after the replacement, so byte truncation is safe.
    let slug = slug.trim_matches('-');
    let slug = slug[..slug.len().min(SLUG_MAX_LEN)].trim_end_matches('-');

    if slug.is_empty() {
        "image".to_string()
    } else {
        slug.to_string()
    }
}

pub fn file_stem(prefix: &str, created_at: &DateTime<Utc>, request: &GenerationRequest) -> String {
    let mut stem = format!("{}_{}", prefix, created_at.format("%Y%m%d_%H%M%S"));
    if let Some(label) = &request.label {
        stem.push('_');
        stem.push_str(label);
    }
    stem.push('_');
    stem.push_str(&prompt_slug(&request.prompt));
    stem
}

impl<G: ImageGenerator, S: Storage> GenerationEngine<G, S> {
    pub fn new(generator: G, storage: S, options: OutputOptions) -> Self {
        Self {
            generator,
            storage,
            options,
        }
    }

    pub async fn run(&self, request: &GenerationRequest) -> Result<GenerationReport> {
        request.validate()?;

        if find_model(&request.model).is_none() {
            tracing::warn!(
                "⚠️ Unknown model '{}', sending the request anyway",
                request.model
            );
        }

        tracing::info!(
            "🎨 Generating {} image(s) with {}: \"{}\"",
            request.number_of_images,
            request.model,
            request.prompt
        );

        let output = self.generator.generate(request).await?;

        for reason in &output.filtered {
            tracing::warn!("🚫 Image filtered by safety system: {}", reason);
        }

        if output.images.is_empty() {
            return Err(ImagenError::ContentFiltered {
                reason: if output.filtered.is_empty() {
                    "no images returned".to_string()
                } else {
                    output.filtered.join("; ")
                },
            });
        }

        let created_at = Utc::now();
        let base_stem = file_stem(&self.options.prefix, &created_at, request);
        let mut saved = Vec::with_capacity(output.images.len());

        for (index, image) in output.images.iter().enumerate() {
            let stem = self
                .unique_stem(&format!("{}_{}", base_stem, index + 1), image.extension())
                .await;
            saved.push(
                self.save(&stem, image, index + 1, request, created_at)
                    .await?,
            );
        }

        tracing::info!("✅ Saved {} image(s)", saved.len());

        Ok(GenerationReport {
            prompt: request.prompt.clone(),
            model: request.model.clone(),
            saved,
            filtered: output.filtered.len(),
        })
    }

    /// First stem whose image file and metadata sidecar are both free.
    async fn unique_stem(&self, stem: &str, extension: &str) -> String {
        let mut candidate = stem.to_string();
        let mut suffix = 1;
        while self.is_taken(&candidate, extension).await {
            candidate = format!("{}-{}", stem, suffix);
            suffix += 1;
        }
        candidate
    }

    async fn is_taken(&self, stem: &str, extension: &str) -> bool {
        if self.storage.exists(&format!("{}.{}", stem, extension)).await {
            return true;
        }
        self.options.save_metadata && self.storage.exists(&format!("{}.json", stem)).await
    }

    async fn save(
        &self,
        stem: &str,
        image: &GeneratedImage,
        index: usize,
        request: &GenerationRequest,
        created_at: DateTime<Utc>,
    ) -> Result<SavedImage> {
        let image_name = format!("{}.{}", stem, image.extension());
        tracing::debug!("Writing {} ({} bytes)", image_name, image.data.len());
        self.storage.write_file(&image_name, &image.data).await?;

        let metadata_path = if self.options.save_metadata {
            let metadata = ImageMetadata {
                prompt: request.prompt.clone(),
                negative_prompt: request.negative_prompt.clone(),
                model: request.model.clone(),
                aspect_ratio: request.aspect_ratio,
                person_generation: request.person_generation,
                image_size: request.image_size,
                index,
                mime_type: image.mime_type.clone(),
                created_at,
            };
            let metadata_name = format!("{}.json", stem);
            let json = serde_json::to_vec_pretty(&metadata)?;
            self.storage.write_file(&metadata_name, &json).await?;
            Some(self.storage.resolve(&metadata_name))
        } else {
            None
        };

        Ok(SavedImage {
            path: self.storage.resolve(&image_name),
            metadata_path,
            bytes: image.data.len(),
        })
    }
}

impl<G, S> GenerationEngine<G, S>
where
    G: ImageGenerator + 'static,
    S: Storage + 'static,
{
    /// Runs every request with at most `concurrency` in flight. Results keep
    /// the input order; unlabeled requests get their 1-based position as label.
    pub async fn run_batch(
        self: Arc<Self>,
        requests: Vec<GenerationRequest>,
        concurrency: usize,
    ) -> Vec<Result<GenerationReport>> {
        let total = requests.len();
        let width = total.to_string().len().max(3);
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut tasks = JoinSet::new();

        tracing::info!(
            "📋 Batch of {} prompt(s), concurrency {}",
            total,
            concurrency.max(1)
        );

        for (index, mut request) in requests.into_iter().enumerate() {
            if request.label.is_none() {
                request.label = Some(format!("{:0width$}", index + 1, width = width));
            }
            let engine = Arc::clone(&self);
            let semaphore = Arc::clone(&semaphore);

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                tracing::info!("▶️ [{}/{}] {}", index + 1, total, request.prompt);
                (index, engine.run(&request).await)
            });
        }

        let mut results: Vec<Option<Result<GenerationReport>>> = (0..total).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => {
                    if let Err(e) = &result {
                        tracing::error!("❌ [{}/{}] {}", index + 1, total, e);
                    }
                    results[index] = Some(result);
                }
                Err(e) => tracing::error!("❌ Batch task failed: {}", e),
            }
        }

        results
            .into_iter()
            .map(|result| {
                result.unwrap_or_else(|| {
                    Err(ImagenError::TaskError {
                        message: "generation task did not complete".to_string(),
                    })
                })
            })
            .collect()
    }
}
