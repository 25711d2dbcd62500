use crate::domain::model::{GeneratedImage, GenerationOutput, GenerationRequest};
use crate::domain::ports::{ConfigProvider, ImageGenerator};
use crate::utils::error::{ImagenError, Result};
use base64::Engine;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const API_KEY_HEADER: &str = "x-goog-api-key";
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Calls the Imagen `:predict` endpoint of the Gemini API.
pub struct ImagenClient<C: ConfigProvider> {
    config: C,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    bytes_base64_encoded: Option<String>,
    mime_type: Option<String>,
    rai_filtered_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    status: Option<String>,
}

impl<C: ConfigProvider> ImagenClient<C> {
    pub fn new(config: C) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    pub fn predict_url(&self, model: &str) -> String {
        format!(
            "{}/models/{}:predict",
            self.config.api_endpoint().trim_end_matches('/'),
            model
        )
    }

    pub fn request_body(request: &GenerationRequest) -> Value {
        let mut parameters = json!({
            "sampleCount": request.number_of_images,
            "aspectRatio": request.aspect_ratio.as_str(),
            "personGeneration": request.person_generation.as_str(),
            "includeRaiReason": true,
        });

        if let Some(size) = request.image_size {
            parameters["imageSize"] = json!(size.as_str());
        }
        if let Some(negative) = &request.negative_prompt {
            parameters["negativePrompt"] = json!(negative);
        }

        json!({
            "instances": [{ "prompt": request.prompt }],
            "parameters": parameters,
        })
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.config
            .retry_delay()
            .saturating_mul(1u32 << attempt.min(16))
            .min(MAX_BACKOFF)
    }

    fn decode(payload: PredictResponse) -> Result<GenerationOutput> {
        let mut output = GenerationOutput::default();

        for prediction in payload.predictions {
            match prediction.bytes_base64_encoded {
                Some(encoded) => {
                    let data = base64::engine::general_purpose::STANDARD.decode(encoded.trim())?;
                    output.images.push(GeneratedImage {
                        data,
                        mime_type: prediction
                            .mime_type
                            .unwrap_or_else(|| "image/png".to_string()),
                    });
                }
                None => output.filtered.push(
                    prediction
                        .rai_filtered_reason
                        .unwrap_or_else(|| "filtered without a reason".to_string()),
                ),
            }
        }

        if output.images.is_empty() {
            let reason = if output.filtered.is_empty() {
                "no predictions returned".to_string()
            } else {
                output.filtered.join("; ")
            };
            return Err(ImagenError::ContentFiltered { reason });
        }

        Ok(output)
    }

    fn error_from_status(status: StatusCode, body: &[u8], attempts: u32) -> ImagenError {
        let message = match serde_json::from_slice::<ErrorEnvelope>(body) {
            Ok(envelope) => match envelope.error.status {
                Some(code) => format!("{} ({})", envelope.error.message, code),
                None => envelope.error.message,
            },
            Err(_) => {
                let text = String::from_utf8_lossy(body).trim().to_string();
                if text.is_empty() {
                    status.canonical_reason().unwrap_or("unknown error").to_string()
                } else {
                    text
                }
            }
        };

        match status {
            StatusCode::TOO_MANY_REQUESTS => ImagenError::RateLimited { attempts },
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ImagenError::AuthenticationError {
                status: status.as_u16(),
                message,
            },
            _ => ImagenError::ApiError {
                status: status.as_u16(),
                message,
            },
        }
    }
}

/// Seconds from a numeric `Retry-After` header. HTTP-date values are ignored.
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[async_trait::async_trait]
impl<C: ConfigProvider> ImageGenerator for ImagenClient<C> {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput> {
        let api_key = self.config.api_key().ok_or(ImagenError::MissingApiKey)?;
        let url = self.predict_url(&request.model);
        let body = Self::request_body(request);
        let max_retries = self.config.retry_attempts();
        let mut attempt = 0u32;

        loop {
            tracing::debug!("POST {} (attempt {})", url, attempt + 1);

            let sent = self
                .client
                .post(&url)
                .header(API_KEY_HEADER, api_key)
                .timeout(self.config.request_timeout())
                .json(&body)
                .send()
                .await;

            match sent {
                Ok(response) => {
                    let status = response.status();
                    tracing::debug!("API response status: {}", status);

                    if status.is_success() {
                        let bytes = response.bytes().await?;
                        let payload: PredictResponse = serde_json::from_slice(&bytes)?;
                        return Self::decode(payload);
                    }

                    let wait = retry_after(response.headers());
                    let bytes = response.bytes().await.unwrap_or_default();

                    if is_retryable(status) && attempt < max_retries {
                        let delay = wait.unwrap_or_else(|| self.backoff(attempt)).min(MAX_BACKOFF);
                        tracing::warn!(
                            "⏳ API returned {}, retrying in {:?} ({}/{})",
                            status,
                            delay,
                            attempt + 1,
                            max_retries
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }

                    return Err(Self::error_from_status(status, &bytes, attempt + 1));
                }
                Err(e) if (e.is_timeout() || e.is_connect()) && attempt < max_retries => {
                    let delay = self.backoff(attempt);
                    tracing::warn!(
                        "⏳ Request failed ({}), retrying in {:?} ({}/{})",
                        e,
                        delay,
                        attempt + 1,
                        max_retries
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
