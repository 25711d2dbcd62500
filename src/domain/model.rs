use crate::utils::error::{ImagenError, Result};
use crate::utils::validation::{invalid_value, validate_non_empty_string, validate_range};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub const MAX_IMAGES_PER_REQUEST: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "3:4")]
    Portrait,
    #[serde(rename = "4:3")]
    Landscape,
    #[serde(rename = "9:16")]
    Tall,
    #[serde(rename = "16:9")]
    Wide,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 5] = [
        AspectRatio::Square,
        AspectRatio::Portrait,
        AspectRatio::Landscape,
        AspectRatio::Tall,
        AspectRatio::Wide,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Portrait => "3:4",
            AspectRatio::Landscape => "4:3",
            AspectRatio::Tall => "9:16",
            AspectRatio::Wide => "16:9",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = ImagenError;

    fn from_str(s: &str) -> Result<Self> {
        AspectRatio::ALL
            .into_iter()
            .find(|ratio| ratio.as_str() == s.trim())
            .ok_or_else(|| {
                invalid_value("aspect_ratio", s, "Supported ratios: 1:1, 3:4, 4:3, 9:16, 16:9")
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonGeneration {
    DontAllow,
    #[default]
    AllowAdult,
    AllowAll,
}

impl PersonGeneration {
    pub fn as_str(&self) -> &'static str {
        match self {
            PersonGeneration::DontAllow => "dont_allow",
            PersonGeneration::AllowAdult => "allow_adult",
            PersonGeneration::AllowAll => "allow_all",
        }
    }
}

impl fmt::Display for PersonGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PersonGeneration {
    type Err = ImagenError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dont_allow" => Ok(PersonGeneration::DontAllow),
            "allow_adult" => Ok(PersonGeneration::AllowAdult),
            "allow_all" => Ok(PersonGeneration::AllowAll),
            _ => Err(invalid_value(
                "person_generation",
                s,
                "Supported values: dont_allow, allow_adult, allow_all",
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageSize {
    #[serde(rename = "1K")]
    OneK,
    #[serde(rename = "2K")]
    TwoK,
}

impl ImageSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageSize::OneK => "1K",
            ImageSize::TwoK => "2K",
        }
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageSize {
    type Err = ImagenError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "1K" => Ok(ImageSize::OneK),
            "2K" => Ok(ImageSize::TwoK),
            _ => Err(invalid_value("image_size", s, "Supported sizes: 1K, 2K")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImagenModel {
    pub id: &'static str,
    pub description: &'static str,
    pub max_images: u8,
    pub supports_image_size: bool,
}

pub const DEFAULT_MODEL: &str = "imagen-4.0-generate-001";

const KNOWN_MODELS: &[ImagenModel] = &[
    ImagenModel {
        id: "imagen-4.0-generate-001",
        description: "Imagen 4 standard, balanced quality and speed",
        max_images: 4,
        supports_image_size: true,
    },
    ImagenModel {
        id: "imagen-4.0-ultra-generate-001",
        description: "Imagen 4 Ultra, highest prompt adherence",
        max_images: 4,
        supports_image_size: true,
    },
    ImagenModel {
        id: "imagen-4.0-fast-generate-001",
        description: "Imagen 4 Fast, lowest latency",
        max_images: 4,
        supports_image_size: false,
    },
    ImagenModel {
        id: "imagen-3.0-generate-002",
        description: "Imagen 3",
        max_images: 4,
        supports_image_size: false,
    },
];

pub fn known_models() -> &'static [ImagenModel] {
    KNOWN_MODELS
}

pub fn find_model(id: &str) -> Option<&'static ImagenModel> {
    KNOWN_MODELS.iter().find(|model| model.id == id)
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub model: String,
    pub number_of_images: u8,
    pub aspect_ratio: AspectRatio,
    pub person_generation: PersonGeneration,
    pub image_size: Option<ImageSize>,
    pub negative_prompt: Option<String>,
    /// Extra filename component, set for batch items.
    pub label: Option<String>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: DEFAULT_MODEL.to_string(),
            number_of_images: 1,
            aspect_ratio: AspectRatio::default(),
            person_generation: PersonGeneration::default(),
            image_size: None,
            negative_prompt: None,
            label: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_non_empty_string("prompt", &self.prompt)?;
        validate_non_empty_string("model", &self.model)?;

        let max_images = find_model(&self.model)
            .map(|model| model.max_images)
            .unwrap_or(MAX_IMAGES_PER_REQUEST);
        validate_range("number_of_images", self.number_of_images, 1, max_images)?;

        if let (Some(size), Some(model)) = (self.image_size, find_model(&self.model)) {
            if !model.supports_image_size {
                return Err(invalid_value(
                    "image_size",
                    size,
                    format!("Model {} does not support image_size", model.id),
                ));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub data: Vec<u8>,
    pub mime_type: String,
}

impl GeneratedImage {
    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/png" => "png",
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            _ => "bin",
        }
    }
}

/// What a generator returned for one request: decoded images plus the
/// reasons for any predictions the safety filter dropped.
#[derive(Debug, Clone, Default)]
pub struct GenerationOutput {
    pub images: Vec<GeneratedImage>,
    pub filtered: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageMetadata {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    pub model: String,
    pub aspect_ratio: AspectRatio,
    pub person_generation: PersonGeneration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_size: Option<ImageSize>,
    pub index: usize,
    pub mime_type: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone)]
pub struct SavedImage {
    pub path: PathBuf,
    pub metadata_path: Option<PathBuf>,
    pub bytes: usize,
}

#[derive(Debug, Clone)]
pub struct GenerationReport {
    pub prompt: String,
    pub model: String,
    pub saved: Vec<SavedImage>,
    pub filtered: usize,
}
