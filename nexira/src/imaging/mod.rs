//! Image generation backend.
//!
//! [`ImageGenerator`] abstracts the upstream model API so the task flow
//! and its tests do not depend on a live endpoint. Production uses
//! [`gemini::GeminiClient`].

pub mod gemini;
pub mod prompt;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImagingError {
    #[error("generation request failed: {0}")]
    Request(String),
    #[error("upstream returned no image")]
    EmptyResponse,
    #[error("upstream rejected the request: {0}")]
    Rejected(String),
}

/// An image travelling to or from the model, base64-encoded.
#[derive(Debug, Clone)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone)]
pub struct GenerationOutput {
    pub image: InlineImage,
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Run one enhancement: the prompt plus the source image and any
    /// reference images, returning the generated image.
    async fn generate(&self, prompt: &str, images: &[InlineImage]) -> Result<GenerationOutput, ImagingError>;

    /// Describe an image in text. Used for style extraction from
    /// reference images and for subject analysis.
    async fn analyze(&self, prompt: &str, image: &InlineImage) -> Result<String, ImagingError>;
}
