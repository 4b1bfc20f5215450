pub mod gemini;

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use self::gemini::GeminiChatClient;
use crate::error::BoxError;
use crate::models::MediaType;

#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    InlineImage {
        media_type: MediaType,
        data: Vec<u8>,
    },
}

/// A single generation call: optional system instruction, the user turn's
/// parts, and an optional sampling temperature.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateRequest {
    pub system_instruction: Option<String>,
    pub parts: Vec<Part>,
    pub temperature: Option<f32>,
}

impl GenerateRequest {
    pub fn new(parts: Vec<Part>) -> Self {
        Self {
            parts,
            ..Default::default()
        }
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct CompletionResponse {
    pub response: String,
}

/// Opaque "generate text from multimodal input" capability.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(&self, request: GenerateRequest) -> Result<CompletionResponse, BoxError>;

    fn get_model(&self) -> String;
}

#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

pub fn new_client(config: &LlmConfig) -> Result<Arc<dyn GenerationClient>, BoxError> {
    let client = GeminiChatClient::from_config(config)?;
    Ok(Arc::new(client))
}
