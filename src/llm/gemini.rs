use async_trait::async_trait;
use base64::{ engine::general_purpose::STANDARD, Engine as _ };
use log::{ info, warn };
use reqwest::{ Client as HttpClient, header::{ HeaderMap, HeaderValue, CONTENT_TYPE } };
use serde::{ Deserialize, Serialize };

use super::{ CompletionResponse, GenerateRequest, GenerationClient, LlmConfig, Part };
use crate::error::BoxError;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiBlob,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiBlob {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleResponse {
    #[serde(default)]
    candidates: Vec<GoogleCandidate>,
    prompt_feedback: Option<GooglePromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleCandidate {
    content: Option<GoogleContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct GoogleContent {
    #[serde(default)]
    parts: Vec<GooglePart>,
}

#[derive(Deserialize)]
struct GooglePart {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GooglePromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct GoogleErrorBody {
    error: GoogleErrorDetail,
}

#[derive(Deserialize)]
struct GoogleErrorDetail {
    message: String,
}

fn build_payload(request: GenerateRequest) -> GeminiRequest {
    let parts = request.parts
        .into_iter()
        .map(|part| match part {
            Part::Text(text) => GeminiPart::Text { text },
            Part::InlineImage { media_type, data } =>
                GeminiPart::InlineData {
                    inline_data: GeminiBlob {
                        mime_type: media_type.as_mime().to_string(),
                        data: STANDARD.encode(data),
                    },
                },
        })
        .collect();

    GeminiRequest {
        system_instruction: request.system_instruction.map(|text| GeminiContent {
            role: None,
            parts: vec![GeminiPart::Text { text }],
        }),
        contents: vec![GeminiContent {
            role: Some("user".to_string()),
            parts,
        }],
        generation_config: request.temperature.map(|temperature| GenerationConfig { temperature }),
    }
}

/// Concatenates the non-thought text parts of the first candidate.
fn extract_text(response: GoogleResponse) -> Result<String, BoxError> {
    let candidate = match response.candidates.into_iter().next() {
        Some(c) => c,
        None => {
            let reason = response.prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "no candidates returned".to_string());
            return Err(format!("Gemini returned no answer: {}", reason).into());
        }
    };

    let text: String = candidate.content
        .map(|c| c.parts)
        .unwrap_or_default()
        .into_iter()
        .filter(|p| !p.thought)
        .filter_map(|p| p.text)
        .collect();

    if text.is_empty() {
        let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".to_string());
        return Err(format!("Gemini candidate has no text (finish reason: {})", reason).into());
    }
    Ok(text)
}

pub struct GeminiChatClient {
    http: HttpClient,
    model: String,
    base_url: String,
}

impl GeminiChatClient {
    pub fn new(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>
    ) -> Result<Self, BoxError> {
        let model = model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let base_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let mut key_header = HeaderValue::from_str(&api_key).map_err(|e|
            format!("Invalid API key format: {}", e)
        )?;
        key_header.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("x-goog-api-key", key_header);

        let http = HttpClient::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| Box::new(e) as BoxError)?;

        Ok(Self { http, model, base_url })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, BoxError> {
        let api_key = config.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| "Google API key is required for GeminiChatClient".to_string())?;
        Self::new(api_key, config.model.clone(), config.base_url.clone())
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url.trim_end_matches('/'), self.model)
    }
}

#[async_trait]
impl GenerationClient for GeminiChatClient {
    async fn generate(&self, request: GenerateRequest) -> Result<CompletionResponse, BoxError> {
        info!(
            "GeminiChatClient::generate() → model={} parts={} temperature={:?}",
            self.model,
            request.parts.len(),
            request.temperature
        );
        let payload = build_payload(request);

        let resp = self.http.post(self.endpoint()).json(&payload).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let detail = serde_json
                ::from_str::<GoogleErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or(body);
            warn!("Gemini request failed with {}", status);
            return Err(format!("Gemini API returned {}: {}", status, detail).into());
        }

        let parsed: GoogleResponse = resp.json().await?;
        let response = extract_text(parsed)?;
        Ok(CompletionResponse { response })
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }
}
