use chrono::SecondsFormat;
use log::{ error, info };
use std::sync::Arc;

use crate::config::prompt::PromptConfig;
use crate::error::ServiceError;
use crate::llm::{ GenerateRequest, GenerationClient, Part };
use crate::models::{ ChatMessage, TimelineEntry };

pub const EMPTY_TIMELINE_PLACEHOLDER: &str = "No room images have been uploaded yet.";
pub const DEFAULT_CHAT_TEMPERATURE: f32 = 0.7;

const ENTRY_SEPARATOR: &str = "\n---\n";

/// Renders `timeline` (given oldest first) newest first.
pub fn format_timeline(timeline: &[TimelineEntry]) -> String {
    if timeline.is_empty() {
        return EMPTY_TIMELINE_PLACEHOLDER.to_string();
    }
    timeline
        .iter()
        .rev()
        .map(|entry| {
            format!(
                "Timestamp: {}\nDescription: {}",
                entry.captured_at.to_rfc3339_opts(SecondsFormat::Millis, true),
                entry.description
            )
        })
        .collect::<Vec<_>>()
        .join(ENTRY_SEPARATOR)
}

pub fn format_history(history: &[ChatMessage]) -> String {
    history
        .iter()
        .map(|msg| format!("{}: {}", msg.author, msg.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Answers questions about the room using the timeline and prior chat as context.
#[derive(Clone)]
pub struct ChatService {
    client: Arc<dyn GenerationClient>,
    prompts: Arc<PromptConfig>,
    temperature: f32,
}

impl ChatService {
    pub fn new(client: Arc<dyn GenerationClient>, prompts: Arc<PromptConfig>) -> Self {
        Self {
            client,
            prompts,
            temperature: DEFAULT_CHAT_TEMPERATURE,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn build_prompt(
        &self,
        message: &str,
        timeline: &[TimelineEntry],
        history: &[ChatMessage]
    ) -> String {
        self.prompts.render_chat_prompt(
            &format_timeline(timeline),
            &format_history(history),
            message
        )
    }

    /// `history` is the conversation before `message`.
    pub async fn reply(
        &self,
        message: &str,
        timeline: &[TimelineEntry],
        history: &[ChatMessage]
    ) -> Result<String, ServiceError> {
        let prompt = self.build_prompt(message, timeline, history);
        let request = GenerateRequest::new(vec![Part::Text(prompt)])
            .with_system_instruction(self.prompts.chat_system_instruction.clone())
            .with_temperature(self.temperature);

        match self.client.generate(request).await {
            Ok(resp) => {
                info!(
                    "Chat reply generated (timeline={} history={})",
                    timeline.len(),
                    history.len()
                );
                Ok(resp.response)
            }
            Err(e) => {
                error!("Error getting chatbot response: {}", e);
                Err(ServiceError::ChatFailed(Some(e)))
            }
        }
    }
}
