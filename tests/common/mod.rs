#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{ Arc, Mutex };
use tokio::sync::Notify;

use roomcast::config::prompt::PromptConfig;
use roomcast::error::BoxError;
use roomcast::llm::{ CompletionResponse, GenerateRequest, GenerationClient, Part };
use roomcast::services::{ ChatService, DescriptionService };
use roomcast::shell::Shell;
use roomcast::store::SessionStore;

pub const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

/// Replies from a queue and records every request. An empty queue answers "ok".
/// With a gate set, image requests (or every request, see `gated_all`) wait
/// for the gate to be notified.
#[derive(Default)]
pub struct ScriptedClient {
    replies: Mutex<VecDeque<Result<String, String>>>,
    requests: Mutex<Vec<GenerateRequest>>,
    gate: Option<Arc<Notify>>,
    gate_all: bool,
}

impl ScriptedClient {
    pub fn new(replies: Vec<Result<&str, &str>>) -> Arc<Self> {
        Arc::new(Self::with_replies(replies))
    }

    pub fn gated(replies: Vec<Result<&str, &str>>) -> (Arc<Self>, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let mut client = Self::with_replies(replies);
        client.gate = Some(gate.clone());
        (Arc::new(client), gate)
    }

    pub fn gated_all(replies: Vec<Result<&str, &str>>) -> (Arc<Self>, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let mut client = Self::with_replies(replies);
        client.gate = Some(gate.clone());
        client.gate_all = true;
        (Arc::new(client), gate)
    }

    fn with_replies(replies: Vec<Result<&str, &str>>) -> Self {
        Self {
            replies: Mutex::new(
                replies
                    .into_iter()
                    .map(|r| r.map(str::to_string).map_err(str::to_string))
                    .collect()
            ),
            ..Default::default()
        }
    }

    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl GenerationClient for ScriptedClient {
    async fn generate(&self, request: GenerateRequest) -> Result<CompletionResponse, BoxError> {
        let has_image = request.parts.iter().any(|p| matches!(p, Part::InlineImage { .. }));
        self.requests.lock().unwrap().push(request);
        // Taken before waiting so replies follow call order.
        let next = self.replies.lock().unwrap().pop_front();

        if let (Some(gate), true) = (&self.gate, has_image || self.gate_all) {
            gate.notified().await;
        }

        match next.unwrap_or_else(|| Ok("ok".to_string())) {
            Ok(response) => Ok(CompletionResponse { response }),
            Err(message) => Err(message.into()),
        }
    }

    fn get_model(&self) -> String {
        "scripted".to_string()
    }
}

pub fn shell_with(client: Arc<ScriptedClient>) -> Shell {
    let prompts = Arc::new(PromptConfig::default());
    let describer = DescriptionService::new(client.clone(), prompts.clone());
    let chat = ChatService::new(client, prompts);
    Shell::new(describer, chat, SessionStore::new())
}

/// Text of the single text part of a chat request.
pub fn prompt_text(request: &GenerateRequest) -> String {
    request.parts
        .iter()
        .find_map(|p| match p {
            Part::Text(t) => Some(t.clone()),
            _ => None,
        })
        .unwrap_or_default()
}
