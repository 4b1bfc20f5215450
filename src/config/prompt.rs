use serde::Deserialize;
use std::error::Error;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use log::info;

const DESCRIPTION_INSTRUCTION: &str =
    "You are an expert interior designer. Describe this room in vivid detail. \
Focus on the style, key furniture pieces, color palette, lighting, and overall mood. \
Be descriptive and engaging. Start with a captivating summary sentence.";

const CHAT_SYSTEM_INSTRUCTION: &str =
    "You are RoomCast AI, a helpful assistant specializing in analyzing changes in rooms over time.
You have access to a timeline of room images with descriptions.
Your primary goal is to answer user questions about these rooms based on the provided context.
When asked 'what changed since X', compare the most recent entry with the one closest to time X and summarize the differences.
If there is no other entry to compare with, say so.
Be concise and helpful.";

const CHAT_PROMPT: &str =
    "
CONTEXT: ROOM FEED TIMELINE
Room snapshots, newest first:
{timeline}

CONTEXT: CHAT HISTORY
{history}

USER'S NEW MESSAGE:
user: {message}

assistant:
";

const CHAT_PLACEHOLDERS: [&str; 3] = ["{timeline}", "{history}", "{message}"];

#[derive(Debug)]
pub enum PromptError {
    MissingPlaceholder(String),
    IoError(std::io::Error),
    JsonError(serde_json::Error),
}

impl fmt::Display for PromptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptError::MissingPlaceholder(key) =>
                write!(f, "Chat prompt template is missing placeholder '{}'", key),
            PromptError::IoError(e) => write!(f, "Prompt file IO error: {}", e),
            PromptError::JsonError(e) => write!(f, "Prompt JSON parsing error: {}", e),
        }
    }
}

impl Error for PromptError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PromptError::IoError(e) => Some(e),
            PromptError::JsonError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PromptError {
    fn from(err: std::io::Error) -> Self {
        PromptError::IoError(err)
    }
}

impl From<serde_json::Error> for PromptError {
    fn from(err: serde_json::Error) -> Self {
        PromptError::JsonError(err)
    }
}

/// Fixed instructions sent to the generation service. Any key left out of an
/// override file keeps its built-in value.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PromptConfig {
    pub description_instruction: String,
    pub chat_system_instruction: String,
    pub chat_prompt: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            description_instruction: DESCRIPTION_INSTRUCTION.to_string(),
            chat_system_instruction: CHAT_SYSTEM_INSTRUCTION.to_string(),
            chat_prompt: CHAT_PROMPT.to_string(),
        }
    }
}

impl PromptConfig {
    pub fn from_json_str(json: &str) -> Result<Self, PromptError> {
        let config: PromptConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), PromptError> {
        for placeholder in CHAT_PLACEHOLDERS {
            if !self.chat_prompt.contains(placeholder) {
                return Err(PromptError::MissingPlaceholder(placeholder.to_string()));
            }
        }
        Ok(())
    }

    /// Substitutes in a single pass, so placeholder-looking text inside the
    /// values is copied through untouched.
    pub fn render_chat_prompt(&self, timeline: &str, history: &str, message: &str) -> String {
        let values = [("{timeline}", timeline), ("{history}", history), ("{message}", message)];
        let mut out = String::with_capacity(
            self.chat_prompt.len() + timeline.len() + history.len() + message.len()
        );
        let mut rest = self.chat_prompt.as_str();
        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let tail = &rest[start..];
            match values.iter().find(|(key, _)| tail.starts_with(key)) {
                Some((key, value)) => {
                    out.push_str(value);
                    rest = &tail[key.len()..];
                }
                None => {
                    out.push('{');
                    rest = &tail[1..];
                }
            }
        }
        out.push_str(rest);
        out
    }
}

pub fn load_prompts<P: AsRef<Path>>(path: P) -> Result<Arc<PromptConfig>, PromptError> {
    let path = path.as_ref();
    let file_content = fs::read_to_string(path)?;
    let config = PromptConfig::from_json_str(&file_content)?;
    info!("Loaded prompt overrides from {}", path.display());
    Ok(Arc::new(config))
}

/// Built-in prompts unless `path` is given.
pub fn resolve_prompts(path: Option<&str>) -> Result<Arc<PromptConfig>, PromptError> {
    match path {
        Some(p) if !p.trim().is_empty() => load_prompts(p),
        _ => Ok(Arc::new(PromptConfig::default())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(PromptConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_override_keeps_defaults() {
        let config = PromptConfig::from_json_str(
            r#"{ "description_instruction": "List the furniture." }"#
        ).unwrap();
        assert_eq!(config.description_instruction, "List the furniture.");
        assert_eq!(config.chat_prompt, PromptConfig::default().chat_prompt);
    }

    #[test]
    fn template_without_message_is_rejected() {
        let err = PromptConfig::from_json_str(
            r#"{ "chat_prompt": "{timeline} {history}" }"#
        ).unwrap_err();
        assert!(matches!(err, PromptError::MissingPlaceholder(ref p) if p == "{message}"));
    }

    #[test]
    fn user_text_is_not_expanded() {
        let config = PromptConfig::default();
        let prompt = config.render_chat_prompt("T {message}", "user: {history}", "what is {timeline}?");
        assert!(prompt.contains("newest first:\nT {message}\n"));
        assert!(prompt.contains("CHAT HISTORY\nuser: {history}\n"));
        assert!(prompt.contains("user: what is {timeline}?"));
        assert!(prompt.trim_end().ends_with("assistant:"));
    }
}
