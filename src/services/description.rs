use log::{ error, info };
use std::sync::Arc;

use crate::config::prompt::PromptConfig;
use crate::error::ServiceError;
use crate::llm::{ GenerateRequest, GenerationClient, Part };
use crate::models::MediaType;

/// Turns one room photo into a prose description.
#[derive(Clone)]
pub struct DescriptionService {
    client: Arc<dyn GenerationClient>,
    prompts: Arc<PromptConfig>,
}

impl DescriptionService {
    pub fn new(client: Arc<dyn GenerationClient>, prompts: Arc<PromptConfig>) -> Self {
        Self { client, prompts }
    }

    pub async fn describe_image(
        &self,
        bytes: &[u8],
        media_type: MediaType
    ) -> Result<String, ServiceError> {
        if bytes.is_empty() {
            error!("Refusing to describe an empty image payload");
            return Err(ServiceError::DescriptionFailed(Some("empty image payload".into())));
        }

        let request = GenerateRequest::new(
            vec![
                Part::InlineImage { media_type, data: bytes.to_vec() },
                Part::Text(self.prompts.description_instruction.clone())
            ]
        );

        match self.client.generate(request).await {
            Ok(resp) => {
                info!("Described {} image ({} bytes)", media_type, bytes.len());
                Ok(resp.response)
            }
            Err(e) => {
                error!("Error generating image description: {}", e);
                Err(ServiceError::DescriptionFailed(Some(e)))
            }
        }
    }
}
