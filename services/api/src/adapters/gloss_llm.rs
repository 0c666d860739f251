//! services/api/src/adapters/gloss_llm.rs
//!
//! Gloss generation through a chat-completion model, used instead of the NLP
//! service's `/pictos-to-text` when configured.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use pictolink_core::domain::{Language, Pictogram};
use pictolink_core::ports::{GlossService, PortError, PortResult};

const SYSTEM_PROMPT: &str = "Eres un asistente de comunicación aumentativa. Recibes una secuencia de \
pictogramas ARASAAC, cada uno con su etiqueta en español, en el orden en que el usuario los eligió. \
Escribe UNA sola frase natural en español, en primera persona cuando tenga sentido, que exprese lo \
que el usuario quiere decir. Responde solo con la frase, sin comillas ni explicaciones.";

#[derive(Clone)]
pub struct OpenAiGlossAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiGlossAdapter {
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

fn to_port_error(e: OpenAIError) -> PortError {
    PortError::Unexpected(e.to_string())
}

#[async_trait]
impl GlossService for OpenAiGlossAdapter {
    async fn pictograms_to_text(&self, pictograms: &[Pictogram]) -> PortResult<String> {
        let labels: Vec<&str> = pictograms
            .iter()
            .map(|p| p.display_label(Language::Es))
            .collect();

        let messages = vec![
            ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(SYSTEM_PROMPT)
                    .build()
                    .map_err(to_port_error)?,
            ),
            ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(format!("Pictogramas: {}", labels.join(", ")))
                    .build()
                    .map_err(to_port_error)?,
            ),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(self.model.clone())
            .messages(messages)
            .max_tokens(60u32)
            .temperature(0.3)
            .build()
            .map_err(to_port_error)?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(to_port_error)?;

        let text = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| PortError::Unexpected("No gloss generated".to_string()))?;

        Ok(text.trim().trim_matches('"').to_string())
    }
}
