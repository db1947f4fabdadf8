//! services/studio/src/adapters/tts.rs
//!
//! This module contains the adapter for OpenAI's Text-to-Speech (TTS) service.
//! It implements the `TextToSpeechService` port from the `core` crate and maps
//! the studio's voice catalog onto OpenAI voices.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::audio::{CreateSpeechRequest, SpeechModel, Voice},
    Client,
};
use async_trait::async_trait;
use sonicwave_core::ports::{PortError, PortResult, TextToSpeechService};
use tracing::info;

use crate::config::TtsModel;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `TextToSpeechService` port using the OpenAI TTS API.
#[derive(Clone)]
pub struct OpenAiTtsAdapter {
    client: Client<OpenAIConfig>,
    model: SpeechModel,
}

impl OpenAiTtsAdapter {
    /// Creates a new `OpenAiTtsAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: TtsModel) -> Self {
        let model = match model {
            TtsModel::Standard => SpeechModel::Tts1,
            TtsModel::HighDefinition => SpeechModel::Tts1Hd,
        };
        Self { client, model }
    }
}

/// The OpenAI voice behind each catalog voice id.
fn openai_voice(voice_id: &str) -> Option<Voice> {
    match voice_id {
        "en-US-1" => Some(Voice::Nova),
        "en-US-2" => Some(Voice::Onyx),
        "en-GB-1" => Some(Voice::Shimmer),
        "en-GB-2" => Some(Voice::Fable),
        _ => None,
    }
}

//=========================================================================================
// `TextToSpeechService` Trait Implementation
//=========================================================================================

#[async_trait]
impl TextToSpeechService for OpenAiTtsAdapter {
    /// Synthesizes `text` with the catalog voice `voice_id` and returns mp3 bytes.
    async fn generate_audio(&self, text: &str, voice_id: &str) -> PortResult<Vec<u8>> {
        let voice = openai_voice(voice_id)
            .ok_or_else(|| PortError::Unexpected(format!("Unknown voice '{}'", voice_id)))?;

        let request = CreateSpeechRequest {
            model: self.model.clone(),
            input: text.to_string(),
            voice,
            ..Default::default()
        };

        // Call the API and manually map the error, which respects the orphan rule.
        let response = self
            .client
            .audio()
            .speech()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        info!("Synthesized {} characters with voice {}", text.chars().count(), voice_id);
        Ok(response.bytes.to_vec())
    }
}
