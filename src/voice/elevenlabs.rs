//! ElevenLabs文字转语音

use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

use super::{Speaker, voice_error};
use crate::config::VoiceConfig;
use crate::error::{ProviderKind, ResearchError, Result};

const BASE_URL: &str = "https://api.elevenlabs.io/v1/text-to-speech";

pub struct ElevenLabsSpeaker {
    api_key: String,
    http: reqwest::Client,
    default_voice_id: String,
    model_id: String,
}

fn speech_error(err: impl std::fmt::Display) -> ResearchError {
    voice_error(ProviderKind::Speech, "elevenlabs", err)
}

impl ElevenLabsSpeaker {
    pub fn new(api_key: String, config: &VoiceConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.max(1)))
            .build()
            .map_err(speech_error)?;
        Ok(Self {
            api_key,
            http,
            default_voice_id: config.voice_id.clone(),
            model_id: config.model_id.clone(),
        })
    }

    fn endpoint(&self, voice_id: Option<&str>) -> String {
        let voice = voice_id
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(&self.default_voice_id);
        format!("{}/{}", BASE_URL, voice)
    }
}

#[async_trait]
impl Speaker for ElevenLabsSpeaker {
    async fn synthesize(&self, text: &str, voice_id: Option<&str>) -> Result<Vec<u8>> {
        let resp = self
            .http
            .post(self.endpoint(voice_id))
            .header("xi-api-key", &self.api_key)
            .header("accept", "audio/mpeg")
            .json(&json!({
                "text": text,
                "model_id": self.model_id,
            }))
            .send()
            .await
            .map_err(speech_error)?;

        if !resp.status().is_success() {
            let status = resp.status();
            let detail = resp.text().await.unwrap_or_default();
            return Err(speech_error(format!(
                "{} {}",
                status,
                detail.chars().take(200).collect::<String>()
            )));
        }

        let bytes = resp.bytes().await.map_err(speech_error)?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_uses_default_voice() {
        let speaker = ElevenLabsSpeaker::new("key".to_string(), &VoiceConfig::default()).unwrap();
        assert_eq!(
            speaker.endpoint(None),
            "https://api.elevenlabs.io/v1/text-to-speech/21m00Tcm4TlvDq8ikWAM"
        );
        assert_eq!(
            speaker.endpoint(Some("custom")),
            "https://api.elevenlabs.io/v1/text-to-speech/custom"
        );
        assert!(speaker.endpoint(Some(" ")).ends_with("21m00Tcm4TlvDq8ikWAM"));
    }
}
