//! 语音适配：语音转文字（输入）与文字转语音（输出），缺少凭据时退化为纯文本模式

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::VoiceConfig;
use crate::error::{ProviderKind, ResearchError, Result};

pub mod assemblyai;
pub mod elevenlabs;

pub use assemblyai::AssemblyAiTranscriber;
pub use elevenlabs::ElevenLabsSpeaker;

/// 语音转文字能力
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: Vec<u8>) -> Result<String>;
}

/// 文字转语音能力，返回音频字节（mp3）
#[async_trait]
pub trait Speaker: Send + Sync {
    async fn synthesize(&self, text: &str, voice_id: Option<&str>) -> Result<Vec<u8>>;
}

/// 当前可用的语音能力
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceMode {
    Full,
    InputOnly,
    OutputOnly,
    TextOnly,
}

impl std::fmt::Display for VoiceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VoiceMode::Full => write!(f, "voice input and output"),
            VoiceMode::InputOnly => write!(f, "voice input only"),
            VoiceMode::OutputOnly => write!(f, "voice output only"),
            VoiceMode::TextOnly => write!(f, "text only"),
        }
    }
}

/// 语音适配器，两半能力各自可缺省
#[derive(Clone, Default)]
pub struct VoiceAdapter {
    transcriber: Option<Arc<dyn Transcriber>>,
    speaker: Option<Arc<dyn Speaker>>,
    max_speech_chars: usize,
}

impl VoiceAdapter {
    pub fn new(
        transcriber: Option<Arc<dyn Transcriber>>,
        speaker: Option<Arc<dyn Speaker>>,
        max_speech_chars: usize,
    ) -> Self {
        Self {
            transcriber,
            speaker,
            max_speech_chars,
        }
    }

    /// 按配置构建，缺少凭据时对应能力为空，从不报错
    pub fn from_config(config: &VoiceConfig) -> Self {
        let transcriber = config.resolved_assemblyai_key().and_then(|key| {
            match AssemblyAiTranscriber::new(key, config) {
                Ok(t) => Some(Arc::new(t) as Arc<dyn Transcriber>),
                Err(e) => {
                    tracing::warn!(error = %e, "voice input disabled");
                    None
                }
            }
        });
        let speaker = config.resolved_elevenlabs_key().and_then(|key| {
            match ElevenLabsSpeaker::new(key, config) {
                Ok(s) => Some(Arc::new(s) as Arc<dyn Speaker>),
                Err(e) => {
                    tracing::warn!(error = %e, "voice output disabled");
                    None
                }
            }
        });

        let adapter = Self::new(transcriber, speaker, config.max_speech_chars);
        tracing::debug!(mode = %adapter.mode(), "voice adapter ready");
        adapter
    }

    pub fn mode(&self) -> VoiceMode {
        match (self.transcriber.is_some(), self.speaker.is_some()) {
            (true, true) => VoiceMode::Full,
            (true, false) => VoiceMode::InputOnly,
            (false, true) => VoiceMode::OutputOnly,
            (false, false) => VoiceMode::TextOnly,
        }
    }

    pub async fn transcribe(&self, audio: Vec<u8>) -> Result<String> {
        let transcriber = self.transcriber.as_ref().ok_or_else(|| {
            ResearchError::Configuration(
                "voice input unavailable: set ASSEMBLYAI_API_KEY".to_string(),
            )
        })?;
        if audio.is_empty() {
            return Err(ResearchError::Validation("audio input is empty".to_string()));
        }
        transcriber.transcribe(audio).await
    }

    /// 朗读文本，文本会先做清理与截断
    pub async fn speak(&self, text: &str, voice_id: Option<&str>) -> Result<Vec<u8>> {
        let speaker = self.speaker.as_ref().ok_or_else(|| {
            ResearchError::Configuration(
                "voice output unavailable: set ELEVENLABS_API_KEY".to_string(),
            )
        })?;
        let cleaned = clean_text_for_speech(text, self.max_speech_chars);
        if cleaned.is_empty() {
            return Err(ResearchError::Validation(
                "nothing to speak after cleaning".to_string(),
            ));
        }
        speaker.synthesize(&cleaned, voice_id).await
    }
}

/// 去掉markdown标记，合并空白，并截断到最大字符数
pub fn clean_text_for_speech(text: &str, max_chars: usize) -> String {
    let stripped: String = text
        .chars()
        .filter(|c| !matches!(c, '*' | '#' | '`'))
        .collect();
    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(max_chars).collect()
}

pub(crate) fn voice_error(kind: ProviderKind, provider: &str, err: impl std::fmt::Display) -> ResearchError {
    ResearchError::provider(kind, format!("{}: {}", provider, err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct EchoTranscriber;

    #[async_trait]
    impl Transcriber for EchoTranscriber {
        async fn transcribe(&self, audio: Vec<u8>) -> Result<String> {
            Ok(String::from_utf8_lossy(&audio).to_string())
        }
    }

    #[derive(Default)]
    struct RecordingSpeaker {
        spoken: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Speaker for RecordingSpeaker {
        async fn synthesize(&self, text: &str, _voice_id: Option<&str>) -> Result<Vec<u8>> {
            self.spoken.lock().unwrap().push(text.to_string());
            Ok(text.as_bytes().to_vec())
        }
    }

    #[test]
    fn test_clean_text_for_speech() {
        let text = "## Summary\n\n**Acme** is `great`\n\n- item";
        assert_eq!(
            clean_text_for_speech(text, 2500),
            "Summary Acme is great - item"
        );
        assert_eq!(clean_text_for_speech("abcdef", 3), "abc");
    }

    #[test]
    fn test_missing_keys_mean_text_only() {
        let adapter = VoiceAdapter::default();
        assert_eq!(adapter.mode(), VoiceMode::TextOnly);
    }

    #[tokio::test]
    async fn test_text_only_adapter_reports_configuration_error() {
        let adapter = VoiceAdapter::default();
        assert!(matches!(
            adapter.transcribe(vec![1, 2, 3]).await,
            Err(ResearchError::Configuration(_))
        ));
        assert!(matches!(
            adapter.speak("hello", None).await,
            Err(ResearchError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_adapter_cleans_text_before_speaking() {
        let speaker = Arc::new(RecordingSpeaker::default());
        let adapter = VoiceAdapter::new(
            Some(Arc::new(EchoTranscriber)),
            Some(speaker.clone()),
            10,
        );
        assert_eq!(adapter.mode(), VoiceMode::Full);

        adapter.speak("# Hello   **world** again", None).await.unwrap();
        assert_eq!(speaker.spoken.lock().unwrap()[0], "Hello worl");

        let text = adapter.transcribe(b"research acme".to_vec()).await.unwrap();
        assert_eq!(text, "research acme");
    }
}
