//! AssemblyAI语音转写：上传音频 → 创建转写任务 → 轮询结果

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::{Transcriber, voice_error};
use crate::config::VoiceConfig;
use crate::error::{ProviderKind, ResearchError, Result};

const BASE_URL: &str = "https://api.assemblyai.com/v2";
const POLL_INTERVAL: Duration = Duration::from_millis(500);

pub struct AssemblyAiTranscriber {
    api_key: String,
    http: reqwest::Client,
    max_wait: Duration,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    upload_url: String,
}

/// 转写任务状态
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TranscriptResponse {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// 单次轮询的结论
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Pending,
    Completed(String),
    Failed(String),
}

impl TranscriptResponse {
    pub fn outcome(&self) -> PollOutcome {
        match self.status.as_str() {
            "completed" => PollOutcome::Completed(self.text.clone().unwrap_or_default()),
            "error" => PollOutcome::Failed(
                self.error
                    .clone()
                    .unwrap_or_else(|| "unknown transcription error".to_string()),
            ),
            _ => PollOutcome::Pending,
        }
    }
}

fn transcription_error(err: impl std::fmt::Display) -> ResearchError {
    voice_error(ProviderKind::Transcription, "assemblyai", err)
}

impl AssemblyAiTranscriber {
    pub fn new(api_key: String, config: &VoiceConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.max(1)))
            .build()
            .map_err(transcription_error)?;
        Ok(Self {
            api_key,
            http,
            max_wait: Duration::from_secs(config.transcription_wait_seconds.max(1)),
        })
    }

    async fn upload(&self, audio: Vec<u8>) -> Result<String> {
        let resp = self
            .http
            .post(format!("{}/upload", BASE_URL))
            .header("authorization", &self.api_key)
            .body(audio)
            .send()
            .await
            .map_err(transcription_error)?;
        if !resp.status().is_success() {
            return Err(transcription_error(format!("upload failed: {}", resp.status())));
        }
        let upload: UploadResponse = resp.json().await.map_err(transcription_error)?;
        Ok(upload.upload_url)
    }

    async fn create_transcript(&self, audio_url: &str) -> Result<TranscriptResponse> {
        let resp = self
            .http
            .post(format!("{}/transcript", BASE_URL))
            .header("authorization", &self.api_key)
            .json(&json!({ "audio_url": audio_url }))
            .send()
            .await
            .map_err(transcription_error)?;
        if !resp.status().is_success() {
            return Err(transcription_error(format!(
                "transcript request failed: {}",
                resp.status()
            )));
        }
        resp.json().await.map_err(transcription_error)
    }

    async fn get_transcript(&self, id: &str) -> Result<TranscriptResponse> {
        let resp = self
            .http
            .get(format!("{}/transcript/{}", BASE_URL, id))
            .header("authorization", &self.api_key)
            .send()
            .await
            .map_err(transcription_error)?;
        if !resp.status().is_success() {
            return Err(transcription_error(format!(
                "transcript poll failed: {}",
                resp.status()
            )));
        }
        resp.json().await.map_err(transcription_error)
    }
}

#[async_trait]
impl Transcriber for AssemblyAiTranscriber {
    async fn transcribe(&self, audio: Vec<u8>) -> Result<String> {
        let audio_url = self.upload(audio).await?;
        let mut transcript = self.create_transcript(&audio_url).await?;
        let started = tokio::time::Instant::now();

        loop {
            match transcript.outcome() {
                PollOutcome::Completed(text) => return Ok(text),
                PollOutcome::Failed(error) => return Err(transcription_error(error)),
                PollOutcome::Pending => {}
            }
            if started.elapsed() >= self.max_wait {
                return Err(transcription_error(format!(
                    "transcription not finished after {}s",
                    self.max_wait.as_secs()
                )));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
            transcript = self.get_transcript(&transcript.id).await?;
        }
    }
}
