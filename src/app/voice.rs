use anyhow::{Context, Result};

use super::AppContext;
use crate::cli::VoiceCommand;

pub async fn execute(context: &AppContext, action: VoiceCommand) -> Result<()> {
    match action {
        VoiceCommand::Status => {
            println!("🎙️ 语音模式: {}", context.voice.mode());
        }
        VoiceCommand::Transcribe { audio } => {
            let bytes = tokio::fs::read(&audio)
                .await
                .with_context(|| format!("无法读取音频文件 {:?}", audio))?;
            println!("🎧 正在转写 {}...", audio.display());
            let text = context.voice.transcribe(bytes).await?;
            println!("{}", text);
        }
        VoiceCommand::Speak {
            text,
            output,
            voice_id,
        } => {
            let audio = context.voice.speak(&text, voice_id.as_deref()).await?;
            tokio::fs::write(&output, audio)
                .await
                .with_context(|| format!("无法写入 {:?}", output))?;
            println!("🔊 语音已写入: {}", output.display());
        }
    }
    Ok(())
}
