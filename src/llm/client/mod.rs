//! LLM客户端 - 提供统一的LLM服务接口

use anyhow::{Context, Result, anyhow};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

use crate::{config::LLMConfig, llm::client::utils::evaluate_befitting_model};

mod providers;
pub mod utils;

use providers::ProviderClient;

/// LLM客户端 - 提供统一的LLM服务接口
#[derive(Clone)]
pub struct LLMClient {
    config: LLMConfig,
    client: ProviderClient,
}

impl LLMClient {
    /// 创建新的LLM客户端，缺少密钥时直接报错
    pub fn new(config: LLMConfig) -> Result<Self> {
        let api_key = config.resolved_api_key().with_context(|| {
            format!(
                "missing API key for {} (set {} or llm.api_key)",
                config.provider,
                config.provider.api_key_env().unwrap_or("llm.api_key")
            )
        })?;
        let client = ProviderClient::new(&config, &api_key)?;
        Ok(Self { client, config })
    }

    /// 检查模型连接和功能是否正常
    pub async fn check_connection(&self) -> Result<()> {
        println!("🔄 正在检查模型连接...");
        match self
            .prompt("System: You are a helpful assistant.", "Hello")
            .await
        {
            Ok(_) => {
                println!("✅ 模型连接正常");
                Ok(())
            }
            Err(e) => {
                eprintln!("❌ 模型连接失败: {}", e);
                Err(e)
            }
        }
    }

    /// 通用重试逻辑，每次调用都受超时限制
    async fn retry_with_backoff<T, F, Fut>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, anyhow::Error>>,
    {
        let max_retries = self.config.retry_attempts.max(1);
        let retry_delay_ms = self.config.retry_delay_ms;
        let timeout = Duration::from_secs(self.config.timeout_seconds.max(1));
        let mut retries = 0;

        loop {
            let outcome = match tokio::time::timeout(timeout, operation()).await {
                Ok(result) => result,
                Err(_) => Err(anyhow!(
                    "model call timed out after {}s",
                    timeout.as_secs()
                )),
            };

            match outcome {
                Ok(result) => return Ok(result),
                Err(err) => {
                    retries += 1;
                    tracing::warn!(
                        attempt = retries,
                        max_retries,
                        error = %err,
                        "model call failed"
                    );
                    if retries >= max_retries {
                        return Err(err);
                    }
                    tokio::time::sleep(Duration::from_millis(retry_delay_ms)).await;
                }
            }
        }
    }

    /// 结构化数据提取
    pub async fn extract<T>(&self, system_prompt: &str, user_prompt: &str) -> Result<T>
    where
        T: JsonSchema + for<'a> Deserialize<'a> + Serialize + Send + Sync + 'static,
    {
        let (befitting_model, fallover_model) =
            evaluate_befitting_model(&self.config, system_prompt, user_prompt);

        self.extract_inner(system_prompt, user_prompt, befitting_model, fallover_model)
            .await
    }

    async fn extract_inner<T>(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        befitting_model: String,
        fallover_model: Option<String>,
    ) -> Result<T>
    where
        T: JsonSchema + for<'a> Deserialize<'a> + Serialize + Send + Sync + 'static,
    {
        let extractor =
            self.client
                .create_extractor::<T>(&befitting_model, system_prompt, &self.config);

        match self
            .retry_with_backoff(|| async { extractor.extract(user_prompt).await })
            .await
        {
            Ok(result) => Ok(result),
            Err(e) => match fallover_model {
                Some(model) => {
                    eprintln!(
                        "❌ 调用模型服务出错，尝试 {} 次均失败，尝试使用备选模型{}...{}",
                        self.config.retry_attempts, model, e
                    );
                    let user_prompt_with_fixer = format!(
                        "{}\n\nNOTE: a previous attempt failed with \"{}\". Make sure your answer avoids this error.",
                        user_prompt, e
                    );
                    Box::pin(self.extract_inner(
                        system_prompt,
                        &user_prompt_with_fixer,
                        model,
                        None,
                    ))
                    .await
                }
                None => {
                    eprintln!(
                        "❌ 调用模型服务出错，尝试 {} 次均失败...{}",
                        self.config.retry_attempts, e
                    );
                    Err(e)
                }
            },
        }
    }

    /// 单轮文本对话，使用调研温度
    pub async fn prompt(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        self.prompt_with_temperature(system_prompt, user_prompt, self.config.temperature)
            .await
    }

    /// 闲聊模式对话，使用更高的温度
    pub async fn chat(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        self.prompt_with_temperature(system_prompt, user_prompt, self.config.chat_temperature)
            .await
    }

    async fn prompt_with_temperature(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f64,
    ) -> Result<String> {
        let (model, _) = evaluate_befitting_model(&self.config, system_prompt, user_prompt);
        let agent = self
            .client
            .create_agent(&model, system_prompt, &self.config, temperature);

        self.retry_with_backoff(|| async { agent.prompt(user_prompt).await })
            .await
    }
}
