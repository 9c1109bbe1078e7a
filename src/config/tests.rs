#[cfg(test)]
mod tests {
    use crate::config::{
        CacheConfig, Config, LLMConfig, LLMProvider, ResearchConfig, SearchApi, VoiceConfig,
    };
    use crate::error::ResearchError;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();

        assert_eq!(config.llm.provider, LLMProvider::Groq);
        assert_eq!(config.research.search_api, SearchApi::DuckDuckGo);
        assert_eq!(config.research.max_iterations, 1);
        assert_eq!(config.storage.base_dir, PathBuf::from("research_documents"));
        assert!(!config.verbose);
    }

    #[test]
    fn test_llm_provider_from_str() {
        assert_eq!("groq".parse::<LLMProvider>().unwrap(), LLMProvider::Groq);
        assert_eq!("GROQ".parse::<LLMProvider>().unwrap(), LLMProvider::Groq);
        assert_eq!(
            "openai".parse::<LLMProvider>().unwrap(),
            LLMProvider::OpenAI
        );
        assert_eq!(
            "deepseek".parse::<LLMProvider>().unwrap(),
            LLMProvider::DeepSeek
        );
        assert_eq!(
            "anthropic".parse::<LLMProvider>().unwrap(),
            LLMProvider::Anthropic
        );
        assert_eq!(
            "ollama".parse::<LLMProvider>().unwrap(),
            LLMProvider::Ollama
        );

        assert!("invalid".parse::<LLMProvider>().is_err());
    }

    #[test]
    fn test_llm_provider_display_round_trips() {
        for provider in [
            LLMProvider::Groq,
            LLMProvider::OpenAI,
            LLMProvider::DeepSeek,
            LLMProvider::Anthropic,
            LLMProvider::Ollama,
        ] {
            assert_eq!(provider.to_string().parse::<LLMProvider>().unwrap(), provider);
        }
    }

    #[test]
    fn test_llm_provider_api_key_env() {
        assert_eq!(LLMProvider::Groq.api_key_env(), Some("GROQ_API_KEY"));
        assert_eq!(LLMProvider::OpenAI.api_key_env(), Some("OPENAI_API_KEY"));
        assert_eq!(LLMProvider::Ollama.api_key_env(), None);
        assert!(LLMProvider::Groq.default_base_url().contains("groq.com"));
    }

    #[test]
    fn test_search_api_from_str() {
        assert_eq!(
            "duckduckgo".parse::<SearchApi>().unwrap(),
            SearchApi::DuckDuckGo
        );
        assert_eq!("ddg".parse::<SearchApi>().unwrap(), SearchApi::DuckDuckGo);
        assert_eq!("tavily".parse::<SearchApi>().unwrap(), SearchApi::Tavily);
        assert_eq!("serp".parse::<SearchApi>().unwrap(), SearchApi::SerpApi);
        assert_eq!(
            "perplexity".parse::<SearchApi>().unwrap(),
            SearchApi::Perplexity
        );
        assert_eq!("none".parse::<SearchApi>().unwrap(), SearchApi::None);
        assert!("bing".parse::<SearchApi>().is_err());
    }

    #[test]
    fn test_search_api_key_env() {
        assert_eq!(SearchApi::DuckDuckGo.api_key_env(), None);
        assert_eq!(SearchApi::None.api_key_env(), None);
        assert_eq!(SearchApi::Tavily.api_key_env(), Some("TAVILY_API_KEY"));
        assert_eq!(SearchApi::SerpApi.api_key_env(), Some("SERPAPI_API_KEY"));
        assert_eq!(
            SearchApi::Perplexity.api_key_env(),
            Some("PERPLEXITY_API_KEY")
        );
    }

    #[test]
    fn test_llm_config_default() {
        let config = LLMConfig::default();

        assert_eq!(config.provider, LLMProvider::Groq);
        assert_eq!(config.api_base_url, "https://api.groq.com/openai/v1");
        assert_eq!(config.model_efficient, "llama-3.3-70b-versatile");
        assert_eq!(config.model_powerful, "llama-3.3-70b-versatile");
        assert_eq!(config.max_tokens, 8000);
        assert_eq!(config.temperature, 0.1);
        assert_eq!(config.chat_temperature, 0.7);
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.timeout_seconds, 120);
    }

    #[test]
    fn test_research_config_default() {
        let config = ResearchConfig::default();

        assert_eq!(config.max_iterations, 1);
        assert_eq!(config.max_queries_per_iteration, 3);
        assert_eq!(config.max_results_per_query, 5);
        assert_eq!(config.stagnation_limit, 1);
        assert_eq!(config.max_consecutive_search_failures, 2);
        assert!(config.assemble_plan);
    }

    #[test]
    fn test_voice_and_cache_defaults() {
        let voice = VoiceConfig::default();
        assert_eq!(voice.voice_id, "21m00Tcm4TlvDq8ikWAM");
        assert_eq!(voice.model_id, "eleven_multilingual_v2");
        assert_eq!(voice.max_speech_chars, 2500);
        assert_eq!(voice.transcription_wait_seconds, 30);

        let cache = CacheConfig::default();
        assert!(cache.enabled);
        assert_eq!(cache.expire_hours, 24);
    }

    #[test]
    fn test_explicit_api_key_wins() {
        let llm = LLMConfig {
            api_key: "explicit-key".to_string(),
            ..Default::default()
        };
        assert_eq!(llm.resolved_api_key(), Some("explicit-key".to_string()));
    }

    #[test]
    fn test_ollama_needs_no_key() {
        let llm = LLMConfig {
            provider: LLMProvider::Ollama,
            ..Default::default()
        };
        assert_eq!(llm.resolved_api_key(), Some(String::new()));
    }

    #[test]
    fn test_validate_rejects_zero_iterations() {
        let mut config = Config::default();
        config.llm.api_key = "key".to_string();
        config.research.max_iterations = 0;

        let err = config.validate().unwrap_err();
        assert!(matches!(err, ResearchError::Configuration(_)));
    }

    #[test]
    fn test_validate_accepts_explicit_key() {
        let mut config = Config::default();
        config.llm.api_key = "key".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_storage_dirs() {
        let config = Config::default();
        assert_eq!(
            config.storage.documents_dir(),
            PathBuf::from("research_documents/documents")
        );
        assert_eq!(
            config.storage.exports_dir(),
            PathBuf::from("research_documents/exports")
        );
    }

    #[test]
    fn test_config_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("company-research.toml");

        let config_content = r#"
verbose = true

[llm]
provider = "openai"
api_key = "test-key"
api_base_url = "https://api.openai.com/v1"
model_efficient = "gpt-4o-mini"
model_powerful = "gpt-4o"

[research]
max_iterations = 3
search_api = "tavily"
stagnation_limit = 2

[storage]
base_dir = "/tmp/plans"
"#;
        std::fs::write(&config_path, config_content).unwrap();

        let config = Config::from_file(&config_path).unwrap();

        assert!(config.verbose);
        assert_eq!(config.llm.provider, LLMProvider::OpenAI);
        assert_eq!(config.llm.api_key, "test-key");
        assert_eq!(config.llm.model_powerful, "gpt-4o");
        // 未出现的字段取默认值
        assert_eq!(config.llm.retry_attempts, 3);
        assert_eq!(config.research.max_iterations, 3);
        assert_eq!(config.research.search_api, SearchApi::Tavily);
        assert_eq!(config.research.stagnation_limit, 2);
        assert_eq!(config.research.max_results_per_query, 5);
        assert_eq!(config.storage.base_dir, PathBuf::from("/tmp/plans"));
        assert!(config.cache.enabled);
    }

    #[test]
    fn test_config_from_missing_file() {
        let result = Config::from_file(&PathBuf::from("/nonexistent/company-research.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_config_from_invalid_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("broken.toml");
        std::fs::write(&config_path, "[llm\nprovider = ").unwrap();

        assert!(Config::from_file(&config_path).is_err());
    }
}
