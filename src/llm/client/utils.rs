use crate::config::LLMConfig;

/// 输入总长度的分界线，超过后直接使用能力更强的模型
const EFFICIENT_MODEL_INPUT_LIMIT: usize = 32 * 1024;

/// 根据输入长度选择模型，返回 (首选模型, 备选模型)
pub fn evaluate_befitting_model(
    llm_config: &LLMConfig,
    system_prompt: &str,
    user_prompt: &str,
) -> (String, Option<String>) {
    if system_prompt.len() + user_prompt.len() <= EFFICIENT_MODEL_INPUT_LIMIT {
        let fallover = if llm_config.model_powerful != llm_config.model_efficient {
            Some(llm_config.model_powerful.clone())
        } else {
            None
        };
        return (llm_config.model_efficient.clone(), fallover);
    }
    (llm_config.model_powerful.clone(), None)
}
