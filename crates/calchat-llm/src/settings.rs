use std::env;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TEMPERATURE: f32 = 0.2;
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 500;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection and generation settings for the completion endpoint.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl LlmSettings {
    /// Read settings from the environment, falling back to the defaults.
    ///
    /// `CALCHAT_LLM_*` variables take precedence over the generic
    /// `OPENAI_*` ones so the assistant can point at a different
    /// provider without disturbing other tools on the same machine.
    pub fn from_env() -> Self {
        let base_url = env::var("CALCHAT_LLM_BASE_URL")
            .or_else(|_| env::var("OPENAI_BASE_URL"))
            .ok()
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let api_key = env::var("CALCHAT_LLM_API_KEY")
            .or_else(|_| env::var("OPENAI_API_KEY"))
            .ok()
            .filter(|value| !value.is_empty());
        let model = env::var("CALCHAT_LLM_MODEL")
            .ok()
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let temperature = env::var("CALCHAT_LLM_TEMPERATURE")
            .ok()
            .and_then(|value| value.parse::<f32>().ok())
            .unwrap_or(DEFAULT_TEMPERATURE);
        let max_output_tokens = env::var("CALCHAT_LLM_MAX_OUTPUT_TOKENS")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(DEFAULT_MAX_OUTPUT_TOKENS);
        let timeout_secs = env::var("CALCHAT_LLM_TIMEOUT_SECS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self {
            base_url,
            api_key,
            model,
            temperature,
            max_output_tokens,
            timeout_secs,
        }
    }

    /// Full URL of the chat-completions endpoint.
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_deterministic() {
        let settings = LlmSettings::default();
        assert_eq!(settings.base_url, "https://api.openai.com/v1");
        assert_eq!(settings.model, "gpt-4o-mini");
        assert!(settings.api_key.is_none());
    }

    #[test]
    fn completions_url_handles_trailing_slash() {
        let settings = LlmSettings {
            base_url: "https://example.com/v1/".to_string(),
            ..LlmSettings::default()
        };
        assert_eq!(
            settings.completions_url(),
            "https://example.com/v1/chat/completions"
        );
    }
}
