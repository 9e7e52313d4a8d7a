use maple_core::Credential;

use crate::error::ConfigError;

/// Broker configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `5002`).
    pub port: u16,
    /// Access key every connecting session must present. `None` accepts
    /// any connection.
    pub socket_key: Option<String>,
    /// Base URL of the article backend.
    pub backend_url: String,
    /// Base URL of the chat-completions API.
    pub llm_api_url: String,
    pub llm_model: String,
    /// The broker's own credential, used for background sweep jobs.
    pub llm_api_key: Option<Credential>,
    pub sweep_enabled: bool,
    pub sweep_page_size: u32,
}

impl BrokerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                     |
    /// |---------------------------|-----------------------------|
    /// | `HOST`                    | `0.0.0.0`                   |
    /// | `PORT`                    | `5002`                      |
    /// | `MAPLE_CHAT_SOCKET_KEY`   | unset (no auth)             |
    /// | `MAPLE_BACKEND_URL`       | `http://localhost:3000`     |
    /// | `LLM_API_URL`             | `https://api.openai.com/v1` |
    /// | `LLM_MODEL`               | `gpt-3.5-turbo`             |
    /// | `LLM_API_KEY`             | unset                       |
    /// | `ARTICLE_SWEEP_ENABLED`   | `false`                     |
    /// | `ARTICLE_SWEEP_PAGE_SIZE` | `100`                       |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_vars<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| var(name).filter(|v| !v.trim().is_empty());
        let or_default = |name: &str, default: &str| non_empty(name).unwrap_or_else(|| default.into());

        let port = parse(non_empty("PORT"), "PORT", 5002)?;
        let sweep_enabled = parse(non_empty("ARTICLE_SWEEP_ENABLED"), "ARTICLE_SWEEP_ENABLED", false)?;
        let sweep_page_size = parse(non_empty("ARTICLE_SWEEP_PAGE_SIZE"), "ARTICLE_SWEEP_PAGE_SIZE", 100)?;
        if sweep_page_size == 0 {
            return Err(ConfigError {
                var: "ARTICLE_SWEEP_PAGE_SIZE",
                reason: "must be at least 1".into(),
            });
        }

        let llm_api_key = non_empty("LLM_API_KEY").map(Credential::new);
        if sweep_enabled && llm_api_key.is_none() {
            return Err(ConfigError {
                var: "LLM_API_KEY",
                reason: "required when ARTICLE_SWEEP_ENABLED is set".into(),
            });
        }

        Ok(Self {
            host: or_default("HOST", "0.0.0.0"),
            port,
            socket_key: non_empty("MAPLE_CHAT_SOCKET_KEY"),
            backend_url: or_default("MAPLE_BACKEND_URL", "http://localhost:3000"),
            llm_api_url: or_default("LLM_API_URL", "https://api.openai.com/v1"),
            llm_model: or_default("LLM_MODEL", "gpt-3.5-turbo"),
            llm_api_key,
            sweep_enabled,
            sweep_page_size,
        })
    }
}

fn parse<T>(raw: Option<String>, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError {
            var,
            reason: format!("{raw:?}: {e}"),
        }),
    }
}
