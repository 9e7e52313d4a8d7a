use maple_core::Credential;

use crate::error::ConfigError;

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Broker endpoint (default: `ws://localhost:5002/ws`).
    pub ws_url: String,
    /// Access key presented on connect; `None` if the broker is open.
    pub socket_key: Option<String>,
    /// LLM credential every submitted job runs under. Required.
    pub credential: Credential,
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                 | Default                   |
    /// |-------------------------|---------------------------|
    /// | `MAPLE_CHAT_WS_URL`     | `ws://localhost:5002/ws`  |
    /// | `MAPLE_CHAT_SOCKET_KEY` | unset                     |
    /// | `LLM_API_KEY`           | required                  |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_vars<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| var(name).filter(|v| !v.trim().is_empty());

        let credential = non_empty("LLM_API_KEY")
            .map(Credential::new)
            .ok_or(ConfigError {
                var: "LLM_API_KEY",
                reason: "must be set".into(),
            })?;

        Ok(Self {
            ws_url: non_empty("MAPLE_CHAT_WS_URL").unwrap_or_else(|| "ws://localhost:5002/ws".into()),
            socket_key: non_empty("MAPLE_CHAT_SOCKET_KEY"),
            credential,
        })
    }
}
