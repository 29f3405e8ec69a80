//! # Configuration Management
//!
//! Loads application configuration from three sources, lowest priority
//! first:
//!
//! 1. Built-in defaults
//! 2. An optional `config.toml` next to the binary
//! 3. Environment variables with the `APP_` prefix (plus the bare `HOST`,
//!    `PORT` and `OPENAI_API_KEY` variables deployment platforms set)
//!
//! The model API key deliberately has no default: it must come from the
//! environment or the config file.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub audio: AudioConfig,
}

/// HTTP/WebSocket server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Model realtime endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Realtime socket URL, including the model selection query parameter.
    pub url: String,

    /// Bearer token for the realtime endpoint. Loaded from the
    /// `OPENAI_API_KEY` environment variable in deployments.
    #[serde(default)]
    pub api_key: String,

    /// Voice requested in the session configuration message.
    pub voice: String,

    /// Behavioral instructions sent in the session configuration message.
    pub instructions: String,
}

/// Audio format contracts for the two peers.
///
/// The sample rates are fixed by the peers' protocols in practice, but the
/// minimum telephony frame size depends on the negotiated frame duration,
/// so all three are configuration rather than hard-coded constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Companded sample rate on the telephony side.
    pub telephony_rate: u32,

    /// Linear PCM sample rate on the model side.
    pub model_rate: u32,

    /// Minimum outbound telephony frame in companded bytes (20ms at 8kHz).
    pub min_frame_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            model: ModelConfig {
                url: "wss://api.openai.com/v1/realtime?model=gpt-4o-realtime-preview"
                    .to_string(),
                api_key: String::new(),
                voice: "alloy".to_string(),
                instructions: "You are a helpful phone assistant. Keep your answers \
                               short, friendly and conversational."
                    .to_string(),
            },
            audio: AudioConfig {
                telephony_rate: 8000,
                model_rate: 24000,
                min_frame_bytes: 160,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, `config.toml` and the environment.
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("_"));

        // Deployment platforms set these without the APP_ prefix.
        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }
        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }
        if let Ok(key) = env::var("OPENAI_API_KEY") {
            settings = settings.set_override("model.api_key", key)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration can actually run a call.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }
        if self.audio.telephony_rate == 0 || self.audio.model_rate == 0 {
            return Err(anyhow::anyhow!("Sample rates must be greater than 0"));
        }
        if self.audio.min_frame_bytes == 0 {
            return Err(anyhow::anyhow!("Minimum frame size must be greater than 0"));
        }
        if !self.model.url.starts_with("ws://") && !self.model.url.starts_with("wss://") {
            return Err(anyhow::anyhow!("Model URL must be a ws:// or wss:// URL"));
        }
        Ok(())
    }

    /// Apply a partial update from a JSON document (runtime config PUT).
    ///
    /// Only the fields present in the document change; the result is
    /// re-validated before it is accepted. The API key is intentionally not
    /// updatable over HTTP.
    pub fn update_from_json(&mut self, json_str: &str) -> Result<()> {
        let partial: serde_json::Value = serde_json::from_str(json_str)?;

        if let Some(server) = partial.get("server") {
            if let Some(host) = server.get("host").and_then(|v| v.as_str()) {
                self.server.host = host.to_string();
            }
            if let Some(port) = server.get("port").and_then(|v| v.as_u64()) {
                self.server.port = port as u16;
            }
        }

        if let Some(model) = partial.get("model") {
            if let Some(voice) = model.get("voice").and_then(|v| v.as_str()) {
                self.model.voice = voice.to_string();
            }
            if let Some(instructions) = model.get("instructions").and_then(|v| v.as_str()) {
                self.model.instructions = instructions.to_string();
            }
            if let Some(url) = model.get("url").and_then(|v| v.as_str()) {
                self.model.url = url.to_string();
            }
        }

        if let Some(audio) = partial.get("audio") {
            if let Some(rate) = audio.get("telephony_rate").and_then(|v| v.as_u64()) {
                self.audio.telephony_rate = rate as u32;
            }
            if let Some(rate) = audio.get("model_rate").and_then(|v| v.as_u64()) {
                self.audio.model_rate = rate as u32;
            }
            if let Some(bytes) = audio.get("min_frame_bytes").and_then(|v| v.as_u64()) {
                self.audio.min_frame_bytes = bytes as usize;
            }
        }

        self.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.audio.telephony_rate, 8000);
        assert_eq!(config.audio.model_rate, 24000);
        assert_eq!(config.audio.min_frame_bytes, 160);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.audio.min_frame_bytes = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.model.url = "https://not-a-socket.example".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_update() {
        let mut config = AppConfig::default();
        let json = r#"{"model": {"voice": "verse"}, "audio": {"min_frame_bytes": 320}}"#;
        assert!(config.update_from_json(json).is_ok());
        assert_eq!(config.model.voice, "verse");
        assert_eq!(config.audio.min_frame_bytes, 320);
        // Untouched fields keep their values.
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_partial_update_rejects_invalid_result() {
        let mut config = AppConfig::default();
        let json = r#"{"audio": {"min_frame_bytes": 0}}"#;
        assert!(config.update_from_json(json).is_err());
    }
}
