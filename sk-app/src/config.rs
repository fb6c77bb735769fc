//! Sidekick configuration loader.
//!
//! TOML file with environment overrides applied after parse. The default
//! config path may be absent (env-only deployments); an explicitly given
//! path must exist.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SidekickConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub keys: KeysConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// Client-side cap on one completion round trip, in seconds.
    #[serde(default = "default_completion_timeout_secs")]
    pub completion_timeout_secs: u64,
    /// Model key to activate on startup (e.g. "openai/gpt-4o-mini"). Unset
    /// means keep whatever the store currently has active.
    #[serde(default)]
    pub model: Option<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            completion_timeout_secs: default_completion_timeout_secs(),
            model: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeysConfig {
    pub openrouter_api_key: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
}

fn default_db_path() -> PathBuf {
    sidekick_home().join("sidekick.db")
}

fn default_completion_timeout_secs() -> u64 {
    30
}

impl SidekickConfig {
    pub async fn load(path: Option<PathBuf>) -> anyhow::Result<Self> {
        let mut cfg = match path {
            Some(path) => {
                let contents = tokio::fs::read_to_string(&path)
                    .await
                    .map_err(|e| anyhow::anyhow!("read config {}: {e}", path.display()))?;
                parse(&contents, &path)?
            }
            None => {
                let path = default_config_path();
                match tokio::fs::read_to_string(&path).await {
                    Ok(contents) => parse(&contents, &path)?,
                    // No config file is fine; env vars can carry everything.
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
                    Err(e) => {
                        return Err(anyhow::anyhow!("read config {}: {e}", path.display()));
                    }
                }
            }
        };

        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| {
            std::env::var(name).ok().filter(|v| !v.trim().is_empty())
        });
    }

    /// The override rules, with the variable lookup injected so tests do not
    /// have to mutate the process environment.
    fn apply_overrides(&mut self, get: impl Fn(&str) -> Option<String>) {
        // TELEGRAM_BOT_TOKEN wins; TOKEN is accepted for .env compatibility.
        if let Some(v) = get("TELEGRAM_BOT_TOKEN").or_else(|| get("TOKEN")) {
            self.telegram.bot_token = v;
        }
        if let Some(v) = get(sk_llm::API_KEY_ENV) {
            self.keys.openrouter_api_key = Some(v);
        }
        if let Some(v) = get("SIDEKICK_MODEL") {
            self.general.model = Some(v);
        }
        if let Some(v) = get("SIDEKICK_DB_PATH") {
            self.general.db_path = PathBuf::from(v);
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.general.completion_timeout_secs == 0 {
            return Err(anyhow::anyhow!(
                "general.completion_timeout_secs must be > 0"
            ));
        }
        Ok(())
    }

    /// Serving requires a bot token; other subcommands do not.
    pub fn require_bot_token(&self) -> anyhow::Result<()> {
        if self.telegram.bot_token.trim().is_empty() {
            return Err(anyhow::anyhow!(
                "telegram.bot_token is required (or set TELEGRAM_BOT_TOKEN)"
            ));
        }
        Ok(())
    }

    pub fn completion_timeout(&self) -> Duration {
        Duration::from_secs(self.general.completion_timeout_secs)
    }
}

fn parse(contents: &str, path: &Path) -> anyhow::Result<SidekickConfig> {
    toml::from_str(contents).map_err(|e| anyhow::anyhow!("parse config {}: {e}", path.display()))
}

pub fn sidekick_home() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    Path::new(&home).join(".sidekick")
}

pub fn default_config_path() -> PathBuf {
    sidekick_home().join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_toml_parses_with_defaults() {
        let cfg: SidekickConfig = toml::from_str("").expect("parse empty");
        assert_eq!(cfg.general.completion_timeout_secs, 30);
        assert!(cfg.telegram.bot_token.is_empty());
        assert!(cfg.keys.openrouter_api_key.is_none());
    }

    #[test]
    fn full_toml_overrides_defaults() {
        let cfg: SidekickConfig = toml::from_str(
            r#"
            [general]
            db_path = "/tmp/test.db"
            completion_timeout_secs = 5

            [keys]
            openrouter_api_key = "sk-or-test"

            [telegram]
            bot_token = "123:abc"
            "#,
        )
        .expect("parse");
        assert_eq!(cfg.general.db_path, PathBuf::from("/tmp/test.db"));
        assert_eq!(cfg.completion_timeout().as_secs(), 5);
        assert_eq!(cfg.keys.openrouter_api_key.as_deref(), Some("sk-or-test"));
        assert!(cfg.require_bot_token().is_ok());
    }

    #[test]
    fn overrides_replace_file_values_and_skip_unset_ones() {
        let mut cfg: SidekickConfig = toml::from_str(
            r#"
            [general]
            db_path = "/tmp/from-file.db"

            [telegram]
            bot_token = "file:token"
            "#,
        )
        .expect("parse");

        cfg.apply_overrides(|name| match name {
            "SIDEKICK_MODEL" => Some("anthropic/claude-3.5-sonnet".to_string()),
            "TOKEN" => Some("env:token".to_string()),
            _ => None,
        });

        assert_eq!(
            cfg.general.model.as_deref(),
            Some("anthropic/claude-3.5-sonnet")
        );
        assert_eq!(cfg.telegram.bot_token, "env:token");
        // Variables without a value leave the file config alone.
        assert_eq!(cfg.general.db_path, PathBuf::from("/tmp/from-file.db"));
        assert!(cfg.keys.openrouter_api_key.is_none());
    }

    #[test]
    fn bot_token_prefers_the_primary_variable() {
        let mut cfg = SidekickConfig::default();
        cfg.apply_overrides(|name| match name {
            "TELEGRAM_BOT_TOKEN" => Some("primary".to_string()),
            "TOKEN" => Some("fallback".to_string()),
            _ => None,
        });
        assert_eq!(cfg.telegram.bot_token, "primary");
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let cfg: SidekickConfig = toml::from_str(
            r#"
            [general]
            completion_timeout_secs = 0
            "#,
        )
        .expect("parse");
        assert!(cfg.validate().is_err());
    }
}
