use anyhow::{Context, Result};
use std::time::Duration;

use crate::session::SessionSettings;
use crate::sources::spotify::SpotifyCredentials;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Sesiones
    pub queue_display_limit: usize,
    pub inactivity_timeout: Duration,

    // Audio
    pub max_queue_size: usize,
    pub search_results: usize,

    // APIs (Opcionales)
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self::from_lookup(|key| std::env::var(key).ok())?;

        // Validate configuration before returning
        config.validate()?;

        Ok(config)
    }

    /// Builds the configuration from a key lookup (the process environment in
    /// production). Missing optional keys fall back to [`Config::default`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            // Discord
            discord_token: var("DISCORD_TOKEN").context("DISCORD_TOKEN no está definido")?,
            guild_id: var("GUILD_ID").and_then(|s| s.trim().parse().ok()),

            // Sesiones
            queue_display_limit: parse_or(&var, "QUEUE_DISPLAY_LIMIT", defaults.queue_display_limit)?,
            inactivity_timeout: Duration::from_secs(parse_or(
                &var,
                "INACTIVITY_TIMEOUT",
                defaults.inactivity_timeout.as_secs(),
            )?),

            // Audio
            max_queue_size: parse_or(&var, "MAX_QUEUE_SIZE", defaults.max_queue_size)?,
            search_results: parse_or(&var, "SEARCH_RESULTS", defaults.search_results)?,

            // APIs
            spotify_client_id: var("SPOTIFY_CLIENT_ID"),
            spotify_client_secret: var("SPOTIFY_CLIENT_SECRET"),
        })
    }

    /// Validates configuration values for correctness.
    ///
    /// - Token must be present
    /// - Display limit, queue size and search size must be > 0
    /// - A search must fetch at least as many results as `search` shows
    /// - Inactivity timeout must be > 0
    pub fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            anyhow::bail!("Discord token must not be empty");
        }

        if self.queue_display_limit == 0 {
            anyhow::bail!("Queue display limit must be greater than 0");
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("Max queue size must be greater than 0");
        }

        if self.search_results < self.queue_display_limit {
            anyhow::bail!(
                "Search results ({}) must be at least the queue display limit ({})",
                self.search_results,
                self.queue_display_limit
            );
        }

        if self.inactivity_timeout.is_zero() {
            anyhow::bail!("Inactivity timeout must be greater than 0");
        }

        Ok(())
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            queue_display_limit: self.queue_display_limit,
            inactivity_timeout: self.inactivity_timeout,
        }
    }

    /// Credenciales de Spotify sólo si están ambas
    pub fn spotify_credentials(&self) -> Option<SpotifyCredentials> {
        match (&self.spotify_client_id, &self.spotify_client_secret) {
            (Some(client_id), Some(client_secret)) => Some(SpotifyCredentials {
                client_id: client_id.clone(),
                client_secret: client_secret.clone(),
            }),
            _ => None,
        }
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// Excludes tokens and secrets.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: Guild {}\n  \
            Sessions: {} shown, {} idle timeout\n  \
            Audio: {} max queue, {} search results\n  \
            Spotify: {}",
            self.guild_id.map_or("global".to_string(), |id| id.to_string()),
            self.queue_display_limit,
            humantime::format_duration(self.inactivity_timeout),
            self.max_queue_size,
            self.search_results,
            if self.spotify_credentials().is_some() {
                "enabled"
            } else {
                "disabled"
            }
        )
    }
}

fn parse_or<T, F>(var: &F, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} inválido: {:?}", key, raw)),
        None => Ok(default),
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (no defaults - must be provided)
            discord_token: String::new(),
            guild_id: None,

            queue_display_limit: 5,
            inactivity_timeout: Duration::from_secs(300),

            max_queue_size: 1000,
            search_results: 10,

            spotify_client_id: None,
            spotify_client_secret: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_apply() {
        let config = config_from(&[("DISCORD_TOKEN", "token")]).unwrap();

        assert_eq!(
            config,
            Config {
                discord_token: "token".into(),
                ..Config::default()
            }
        );
        assert!(config.validate().is_ok());
        assert_eq!(config.session_settings(), SessionSettings::default());
    }

    #[test]
    fn test_missing_token_fails() {
        let err = config_from(&[]).unwrap_err();
        assert!(err.to_string().contains("DISCORD_TOKEN"));

        assert!(config_from(&[("DISCORD_TOKEN", "  ")]).is_err());
    }

    #[test]
    fn test_overrides_are_parsed() {
        let config = config_from(&[
            ("DISCORD_TOKEN", "token"),
            ("GUILD_ID", "1234"),
            ("QUEUE_DISPLAY_LIMIT", "8"),
            ("INACTIVITY_TIMEOUT", "60"),
            ("MAX_QUEUE_SIZE", " 50 "),
            ("SEARCH_RESULTS", "12"),
        ])
        .unwrap();

        assert_eq!(config.guild_id, Some(1234));
        assert_eq!(config.queue_display_limit, 8);
        assert_eq!(config.inactivity_timeout, Duration::from_secs(60));
        assert_eq!(config.max_queue_size, 50);
        assert_eq!(config.search_results, 12);
    }

    #[test]
    fn test_invalid_number_names_key() {
        let err = config_from(&[("DISCORD_TOKEN", "token"), ("INACTIVITY_TIMEOUT", "5m")])
            .unwrap_err();

        assert!(err.to_string().contains("INACTIVITY_TIMEOUT"));
    }

    #[test]
    fn test_validate_rejects_nonsense() {
        let base = Config {
            discord_token: "token".into(),
            ..Config::default()
        };

        let zero_timeout = Config {
            inactivity_timeout: Duration::ZERO,
            ..base.clone()
        };
        assert!(zero_timeout.validate().is_err());

        let few_results = Config {
            search_results: 3,
            ..base.clone()
        };
        assert!(few_results.validate().is_err());

        let zero_limit = Config {
            queue_display_limit: 0,
            ..base
        };
        assert!(zero_limit.validate().is_err());
    }

    #[test]
    fn test_spotify_needs_both_credentials() {
        let only_id = config_from(&[("DISCORD_TOKEN", "t"), ("SPOTIFY_CLIENT_ID", "id")]).unwrap();
        assert!(only_id.spotify_credentials().is_none());

        let both = config_from(&[
            ("DISCORD_TOKEN", "t"),
            ("SPOTIFY_CLIENT_ID", "id"),
            ("SPOTIFY_CLIENT_SECRET", "secret"),
        ])
        .unwrap();
        let credentials = both.spotify_credentials().unwrap();
        assert_eq!(credentials.client_id, "id");
        assert!(both.summary().contains("Spotify: enabled"));
        assert!(!both.summary().contains("secret"));
    }

    #[test]
    fn test_summary_renders_timeout() {
        let config = Config {
            discord_token: "super-secret".into(),
            ..Config::default()
        };

        let summary = config.summary();
        assert!(summary.contains("5m idle timeout"), "{}", summary);
        assert!(!summary.contains("super-secret"));
    }
}
