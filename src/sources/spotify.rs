use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as B64_ENGINE;
use base64::Engine;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use super::LinkResolver;

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const TRACKS_URL: &str = "https://api.spotify.com/v1/tracks";
const SPOTIFY_HOST: &str = "open.spotify.com";
const URI_PREFIX: &str = "spotify:track:";

/// Credenciales de la API web de Spotify (client credentials flow)
#[derive(Debug, Clone)]
pub struct SpotifyCredentials {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct SpotifyTrack {
    name: String,
    #[serde(default)]
    artists: Vec<SpotifyArtist>,
}

#[derive(Debug, Deserialize)]
struct SpotifyArtist {
    name: String,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Convierte links de Spotify en búsquedas "<título> <artistas>"
pub struct SpotifyResolver {
    http: reqwest::Client,
    credentials: Option<SpotifyCredentials>,
    token: Mutex<Option<CachedToken>>,
}

impl SpotifyResolver {
    pub fn new(credentials: Option<SpotifyCredentials>) -> Self {
        if credentials.is_none() {
            warn!("🎧 Spotify sin credenciales: los links de Spotify serán rechazados");
        }

        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .unwrap_or_default(),
            credentials,
            token: Mutex::new(None),
        }
    }

    /// Extrae el ID de un link `open.spotify.com/[intl-xx/]track/<id>` o `spotify:track:<id>`
    pub fn track_id(input: &str) -> Option<String> {
        let input = input.trim();

        if let Some(id) = input.strip_prefix(URI_PREFIX) {
            return Some(id).filter(|id| is_valid_id(id)).map(str::to_string);
        }

        let url = Url::parse(input).ok()?;
        if url.host_str() != Some(SPOTIFY_HOST) {
            return None;
        }

        let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
        let mut kind = segments.next()?;
        if kind.starts_with("intl-") {
            kind = segments.next()?;
        }
        if kind != "track" {
            return None;
        }

        segments
            .next()
            .filter(|id| is_valid_id(id))
            .map(str::to_string)
    }

    async fn access_token(&self, credentials: &SpotifyCredentials) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.expires_at > Instant::now()) {
            return Ok(token.value.clone());
        }

        let basic = B64_ENGINE.encode(format!(
            "{}:{}",
            credentials.client_id, credentials.client_secret
        ));
        let response: TokenResponse = self
            .http
            .post(TOKEN_URL)
            .header(AUTHORIZATION, format!("Basic {}", basic))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
            .send()
            .await
            .context("Error al pedir token de Spotify")?
            .error_for_status()?
            .json()
            .await
            .context("Respuesta de token de Spotify inválida")?;

        // Renovar un minuto antes de que expire
        let lifetime = Duration::from_secs(response.expires_in.saturating_sub(60));
        debug!("🔑 Token de Spotify renovado ({}s)", lifetime.as_secs());
        *cached = Some(CachedToken {
            value: response.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });

        Ok(response.access_token)
    }

    async fn fetch_query(&self, credentials: &SpotifyCredentials, id: &str) -> Result<String> {
        let token = self.access_token(credentials).await?;
        let track: SpotifyTrack = self
            .http
            .get(format!("{}/{}", TRACKS_URL, id))
            .bearer_auth(token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("Respuesta de track de Spotify inválida")?;

        Ok(build_query(&track))
    }
}

#[async_trait]
impl LinkResolver for SpotifyResolver {
    fn recognizes(&self, input: &str) -> bool {
        let input = input.trim();
        input.starts_with("spotify:")
            || Url::parse(input)
                .map(|url| url.host_str() == Some(SPOTIFY_HOST))
                .unwrap_or(false)
    }

    async fn resolve_to_query(&self, url: &str) -> Option<String> {
        let id = Self::track_id(url)?;
        let credentials = self.credentials.as_ref()?;

        match self.fetch_query(credentials, &id).await {
            Ok(query) => {
                info!("🎧 Link de Spotify {} resuelto como: {}", id, query);
                Some(query)
            }
            Err(e) => {
                warn!("❌ No se pudo resolver el link de Spotify {}: {:?}", id, e);
                None
            }
        }
    }
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric())
}

fn build_query(track: &SpotifyTrack) -> String {
    std::iter::once(track.name.as_str())
        .chain(track.artists.iter().map(|a| a.name.as_str()))
        .collect::<Vec<_>>()
        .join(" ")
}
