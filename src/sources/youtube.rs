use anyhow::{Context, Result};
use async_process::Command;
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::Track;

/// Cliente para buscar en YouTube mediante yt-dlp
pub struct YouTubeClient {
    // Limitar procesos concurrentes de yt-dlp para evitar rate limiting
    rate_limiter: Semaphore,
}

/// Información extraída de yt-dlp (una línea JSON por resultado)
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    id: Option<String>,
    title: Option<String>,
    duration: Option<f64>,
    uploader: Option<String>,
    channel: Option<String>,
    thumbnail: Option<String>,
    #[serde(default)]
    thumbnails: Vec<Thumbnail>,
    webpage_url: Option<String>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

impl YouTubeClient {
    pub fn new() -> Self {
        Self {
            rate_limiter: Semaphore::new(3),
        }
    }

    /// Busca videos en YouTube, o resuelve una URL directa
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<Track>> {
        let _permit = self.rate_limiter.acquire().await?;

        let target = if Self::is_url(query) {
            debug!("📊 Obteniendo info de: {}", query);
            query.to_string()
        } else {
            info!("🔍 Buscando en YouTube: {}", query);
            format!("ytsearch{}:{}", limit.max(1), query)
        };

        let output = Command::new("yt-dlp")
            .args([
                "--no-playlist",
                "--dump-json",
                "--flat-playlist",
                "--skip-download",
                "--no-warnings",
                target.as_str(),
            ])
            .output()
            .await
            .context("Error al ejecutar yt-dlp")?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp error: {}", error.trim());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let tracks = parse_results(&stdout);
        debug!("🔍 {} resultados para: {}", tracks.len(), query);
        Ok(tracks)
    }

    /// Verifica si el texto es una URL http(s)
    pub fn is_url(query: &str) -> bool {
        static URL_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
        URL_REGEX
            .get_or_init(|| Regex::new(r"^https?://\S+$").ok())
            .as_ref()
            .is_some_and(|re| re.is_match(query.trim()))
    }
}

impl Default for YouTubeClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Convierte la salida de yt-dlp en tracks, ignorando líneas inválidas
fn parse_results(stdout: &str) -> Vec<Track> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<YtDlpInfo>(line) {
            Ok(info) => info_to_track(info),
            Err(e) => {
                warn!("Línea de yt-dlp no válida: {}", e);
                None
            }
        })
        .collect()
}

fn info_to_track(info: YtDlpInfo) -> Option<Track> {
    let url = info
        .webpage_url
        .or(info.url)
        .or_else(|| {
            info.id
                .as_ref()
                .map(|id| format!("https://www.youtube.com/watch?v={}", id))
        })?;
    let title = info.title.unwrap_or_else(|| url.clone());

    let mut track = Track::new(title, url);

    if let Some(author) = info.uploader.or(info.channel) {
        track = track.with_author(author);
    }

    if let Some(duration) = info.duration.filter(|d| d.is_finite() && *d >= 0.0) {
        track = track.with_duration(Duration::from_secs_f64(duration));
    }

    // yt-dlp en modo flat sólo devuelve la lista de miniaturas
    let artwork = info
        .thumbnail
        .or_else(|| info.thumbnails.into_iter().last().map(|t| t.url));
    if let Some(artwork) = artwork {
        track = track.with_artwork(artwork);
    }

    Some(track)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_url_detection() {
        assert!(YouTubeClient::is_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(YouTubeClient::is_url("http://youtu.be/dQw4w9WgXcQ"));
        assert!(!YouTubeClient::is_url("sultans of swing"));
        assert!(!YouTubeClient::is_url("https://example.com/a b"));
    }

    #[test]
    fn test_parse_flat_search_results() {
        let stdout = concat!(
            r#"{"id":"abc","title":"Sultans of Swing","duration":348.0,"channel":"Dire Straits","url":"https://www.youtube.com/watch?v=abc","thumbnails":[{"url":"https://i.ytimg.com/a.jpg"},{"url":"https://i.ytimg.com/b.jpg"}]}"#,
            "\n",
            "not json\n",
            r#"{"id":"def","title":"Money for Nothing","uploader":"DireStraitsVEVO","webpage_url":"https://www.youtube.com/watch?v=def","thumbnail":"https://i.ytimg.com/c.jpg"}"#,
            "\n"
        );

        let tracks = parse_results(stdout);

        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].title(), "Sultans of Swing");
        assert_eq!(tracks[0].author(), Some("Dire Straits"));
        assert_eq!(tracks[0].duration(), Some(Duration::from_secs(348)));
        assert_eq!(tracks[0].artwork(), Some("https://i.ytimg.com/b.jpg"));
        assert_eq!(tracks[1].url(), "https://www.youtube.com/watch?v=def");
        assert_eq!(tracks[1].author(), Some("DireStraitsVEVO"));
        assert_eq!(tracks[1].requested_by(), None);
    }

    #[test]
    fn test_id_only_entry_builds_watch_url() {
        let tracks = parse_results(r#"{"id":"xyz"}"#);

        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].url(), "https://www.youtube.com/watch?v=xyz");
        assert_eq!(tracks[0].title(), "https://www.youtube.com/watch?v=xyz");
    }
}
