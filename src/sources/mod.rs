//! # Sources Module
//!
//! Track metadata and the collaborators that turn user input into something the
//! audio backend can search for.
//!
//! - [`Track`]: a playable item with display metadata and an opaque playback handle
//! - [`LinkResolver`]: converts third-party share links into plain search queries
//! - [`youtube`]: yt-dlp powered search used by the songbird player
//! - [`spotify`]: Spotify share-link resolver

pub mod spotify;
pub mod youtube;

use async_trait::async_trait;
use serenity::model::id::UserId;
use std::time::Duration;

pub use spotify::SpotifyResolver;
pub use youtube::YouTubeClient;

/// Representa un track de música
///
/// `url` is the opaque handle the backend uses to start playback. The requester
/// is only stamped when the track is enqueued, never at search time.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    title: String,
    author: Option<String>,
    duration: Option<Duration>,
    artwork: Option<String>,
    url: String,
    requested_by: Option<UserId>,
}

impl Track {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            author: None,
            duration: None,
            artwork: None,
            url: url.into(),
            requested_by: None,
        }
    }

    // Getters
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }
    pub fn artwork(&self) -> Option<&str> {
        self.artwork.as_deref()
    }
    pub fn url(&self) -> &str {
        &self.url
    }
    pub fn requested_by(&self) -> Option<UserId> {
        self.requested_by
    }

    // Setters
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_artwork(mut self, artwork: impl Into<String>) -> Self {
        self.artwork = Some(artwork.into());
        self
    }

    pub fn with_requester(mut self, user_id: UserId) -> Self {
        self.requested_by = Some(user_id);
        self
    }
}

/// Convierte links de servicios externos en búsquedas de texto
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LinkResolver: Send + Sync {
    /// Whether `input` uses a share-link syntax this resolver handles.
    fn recognizes(&self, input: &str) -> bool;

    /// Resolves a recognized link into a search query; `None` if the link is invalid.
    async fn resolve_to_query(&self, url: &str) -> Option<String>;
}
