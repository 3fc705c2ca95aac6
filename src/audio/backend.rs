use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use thiserror::Error;

use crate::sources::Track;

/// Eventos asíncronos emitidos por el backend de audio
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    /// A track started streaming in the guild.
    TrackStart { guild_id: GuildId, track: Track },
    /// The guild's queue drained: nothing left to play.
    QueueEnd { guild_id: GuildId },
}

impl BackendEvent {
    pub fn guild_id(&self) -> GuildId {
        match self {
            Self::TrackStart { guild_id, .. } | Self::QueueEnd { guild_id } => *guild_id,
        }
    }
}

/// Snapshot del reproductor de una guild
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueState {
    pub playing: Option<Track>,
    pub paused: bool,
    pub queue: Vec<Track>,
}

/// Resultado de `enqueue_or_play`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    /// Nothing was playing, the track started immediately.
    Playing,
    /// Appended to the tail of the queue at this 1-based position.
    Queued { position: usize },
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BackendError {
    #[error("la búsqueda falló: {0}")]
    Search(String),
    #[error("no se pudo conectar al canal de voz: {0}")]
    Join(String),
    #[error("no hay conexión de voz en la guild {0}")]
    NotConnected(GuildId),
    #[error("la cola está llena (máximo {max} canciones)")]
    QueueFull { max: usize },
    #[error("no existe la posición {index} en la cola")]
    NoSuchEntry { index: usize },
    #[error("error de reproducción: {0}")]
    Playback(String),
}

/// Contrato con el nodo de audio.
///
/// The backend owns each guild's play queue: it advances the queue on its own
/// when a track ends and reports that through [`BackendEvent`]s. Queue indices
/// taken by this trait are 0-based; callers validate user input beforehand.
#[async_trait]
pub trait PlaybackBackend: Send + Sync {
    /// Busca tracks, en orden de relevancia
    async fn search_tracks(&self, query: &str) -> Result<Vec<Track>, BackendError>;

    async fn connect_voice(&self, guild_id: GuildId, channel_id: ChannelId)
        -> Result<(), BackendError>;

    /// Leaves voice and drops the guild's player. With `force == false` this is
    /// a no-op when the guild is not connected.
    async fn disconnect_voice(&self, guild_id: GuildId, force: bool) -> Result<(), BackendError>;

    async fn queue_state(&self, guild_id: GuildId) -> QueueState;

    /// Starts `track` if nothing is playing, otherwise appends it to the queue.
    async fn enqueue_or_play(&self, guild_id: GuildId, track: Track)
        -> Result<Enqueued, BackendError>;

    async fn pause(&self, guild_id: GuildId, paused: bool) -> Result<(), BackendError>;

    /// Stops the current track; the next one (if any) starts via the usual events.
    async fn skip_current(&self, guild_id: GuildId) -> Result<(), BackendError>;

    async fn remove_queued(&self, guild_id: GuildId, index: usize) -> Result<Track, BackendError>;

    async fn move_to_front(&self, guild_id: GuildId, index: usize) -> Result<Track, BackendError>;

    /// Receiver for track-start / queue-end events. Meant for a single consumer.
    fn events(&self) -> flume::Receiver<BackendEvent>;
}
