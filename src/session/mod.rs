//! Per-guild playback sessions.
//!
//! [`SessionManager`] is the only mutator of guild state. Every command, backend
//! event and timer reaction locks the guild's session for its whole duration, so
//! work for one guild is serialized while different guilds run in parallel.

pub mod error;
pub mod events;
pub mod gate;
pub mod registry;
pub mod timer;

#[cfg(test)]
mod testing;

use serenity::model::id::GuildId;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};

use crate::audio::backend::{Enqueued, PlaybackBackend, QueueState};
use crate::sources::{LinkResolver, Track};

pub use error::SessionError;
pub use events::Notifier;
pub use gate::CommandContext;
use error::checked_index;
use registry::{GuildSession, SessionRegistry, VoiceConnection};
use timer::InactivityTimer;

/// Parámetros de comportamiento de las sesiones
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// Máximo de canciones mostradas en `queue` y guardadas por `search`
    pub queue_display_limit: usize,
    pub inactivity_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            queue_display_limit: 5,
            inactivity_timeout: Duration::from_secs(300),
        }
    }
}

/// Estado de reproducción de una guild
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Sin conexión de voz
    Idle,
    /// Conectado, sin nada que reproducir
    ConnectedEmpty,
    Playing,
    Paused,
}

impl PlaybackState {
    fn derive(connected: bool, queue: &QueueState) -> Self {
        match (connected, &queue.playing) {
            (false, _) => Self::Idle,
            (true, None) => Self::ConnectedEmpty,
            (true, Some(_)) if queue.paused => Self::Paused,
            (true, Some(_)) => Self::Playing,
        }
    }
}

/// Resultado de `play`
#[derive(Debug, Clone, PartialEq)]
pub enum PlayOutcome {
    Resumed,
    Started(Track),
    Queued { track: Track, position: usize },
    /// La búsqueda no devolvió nada; no se reprodujo ni encoló nada
    NoResults,
}

/// Resultado de `skip`
#[derive(Debug, Clone, PartialEq)]
pub enum SkipOutcome {
    /// The current track was stopped.
    Skipped(Track),
    /// A queued track was removed; playback untouched.
    Removed { track: Track, position: usize },
}

/// Vista de la cola para presentación
#[derive(Debug, Clone, PartialEq)]
pub struct QueueView {
    pub state: PlaybackState,
    pub now_playing: Option<Track>,
    /// Head of the queue, at most `queue_display_limit` entries.
    pub upcoming: Vec<Track>,
    /// Real number of queued tracks.
    pub total: usize,
}

/// Gestor de sesiones de reproducción por guild
pub struct SessionManager {
    registry: SessionRegistry,
    backend: Arc<dyn PlaybackBackend>,
    resolver: Arc<dyn LinkResolver>,
    notifier: Arc<dyn Notifier>,
    settings: SessionSettings,
    me: Weak<SessionManager>,
}

impl SessionManager {
    pub fn new(
        backend: Arc<dyn PlaybackBackend>,
        resolver: Arc<dyn LinkResolver>,
        notifier: Arc<dyn Notifier>,
        settings: SessionSettings,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            registry: SessionRegistry::new(),
            backend,
            resolver,
            notifier,
            settings,
            me: me.clone(),
        })
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Reproduce una búsqueda, un resultado de `search` por número, o reanuda si
    /// `query` está vacío.
    pub async fn play(
        &self,
        ctx: &CommandContext,
        query: Option<&str>,
    ) -> Result<PlayOutcome, SessionError> {
        let mut session = self.enter(ctx, false).await?;
        let result = self.play_locked(&mut session, ctx, query).await;
        self.settle(&mut session).await;
        result
    }

    async fn play_locked(
        &self,
        session: &mut GuildSession,
        ctx: &CommandContext,
        query: Option<&str>,
    ) -> Result<PlayOutcome, SessionError> {
        let query = query.map(str::trim).unwrap_or_default();

        // Sin query sólo se reanuda; nada pausado implica nada conectado que tocar
        if query.is_empty() {
            self.resume_locked(session).await?;
            return Ok(PlayOutcome::Resumed);
        }

        self.ensure_connected(session, ctx).await?;

        let track = match self.cached_selection(session, query)? {
            Some(track) => track,
            None => {
                let resolved = self.resolve_query(query).await?;
                let results = self.backend.search_tracks(&resolved).await?;
                match results.into_iter().next() {
                    Some(track) => track,
                    None => {
                        debug!("Sin resultados para '{}'", resolved);
                        return Ok(PlayOutcome::NoResults);
                    }
                }
            }
        };

        let track = track.with_requester(ctx.user_id);
        match self
            .backend
            .enqueue_or_play(session.guild_id, track.clone())
            .await?
        {
            Enqueued::Playing => Ok(PlayOutcome::Started(track)),
            Enqueued::Queued { position } => {
                info!(
                    "📋 '{}' en cola (posición {}) en guild {}",
                    track.title(),
                    position,
                    session.guild_id
                );
                Ok(PlayOutcome::Queued { track, position })
            }
        }
    }

    /// `play <n>` contra el último `search`, sólo si hay resultados guardados
    fn cached_selection(
        &self,
        session: &GuildSession,
        query: &str,
    ) -> Result<Option<Track>, SessionError> {
        if session.search_cache.is_empty() {
            return Ok(None);
        }

        match query.parse::<i64>() {
            Ok(position) => {
                let index = checked_index(position, session.search_cache.len())?;
                Ok(Some(session.search_cache[index].clone()))
            }
            Err(_) => Ok(None),
        }
    }

    pub async fn pause(&self, ctx: &CommandContext) -> Result<(), SessionError> {
        let mut session = self.enter(ctx, true).await?;
        let result = self.pause_locked(&mut session).await;
        self.settle(&mut session).await;
        result
    }

    async fn pause_locked(&self, session: &mut GuildSession) -> Result<(), SessionError> {
        let state = self.backend.queue_state(session.guild_id).await;
        if PlaybackState::derive(session.is_connected(), &state) != PlaybackState::Playing {
            return Err(SessionError::NotPlaying);
        }

        self.backend.pause(session.guild_id, true).await?;
        info!("⏸️ Reproducción pausada en guild {}", session.guild_id);
        Ok(())
    }

    pub async fn resume(&self, ctx: &CommandContext) -> Result<(), SessionError> {
        let mut session = self.enter(ctx, false).await?;
        let result = self.resume_locked(&mut session).await;
        self.settle(&mut session).await;
        result
    }

    async fn resume_locked(&self, session: &mut GuildSession) -> Result<(), SessionError> {
        let state = self.backend.queue_state(session.guild_id).await;
        if PlaybackState::derive(session.is_connected(), &state) != PlaybackState::Paused {
            return Err(SessionError::NotPaused);
        }

        self.backend.pause(session.guild_id, false).await?;
        info!("▶️ Reproducción reanudada en guild {}", session.guild_id);
        Ok(())
    }

    /// Salta la canción actual, o con `position` (1-based) quita esa entrada de la cola
    pub async fn skip(
        &self,
        ctx: &CommandContext,
        position: Option<i64>,
    ) -> Result<SkipOutcome, SessionError> {
        let mut session = self.enter(ctx, true).await?;
        let result = self.skip_locked(&mut session, position).await;
        self.settle(&mut session).await;
        result
    }

    async fn skip_locked(
        &self,
        session: &mut GuildSession,
        position: Option<i64>,
    ) -> Result<SkipOutcome, SessionError> {
        let guild_id = session.guild_id;
        let state = self.backend.queue_state(guild_id).await;
        let current = state.playing.ok_or(SessionError::NotPlaying)?;

        match position.filter(|p| *p != 0) {
            None => {
                self.backend.skip_current(guild_id).await?;
                info!("⏭️ Saltada '{}' en guild {}", current.title(), guild_id);
                Ok(SkipOutcome::Skipped(current))
            }
            Some(position) => {
                let index = checked_index(position, state.queue.len())?;
                let track = self.backend.remove_queued(guild_id, index).await?;
                info!(
                    "❌ '{}' eliminada de la cola (posición {}) en guild {}",
                    track.title(),
                    position,
                    guild_id
                );
                Ok(SkipOutcome::Removed {
                    track,
                    position: index + 1,
                })
            }
        }
    }

    /// Mueve la entrada `position` (1-based) al frente de la cola
    pub async fn next(&self, ctx: &CommandContext, position: i64) -> Result<Track, SessionError> {
        let mut session = self.enter(ctx, true).await?;
        let result = self.next_locked(&mut session, position).await;
        self.settle(&mut session).await;
        result
    }

    async fn next_locked(
        &self,
        session: &mut GuildSession,
        position: i64,
    ) -> Result<Track, SessionError> {
        let state = self.backend.queue_state(session.guild_id).await;
        if state.playing.is_none() {
            return Err(SessionError::NotPlaying);
        }

        let index = checked_index(position, state.queue.len())?;
        let track = self.backend.move_to_front(session.guild_id, index).await?;
        info!(
            "📍 '{}' movida al frente de la cola en guild {}",
            track.title(),
            session.guild_id
        );
        Ok(track)
    }

    pub async fn show_queue(&self, ctx: &CommandContext) -> Result<QueueView, SessionError> {
        let mut session = self.enter(ctx, false).await?;
        let view = self.queue_view(&session).await;
        self.settle(&mut session).await;
        Ok(view)
    }

    async fn queue_view(&self, session: &GuildSession) -> QueueView {
        let state = self.backend.queue_state(session.guild_id).await;
        let playback = PlaybackState::derive(session.is_connected(), &state);
        let total = state.queue.len();

        QueueView {
            state: playback,
            now_playing: state.playing,
            upcoming: state
                .queue
                .into_iter()
                .take(self.settings.queue_display_limit)
                .collect(),
            total,
        }
    }

    /// Busca y guarda hasta `queue_display_limit` resultados para `play <n>`.
    ///
    /// An empty result leaves the previous cache untouched.
    pub async fn search(
        &self,
        ctx: &CommandContext,
        query: &str,
    ) -> Result<Vec<Track>, SessionError> {
        let mut session = self.enter(ctx, false).await?;
        let result = self.search_locked(&mut session, query).await;
        self.settle(&mut session).await;
        result
    }

    async fn search_locked(
        &self,
        session: &mut GuildSession,
        query: &str,
    ) -> Result<Vec<Track>, SessionError> {
        let resolved = self.resolve_query(query.trim()).await?;
        let mut results = self.backend.search_tracks(&resolved).await?;
        if results.is_empty() {
            debug!("Búsqueda sin resultados para '{}'", resolved);
            return Ok(results);
        }

        results.truncate(self.settings.queue_display_limit);
        session.search_cache = results.clone();
        debug!(
            "🔍 {} resultados guardados para guild {}",
            results.len(),
            session.guild_id
        );
        Ok(results)
    }

    /// Conecta al canal de voz del usuario. Devuelve `false` si ya estaba conectado.
    pub async fn connect_to_voice(&self, ctx: &CommandContext) -> Result<bool, SessionError> {
        let mut session = self.enter(ctx, false).await?;
        let result = self.ensure_connected(&mut session, ctx).await;
        self.settle(&mut session).await;
        result
    }

    async fn ensure_connected(
        &self,
        session: &mut GuildSession,
        ctx: &CommandContext,
    ) -> Result<bool, SessionError> {
        if session.is_connected() {
            return Ok(false);
        }

        let channel_id = ctx.user_voice_channel.ok_or(SessionError::NotInVoice)?;
        self.backend
            .connect_voice(session.guild_id, channel_id)
            .await?;
        session.voice = Some(Arc::new(VoiceConnection::new(channel_id)));

        info!(
            "🔊 Guild {} conectada al canal de voz {}",
            session.guild_id, channel_id
        );
        Ok(true)
    }

    pub async fn disconnect_from_voice(&self, ctx: &CommandContext) -> Result<(), SessionError> {
        let mut session = self.enter(ctx, true).await?;
        self.teardown(&mut session, true).await;
        self.settle(&mut session).await;
        Ok(())
    }

    /// El bot salió de voz por fuera de los comandos (expulsado, canal borrado)
    pub async fn handle_voice_lost(&self, guild_id: GuildId) {
        let Some(session) = self.registry.get(guild_id) else {
            return;
        };
        let mut session = session.lock().await;

        if self.teardown(&mut session, true).await {
            warn!("🔌 Guild {} desconectada externamente de voz", guild_id);
        }
    }

    pub async fn state(&self, guild_id: GuildId) -> PlaybackState {
        let Some(session) = self.registry.get(guild_id) else {
            return PlaybackState::Idle;
        };
        let session = session.lock().await;
        if !session.is_connected() {
            return PlaybackState::Idle;
        }

        let state = self.backend.queue_state(guild_id).await;
        PlaybackState::derive(true, &state)
    }

    /// Bloquea la sesión, valida el contexto y reinicia el reloj de inactividad
    async fn enter(
        &self,
        ctx: &CommandContext,
        requires_voice: bool,
    ) -> Result<OwnedMutexGuard<GuildSession>, SessionError> {
        let guild_id = ctx.guild()?;
        let mut session = self.registry.get_or_create(guild_id).lock_owned().await;

        gate::check_context(&mut session, ctx, requires_voice)?;
        session.disarm_timer();
        Ok(session)
    }

    /// Re-arma el timer si la guild quedó conectada sin nada que reproducir
    async fn settle(&self, session: &mut GuildSession) {
        if !session.is_connected() || session.has_armed_timer() {
            return;
        }

        let state = self.backend.queue_state(session.guild_id).await;
        if state.playing.is_none() && state.queue.is_empty() {
            self.arm_timer(session);
        }
    }

    fn arm_timer(&self, session: &mut GuildSession) {
        session.disarm_timer();

        let guild_id = session.guild_id;
        let manager = self.me.clone();
        let timer = InactivityTimer::start(self.settings.inactivity_timeout, move |id| async move {
            if let Some(manager) = manager.upgrade() {
                manager.on_inactivity_timeout(guild_id, id).await;
            }
        });

        debug!(
            "⏲️ Timer {} de inactividad armado para guild {} ({:?})",
            timer.id(),
            guild_id,
            self.settings.inactivity_timeout
        );
        session.inactivity_timer = Some(timer);
    }

    /// Destruye la conexión de voz una sola vez. Devuelve si hizo algo.
    async fn teardown(&self, session: &mut GuildSession, force: bool) -> bool {
        let Some(voice) = session.voice.take() else {
            return false;
        };
        if !voice.mark_destroyed() {
            return false;
        }

        session.disarm_timer();
        session.now_playing = None;

        // Fallos del backend aquí no son fatales: la conexión ya no existe para nosotros
        if let Err(e) = self.backend.disconnect_voice(session.guild_id, force).await {
            warn!(
                "Error al desconectar guild {} del backend: {}",
                session.guild_id, e
            );
        }

        info!(
            "👋 Guild {} desconectada del canal de voz {}",
            session.guild_id,
            voice.channel_id()
        );
        true
    }

    async fn resolve_query(&self, query: &str) -> Result<String, SessionError> {
        if !self.resolver.recognizes(query) {
            return Ok(query.to_string());
        }

        self.resolver
            .resolve_to_query(query)
            .await
            .filter(|resolved| !resolved.trim().is_empty())
            .ok_or(SessionError::InvalidLink)
    }
}
