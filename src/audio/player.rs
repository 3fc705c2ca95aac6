use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    error::JoinError,
    input::{Input, YoutubeDl},
    tracks::TrackHandle,
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::future::Future;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Weak,
};
use tracing::{debug, error, info, warn};

use super::{
    backend::{BackendError, BackendEvent, Enqueued, PlaybackBackend, QueueState},
    queue::PlaybackQueue,
};
use crate::sources::{Track, YouTubeClient};

/// Backend de audio en proceso: songbird + yt-dlp.
///
/// Each connected guild gets a [`GuildPlayer`] holding its call, its
/// [`PlaybackQueue`] and the handle of the track being streamed. Track-end
/// events from the songbird driver advance the queue and are reported as
/// [`BackendEvent`]s on a single channel.
pub struct SongbirdPlayer {
    manager: Arc<Songbird>,
    http: reqwest::Client,
    youtube: YouTubeClient,
    players: DashMap<GuildId, Arc<GuildPlayer>>,
    max_queue_size: usize,
    search_results: usize,
    events_tx: flume::Sender<BackendEvent>,
    events_rx: flume::Receiver<BackendEvent>,
}

impl SongbirdPlayer {
    pub fn new(manager: Arc<Songbird>, max_queue_size: usize, search_results: usize) -> Self {
        let (events_tx, events_rx) = flume::unbounded();

        Self {
            manager,
            http: reqwest::Client::new(),
            youtube: YouTubeClient::new(),
            players: DashMap::new(),
            max_queue_size,
            search_results,
            events_tx,
            events_rx,
        }
    }

    fn player(&self, guild_id: GuildId) -> Result<Arc<GuildPlayer>, BackendError> {
        self.players
            .get(&guild_id)
            .map(|p| p.value().clone())
            .ok_or(BackendError::NotConnected(guild_id))
    }
}

#[async_trait]
impl PlaybackBackend for SongbirdPlayer {
    async fn search_tracks(&self, query: &str) -> Result<Vec<Track>, BackendError> {
        self.youtube
            .search(query, self.search_results)
            .await
            .map_err(|e| BackendError::Search(e.to_string()))
    }

    async fn connect_voice(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<(), BackendError> {
        let call = self
            .manager
            .join(guild_id, channel_id)
            .await
            .map_err(|e| {
                error!("Error al obtener handler de voz: {:?}", e);
                BackendError::Join(e.to_string())
            })?;

        self.players.entry(guild_id).or_insert_with(|| {
            Arc::new(GuildPlayer {
                guild_id,
                call,
                queue: Mutex::new(PlaybackQueue::new(self.max_queue_size)),
                handle: Mutex::new(None),
                detached: AtomicBool::new(false),
                http: self.http.clone(),
                events: self.events_tx.clone(),
            })
        });

        info!("🔊 Conectado al canal de voz {} en guild {}", channel_id, guild_id);
        Ok(())
    }

    async fn disconnect_voice(&self, guild_id: GuildId, force: bool) -> Result<(), BackendError> {
        let player = self.players.remove(&guild_id).map(|(_, p)| p);
        if player.is_none() && !force {
            return Ok(());
        }

        if let Some(player) = player {
            player.detach();
        }

        match self.manager.remove(guild_id).await {
            Ok(()) => {
                info!("👋 Desconectado del canal de voz en guild {}", guild_id);
                Ok(())
            }
            Err(JoinError::NoCall) => {
                debug!("La llamada de guild {} ya estaba destruida", guild_id);
                Ok(())
            }
            Err(e) => Err(BackendError::Join(e.to_string())),
        }
    }

    async fn queue_state(&self, guild_id: GuildId) -> QueueState {
        self.player(guild_id)
            .map(|p| p.queue.lock().snapshot())
            .unwrap_or_default()
    }

    async fn enqueue_or_play(
        &self,
        guild_id: GuildId,
        track: Track,
    ) -> Result<Enqueued, BackendError> {
        let player = self.player(guild_id)?;

        {
            let mut queue = player.queue.lock();
            let position = queue.push(track)?;
            if queue.current().is_some() {
                return Ok(Enqueued::Queued { position });
            }
        }

        player.play_next().await?;
        Ok(Enqueued::Playing)
    }

    async fn pause(&self, guild_id: GuildId, paused: bool) -> Result<(), BackendError> {
        let player = self.player(guild_id)?;
        let handle = player.current_handle()?;

        let result = if paused { handle.pause() } else { handle.play() };
        result.map_err(|e| BackendError::Playback(e.to_string()))?;

        player.queue.lock().set_paused(paused);
        debug!("⏯️ Guild {} pausada = {}", guild_id, paused);
        Ok(())
    }

    async fn skip_current(&self, guild_id: GuildId) -> Result<(), BackendError> {
        let player = self.player(guild_id)?;

        // El evento End del track inicia el siguiente
        player
            .current_handle()?
            .stop()
            .map_err(|e| BackendError::Playback(e.to_string()))
    }

    async fn remove_queued(&self, guild_id: GuildId, index: usize) -> Result<Track, BackendError> {
        self.player(guild_id)?
            .queue
            .lock()
            .remove(index)
            .ok_or(BackendError::NoSuchEntry { index })
    }

    async fn move_to_front(&self, guild_id: GuildId, index: usize) -> Result<Track, BackendError> {
        self.player(guild_id)?
            .queue
            .lock()
            .move_to_front(index)
            .ok_or(BackendError::NoSuchEntry { index })
    }

    fn events(&self) -> flume::Receiver<BackendEvent> {
        self.events_rx.clone()
    }
}

/// Estado de reproducción de una guild conectada
struct GuildPlayer {
    guild_id: GuildId,
    call: Arc<tokio::sync::Mutex<Call>>,
    queue: Mutex<PlaybackQueue>,
    handle: Mutex<Option<TrackHandle>>,
    detached: AtomicBool,
    http: reqwest::Client,
    events: flume::Sender<BackendEvent>,
}

impl GuildPlayer {
    fn current_handle(&self) -> Result<TrackHandle, BackendError> {
        self.handle
            .lock()
            .clone()
            .ok_or_else(|| BackendError::Playback("no hay nada reproduciéndose".to_string()))
    }

    /// Reproduce la siguiente canción en la cola, o avisa que se vació
    async fn play_next(self: &Arc<Self>) -> Result<(), BackendError> {
        if self.detached.load(Ordering::Acquire) {
            return Ok(());
        }

        self.handle.lock().take();
        let started = start_next_playable(&self.queue, move |track| self.start(track)).await;

        if !matches!(started, Ok(true)) {
            debug!("Cola vacía para guild {}", self.guild_id);
            self.emit(BackendEvent::QueueEnd {
                guild_id: self.guild_id,
            });
        }
        started.map(|_| ())
    }

    async fn start(self: &Arc<Self>, track: Track) -> Result<(), BackendError> {
        info!("🎵 Reproduciendo: {} en guild {}", track.title(), self.guild_id);

        let input: Input = YoutubeDl::new(self.http.clone(), track.url().to_string()).into();
        let handle = self.call.lock().await.play_input(input);

        // End y Error comparten la bandera: cada track avanza la cola una sola vez
        let handled = Arc::new(AtomicBool::new(false));
        for event in [TrackEvent::End, TrackEvent::Error] {
            let added = handle.add_event(
                Event::Track(event),
                TrackEndHandler {
                    player: Arc::downgrade(self),
                    handled: handled.clone(),
                },
            );
            if let Err(e) = added {
                // Sin eventos de fin la cola nunca avanzaría
                let _ = handle.stop();
                return Err(BackendError::Playback(e.to_string()));
            }
        }

        *self.handle.lock() = Some(handle);
        self.emit(BackendEvent::TrackStart {
            guild_id: self.guild_id,
            track,
        });
        Ok(())
    }

    /// Detiene la reproducción y desactiva el avance automático
    fn detach(&self) {
        self.detached.store(true, Ordering::Release);
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.stop();
        }
        self.queue.lock().clear();
    }

    fn emit(&self, event: BackendEvent) {
        if self.events.send(event).is_err() {
            warn!("Nadie escucha eventos del backend (guild {})", self.guild_id);
        }
    }
}

/// Avanza la cola hasta que un track arranque.
///
/// Returns `Ok(true)` when a track started and `Ok(false)` when the queue was
/// already drained. Tracks that fail to start are dropped; if the queue drains
/// after a failure the first error is returned, with no current track left.
async fn start_next_playable<F, Fut>(
    queue: &Mutex<PlaybackQueue>,
    mut start: F,
) -> Result<bool, BackendError>
where
    F: FnMut(Track) -> Fut,
    Fut: Future<Output = Result<(), BackendError>>,
{
    let mut failure = None;

    loop {
        let next = queue.lock().advance();
        let Some(track) = next else {
            return failure.map_or(Ok(false), Err);
        };

        let title = track.title().to_string();
        match start(track).await {
            Ok(()) => return Ok(true),
            Err(e) => {
                warn!("No se pudo iniciar '{}', pasando al siguiente: {}", title, e);
                failure.get_or_insert(e);
            }
        }
    }
}

/// Handler para cuando termina (o falla) una canción
struct TrackEndHandler {
    player: Weak<GuildPlayer>,
    handled: Arc<AtomicBool>,
}

#[async_trait]
impl VoiceEventHandler for TrackEndHandler {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if self.handled.swap(true, Ordering::AcqRel) {
            return None;
        }

        if let EventContext::Track(track_list) = ctx {
            for (state, _handle) in *track_list {
                debug!("Track terminado: {:?}", state.playing);
            }
        }

        let player = self.player.upgrade()?;
        if let Err(e) = player.play_next().await {
            error!(
                "Error al reproducir siguiente track en guild {}: {:?}",
                player.guild_id, e
            );
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn queue_of(names: &[&str]) -> Mutex<PlaybackQueue> {
        let mut queue = PlaybackQueue::new(10);
        for name in names {
            queue
                .push(Track::new(*name, format!("https://www.youtube.com/watch?v={}", name)))
                .unwrap();
        }
        Mutex::new(queue)
    }

    fn failing_on(bad: &'static str) -> impl FnMut(Track) -> std::future::Ready<Result<(), BackendError>> {
        move |track| {
            std::future::ready(if track.title() == bad {
                Err(BackendError::Playback("sin eventos".into()))
            } else {
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn test_failed_start_moves_on_to_next_track() {
        let queue = queue_of(&["bad", "B"]);

        let started = start_next_playable(&queue, failing_on("bad")).await;

        assert_eq!(started, Ok(true));
        assert_eq!(queue.lock().current().map(Track::title), Some("B"));
    }

    #[tokio::test]
    async fn test_failed_last_track_leaves_nothing_playing() {
        let queue = queue_of(&["bad"]);

        let started = start_next_playable(&queue, failing_on("bad")).await;

        assert_eq!(started, Err(BackendError::Playback("sin eventos".into())));
        let state = queue.lock().snapshot();
        assert_eq!(state.playing, None);
        assert!(state.queue.is_empty());
    }

    #[tokio::test]
    async fn test_drained_queue_reports_nothing_started() {
        let queue = queue_of(&[]);

        assert_eq!(start_next_playable(&queue, failing_on("bad")).await, Ok(false));
    }
}
