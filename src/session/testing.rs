//! Test-only backend built on the real [`PlaybackQueue`].

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::audio::backend::{BackendError, BackendEvent, Enqueued, PlaybackBackend, QueueState};
use crate::audio::queue::PlaybackQueue;
use crate::sources::Track;

/// Backend en memoria: avanza la cola en el acto y emite los mismos eventos que
/// el reproductor real.
pub(crate) struct FakeBackend {
    results: Mutex<Vec<Track>>,
    queues: Mutex<HashMap<GuildId, PlaybackQueue>>,
    searches: Mutex<Vec<String>>,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    events_tx: flume::Sender<BackendEvent>,
    events_rx: flume::Receiver<BackendEvent>,
}

impl FakeBackend {
    pub fn new() -> Self {
        let (events_tx, events_rx) = flume::unbounded();
        Self {
            results: Mutex::new(Vec::new()),
            queues: Mutex::new(HashMap::new()),
            searches: Mutex::new(Vec::new()),
            connects: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            events_tx,
            events_rx,
        }
    }

    /// Resultados que devolverá la próxima búsqueda, cualquiera sea la query
    pub fn set_results(&self, titles: &[&str]) {
        *self.results.lock() = titles.iter().map(|t| track(t)).collect();
    }

    pub fn searches(&self) -> Vec<String> {
        self.searches.lock().clone()
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn is_connected(&self, guild_id: GuildId) -> bool {
        self.queues.lock().contains_key(&guild_id)
    }

    pub fn queued_titles(&self, guild_id: GuildId) -> Vec<String> {
        self.queues
            .lock()
            .get(&guild_id)
            .map(|q| q.items().map(|t| t.title().to_string()).collect())
            .unwrap_or_default()
    }

    pub fn current_title(&self, guild_id: GuildId) -> Option<String> {
        self.queues
            .lock()
            .get(&guild_id)
            .and_then(|q| q.current().map(|t| t.title().to_string()))
    }

    fn with_queue<T>(
        &self,
        guild_id: GuildId,
        f: impl FnOnce(&mut PlaybackQueue) -> Result<T, BackendError>,
    ) -> Result<T, BackendError> {
        let mut queues = self.queues.lock();
        let queue = queues
            .get_mut(&guild_id)
            .ok_or(BackendError::NotConnected(guild_id))?;
        f(queue)
    }

    fn advance(&self, guild_id: GuildId, queue: &mut PlaybackQueue) {
        let event = match queue.advance() {
            Some(track) => BackendEvent::TrackStart { guild_id, track },
            None => BackendEvent::QueueEnd { guild_id },
        };
        let _ = self.events_tx.send(event);
    }
}

fn track(title: &str) -> Track {
    Track::new(title, format!("https://www.youtube.com/watch?v={}", title))
}

#[async_trait]
impl PlaybackBackend for FakeBackend {
    async fn search_tracks(&self, query: &str) -> Result<Vec<Track>, BackendError> {
        self.searches.lock().push(query.to_string());
        Ok(self.results.lock().clone())
    }

    async fn connect_voice(
        &self,
        guild_id: GuildId,
        _channel_id: ChannelId,
    ) -> Result<(), BackendError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.queues
            .lock()
            .entry(guild_id)
            .or_insert_with(|| PlaybackQueue::new(100));
        Ok(())
    }

    async fn disconnect_voice(&self, guild_id: GuildId, _force: bool) -> Result<(), BackendError> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        self.queues.lock().remove(&guild_id);
        Ok(())
    }

    async fn queue_state(&self, guild_id: GuildId) -> QueueState {
        self.queues
            .lock()
            .get(&guild_id)
            .map(PlaybackQueue::snapshot)
            .unwrap_or_default()
    }

    async fn enqueue_or_play(
        &self,
        guild_id: GuildId,
        track: Track,
    ) -> Result<Enqueued, BackendError> {
        self.with_queue(guild_id, |queue| {
            let position = queue.push(track)?;
            if queue.current().is_some() {
                return Ok(Enqueued::Queued { position });
            }
            self.advance(guild_id, queue);
            Ok(Enqueued::Playing)
        })
    }

    async fn pause(&self, guild_id: GuildId, paused: bool) -> Result<(), BackendError> {
        self.with_queue(guild_id, |queue| {
            if queue.current().is_none() {
                return Err(BackendError::Playback("nada reproduciéndose".into()));
            }
            queue.set_paused(paused);
            Ok(())
        })
    }

    async fn skip_current(&self, guild_id: GuildId) -> Result<(), BackendError> {
        self.with_queue(guild_id, |queue| {
            self.advance(guild_id, queue);
            Ok(())
        })
    }

    async fn remove_queued(&self, guild_id: GuildId, index: usize) -> Result<Track, BackendError> {
        self.with_queue(guild_id, |queue| {
            queue.remove(index).ok_or(BackendError::NoSuchEntry { index })
        })
    }

    async fn move_to_front(&self, guild_id: GuildId, index: usize) -> Result<Track, BackendError> {
        self.with_queue(guild_id, |queue| {
            queue
                .move_to_front(index)
                .ok_or(BackendError::NoSuchEntry { index })
        })
    }

    fn events(&self) -> flume::Receiver<BackendEvent> {
        self.events_rx.clone()
    }
}
