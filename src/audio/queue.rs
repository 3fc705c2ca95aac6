use std::collections::VecDeque;
use tracing::{debug, info};

use super::backend::{BackendError, QueueState};
use crate::sources::Track;

/// Cola de reproducción de una guild.
///
/// Holds at most one current track plus an ordered FIFO of upcoming tracks.
/// The current track is popped out of `items` when it starts, so it is never
/// part of the upcoming list.
#[derive(Debug)]
pub struct PlaybackQueue {
    items: VecDeque<Track>,
    current: Option<Track>,
    paused: bool,
    max_size: usize,
}

impl PlaybackQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            items: VecDeque::new(),
            current: None,
            paused: false,
            max_size,
        }
    }

    /// Agrega un track al final de la cola y devuelve su posición (1-based)
    pub fn push(&mut self, track: Track) -> Result<usize, BackendError> {
        if self.items.len() >= self.max_size {
            return Err(BackendError::QueueFull { max: self.max_size });
        }

        info!("➕ Agregado a la cola: {}", track.title());
        self.items.push_back(track);
        Ok(self.items.len())
    }

    /// Pasa al siguiente track (FIFO). El actual se descarta.
    pub fn advance(&mut self) -> Option<Track> {
        self.paused = false;
        self.current = self.items.pop_front();

        match &self.current {
            Some(track) => info!("➡️ Siguiente en cola: {}", track.title()),
            None => info!("📭 Cola vacía, no hay siguiente track"),
        }

        self.current.clone()
    }

    /// Elimina el track en `index` (0-based) sin tocar el actual
    pub fn remove(&mut self, index: usize) -> Option<Track> {
        let removed = self.items.remove(index);
        if removed.is_some() {
            debug!("❌ Track eliminado en posición {}", index);
        }
        removed
    }

    /// Mueve el track en `index` (0-based) al frente, preservando el orden del resto
    pub fn move_to_front(&mut self, index: usize) -> Option<Track> {
        let track = self.items.remove(index)?;
        self.items.push_front(track.clone());
        debug!("📍 Track movido de posición {} al frente", index);
        Some(track)
    }

    /// Limpia la cola y el track actual
    pub fn clear(&mut self) {
        self.items.clear();
        self.current = None;
        self.paused = false;
        info!("🗑️ Cola limpiada");
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused && self.current.is_some();
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn items(&self) -> impl Iterator<Item = &Track> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn snapshot(&self) -> QueueState {
        QueueState {
            playing: self.current.clone(),
            paused: self.paused,
            queue: self.items.iter().cloned().collect(),
        }
    }
}
