//! # Audio Module
//!
//! Playback backend for Guild Jukebox.
//!
//! ## Architecture
//!
//! ### [`backend`] - Adapter contract
//! - [`backend::PlaybackBackend`]: voice connect/disconnect, search, enqueue,
//!   pause, skip and queue edits
//! - [`backend::BackendEvent`]: track-start and queue-end notifications,
//!   delivered in emission order over a single channel
//!
//! ### [`queue`] - Queue Management
//! - FIFO of upcoming tracks plus the current one
//! - Removal and move-to-front by index
//!
//! ### [`player`] - Songbird Player
//! - One player per connected guild, streaming through `yt-dlp`
//! - Advances the queue on its own when a track ends
//!
//! The session layer only talks to [`backend::PlaybackBackend`]; the songbird
//! player is wired in at startup.

pub mod backend;
pub mod player;
pub mod queue;
