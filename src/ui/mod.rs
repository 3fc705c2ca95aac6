//! Discord embeds for track, queue and search views.

pub mod embeds;
