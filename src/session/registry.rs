use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::sync::Mutex;
use tracing::debug;

use super::timer::InactivityTimer;
use crate::sources::Track;

/// Sesión compartida; el lock serializa todo lo que ocurre en la guild
pub type SharedSession = Arc<Mutex<GuildSession>>;

/// Conexión de voz activa de una guild
#[derive(Debug)]
pub struct VoiceConnection {
    channel_id: ChannelId,
    destroyed: AtomicBool,
}

impl VoiceConnection {
    pub fn new(channel_id: ChannelId) -> Self {
        Self {
            channel_id,
            destroyed: AtomicBool::new(false),
        }
    }

    pub fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    /// Marca la conexión como destruida. Sólo la primera llamada devuelve `true`.
    pub fn mark_destroyed(&self) -> bool {
        !self.destroyed.swap(true, Ordering::AcqRel)
    }
}

/// Estado de una guild con presencia (actual o reciente) del bot.
///
/// Fields are crate-visible for the state machine; nothing else mutates them.
#[derive(Debug)]
pub struct GuildSession {
    pub(crate) guild_id: GuildId,
    /// First text channel that issued a command here; set once, never cleared.
    pub(crate) bound_text_channel: Option<ChannelId>,
    pub(crate) now_playing: Option<Track>,
    /// Last search results, used by `play <n>`.
    pub(crate) search_cache: Vec<Track>,
    pub(crate) inactivity_timer: Option<InactivityTimer>,
    pub(crate) voice: Option<Arc<VoiceConnection>>,
}

impl GuildSession {
    fn new(guild_id: GuildId) -> Self {
        Self {
            guild_id,
            bound_text_channel: None,
            now_playing: None,
            search_cache: Vec::new(),
            inactivity_timer: None,
            voice: None,
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn bound_text_channel(&self) -> Option<ChannelId> {
        self.bound_text_channel
    }

    pub fn now_playing(&self) -> Option<&Track> {
        self.now_playing.as_ref()
    }

    pub fn search_cache(&self) -> &[Track] {
        &self.search_cache
    }

    pub fn is_connected(&self) -> bool {
        self.voice.is_some()
    }

    pub fn has_armed_timer(&self) -> bool {
        self.inactivity_timer
            .as_ref()
            .is_some_and(InactivityTimer::is_armed)
    }

    /// Cancela el timer de inactividad si hay uno. Devuelve si había uno armado.
    pub(crate) fn disarm_timer(&mut self) -> bool {
        match self.inactivity_timer.take() {
            Some(timer) => {
                let prevented = timer.cancel();
                if prevented {
                    debug!("⏹️ Timer de inactividad cancelado en guild {}", self.guild_id);
                }
                prevented
            }
            None => false,
        }
    }
}

/// Registro de sesiones por guild
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<GuildId, SharedSession>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Devuelve la sesión de la guild, creándola si no existe
    pub fn get_or_create(&self, guild_id: GuildId) -> SharedSession {
        self.sessions
            .entry(guild_id)
            .or_insert_with(|| {
                debug!("🆕 Sesión creada para guild {}", guild_id);
                Arc::new(Mutex::new(GuildSession::new(guild_id)))
            })
            .clone()
    }

    pub fn get(&self, guild_id: GuildId) -> Option<SharedSession> {
        self.sessions.get(&guild_id).map(|s| s.value().clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
