use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{timer::TimerId, SessionManager};
use crate::audio::backend::BackendEvent;
use crate::sources::Track;

/// Avisos al canal de texto vinculado de una guild
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn now_playing(&self, channel_id: ChannelId, track: &Track) -> anyhow::Result<()>;
}

impl SessionManager {
    /// Reparte los eventos del backend hasta que el canal se cierre.
    ///
    /// Each guild gets its own worker, so events stay ordered within a guild
    /// while a busy guild never delays the others.
    pub async fn run_events(self: Arc<Self>, events: flume::Receiver<BackendEvent>) {
        info!("🎧 Escuchando eventos del backend de audio");
        let mut workers: HashMap<GuildId, flume::Sender<BackendEvent>> = HashMap::new();

        while let Ok(event) = events.recv_async().await {
            let guild_id = event.guild_id();
            let worker = workers
                .entry(guild_id)
                .or_insert_with(|| self.clone().spawn_guild_worker(guild_id));

            if let Err(flume::SendError(event)) = worker.send(event) {
                warn!("Worker de eventos de guild {} caído, reiniciando", guild_id);
                let worker = self.clone().spawn_guild_worker(guild_id);
                let _ = worker.send(event);
                workers.insert(guild_id, worker);
            }
        }

        warn!("Canal de eventos del backend cerrado");
    }

    fn spawn_guild_worker(self: Arc<Self>, guild_id: GuildId) -> flume::Sender<BackendEvent> {
        let (tx, rx) = flume::unbounded();
        debug!("Worker de eventos para guild {}", guild_id);

        tokio::spawn(async move {
            while let Ok(event) = rx.recv_async().await {
                self.handle_event(event).await;
            }
        });
        tx
    }

    /// Reacciona a un evento del backend. Nunca falla: los errores se registran.
    pub async fn handle_event(&self, event: BackendEvent) {
        let Some(session) = self.registry.get(event.guild_id()) else {
            debug!("Evento para guild sin sesión: {:?}", event);
            return;
        };
        let mut session = session.lock().await;

        match event {
            BackendEvent::TrackStart { guild_id, track } => {
                info!("🎵 Empezó '{}' en guild {}", track.title(), guild_id);
                session.disarm_timer();

                if let Some(channel_id) = session.bound_text_channel {
                    if let Err(e) = self.notifier.now_playing(channel_id, &track).await {
                        warn!(
                            "No se pudo enviar 'reproduciendo' a {} en guild {}: {:?}",
                            channel_id, guild_id, e
                        );
                    }
                }
                session.now_playing = Some(track);
            }
            BackendEvent::QueueEnd { guild_id } => {
                info!("📭 Cola terminada en guild {}", guild_id);

                // Puede llegar tarde: un comando ya pudo haber iniciado otro track
                let state = self.backend.queue_state(guild_id).await;
                if state.playing.is_some() || !state.queue.is_empty() {
                    debug!("Fin de cola obsoleto en guild {}, hay música", guild_id);
                    return;
                }

                session.now_playing = None;
                if session.is_connected() {
                    self.arm_timer(&mut session);
                }
            }
        }
    }

    /// Callback del timer de inactividad: desconecta si sigue siendo el timer vigente
    pub(crate) async fn on_inactivity_timeout(&self, guild_id: GuildId, timer_id: TimerId) {
        let Some(session) = self.registry.get(guild_id) else {
            return;
        };
        let mut session = session.lock().await;

        let current = session.inactivity_timer.as_ref().map(|t| t.id());
        if current != Some(timer_id) {
            debug!(
                "Timer {} obsoleto para guild {} (vigente: {:?})",
                timer_id, guild_id, current
            );
            return;
        }

        session.inactivity_timer = None;
        info!("💤 Guild {} inactiva, desconectando", guild_id);
        self.teardown(&mut session, true).await;
    }
}
