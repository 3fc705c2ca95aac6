use async_trait::async_trait;
use serenity::{builder::CreateMessage, http::Http, model::id::ChannelId};
use std::sync::Arc;

use crate::{session::Notifier, sources::Track, ui::embeds};

/// Publica los avisos de "reproduciendo ahora" en Discord
pub struct ChannelNotifier {
    http: Arc<Http>,
}

impl ChannelNotifier {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn now_playing(&self, channel_id: ChannelId, track: &Track) -> anyhow::Result<()> {
        channel_id
            .send_message(
                &self.http,
                CreateMessage::new().embed(embeds::create_now_playing_embed(track)),
            )
            .await?;
        Ok(())
    }
}
