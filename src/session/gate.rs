use serenity::model::id::{ChannelId, GuildId, UserId};
use tracing::{debug, info};

use super::{error::SessionError, registry::GuildSession};

/// Origen de un comando: quién lo pidió, desde dónde y en qué canal de voz está
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandContext {
    pub guild_id: Option<GuildId>,
    pub channel_id: ChannelId,
    pub user_id: UserId,
    /// Canal de voz del usuario al momento del comando
    pub user_voice_channel: Option<ChannelId>,
}

impl CommandContext {
    /// Guild del comando; fuera de un servidor es un error fatal
    pub fn guild(&self) -> Result<GuildId, SessionError> {
        self.guild_id.ok_or(SessionError::NotInGuild)
    }
}

/// Valida que el comando pueda actuar sobre la sesión.
///
/// The first command seen in a guild binds its text channel. After that,
/// commands are checked in order: bound channel, caller's voice presence and,
/// when `requires_voice` is set, the bot's own voice connection. The first
/// failing check is the only one reported.
pub fn check_context(
    session: &mut GuildSession,
    ctx: &CommandContext,
    requires_voice: bool,
) -> Result<(), SessionError> {
    let guild_id = session.guild_id;
    let bound = *session.bound_text_channel.get_or_insert_with(|| {
        info!(
            "📌 Canal de texto {} vinculado a guild {}",
            ctx.channel_id, guild_id
        );
        ctx.channel_id
    });

    if bound != ctx.channel_id {
        debug!(
            "Comando rechazado en canal {} (vinculado: {})",
            ctx.channel_id, bound
        );
        return Err(SessionError::WrongChannel { guild_id, bound });
    }

    if ctx.user_voice_channel.is_none() {
        return Err(SessionError::NotInVoice);
    }

    if requires_voice && !session.is_connected() {
        return Err(SessionError::NotConnected);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::registry::{SessionRegistry, VoiceConnection};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn guild() -> GuildId {
        GuildId::new(1)
    }

    fn ctx(channel: u64, voice: Option<u64>) -> CommandContext {
        CommandContext {
            guild_id: Some(guild()),
            channel_id: ChannelId::new(channel),
            user_id: UserId::new(42),
            user_voice_channel: voice.map(ChannelId::new),
        }
    }

    #[tokio::test]
    async fn test_first_command_binds_channel() {
        let registry = SessionRegistry::new();
        let session = registry.get_or_create(guild());
        let mut session = session.lock().await;

        assert_eq!(check_context(&mut session, &ctx(10, Some(99)), false), Ok(()));
        assert_eq!(session.bound_text_channel(), Some(ChannelId::new(10)));

        let rejected = check_context(&mut session, &ctx(11, Some(99)), false);
        assert_eq!(
            rejected,
            Err(SessionError::WrongChannel {
                guild_id: guild(),
                bound: ChannelId::new(10),
            })
        );
        // El vínculo no cambia tras un rechazo
        assert_eq!(session.bound_text_channel(), Some(ChannelId::new(10)));
    }

    #[tokio::test]
    async fn test_rejected_first_command_still_binds() {
        let registry = SessionRegistry::new();
        let session = registry.get_or_create(guild());
        let mut session = session.lock().await;

        assert_eq!(
            check_context(&mut session, &ctx(10, None), false),
            Err(SessionError::NotInVoice)
        );
        assert_eq!(session.bound_text_channel(), Some(ChannelId::new(10)));
    }

    #[tokio::test]
    async fn test_wrong_channel_reported_before_voice_presence() {
        let registry = SessionRegistry::new();
        let session = registry.get_or_create(guild());
        let mut session = session.lock().await;

        check_context(&mut session, &ctx(10, Some(99)), false).unwrap();

        assert!(matches!(
            check_context(&mut session, &ctx(11, None), true),
            Err(SessionError::WrongChannel { .. })
        ));
    }

    #[tokio::test]
    async fn test_requires_voice_connection() {
        let registry = SessionRegistry::new();
        let session = registry.get_or_create(guild());
        let mut session = session.lock().await;

        assert_eq!(
            check_context(&mut session, &ctx(10, Some(99)), true),
            Err(SessionError::NotConnected)
        );

        session.voice = Some(Arc::new(VoiceConnection::new(ChannelId::new(99))));
        assert_eq!(check_context(&mut session, &ctx(10, Some(99)), true), Ok(()));
    }

    #[test]
    fn test_missing_guild_is_fatal() {
        let context = CommandContext {
            guild_id: None,
            ..ctx(10, Some(99))
        };

        let err = context.guild().unwrap_err();
        assert!(err.is_fatal());
    }
}
