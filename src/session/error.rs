use serenity::model::id::{ChannelId, GuildId};
use thiserror::Error;

use crate::audio::backend::BackendError;

/// Errores de los comandos de música.
///
/// Every variant except [`SessionError::NotInGuild`] is recoverable and its
/// `Display` text is the single reply the user gets.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SessionError {
    #[error("¡Canal incorrecto! Usa los comandos de música en https://discord.com/channels/{guild_id}/{bound}")]
    WrongChannel { guild_id: GuildId, bound: ChannelId },

    #[error("Debes estar conectado a un canal de voz para usar los comandos de música")]
    NotInVoice,

    #[error("No estoy conectado a ningún canal de voz")]
    NotConnected,

    #[error("No hay nada reproduciéndose")]
    NotPlaying,

    #[error("La reproducción no está pausada")]
    NotPaused,

    #[error("Ese no es un link válido")]
    InvalidLink,

    #[error("{}", range_message(.index, .len))]
    OutOfRange { index: i64, len: usize },

    /// Command issued outside a guild: the caller broke the contract.
    #[error("comando de música usado fuera de un servidor")]
    NotInGuild,

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl SessionError {
    /// Errores que indican un bug del llamador y no deben responderse como normales
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::NotInGuild)
    }
}

fn range_message(index: &i64, len: &usize) -> String {
    if *len == 0 {
        format!("La posición {} no es válida: no hay canciones disponibles", index)
    } else {
        format!(
            "La posición {} no es válida. El rango válido es 1-{}",
            index, len
        )
    }
}

/// Valida una posición 1-based y la convierte a índice 0-based
pub(crate) fn checked_index(position: i64, len: usize) -> Result<usize, SessionError> {
    usize::try_from(position)
        .ok()
        .filter(|p| (1..=len).contains(p))
        .map(|p| p - 1)
        .ok_or(SessionError::OutOfRange {
            index: position,
            len,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_checked_index_is_inclusive() {
        assert_eq!(checked_index(1, 3), Ok(0));
        assert_eq!(checked_index(3, 3), Ok(2));
        assert_eq!(
            checked_index(4, 3),
            Err(SessionError::OutOfRange { index: 4, len: 3 })
        );
        assert_eq!(
            checked_index(0, 3),
            Err(SessionError::OutOfRange { index: 0, len: 3 })
        );
        assert_eq!(
            checked_index(-2, 3),
            Err(SessionError::OutOfRange { index: -2, len: 3 })
        );
        assert!(checked_index(1, 0).is_err());
    }

    #[test]
    fn test_range_message_restates_bounds() {
        let message = SessionError::OutOfRange { index: 7, len: 3 }.to_string();
        assert!(message.contains("1-3"), "{}", message);

        let empty = SessionError::OutOfRange { index: 1, len: 0 }.to_string();
        assert!(empty.contains("no hay canciones"), "{}", empty);
    }

    #[test]
    fn test_wrong_channel_names_bound_channel() {
        let message = SessionError::WrongChannel {
            guild_id: GuildId::new(10),
            bound: ChannelId::new(20),
        }
        .to_string();

        assert!(message.ends_with("https://discord.com/channels/10/20"));
    }

    #[test]
    fn test_only_not_in_guild_is_fatal() {
        assert!(SessionError::NotInGuild.is_fatal());
        assert!(!SessionError::NotPlaying.is_fatal());
        assert!(!SessionError::Backend(BackendError::NotConnected(GuildId::new(1))).is_fatal());
    }
}
