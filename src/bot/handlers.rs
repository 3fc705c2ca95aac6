use anyhow::Result;
use serenity::{
    builder::{
        CreateEmbed, CreateInteractionResponse, CreateInteractionResponseMessage,
        EditInteractionResponse,
    },
    model::{
        application::CommandInteraction,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::{debug, error, info};

use crate::{
    bot::JukeboxBot,
    session::{CommandContext, PlayOutcome, SessionError, SessionManager, SkipOutcome},
    ui::embeds,
};

/// Maneja comandos slash.
///
/// Every command gets exactly one reply: the outcome embed or the error embed.
/// `play` and `search` may wait on a search, so they are deferred first and the
/// reply edits the deferred response.
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &JukeboxBot,
) -> Result<()> {
    let context = command_context(ctx, &command);
    let name = command.data.name.as_str();

    info!(
        "📝 Comando /{} usado por {} en guild {:?}",
        name, command.user.name, command.guild_id
    );

    // Defer la respuesta ya que puede tomar tiempo
    let deferred = matches!(name, "play" | "search");
    if deferred {
        command
            .create_response(
                &ctx.http,
                CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
            )
            .await?;
    }

    let sessions = bot.sessions.as_ref();
    let outcome = match name {
        "play" => handle_play(sessions, &context, string_option(&command, "query")).await,
        "pause" => handle_pause(sessions, &context).await,
        "skip" => handle_skip(sessions, &context, integer_option(&command, "position")).await,
        "next" => {
            let position = integer_option(&command, "position").unwrap_or(0);
            handle_next(sessions, &context, position).await
        }
        "queue" => handle_queue(sessions, &context).await,
        "search" => {
            let query = string_option(&command, "query").unwrap_or_default();
            handle_search(sessions, &context, query).await
        }
        "join" => handle_join(sessions, &context).await,
        "disconnect" => handle_disconnect(sessions, &context).await,
        _ => Ok(embeds::create_error_embed(
            "Comando no reconocido",
            "Usa los comandos de música registrados",
        )),
    };

    match outcome {
        Ok(embed) => respond(ctx, &command, embed, deferred).await,
        Err(e) => {
            respond(
                ctx,
                &command,
                embeds::create_error_embed("No se pudo completar", &e.to_string()),
                deferred,
            )
            .await?;

            if e.is_fatal() {
                error!("❌ /{} violó el contrato del comando: {}", name, e);
                return Err(anyhow::Error::new(e).context(format!("/{} inválido", name)));
            }

            debug!("/{} rechazado: {}", name, e);
            Ok(())
        }
    }
}

async fn respond(
    ctx: &Context,
    command: &CommandInteraction,
    embed: CreateEmbed,
    deferred: bool,
) -> Result<()> {
    if deferred {
        command
            .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
            .await?;
    } else {
        command
            .create_response(
                &ctx.http,
                CreateInteractionResponse::Message(
                    CreateInteractionResponseMessage::new().embed(embed),
                ),
            )
            .await?;
    }
    Ok(())
}

// Handlers específicos para cada comando

async fn handle_play(
    sessions: &SessionManager,
    context: &CommandContext,
    query: Option<&str>,
) -> Result<CreateEmbed, SessionError> {
    let embed = match sessions.play(context, query).await? {
        PlayOutcome::Resumed => {
            embeds::create_success_embed("Reanudado", "▶️ La reproducción continúa")
        }
        PlayOutcome::Started(track) => embeds::create_success_embed(
            "Reproduciendo",
            &format!("🎵 **{}**", track.title()),
        ),
        PlayOutcome::Queued { track, position } => {
            embeds::create_track_queued_embed(&track, position)
        }
        PlayOutcome::NoResults => embeds::create_warning_embed(
            "Sin resultados",
            "No se encontró nada para reproducir",
        ),
    };
    Ok(embed)
}

async fn handle_pause(
    sessions: &SessionManager,
    context: &CommandContext,
) -> Result<CreateEmbed, SessionError> {
    sessions.pause(context).await?;
    Ok(embeds::create_success_embed(
        "Pausado",
        "⏸️ Usa `/play` sin argumentos para reanudar",
    ))
}

async fn handle_skip(
    sessions: &SessionManager,
    context: &CommandContext,
    position: Option<i64>,
) -> Result<CreateEmbed, SessionError> {
    let embed = match sessions.skip(context, position).await? {
        SkipOutcome::Skipped(track) => {
            embeds::create_success_embed("Saltada", &format!("⏭️ **{}**", track.title()))
        }
        SkipOutcome::Removed { track, position } => embeds::create_success_embed(
            "Quitada de la cola",
            &format!("❌ **{}** (posición {})", track.title(), position),
        ),
    };
    Ok(embed)
}

async fn handle_next(
    sessions: &SessionManager,
    context: &CommandContext,
    position: i64,
) -> Result<CreateEmbed, SessionError> {
    let track = sessions.next(context, position).await?;
    Ok(embeds::create_success_embed(
        "Siguiente en la cola",
        &format!("📍 **{}** sonará a continuación", track.title()),
    ))
}

async fn handle_queue(
    sessions: &SessionManager,
    context: &CommandContext,
) -> Result<CreateEmbed, SessionError> {
    let view = sessions.show_queue(context).await?;
    Ok(embeds::create_queue_embed(&view))
}

async fn handle_search(
    sessions: &SessionManager,
    context: &CommandContext,
    query: &str,
) -> Result<CreateEmbed, SessionError> {
    let results = sessions.search(context, query).await?;
    if results.is_empty() {
        return Ok(embeds::create_warning_embed(
            "Sin resultados",
            &format!("No se encontró nada para \"{}\"", query),
        ));
    }
    Ok(embeds::create_search_results_embed(query, &results))
}

async fn handle_join(
    sessions: &SessionManager,
    context: &CommandContext,
) -> Result<CreateEmbed, SessionError> {
    let embed = if sessions.connect_to_voice(context).await? {
        embeds::create_success_embed("Conectado", "🔊 Listo para reproducir")
    } else {
        embeds::create_success_embed("Ya conectado", "🔊 El bot ya está en un canal de voz")
    };
    Ok(embed)
}

async fn handle_disconnect(
    sessions: &SessionManager,
    context: &CommandContext,
) -> Result<CreateEmbed, SessionError> {
    sessions.disconnect_from_voice(context).await?;
    Ok(embeds::create_success_embed(
        "Desconectado",
        "👋 Desconectado del canal de voz",
    ))
}

/// Arma el contexto del comando con el canal de voz actual del usuario
fn command_context(ctx: &Context, command: &CommandInteraction) -> CommandContext {
    CommandContext {
        guild_id: command.guild_id,
        channel_id: command.channel_id,
        user_id: command.user.id,
        user_voice_channel: command
            .guild_id
            .and_then(|guild_id| get_user_voice_channel(ctx, guild_id, command.user.id)),
    }
}

fn get_user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;

    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}

fn string_option<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_str())
}

fn integer_option(command: &CommandInteraction, name: &str) -> Option<i64> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_i64())
}
