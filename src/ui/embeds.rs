use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};
use std::time::Duration;

use crate::{
    session::{PlaybackState, QueueView},
    sources::Track,
};

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Guild Jukebox";

/// Embed de "reproduciendo ahora", enviado al canal vinculado cuando empieza un track
pub fn create_now_playing_embed(track: &Track) -> CreateEmbed {
    track_details(
        CreateEmbed::default()
            .title("🎵 Reproduciendo Ahora")
            .description(format!("**{}**", track.title()))
            .color(colors::SUCCESS_GREEN),
        track,
    )
    .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed para mostrar que se agregó una canción
pub fn create_track_queued_embed(track: &Track, position: usize) -> CreateEmbed {
    track_details(
        CreateEmbed::default()
            .title("✅ Canción Agregada")
            .description(format!(
                "**{}** se agregó a la cola en la posición **{}**",
                track.title(),
                position
            ))
            .color(colors::MUSIC_PURPLE),
        track,
    )
    .footer(CreateEmbedFooter::new(
        "🎵 Se reproducirá automáticamente cuando llegue su turno",
    ))
}

fn track_details(mut embed: CreateEmbed, track: &Track) -> CreateEmbed {
    embed = embed
        .field("🎤 Artista", track.author().unwrap_or("Desconocido"), true)
        .field("⏱️ Duración", duration_label(track.duration()), true);

    if let Some(user_id) = track.requested_by() {
        embed = embed.field("👤 Solicitado por", format!("<@{}>", user_id), true);
    }

    if let Some(artwork) = track.artwork() {
        embed = embed.thumbnail(artwork);
    }

    embed.url(track.url()).timestamp(Timestamp::now())
}

/// Crea un embed para mostrar la cola de reproducción
pub fn create_queue_embed(view: &QueueView) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("📋 Cola de Reproducción")
        .color(colors::INFO_BLUE);

    if view.now_playing.is_none() && view.total == 0 {
        return embed
            .description("😴 **La cola está vacía**\n\n💡 Usa `/play <canción>` para agregar música")
            .color(colors::NEUTRAL_GRAY)
            .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
            .timestamp(Timestamp::now());
    }

    if let Some(current) = &view.now_playing {
        let status = match view.state {
            PlaybackState::Paused => "⏸️ En pausa",
            _ => "▶️ Reproduciendo",
        };
        embed = embed.field(status, track_line(current), false);
    }

    if !view.upcoming.is_empty() {
        embed = embed.field("Próximas canciones", numbered_list(&view.upcoming), false);
    }

    let mut info = format!("**Total en cola:** {} canciones", view.total);
    let hidden = view.total.saturating_sub(view.upcoming.len());
    if hidden > 0 {
        info.push_str(&format!(" • y {} más", hidden));
    }

    embed
        .field("Información", info, false)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
        .timestamp(Timestamp::now())
}

/// Discord rechaza títulos de embed de más de 256 caracteres
const MAX_TITLE_QUERY: usize = 200;

/// Resultados de `/search`, numerados para usar con `/play <n>`
pub fn create_search_results_embed(query: &str, results: &[Track]) -> CreateEmbed {
    CreateEmbed::default()
        .title(search_results_title(query))
        .description(numbered_list(results))
        .color(colors::INFO_BLUE)
        .footer(CreateEmbedFooter::new("💡 Usa /play <número> para reproducir un resultado"))
        .timestamp(Timestamp::now())
}

fn search_results_title(query: &str) -> String {
    format!("🔍 Resultados para \"{}\"", truncate(query, MAX_TITLE_QUERY))
}

/// Corta `text` a `max` caracteres, marcando el corte con "…"
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

/// Crea un embed de error
pub fn create_error_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("❌ {}", title))
        .description(description)
        .color(colors::ERROR_RED)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Aviso sin error (sin resultados, etc.)
pub fn create_warning_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("⚠️ {}", title))
        .description(description)
        .color(colors::WARNING_ORANGE)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed de éxito
pub fn create_success_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("✅ {}", title))
        .description(description)
        .color(colors::SUCCESS_GREEN)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// `**Título** - Artista `[3:05]``
fn track_line(track: &Track) -> String {
    let mut line = format!("**{}**", track.title());
    if let Some(author) = track.author() {
        line.push_str(&format!(" - {}", author));
    }
    if let Some(duration) = track.duration() {
        line.push_str(&format!(" `[{}]`", format_duration(duration)));
    }
    line
}

fn numbered_list(tracks: &[Track]) -> String {
    tracks
        .iter()
        .enumerate()
        .map(|(i, track)| format!("**{}**. {}", i + 1, track_line(track)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn duration_label(duration: Option<Duration>) -> String {
    duration.map_or_else(|| "🔴 En vivo".to_string(), format_duration)
}

/// Formatea una duración en formato legible
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(5)), "0:05");
        assert_eq!(format_duration(Duration::from_secs(185)), "3:05");
        assert_eq!(format_duration(Duration::from_secs(3_725)), "1:02:05");
    }

    #[test]
    fn test_duration_label_for_streams() {
        assert_eq!(duration_label(None), "🔴 En vivo");
        assert_eq!(duration_label(Some(Duration::from_secs(60))), "1:00");
    }

    #[test]
    fn test_track_line_includes_known_metadata() {
        let bare = Track::new("Song", "https://example.com");
        assert_eq!(track_line(&bare), "**Song**");

        let full = bare
            .with_author("Band")
            .with_duration(Duration::from_secs(200));
        assert_eq!(track_line(&full), "**Song** - Band `[3:20]`");
    }

    #[test]
    fn test_long_search_query_fits_embed_title() {
        let query = "ñ".repeat(1_000);

        let title = search_results_title(&query);

        assert!(title.chars().count() <= 256);
        assert!(title.contains('…'));
        assert_eq!(search_results_title("lofi"), "🔍 Resultados para \"lofi\"");
    }

    #[test]
    fn test_numbered_list_starts_at_one() {
        let tracks = vec![
            Track::new("A", "https://example.com/a"),
            Track::new("B", "https://example.com/b"),
        ];

        assert_eq!(numbered_list(&tracks), "**1**. **A**\n**2**. **B**");
    }
}
