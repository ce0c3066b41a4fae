use crate::{
    api::tmdb::{self, MediaKind},
    event::*,
    helper::*,
    log_error,
    plugin::*,
};
use anyhow::Result;
use serenity::all::{CreateEmbed, CreateEmbedFooter, CreateMessage, Message};

const TMDB_BLUE: u32 = 0x01B4E4;
const OVERVIEW_MAX: usize = 1000;

/// Movie and TV show lookups on TMDB
pub struct Movies;

#[serenity::async_trait]
impl Plugin for Movies {
    fn name(&self) -> &'static str {
        "movies"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        Some(
            usage_lines(
                ctx,
                &["movie <title> - look up a movie", "tv <title> - look up a TV show"],
            )
            .await,
        )
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Some((msg, name, args)) = event.bot_cmd(ctx).await else {
            return Ok(EventHandled::No);
        };
        let kind = match name.to_lowercase().as_str() {
            "movie" => MediaKind::Movie,
            "tv" => MediaKind::Tv,
            _ => return Ok(EventHandled::No),
        };
        lookup(ctx, msg, kind, &args.join(" ")).await?;
        Ok(EventHandled::Yes)
    }
}

async fn lookup(ctx: &Context<'_>, msg: &Message, kind: MediaKind, query: &str) -> Result<()> {
    if query.trim().is_empty() {
        msg.reply(ctx.cache_http, "Give a title to look up.").await?;
        return Ok(());
    }
    let Some(api_key) = ctx.cfg.read().await.credentials.tmdb_api_key.clone() else {
        msg.reply(ctx.cache_http, "Lookups are not set up on this bot.")
            .await?;
        return Ok(());
    };

    let hit = match tmdb::search(ctx.web, &api_key, kind, query.trim()).await {
        Ok(Some(hit)) => hit,
        Ok(None) => {
            msg.reply(
                ctx.cache_http,
                format!("Nothing found for `{}`.", truncate(query, 60)),
            )
            .await?;
            return Ok(());
        }
        Err(e) => {
            log_error!("TMDB search for {:?} failed: {}", query, e);
            msg.reply(ctx.cache_http, "TMDB is unavailable right now.")
                .await?;
            return Ok(());
        }
    };

    let title = match hit.year() {
        Some(year) => format!("{} ({})", hit.title, year),
        None => hit.title.clone(),
    };
    let overview = if hit.overview.is_empty() {
        "No overview available.".to_owned()
    } else {
        truncate(&hit.overview, OVERVIEW_MAX)
    };
    let rating = if hit.vote_count == 0 {
        "Not rated".to_owned()
    } else {
        format!("⭐ {:.1}/10 ({} votes)", hit.vote_average, hit.vote_count)
    };

    let mut embed = CreateEmbed::new()
        .title(title)
        .url(hit.page_url(kind))
        .description(overview)
        .color(TMDB_BLUE)
        .field("Rating", rating, true)
        .footer(CreateEmbedFooter::new("Data from TMDB"));
    if let Some(poster) = hit.poster_url() {
        embed = embed.thumbnail(poster);
    }

    msg.channel_id
        .send_message(ctx.cache_http, CreateMessage::new().embed(embed))
        .await?;
    Ok(())
}
